use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use shared::domain::DateNightId;
use storage::Storage;

#[derive(Parser, Debug)]
#[command(name = "couples-admin", about = "Maintenance commands that talk to the database directly")]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/server.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Insert an account directly, e.g. for seeding a demo database.
    CreateUser {
        name: String,
        email: String,
        password: String,
        #[arg(long, default_value = "5551234567")]
        phone: String,
        #[arg(long)]
        secondary_email: Option<String>,
    },
    /// Print a date night's reviews, newest first.
    ListReviews { date_night_id: i64 },
    /// Delete used and revoked invites.
    PurgeInvites,
    /// List due reminders across every account.
    DueReminders {
        /// Cutoff timestamp (RFC 3339); defaults to now.
        #[arg(long)]
        before: Option<DateTime<Utc>>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::CreateUser {
            name,
            email,
            password,
            phone,
            secondary_email,
        } => {
            let salt: [u8; 16] = rand::random();
            let password_hash =
                argon2::hash_encoded(password.as_bytes(), &salt, &argon2::Config::default())?;
            let user_id = storage
                .create_user(
                    &name,
                    &email,
                    &phone,
                    secondary_email.as_deref(),
                    &password_hash,
                )
                .await?;
            println!("created user_id={}", user_id.0);
        }
        Command::ListReviews { date_night_id } => {
            let reviews = storage
                .list_reviews_for_date_night(DateNightId(date_night_id))
                .await?;
            if reviews.is_empty() {
                println!("no reviews for date_night_id={date_night_id}");
            }
            for review in reviews {
                println!(
                    "review_id={} author_id={} rating={} at={} message={:?}",
                    review.review_id.0,
                    review.author_id.0,
                    review.rating,
                    review.created_at.format("%Y-%m-%d %H:%M:%S"),
                    review.message
                );
            }
        }
        Command::PurgeInvites => {
            let deleted = storage.delete_spent_invites().await?;
            println!("deleted {deleted} spent invite(s)");
        }
        Command::DueReminders { before } => {
            let before = before.unwrap_or_else(Utc::now);
            let due = storage.list_all_due_reminders(before).await?;
            if due.is_empty() {
                println!("nothing due before {}", before.to_rfc3339());
            }
            for manifestation in due {
                let remind_at = manifestation
                    .remind_at
                    .map(|at| at.to_rfc3339())
                    .unwrap_or_default();
                println!(
                    "manifestation_id={} author_id={} remind_at={} title={:?}",
                    manifestation.manifestation_id.0,
                    manifestation.author_id.0,
                    remind_at,
                    manifestation.title
                );
            }
        }
    }

    Ok(())
}
