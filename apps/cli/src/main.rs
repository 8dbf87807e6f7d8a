use std::{
    io::{self, Write},
    sync::Arc,
};

use anyhow::{bail, Result};
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use clap::{Parser, Subcommand};
use client_core::{
    feed::ReviewFeed,
    pairing::{describe_failure, is_invite_code_shaped},
    picker::{DateTimePicker, PickerMode},
    signup::{Advance, Retreat, SignupForm, SignupStep},
    AppClient,
};
use shared::{
    domain::{DateNightId, ManifestationId, ManifestationKind, Milestone},
    protocol::{ManifestationUpdate, NewManifestation, NewReview, ReviewPayload},
};
use tokio::{sync::broadcast, time::Duration};

#[derive(Parser, Debug)]
#[command(name = "couples", about = "Command-line client for the couples server")]
struct Cli {
    #[arg(long, default_value = "http://127.0.0.1:8765")]
    server_url: String,
    /// Access token from an earlier signup/signin. Falls back to the
    /// COUPLES_TOKEN environment variable.
    #[arg(long)]
    token: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive five-step signup. Type 'back' to go a step back.
    Signup,
    Signin {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create an invite code to share with your partner.
    Invite,
    /// Accept your partner's invite code.
    Accept {
        #[arg(long)]
        code: String,
    },
    /// Show whether you are paired and with whom.
    Status,
    #[command(subcommand)]
    Manifest(ManifestCommand),
    #[command(subcommand)]
    Reviews(ReviewsCommand),
}

#[derive(Subcommand, Debug)]
enum ManifestCommand {
    Add {
        #[arg(long)]
        title: String,
        /// "shared" or "individual".
        #[arg(long, default_value = "shared")]
        kind: String,
        #[arg(long)]
        description: Option<String>,
        /// May repeat; each becomes an open milestone.
        #[arg(long = "milestone")]
        milestones: Vec<String>,
        /// Goal date (UTC), e.g. 2025-12-31.
        #[arg(long)]
        target_date: Option<NaiveDate>,
        /// Reminder day (UTC); must not be in the past.
        #[arg(long)]
        remind_date: Option<NaiveDate>,
        /// Reminder hour, 0-23.
        #[arg(long, default_value_t = 19)]
        remind_hour: u32,
        /// Minute wheel slot 0-11; slot 1 is :05.
        #[arg(long, default_value_t = 0)]
        remind_minute_slot: usize,
    },
    List,
    /// Tick off one milestone by its label.
    Done {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        milestone: String,
    },
}

#[derive(Subcommand, Debug)]
enum ReviewsCommand {
    /// Poll a date night's reviews and print every refresh.
    Watch {
        #[arg(long)]
        date_night: i64,
        #[arg(long, default_value_t = 5)]
        interval_secs: u64,
        #[arg(long, default_value_t = 30)]
        for_secs: u64,
    },
    Add {
        #[arg(long)]
        date_night: i64,
        /// 1 to 5 stars.
        #[arg(long)]
        rating: u8,
        #[arg(long)]
        message: String,
        #[arg(long)]
        emoji: Option<String>,
        /// May repeat.
        #[arg(long = "image")]
        images: Vec<String>,
        /// May repeat.
        #[arg(long = "video")]
        videos: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let cli = Cli::parse();

    let mut client = AppClient::new(&cli.server_url)?;
    if let Some(token) = cli
        .token
        .clone()
        .or_else(|| std::env::var("COUPLES_TOKEN").ok())
    {
        client.set_access_token(token);
    }

    match cli.command {
        Command::Signup => run_signup(&mut client).await?,
        Command::Signin { email, password } => {
            let session = client.signin(&email, &password).await?;
            println!("Signed in as {}. Your access token:", session.display_name);
            println!("{}", session.access_token);
        }
        Command::Invite => {
            let invite = client.create_invite().await?;
            println!("Share this code with your partner: {}", invite.code);
        }
        Command::Accept { code } => {
            if !is_invite_code_shaped(&code) {
                bail!("that doesn't look like an invite code (expected LOVE-XXXX)");
            }
            match client.accept_invite(code.trim()).await {
                Ok(status) => match status.partner {
                    Some(partner) => println!("Paired with {}!", partner.display_name),
                    None => println!("Paired!"),
                },
                Err(error) => {
                    let (title, body) = describe_failure(&error);
                    bail!("{title}: {body}");
                }
            }
        }
        Command::Status => {
            let status = client.pair_status().await?;
            if !status.paired {
                println!("Not paired yet. Create an invite with `invite`.");
            } else {
                match status.partner {
                    Some(partner) => println!(
                        "Paired with {} (user {}).",
                        partner.display_name, partner.user_id.0
                    ),
                    None => println!("Paired."),
                }
            }
        }
        Command::Manifest(command) => run_manifest(&client, command).await?,
        Command::Reviews(command) => run_reviews(&client, command).await?,
    }

    Ok(())
}

async fn run_signup(client: &mut AppClient) -> Result<()> {
    let mut form = SignupForm::new();
    println!("Create your account. Type 'back' at any prompt to go a step back.");
    loop {
        let first = prompt(&format!(
            "[{}/5] {}",
            form.step().position(),
            step_label(form.step())
        ))?;
        if first == "back" {
            match form.retreat() {
                Retreat::Exit => {
                    println!("Signup cancelled.");
                    return Ok(());
                }
                Retreat::Moved(_) | Retreat::Busy => continue,
            }
        }
        match form.step() {
            SignupStep::Name => form.name = first,
            SignupStep::Email => form.email = first,
            SignupStep::Password => {
                form.password = first;
                form.confirm_password = prompt("      confirm password")?;
            }
            SignupStep::Phone => form.phone = first,
            SignupStep::SecondaryEmail => form.secondary_email = first,
        }
        match form.advance() {
            Advance::Stayed => {
                if let Some(error) = form.error() {
                    println!("  !! {error}");
                }
            }
            Advance::Moved(_) | Advance::Busy => {}
            Advance::Submit(request) => match client.signup(&request).await {
                Ok(session) => {
                    form.submission_succeeded();
                    if form.take_redirect() {
                        println!("Welcome, {}! Your access token:", session.display_name);
                        println!("{}", session.access_token);
                    }
                    return Ok(());
                }
                Err(error) => {
                    form.submission_failed(error.message);
                    if let Some(error) = form.error() {
                        println!("  !! {error}");
                    }
                }
            },
        }
    }
}

fn step_label(step: SignupStep) -> &'static str {
    match step {
        SignupStep::Name => "your name",
        SignupStep::Email => "email address",
        SignupStep::Password => "password (6+ characters)",
        SignupStep::Phone => "phone number",
        SignupStep::SecondaryEmail => "secondary email",
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{label}: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

async fn run_manifest(client: &AppClient, command: ManifestCommand) -> Result<()> {
    match command {
        ManifestCommand::Add {
            title,
            kind,
            description,
            milestones,
            target_date,
            remind_date,
            remind_hour,
            remind_minute_slot,
        } => {
            let kind: ManifestationKind = kind.parse()?;
            let remind_at = match remind_date {
                Some(date) => Some(pick_remind_at(date, remind_hour, remind_minute_slot)?),
                None => None,
            };
            let target_date = target_date
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|naive| Utc.from_utc_datetime(&naive));
            let milestones = milestones
                .into_iter()
                .map(|label| Milestone { label, done: false })
                .collect();

            let manifestation = client
                .create_manifestation(&NewManifestation {
                    kind,
                    title,
                    description,
                    milestones,
                    target_date,
                    remind_at,
                })
                .await?;
            println!("Created manifestation #{}.", manifestation.id.0);
        }
        ManifestCommand::List => {
            let manifestations = client.list_manifestations().await?;
            if manifestations.is_empty() {
                println!("No manifestations yet.");
            }
            for manifestation in manifestations {
                let done = manifestation.milestones.iter().filter(|m| m.done).count();
                let total = manifestation.milestones.len();
                print!(
                    "#{} [{}] {}",
                    manifestation.id.0,
                    manifestation.kind.as_str(),
                    manifestation.title
                );
                if total > 0 {
                    print!(" ({done}/{total} milestones)");
                }
                if let Some(remind_at) = manifestation.remind_at {
                    print!(" reminder {}", remind_at.format("%Y-%m-%d %H:%M"));
                }
                println!();
            }
        }
        ManifestCommand::Done { id, milestone } => {
            let id = ManifestationId(id);
            let current = client.fetch_manifestation(id).await?;
            let mut milestones = current.milestones.clone();
            let Some(slot) = milestones.iter_mut().find(|m| m.label == milestone) else {
                bail!("no milestone named '{milestone}' on #{}", id.0);
            };
            if slot.done {
                println!("'{milestone}' was already done.");
                return Ok(());
            }
            slot.done = true;
            client
                .update_manifestation(
                    id,
                    &ManifestationUpdate {
                        milestones: Some(milestones),
                        ..Default::default()
                    },
                )
                .await?;
            println!("Marked '{milestone}' done.");
        }
    }
    Ok(())
}

/// Drives the picker dialogs the same way the screens do: date first, then
/// the time wheels. Past days fall on the picker's minimum-date floor.
fn pick_remind_at(date: NaiveDate, hour: u32, minute_slot: usize) -> Result<DateTime<Utc>> {
    if hour > 23 {
        bail!("hour must be 0-23");
    }
    if minute_slot > 11 {
        bail!("minute slot must be 0-11 (slot 1 = :05)");
    }

    let now = Utc::now().naive_utc();
    let mut picker = DateTimePicker::new(now).with_min_date(now.date());

    picker.open(PickerMode::Date);
    let target = (date.year(), date.month());
    while picker.visible_month() < target {
        picker.next_month();
    }
    while picker.visible_month() > target {
        picker.prev_month();
    }
    picker.select_day(date.day());
    picker.confirm();

    picker.open(PickerMode::Time);
    picker.select_hour(hour);
    picker.select_minute_index(minute_slot);
    let picked = picker.confirm();

    if picked.date() != date {
        bail!("reminders cannot be set before today");
    }
    println!("Reminder: {} at {}", picker.date_label(), picker.time_label());
    Ok(Utc.from_utc_datetime(&picked))
}

async fn run_reviews(client: &AppClient, command: ReviewsCommand) -> Result<()> {
    match command {
        ReviewsCommand::Watch {
            date_night,
            interval_secs,
            for_secs,
        } => {
            let feed = ReviewFeed::spawn(
                Arc::new(client.clone()),
                DateNightId(date_night),
                Duration::from_secs(interval_secs.max(1)),
            );
            let mut updates = feed.subscribe();
            println!("Watching date night {date_night} for {for_secs}s...");

            let deadline = tokio::time::sleep(Duration::from_secs(for_secs));
            tokio::pin!(deadline);
            loop {
                tokio::select! {
                    _ = &mut deadline => break,
                    update = updates.recv() => match update {
                        Ok(reviews) => print_reviews(&reviews),
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
            feed.shutdown().await;
            println!("Stopped watching.");
        }
        ReviewsCommand::Add {
            date_night,
            rating,
            message,
            emoji,
            images,
            videos,
        } => {
            if !(1..=5).contains(&rating) {
                bail!("rating must be 1-5");
            }
            let review = client
                .create_review(&NewReview {
                    date_night_id: DateNightId(date_night),
                    rating,
                    message,
                    emoji,
                    image_urls: images,
                    video_urls: videos,
                })
                .await?;
            println!("Created review #{}.", review.id.0);
        }
    }
    Ok(())
}

fn print_reviews(reviews: &[ReviewPayload]) {
    println!("-- {} review(s), newest first --", reviews.len());
    for review in reviews {
        let stars = "*".repeat(usize::from(review.rating.min(5)));
        let emoji = review.emoji.as_deref().unwrap_or("");
        println!(
            "  #{} [{stars}] {} {emoji} ({})",
            review.id.0,
            review.message,
            review.created_at.format("%Y-%m-%d %H:%M")
        );
    }
}
