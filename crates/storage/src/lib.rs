use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::domain::{
    CoupleId, DateNightId, InviteId, InviteStatus, ManifestationId, ManifestationKind, Milestone,
    ReviewId, UserId,
};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct StoredUser {
    pub user_id: UserId,
    pub display_name: String,
    pub email: String,
    pub phone: String,
    pub secondary_email: Option<String>,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct StoredInvite {
    pub invite_id: InviteId,
    pub code: String,
    pub created_by: UserId,
    pub status: InviteStatus,
    pub created_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub used_by: Option<UserId>,
}

#[derive(Debug, Clone)]
pub struct StoredCouple {
    pub couple_id: CoupleId,
    pub user_a: UserId,
    pub user_b: UserId,
    pub paired_at: DateTime<Utc>,
}

impl StoredCouple {
    /// The member of the couple that is not `user_id`.
    pub fn partner_of(&self, user_id: UserId) -> UserId {
        if self.user_a == user_id {
            self.user_b
        } else {
            self.user_a
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoredManifestation {
    pub manifestation_id: ManifestationId,
    pub couple_id: Option<CoupleId>,
    pub author_id: UserId,
    pub kind: ManifestationKind,
    pub title: String,
    pub description: Option<String>,
    pub milestones: Vec<Milestone>,
    pub target_date: Option<DateTime<Utc>>,
    pub remind_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewManifestationRow<'a> {
    pub couple_id: Option<CoupleId>,
    pub author_id: UserId,
    pub kind: ManifestationKind,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub milestones: &'a [Milestone],
    pub target_date: Option<DateTime<Utc>>,
    pub remind_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct StoredReview {
    pub review_id: ReviewId,
    pub date_night_id: DateNightId,
    pub author_id: UserId,
    pub rating: u8,
    pub message: String,
    pub emoji: Option<String>,
    pub image_urls: Vec<String>,
    pub video_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewReviewRow<'a> {
    pub date_night_id: DateNightId,
    pub author_id: UserId,
    pub rating: u8,
    pub message: &'a str,
    pub emoji: Option<&'a str>,
    pub image_urls: &'a [String],
    pub video_urls: &'a [String],
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn create_user(
        &self,
        display_name: &str,
        email: &str,
        phone: &str,
        secondary_email: Option<&str>,
        password_hash: &str,
    ) -> Result<UserId> {
        let rec = sqlx::query(
            "INSERT INTO users (display_name, email, phone, secondary_email, password_hash)
             VALUES (?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(display_name)
        .bind(email)
        .bind(phone)
        .bind(secondary_email)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await?;
        Ok(UserId(rec.get::<i64, _>(0)))
    }

    pub async fn user_by_email(&self, email: &str) -> Result<Option<StoredUser>> {
        let row = sqlx::query(
            "SELECT id, display_name, email, phone, secondary_email, password_hash, created_at
             FROM users
             WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| read_user(&r)))
    }

    pub async fn user_by_id(&self, user_id: UserId) -> Result<Option<StoredUser>> {
        let row = sqlx::query(
            "SELECT id, display_name, email, phone, secondary_email, password_hash, created_at
             FROM users
             WHERE id = ?",
        )
        .bind(user_id.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| read_user(&r)))
    }

    pub async fn insert_invite(&self, code: &str, created_by: UserId) -> Result<InviteId> {
        let rec = sqlx::query("INSERT INTO invites (code, created_by) VALUES (?, ?) RETURNING id")
            .bind(code)
            .bind(created_by.0)
            .fetch_one(&self.pool)
            .await?;
        Ok(InviteId(rec.get::<i64, _>(0)))
    }

    pub async fn invite_by_code(&self, code: &str) -> Result<Option<StoredInvite>> {
        let row = sqlx::query(
            "SELECT id, code, created_by, status, created_at, used_at, used_by
             FROM invites
             WHERE code = ?",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| read_invite(&r)))
    }

    /// Flips an active invite to used exactly once; the status guard makes
    /// concurrent accepts race-safe.
    pub async fn mark_invite_used(&self, invite_id: InviteId, used_by: UserId) -> Result<bool> {
        let updated = sqlx::query(
            "UPDATE invites
             SET status = 'used', used_at = CURRENT_TIMESTAMP, used_by = ?
             WHERE id = ? AND status = 'active'",
        )
        .bind(used_by.0)
        .bind(invite_id.0)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(updated > 0)
    }

    pub async fn revoke_active_invites(&self, created_by: UserId) -> Result<u64> {
        let revoked = sqlx::query(
            "UPDATE invites SET status = 'revoked' WHERE created_by = ? AND status = 'active'",
        )
        .bind(created_by.0)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(revoked)
    }

    pub async fn delete_spent_invites(&self) -> Result<u64> {
        let deleted = sqlx::query("DELETE FROM invites WHERE status != 'active'")
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted)
    }

    pub async fn insert_couple(&self, user_a: UserId, user_b: UserId) -> Result<CoupleId> {
        let rec = sqlx::query("INSERT INTO couples (user_a, user_b) VALUES (?, ?) RETURNING id")
            .bind(user_a.0)
            .bind(user_b.0)
            .fetch_one(&self.pool)
            .await?;
        Ok(CoupleId(rec.get::<i64, _>(0)))
    }

    pub async fn couple_for_user(&self, user_id: UserId) -> Result<Option<StoredCouple>> {
        let row = sqlx::query(
            "SELECT id, user_a, user_b, paired_at
             FROM couples
             WHERE user_a = ? OR user_b = ?
             ORDER BY id DESC
             LIMIT 1",
        )
        .bind(user_id.0)
        .bind(user_id.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| StoredCouple {
            couple_id: CoupleId(r.get::<i64, _>(0)),
            user_a: UserId(r.get::<i64, _>(1)),
            user_b: UserId(r.get::<i64, _>(2)),
            paired_at: r.get::<DateTime<Utc>, _>(3),
        }))
    }

    pub async fn insert_manifestation(
        &self,
        row: NewManifestationRow<'_>,
        now: DateTime<Utc>,
    ) -> Result<ManifestationId> {
        let milestones_json = serde_json::to_string(row.milestones)?;
        let rec = sqlx::query(
            "INSERT INTO manifestations (couple_id, author_id, kind, title, description, milestones, target_date, remind_at, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(row.couple_id.map(|id| id.0))
        .bind(row.author_id.0)
        .bind(row.kind.as_str())
        .bind(row.title)
        .bind(row.description)
        .bind(milestones_json)
        .bind(row.target_date)
        .bind(row.remind_at)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(ManifestationId(rec.get::<i64, _>(0)))
    }

    pub async fn manifestation_by_id(
        &self,
        manifestation_id: ManifestationId,
    ) -> Result<Option<StoredManifestation>> {
        let row = sqlx::query(
            "SELECT id, couple_id, author_id, kind, title, description, milestones, target_date, remind_at, created_at, updated_at
             FROM manifestations
             WHERE id = ?",
        )
        .bind(manifestation_id.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| read_manifestation(&r)))
    }

    pub async fn list_manifestations_for_couple(
        &self,
        couple_id: CoupleId,
    ) -> Result<Vec<StoredManifestation>> {
        let rows = sqlx::query(
            "SELECT id, couple_id, author_id, kind, title, description, milestones, target_date, remind_at, created_at, updated_at
             FROM manifestations
             WHERE couple_id = ?
             ORDER BY created_at DESC, id DESC",
        )
        .bind(couple_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(read_manifestation).collect())
    }

    pub async fn list_manifestations_for_author(
        &self,
        author_id: UserId,
    ) -> Result<Vec<StoredManifestation>> {
        let rows = sqlx::query(
            "SELECT id, couple_id, author_id, kind, title, description, milestones, target_date, remind_at, created_at, updated_at
             FROM manifestations
             WHERE author_id = ? AND couple_id IS NULL
             ORDER BY created_at DESC, id DESC",
        )
        .bind(author_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(read_manifestation).collect())
    }

    pub async fn update_manifestation(
        &self,
        manifestation_id: ManifestationId,
        title: &str,
        description: Option<&str>,
        milestones: &[Milestone],
        target_date: Option<DateTime<Utc>>,
        remind_at: Option<DateTime<Utc>>,
        updated_at: DateTime<Utc>,
    ) -> Result<bool> {
        let milestones_json = serde_json::to_string(milestones)?;
        let updated = sqlx::query(
            "UPDATE manifestations
             SET title = ?, description = ?, milestones = ?, target_date = ?, remind_at = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(title)
        .bind(description)
        .bind(milestones_json)
        .bind(target_date)
        .bind(remind_at)
        .bind(updated_at)
        .bind(manifestation_id.0)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(updated > 0)
    }

    pub async fn delete_manifestation(&self, manifestation_id: ManifestationId) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM manifestations WHERE id = ?")
            .bind(manifestation_id.0)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }

    pub async fn list_due_reminders(
        &self,
        author_id: UserId,
        couple_id: Option<CoupleId>,
        before: DateTime<Utc>,
    ) -> Result<Vec<StoredManifestation>> {
        let rows = if let Some(couple_id) = couple_id {
            sqlx::query(
                "SELECT id, couple_id, author_id, kind, title, description, milestones, target_date, remind_at, created_at, updated_at
                 FROM manifestations
                 WHERE remind_at IS NOT NULL AND remind_at <= ? AND (author_id = ? OR couple_id = ?)
                 ORDER BY remind_at ASC, id ASC",
            )
            .bind(before)
            .bind(author_id.0)
            .bind(couple_id.0)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(
                "SELECT id, couple_id, author_id, kind, title, description, milestones, target_date, remind_at, created_at, updated_at
                 FROM manifestations
                 WHERE remind_at IS NOT NULL AND remind_at <= ? AND author_id = ?
                 ORDER BY remind_at ASC, id ASC",
            )
            .bind(before)
            .bind(author_id.0)
            .fetch_all(&self.pool)
            .await?
        };
        Ok(rows.iter().map(read_manifestation).collect())
    }

    pub async fn list_all_due_reminders(
        &self,
        before: DateTime<Utc>,
    ) -> Result<Vec<StoredManifestation>> {
        let rows = sqlx::query(
            "SELECT id, couple_id, author_id, kind, title, description, milestones, target_date, remind_at, created_at, updated_at
             FROM manifestations
             WHERE remind_at IS NOT NULL AND remind_at <= ?
             ORDER BY remind_at ASC, id ASC",
        )
        .bind(before)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(read_manifestation).collect())
    }

    pub async fn insert_review(
        &self,
        row: NewReviewRow<'_>,
        now: DateTime<Utc>,
    ) -> Result<ReviewId> {
        let image_urls_json = serde_json::to_string(row.image_urls)?;
        let video_urls_json = serde_json::to_string(row.video_urls)?;
        let rec = sqlx::query(
            "INSERT INTO reviews (date_night_id, author_id, rating, message, emoji, image_urls, video_urls, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(row.date_night_id.0)
        .bind(row.author_id.0)
        .bind(i64::from(row.rating))
        .bind(row.message)
        .bind(row.emoji)
        .bind(image_urls_json)
        .bind(video_urls_json)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(ReviewId(rec.get::<i64, _>(0)))
    }

    pub async fn review_by_id(&self, review_id: ReviewId) -> Result<Option<StoredReview>> {
        let row = sqlx::query(
            "SELECT id, date_night_id, author_id, rating, message, emoji, image_urls, video_urls, created_at, updated_at
             FROM reviews
             WHERE id = ?",
        )
        .bind(review_id.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| read_review(&r)))
    }

    pub async fn list_reviews_for_date_night(
        &self,
        date_night_id: DateNightId,
    ) -> Result<Vec<StoredReview>> {
        let rows = sqlx::query(
            "SELECT id, date_night_id, author_id, rating, message, emoji, image_urls, video_urls, created_at, updated_at
             FROM reviews
             WHERE date_night_id = ?
             ORDER BY created_at DESC, id DESC",
        )
        .bind(date_night_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(read_review).collect())
    }

    pub async fn update_review(
        &self,
        review_id: ReviewId,
        rating: u8,
        message: &str,
        emoji: Option<&str>,
        image_urls: &[String],
        video_urls: &[String],
        updated_at: DateTime<Utc>,
    ) -> Result<bool> {
        let image_urls_json = serde_json::to_string(image_urls)?;
        let video_urls_json = serde_json::to_string(video_urls)?;
        let updated = sqlx::query(
            "UPDATE reviews
             SET rating = ?, message = ?, emoji = ?, image_urls = ?, video_urls = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(i64::from(rating))
        .bind(message)
        .bind(emoji)
        .bind(image_urls_json)
        .bind(video_urls_json)
        .bind(updated_at)
        .bind(review_id.0)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(updated > 0)
    }

    pub async fn delete_review(&self, review_id: ReviewId) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM reviews WHERE id = ?")
            .bind(review_id.0)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }
}

fn read_user(r: &SqliteRow) -> StoredUser {
    StoredUser {
        user_id: UserId(r.get::<i64, _>(0)),
        display_name: r.get::<String, _>(1),
        email: r.get::<String, _>(2),
        phone: r.get::<String, _>(3),
        secondary_email: r.get::<Option<String>, _>(4),
        password_hash: r.get::<String, _>(5),
        created_at: r.get::<DateTime<Utc>, _>(6),
    }
}

fn read_invite(r: &SqliteRow) -> StoredInvite {
    let status = match r.get::<String, _>(3).as_str() {
        "active" => InviteStatus::Active,
        "used" => InviteStatus::Used,
        _ => InviteStatus::Revoked,
    };
    StoredInvite {
        invite_id: InviteId(r.get::<i64, _>(0)),
        code: r.get::<String, _>(1),
        created_by: UserId(r.get::<i64, _>(2)),
        status,
        created_at: r.get::<DateTime<Utc>, _>(4),
        used_at: r.get::<Option<DateTime<Utc>>, _>(5),
        used_by: r.get::<Option<i64>, _>(6).map(UserId),
    }
}

fn read_manifestation(r: &SqliteRow) -> StoredManifestation {
    let kind = match r.get::<String, _>(3).as_str() {
        "shared" => ManifestationKind::Shared,
        _ => ManifestationKind::Individual,
    };
    StoredManifestation {
        manifestation_id: ManifestationId(r.get::<i64, _>(0)),
        couple_id: r.get::<Option<i64>, _>(1).map(CoupleId),
        author_id: UserId(r.get::<i64, _>(2)),
        kind,
        title: r.get::<String, _>(4),
        description: r.get::<Option<String>, _>(5),
        milestones: serde_json::from_str(&r.get::<String, _>(6)).unwrap_or_default(),
        target_date: r.get::<Option<DateTime<Utc>>, _>(7),
        remind_at: r.get::<Option<DateTime<Utc>>, _>(8),
        created_at: r.get::<DateTime<Utc>, _>(9),
        updated_at: r.get::<DateTime<Utc>, _>(10),
    }
}

fn read_review(r: &SqliteRow) -> StoredReview {
    StoredReview {
        review_id: ReviewId(r.get::<i64, _>(0)),
        date_night_id: DateNightId(r.get::<i64, _>(1)),
        author_id: UserId(r.get::<i64, _>(2)),
        rating: r.get::<i64, _>(3).clamp(0, 255) as u8,
        message: r.get::<String, _>(4),
        emoji: r.get::<Option<String>, _>(5),
        image_urls: serde_json::from_str(&r.get::<String, _>(6)).unwrap_or_default(),
        video_urls: serde_json::from_str(&r.get::<String, _>(7)).unwrap_or_default(),
        created_at: r.get::<DateTime<Utc>, _>(8),
        updated_at: r.get::<DateTime<Utc>, _>(9),
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
