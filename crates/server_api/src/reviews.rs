use chrono::Utc;
use shared::{
    domain::{DateNightId, ReviewId, UserId},
    error::{ApiError, ErrorCode},
    protocol::{NewReview, ReviewPayload, ReviewUpdate},
};
use storage::{NewReviewRow, StoredReview};

use crate::{internal, ApiContext};

pub async fn create_review(
    ctx: &ApiContext,
    user_id: UserId,
    req: NewReview,
) -> Result<ReviewPayload, ApiError> {
    validate_rating(req.rating)?;
    let message = req.message.trim();
    if message.is_empty() {
        return Err(ApiError::new(ErrorCode::Validation, "message is required"));
    }

    let review_id = ctx
        .storage
        .insert_review(
            NewReviewRow {
                date_night_id: req.date_night_id,
                author_id: user_id,
                rating: req.rating,
                message,
                emoji: req.emoji.as_deref(),
                image_urls: &req.image_urls,
                video_urls: &req.video_urls,
            },
            Utc::now(),
        )
        .await
        .map_err(internal)?;

    fetch_review(ctx, review_id).await
}

pub async fn list_reviews(
    ctx: &ApiContext,
    date_night_id: DateNightId,
) -> Result<Vec<ReviewPayload>, ApiError> {
    let rows = ctx
        .storage
        .list_reviews_for_date_night(date_night_id)
        .await
        .map_err(internal)?;
    Ok(rows.into_iter().map(to_payload).collect())
}

pub async fn fetch_review(ctx: &ApiContext, review_id: ReviewId) -> Result<ReviewPayload, ApiError> {
    let stored = ctx
        .storage
        .review_by_id(review_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::new(ErrorCode::NotFound, "review not found"))?;
    Ok(to_payload(stored))
}

pub async fn update_review(
    ctx: &ApiContext,
    user_id: UserId,
    review_id: ReviewId,
    req: ReviewUpdate,
) -> Result<ReviewPayload, ApiError> {
    let stored = load_owned(ctx, user_id, review_id).await?;

    let rating = req.rating.unwrap_or(stored.rating);
    validate_rating(rating)?;
    let message = match &req.message {
        Some(message) => {
            let message = message.trim();
            if message.is_empty() {
                return Err(ApiError::new(ErrorCode::Validation, "message is required"));
            }
            message.to_string()
        }
        None => stored.message,
    };
    let emoji = req.emoji.or(stored.emoji);
    let image_urls = req.image_urls.unwrap_or(stored.image_urls);
    let video_urls = req.video_urls.unwrap_or(stored.video_urls);

    let updated = ctx
        .storage
        .update_review(
            review_id,
            rating,
            &message,
            emoji.as_deref(),
            &image_urls,
            &video_urls,
            Utc::now(),
        )
        .await
        .map_err(internal)?;
    if !updated {
        return Err(ApiError::new(ErrorCode::NotFound, "review not found"));
    }

    fetch_review(ctx, review_id).await
}

pub async fn delete_review(
    ctx: &ApiContext,
    user_id: UserId,
    review_id: ReviewId,
) -> Result<(), ApiError> {
    load_owned(ctx, user_id, review_id).await?;
    ctx.storage
        .delete_review(review_id)
        .await
        .map_err(internal)?;
    Ok(())
}

async fn load_owned(
    ctx: &ApiContext,
    user_id: UserId,
    review_id: ReviewId,
) -> Result<StoredReview, ApiError> {
    let stored = ctx
        .storage
        .review_by_id(review_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::new(ErrorCode::NotFound, "review not found"))?;
    if stored.author_id != user_id {
        return Err(ApiError::new(
            ErrorCode::Forbidden,
            "only the author can change a review",
        ));
    }
    Ok(stored)
}

fn validate_rating(rating: u8) -> Result<(), ApiError> {
    if !(1..=5).contains(&rating) {
        return Err(ApiError::new(
            ErrorCode::Validation,
            "rating must be between 1 and 5",
        ));
    }
    Ok(())
}

fn to_payload(stored: StoredReview) -> ReviewPayload {
    ReviewPayload {
        id: stored.review_id,
        date_night_id: stored.date_night_id,
        author_id: stored.author_id,
        rating: stored.rating,
        message: stored.message,
        emoji: stored.emoji,
        image_urls: stored.image_urls,
        video_urls: stored.video_urls,
        created_at: stored.created_at,
        updated_at: stored.updated_at,
    }
}

#[cfg(test)]
#[path = "tests/reviews_tests.rs"]
mod tests;
