use chrono::{DateTime, Utc};
use shared::{
    domain::{ManifestationId, ManifestationKind, UserId},
    error::{ApiError, ErrorCode},
    protocol::{ManifestationPayload, ManifestationUpdate, NewManifestation},
};
use storage::{NewManifestationRow, StoredManifestation};

use crate::{internal, ApiContext};

pub async fn create_manifestation(
    ctx: &ApiContext,
    user_id: UserId,
    req: NewManifestation,
) -> Result<ManifestationPayload, ApiError> {
    let title = req.title.trim();
    if title.is_empty() {
        return Err(ApiError::new(ErrorCode::Validation, "title is required"));
    }

    let couple_id = match req.kind {
        ManifestationKind::Shared => {
            let couple = ctx
                .storage
                .couple_for_user(user_id)
                .await
                .map_err(internal)?
                .ok_or_else(|| {
                    ApiError::new(
                        ErrorCode::Validation,
                        "pair with a partner before creating a shared manifestation",
                    )
                })?;
            Some(couple.couple_id)
        }
        ManifestationKind::Individual => None,
    };

    let now = Utc::now();
    let manifestation_id = ctx
        .storage
        .insert_manifestation(
            NewManifestationRow {
                couple_id,
                author_id: user_id,
                kind: req.kind,
                title,
                description: req.description.as_deref().map(str::trim),
                milestones: &req.milestones,
                target_date: req.target_date,
                remind_at: req.remind_at,
            },
            now,
        )
        .await
        .map_err(internal)?;

    fetch_manifestation(ctx, user_id, manifestation_id).await
}

/// The caller's view: the couple's shared manifestations plus their own
/// individual ones, newest first.
pub async fn list_manifestations(
    ctx: &ApiContext,
    user_id: UserId,
) -> Result<Vec<ManifestationPayload>, ApiError> {
    let couple = ctx
        .storage
        .couple_for_user(user_id)
        .await
        .map_err(internal)?;

    let mut rows = match couple {
        Some(couple) => ctx
            .storage
            .list_manifestations_for_couple(couple.couple_id)
            .await
            .map_err(internal)?,
        None => Vec::new(),
    };
    rows.extend(
        ctx.storage
            .list_manifestations_for_author(user_id)
            .await
            .map_err(internal)?,
    );
    rows.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then(b.manifestation_id.0.cmp(&a.manifestation_id.0))
    });

    Ok(rows.into_iter().map(to_payload).collect())
}

pub async fn fetch_manifestation(
    ctx: &ApiContext,
    user_id: UserId,
    manifestation_id: ManifestationId,
) -> Result<ManifestationPayload, ApiError> {
    let stored = load_visible(ctx, user_id, manifestation_id).await?;
    Ok(to_payload(stored))
}

pub async fn update_manifestation(
    ctx: &ApiContext,
    user_id: UserId,
    manifestation_id: ManifestationId,
    req: ManifestationUpdate,
) -> Result<ManifestationPayload, ApiError> {
    let stored = load_visible(ctx, user_id, manifestation_id).await?;
    if stored.author_id != user_id {
        return Err(ApiError::new(
            ErrorCode::Forbidden,
            "only the author can change a manifestation",
        ));
    }

    let title = match &req.title {
        Some(title) => {
            let title = title.trim();
            if title.is_empty() {
                return Err(ApiError::new(ErrorCode::Validation, "title is required"));
            }
            title.to_string()
        }
        None => stored.title,
    };
    let description = req.description.or(stored.description);
    let milestones = req.milestones.unwrap_or(stored.milestones);
    let target_date = req.target_date.or(stored.target_date);
    let remind_at = req.remind_at.or(stored.remind_at);

    let updated = ctx
        .storage
        .update_manifestation(
            manifestation_id,
            &title,
            description.as_deref(),
            &milestones,
            target_date,
            remind_at,
            Utc::now(),
        )
        .await
        .map_err(internal)?;
    if !updated {
        return Err(ApiError::new(
            ErrorCode::NotFound,
            "manifestation not found",
        ));
    }

    fetch_manifestation(ctx, user_id, manifestation_id).await
}

pub async fn delete_manifestation(
    ctx: &ApiContext,
    user_id: UserId,
    manifestation_id: ManifestationId,
) -> Result<(), ApiError> {
    let stored = load_visible(ctx, user_id, manifestation_id).await?;
    if stored.author_id != user_id {
        return Err(ApiError::new(
            ErrorCode::Forbidden,
            "only the author can delete a manifestation",
        ));
    }

    ctx.storage
        .delete_manifestation(manifestation_id)
        .await
        .map_err(internal)?;
    Ok(())
}

pub async fn due_reminders(
    ctx: &ApiContext,
    user_id: UserId,
    before: DateTime<Utc>,
) -> Result<Vec<ManifestationPayload>, ApiError> {
    let couple = ctx
        .storage
        .couple_for_user(user_id)
        .await
        .map_err(internal)?;
    let rows = ctx
        .storage
        .list_due_reminders(user_id, couple.map(|c| c.couple_id), before)
        .await
        .map_err(internal)?;
    Ok(rows.into_iter().map(to_payload).collect())
}

/// Loads a manifestation the caller is allowed to see: their own, or one
/// shared with their couple. Anything else reads as not found.
async fn load_visible(
    ctx: &ApiContext,
    user_id: UserId,
    manifestation_id: ManifestationId,
) -> Result<StoredManifestation, ApiError> {
    let stored = ctx
        .storage
        .manifestation_by_id(manifestation_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::new(ErrorCode::NotFound, "manifestation not found"))?;

    if stored.author_id == user_id {
        return Ok(stored);
    }
    if let Some(couple_id) = stored.couple_id {
        let couple = ctx
            .storage
            .couple_for_user(user_id)
            .await
            .map_err(internal)?;
        if couple.map(|c| c.couple_id) == Some(couple_id) {
            return Ok(stored);
        }
    }
    Err(ApiError::new(
        ErrorCode::NotFound,
        "manifestation not found",
    ))
}

fn to_payload(stored: StoredManifestation) -> ManifestationPayload {
    ManifestationPayload {
        id: stored.manifestation_id,
        couple_id: stored.couple_id,
        author_id: stored.author_id,
        kind: stored.kind,
        title: stored.title,
        description: stored.description,
        milestones: stored.milestones,
        target_date: stored.target_date,
        remind_at: stored.remind_at,
        created_at: stored.created_at,
        updated_at: stored.updated_at,
    }
}

#[cfg(test)]
#[path = "tests/manifestations_tests.rs"]
mod tests;
