use rand::Rng;
use shared::{
    domain::UserId,
    error::{ApiError, ErrorCode},
    protocol::{InviteResponse, PairStatusResponse, PartnerSummary},
};

use crate::{internal, ApiContext};

pub const INVITE_CODE_PREFIX: &str = "LOVE-";
const INVITE_CODE_LEN: usize = 4;
const INVITE_CODE_CHARSET: [char; 36] = [
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S',
    'T', 'U', 'V', 'W', 'X', 'Y', 'Z', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9',
];

pub fn generate_invite_code() -> String {
    let mut rng = rand::thread_rng();
    let mut code = String::with_capacity(INVITE_CODE_PREFIX.len() + INVITE_CODE_LEN);
    code.push_str(INVITE_CODE_PREFIX);
    for _ in 0..INVITE_CODE_LEN {
        code.push(INVITE_CODE_CHARSET[rng.gen_range(0..INVITE_CODE_CHARSET.len())]);
    }
    code
}

/// Issues a fresh invite code for the caller, revoking any other code they
/// still have outstanding so only one can ever be redeemed.
pub async fn create_invite(ctx: &ApiContext, user_id: UserId) -> Result<InviteResponse, ApiError> {
    if ctx
        .storage
        .couple_for_user(user_id)
        .await
        .map_err(internal)?
        .is_some()
    {
        return Err(ApiError::new(
            ErrorCode::AlreadyPaired,
            "you are already paired with a partner",
        ));
    }

    ctx.storage
        .revoke_active_invites(user_id)
        .await
        .map_err(internal)?;

    // The 4-character space is small enough that collisions happen; retry a
    // few times before giving up.
    for _ in 0..8 {
        let code = generate_invite_code();
        if ctx
            .storage
            .invite_by_code(&code)
            .await
            .map_err(internal)?
            .is_some()
        {
            continue;
        }
        let invite_id = ctx
            .storage
            .insert_invite(&code, user_id)
            .await
            .map_err(internal)?;
        return Ok(InviteResponse { invite_id, code });
    }

    Err(ApiError::new(
        ErrorCode::Internal,
        "could not generate a unique invite code",
    ))
}

/// Redeems an invite code and pairs the caller with its creator. Each denial
/// carries its own code so the app can show a specific message.
pub async fn accept_invite(
    ctx: &ApiContext,
    user_id: UserId,
    code: &str,
) -> Result<PairStatusResponse, ApiError> {
    let code = code.trim().to_uppercase();

    let invite = ctx
        .storage
        .invite_by_code(&code)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::new(ErrorCode::InviteNotFound, "invite code not found"))?;

    if invite.status != shared::domain::InviteStatus::Active {
        return Err(ApiError::new(
            ErrorCode::InviteAlreadyUsed,
            "invite code has already been used",
        ));
    }
    if invite.created_by == user_id {
        return Err(ApiError::new(
            ErrorCode::InviteSelfUse,
            "you cannot accept your own invite code",
        ));
    }
    if ctx
        .storage
        .couple_for_user(user_id)
        .await
        .map_err(internal)?
        .is_some()
        || ctx
            .storage
            .couple_for_user(invite.created_by)
            .await
            .map_err(internal)?
            .is_some()
    {
        return Err(ApiError::new(
            ErrorCode::AlreadyPaired,
            "one of you is already paired",
        ));
    }

    let consumed = ctx
        .storage
        .mark_invite_used(invite.invite_id, user_id)
        .await
        .map_err(internal)?;
    if !consumed {
        return Err(ApiError::new(
            ErrorCode::InviteAlreadyUsed,
            "invite code has already been used",
        ));
    }

    ctx.storage
        .insert_couple(invite.created_by, user_id)
        .await
        .map_err(internal)?;

    pair_status(ctx, user_id).await
}

pub async fn pair_status(ctx: &ApiContext, user_id: UserId) -> Result<PairStatusResponse, ApiError> {
    let Some(couple) = ctx
        .storage
        .couple_for_user(user_id)
        .await
        .map_err(internal)?
    else {
        return Ok(PairStatusResponse {
            paired: false,
            partner: None,
        });
    };

    let partner_id = couple.partner_of(user_id);
    let partner = ctx
        .storage
        .user_by_id(partner_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::new(ErrorCode::NotFound, "partner account not found"))?;

    Ok(PairStatusResponse {
        paired: true,
        partner: Some(PartnerSummary {
            user_id: partner.user_id,
            display_name: partner.display_name,
        }),
    })
}

#[cfg(test)]
#[path = "tests/pairing_tests.rs"]
mod tests;
