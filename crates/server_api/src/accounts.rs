use shared::{
    error::{ApiError, ErrorCode},
    protocol::{SessionResponse, SigninRequest, SignupRequest},
    validate::{email_is_valid, normalize_phone},
};

use crate::{auth::mint_access_token, internal, ApiContext};

/// Creates an account and signs the new user in. Field rules mirror the
/// signup screen so a hand-crafted request cannot bypass them.
pub async fn create_account(
    ctx: &ApiContext,
    req: SignupRequest,
) -> Result<SessionResponse, ApiError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::new(ErrorCode::Validation, "name is required"));
    }

    let email = req.email.trim();
    if !email_is_valid(email) {
        return Err(ApiError::new(
            ErrorCode::Validation,
            "enter a valid email address",
        ));
    }

    if req.password.len() < 6 {
        return Err(ApiError::new(
            ErrorCode::Validation,
            "password must be at least 6 characters",
        ));
    }

    let Some(phone) = normalize_phone(req.phone.trim()) else {
        return Err(ApiError::new(
            ErrorCode::Validation,
            "enter a valid phone number",
        ));
    };

    let secondary_email = match req.secondary_email.as_deref().map(str::trim) {
        Some("") | None => None,
        Some(secondary) if email_is_valid(secondary) => Some(secondary.to_string()),
        Some(_) => {
            return Err(ApiError::new(
                ErrorCode::Validation,
                "enter a valid secondary email address",
            ))
        }
    };

    if ctx
        .storage
        .user_by_email(email)
        .await
        .map_err(internal)?
        .is_some()
    {
        return Err(ApiError::new(
            ErrorCode::Conflict,
            "email already registered",
        ));
    }

    let password_hash = hash_password(&req.password)?;
    let user_id = ctx
        .storage
        .create_user(
            name,
            email,
            &phone,
            secondary_email.as_deref(),
            &password_hash,
        )
        .await
        .map_err(internal)?;

    let access_token = mint_access_token(&ctx.auth, user_id)
        .map_err(|e| ApiError::new(ErrorCode::Internal, format!("token mint failed: {e}")))?;

    Ok(SessionResponse {
        user_id,
        access_token,
        display_name: name.to_string(),
    })
}

pub async fn sign_in(ctx: &ApiContext, req: SigninRequest) -> Result<SessionResponse, ApiError> {
    // One message for both unknown email and bad password.
    let denied = || ApiError::new(ErrorCode::Unauthorized, "incorrect email or password");

    let user = ctx
        .storage
        .user_by_email(req.email.trim())
        .await
        .map_err(internal)?
        .ok_or_else(denied)?;

    let verified = argon2::verify_encoded(&user.password_hash, req.password.as_bytes())
        .map_err(|e| ApiError::new(ErrorCode::Internal, format!("hash verify failed: {e}")))?;
    if !verified {
        return Err(denied());
    }

    let access_token = mint_access_token(&ctx.auth, user.user_id)
        .map_err(|e| ApiError::new(ErrorCode::Internal, format!("token mint failed: {e}")))?;

    Ok(SessionResponse {
        user_id: user.user_id,
        access_token,
        display_name: user.display_name,
    })
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt: [u8; 16] = rand::random();
    argon2::hash_encoded(password.as_bytes(), &salt, &argon2::Config::default())
        .map_err(|e| ApiError::new(ErrorCode::Internal, format!("hash failed: {e}")))
}

#[cfg(test)]
#[path = "tests/accounts_tests.rs"]
mod tests;
