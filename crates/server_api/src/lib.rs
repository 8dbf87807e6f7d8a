use shared::error::{ApiError, ErrorCode};
use storage::Storage;

pub mod accounts;
pub mod auth;
pub mod manifestations;
pub mod pairing;
pub mod reviews;

pub use auth::AuthConfig;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub auth: AuthConfig,
}

pub(crate) fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, err.to_string())
}
