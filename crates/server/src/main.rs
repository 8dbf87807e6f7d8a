use std::net::SocketAddr;

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query, State},
    http::{header, request::Parts, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use server_api::{
    accounts, auth::verify_access_token, manifestations, pairing, reviews, ApiContext, AuthConfig,
};
use shared::{
    domain::{DateNightId, ManifestationId, ReviewId, UserId},
    error::{ApiError, ErrorCode},
    protocol::{
        AcceptInviteRequest, InviteResponse, ManifestationPayload, ManifestationUpdate,
        NewManifestation, NewReview, PairStatusResponse, ReviewPayload, ReviewUpdate,
        SessionResponse, SigninRequest, SignupRequest,
    },
};
use storage::Storage;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info};

mod config;

use config::{load_settings, prepare_database_url};

const MAX_BODY_BYTES: usize = 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    let api = ApiContext {
        storage,
        auth: AuthConfig {
            token_secret: settings.token_secret,
            token_ttl_seconds: settings.token_ttl_seconds,
        },
    };
    let app = build_router(api);

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(api: ApiContext) -> Router {
    let review_routes = Router::new()
        .route("/", post(http_create_review))
        .route("/date-night/:date_night_id", get(http_list_reviews))
        .route(
            "/:review_id",
            get(http_fetch_review)
                .put(http_update_review)
                .delete(http_delete_review),
        );

    Router::new()
        .route("/healthz", get(healthz))
        .route("/auth/signup", post(http_signup))
        .route("/auth/signin", post(http_signin))
        .route("/pair/invite", post(http_create_invite))
        .route("/pair/accept", post(http_accept_invite))
        .route("/pair/status", get(http_pair_status))
        .route(
            "/manifestations",
            post(http_create_manifestation).get(http_list_manifestations),
        )
        .route("/manifestations/due", get(http_due_manifestations))
        .route(
            "/manifestations/:manifestation_id",
            get(http_fetch_manifestation)
                .put(http_update_manifestation)
                .delete(http_delete_manifestation),
        )
        .nest("/reviews", review_routes)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(api)
}

fn error_response(err: ApiError) -> (StatusCode, Json<ApiError>) {
    let status = match err.code {
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::Forbidden | ErrorCode::InviteSelfUse => StatusCode::FORBIDDEN,
        ErrorCode::NotFound | ErrorCode::InviteNotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Conflict | ErrorCode::InviteAlreadyUsed | ErrorCode::AlreadyPaired => {
            StatusCode::CONFLICT
        }
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(err))
}

/// Caller identity taken from the `Authorization: Bearer` header.
struct AuthedUser(UserId);

#[async_trait]
impl FromRequestParts<ApiContext> for AuthedUser {
    type Rejection = (StatusCode, Json<ApiError>);

    async fn from_request_parts(
        parts: &mut Parts,
        api: &ApiContext,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| {
                error_response(ApiError::new(
                    ErrorCode::Unauthorized,
                    "missing bearer token",
                ))
            })?;
        let user_id = verify_access_token(&api.auth, token).map_err(error_response)?;
        Ok(Self(user_id))
    }
}

#[derive(Debug, Deserialize)]
struct DueQuery {
    before: Option<DateTime<Utc>>,
}

async fn healthz(
    State(api): State<ApiContext>,
) -> Result<&'static str, (StatusCode, Json<ApiError>)> {
    api.storage
        .health_check()
        .await
        .map_err(|e| error_response(ApiError::new(ErrorCode::Internal, e.to_string())))?;
    Ok("ok")
}

async fn http_signup(
    State(api): State<ApiContext>,
    Json(req): Json<SignupRequest>,
) -> Result<Json<SessionResponse>, (StatusCode, Json<ApiError>)> {
    let session = accounts::create_account(&api, req)
        .await
        .map_err(error_response)?;
    Ok(Json(session))
}

async fn http_signin(
    State(api): State<ApiContext>,
    Json(req): Json<SigninRequest>,
) -> Result<Json<SessionResponse>, (StatusCode, Json<ApiError>)> {
    let session = accounts::sign_in(&api, req).await.map_err(error_response)?;
    Ok(Json(session))
}

async fn http_create_invite(
    State(api): State<ApiContext>,
    AuthedUser(user_id): AuthedUser,
) -> Result<Json<InviteResponse>, (StatusCode, Json<ApiError>)> {
    let invite = pairing::create_invite(&api, user_id)
        .await
        .map_err(error_response)?;
    Ok(Json(invite))
}

async fn http_accept_invite(
    State(api): State<ApiContext>,
    AuthedUser(user_id): AuthedUser,
    Json(req): Json<AcceptInviteRequest>,
) -> Result<Json<PairStatusResponse>, (StatusCode, Json<ApiError>)> {
    let status = pairing::accept_invite(&api, user_id, &req.code)
        .await
        .map_err(error_response)?;
    Ok(Json(status))
}

async fn http_pair_status(
    State(api): State<ApiContext>,
    AuthedUser(user_id): AuthedUser,
) -> Result<Json<PairStatusResponse>, (StatusCode, Json<ApiError>)> {
    let status = pairing::pair_status(&api, user_id)
        .await
        .map_err(error_response)?;
    Ok(Json(status))
}

async fn http_create_manifestation(
    State(api): State<ApiContext>,
    AuthedUser(user_id): AuthedUser,
    Json(req): Json<NewManifestation>,
) -> Result<Json<ManifestationPayload>, (StatusCode, Json<ApiError>)> {
    let created = manifestations::create_manifestation(&api, user_id, req)
        .await
        .map_err(error_response)?;
    Ok(Json(created))
}

async fn http_list_manifestations(
    State(api): State<ApiContext>,
    AuthedUser(user_id): AuthedUser,
) -> Result<Json<Vec<ManifestationPayload>>, (StatusCode, Json<ApiError>)> {
    let listed = manifestations::list_manifestations(&api, user_id)
        .await
        .map_err(error_response)?;
    Ok(Json(listed))
}

async fn http_due_manifestations(
    State(api): State<ApiContext>,
    AuthedUser(user_id): AuthedUser,
    Query(q): Query<DueQuery>,
) -> Result<Json<Vec<ManifestationPayload>>, (StatusCode, Json<ApiError>)> {
    let before = q.before.unwrap_or_else(Utc::now);
    let due = manifestations::due_reminders(&api, user_id, before)
        .await
        .map_err(error_response)?;
    Ok(Json(due))
}

async fn http_fetch_manifestation(
    State(api): State<ApiContext>,
    AuthedUser(user_id): AuthedUser,
    Path(manifestation_id): Path<i64>,
) -> Result<Json<ManifestationPayload>, (StatusCode, Json<ApiError>)> {
    let fetched =
        manifestations::fetch_manifestation(&api, user_id, ManifestationId(manifestation_id))
            .await
            .map_err(error_response)?;
    Ok(Json(fetched))
}

async fn http_update_manifestation(
    State(api): State<ApiContext>,
    AuthedUser(user_id): AuthedUser,
    Path(manifestation_id): Path<i64>,
    Json(req): Json<ManifestationUpdate>,
) -> Result<Json<ManifestationPayload>, (StatusCode, Json<ApiError>)> {
    let updated =
        manifestations::update_manifestation(&api, user_id, ManifestationId(manifestation_id), req)
            .await
            .map_err(error_response)?;
    Ok(Json(updated))
}

async fn http_delete_manifestation(
    State(api): State<ApiContext>,
    AuthedUser(user_id): AuthedUser,
    Path(manifestation_id): Path<i64>,
) -> Result<StatusCode, (StatusCode, Json<ApiError>)> {
    manifestations::delete_manifestation(&api, user_id, ManifestationId(manifestation_id))
        .await
        .map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn http_create_review(
    State(api): State<ApiContext>,
    AuthedUser(user_id): AuthedUser,
    Json(req): Json<NewReview>,
) -> Result<Json<ReviewPayload>, (StatusCode, Json<ApiError>)> {
    let created = reviews::create_review(&api, user_id, req)
        .await
        .map_err(error_response)?;
    Ok(Json(created))
}

async fn http_list_reviews(
    State(api): State<ApiContext>,
    AuthedUser(_user_id): AuthedUser,
    Path(date_night_id): Path<i64>,
) -> Result<Json<Vec<ReviewPayload>>, (StatusCode, Json<ApiError>)> {
    let listed = reviews::list_reviews(&api, DateNightId(date_night_id))
        .await
        .map_err(error_response)?;
    Ok(Json(listed))
}

async fn http_fetch_review(
    State(api): State<ApiContext>,
    AuthedUser(_user_id): AuthedUser,
    Path(review_id): Path<i64>,
) -> Result<Json<ReviewPayload>, (StatusCode, Json<ApiError>)> {
    let fetched = reviews::fetch_review(&api, ReviewId(review_id))
        .await
        .map_err(error_response)?;
    Ok(Json(fetched))
}

async fn http_update_review(
    State(api): State<ApiContext>,
    AuthedUser(user_id): AuthedUser,
    Path(review_id): Path<i64>,
    Json(req): Json<ReviewUpdate>,
) -> Result<Json<ReviewPayload>, (StatusCode, Json<ApiError>)> {
    let updated = reviews::update_review(&api, user_id, ReviewId(review_id), req)
        .await
        .map_err(error_response)?;
    Ok(Json(updated))
}

async fn http_delete_review(
    State(api): State<ApiContext>,
    AuthedUser(user_id): AuthedUser,
    Path(review_id): Path<i64>,
) -> Result<StatusCode, (StatusCode, Json<ApiError>)> {
    reviews::delete_review(&api, user_id, ReviewId(review_id))
        .await
        .map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
