use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use shared::{
    domain::{DateNightId, ManifestationId, ReviewId},
    error::{ApiError, ApiException, ErrorCode},
    protocol::{
        AcceptInviteRequest, InviteResponse, ManifestationPayload, ManifestationUpdate,
        NewManifestation, NewReview, PairStatusResponse, ReviewPayload, ReviewUpdate,
        SessionResponse, SigninRequest, SignupRequest,
    },
};
use url::Url;

pub mod feed;
pub mod pairing;
pub mod picker;
pub mod signup;

/// HTTP client for the couples server. Remembers the access token handed out
/// by `signup`/`signin` and attaches it as a bearer header afterwards.
#[derive(Debug, Clone)]
pub struct AppClient {
    http: Client,
    server_url: String,
    access_token: Option<String>,
}

impl AppClient {
    pub fn new(server_url: impl Into<String>) -> Result<Self, ApiException> {
        let server_url = server_url.into();
        let parsed = Url::parse(&server_url).map_err(|err| {
            ApiException::new(ErrorCode::Validation, format!("invalid server url: {err}"))
        })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ApiException::new(
                ErrorCode::Validation,
                "server url must start with http:// or https://",
            ));
        }
        Ok(Self {
            http: Client::new(),
            server_url: server_url.trim_end_matches('/').to_string(),
            access_token: None,
        })
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    /// Reuses a token from an earlier session instead of signing in again.
    pub fn set_access_token(&mut self, token: impl Into<String>) {
        self.access_token = Some(token.into());
    }

    pub async fn signup(&mut self, request: &SignupRequest) -> Result<SessionResponse, ApiException> {
        let url = format!("{}/auth/signup", self.server_url);
        let session: SessionResponse = recv_json(self.http.post(url).json(request)).await?;
        self.access_token = Some(session.access_token.clone());
        Ok(session)
    }

    pub async fn signin(&mut self, email: &str, password: &str) -> Result<SessionResponse, ApiException> {
        let url = format!("{}/auth/signin", self.server_url);
        let request = SigninRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let session: SessionResponse = recv_json(self.http.post(url).json(&request)).await?;
        self.access_token = Some(session.access_token.clone());
        Ok(session)
    }

    pub async fn create_invite(&self) -> Result<InviteResponse, ApiException> {
        let url = format!("{}/pair/invite", self.server_url);
        recv_json(self.authed(self.http.post(url))?).await
    }

    pub async fn accept_invite(&self, code: &str) -> Result<PairStatusResponse, ApiException> {
        let url = format!("{}/pair/accept", self.server_url);
        let request = AcceptInviteRequest {
            code: code.to_string(),
        };
        recv_json(self.authed(self.http.post(url))?.json(&request)).await
    }

    pub async fn pair_status(&self) -> Result<PairStatusResponse, ApiException> {
        let url = format!("{}/pair/status", self.server_url);
        recv_json(self.authed(self.http.get(url))?).await
    }

    pub async fn create_manifestation(
        &self,
        request: &NewManifestation,
    ) -> Result<ManifestationPayload, ApiException> {
        let url = format!("{}/manifestations", self.server_url);
        recv_json(self.authed(self.http.post(url))?.json(request)).await
    }

    pub async fn list_manifestations(&self) -> Result<Vec<ManifestationPayload>, ApiException> {
        let url = format!("{}/manifestations", self.server_url);
        recv_json(self.authed(self.http.get(url))?).await
    }

    /// Manifestations whose reminder time falls on or before `before`.
    pub async fn due_manifestations(
        &self,
        before: DateTime<Utc>,
    ) -> Result<Vec<ManifestationPayload>, ApiException> {
        let url = format!("{}/manifestations/due", self.server_url);
        let builder = self
            .authed(self.http.get(url))?
            .query(&[("before", before.to_rfc3339())]);
        recv_json(builder).await
    }

    pub async fn fetch_manifestation(
        &self,
        id: ManifestationId,
    ) -> Result<ManifestationPayload, ApiException> {
        let url = format!("{}/manifestations/{}", self.server_url, id.0);
        recv_json(self.authed(self.http.get(url))?).await
    }

    pub async fn update_manifestation(
        &self,
        id: ManifestationId,
        update: &ManifestationUpdate,
    ) -> Result<ManifestationPayload, ApiException> {
        let url = format!("{}/manifestations/{}", self.server_url, id.0);
        recv_json(self.authed(self.http.put(url))?.json(update)).await
    }

    pub async fn delete_manifestation(&self, id: ManifestationId) -> Result<(), ApiException> {
        let url = format!("{}/manifestations/{}", self.server_url, id.0);
        recv_unit(self.authed(self.http.delete(url))?).await
    }

    pub async fn create_review(&self, request: &NewReview) -> Result<ReviewPayload, ApiException> {
        let url = format!("{}/reviews", self.server_url);
        recv_json(self.authed(self.http.post(url))?.json(request)).await
    }

    /// Reviews for one date night, newest first.
    pub async fn reviews_for_date_night(
        &self,
        date_night_id: DateNightId,
    ) -> Result<Vec<ReviewPayload>, ApiException> {
        let url = format!("{}/reviews/date-night/{}", self.server_url, date_night_id.0);
        recv_json(self.authed(self.http.get(url))?).await
    }

    pub async fn fetch_review(&self, id: ReviewId) -> Result<ReviewPayload, ApiException> {
        let url = format!("{}/reviews/{}", self.server_url, id.0);
        recv_json(self.authed(self.http.get(url))?).await
    }

    pub async fn update_review(
        &self,
        id: ReviewId,
        update: &ReviewUpdate,
    ) -> Result<ReviewPayload, ApiException> {
        let url = format!("{}/reviews/{}", self.server_url, id.0);
        recv_json(self.authed(self.http.put(url))?.json(update)).await
    }

    pub async fn delete_review(&self, id: ReviewId) -> Result<(), ApiException> {
        let url = format!("{}/reviews/{}", self.server_url, id.0);
        recv_unit(self.authed(self.http.delete(url))?).await
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder, ApiException> {
        let token = self.access_token.as_deref().ok_or_else(|| {
            ApiException::new(ErrorCode::Unauthorized, "sign in before calling this endpoint")
        })?;
        Ok(builder.bearer_auth(token))
    }
}

async fn recv_json<T: DeserializeOwned>(builder: reqwest::RequestBuilder) -> Result<T, ApiException> {
    let response = builder.send().await.map_err(transport_error)?;
    if !response.status().is_success() {
        return Err(error_from_response(response).await);
    }
    response.json::<T>().await.map_err(|err| {
        ApiException::new(
            ErrorCode::Internal,
            format!("malformed server response: {err}"),
        )
    })
}

async fn recv_unit(builder: reqwest::RequestBuilder) -> Result<(), ApiException> {
    let response = builder.send().await.map_err(transport_error)?;
    if !response.status().is_success() {
        return Err(error_from_response(response).await);
    }
    Ok(())
}

/// Failed responses carry an `ApiError` body; its message is surfaced as-is.
/// Anything else collapses to the status line.
async fn error_from_response(response: reqwest::Response) -> ApiException {
    let status = response.status();
    match response.json::<ApiError>().await {
        Ok(error) => error.into(),
        Err(_) => ApiException::new(ErrorCode::Internal, format!("server returned {status}")),
    }
}

fn transport_error(err: reqwest::Error) -> ApiException {
    ApiException::new(ErrorCode::Internal, format!("request failed: {err}"))
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
