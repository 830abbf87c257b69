//! HTTP client for the plant-identification backend.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every screen of the app talks to the backend through `PlantApi`. Form input
//! is validated before a request is built, authenticated calls ask
//! `SessionGuard` for a bearer token first, and a `401` from the backend deletes
//! the stored token so the next gate check sends the user back to login.
//!
//! TRADE-OFFS
//! ==========
//! Response bodies other than favorites stay as `serde_json::Value`; the
//! backend owns their shape and callers only print them.

pub mod types;

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::config::ClientConfig;
use crate::session::{SessionGuard, Token, TokenClaims};
use crate::store::StoreError;
use crate::validation::{FormFields, FormValidation, ValidationPolicy};

use self::types::{Favorite, FavoriteRecord, LoginRequest, LoginResponse, SignupRequest, error_message};

const IDENTIFY_FILE_NAME: &str = "plant_photo.jpg";
const IDENTIFY_MIME: &str = "image/jpeg";
const FALLBACK_FAILURE: &str = "Please try again.";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Form input failed a rule; nothing was sent.
    #[error("{0}")]
    Validation(FormValidation),
    /// No usable session; nothing was sent.
    #[error("authentication required; please log in to use this feature")]
    SessionRequired,
    /// The backend answered `401`. The stored token has been cleared.
    #[error("session expired; please log in again")]
    Unauthorized,
    /// Login or signup refused by the backend, with its message.
    #[error("{0}")]
    Rejected(String),
    #[error("server returned HTTP {status}: {message}")]
    Server { status: u16, message: String },
    #[error("missing expected field `{0}`")]
    MissingField(&'static str),
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to read {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("timestamp formatting failed: {0}")]
    Timestamp(#[from] time::error::Format),
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
    #[error("invalid backend URL: {0}")]
    InvalidUrl(String),
}

/// What `resume_or_login` did.
#[derive(Debug)]
pub enum LoginOutcome {
    /// A usable session was already stored; the backend was not contacted.
    Resumed(TokenClaims),
    LoggedIn(Token),
}

#[derive(Clone)]
pub struct PlantApi {
    http: reqwest::Client,
    base_url: Url,
    session: SessionGuard,
    policy: ValidationPolicy,
}

impl PlantApi {
    pub fn new(config: &ClientConfig, session: SessionGuard) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| ApiError::HttpClientBuild(e.to_string()))?;
        let base_url = Url::parse(&config.api_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {e}", config.api_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(config.api_url.clone()));
        }
        Ok(Self {
            http,
            base_url,
            session,
            policy: ValidationPolicy::default(),
        })
    }

    #[must_use]
    pub fn with_policy(mut self, policy: ValidationPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn session(&self) -> &SessionGuard {
        &self.session
    }

    // =========================================================================
    // ACCOUNT
    // =========================================================================

    /// Create an account. Does not log in; the caller continues to `login`.
    pub async fn signup(&self, name: &str, email: &str, password: &str) -> Result<(), ApiError> {
        self.check_form(&FormFields::signup(name, email, password))?;

        let now = OffsetDateTime::now_utc().format(&Rfc3339)?;
        let body = SignupRequest { name, email, password, created_at: now.clone(), updated_at: now };
        let response = self
            .http
            .post(self.url(&["users", "create_user"])?)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let value = read_json(response).await;

        if !status.is_success() {
            tracing::info!(status = status.as_u16(), "signup rejected");
            return Err(rejected(&value, "message"));
        }
        tracing::info!(email, "account created");
        Ok(())
    }

    /// Exchange credentials for a token and persist it. The token is stored
    /// only after the backend accepts the credentials.
    pub async fn login(&self, email: &str, password: &str) -> Result<Token, ApiError> {
        self.check_form(&FormFields::login(email, password))?;

        let response = self
            .http
            .post(self.url(&["users", "login"])?)
            .json(&LoginRequest { email, password })
            .send()
            .await?;
        let status = response.status();
        let value = read_json(response).await;

        if !status.is_success() {
            tracing::info!(status = status.as_u16(), "login rejected");
            return Err(rejected(&value, "detail"));
        }

        let login = serde_json::from_value::<LoginResponse>(value)
            .map_err(|_| ApiError::MissingField("access_token"))?;
        let token = Token::new(login.access_token);
        self.session.store(&token).await?;
        Ok(token)
    }

    /// Keep a still-valid stored session, otherwise `login`.
    pub async fn resume_or_login(&self, email: &str, password: &str) -> Result<LoginOutcome, ApiError> {
        if let Some(claims) = self.session.claims().await? {
            tracing::info!(exp = claims.exp, "session already active; skipping login");
            return Ok(LoginOutcome::Resumed(claims));
        }
        Ok(LoginOutcome::LoggedIn(self.login(email, password).await?))
    }

    pub async fn logout(&self) -> Result<(), ApiError> {
        self.session.clear().await?;
        tracing::info!("logged out");
        Ok(())
    }

    // =========================================================================
    // PLANTS
    // =========================================================================

    /// Recently identified plants, as returned by the backend.
    pub async fn recents(&self) -> Result<Value, ApiError> {
        let request = self.authorized(Method::GET, &["plant", "get_recents"]).await?;
        self.send_authorized(request).await
    }

    pub async fn favorites(&self) -> Result<Vec<Favorite>, ApiError> {
        let request = self.authorized(Method::GET, &["plant", "favorite", "get_all"]).await?;
        let value = self.send_authorized(request).await?;
        if value.is_null() {
            return Ok(Vec::new());
        }
        let records = serde_json::from_value::<Vec<FavoriteRecord>>(value)?;
        Ok(records.into_iter().map(Favorite::from).collect())
    }

    pub async fn remove_favorite(&self, id: &str) -> Result<(), ApiError> {
        let request = self
            .authorized(Method::DELETE, &["plant", "favorite", "remove", id])
            .await?;
        self.send_authorized(request).await?;
        tracing::info!(id, "favorite removed");
        Ok(())
    }

    /// Upload an image for identification and return the analysis.
    pub async fn identify(&self, image: &Path) -> Result<Value, ApiError> {
        let request = self.authorized(Method::POST, &["plant"]).await?;
        let bytes = tokio::fs::read(image)
            .await
            .map_err(|source| ApiError::Io { path: image.to_path_buf(), source })?;
        let part = Part::bytes(bytes)
            .file_name(IDENTIFY_FILE_NAME)
            .mime_str(IDENTIFY_MIME)?;
        let value = self
            .send_authorized(request.multipart(Form::new().part("file", part)))
            .await?;
        tracing::info!(image = %image.display(), "image identified");
        Ok(value)
    }

    // =========================================================================
    // PLUMBING
    // =========================================================================

    /// Endpoint URL under the base path. Each segment is percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn check_form(&self, fields: &FormFields<'_>) -> Result<(), ApiError> {
        let report = self.policy.validate(fields);
        if report.valid {
            return Ok(());
        }
        tracing::debug!(%report, "form rejected before submit");
        Err(ApiError::Validation(report))
    }

    /// Build a request carrying the session's bearer token.
    async fn authorized(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, ApiError> {
        let Some(token) = self.session.bearer().await? else {
            return Err(ApiError::SessionRequired);
        };
        Ok(self
            .http
            .request(method, self.url(segments)?)
            .bearer_auth(token.as_str()))
    }

    async fn send_authorized(&self, request: RequestBuilder) -> Result<Value, ApiError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            tracing::info!("backend rejected session token; clearing");
            self.session.clear().await?;
            return Err(ApiError::Unauthorized);
        }

        let value = read_json(response).await;
        if !status.is_success() {
            return Err(ApiError::Server {
                status: status.as_u16(),
                message: error_message(&value, "message")
                    .or_else(|| error_message(&value, "detail"))
                    .unwrap_or_else(|| value.to_string()),
            });
        }
        Ok(value)
    }
}

async fn read_json(response: Response) -> Value {
    response
        .json::<Value>()
        .await
        .unwrap_or_else(|_| Value::Null)
}

fn rejected(body: &Value, key: &str) -> ApiError {
    ApiError::Rejected(error_message(body, key).unwrap_or_else(|| FALLBACK_FAILURE.to_owned()))
}
