use axum::Json;
use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::error::ErrorReport;
use crate::application::repos::RepoError;
use crate::application::traces::WriteError;
use crate::application::window::WindowError;
use crate::domain::error::DomainError;

/// Seconds a client is asked to wait after the pool ran dry.
const POOL_RETRY_AFTER_SECS: u64 = 1;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const NOT_FOUND: &str = "not_found";
    pub const INVALID_BUNDLE: &str = "invalid_bundle";
    pub const INVALID_INPUT: &str = "invalid_input";
    pub const INTEGRITY: &str = "integrity_error";
    pub const DB_TIMEOUT: &str = "db_timeout";
    pub const POOL_EXHAUSTED: &str = "pool_exhausted";
    pub const REPO: &str = "repo_error";
    pub const WINDOW: &str = "window_error";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
    // Logged via the attached report; never sent to the client.
    detail: Option<String>,
    retry_after: Option<u64>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            hint,
            detail: None,
            retry_after: None,
        }
    }

    pub fn bad_request(message: &'static str, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message, hint)
    }

    pub fn not_found(message: &'static str) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message, None)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after = Some(seconds);
        self
    }
}

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        let detail = err.to_string();
        let api = match err {
            RepoError::PoolExhausted => ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                codes::POOL_EXHAUSTED,
                "Service is at capacity",
                Some(format!("Retry after {POOL_RETRY_AFTER_SECS} seconds")),
            )
            .with_retry_after(POOL_RETRY_AFTER_SECS),
            RepoError::Timeout => ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                codes::DB_TIMEOUT,
                "Database timeout",
                None,
            ),
            RepoError::InvalidInput { .. } => ApiError::new(
                StatusCode::BAD_REQUEST,
                codes::INVALID_INPUT,
                "Invalid input",
                None,
            ),
            RepoError::Integrity { .. } => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::INTEGRITY,
                "Integrity constraint violated",
                None,
            ),
            RepoError::Persistence(_) => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::REPO,
                "Persistence error",
                None,
            ),
        };
        api.with_detail(detail)
    }
}

impl From<WriteError> for ApiError {
    fn from(err: WriteError) -> Self {
        match err {
            WriteError::Validation(DomainError::Validation { message }) => {
                ApiError::new(
                    StatusCode::BAD_REQUEST,
                    codes::INVALID_BUNDLE,
                    "Trace bundle rejected",
                    Some(message.clone()),
                )
                .with_detail(message)
            }
            WriteError::Repo(repo) => ApiError::from(repo),
        }
    }
}

impl From<WindowError> for ApiError {
    fn from(err: WindowError) -> Self {
        match err {
            WindowError::Repo(repo) => ApiError::from(repo),
            other => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::WINDOW,
                "Trace window unavailable",
                None,
            )
            .with_detail(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let detail = self
            .detail
            .clone()
            .or_else(|| self.hint.clone())
            .unwrap_or_else(|| self.message.to_string());
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        if let Some(seconds) = self.retry_after
            && let Ok(value) = HeaderValue::from_str(&seconds.to_string())
        {
            response.headers_mut().insert(RETRY_AFTER, value);
        }
        ErrorReport::from_message(
            "infra::http::error",
            self.status,
            format!("{}: {detail}", self.code),
        )
        .attach(&mut response);
        response
    }
}
