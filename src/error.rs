// HTTP API Error Types
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

use crate::database::StoreError;

/// Every failure the pipeline can report, each mapped to exactly one response class
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),

    // 422 Unprocessable Entity
    ValidationFailed {
        field_errors: HashMap<String, String>,
    },

    // 401 Unauthorized
    InvalidCredential,
    InvalidLogin,
    AuthenticationRequired,

    // 403 Forbidden
    InactiveAccount,
    NotPermitted,

    // 404 Not Found
    ResourceNotFound,

    // 405 Method Not Allowed
    MethodNotAllowed,

    // 409 Conflict
    EditConflict,

    // 429 Too Many Requests
    RateLimited { retry_after: Duration },

    // 500 Internal Server Error
    Timeout,
    ServerFault,
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::ValidationFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::InvalidCredential
            | ApiError::InvalidLogin
            | ApiError::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            ApiError::InactiveAccount | ApiError::NotPermitted => StatusCode::FORBIDDEN,
            ApiError::ResourceNotFound => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::EditConflict => StatusCode::CONFLICT,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Timeout | ApiError::ServerFault => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::ValidationFailed { .. } => "the request failed validation",
            ApiError::InvalidCredential => "invalid or missing authentication token",
            ApiError::InvalidLogin => "invalid authentication credentials",
            ApiError::AuthenticationRequired => "you must be authenticated to access this resource",
            ApiError::InactiveAccount => {
                "your user account must be activated to access this resource"
            }
            ApiError::NotPermitted => {
                "your user account doesn't have the necessary permissions to access this resource"
            }
            ApiError::ResourceNotFound => "the requested resource could not be found",
            ApiError::MethodNotAllowed => "the request method is not supported for this resource",
            ApiError::EditConflict => {
                "unable to update the record due to an edit conflict, please try again"
            }
            ApiError::RateLimited { .. } => "rate limit exceeded",
            ApiError::Timeout => "the server timed out while processing your request",
            ApiError::ServerFault => {
                "the server encountered a problem and could not process your request"
            }
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationFailed { .. } => "VALIDATION_FAILED",
            ApiError::InvalidCredential => "INVALID_CREDENTIAL",
            ApiError::InvalidLogin => "INVALID_LOGIN",
            ApiError::AuthenticationRequired => "AUTHENTICATION_REQUIRED",
            ApiError::InactiveAccount => "INACTIVE_ACCOUNT",
            ApiError::NotPermitted => "NOT_PERMITTED",
            ApiError::ResourceNotFound => "NOT_FOUND",
            ApiError::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            ApiError::EditConflict => "EDIT_CONFLICT",
            ApiError::RateLimited { .. } => "RATE_LIMITED",
            ApiError::Timeout => "TIMEOUT",
            ApiError::ServerFault => "SERVER_FAULT",
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "error": true,
            "message": self.message(),
            "code": self.error_code()
        });

        if let ApiError::ValidationFailed { field_errors } = self {
            body["field_errors"] = json!(field_errors);
        }

        body
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_failed(field_errors: HashMap<String, String>) -> Self {
        ApiError::ValidationFailed { field_errors }
    }

    /// Single-field validation failure
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut field_errors = HashMap::new();
        field_errors.insert(field.into(), message.into());
        ApiError::ValidationFailed { field_errors }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ApiError::ResourceNotFound,
            StoreError::EditConflict => ApiError::EditConflict,
            StoreError::DuplicateEmail => {
                ApiError::invalid_field("email", "a user with this email address already exists")
            }
            StoreError::Timeout => {
                tracing::error!("storage operation exceeded its deadline");
                ApiError::Timeout
            }
            StoreError::Unavailable(msg) => {
                tracing::error!("storage unavailable: {}", msg);
                ApiError::ServerFault
            }
            StoreError::Database(sqlx_err) => {
                // Log the real error but return generic message
                tracing::error!("SQLx error: {}", sqlx_err);
                ApiError::ServerFault
            }
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field_errors = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| "is invalid".to_string());
                (field.to_string(), message)
            })
            .collect();
        ApiError::ValidationFailed { field_errors }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let mut response = (status, Json(self.to_json())).into_response();

        match &self {
            ApiError::InvalidCredential => {
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
            }
            ApiError::RateLimited { retry_after } => {
                // Whole seconds, never zero
                let secs = retry_after.as_secs_f64().ceil().max(1.0) as u64;
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(secs));
            }
            _ => {}
        }

        response
    }
}
