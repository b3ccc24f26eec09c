// Route handlers, one module per resource. Permission gates are attached at
// routing time in `app.rs`; handlers assume the caller is already allowed.
pub mod healthcheck;
pub mod items;
pub mod tokens;
pub mod users;

use axum::extract::rejection::JsonRejection;

use crate::error::ApiError;

/// Positive row id from a path segment; anything else reads as a missing resource
pub(crate) fn parse_id(raw: &str) -> Result<i64, ApiError> {
    match raw.parse::<i64>() {
        Ok(id) if id >= 1 => Ok(id),
        _ => Err(ApiError::ResourceNotFound),
    }
}

pub(crate) fn bad_json(rejection: JsonRejection) -> ApiError {
    ApiError::bad_request(rejection.body_text())
}

/// Run CPU-heavy work (password hashing) off the async workers
pub(crate) async fn run_blocking<T, E, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => {
            tracing::error!("blocking task failed: {}", err);
            Err(ApiError::ServerFault)
        }
        Err(join) => {
            tracing::error!("blocking task did not complete: {}", join);
            Err(ApiError::ServerFault)
        }
    }
}
