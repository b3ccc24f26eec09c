use axum::{
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use std::any::Any;

use crate::error::ApiError;
use crate::lifecycle::tasks::panic_message;

/// Response for a handler panic caught by `CatchPanicLayer`. The
/// connection is closed after it is written.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    tracing::error!(panic = %panic_message(panic.as_ref()), "request handler panicked");

    let mut response = ApiError::ServerFault.into_response();
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}
