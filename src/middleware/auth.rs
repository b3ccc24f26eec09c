use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::tokens;
use crate::database::models::{Scope, User};
use crate::database::{Models, StoreError, UserStore};
use crate::error::ApiError;

/// Who is making the request, attached to every request by [`authenticate`]
#[derive(Clone, Debug)]
pub enum Principal {
    Anonymous,
    User(User),
}

impl Principal {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Principal::Anonymous)
    }

    pub fn id(&self) -> Option<i64> {
        match self {
            Principal::Anonymous => None,
            Principal::User(user) => Some(user.id),
        }
    }

    pub fn activated(&self) -> bool {
        match self {
            Principal::Anonymous => false,
            Principal::User(user) => user.activated,
        }
    }
}

/// Resolve the bearer token, if any, into a [`Principal`] extension.
///
/// Responses always carry `Vary: Authorization`, including failures.
pub async fn authenticate(
    State(models): State<Models>,
    mut request: Request,
    next: Next,
) -> Response {
    let mut response = match resolve_principal(&models, request.headers()).await {
        Ok(principal) => {
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    };

    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Authorization"));
    response
}

async fn resolve_principal(models: &Models, headers: &HeaderMap) -> Result<Principal, ApiError> {
    let Some(token) = bearer_token(headers)? else {
        return Ok(Principal::Anonymous);
    };

    if !tokens::is_well_formed(token) {
        tracing::warn!("rejected malformed bearer token");
        return Err(ApiError::InvalidCredential);
    }

    let hash = tokens::hash_plaintext(token);
    match models.users.get_for_token(Scope::Authentication, &hash).await {
        Ok(user) => Ok(Principal::User(user)),
        Err(StoreError::NotFound) => {
            tracing::warn!("bearer token matched no live authentication token");
            Err(ApiError::InvalidCredential)
        }
        Err(err) => Err(err.into()),
    }
}

/// `Ok(None)` without an Authorization header; `InvalidCredential` when the
/// header is not `Bearer <token>`
fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, ApiError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let value = value.to_str().map_err(|_| {
        tracing::warn!("authorization header is not valid ascii");
        ApiError::InvalidCredential
    })?;

    match value.split_once(' ') {
        Some(("Bearer", token)) if !token.is_empty() => Ok(Some(token)),
        _ => {
            tracing::warn!("authorization header is not a bearer credential");
            Err(ApiError::InvalidCredential)
        }
    }
}
