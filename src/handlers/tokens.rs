use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use validator::Validate;

use super::{bad_json, run_blocking};
use crate::app::AppState;
use crate::auth::verify_password;
use crate::database::models::{Credentials, Scope, Token};
use crate::database::{StoreError, TokenStore, UserStore};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};

/// POST /v1/tokens/authentication
///
/// Unknown email and wrong password are indistinguishable to the caller.
pub async fn create_authentication(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> ApiResult<Token> {
    let Json(input) = payload.map_err(bad_json)?;
    input.validate()?;

    let user = match state.models.users.get_by_email(&input.email).await {
        Ok(user) => user,
        Err(StoreError::NotFound) => return Err(ApiError::InvalidLogin),
        Err(err) => return Err(err.into()),
    };

    let password = input.password;
    let stored = user.password_hash.clone();
    if !run_blocking(move || verify_password(&password, &stored)).await? {
        tracing::warn!(user_id = user.id, "password mismatch");
        return Err(ApiError::InvalidLogin);
    }

    let token = Token::generate(user.id, state.config.auth.authentication_ttl(), Scope::Authentication);
    TokenStore::insert(state.models.tokens.as_ref(), &token).await?;

    Ok(ApiResponse::created(token))
}
