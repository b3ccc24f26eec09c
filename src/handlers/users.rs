// Account handlers: registration and activation
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Deserialize;
use validator::Validate;

use super::{bad_json, run_blocking};
use crate::app::AppState;
use crate::auth::{hash_password, tokens};
use crate::concurrency;
use crate::database::models::permission::ITEMS_READ;
use crate::database::models::{NewUser, RegisterUser, Scope, User};
use crate::database::{StoreError, TokenStore, UserStore};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::{send_with_retry, Message};

#[derive(Debug, Deserialize)]
pub struct ActivationInput {
    #[serde(default)]
    pub token: String,
}

/// POST /v1/users
///
/// Creates an inactive account with read access and queues the welcome
/// mail. Answers 202 before the mail goes out.
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterUser>, JsonRejection>,
) -> ApiResult<User> {
    let Json(input) = payload.map_err(bad_json)?;
    input.validate()?;

    let password = input.password;
    let password_hash = run_blocking(move || hash_password(&password)).await?;

    let new_user = NewUser {
        name: input.name,
        email: input.email,
        password_hash,
        activated: false,
    };
    let (user, token) = state
        .models
        .users
        .register(&new_user, &[ITEMS_READ], state.config.auth.activation_ttl())
        .await?;

    let mailer = state.mailer.clone();
    let message = Message::welcome(&user, &token.plaintext);
    state.background.spawn("welcome-mail", async move {
        if let Err(err) = send_with_retry(mailer.as_ref(), &message).await {
            tracing::error!(recipient = %message.recipient, error = %err, "welcome mail not delivered");
        }
    });

    tracing::info!(user_id = user.id, "registered user");
    Ok(ApiResponse::accepted(user))
}

/// PUT /v1/users/activated
pub async fn activate(
    State(state): State<AppState>,
    payload: Result<Json<ActivationInput>, JsonRejection>,
) -> ApiResult<User> {
    let Json(input) = payload.map_err(bad_json)?;

    if input.token.is_empty() {
        return Err(ApiError::invalid_field("token", "must be provided"));
    }
    if !tokens::is_well_formed(&input.token) {
        return Err(ApiError::invalid_field("token", "must be 26 characters long"));
    }

    let hash = tokens::hash_plaintext(&input.token);
    let mut user = match state.models.users.get_for_token(Scope::Activation, &hash).await {
        Ok(user) => user,
        Err(StoreError::NotFound) => {
            return Err(ApiError::invalid_field("token", "invalid or expired activation token"));
        }
        Err(err) => return Err(err.into()),
    };

    user.activated = true;
    concurrency::commit(state.models.users.as_ref(), &mut user).await?;

    state
        .models
        .tokens
        .delete_all_for_user(Scope::Activation, user.id)
        .await?;

    tracing::info!(user_id = user.id, "activated user");
    Ok(ApiResponse::success(user))
}
