use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use super::auth::Principal;
use crate::database::{Models, PermissionStore};
use crate::error::ApiError;

/// State for [`require_permission`]: where to look permissions up and which code the route needs
#[derive(Clone)]
pub struct PermissionGate {
    pub models: Models,
    pub code: &'static str,
}

impl PermissionGate {
    pub fn new(models: Models, code: &'static str) -> Self {
        Self { models, code }
    }
}

/// Per-route gate. Checks run cheapest first: authenticated, then activated,
/// then holding `gate.code`.
pub async fn require_permission(
    State(gate): State<PermissionGate>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (user_id, activated) = match request.extensions().get::<Principal>() {
        None => {
            tracing::error!(uri = %request.uri(), "permission gate reached without a resolved principal");
            return Err(ApiError::ServerFault);
        }
        Some(Principal::Anonymous) => return Err(ApiError::AuthenticationRequired),
        Some(Principal::User(user)) => (user.id, user.activated),
    };

    if !activated {
        return Err(ApiError::InactiveAccount);
    }

    let permissions = gate.models.permissions.get_all_for_user(user_id).await?;
    if !permissions.include(gate.code) {
        tracing::debug!(user_id, code = gate.code, "permission denied");
        return Err(ApiError::NotPermitted);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::permission::{ITEMS_READ, ITEMS_WRITE};
    use crate::database::models::User;
    use crate::database::MemoryStore;
    use axum::{
        body::Body, handler::Handler, http::StatusCode, middleware, routing::get, Router,
    };
    use chrono::Utc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn user(id: i64, activated: bool) -> User {
        User {
            id,
            created_on: Utc::now(),
            name: "Grace".into(),
            email: "grace@example.com".into(),
            password_hash: String::new(),
            activated,
            version: 1,
        }
    }

    async fn through() -> &'static str {
        "through"
    }

    fn gated(store: &MemoryStore, code: &'static str) -> Router {
        let models = Models::in_memory(store.clone(), Duration::from_secs(3));
        let handler = through.layer(middleware::from_fn_with_state(PermissionGate::new(models, code), require_permission));
        Router::new().route("/gated", get(handler))
    }

    async fn status_for(app: Router, principal: Option<Principal>) -> StatusCode {
        let mut request = axum::http::Request::builder()
            .uri("/gated")
            .body(Body::empty())
            .unwrap();
        if let Some(principal) = principal {
            request.extensions_mut().insert(principal);
        }
        app.oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_anonymous_always_needs_authentication() {
        let store = MemoryStore::new();
        let status = status_for(gated(&store, ITEMS_WRITE), Some(Principal::Anonymous)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_inactive_checked_before_permissions() {
        let store = MemoryStore::new();
        // Would pass the permission check, still refused for being inactive
        store.grant(7, &[ITEMS_WRITE]);
        let status = status_for(gated(&store, ITEMS_WRITE), Some(Principal::User(user(7, false)))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_missing_code_not_permitted() {
        let store = MemoryStore::new();
        store.grant(7, &[ITEMS_READ]);
        let app = gated(&store, ITEMS_WRITE);
        let status = status_for(app, Some(Principal::User(user(7, true)))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let app = gated(&store, ITEMS_READ);
        let status = status_for(app, Some(Principal::User(user(7, true)))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_principal_is_fault() {
        let store = MemoryStore::new();
        let status = status_for(gated(&store, ITEMS_READ), None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_permission_lookup_failure_is_fault() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        let status = status_for(gated(&store, ITEMS_READ), Some(Principal::User(user(7, true)))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
