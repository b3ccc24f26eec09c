use async_trait::async_trait;
use sqlx::PgExecutor;

use super::PgStore;
use crate::database::manager::StoreError;
use crate::database::models::{Scope, Token};
use crate::database::repository::TokenStore;

pub(super) async fn insert_token<'e, E: PgExecutor<'e>>(executor: E, token: &Token) -> Result<(), StoreError> {
    sqlx::query("INSERT INTO tokens (hash, user_id, expiry, scope) VALUES ($1, $2, $3, $4)")
        .bind(&token.hash)
        .bind(token.user_id)
        .bind(token.expiry)
        .bind(token.scope.as_str())
        .execute(executor)
        .await?;
    Ok(())
}

#[async_trait]
impl TokenStore for PgStore {
    async fn insert(&self, token: &Token) -> Result<(), StoreError> {
        insert_token(&self.pool, token).await
    }

    async fn delete_all_for_user(&self, scope: Scope, user_id: i64) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM tokens WHERE scope = $1 AND user_id = $2")
            .bind(scope.as_str())
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
