use async_trait::async_trait;
use sqlx::PgExecutor;

use super::PgStore;
use crate::database::manager::StoreError;
use crate::database::models::Permissions;
use crate::database::repository::PermissionStore;

pub(super) async fn grant_codes<'e, E: PgExecutor<'e>>(
    executor: E,
    user_id: i64,
    codes: &[&str],
) -> Result<(), StoreError> {
    let query = r#"
        INSERT INTO users_permissions (user_id, permission_id)
        SELECT $1, permissions.id FROM permissions WHERE permissions.code = ANY($2)
        ON CONFLICT DO NOTHING
    "#;

    let codes: Vec<String> = codes.iter().map(|c| c.to_string()).collect();
    sqlx::query(query)
        .bind(user_id)
        .bind(&codes)
        .execute(executor)
        .await?;
    Ok(())
}

#[async_trait]
impl PermissionStore for PgStore {
    async fn get_all_for_user(&self, user_id: i64) -> Result<Permissions, StoreError> {
        let query = r#"
            SELECT permissions.code
            FROM permissions
            INNER JOIN users_permissions ON users_permissions.permission_id = permissions.id
            WHERE users_permissions.user_id = $1
        "#;

        let codes: Vec<String> = sqlx::query_scalar(query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(codes.into_iter().collect())
    }
}
