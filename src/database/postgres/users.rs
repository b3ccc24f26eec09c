use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgExecutor;

use super::permissions::grant_codes;
use super::tokens::insert_token;
use super::PgStore;
use crate::concurrency::{ConditionalWrite, VersionedStore};
use crate::database::manager::StoreError;
use crate::database::models::{NewUser, Scope, Token, User};
use crate::database::repository::UserStore;

const EMAIL_CONSTRAINT: &str = "users_email_key";

fn map_unique_email(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.constraint() == Some(EMAIL_CONSTRAINT) => {
            StoreError::DuplicateEmail
        }
        _ => StoreError::Database(err),
    }
}

async fn insert_user<'e, E: PgExecutor<'e>>(executor: E, new: &NewUser) -> Result<User, StoreError> {
    let query = r#"
        INSERT INTO users (name, email, password_hash, activated)
        VALUES ($1, $2, $3, $4)
        RETURNING id, created_on, name, email, password_hash, activated, version
    "#;

    sqlx::query_as::<_, User>(query)
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(new.activated)
        .fetch_one(executor)
        .await
        .map_err(map_unique_email)
}

#[async_trait]
impl VersionedStore<User> for PgStore {
    async fn fetch(&self, id: i64) -> Result<User, StoreError> {
        let query = r#"
            SELECT id, created_on, name, email, password_hash, activated, version
            FROM users
            WHERE id = $1
        "#;

        sqlx::query_as::<_, User>(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn write_if_version(&self, user: &User) -> Result<ConditionalWrite, StoreError> {
        let query = r#"
            UPDATE users
            SET name = $1, email = $2, password_hash = $3, activated = $4, version = version + 1
            WHERE id = $5 AND version = $6
            RETURNING version
        "#;

        let version: Option<i32> = sqlx::query_scalar(query)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.activated)
            .bind(user.id)
            .bind(user.version)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_unique_email)?;

        Ok(match version {
            Some(version) => ConditionalWrite::Applied { version },
            None => ConditionalWrite::NoRowsMatched,
        })
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn register(
        &self,
        new: &NewUser,
        permissions: &[&str],
        activation_ttl: chrono::Duration,
    ) -> Result<(User, Token), StoreError> {
        // Dropping the transaction on any early return rolls it back
        let mut tx = self.pool.begin().await?;

        let user = insert_user(&mut *tx, new).await?;
        grant_codes(&mut *tx, user.id, permissions).await?;
        let token = Token::generate(user.id, activation_ttl, Scope::Activation);
        insert_token(&mut *tx, &token).await?;

        tx.commit().await?;
        Ok((user, token))
    }

    async fn get_by_email(&self, email: &str) -> Result<User, StoreError> {
        let query = r#"
            SELECT id, created_on, name, email, password_hash, activated, version
            FROM users
            WHERE email = $1
        "#;

        sqlx::query_as::<_, User>(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn get_for_token(&self, scope: Scope, token_hash: &[u8]) -> Result<User, StoreError> {
        let query = r#"
            SELECT users.id, users.created_on, users.name, users.email,
                   users.password_hash, users.activated, users.version
            FROM users
            INNER JOIN tokens ON users.id = tokens.user_id
            WHERE tokens.hash = $1
              AND tokens.scope = $2
              AND tokens.expiry > $3
        "#;

        sqlx::query_as::<_, User>(query)
            .bind(token_hash)
            .bind(scope.as_str())
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
    }
}
