mod items;
mod permissions;
mod tokens;
mod users;

use sqlx::PgPool;

/// sqlx-backed store; one pool shared by all four concerns
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}
