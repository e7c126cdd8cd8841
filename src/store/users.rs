//! Tenant record queries
//!
//! The executor's only view of the entity store: the ordered set of user
//! records belonging to one client.

use sqlx::PgPool;

use crate::models::UserRecord;

#[derive(Clone)]
pub struct UserStore {
    pool: PgPool,
}

impl UserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn records_for(&self, client_id: &str) -> Result<Vec<UserRecord>, sqlx::Error> {
        sqlx::query_as::<_, UserRecord>(
            "SELECT id, client_id, name, email, address, phone, created_at, updated_at \
             FROM users WHERE client_id = $1 ORDER BY created_at, id",
        )
        .bind(client_id)
        .fetch_all(&self.pool)
        .await
    }
}
