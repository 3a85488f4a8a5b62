use crate::database::error::DatabaseError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Product entity
#[derive(Debug, Clone, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Read seam for server-side price lookup at checkout. Client-submitted
/// prices are never used for the order total.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Product>, DatabaseError>;
}

pub struct ProductRepository {
    pool: PgPool,
}

impl ProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductCatalog for ProductRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Product>, DatabaseError> {
        sqlx::query_as::<_, Product>(
            "SELECT id, name, price, is_active, created_at, updated_at \
             FROM products WHERE id = $1 AND is_active = TRUE",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
