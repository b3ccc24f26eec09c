use async_trait::async_trait;
use sqlx::FromRow;

use super::PgStore;
use crate::concurrency::{ConditionalWrite, VersionedStore};
use crate::database::filters::{Filters, Metadata};
use crate::database::manager::StoreError;
use crate::database::models::{Item, ItemFilter, NewItem};
use crate::database::query_builder::{ListQueryBuilder, SqlParam};
use crate::database::repository::ItemStore;

const TABLE: &str = "coltech_items";

const COLUMNS: &[&str] = &[
    "id",
    "created_on",
    "summary",
    "description",
    "priority",
    "status",
    "assigned_to",
    "category",
    "department",
    "created_by",
    "due_on",
    "closed_on",
    "version",
];

#[derive(FromRow)]
struct CountedItem {
    total: i64,
    #[sqlx(flatten)]
    item: Item,
}

#[async_trait]
impl VersionedStore<Item> for PgStore {
    async fn fetch(&self, id: i64) -> Result<Item, StoreError> {
        if id < 1 {
            return Err(StoreError::NotFound);
        }

        let query = r#"
            SELECT id, created_on, summary, description, priority, status, assigned_to,
                   category, department, created_by, due_on, closed_on, version
            FROM coltech_items
            WHERE id = $1
        "#;

        sqlx::query_as::<_, Item>(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn write_if_version(&self, item: &Item) -> Result<ConditionalWrite, StoreError> {
        let query = r#"
            UPDATE coltech_items
            SET summary = $1, description = $2, priority = $3, status = $4, assigned_to = $5,
                category = $6, department = $7, created_by = $8, due_on = $9, closed_on = $10,
                version = version + 1
            WHERE id = $11 AND version = $12
            RETURNING version
        "#;

        let version: Option<i32> = sqlx::query_scalar(query)
            .bind(&item.summary)
            .bind(&item.description)
            .bind(&item.priority)
            .bind(&item.status)
            .bind(&item.assigned_to)
            .bind(&item.category)
            .bind(&item.department)
            .bind(&item.created_by)
            .bind(item.due_on)
            .bind(item.closed_on)
            .bind(item.id)
            .bind(item.version)
            .fetch_optional(&self.pool)
            .await?;

        Ok(match version {
            Some(version) => ConditionalWrite::Applied { version },
            None => ConditionalWrite::NoRowsMatched,
        })
    }
}

#[async_trait]
impl ItemStore for PgStore {
    async fn insert(&self, new: &NewItem) -> Result<Item, StoreError> {
        let query = r#"
            INSERT INTO coltech_items
                (summary, description, priority, status, assigned_to, category, department, created_by, due_on)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, created_on, summary, description, priority, status, assigned_to,
                      category, department, created_by, due_on, closed_on, version
        "#;

        let item = sqlx::query_as::<_, Item>(query)
            .bind(&new.summary)
            .bind(&new.description)
            .bind(&new.priority)
            .bind(&new.status)
            .bind(&new.assigned_to)
            .bind(&new.category)
            .bind(&new.department)
            .bind(&new.created_by)
            .bind(new.due_on)
            .fetch_one(&self.pool)
            .await?;

        Ok(item)
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        if id < 1 {
            return Err(StoreError::NotFound);
        }

        let result = sqlx::query("DELETE FROM coltech_items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list(&self, filter: &ItemFilter, filters: &Filters) -> Result<(Vec<Item>, Metadata), StoreError> {
        let sql = ListQueryBuilder::new(TABLE, COLUMNS)
            .text_filter("created_by", &filter.created_by)
            .text_filter("assigned_to", &filter.assigned_to)
            .text_filter("priority", &filter.priority)
            .text_filter("status", &filter.status)
            .order_by(filters.sort_column(), filters.sort_direction())
            .paginate(filters.limit(), filters.offset())
            .build();

        let mut q = sqlx::query_as::<_, CountedItem>(&sql.query);
        for param in &sql.params {
            q = match param {
                SqlParam::Text(s) => q.bind(s),
                SqlParam::Int(i) => q.bind(*i),
            };
        }

        let rows = q.fetch_all(&self.pool).await?;
        let total = rows.first().map(|r| r.total).unwrap_or(0);
        let items = rows.into_iter().map(|r| r.item).collect();

        Ok((items, Metadata::calculate(total, filters.page, filters.page_size)))
    }
}
