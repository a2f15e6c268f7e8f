// SQLite ItemRepository Implementation

use crate::error::{corrupt_row, map_sqlx_error};
use async_trait::async_trait;
use frameforge_core::domain::{ImageItem, ImageStyle, ItemId, ItemStatus};
use frameforge_core::error::Result;
use frameforge_core::port::ItemRepository;
use sqlx::SqlitePool;

pub struct SqliteItemRepository {
    pool: SqlitePool,
}

impl SqliteItemRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ItemRepository for SqliteItemRepository {
    async fn insert(&self, item: &ImageItem) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO image_items (
                id, job_key, script_id, item_scope, prompt, style, resolution,
                url, status, error, attempts, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&item.id)
        .bind(&item.job_key)
        .bind(&item.script_id)
        .bind(&item.item_scope)
        .bind(&item.prompt)
        .bind(item.style.as_str())
        .bind(&item.resolution)
        .bind(&item.url)
        .bind(item.status.as_str())
        .bind(&item.error)
        .bind(i64::from(item.attempts))
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_by_id(&self, id: &ItemId) -> Result<Option<ImageItem>> {
        let row = sqlx::query_as::<_, ItemRow>("SELECT * FROM image_items WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(ItemRow::into_item).transpose()
    }

    async fn find_by_job(&self, job_key: &str) -> Result<Vec<ImageItem>> {
        let rows: Vec<ItemRow> = sqlx::query_as(
            r#"
            SELECT * FROM image_items
            WHERE job_key = ?
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(job_key)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(ItemRow::into_item).collect()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    id: String,
    job_key: String,
    script_id: String,
    item_scope: String,
    prompt: String,
    style: String,
    resolution: String,
    url: String,
    status: String,
    error: Option<String>,
    attempts: i64,
    created_at: i64,
    updated_at: i64,
}

impl ItemRow {
    fn into_item(self) -> Result<ImageItem> {
        let style: ImageStyle = self
            .style
            .parse()
            .map_err(|e| corrupt_row("image_items", &self.id, e))?;
        let status: ItemStatus = self
            .status
            .parse()
            .map_err(|e| corrupt_row("image_items", &self.id, e))?;
        let attempts = u32::try_from(self.attempts)
            .map_err(|e| corrupt_row("image_items", &self.id, e))?;

        Ok(ImageItem {
            id: self.id,
            job_key: self.job_key,
            script_id: self.script_id,
            item_scope: self.item_scope,
            prompt: self.prompt,
            style,
            resolution: self.resolution,
            url: self.url,
            status,
            error: self.error,
            attempts,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
