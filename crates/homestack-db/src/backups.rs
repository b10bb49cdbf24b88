//! Backups repository - immutable backup rows with paginated listing

use chrono::{DateTime, Utc};
use homestack_core::{BackupPage, BackupRecord, Error, Result};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;

/// Repository for backup row operations
pub struct BackupsRepository {
    pool: SqlitePool,
}

impl BackupsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new backup row
    pub async fn insert(
        &self,
        app_id: &str,
        filename: &str,
        size: u64,
        version: u64,
    ) -> Result<u64> {
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            r#"
            INSERT INTO backups (app_id, filename, size, version, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(app_id)
        .bind(filename)
        .bind(size as i64)
        .bind(version as i64)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::DbError(e.to_string()))?;

        Ok(result.last_insert_rowid() as u64)
    }

    /// Get a backup by id
    pub async fn get(&self, id: u64) -> Result<Option<BackupRecord>> {
        let row = sqlx::query("SELECT * FROM backups WHERE id = ?")
            .bind(id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::DbError(e.to_string()))?;

        match row {
            Some(row) => Ok(Some(row_to_backup(&row))),
            None => Ok(None),
        }
    }

    /// List backups for an app, newest first, one page at a time.
    /// Pages are 1-based; a page past the end returns an empty data set.
    pub async fn list(&self, app_id: &str, page: u64, page_size: u64) -> Result<BackupPage> {
        let page = page.max(1);
        let page_size = page_size.max(1);

        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM backups WHERE app_id = ?")
            .bind(app_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::DbError(e.to_string()))?;
        let total = total.0 as u64;

        let offset = (page - 1) * page_size;
        let rows = sqlx::query(
            "SELECT * FROM backups WHERE app_id = ? ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        )
        .bind(app_id)
        .bind(page_size as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::DbError(e.to_string()))?;

        Ok(BackupPage {
            total,
            page_count: total.div_ceil(page_size),
            data: rows.iter().map(row_to_backup).collect(),
        })
    }

    /// Delete a backup row
    pub async fn delete(&self, id: u64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM backups WHERE id = ?")
            .bind(id as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::DbError(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete all backup rows for an app (uninstall cleanup)
    pub async fn delete_for_app(&self, app_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM backups WHERE app_id = ?")
            .bind(app_id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::DbError(e.to_string()))?;

        Ok(result.rows_affected())
    }
}

fn row_to_backup(row: &sqlx::sqlite::SqliteRow) -> BackupRecord {
    let id: i64 = row.get("id");
    let app_id: String = row.get("app_id");
    let filename: String = row.get("filename");
    let size: i64 = row.get("size");
    let version: i64 = row.get("version");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    BackupRecord {
        id: id as u64,
        app_id,
        filename,
        size: size as u64,
        version: version as u64,
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
