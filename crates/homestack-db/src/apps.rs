//! Apps repository - CRUD and guarded status transitions for app rows

use chrono::{DateTime, Utc};
use homestack_core::{AppRecord, AppStatus, Error, FormValues, NewApp, Result};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;

/// Repository for app row operations
pub struct AppsRepository {
    pool: SqlitePool,
}

impl AppsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new app row
    pub async fn insert(&self, app: &NewApp) -> Result<()> {
        let config_json = serde_json::to_string(&app.config)?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO apps (
                id, status, config, exposed, domain, open_port, exposed_local,
                version, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&app.id)
        .bind(app.status.as_str())
        .bind(&config_json)
        .bind(app.exposed)
        .bind(&app.domain)
        .bind(app.open_port)
        .bind(app.exposed_local)
        .bind(app.version as i64)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::DbError(e.to_string()))?;

        Ok(())
    }

    /// Get app by id
    pub async fn get(&self, id: &str) -> Result<Option<AppRecord>> {
        let row = sqlx::query("SELECT * FROM apps WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::DbError(e.to_string()))?;

        match row {
            Some(row) => Ok(Some(row_to_app(&row)?)),
            None => Ok(None),
        }
    }

    /// Get all app rows
    pub async fn list(&self) -> Result<Vec<AppRecord>> {
        let rows = sqlx::query("SELECT * FROM apps ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::DbError(e.to_string()))?;

        rows.iter().map(row_to_app).collect()
    }

    /// Get all app rows with the given status
    pub async fn list_by_status(&self, status: AppStatus) -> Result<Vec<AppRecord>> {
        let rows = sqlx::query("SELECT * FROM apps WHERE status = ? ORDER BY id")
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::DbError(e.to_string()))?;

        rows.iter().map(row_to_app).collect()
    }

    /// Check if an app row exists
    pub async fn exists(&self, id: &str) -> Result<bool> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM apps WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::DbError(e.to_string()))?;

        Ok(row.0 > 0)
    }

    /// Conditionally move an app from one of the expected statuses to a new one.
    ///
    /// This is the single-writer guard for transitional statuses: the update
    /// only takes effect if the row is still in an expected source status, so
    /// two racing commands cannot both claim the same app. Returns whether
    /// the transition happened.
    pub async fn try_transition(
        &self,
        id: &str,
        from: &[AppStatus],
        to: AppStatus,
    ) -> Result<bool> {
        if from.is_empty() {
            return Ok(false);
        }

        let placeholders = vec!["?"; from.len()].join(", ");
        let sql = format!(
            "UPDATE apps SET status = ?, updated_at = ? WHERE id = ? AND status IN ({})",
            placeholders
        );

        let mut query = sqlx::query(&sql)
            .bind(to.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(id);
        for status in from {
            query = query.bind(status.as_str());
        }

        let result = query
            .execute(&self.pool)
            .await
            .map_err(|e| Error::DbError(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    /// Unconditionally set an app's status.
    /// Used to resolve a transitional status to its terminal state.
    pub async fn set_status(&self, id: &str, status: AppStatus) -> Result<()> {
        sqlx::query("UPDATE apps SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::DbError(e.to_string()))?;

        Ok(())
    }

    /// Persist new user config and exposure settings
    pub async fn update_config(
        &self,
        id: &str,
        config: &FormValues,
        exposed: bool,
        domain: Option<&str>,
        open_port: bool,
        exposed_local: bool,
    ) -> Result<()> {
        let config_json = serde_json::to_string(config)?;

        sqlx::query(
            r#"
            UPDATE apps
            SET config = ?, exposed = ?, domain = ?, open_port = ?, exposed_local = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&config_json)
        .bind(exposed)
        .bind(domain)
        .bind(open_port)
        .bind(exposed_local)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::DbError(e.to_string()))?;

        Ok(())
    }

    /// Record the manifest revision an app was installed or updated to
    pub async fn set_version(&self, id: &str, version: u64) -> Result<()> {
        sqlx::query("UPDATE apps SET version = ?, updated_at = ? WHERE id = ?")
            .bind(version as i64)
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::DbError(e.to_string()))?;

        Ok(())
    }

    /// Delete an app row
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM apps WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::DbError(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    /// Whether another exposed app already uses this domain
    pub async fn domain_in_use(&self, domain: &str, exclude_id: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT id FROM apps WHERE exposed = 1 AND domain = ? AND id != ?")
            .bind(domain)
            .bind(exclude_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::DbError(e.to_string()))?;

        Ok(row.map(|r| r.get("id")))
    }

    /// Record that the user opened the app
    pub async fn mark_opened(&self, id: &str) -> Result<()> {
        sqlx::query(
            "UPDATE apps SET last_opened = ?, num_opened = num_opened + 1, updated_at = ? WHERE id = ?",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::DbError(e.to_string()))?;

        Ok(())
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_app(row: &sqlx::sqlite::SqliteRow) -> Result<AppRecord> {
    let id: String = row.get("id");
    let status_str: String = row.get("status");
    let config_json: String = row.get("config");
    let exposed: bool = row.get("exposed");
    let domain: Option<String> = row.get("domain");
    let open_port: bool = row.get("open_port");
    let exposed_local: bool = row.get("exposed_local");
    let version: i64 = row.get("version");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");
    let last_opened: Option<String> = row.get("last_opened");
    let num_opened: i64 = row.get("num_opened");

    let status: AppStatus = status_str.parse()?;
    let config: FormValues = serde_json::from_str(&config_json)?;

    Ok(AppRecord {
        id,
        status,
        config,
        exposed,
        domain,
        open_port,
        exposed_local,
        version: version as u64,
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
        last_opened: last_opened.as_deref().map(parse_timestamp),
        num_opened: num_opened as u64,
    })
}
