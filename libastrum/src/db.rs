//! Database operations for Astrumverse
//!
//! SQLite holds the two tables that need queries rather than whole-document
//! reads: `publish_records` and `scheduled_tasks`.

use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::path::Path;

use crate::error::{DbError, Result};
use crate::types::{PublishRecord, RecordStatus, ScheduledTask, TaskStatus};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database and run migrations
    pub async fn new(db_path: &str) -> Result<Self> {
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(DbError::IoError)?;
            }
        }

        // mode=rwc creates the file on first use
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(DbError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::MigrationError)?;

        Ok(Self { pool })
    }

    /// Insert a publish record, or update the existing one for the same
    /// (content, platform) pair
    pub async fn upsert_publish_record(&self, record: &PublishRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO publish_records
                (content_id, platform, status, url, platform_post_id, error_message,
                 retry_count, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (content_id, platform) DO UPDATE SET
                status = excluded.status,
                url = excluded.url,
                platform_post_id = excluded.platform_post_id,
                error_message = excluded.error_message,
                retry_count = excluded.retry_count,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&record.content_id)
        .bind(&record.platform)
        .bind(record.status.as_str())
        .bind(&record.url)
        .bind(&record.platform_post_id)
        .bind(&record.error_message)
        .bind(record.retry_count as i64)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    pub async fn get_publish_record(
        &self,
        content_id: &str,
        platform: &str,
    ) -> Result<Option<PublishRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, content_id, platform, status, url, platform_post_id, error_message,
                   retry_count, created_at, updated_at
            FROM publish_records
            WHERE content_id = ? AND platform = ?
            "#,
        )
        .bind(content_id)
        .bind(platform)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(row.map(|r| publish_record_from_row(&r)))
    }

    /// All records for one content item, ordered by platform
    pub async fn get_publish_records(&self, content_id: &str) -> Result<Vec<PublishRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, content_id, platform, status, url, platform_post_id, error_message,
                   retry_count, created_at, updated_at
            FROM publish_records
            WHERE content_id = ?
            ORDER BY platform
            "#,
        )
        .bind(content_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(rows.iter().map(publish_record_from_row).collect())
    }

    /// Most recently updated records, optionally filtered
    pub async fn list_publish_records(
        &self,
        platform: Option<&str>,
        status: Option<RecordStatus>,
        limit: usize,
    ) -> Result<Vec<PublishRecord>> {
        let mut where_clauses = vec!["1=1"];
        if platform.is_some() {
            where_clauses.push("platform = ?");
        }
        if status.is_some() {
            where_clauses.push("status = ?");
        }

        let query_str = format!(
            r#"
            SELECT id, content_id, platform, status, url, platform_post_id, error_message,
                   retry_count, created_at, updated_at
            FROM publish_records
            WHERE {}
            ORDER BY updated_at DESC, id DESC
            LIMIT ?
            "#,
            where_clauses.join(" AND ")
        );

        let mut query = sqlx::query(&query_str);
        if let Some(p) = platform {
            query = query.bind(p);
        }
        if let Some(s) = status {
            query = query.bind(s.as_str());
        }
        query = query.bind(limit as i64);

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(rows.iter().map(publish_record_from_row).collect())
    }

    pub async fn insert_task(&self, task: &ScheduledTask) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO scheduled_tasks
                (id, task_type, task_data, status, scheduled_for, executed_at, result, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&task.id)
        .bind(&task.task_type)
        .bind(task.task_data.to_string())
        .bind(task.status.as_str())
        .bind(task.scheduled_for)
        .bind(task.executed_at)
        .bind(&task.result)
        .bind(task.created_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    pub async fn get_task(&self, id: &str) -> Result<Option<ScheduledTask>> {
        let row = sqlx::query(
            r#"
            SELECT id, task_type, task_data, status, scheduled_for, executed_at, result, created_at
            FROM scheduled_tasks
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(row.map(|r| task_from_row(&r)))
    }

    /// Pending tasks due at or before `now`, oldest schedule first
    pub async fn due_tasks(&self, now: i64, limit: usize) -> Result<Vec<ScheduledTask>> {
        let rows = sqlx::query(
            r#"
            SELECT id, task_type, task_data, status, scheduled_for, executed_at, result, created_at
            FROM scheduled_tasks
            WHERE status = 'pending' AND scheduled_for <= ?
            ORDER BY scheduled_for ASC, created_at ASC
            LIMIT ?
            "#,
        )
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(rows.iter().map(task_from_row).collect())
    }

    pub async fn list_tasks(&self, status: Option<TaskStatus>) -> Result<Vec<ScheduledTask>> {
        let query_str = format!(
            r#"
            SELECT id, task_type, task_data, status, scheduled_for, executed_at, result, created_at
            FROM scheduled_tasks
            {}
            ORDER BY scheduled_for ASC, created_at ASC
            "#,
            if status.is_some() { "WHERE status = ?" } else { "" }
        );

        let mut query = sqlx::query(&query_str);
        if let Some(s) = status {
            query = query.bind(s.as_str());
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(rows.iter().map(task_from_row).collect())
    }

    /// Write back the outcome of a task run
    pub async fn finish_task(
        &self,
        id: &str,
        status: TaskStatus,
        result: &str,
        executed_at: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE scheduled_tasks
            SET status = ?, result = ?, executed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(result)
        .bind(executed_at)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Put a finished task back into the pending state
    ///
    /// Returns false if no task has this id.
    pub async fn requeue_task(&self, id: &str, scheduled_for: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_tasks
            SET status = 'pending', scheduled_for = ?, executed_at = NULL, result = NULL
            WHERE id = ?
            "#,
        )
        .bind(scheduled_for)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }
}

fn publish_record_from_row(row: &SqliteRow) -> PublishRecord {
    let status: String = row.get("status");
    let retry_count: i64 = row.get("retry_count");
    PublishRecord {
        id: Some(row.get("id")),
        content_id: row.get("content_id"),
        platform: row.get("platform"),
        status: RecordStatus::parse(&status),
        url: row.get("url"),
        platform_post_id: row.get("platform_post_id"),
        error_message: row.get("error_message"),
        retry_count: u32::try_from(retry_count).unwrap_or(0),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn task_from_row(row: &SqliteRow) -> ScheduledTask {
    let task_data: String = row.get("task_data");
    let status: String = row.get("status");
    ScheduledTask {
        id: row.get("id"),
        task_type: row.get("task_type"),
        task_data: serde_json::from_str(&task_data).unwrap_or(serde_json::Value::Null),
        status: status.parse().unwrap_or(TaskStatus::Failed),
        scheduled_for: row.get("scheduled_for"),
        executed_at: row.get("executed_at"),
        result: row.get("result"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    async fn setup_test_db() -> (Database, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Database::new(db_path.to_str().unwrap()).await.unwrap();
        (db, temp_dir)
    }

    fn record(content_id: &str, platform: &str, status: RecordStatus) -> PublishRecord {
        PublishRecord {
            id: None,
            content_id: content_id.to_string(),
            platform: platform.to_string(),
            status,
            url: None,
            platform_post_id: None,
            error_message: None,
            retry_count: 0,
            created_at: 1000,
            updated_at: 1000,
        }
    }

    #[tokio::test]
    async fn test_database_creates_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested/dir/astrum.db");
        Database::new(db_path.to_str().unwrap()).await.unwrap();
        assert!(db_path.exists());
    }

    #[tokio::test]
    async fn test_upsert_updates_same_pair() {
        let (db, _temp_dir) = setup_test_db().await;

        let mut first = record("c1", "linkedin", RecordStatus::Failed);
        first.error_message = Some("LinkedIn API error: 401 - invalid token".to_string());
        db.upsert_publish_record(&first).await.unwrap();

        let mut retry = record("c1", "linkedin", RecordStatus::Published);
        retry.url = Some("https://www.linkedin.com/feed/update/urn:li:share:1".to_string());
        retry.retry_count = 1;
        retry.updated_at = 2000;
        db.upsert_publish_record(&retry).await.unwrap();

        let records = db.get_publish_records("c1").await.unwrap();
        assert_eq!(records.len(), 1);
        let stored = &records[0];
        assert_eq!(stored.status, RecordStatus::Published);
        assert_eq!(stored.retry_count, 1);
        assert!(stored.error_message.is_none());
        assert_eq!(stored.created_at, 1000);
        assert_eq!(stored.updated_at, 2000);
    }

    #[tokio::test]
    async fn test_list_publish_records_filters() {
        let (db, _temp_dir) = setup_test_db().await;
        db.upsert_publish_record(&record("c1", "devto", RecordStatus::Published))
            .await
            .unwrap();
        db.upsert_publish_record(&record("c1", "twitter", RecordStatus::Failed))
            .await
            .unwrap();
        db.upsert_publish_record(&record("c2", "devto", RecordStatus::Failed))
            .await
            .unwrap();

        let devto = db.list_publish_records(Some("devto"), None, 10).await.unwrap();
        assert_eq!(devto.len(), 2);

        let failed = db
            .list_publish_records(None, Some(RecordStatus::Failed), 10)
            .await
            .unwrap();
        assert_eq!(failed.len(), 2);

        let limited = db.list_publish_records(None, None, 1).await.unwrap();
        assert_eq!(limited.len(), 1);

        assert!(db.get_publish_record("c2", "twitter").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_due_tasks_order_and_limit() {
        let (db, _temp_dir) = setup_test_db().await;
        db.insert_task(&ScheduledTask::new("collect_analytics", json!({}), 300))
            .await
            .unwrap();
        db.insert_task(&ScheduledTask::new("reset_ai_usage", json!({}), 100))
            .await
            .unwrap();
        db.insert_task(&ScheduledTask::new("reset_ai_usage", json!({}), 200))
            .await
            .unwrap();
        db.insert_task(&ScheduledTask::new("collect_analytics", json!({}), 9999))
            .await
            .unwrap();

        let due = db.due_tasks(500, 2).await.unwrap();
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].scheduled_for, 100);
        assert_eq!(due[1].scheduled_for, 200);

        let due = db.due_tasks(500, 10).await.unwrap();
        assert_eq!(due.len(), 3);
    }

    #[tokio::test]
    async fn test_finish_and_requeue_task() {
        let (db, _temp_dir) = setup_test_db().await;
        let task = ScheduledTask::new(
            "publish_content",
            json!({"contentId": "c1", "platforms": ["devto"]}),
            100,
        );
        db.insert_task(&task).await.unwrap();

        db.finish_task(&task.id, TaskStatus::Failed, "boom", 150)
            .await
            .unwrap();
        let stored = db.get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Failed);
        assert_eq!(stored.result.as_deref(), Some("boom"));
        assert_eq!(stored.executed_at, Some(150));
        assert_eq!(stored.task_data["platforms"], json!(["devto"]));
        assert!(db.due_tasks(1000, 10).await.unwrap().is_empty());

        assert!(db.requeue_task(&task.id, 200).await.unwrap());
        let stored = db.get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Pending);
        assert!(stored.executed_at.is_none());
        assert_eq!(db.list_tasks(Some(TaskStatus::Pending)).await.unwrap().len(), 1);

        assert!(!db.requeue_task("missing", 200).await.unwrap());
    }
}
