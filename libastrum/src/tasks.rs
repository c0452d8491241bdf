//! Pending-task queue
//!
//! Tasks live in the `scheduled_tasks` table. A drain picks up pending rows
//! whose `scheduled_for` has passed, runs each through a [`TaskHandler`] and
//! writes the outcome back. Failed tasks stay failed until an operator
//! requeues them.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::db::Database;
use crate::error::{AstrumError, Result};
use crate::platforms::PlatformId;
use crate::types::{ScheduledTask, TaskStatus};

pub const DEFAULT_BATCH_LIMIT: usize = 10;

/// The task types the service knows how to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskKind {
    PublishContent {
        content_id: String,
        platforms: Vec<PlatformId>,
    },
    CollectAnalytics,
    ResetAiUsage,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishContentData {
    content_id: String,
    #[serde(default)]
    platforms: Vec<PlatformId>,
}

impl TaskKind {
    pub const PUBLISH_CONTENT: &'static str = "publish_content";
    pub const COLLECT_ANALYTICS: &'static str = "collect_analytics";
    pub const RESET_AI_USAGE: &'static str = "reset_ai_usage";

    pub fn task_type(&self) -> &'static str {
        match self {
            Self::PublishContent { .. } => Self::PUBLISH_CONTENT,
            Self::CollectAnalytics => Self::COLLECT_ANALYTICS,
            Self::ResetAiUsage => Self::RESET_AI_USAGE,
        }
    }

    pub fn task_data(&self) -> Value {
        match self {
            Self::PublishContent {
                content_id,
                platforms,
            } => json!(PublishContentData {
                content_id: content_id.clone(),
                platforms: platforms.clone(),
            }),
            _ => json!({}),
        }
    }

    /// Decode a stored task
    pub fn from_task(task: &ScheduledTask) -> Result<Self> {
        match task.task_type.as_str() {
            Self::PUBLISH_CONTENT => {
                let data: PublishContentData = serde_json::from_value(task.task_data.clone())
                    .map_err(|e| {
                        AstrumError::InvalidInput(format!(
                            "Malformed {} data: {}",
                            Self::PUBLISH_CONTENT,
                            e
                        ))
                    })?;
                Ok(Self::PublishContent {
                    content_id: data.content_id,
                    platforms: data.platforms,
                })
            }
            Self::COLLECT_ANALYTICS => Ok(Self::CollectAnalytics),
            Self::RESET_AI_USAGE => Ok(Self::ResetAiUsage),
            other => Err(AstrumError::InvalidInput(format!(
                "Unknown task type: {}",
                other
            ))),
        }
    }
}

/// Runs one task and returns its result document
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, task: &ScheduledTask) -> Result<Value>;
}

/// Counts from one drain
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DrainSummary {
    pub completed: usize,
    pub failed: usize,
}

impl DrainSummary {
    pub fn total(&self) -> usize {
        self.completed + self.failed
    }
}

#[derive(Clone)]
pub struct TaskQueue {
    db: Arc<Database>,
}

impl TaskQueue {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn enqueue(
        &self,
        task_type: &str,
        data: Value,
        scheduled_for: DateTime<Utc>,
    ) -> Result<ScheduledTask> {
        let task = ScheduledTask::new(task_type, data, scheduled_for.timestamp());
        self.db.insert_task(&task).await?;
        info!(
            "Queued {} task {} for {}",
            task.task_type,
            task.id,
            scheduled_for.to_rfc3339()
        );
        Ok(task)
    }

    pub async fn enqueue_kind(
        &self,
        kind: &TaskKind,
        scheduled_for: DateTime<Utc>,
    ) -> Result<ScheduledTask> {
        self.enqueue(kind.task_type(), kind.task_data(), scheduled_for)
            .await
    }

    pub async fn get(&self, id: &str) -> Result<Option<ScheduledTask>> {
        self.db.get_task(id).await
    }

    pub async fn list(&self, status: Option<TaskStatus>) -> Result<Vec<ScheduledTask>> {
        self.db.list_tasks(status).await
    }

    /// Make a task pending again, due immediately
    pub async fn requeue(&self, id: &str) -> Result<bool> {
        let found = self.db.requeue_task(id, Utc::now().timestamp()).await?;
        if found {
            info!("Requeued task {}", id);
        }
        Ok(found)
    }

    /// Run up to `batch_limit` due tasks, in schedule order
    pub async fn process_due(
        &self,
        batch_limit: usize,
        handler: &dyn TaskHandler,
    ) -> Result<DrainSummary> {
        self.process_due_at(Utc::now(), batch_limit, handler).await
    }

    pub async fn process_due_at(
        &self,
        now: DateTime<Utc>,
        batch_limit: usize,
        handler: &dyn TaskHandler,
    ) -> Result<DrainSummary> {
        let due = self.db.due_tasks(now.timestamp(), batch_limit).await?;
        let mut summary = DrainSummary::default();
        if due.is_empty() {
            return Ok(summary);
        }

        info!("Found {} task(s) due", due.len());

        for task in due {
            let (status, result) = match handler.handle(&task).await {
                Ok(value) => {
                    info!("Task {} ({}) completed", task.id, task.task_type);
                    summary.completed += 1;
                    (TaskStatus::Completed, value.to_string())
                }
                Err(e) => {
                    warn!("Task {} ({}) failed: {}", task.id, task.task_type, e);
                    summary.failed += 1;
                    (TaskStatus::Failed, e.to_string())
                }
            };

            self.db
                .finish_task(&task.id, status, &result, Utc::now().timestamp())
                .await?;
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    async fn queue() -> (TaskQueue, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("tasks.db");
        let db = Database::new(db_path.to_str().unwrap()).await.unwrap();
        (TaskQueue::new(Arc::new(db)), temp_dir)
    }

    /// Completes every task except `reset_ai_usage`
    struct FailOnReset;

    #[async_trait]
    impl TaskHandler for FailOnReset {
        async fn handle(&self, task: &ScheduledTask) -> Result<Value> {
            match TaskKind::from_task(task)? {
                TaskKind::ResetAiUsage => {
                    Err(AstrumError::InvalidInput("reset refused".to_string()))
                }
                kind => Ok(json!({"ran": kind.task_type()})),
            }
        }
    }

    #[test]
    fn test_task_kind_encoding() {
        let kind = TaskKind::PublishContent {
            content_id: "c1".to_string(),
            platforms: vec![PlatformId::Devto, PlatformId::Twitter],
        };
        assert_eq!(kind.task_type(), "publish_content");
        assert_eq!(
            kind.task_data(),
            json!({"contentId": "c1", "platforms": ["devto", "twitter"]})
        );

        let task = ScheduledTask::new(kind.task_type(), kind.task_data(), 0);
        assert_eq!(TaskKind::from_task(&task).unwrap(), kind);

        let unknown = ScheduledTask::new("send_newsletter", json!({}), 0);
        assert!(TaskKind::from_task(&unknown).is_err());

        let malformed = ScheduledTask::new("publish_content", json!({"platforms": []}), 0);
        assert!(TaskKind::from_task(&malformed).is_err());
    }

    #[tokio::test]
    async fn test_process_due_marks_completed_and_failed() {
        let (queue, _temp_dir) = queue().await;
        let now = Utc::now();

        let ok = queue
            .enqueue_kind(&TaskKind::CollectAnalytics, now - Duration::minutes(5))
            .await
            .unwrap();
        let bad = queue
            .enqueue_kind(&TaskKind::ResetAiUsage, now - Duration::minutes(1))
            .await
            .unwrap();
        let later = queue
            .enqueue_kind(&TaskKind::CollectAnalytics, now + Duration::hours(1))
            .await
            .unwrap();

        let summary = queue.process_due_at(now, 10, &FailOnReset).await.unwrap();
        assert_eq!(summary, DrainSummary { completed: 1, failed: 1 });

        let ok = queue.get(&ok.id).await.unwrap().unwrap();
        assert_eq!(ok.status, TaskStatus::Completed);
        assert_eq!(ok.result.as_deref(), Some(r#"{"ran":"collect_analytics"}"#));
        assert!(ok.executed_at.is_some());

        let bad = queue.get(&bad.id).await.unwrap().unwrap();
        assert_eq!(bad.status, TaskStatus::Failed);
        assert_eq!(bad.result.as_deref(), Some("Invalid input: reset refused"));

        let later = queue.get(&later.id).await.unwrap().unwrap();
        assert_eq!(later.status, TaskStatus::Pending);

        // Failed tasks are not picked up again
        let again = queue.process_due_at(now, 10, &FailOnReset).await.unwrap();
        assert_eq!(again.total(), 0);
    }

    #[tokio::test]
    async fn test_process_due_respects_batch_limit() {
        let (queue, _temp_dir) = queue().await;
        let now = Utc::now();
        for i in 0..5 {
            queue
                .enqueue_kind(&TaskKind::CollectAnalytics, now - Duration::minutes(10 - i))
                .await
                .unwrap();
        }

        let first = queue.process_due_at(now, 3, &FailOnReset).await.unwrap();
        assert_eq!(first.completed, 3);
        assert_eq!(queue.list(Some(TaskStatus::Pending)).await.unwrap().len(), 2);

        let second = queue.process_due_at(now, 3, &FailOnReset).await.unwrap();
        assert_eq!(second.completed, 2);
        assert_eq!(queue.list(Some(TaskStatus::Completed)).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_requeue_failed_task() {
        let (queue, _temp_dir) = queue().await;
        let task = queue
            .enqueue_kind(&TaskKind::ResetAiUsage, Utc::now() - Duration::minutes(1))
            .await
            .unwrap();
        queue.process_due(10, &FailOnReset).await.unwrap();
        assert_eq!(queue.list(Some(TaskStatus::Failed)).await.unwrap().len(), 1);

        assert!(queue.requeue(&task.id).await.unwrap());
        let task = queue.get(&task.id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.result.is_none());

        assert!(!queue.requeue("missing").await.unwrap());
    }
}
