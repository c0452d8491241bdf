//! Background work run by `astrum-send`: queued tasks, weekly slots and
//! the daily maintenance job

use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use serde_json::{json, Map, Value};

use super::AstrumService;
use crate::error::{PlatformError, Result};
use crate::publisher::PublishReport;
use crate::schedule::DailyJob;
use crate::tasks::{TaskHandler, TaskKind};
use crate::types::{PublishStatus, ScheduledTask};

fn report_json(report: &PublishReport) -> Value {
    let outcomes: Map<String, Value> = report
        .iter()
        .map(|(platform, outcome)| {
            (
                platform.as_str().to_string(),
                serde_json::to_value(outcome).unwrap_or(Value::Null),
            )
        })
        .collect();
    Value::Object(outcomes)
}

fn report_errors(report: &PublishReport) -> String {
    report
        .iter()
        .filter_map(|(platform, outcome)| {
            outcome
                .error
                .as_ref()
                .map(|error| format!("{}: {}", platform, error))
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[async_trait]
impl TaskHandler for AstrumService {
    /// A publish task fails when no platform accepted the content
    async fn handle(&self, task: &ScheduledTask) -> Result<Value> {
        match TaskKind::from_task(task)? {
            TaskKind::PublishContent {
                content_id,
                platforms,
            } => {
                let report = self.publish_content(&content_id, &platforms).await?;
                if AstrumService::report_status(&report) == PublishStatus::Failed {
                    return Err(PlatformError::Transport(report_errors(&report)).into());
                }
                Ok(report_json(&report))
            }
            TaskKind::CollectAnalytics => {
                let snapshots = self.analytics.collect().await?;
                Ok(json!({ "snapshots": snapshots.len() }))
            }
            TaskKind::ResetAiUsage => {
                self.rotator.reset_daily_usage()?;
                Ok(json!({ "reset": true }))
            }
        }
    }
}

#[async_trait]
impl DailyJob for AstrumService {
    async fn run(&self) -> Result<()> {
        self.run_daily_maintenance().await
    }
}

impl AstrumService {
    /// Queue publication for weekly slots that occurred in `(since, now]`
    ///
    /// Each due slot takes the oldest draft of its category. A slot naming no
    /// platforms publishes to the auto-publish platforms. Slots with no
    /// matching draft or no target are skipped.
    pub async fn queue_due_slots(
        &self,
        since: DateTime<Local>,
        now: DateTime<Local>,
    ) -> Result<Vec<ScheduledTask>> {
        let mut queued = Vec::new();

        for slot in self
            .schedule
            .due_slots(since.naive_local(), now.naive_local())?
        {
            let platforms = if slot.platforms.is_empty() {
                let credentials = self.key_store.load()?;
                self.toggles.auto_publish_platforms(&credentials)?
            } else {
                slot.platforms.clone()
            };
            if platforms.is_empty() {
                tracing::debug!(
                    "Skipping the {:?} {} slot: no auto-publish platforms",
                    slot.day,
                    slot.time
                );
                continue;
            }

            let draft = self
                .content
                .list(Some(PublishStatus::Draft))?
                .into_iter()
                .rev()
                .find(|item| item.category == slot.category);

            let Some(draft) = draft else {
                tracing::debug!(
                    "No {} draft for the {:?} {} slot",
                    slot.category,
                    slot.day,
                    slot.time
                );
                continue;
            };

            tracing::info!(
                "Weekly slot {:?} {} picked content {}",
                slot.day,
                slot.time,
                draft.id
            );
            let task = self
                .schedule_publish(&draft.id, platforms, Utc::now())
                .await?;
            queued.push(task);
        }

        Ok(queued)
    }
}
