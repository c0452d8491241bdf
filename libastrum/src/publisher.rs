//! Multi-platform publishing
//!
//! Dispatches one publish call per requested platform, concurrently, and
//! records every outcome as a publish record. Outcomes are independent: a
//! failure on one platform neither stops nor rolls back the others, and
//! nothing is retried automatically.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Endpoints;
use crate::credentials::KeyStore;
use crate::db::Database;
use crate::error::{AstrumError, Result};
use crate::platforms::{create_platform, Platform, PlatformId};
use crate::types::{ContentItem, PublishRecord, PublishStatus, RecordStatus};

/// Result of publishing to a single platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_post_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PublishOutcome {
    fn failed(error: String) -> Self {
        Self {
            success: false,
            url: None,
            platform_post_id: None,
            error: Some(error),
        }
    }
}

/// One outcome per requested platform
pub type PublishReport = BTreeMap<PlatformId, PublishOutcome>;

/// Content status implied by a set of outcomes
pub fn overall_status<'a>(outcomes: impl IntoIterator<Item = &'a PublishOutcome>) -> PublishStatus {
    if outcomes.into_iter().any(|o| o.success) {
        PublishStatus::Published
    } else {
        PublishStatus::Failed
    }
}

/// Error text without the top-level category prefix
fn outcome_message(error: &AstrumError) -> String {
    match error {
        AstrumError::Platform(platform_error) => platform_error.to_string(),
        other => other.to_string(),
    }
}

async fn publish_one(platform: &dyn Platform, content: &ContentItem) -> (PlatformId, PublishOutcome) {
    let id = platform.id();
    info!("Publishing {} to {}", content.id, id);

    let outcome = match platform.publish(content).await {
        Ok(published) => {
            info!("Published {} to {}: {:?}", content.id, id, published.url);
            PublishOutcome {
                success: true,
                url: published.url,
                platform_post_id: published.platform_post_id,
                error: None,
            }
        }
        Err(e) => {
            warn!("Failed to publish {} to {}: {}", content.id, id, e);
            PublishOutcome::failed(outcome_message(&e))
        }
    };
    (id, outcome)
}

pub struct Publisher {
    key_store: Arc<KeyStore>,
    db: Arc<Database>,
    endpoints: Endpoints,
    http: reqwest::Client,
}

impl Publisher {
    pub fn new(
        key_store: Arc<KeyStore>,
        db: Arc<Database>,
        endpoints: Endpoints,
        http: reqwest::Client,
    ) -> Self {
        Self {
            key_store,
            db,
            endpoints,
            http,
        }
    }

    /// Platform clients for the given targets, built from current credentials
    ///
    /// Duplicate targets collapse to one client.
    pub fn platforms_for(&self, targets: &[PlatformId]) -> Result<Vec<Box<dyn Platform>>> {
        let credentials = self.key_store.load()?;
        let unique: BTreeSet<PlatformId> = targets.iter().copied().collect();
        Ok(unique
            .into_iter()
            .map(|platform| {
                create_platform(platform, &credentials, &self.endpoints, self.http.clone())
            })
            .collect())
    }

    /// Publish `content` to every target platform
    pub async fn publish(
        &self,
        content: &ContentItem,
        targets: &[PlatformId],
    ) -> Result<PublishReport> {
        let platforms = self.platforms_for(targets)?;
        Ok(self.publish_with(content, &platforms).await)
    }

    /// Publish through already constructed platform clients
    pub async fn publish_with(
        &self,
        content: &ContentItem,
        platforms: &[Box<dyn Platform>],
    ) -> PublishReport {
        let results = join_all(
            platforms
                .iter()
                .map(|platform| publish_one(platform.as_ref(), content)),
        )
        .await;

        let report: PublishReport = results.into_iter().collect();
        self.record_results(content, &report).await;
        report
    }

    /// Re-publish to the platforms whose latest record failed
    ///
    /// Returns an empty report when nothing failed.
    pub async fn retry_failed(&self, content: &ContentItem) -> Result<PublishReport> {
        let targets = self.failed_platforms(&content.id).await?;
        if targets.is_empty() {
            info!("No failed platforms to retry for {}", content.id);
            return Ok(PublishReport::new());
        }
        info!("Retrying {} on {} platform(s)", content.id, targets.len());
        self.publish(content, &targets).await
    }

    pub async fn failed_platforms(&self, content_id: &str) -> Result<Vec<PlatformId>> {
        Ok(self
            .db
            .get_publish_records(content_id)
            .await?
            .into_iter()
            .filter(|r| r.status == RecordStatus::Failed)
            .filter_map(|r| match r.platform.parse::<PlatformId>() {
                Ok(platform) => Some(platform),
                Err(_) => {
                    warn!("Ignoring record for unknown platform '{}'", r.platform);
                    None
                }
            })
            .collect())
    }

    pub async fn records(&self, content_id: &str) -> Result<Vec<PublishRecord>> {
        self.db.get_publish_records(content_id).await
    }

    /// Record each outcome, bumping the retry count of existing records
    async fn record_results(&self, content: &ContentItem, report: &PublishReport) {
        let now = chrono::Utc::now().timestamp();

        for (platform, outcome) in report {
            let existing = match self.db.get_publish_record(&content.id, platform.as_str()).await {
                Ok(existing) => existing,
                Err(e) => {
                    warn!("Failed to read publish record for {}: {}", platform, e);
                    None
                }
            };

            let record = PublishRecord {
                id: existing.as_ref().and_then(|r| r.id),
                content_id: content.id.clone(),
                platform: platform.as_str().to_string(),
                status: if outcome.success {
                    RecordStatus::Published
                } else {
                    RecordStatus::Failed
                },
                url: outcome.url.clone(),
                platform_post_id: outcome.platform_post_id.clone(),
                error_message: outcome.error.clone(),
                retry_count: existing
                    .as_ref()
                    .map(|r| r.retry_count.saturating_add(1))
                    .unwrap_or(0),
                created_at: existing.as_ref().map(|r| r.created_at).unwrap_or(now),
                updated_at: now,
            };

            if let Err(e) = self.db.upsert_publish_record(&record).await {
                warn!("Failed to record result for platform {}: {}", platform, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::mock::MockPlatform;
    use crate::storage::MemoryStore;
    use tempfile::TempDir;

    async fn setup() -> (Publisher, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Database::new(db_path.to_str().unwrap()).await.unwrap();
        let publisher = Publisher::new(
            Arc::new(KeyStore::new(MemoryStore::shared())),
            Arc::new(db),
            Endpoints::all("http://127.0.0.1:9"),
            reqwest::Client::new(),
        );
        (publisher, temp_dir)
    }

    #[tokio::test]
    async fn test_outcomes_are_independent() {
        let (publisher, _temp_dir) = setup().await;
        let content = ContentItem::new("Hello".into(), "World".into());
        let platforms: Vec<Box<dyn Platform>> = vec![
            Box::new(MockPlatform::success(PlatformId::Devto)),
            Box::new(MockPlatform::failure(
                PlatformId::Twitter,
                "Twitter API error: 503 - Service Unavailable",
            )),
        ];

        let report = publisher.publish_with(&content, &platforms).await;
        assert_eq!(report.len(), 2);
        assert!(report[&PlatformId::Devto].success);
        assert_eq!(
            report[&PlatformId::Twitter].error.as_deref(),
            Some("Twitter API error: 503 - Service Unavailable")
        );
        assert_eq!(overall_status(report.values()), PublishStatus::Published);

        let records = publisher.records(&content.id).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.retry_count == 0));
    }

    #[tokio::test]
    async fn test_unconfigured_platforms_fail_without_network() {
        let (publisher, _temp_dir) = setup().await;
        let content = ContentItem::new("Hello".into(), "World".into());

        let report = publisher
            .publish(&content, &[PlatformId::Linkedin, PlatformId::Hashnode, PlatformId::Linkedin])
            .await
            .unwrap();

        assert_eq!(report.len(), 2);
        assert_eq!(
            report[&PlatformId::Linkedin].error.as_deref(),
            Some("LinkedIn credentials are not configured")
        );
        assert_eq!(
            report[&PlatformId::Hashnode].error.as_deref(),
            Some("Hashnode credentials are not configured")
        );
        assert_eq!(overall_status(report.values()), PublishStatus::Failed);
    }

    #[tokio::test]
    async fn test_retry_increments_count() {
        let (publisher, _temp_dir) = setup().await;
        let content = ContentItem::new("Hello".into(), "World".into());

        let first: Vec<Box<dyn Platform>> = vec![
            Box::new(MockPlatform::success(PlatformId::Devto)),
            Box::new(MockPlatform::failure(PlatformId::Youtube, "YouTube API error: 500 - boom")),
        ];
        publisher.publish_with(&content, &first).await;
        assert_eq!(
            publisher.failed_platforms(&content.id).await.unwrap(),
            vec![PlatformId::Youtube]
        );

        let retry: Vec<Box<dyn Platform>> =
            vec![Box::new(MockPlatform::success(PlatformId::Youtube))];
        publisher.publish_with(&content, &retry).await;

        let records = publisher.records(&content.id).await.unwrap();
        let youtube = records.iter().find(|r| r.platform == "youtube").unwrap();
        assert_eq!(youtube.status, RecordStatus::Published);
        assert_eq!(youtube.retry_count, 1);
        assert!(youtube.error_message.is_none());
        let devto = records.iter().find(|r| r.platform == "devto").unwrap();
        assert_eq!(devto.retry_count, 0);
        assert!(publisher.failed_platforms(&content.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retry_with_nothing_failed_is_empty() {
        let (publisher, _temp_dir) = setup().await;
        let content = ContentItem::new("Hello".into(), "World".into());
        assert!(publisher.retry_failed(&content).await.unwrap().is_empty());
    }

    #[test]
    fn test_overall_status_of_empty_report_is_failed() {
        assert_eq!(overall_status(PublishReport::new().values()), PublishStatus::Failed);
    }
}
