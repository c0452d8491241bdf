//! Service layer for Astrumverse
//!
//! `AstrumService` is the single entry point used by the command line tools.
//! It owns the shared resources (configuration, document store, database,
//! HTTP client) and hands them to the component services:
//!
//! - [`ContentLibrary`]: stored content items
//! - [`Publisher`]: multi-platform publishing and publish records
//! - [`ContentEnhancer`]: AI grammar, tag and optimization helpers
//! - [`MediaBuffer`]: Dropbox-backed media references
//! - [`AnalyticsCollector`]: daily platform counters
//! - [`WeeklySchedule`] and [`TaskQueue`]: when things get published
//!
//! # Example
//!
//! ```no_run
//! use libastrum::platforms::PlatformId;
//! use libastrum::service::AstrumService;
//! use libastrum::types::ContentItem;
//!
//! # async fn example() -> libastrum::Result<()> {
//! let service = AstrumService::new().await?;
//!
//! let item = service
//!     .content()
//!     .create(ContentItem::new("Hello".into(), "First post".into()))?;
//! let report = service
//!     .publish_content(&item.id, &[PlatformId::Devto, PlatformId::Hashnode])
//!     .await?;
//! println!("Published to {} platform(s)", report.values().filter(|o| o.success).count());
//! # Ok(())
//! # }
//! ```

pub mod jobs;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::analytics::AnalyticsCollector;
use crate::config::Config;
use crate::content::ContentLibrary;
use crate::credentials::{CredentialSet, KeyStore};
use crate::db::Database;
use crate::enhancer::ContentEnhancer;
use crate::error::{AstrumError, ConfigError, Result};
use crate::http::build_client;
use crate::media::MediaBuffer;
use crate::platforms::{readiness, PlatformId};
use crate::publisher::{overall_status, PublishReport, Publisher};
use crate::quota::QuotaRotator;
use crate::schedule::{DailyScheduler, SchedulerHandle, WeeklySchedule};
use crate::storage::{JsonFileStore, SharedStore};
use crate::tasks::{DrainSummary, TaskKind, TaskQueue};
use crate::toggles::PlatformToggles;
use crate::types::{PublishStatus, RecordStatus, ScheduledTask};

/// Main service facade
///
/// Every component shares the same document store, database handle and
/// HTTP client.
pub struct AstrumService {
    config: Arc<Config>,
    db: Arc<Database>,
    key_store: Arc<KeyStore>,
    rotator: QuotaRotator,
    content: ContentLibrary,
    toggles: PlatformToggles,
    publisher: Publisher,
    enhancer: ContentEnhancer,
    media: MediaBuffer,
    analytics: AnalyticsCollector,
    schedule: WeeklySchedule,
    tasks: TaskQueue,
}

impl AstrumService {
    /// Create a service from the default configuration file
    pub async fn new() -> Result<Self> {
        let config = Config::load()?;
        Self::from_config(config).await
    }

    /// Create a service from an explicit configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built, or the database
    /// cannot be opened or migrated.
    pub async fn from_config(config: Config) -> Result<Self> {
        let store: SharedStore = Arc::new(JsonFileStore::new(config.data_dir()));

        let db_path = config.database_path();
        let db_path_str = db_path.to_str().ok_or_else(|| {
            AstrumError::Config(ConfigError::InvalidValue {
                field: "database.path".to_string(),
                reason: "path is not valid UTF-8".to_string(),
            })
        })?;
        let db = Arc::new(Database::new(db_path_str).await?);

        Self::with_parts(config, store, db)
    }

    /// Assemble the service around an existing store and database
    pub fn with_parts(config: Config, store: SharedStore, db: Arc<Database>) -> Result<Self> {
        let http = build_client(config.http.timeout_secs)?;
        let endpoints = config.endpoints.clone();
        let key_store = Arc::new(KeyStore::new(Arc::clone(&store)));
        let rotator = QuotaRotator::new(Arc::clone(&key_store));

        Ok(Self {
            content: ContentLibrary::new(Arc::clone(&store)),
            toggles: PlatformToggles::new(Arc::clone(&store)),
            publisher: Publisher::new(
                Arc::clone(&key_store),
                Arc::clone(&db),
                endpoints.clone(),
                http.clone(),
            ),
            enhancer: ContentEnhancer::new(rotator.clone(), endpoints.clone(), http.clone()),
            media: MediaBuffer::new(
                Arc::clone(&store),
                Arc::clone(&key_store),
                endpoints.clone(),
                http.clone(),
            ),
            analytics: AnalyticsCollector::new(
                Arc::clone(&store),
                Arc::clone(&key_store),
                endpoints,
                http,
            ),
            schedule: WeeklySchedule::new(store),
            tasks: TaskQueue::new(Arc::clone(&db)),
            config: Arc::new(config),
            db,
            key_store,
            rotator,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn key_store(&self) -> &KeyStore {
        &self.key_store
    }

    pub fn rotator(&self) -> &QuotaRotator {
        &self.rotator
    }

    pub fn content(&self) -> &ContentLibrary {
        &self.content
    }

    pub fn toggles(&self) -> &PlatformToggles {
        &self.toggles
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    pub fn enhancer(&self) -> &ContentEnhancer {
        &self.enhancer
    }

    pub fn media(&self) -> &MediaBuffer {
        &self.media
    }

    pub fn analytics(&self) -> &AnalyticsCollector {
        &self.analytics
    }

    pub fn schedule(&self) -> &WeeklySchedule {
        &self.schedule
    }

    pub fn tasks(&self) -> &TaskQueue {
        &self.tasks
    }

    pub fn credentials(&self) -> Result<CredentialSet> {
        self.key_store.load()
    }

    /// Readiness of every platform under the current credentials
    pub fn platform_readiness(&self) -> Result<Vec<(PlatformId, bool)>> {
        Ok(readiness(&self.key_store.load()?))
    }

    /// Platforms to publish to when the caller names none
    ///
    /// These are the enabled platforms, in canonical order.
    pub fn default_targets(&self) -> Result<Vec<PlatformId>> {
        let credentials = self.key_store.load()?;
        self.toggles.enabled_platforms(&credentials)
    }

    /// Publish a stored content item and update its status
    ///
    /// An empty `platforms` slice means [`default_targets`](Self::default_targets).
    pub async fn publish_content(
        &self,
        content_id: &str,
        platforms: &[PlatformId],
    ) -> Result<PublishReport> {
        let item = self.content.get(content_id)?;
        let targets = if platforms.is_empty() {
            self.default_targets()?
        } else {
            platforms.to_vec()
        };
        if targets.is_empty() {
            return Err(AstrumError::InvalidInput(
                "No target platforms selected".to_string(),
            ));
        }

        let report = self.publisher.publish(&item, &targets).await?;
        self.refresh_status(content_id).await?;
        Ok(report)
    }

    /// Re-publish to every platform whose last attempt failed
    pub async fn retry_failed(&self, content_id: &str) -> Result<PublishReport> {
        let item = self.content.get(content_id)?;
        let report = self.publisher.retry_failed(&item).await?;
        if !report.is_empty() {
            self.refresh_status(content_id).await?;
        }
        Ok(report)
    }

    /// Recompute a content item's status from all of its publish records
    async fn refresh_status(&self, content_id: &str) -> Result<PublishStatus> {
        let records = self.publisher.records(content_id).await?;
        let status = if records.iter().any(|r| r.status == RecordStatus::Published) {
            PublishStatus::Published
        } else {
            PublishStatus::Failed
        };
        self.content.set_status(content_id, status)?;
        tracing::debug!("Content {} is now {}", content_id, status);
        Ok(status)
    }

    /// Mark an item scheduled and queue its publication
    pub async fn schedule_publish(
        &self,
        content_id: &str,
        platforms: Vec<PlatformId>,
        when: DateTime<Utc>,
    ) -> Result<ScheduledTask> {
        self.content.schedule(content_id, when)?;
        self.tasks
            .enqueue_kind(
                &TaskKind::PublishContent {
                    content_id: content_id.to_string(),
                    platforms,
                },
                when,
            )
            .await
    }

    /// Drain due tasks using the configured batch limit
    pub async fn process_due_tasks(&self) -> Result<DrainSummary> {
        self.tasks
            .process_due(self.config.scheduler.batch_limit as usize, self)
            .await
    }

    /// Analytics collection followed by the AI usage reset
    ///
    /// A collection failure is logged and does not prevent the reset.
    pub async fn run_daily_maintenance(&self) -> Result<()> {
        match self.analytics.collect().await {
            Ok(snapshots) => tracing::info!("Stored {} analytics snapshot(s)", snapshots.len()),
            Err(e) => tracing::error!("Analytics collection failed: {}", e),
        }
        self.rotator.reset_daily_usage()?;
        tracing::info!("AI usage counters reset");
        Ok(())
    }

    /// A scheduler firing at the configured daily time
    pub fn daily_scheduler(&self) -> Result<(DailyScheduler, SchedulerHandle)> {
        Ok(DailyScheduler::new(self.config.scheduler.daily_time()?))
    }

    /// Overall status implied by a report
    pub fn report_status(report: &PublishReport) -> PublishStatus {
        overall_status(report.values())
    }
}
