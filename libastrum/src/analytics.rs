//! Daily analytics collection
//!
//! Pulls simple counters from the platforms that expose them and keeps a
//! rolling log under `analytics_log`. Only the last 30 days are retained.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{join_url, Endpoints};
use crate::credentials::{CredentialSet, KeyStore};
use crate::error::{PlatformError, Result};
use crate::http::send_json;
use crate::platforms::{is_platform_ready, PlatformId};
use crate::storage::{keys, Collection, SharedStore};

pub const RETENTION_DAYS: i64 = 30;

/// Platforms with a counters endpoint
pub const COLLECTED_PLATFORMS: [PlatformId; 3] =
    [PlatformId::Devto, PlatformId::Twitter, PlatformId::Youtube];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsSnapshot {
    pub date: NaiveDate,
    pub platform: PlatformId,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub comments: u64,
    #[serde(default)]
    pub followers: u64,
}

impl AnalyticsSnapshot {
    fn empty(date: NaiveDate, platform: PlatformId) -> Self {
        Self {
            date,
            platform,
            views: 0,
            likes: 0,
            comments: 0,
            followers: 0,
        }
    }
}

/// Numeric field that may be encoded as a JSON number or a string
fn counter(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

/// Add `snapshots` to `log`, replacing same-day entries, and drop old ones
pub fn merge_snapshots(
    log: &mut Vec<AnalyticsSnapshot>,
    snapshots: &[AnalyticsSnapshot],
    today: NaiveDate,
) {
    for snapshot in snapshots {
        log.retain(|s| !(s.date == snapshot.date && s.platform == snapshot.platform));
        log.push(snapshot.clone());
    }
    let cutoff = today - Duration::days(RETENTION_DAYS);
    log.retain(|s| s.date > cutoff);
    log.sort_by(|a, b| a.date.cmp(&b.date).then(a.platform.cmp(&b.platform)));
}

pub struct AnalyticsCollector {
    log: Collection<AnalyticsSnapshot>,
    key_store: Arc<KeyStore>,
    endpoints: Endpoints,
    http: reqwest::Client,
}

impl AnalyticsCollector {
    pub fn new(
        store: SharedStore,
        key_store: Arc<KeyStore>,
        endpoints: Endpoints,
        http: reqwest::Client,
    ) -> Self {
        Self {
            log: Collection::new(store, keys::ANALYTICS_LOG),
            key_store,
            endpoints,
            http,
        }
    }

    /// Collect today's counters from every ready platform
    ///
    /// A platform that fails is logged and skipped. Returns the snapshots
    /// that were stored.
    pub async fn collect(&self) -> Result<Vec<AnalyticsSnapshot>> {
        let credentials = self.key_store.load()?;
        let today = Utc::now().date_naive();
        let mut snapshots = Vec::new();

        for platform in COLLECTED_PLATFORMS {
            if !is_platform_ready(&credentials, platform) {
                tracing::debug!("Skipping analytics for {}: not configured", platform);
                continue;
            }
            match self.fetch(platform, &credentials, today).await {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(e) => tracing::warn!("Analytics collection for {} failed: {}", platform, e),
            }
        }

        self.log
            .update(|log| merge_snapshots(log, &snapshots, today))?;
        tracing::info!("Collected analytics for {} platform(s)", snapshots.len());
        Ok(snapshots)
    }

    /// Stored snapshots, optionally for one platform, oldest first
    pub fn history(&self, platform: Option<PlatformId>) -> Result<Vec<AnalyticsSnapshot>> {
        Ok(self
            .log
            .load()?
            .into_iter()
            .filter(|s| platform.is_none_or(|p| s.platform == p))
            .collect())
    }

    async fn fetch(
        &self,
        platform: PlatformId,
        credentials: &CredentialSet,
        today: NaiveDate,
    ) -> Result<AnalyticsSnapshot> {
        let mut snapshot = AnalyticsSnapshot::empty(today, platform);

        match platform {
            PlatformId::Devto => {
                let request = self
                    .http
                    .get(join_url(&self.endpoints.devto, "/api/articles/me"))
                    .query(&[("per_page", "1000")])
                    .header("api-key", credentials.devto.api_key.trim());
                let response = send_json("Dev.to", request)
                    .await
                    .map_err(PlatformError::Transport)?;
                if let Value::Array(articles) = &response.body {
                    for article in articles {
                        snapshot.views += counter(article.get("page_views_count"));
                        snapshot.likes += counter(article.get("public_reactions_count"));
                        snapshot.comments += counter(article.get("comments_count"));
                    }
                }
            }
            PlatformId::Twitter => {
                let request = self
                    .http
                    .get(join_url(&self.endpoints.twitter, "/2/users/me"))
                    .query(&[("user.fields", "public_metrics")])
                    .bearer_auth(credentials.twitter.bearer_token.trim());
                let response = send_json("Twitter", request)
                    .await
                    .map_err(PlatformError::Transport)?;
                let metrics = response.body.pointer("/data/public_metrics");
                snapshot.followers = counter(metrics.and_then(|m| m.get("followers_count")));
                snapshot.likes = counter(metrics.and_then(|m| m.get("like_count")));
            }
            PlatformId::Youtube => {
                let request = self
                    .http
                    .get(join_url(&self.endpoints.youtube, "/youtube/v3/channels"))
                    .query(&[("part", "statistics"), ("mine", "true")])
                    .bearer_auth(credentials.youtube.access_token.trim());
                let response = send_json("YouTube", request)
                    .await
                    .map_err(PlatformError::Transport)?;
                let stats = response.body.pointer("/items/0/statistics");
                snapshot.views = counter(stats.and_then(|s| s.get("viewCount")));
                snapshot.followers = counter(stats.and_then(|s| s.get("subscriberCount")));
            }
            other => {
                return Err(PlatformError::Validation(format!(
                    "{} does not expose analytics",
                    other.display_name()
                ))
                .into())
            }
        }

        Ok(snapshot)
    }
}
