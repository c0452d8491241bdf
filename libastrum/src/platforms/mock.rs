//! Mock platform implementation for testing
//!
//! A configurable stand-in for a real platform that can succeed, fail or
//! stall. Used to exercise multi-platform publishing without credentials or
//! network access.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{PlatformError, Result};
use crate::platforms::{not_configured, Platform, PlatformId, PublishedPost};
use crate::types::ContentItem;

/// Configuration for mock platform behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Platform this mock stands in for
    pub platform: PlatformId,

    /// Error message to fail with; `None` means success
    pub error: Option<String>,

    /// Delay before answering (simulates network latency)
    pub delay: Duration,

    pub is_configured: bool,

    /// Titles of content that was published, in call order
    pub published: Arc<Mutex<Vec<String>>>,
}

impl MockConfig {
    pub fn new(platform: PlatformId) -> Self {
        Self {
            platform,
            error: None,
            delay: Duration::ZERO,
            is_configured: true,
            published: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

pub struct MockPlatform {
    config: MockConfig,
}

impl MockPlatform {
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }

    /// A mock that always succeeds
    pub fn success(platform: PlatformId) -> Self {
        Self::new(MockConfig::new(platform))
    }

    /// A mock whose publish call fails with `error`
    pub fn failure(platform: PlatformId, error: &str) -> Self {
        Self::new(MockConfig {
            error: Some(error.to_string()),
            ..MockConfig::new(platform)
        })
    }

    pub fn with_delay(platform: PlatformId, delay: Duration) -> Self {
        Self::new(MockConfig {
            delay,
            ..MockConfig::new(platform)
        })
    }

    pub fn not_configured(platform: PlatformId) -> Self {
        Self::new(MockConfig {
            is_configured: false,
            ..MockConfig::new(platform)
        })
    }

    /// Shared log of published titles, readable after the mock is boxed
    pub fn published_log(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.config.published)
    }
}

#[async_trait]
impl Platform for MockPlatform {
    fn id(&self) -> PlatformId {
        self.config.platform
    }

    fn is_configured(&self) -> bool {
        self.config.is_configured
    }

    async fn publish(&self, content: &ContentItem) -> Result<PublishedPost> {
        if !self.config.is_configured {
            return Err(not_configured(self.config.platform));
        }

        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        if let Some(error) = &self.config.error {
            return Err(PlatformError::Transport(error.clone()).into());
        }

        self.config
            .published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(content.title.clone());

        let post_id = format!("{}:mock-{}", self.config.platform, uuid::Uuid::new_v4());
        Ok(PublishedPost {
            url: Some(format!("https://mock.invalid/{}", post_id)),
            platform_post_id: Some(post_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_success() {
        let platform = MockPlatform::success(PlatformId::Devto);
        let log = platform.published_log();
        let content = ContentItem::new("Hello".into(), "Body".into());

        let published = platform.publish(&content).await.unwrap();
        assert!(published
            .platform_post_id
            .unwrap()
            .starts_with("devto:mock-"));
        assert_eq!(*log.lock().unwrap(), vec!["Hello".to_string()]);
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let platform = MockPlatform::failure(PlatformId::Twitter, "Twitter API error: 500 - boom");
        let content = ContentItem::new("Hello".into(), "Body".into());

        let err = platform.publish(&content).await.unwrap_err();
        assert!(err.to_string().contains("500 - boom"));
        assert!(platform.published_log().lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mock_not_configured() {
        let platform = MockPlatform::not_configured(PlatformId::Linkedin);
        assert!(!platform.is_configured());

        let content = ContentItem::new("Hello".into(), "Body".into());
        let err = platform.publish(&content).await.unwrap_err();
        assert!(err.to_string().contains("LinkedIn credentials are not configured"));
    }

    #[tokio::test]
    async fn test_mock_with_delay() {
        let platform = MockPlatform::with_delay(PlatformId::Youtube, Duration::from_millis(50));
        let content = ContentItem::new("Hello".into(), "Body".into());

        let start = std::time::Instant::now();
        platform.publish(&content).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
