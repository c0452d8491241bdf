//! Publishing platforms
//!
//! Each platform implements [`Platform`]: it turns a generic
//! [`ContentItem`] into its own typed request body ([`PlatformPayload`]) and
//! issues the publish call against its documented endpoint.
//!
//! ```no_run
//! use libastrum::platforms::{create_platform, PlatformId};
//! use libastrum::{ContentItem, CredentialSet};
//! use libastrum::config::Endpoints;
//!
//! # async fn example(credentials: CredentialSet) -> libastrum::Result<()> {
//! let http = libastrum::http::build_client(30)?;
//! let platform = create_platform(PlatformId::Devto, &credentials, &Endpoints::default(), http);
//! let content = ContentItem::new("Hello".into(), "First post".into());
//! if platform.is_configured() {
//!     let published = platform.publish(&content).await?;
//!     println!("{:?}", published.url);
//! }
//! # Ok(())
//! # }
//! ```

use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Endpoints;
use crate::credentials::CredentialSet;
use crate::error::{AstrumError, PlatformError, Result};
use crate::types::ContentItem;

pub mod devto;
pub mod hashnode;
pub mod instagram;
pub mod linkedin;
pub mod mock;
pub mod twitter;
pub mod youtube;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformId {
    Hashnode,
    Devto,
    Twitter,
    Linkedin,
    Instagram,
    Youtube,
}

impl PlatformId {
    pub const ALL: [PlatformId; 6] = [
        Self::Hashnode,
        Self::Devto,
        Self::Twitter,
        Self::Linkedin,
        Self::Instagram,
        Self::Youtube,
    ];

    /// Lowercase identifier used in storage and on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hashnode => "hashnode",
            Self::Devto => "devto",
            Self::Twitter => "twitter",
            Self::Linkedin => "linkedin",
            Self::Instagram => "instagram",
            Self::Youtube => "youtube",
        }
    }

    /// Name used in user-facing messages
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Hashnode => "Hashnode",
            Self::Devto => "Dev.to",
            Self::Twitter => "Twitter",
            Self::Linkedin => "LinkedIn",
            Self::Instagram => "Instagram",
            Self::Youtube => "YouTube",
        }
    }

    /// Credential fields that must be non-empty before publishing
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            Self::Hashnode => &["token"],
            Self::Devto => &["apiKey"],
            Self::Twitter => &["bearerToken", "apiKey", "apiKeySecret"],
            Self::Linkedin => &["accessToken", "clientId"],
            Self::Instagram => &["accessToken", "appId"],
            Self::Youtube => &["accessToken", "clientId"],
        }
    }
}

impl FromStr for PlatformId {
    type Err = AstrumError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "hashnode" => Ok(Self::Hashnode),
            "devto" | "dev.to" => Ok(Self::Devto),
            "twitter" | "x" => Ok(Self::Twitter),
            "linkedin" => Ok(Self::Linkedin),
            "instagram" => Ok(Self::Instagram),
            "youtube" => Ok(Self::Youtube),
            _ => Err(PlatformError::Unknown(s.to_string()).into()),
        }
    }
}

impl std::fmt::Display for PlatformId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether the credential set is complete enough to publish to `platform`
///
/// Pure function of the credential set.
pub fn is_platform_ready(credentials: &CredentialSet, platform: PlatformId) -> bool {
    let filled = |s: &str| !s.trim().is_empty();
    match platform {
        PlatformId::Hashnode => filled(&credentials.hashnode.token),
        PlatformId::Devto => filled(&credentials.devto.api_key),
        PlatformId::Twitter => {
            filled(&credentials.twitter.bearer_token)
                && filled(&credentials.twitter.api_key)
                && filled(&credentials.twitter.api_key_secret)
        }
        PlatformId::Linkedin => {
            filled(&credentials.linkedin.access_token) && filled(&credentials.linkedin.client_id)
        }
        PlatformId::Instagram => {
            filled(&credentials.instagram.access_token) && filled(&credentials.instagram.app_id)
        }
        PlatformId::Youtube => {
            filled(&credentials.youtube.access_token) && filled(&credentials.youtube.client_id)
        }
    }
}

/// Readiness of every platform, in [`PlatformId::ALL`] order
pub fn readiness(credentials: &CredentialSet) -> Vec<(PlatformId, bool)> {
    PlatformId::ALL
        .into_iter()
        .map(|p| (p, is_platform_ready(credentials, p)))
        .collect()
}

/// A successfully published post
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedPost {
    pub platform_post_id: Option<String>,
    pub url: Option<String>,
}

/// Request body of a publish call, one variant per platform
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PlatformPayload {
    Hashnode(hashnode::PublishPostRequest),
    Devto(devto::ArticleRequest),
    Twitter(twitter::TweetRequest),
    Linkedin(linkedin::UgcPostRequest),
    Instagram(instagram::MediaContainerRequest),
    Youtube(youtube::VideoInsertRequest),
}

impl PlatformPayload {
    /// Build the payload for `platform` from a content item
    pub fn build(
        platform: PlatformId,
        content: &ContentItem,
        credentials: &CredentialSet,
    ) -> Result<Self> {
        Ok(match platform {
            PlatformId::Hashnode => {
                Self::Hashnode(hashnode::build_payload(content, &credentials.hashnode)?)
            }
            PlatformId::Devto => Self::Devto(devto::build_payload(content)),
            PlatformId::Twitter => Self::Twitter(twitter::build_payload(content)),
            PlatformId::Linkedin => {
                Self::Linkedin(linkedin::build_payload(content, &credentials.linkedin)?)
            }
            PlatformId::Instagram => {
                Self::Instagram(instagram::build_payload(content, &credentials.instagram)?)
            }
            PlatformId::Youtube => Self::Youtube(youtube::build_payload(content)),
        })
    }

    pub fn platform(&self) -> PlatformId {
        match self {
            Self::Hashnode(_) => PlatformId::Hashnode,
            Self::Devto(_) => PlatformId::Devto,
            Self::Twitter(_) => PlatformId::Twitter,
            Self::Linkedin(_) => PlatformId::Linkedin,
            Self::Instagram(_) => PlatformId::Instagram,
            Self::Youtube(_) => PlatformId::Youtube,
        }
    }

    /// Wire representation of the payload
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Unified interface over publishing destinations
#[async_trait]
pub trait Platform: Send + Sync {
    fn id(&self) -> PlatformId;

    /// Whether the platform's credentials are complete enough to publish
    fn is_configured(&self) -> bool;

    /// Publish content and return the platform's post id and URL
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Transport` for network failures and non-2xx
    /// answers, `PlatformError::Validation` for content the platform cannot
    /// express (e.g. Instagram without media).
    async fn publish(&self, content: &ContentItem) -> Result<PublishedPost>;

    fn name(&self) -> &'static str {
        self.id().as_str()
    }
}

/// Error for a platform whose credentials are incomplete
pub(crate) fn not_configured(platform: PlatformId) -> AstrumError {
    PlatformError::ConfigMissing(format!(
        "{} credentials are not configured",
        platform.display_name()
    ))
    .into()
}

/// Create the client for one platform
pub fn create_platform(
    platform: PlatformId,
    credentials: &CredentialSet,
    endpoints: &Endpoints,
    http: reqwest::Client,
) -> Box<dyn Platform> {
    let ready = is_platform_ready(credentials, platform);
    match platform {
        PlatformId::Hashnode => Box::new(hashnode::HashnodePlatform::new(
            credentials.hashnode.clone(),
            endpoints.hashnode.clone(),
            http,
            ready,
        )),
        PlatformId::Devto => Box::new(devto::DevtoPlatform::new(
            credentials.devto.clone(),
            endpoints.devto.clone(),
            http,
            ready,
        )),
        PlatformId::Twitter => Box::new(twitter::TwitterPlatform::new(
            credentials.twitter.clone(),
            endpoints.twitter.clone(),
            http,
            ready,
        )),
        PlatformId::Linkedin => Box::new(linkedin::LinkedinPlatform::new(
            credentials.linkedin.clone(),
            endpoints.linkedin.clone(),
            http,
            ready,
        )),
        PlatformId::Instagram => Box::new(instagram::InstagramPlatform::new(
            credentials.instagram.clone(),
            endpoints.instagram.clone(),
            http,
            ready,
        )),
        PlatformId::Youtube => Box::new(youtube::YoutubePlatform::new(
            credentials.youtube.clone(),
            endpoints.youtube.clone(),
            http,
            ready,
        )),
    }
}

/// Truncate to `limit` characters, ending with an ellipsis when cut
pub(crate) fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(limit.saturating_sub(1)).collect();
    cut.push('…');
    cut
}
