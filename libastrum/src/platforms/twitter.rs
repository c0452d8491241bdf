//! Twitter (X) platform implementation

use async_trait::async_trait;
use serde::Serialize;

use crate::config::join_url;
use crate::credentials::TwitterCredentials;
use crate::error::{PlatformError, Result};
use crate::http::send_json;
use crate::platforms::{not_configured, truncate_chars, Platform, PlatformId, PublishedPost};
use crate::types::ContentItem;

pub const TWEET_LIMIT: usize = 280;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TweetRequest {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<TweetMedia>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TweetMedia {
    pub media_ids: Vec<String>,
}

/// Title, excerpt and hashtags joined by blank lines
fn compose_text(content: &ContentItem) -> String {
    let summary = content.summary();
    let hashtags = content.hashtags();
    let parts: Vec<&str> = [content.title.trim(), summary.trim(), hashtags.as_str()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect();
    truncate_chars(&parts.join("\n\n"), TWEET_LIMIT)
}

pub(crate) fn build_payload(content: &ContentItem) -> TweetRequest {
    // Only already-uploaded media ids can be attached; plain URLs are skipped.
    let media_ids: Vec<String> = content
        .media()
        .filter(|entry| entry.chars().all(|c| c.is_ascii_digit()))
        .map(String::from)
        .collect();

    TweetRequest {
        text: compose_text(content),
        media: (!media_ids.is_empty()).then_some(TweetMedia { media_ids }),
    }
}

pub struct TwitterPlatform {
    credentials: TwitterCredentials,
    base_url: String,
    http: reqwest::Client,
    configured: bool,
}

impl TwitterPlatform {
    pub fn new(
        credentials: TwitterCredentials,
        base_url: String,
        http: reqwest::Client,
        configured: bool,
    ) -> Self {
        Self {
            credentials,
            base_url,
            http,
            configured,
        }
    }
}

#[async_trait]
impl Platform for TwitterPlatform {
    fn id(&self) -> PlatformId {
        PlatformId::Twitter
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn publish(&self, content: &ContentItem) -> Result<PublishedPost> {
        if !self.configured {
            return Err(not_configured(self.id()));
        }

        let request = self
            .http
            .post(join_url(&self.base_url, "/2/tweets"))
            .bearer_auth(self.credentials.bearer_token.trim())
            .json(&build_payload(content));
        let response = send_json("Twitter", request)
            .await
            .map_err(PlatformError::Transport)?;

        let tweet_id = response.str_at("/data/id").map(String::from);
        let url = tweet_id
            .as_ref()
            .map(|id| format!("https://twitter.com/i/web/status/{}", id));

        Ok(PublishedPost {
            platform_post_id: tweet_id,
            url,
        })
    }
}
