//! YouTube platform implementation
//!
//! Inserts video metadata through the Data API v3. Uploading the media
//! bytes themselves is left to resumable upload tooling.

use async_trait::async_trait;
use serde::Serialize;

use crate::config::join_url;
use crate::credentials::YoutubeCredentials;
use crate::error::{PlatformError, Result};
use crate::http::send_json;
use crate::platforms::{not_configured, truncate_chars, Platform, PlatformId, PublishedPost};
use crate::types::ContentItem;

/// "People & Blogs"
const DEFAULT_CATEGORY_ID: &str = "22";
const TITLE_LIMIT: usize = 100;
const DESCRIPTION_LIMIT: usize = 5000;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoInsertRequest {
    pub snippet: VideoSnippet,
    pub status: VideoStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSnippet {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStatus {
    pub privacy_status: String,
}

pub(crate) fn build_payload(content: &ContentItem) -> VideoInsertRequest {
    VideoInsertRequest {
        snippet: VideoSnippet {
            title: truncate_chars(content.title.trim(), TITLE_LIMIT),
            description: truncate_chars(content.body.trim(), DESCRIPTION_LIMIT),
            tags: content
                .tags
                .iter()
                .map(|t| t.trim().trim_start_matches('#').to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            category_id: DEFAULT_CATEGORY_ID.to_string(),
        },
        status: VideoStatus {
            privacy_status: "public".to_string(),
        },
    }
}

pub struct YoutubePlatform {
    credentials: YoutubeCredentials,
    base_url: String,
    http: reqwest::Client,
    configured: bool,
}

impl YoutubePlatform {
    pub fn new(
        credentials: YoutubeCredentials,
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
impl Platform for YoutubePlatform {
    fn id(&self) -> PlatformId {
        PlatformId::Youtube
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
            .post(join_url(&self.base_url, "/youtube/v3/videos"))
            .query(&[("part", "snippet,status")])
            .bearer_auth(self.credentials.access_token.trim())
            .json(&build_payload(content));
        let response = send_json("YouTube", request)
            .await
            .map_err(PlatformError::Transport)?;

        let video_id = response.str_at("/id").map(String::from);
        let url = video_id
            .as_ref()
            .map(|id| format!("https://www.youtube.com/watch?v={}", id));

        Ok(PublishedPost {
            platform_post_id: video_id,
            url,
        })
    }
}
