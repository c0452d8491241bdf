//! Dev.to platform implementation

use async_trait::async_trait;
use serde::Serialize;

use crate::config::join_url;
use crate::credentials::DevtoCredentials;
use crate::error::{PlatformError, Result};
use crate::http::send_json;
use crate::platforms::{not_configured, Platform, PlatformId, PublishedPost};
use crate::types::ContentItem;

/// Dev.to rejects articles with more than four tags
const MAX_TAGS: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArticleRequest {
    pub article: Article,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Article {
    pub title: String,
    pub body_markdown: String,
    pub published: bool,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Up to four lowercase alphanumeric tags, first occurrence wins
fn article_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let cleaned: String = tag
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        if !cleaned.is_empty() && !out.contains(&cleaned) {
            out.push(cleaned);
        }
        if out.len() == MAX_TAGS {
            break;
        }
    }
    out
}

pub(crate) fn build_payload(content: &ContentItem) -> ArticleRequest {
    let description = content.summary();
    ArticleRequest {
        article: Article {
            title: content.title.clone(),
            body_markdown: content.body.clone(),
            published: true,
            tags: article_tags(&content.tags),
            main_image: content
                .cover_image
                .as_deref()
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(String::from),
            description: (!description.is_empty()).then_some(description),
        },
    }
}

pub struct DevtoPlatform {
    credentials: DevtoCredentials,
    base_url: String,
    http: reqwest::Client,
    configured: bool,
}

impl DevtoPlatform {
    pub fn new(
        credentials: DevtoCredentials,
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
impl Platform for DevtoPlatform {
    fn id(&self) -> PlatformId {
        PlatformId::Devto
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
            .post(join_url(&self.base_url, "/api/articles"))
            .header("api-key", self.credentials.api_key.trim())
            .json(&build_payload(content));
        let response = send_json("Dev.to", request)
            .await
            .map_err(PlatformError::Transport)?;

        let post_id = response.body.get("id").map(|id| match id {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        });

        Ok(PublishedPost {
            platform_post_id: post_id,
            url: response.str_at("/url").map(String::from),
        })
    }
}
