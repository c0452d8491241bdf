//! Instagram platform implementation (Graph API)
//!
//! Publishing is two calls: create a media container for the image, then
//! publish the container.

use async_trait::async_trait;
use serde::Serialize;

use crate::config::join_url;
use crate::credentials::InstagramCredentials;
use crate::error::{PlatformError, Result};
use crate::http::send_json;
use crate::platforms::{not_configured, truncate_chars, Platform, PlatformId, PublishedPost};
use crate::types::ContentItem;

const GRAPH_VERSION: &str = "v18.0";
const CAPTION_LIMIT: usize = 2200;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaContainerRequest {
    pub image_url: String,
    pub caption: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaPublishRequest {
    pub creation_id: String,
}

fn caption(content: &ContentItem) -> String {
    let hashtags = content.hashtags();
    let text = [content.title.trim(), content.body.trim(), hashtags.as_str()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    truncate_chars(&text, CAPTION_LIMIT)
}

pub(crate) fn build_payload(
    content: &ContentItem,
    credentials: &InstagramCredentials,
) -> Result<MediaContainerRequest> {
    if credentials.user_id.trim().is_empty() {
        return Err(PlatformError::Validation(
            "Instagram userId is not configured".to_string(),
        )
        .into());
    }
    let image_url = content.media().next().ok_or_else(|| {
        PlatformError::Validation("Instagram posts require a media URL".to_string())
    })?;

    Ok(MediaContainerRequest {
        image_url: image_url.to_string(),
        caption: caption(content),
    })
}

pub struct InstagramPlatform {
    credentials: InstagramCredentials,
    base_url: String,
    http: reqwest::Client,
    configured: bool,
}

impl InstagramPlatform {
    pub fn new(
        credentials: InstagramCredentials,
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

    fn endpoint(&self, edge: &str) -> String {
        join_url(
            &self.base_url,
            &format!("/{}/{}/{}", GRAPH_VERSION, self.credentials.user_id.trim(), edge),
        )
    }
}

#[async_trait]
impl Platform for InstagramPlatform {
    fn id(&self) -> PlatformId {
        PlatformId::Instagram
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn publish(&self, content: &ContentItem) -> Result<PublishedPost> {
        if !self.configured {
            return Err(not_configured(self.id()));
        }
        let payload = build_payload(content, &self.credentials)?;
        let token = self.credentials.access_token.trim();

        let container = send_json(
            "Instagram",
            self.http
                .post(self.endpoint("media"))
                .query(&[("access_token", token)])
                .json(&payload),
        )
        .await
        .map_err(PlatformError::Transport)?;
        let creation_id = container.str_at("/id").ok_or_else(|| {
            PlatformError::Transport(format!(
                "Instagram API error: {} - media container id missing",
                container.status.as_u16()
            ))
        })?;
        tracing::debug!("Instagram media container {} created", creation_id);

        let published = send_json(
            "Instagram",
            self.http
                .post(self.endpoint("media_publish"))
                .query(&[("access_token", token)])
                .json(&MediaPublishRequest {
                    creation_id: creation_id.to_string(),
                }),
        )
        .await
        .map_err(PlatformError::Transport)?;

        Ok(PublishedPost {
            platform_post_id: published.str_at("/id").map(String::from),
            url: None,
        })
    }
}
