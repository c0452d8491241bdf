//! LinkedIn platform implementation (UGC Posts API)

use async_trait::async_trait;
use serde::Serialize;

use crate::config::join_url;
use crate::credentials::LinkedinCredentials;
use crate::error::{PlatformError, Result};
use crate::http::send_json;
use crate::platforms::{not_configured, Platform, PlatformId, PublishedPost};
use crate::types::ContentItem;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UgcPostRequest {
    pub author: String,
    pub lifecycle_state: String,
    pub specific_content: SpecificContent,
    pub visibility: Visibility,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpecificContent {
    #[serde(rename = "com.linkedin.ugc.ShareContent")]
    pub share_content: ShareContent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ShareMediaCategory {
    None,
    Image,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareContent {
    pub share_commentary: TextValue,
    pub share_media_category: ShareMediaCategory,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<MediaDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextValue {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaDescriptor {
    pub status: String,
    pub original_url: String,
    pub title: TextValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Visibility {
    #[serde(rename = "com.linkedin.ugc.MemberNetworkVisibility")]
    pub member_network_visibility: String,
}

fn commentary(content: &ContentItem) -> String {
    let hashtags = content.hashtags();
    let body = content.body.trim();
    match (body.is_empty(), hashtags.is_empty()) {
        (_, true) => body.to_string(),
        (true, false) => hashtags,
        (false, false) => format!("{}\n\n{}", body, hashtags),
    }
}

pub(crate) fn build_payload(
    content: &ContentItem,
    credentials: &LinkedinCredentials,
) -> Result<UgcPostRequest> {
    let person_id = credentials.person_id.trim();
    if person_id.is_empty() {
        return Err(PlatformError::Validation(
            "LinkedIn personId is not configured".to_string(),
        )
        .into());
    }

    let media: Vec<MediaDescriptor> = content
        .media()
        .map(|url| MediaDescriptor {
            status: "READY".to_string(),
            original_url: url.to_string(),
            title: TextValue {
                text: content.title.clone(),
            },
        })
        .collect();
    let share_media_category = if media.is_empty() {
        ShareMediaCategory::None
    } else {
        ShareMediaCategory::Image
    };

    Ok(UgcPostRequest {
        author: format!("urn:li:person:{}", person_id),
        lifecycle_state: "PUBLISHED".to_string(),
        specific_content: SpecificContent {
            share_content: ShareContent {
                share_commentary: TextValue {
                    text: commentary(content),
                },
                share_media_category,
                media,
            },
        },
        visibility: Visibility {
            member_network_visibility: "PUBLIC".to_string(),
        },
    })
}

pub struct LinkedinPlatform {
    credentials: LinkedinCredentials,
    base_url: String,
    http: reqwest::Client,
    configured: bool,
}

impl LinkedinPlatform {
    pub fn new(
        credentials: LinkedinCredentials,
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
impl Platform for LinkedinPlatform {
    fn id(&self) -> PlatformId {
        PlatformId::Linkedin
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn publish(&self, content: &ContentItem) -> Result<PublishedPost> {
        if !self.configured {
            return Err(not_configured(self.id()));
        }
        let payload = build_payload(content, &self.credentials)?;

        let request = self
            .http
            .post(join_url(&self.base_url, "/v2/ugcPosts"))
            .bearer_auth(self.credentials.access_token.trim())
            .header("X-Restli-Protocol-Version", "2.0.0")
            .json(&payload);
        let response = send_json("LinkedIn", request)
            .await
            .map_err(PlatformError::Transport)?;

        // The id is in the body for most API versions, in the header otherwise
        let post_id = response
            .str_at("/id")
            .or_else(|| response.header("x-restli-id"))
            .map(String::from);
        let url = post_id
            .as_ref()
            .map(|id| format!("https://www.linkedin.com/feed/update/{}", id));

        Ok(PublishedPost {
            platform_post_id: post_id,
            url,
        })
    }
}
