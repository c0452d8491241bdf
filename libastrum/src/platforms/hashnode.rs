//! Hashnode platform implementation
//!
//! Publishes through the GraphQL `publishPost` mutation. A GraphQL answer
//! carrying `errors` is a failure even when the HTTP status is 200.

use async_trait::async_trait;
use serde::Serialize;

use crate::credentials::HashnodeCredentials;
use crate::error::{PlatformError, Result};
use crate::http::send_json;
use crate::platforms::{not_configured, Platform, PlatformId, PublishedPost};
use crate::types::ContentItem;

const PUBLISH_POST_MUTATION: &str = "mutation PublishPost($input: PublishPostInput!) { \
publishPost(input: $input) { post { id slug url } } }";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishPostRequest {
    pub query: String,
    pub variables: PublishPostVariables,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishPostVariables {
    pub input: PublishPostInput,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishPostInput {
    pub title: String,
    pub content_markdown: String,
    pub tags: Vec<HashnodeTag>,
    pub publication_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image_options: Option<CoverImageOptions>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HashnodeTag {
    pub slug: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverImageOptions {
    pub cover_image_url: String,
}

/// Lowercase slug made of alphanumerics separated by single hyphens
fn slugify(tag: &str) -> String {
    tag.trim()
        .trim_start_matches('#')
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

pub(crate) fn build_payload(
    content: &ContentItem,
    credentials: &HashnodeCredentials,
) -> Result<PublishPostRequest> {
    if credentials.publication_id.trim().is_empty() {
        return Err(PlatformError::Validation(
            "Hashnode publicationId is not configured".to_string(),
        )
        .into());
    }

    let tags = content
        .tags
        .iter()
        .filter_map(|tag| {
            let slug = slugify(tag);
            (!slug.is_empty()).then(|| HashnodeTag {
                slug,
                name: tag.trim().trim_start_matches('#').to_string(),
            })
        })
        .collect();

    let cover_image_options = content
        .cover_image
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(|url| CoverImageOptions {
            cover_image_url: url.to_string(),
        });

    Ok(PublishPostRequest {
        query: PUBLISH_POST_MUTATION.to_string(),
        variables: PublishPostVariables {
            input: PublishPostInput {
                title: content.title.clone(),
                content_markdown: content.body.clone(),
                tags,
                publication_id: credentials.publication_id.trim().to_string(),
                cover_image_options,
            },
        },
    })
}

pub struct HashnodePlatform {
    credentials: HashnodeCredentials,
    base_url: String,
    http: reqwest::Client,
    configured: bool,
}

impl HashnodePlatform {
    pub fn new(
        credentials: HashnodeCredentials,
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
impl Platform for HashnodePlatform {
    fn id(&self) -> PlatformId {
        PlatformId::Hashnode
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
            .post(self.base_url.trim_end_matches('/'))
            .header("Authorization", self.credentials.token.trim())
            .json(&payload);
        let response = send_json("Hashnode", request)
            .await
            .map_err(PlatformError::Transport)?;

        if let Some(message) = response.str_at("/errors/0/message") {
            return Err(PlatformError::Transport(format!(
                "Hashnode API error: {} - {}",
                response.status.as_u16(),
                message
            ))
            .into());
        }

        let post_id = response.str_at("/data/publishPost/post/id").map(String::from);
        let url = response.str_at("/data/publishPost/post/url").map(String::from);
        tracing::debug!("Published to Hashnode: {:?}", url);

        Ok(PublishedPost {
            platform_post_id: post_id,
            url,
        })
    }
}
