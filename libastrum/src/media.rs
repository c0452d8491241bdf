//! Media buffer backed by Dropbox
//!
//! Uploaded files get a public raw link that platforms can fetch. The local
//! `media_buffer` document tracks each file's lifecycle:
//! `uploaded` -> `processed` (attached to content) -> `published`.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::{join_url, Endpoints};
use crate::credentials::KeyStore;
use crate::error::{PlatformError, Result};
use crate::http::{error_message, send_json};
use crate::storage::{keys, Collection, SharedStore};
use crate::types::{MediaItem, MediaStatus, MediaType};

const REMOTE_ROOT: &str = "/astrumverse";

/// Turn a Dropbox preview link into a direct download link
pub fn raw_link(url: &str) -> String {
    if url.contains("dl=0") {
        url.replacen("dl=0", "raw=1", 1)
    } else if url.contains("raw=1") {
        url.to_string()
    } else if url.contains('?') {
        format!("{}&raw=1", url)
    } else {
        format!("{}?raw=1", url)
    }
}

/// File name reduced to characters safe in a Dropbox path
fn safe_filename(filename: &str) -> String {
    let name = Path::new(filename)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

pub struct MediaBuffer {
    items: Collection<MediaItem>,
    key_store: Arc<KeyStore>,
    endpoints: Endpoints,
    http: reqwest::Client,
}

impl MediaBuffer {
    pub fn new(
        store: SharedStore,
        key_store: Arc<KeyStore>,
        endpoints: Endpoints,
        http: reqwest::Client,
    ) -> Self {
        Self {
            items: Collection::new(store, keys::MEDIA_BUFFER),
            key_store,
            endpoints,
            http,
        }
    }

    /// Upload `bytes` and record the file
    ///
    /// Returns `None` on any failure; nothing is recorded in that case.
    pub async fn upload(&self, filename: &str, bytes: Vec<u8>, platform: &str) -> Option<MediaItem> {
        match self.try_upload(filename, bytes, platform).await {
            Ok(item) => {
                tracing::info!("Buffered {} for {} at {}", item.filename, platform, item.url);
                Some(item)
            }
            Err(e) => {
                tracing::warn!("Media upload of {} failed: {}", filename, e);
                None
            }
        }
    }

    /// Read a local file and [`upload`](Self::upload) it
    pub async fn upload_file(&self, path: &Path, platform: &str) -> Option<MediaItem> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Cannot read {}: {}", path.display(), e);
                return None;
            }
        };
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload".to_string());
        self.upload(&filename, bytes, platform).await
    }

    async fn try_upload(&self, filename: &str, bytes: Vec<u8>, platform: &str) -> Result<MediaItem> {
        let token = self.access_token()?;
        let remote_path = format!(
            "{}/{}/{}_{}",
            REMOTE_ROOT,
            platform,
            Utc::now().timestamp_millis(),
            safe_filename(filename)
        );

        let api_arg = json!({
            "path": remote_path,
            "mode": "add",
            "autorename": true,
            "mute": true,
        });
        let request = self
            .http
            .post(join_url(&self.endpoints.dropbox_content, "/2/files/upload"))
            .bearer_auth(&token)
            .header("Dropbox-API-Arg", api_arg.to_string())
            .header("Content-Type", "application/octet-stream")
            .body(bytes);
        let uploaded = send_json("Dropbox", request)
            .await
            .map_err(PlatformError::Transport)?;
        let stored_path = uploaded
            .str_at("/path_display")
            .unwrap_or(&remote_path)
            .to_string();

        let url = self.shared_link(&token, &stored_path).await?;

        let item = MediaItem {
            id: Uuid::new_v4().to_string(),
            filename: filename.to_string(),
            media_type: MediaType::from_filename(filename),
            url: raw_link(&url),
            remote_path: stored_path,
            platform: platform.to_string(),
            status: MediaStatus::Uploaded,
            uploaded_at: Utc::now(),
        };
        self.items.update(|items| items.push(item.clone()))?;
        Ok(item)
    }

    /// Create a public link, reusing the existing one if Dropbox has it
    async fn shared_link(&self, token: &str, remote_path: &str) -> Result<String> {
        let response = self
            .http
            .post(join_url(
                &self.endpoints.dropbox_api,
                "/2/sharing/create_shared_link_with_settings",
            ))
            .bearer_auth(token)
            .json(&json!({
                "path": remote_path,
                "settings": {"requested_visibility": "public"},
            }))
            .send()
            .await
            .map_err(|e| PlatformError::Transport(format!("Dropbox API error: network - {}", e)))?;

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);

        let url = if status.is_success() {
            body.pointer("/url").and_then(Value::as_str)
        } else {
            body.pointer("/error/shared_link_already_exists/metadata/url")
                .and_then(Value::as_str)
        };

        url.map(String::from).ok_or_else(|| {
            PlatformError::Transport(format!(
                "Dropbox API error: {} - {}",
                status.as_u16(),
                error_message(&body, status)
            ))
            .into()
        })
    }

    fn access_token(&self) -> Result<String> {
        let token = self.key_store.load()?.dropbox.access_token;
        if token.trim().is_empty() {
            return Err(PlatformError::ConfigMissing(
                "Dropbox credentials are not configured".to_string(),
            )
            .into());
        }
        Ok(token.trim().to_string())
    }

    /// Buffered items, optionally for one platform, newest first
    pub fn list(&self, platform: Option<&str>) -> Result<Vec<MediaItem>> {
        let mut items: Vec<MediaItem> = self
            .items
            .load()?
            .into_iter()
            .filter(|item| platform.is_none_or(|p| item.platform == p))
            .collect();
        items.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(items)
    }

    /// Items for `platform` not yet attached to any content
    pub fn unused(&self, platform: &str) -> Result<Vec<MediaItem>> {
        Ok(self
            .list(Some(platform))?
            .into_iter()
            .filter(|item| item.status == MediaStatus::Uploaded)
            .collect())
    }

    /// Advance an item to `processed`
    pub fn mark_used(&self, id: &str) -> Result<Option<MediaItem>> {
        self.advance(id, MediaStatus::Processed)
    }

    /// Advance an item to `published`
    pub fn mark_published(&self, id: &str) -> Result<Option<MediaItem>> {
        self.advance(id, MediaStatus::Published)
    }

    /// Status never moves backwards
    fn advance(&self, id: &str, status: MediaStatus) -> Result<Option<MediaItem>> {
        self.items.update(|items| {
            items.iter_mut().find(|item| item.id == id).map(|item| {
                item.status = item.status.max(status);
                item.clone()
            })
        })
    }

    /// Delete the local record; returns whether it existed
    pub fn remove(&self, id: &str) -> Result<bool> {
        self.items.update(|items| {
            let before = items.len();
            items.retain(|item| item.id != id);
            items.len() != before
        })
    }

    /// Best-effort deletion of the remote file
    pub async fn delete_remote(&self, item: &MediaItem) -> bool {
        let token = match self.access_token() {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!("Cannot delete {}: {}", item.remote_path, e);
                return false;
            }
        };
        let request = self
            .http
            .post(join_url(&self.endpoints.dropbox_api, "/2/files/delete_v2"))
            .bearer_auth(token)
            .json(&json!({"path": item.remote_path}));

        match send_json("Dropbox", request).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("{}", e);
                false
            }
        }
    }
}
