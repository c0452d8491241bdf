//! Core types for Astrumverse

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const EXCERPT_LENGTH: usize = 160;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PublishStatus {
    #[default]
    Draft,
    Scheduled,
    Published,
    Failed,
}

impl PublishStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Scheduled => "scheduled",
            Self::Published => "published",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PublishStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of content; also decides which platforms it suits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Blog,
    Feed,
    Reel,
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "blog" => Ok(Self::Blog),
            "feed" => Ok(Self::Feed),
            "reel" => Ok(Self::Reel),
            _ => Err(format!(
                "Invalid category: '{}'. Valid options: blog, feed, reel",
                s
            )),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blog => write!(f, "blog"),
            Self::Feed => write!(f, "feed"),
            Self::Reel => write!(f, "reel"),
        }
    }
}

/// Canonical in-app representation of a piece of publishable content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: String,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub author: String,
    /// Ordered; duplicates are kept as entered
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub media_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub publish_status: PublishStatus,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub scheduled_for: Option<DateTime<Utc>>,
}

impl ContentItem {
    pub fn new(title: String, body: String) -> Self {
        let now = Utc::now();
        let excerpt = make_excerpt(&body);
        Self {
            id: Uuid::new_v4().to_string(),
            title,
            body,
            excerpt,
            author: String::new(),
            tags: Vec::new(),
            cover_image: None,
            media_urls: Vec::new(),
            created_at: now,
            updated_at: now,
            publish_status: PublishStatus::Draft,
            category: Category::Blog,
            scheduled_for: None,
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_media(mut self, media_urls: Vec<String>) -> Self {
        self.media_urls = media_urls;
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    /// Media URLs with blank entries dropped
    pub fn media(&self) -> impl Iterator<Item = &str> {
        self.media_urls
            .iter()
            .map(|u| u.trim())
            .filter(|u| !u.is_empty())
    }

    /// Excerpt, derived from the body when none was given
    pub fn summary(&self) -> String {
        if self.excerpt.trim().is_empty() {
            make_excerpt(&self.body)
        } else {
            self.excerpt.clone()
        }
    }

    /// Tags rendered as `#tag` tokens separated by spaces
    pub fn hashtags(&self) -> String {
        self.tags
            .iter()
            .map(|t| t.trim().trim_start_matches('#'))
            .filter(|t| !t.is_empty())
            .map(|t| format!("#{}", t.replace(' ', "")))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// First sentence-ish chunk of the body, capped at 160 characters
fn make_excerpt(body: &str) -> String {
    let flat = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= EXCERPT_LENGTH {
        return flat;
    }
    let mut excerpt: String = flat.chars().take(EXCERPT_LENGTH - 3).collect();
    excerpt.push_str("...");
    excerpt
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Published,
    Failed,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Published => "published",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "published" => Self::Published,
            _ => Self::Failed,
        }
    }
}

/// Outcome of publishing one content item to one platform
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRecord {
    pub id: Option<i64>,
    pub content_id: String,
    pub platform: String,
    pub status: RecordStatus,
    pub url: Option<String>,
    pub platform_post_id: Option<String>,
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!(
                "Invalid task status: '{}'. Valid options: pending, completed, failed",
                s
            )),
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A row of the pending-task table
///
/// Timestamps are Unix seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub id: String,
    pub task_type: String,
    pub task_data: serde_json::Value,
    pub status: TaskStatus,
    pub scheduled_for: i64,
    pub executed_at: Option<i64>,
    /// Result JSON on completion, error message on failure
    pub result: Option<String>,
    pub created_at: i64,
}

impl ScheduledTask {
    pub fn new(task_type: &str, task_data: serde_json::Value, scheduled_for: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            task_type: task_type.to_string(),
            task_data,
            status: TaskStatus::Pending,
            scheduled_for,
            executed_at: None,
            result: None,
            created_at: Utc::now().timestamp(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

impl MediaType {
    /// Guess from a file name, defaulting to image
    pub fn from_filename(filename: &str) -> Self {
        let ext = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "mp4" | "mov" | "m4v" | "webm" | "avi" | "mkv" => Self::Video,
            _ => Self::Image,
        }
    }
}

/// Lifecycle of a buffered media file; only ever moves forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaStatus {
    Uploaded,
    Processed,
    Published,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: String,
    pub filename: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    /// Public URL usable by publishing platforms
    pub url: String,
    /// Path of the file in remote storage
    pub remote_path: String,
    pub platform: String,
    pub status: MediaStatus,
    pub uploaded_at: DateTime<Utc>,
}
