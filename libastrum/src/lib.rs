//! Astrumverse - content publishing toolkit
//!
//! This library holds the core of the Astrumverse tools: credential and
//! quota management for AI providers, publishing to blog and social
//! platforms, media buffering, analytics and scheduling.

pub mod analytics;
pub mod config;
pub mod content;
pub mod credentials;
pub mod db;
pub mod enhancer;
pub mod error;
pub mod http;
pub mod logging;
pub mod media;
pub mod platforms;
pub mod publisher;
pub mod quota;
pub mod schedule;
pub mod service;
pub mod storage;
pub mod tasks;
pub mod toggles;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use credentials::{CredentialSet, KeyStore};
pub use db::Database;
pub use error::{AstrumError, Result};
pub use platforms::PlatformId;
pub use publisher::{PublishOutcome, PublishReport};
pub use service::AstrumService;
pub use types::{Category, ContentItem, PublishRecord, PublishStatus};
