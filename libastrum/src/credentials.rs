//! Credential set and its persistent key store
//!
//! All provider and platform secrets live in one nested document, the
//! [`CredentialSet`], together with the per-provider AI usage counters. The
//! document is persisted under [`keys::CREDENTIALS`](crate::storage::keys)
//! with camelCase field names:
//!
//! ```json
//! {
//!   "openai": { "apiKey": "sk-...", "usageCount": 3, "dailyLimit": 100 },
//!   "backupAi1": { "provider": "gemini", "apiKey": "", "usageCount": 0, "dailyLimit": 50 },
//!   "linkedin": { "accessToken": "...", "clientId": "...", "clientSecret": "", "personId": "abc" }
//! }
//! ```
//!
//! Every field carries a default, so loading a partial document merges it
//! with the all-empty defaults.

use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AstrumError, Result, StorageError};
use crate::storage::{keys, load_json, save_json, SharedStore};

/// Which API an AI key belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AiProviderKind {
    #[default]
    OpenAi,
    Gemini,
}

impl AiProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI",
            Self::Gemini => "Gemini",
        }
    }
}

impl std::fmt::Display for AiProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AiCredentials {
    pub api_key: String,
    pub usage_count: u32,
    pub daily_limit: u32,
}

impl Default for AiCredentials {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            usage_count: 0,
            daily_limit: 100,
        }
    }
}

impl AiCredentials {
    /// Non-empty key with quota left for today
    pub fn has_quota(&self) -> bool {
        !self.api_key.is_empty() && self.usage_count < self.daily_limit
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BackupAiCredentials {
    pub provider: AiProviderKind,
    pub api_key: String,
    pub usage_count: u32,
    pub daily_limit: u32,
}

impl Default for BackupAiCredentials {
    fn default() -> Self {
        Self {
            provider: AiProviderKind::OpenAi,
            api_key: String::new(),
            usage_count: 0,
            daily_limit: 50,
        }
    }
}

impl BackupAiCredentials {
    pub fn has_quota(&self) -> bool {
        !self.api_key.is_empty() && self.usage_count < self.daily_limit
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HashnodeCredentials {
    pub token: String,
    pub publication_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DevtoCredentials {
    pub api_key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TwitterCredentials {
    pub bearer_token: String,
    pub api_key: String,
    pub api_key_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LinkedinCredentials {
    pub access_token: String,
    pub client_id: String,
    pub client_secret: String,
    /// Member id used to build the `urn:li:person:<id>` author
    pub person_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InstagramCredentials {
    pub access_token: String,
    pub app_id: String,
    /// Instagram business account id
    pub user_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct YoutubeCredentials {
    pub access_token: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DropboxCredentials {
    pub access_token: String,
}

/// The persisted document holding every secret and AI usage counter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CredentialSet {
    pub openai: AiCredentials,
    pub gemini: AiCredentials,
    pub backup_ai1: BackupAiCredentials,
    pub hashnode: HashnodeCredentials,
    pub devto: DevtoCredentials,
    pub twitter: TwitterCredentials,
    pub linkedin: LinkedinCredentials,
    pub instagram: InstagramCredentials,
    pub youtube: YoutubeCredentials,
    pub dropbox: DropboxCredentials,
}

impl CredentialSet {
    /// Zero every AI usage counter
    pub fn reset_usage(&mut self) {
        self.openai.usage_count = 0;
        self.gemini.usage_count = 0;
        self.backup_ai1.usage_count = 0;
    }

    /// Read a field by its dotted document path (e.g. `twitter.bearerToken`)
    pub fn get_field(&self, path: &str) -> Result<String> {
        let document = serde_json::to_value(self).map_err(|source| StorageError::Corrupt {
            key: keys::CREDENTIALS.to_string(),
            source,
        })?;
        let value = path
            .split('.')
            .try_fold(&document, |node, segment| node.get(segment))
            .ok_or_else(|| unknown_field(path))?;

        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            _ => Err(unknown_field(path)),
        }
    }

    /// Set a field by its dotted document path
    ///
    /// Counter fields (`usageCount`, `dailyLimit`) must be non-negative
    /// integers; `backupAi1.provider` must be `openai` or `gemini`.
    pub fn set_field(&mut self, path: &str, value: &str) -> Result<()> {
        let mut document = serde_json::to_value(&*self).map_err(|source| StorageError::Corrupt {
            key: keys::CREDENTIALS.to_string(),
            source,
        })?;

        let slot = path
            .split('.')
            .try_fold(&mut document, |node, segment| node.get_mut(segment))
            .ok_or_else(|| unknown_field(path))?;

        let replacement = match &*slot {
            Value::Number(_) => {
                let n: u32 = value.parse().map_err(|_| {
                    AstrumError::InvalidInput(format!(
                        "{} expects a non-negative integer, got '{}'",
                        path, value
                    ))
                })?;
                Value::from(n)
            }
            Value::String(_) => Value::String(value.to_string()),
            _ => return Err(unknown_field(path)),
        };
        *slot = replacement;

        *self = serde_json::from_value(document).map_err(|e| {
            AstrumError::InvalidInput(format!("Invalid value for {}: {}", path, e))
        })?;
        Ok(())
    }
}

fn unknown_field(path: &str) -> AstrumError {
    AstrumError::InvalidInput(format!("Unknown credential field: {}", path))
}

/// Mask a secret for display, keeping the last four characters
pub fn mask_secret(secret: &str) -> String {
    let count = secret.chars().count();
    if count == 0 {
        return "(not set)".to_string();
    }
    if count <= 4 {
        return "****".to_string();
    }
    let tail: String = secret.chars().skip(count - 4).collect();
    format!("****{}", tail)
}

/// Loads and persists the [`CredentialSet`]
///
/// Reads always go to the underlying store so that changes written by other
/// tools are picked up. Writes made through [`KeyStore::update`] are
/// serialized within this process.
pub struct KeyStore {
    store: SharedStore,
    write_lock: Mutex<()>,
}

impl KeyStore {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Load the credential set, merged with defaults
    pub fn load(&self) -> Result<CredentialSet> {
        Ok(load_json(self.store.as_ref(), keys::CREDENTIALS)?.unwrap_or_default())
    }

    /// Replace the persisted credential set
    pub fn save(&self, credentials: &CredentialSet) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        save_json(self.store.as_ref(), keys::CREDENTIALS, credentials)
    }

    /// Read-modify-write the credential set as one step
    ///
    /// The closure sees the freshly loaded document; whatever it leaves
    /// behind is persisted before this returns.
    pub fn update<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut CredentialSet) -> R,
    {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut credentials: CredentialSet =
            load_json(self.store.as_ref(), keys::CREDENTIALS)?.unwrap_or_default();
        let result = f(&mut credentials);
        save_json(self.store.as_ref(), keys::CREDENTIALS, &credentials)?;
        Ok(result)
    }

    /// Daily job: zero every AI usage counter
    pub fn reset_daily_usage(&self) -> Result<()> {
        self.update(|credentials| credentials.reset_usage())?;
        tracing::info!("AI provider usage counters reset");
        Ok(())
    }
}
