//! AI provider rotation by daily quota
//!
//! Providers are tried in a fixed priority order: primary (`openai`),
//! secondary (`gemini`), backup (`backupAi1`). A provider is eligible when its
//! key is non-empty and its `usageCount` is below its `dailyLimit`. Picking a
//! provider consumes one unit of its quota and persists the credential set
//! before the key is handed out.

use std::sync::Arc;

use serde::Serialize;

use crate::credentials::{AiProviderKind, CredentialSet, KeyStore};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderSlot {
    Primary,
    Secondary,
    Backup,
}

impl ProviderSlot {
    pub const PRIORITY: [ProviderSlot; 3] = [Self::Primary, Self::Secondary, Self::Backup];

    /// Credential document section backing this slot
    pub fn section(&self) -> &'static str {
        match self {
            Self::Primary => "openai",
            Self::Secondary => "gemini",
            Self::Backup => "backupAi1",
        }
    }
}

/// Outcome of a provider selection
///
/// An empty `api_key` means no provider is available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSelection {
    pub slot: ProviderSlot,
    pub provider: AiProviderKind,
    pub api_key: String,
}

impl ProviderSelection {
    pub fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }
}

/// Per-provider quota snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderUsage {
    pub slot: ProviderSlot,
    pub provider: AiProviderKind,
    pub configured: bool,
    pub usage_count: u32,
    pub daily_limit: u32,
}

fn slot_state(credentials: &CredentialSet, slot: ProviderSlot) -> ProviderUsage {
    let (provider, api_key, usage_count, daily_limit) = match slot {
        ProviderSlot::Primary => (
            AiProviderKind::OpenAi,
            &credentials.openai.api_key,
            credentials.openai.usage_count,
            credentials.openai.daily_limit,
        ),
        ProviderSlot::Secondary => (
            AiProviderKind::Gemini,
            &credentials.gemini.api_key,
            credentials.gemini.usage_count,
            credentials.gemini.daily_limit,
        ),
        ProviderSlot::Backup => (
            credentials.backup_ai1.provider,
            &credentials.backup_ai1.api_key,
            credentials.backup_ai1.usage_count,
            credentials.backup_ai1.daily_limit,
        ),
    };
    ProviderUsage {
        slot,
        provider,
        configured: !api_key.is_empty(),
        usage_count,
        daily_limit,
    }
}

fn slot_key(credentials: &CredentialSet, slot: ProviderSlot) -> &str {
    match slot {
        ProviderSlot::Primary => &credentials.openai.api_key,
        ProviderSlot::Secondary => &credentials.gemini.api_key,
        ProviderSlot::Backup => &credentials.backup_ai1.api_key,
    }
}

fn bump_usage(credentials: &mut CredentialSet, slot: ProviderSlot) {
    let counter = match slot {
        ProviderSlot::Primary => &mut credentials.openai.usage_count,
        ProviderSlot::Secondary => &mut credentials.gemini.usage_count,
        ProviderSlot::Backup => &mut credentials.backup_ai1.usage_count,
    };
    *counter = counter.saturating_add(1);
}

/// First eligible slot in priority order
pub fn eligible_slot(credentials: &CredentialSet) -> Option<ProviderSlot> {
    ProviderSlot::PRIORITY.into_iter().find(|slot| {
        let state = slot_state(credentials, *slot);
        state.configured && state.usage_count < state.daily_limit
    })
}

/// Pick a provider, consuming one unit of its quota
///
/// When nothing is eligible the primary key is returned untouched, even if
/// it is over quota or empty.
pub fn select_from(credentials: &mut CredentialSet) -> ProviderSelection {
    match eligible_slot(credentials) {
        Some(slot) => {
            bump_usage(credentials, slot);
            let state = slot_state(credentials, slot);
            ProviderSelection {
                slot,
                provider: state.provider,
                api_key: slot_key(credentials, slot).to_string(),
            }
        }
        None => ProviderSelection {
            slot: ProviderSlot::Primary,
            provider: AiProviderKind::OpenAi,
            api_key: credentials.openai.api_key.clone(),
        },
    }
}

/// Rotates across AI providers backed by the [`KeyStore`]
#[derive(Clone)]
pub struct QuotaRotator {
    key_store: Arc<KeyStore>,
}

impl QuotaRotator {
    pub fn new(key_store: Arc<KeyStore>) -> Self {
        Self { key_store }
    }

    /// Select the next provider with remaining quota
    ///
    /// The check and the increment happen inside one locked
    /// read-modify-write, so two selections in this process never consume
    /// the same unit of quota.
    pub fn select_provider(&self) -> Result<ProviderSelection> {
        let selection = self.key_store.update(select_from)?;
        if selection.is_available() {
            tracing::debug!(
                "Selected AI provider {} ({:?})",
                selection.provider,
                selection.slot
            );
        } else {
            tracing::warn!("No AI provider configured");
        }
        Ok(selection)
    }

    /// Quota snapshot for every provider slot
    pub fn usage_report(&self) -> Result<Vec<ProviderUsage>> {
        let credentials = self.key_store.load()?;
        Ok(ProviderSlot::PRIORITY
            .into_iter()
            .map(|slot| slot_state(&credentials, slot))
            .collect())
    }

    pub fn reset_daily_usage(&self) -> Result<()> {
        self.key_store.reset_daily_usage()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn rotator_with(credentials: CredentialSet) -> (QuotaRotator, Arc<KeyStore>) {
        let key_store = Arc::new(KeyStore::new(MemoryStore::shared()));
        key_store.save(&credentials).unwrap();
        (QuotaRotator::new(Arc::clone(&key_store)), key_store)
    }

    #[test]
    fn test_primary_preferred_when_available() {
        let mut credentials = CredentialSet::default();
        credentials.openai.api_key = "sk-primary".to_string();
        credentials.gemini.api_key = "gm-secondary".to_string();
        let (rotator, key_store) = rotator_with(credentials);

        let selection = rotator.select_provider().unwrap();
        assert_eq!(selection.slot, ProviderSlot::Primary);
        assert_eq!(selection.provider, AiProviderKind::OpenAi);
        assert_eq!(selection.api_key, "sk-primary");
        assert_eq!(key_store.load().unwrap().openai.usage_count, 1);
        assert_eq!(key_store.load().unwrap().gemini.usage_count, 0);
    }

    #[test]
    fn test_exhausted_primary_and_empty_secondary_falls_to_backup() {
        let mut credentials = CredentialSet::default();
        credentials.openai.api_key = "sk-primary".to_string();
        credentials.openai.usage_count = 100;
        credentials.openai.daily_limit = 100;
        credentials.gemini.api_key = String::new();
        credentials.backup_ai1.api_key = "x".to_string();
        credentials.backup_ai1.usage_count = 0;
        credentials.backup_ai1.daily_limit = 10;
        let (rotator, key_store) = rotator_with(credentials);

        let selection = rotator.select_provider().unwrap();
        assert_eq!(selection.slot, ProviderSlot::Backup);
        assert_eq!(selection.provider, AiProviderKind::OpenAi);
        assert_eq!(selection.api_key, "x");

        let stored = key_store.load().unwrap();
        assert_eq!(stored.backup_ai1.usage_count, 1);
        assert_eq!(stored.openai.usage_count, 100);
    }

    #[test]
    fn test_backup_reports_its_configured_provider() {
        let mut credentials = CredentialSet::default();
        credentials.backup_ai1.api_key = "gm".to_string();
        credentials.backup_ai1.provider = AiProviderKind::Gemini;
        let (rotator, _) = rotator_with(credentials);

        let selection = rotator.select_provider().unwrap();
        assert_eq!(selection.slot, ProviderSlot::Backup);
        assert_eq!(selection.provider, AiProviderKind::Gemini);
    }

    #[test]
    fn test_all_exhausted_returns_primary_without_increment() {
        let mut credentials = CredentialSet::default();
        credentials.openai.api_key = "sk-primary".to_string();
        credentials.openai.usage_count = 100;
        credentials.gemini.api_key = "gm".to_string();
        credentials.gemini.usage_count = 100;
        credentials.backup_ai1.api_key = "bk".to_string();
        credentials.backup_ai1.usage_count = 50;
        let (rotator, key_store) = rotator_with(credentials);

        let selection = rotator.select_provider().unwrap();
        assert_eq!(selection.slot, ProviderSlot::Primary);
        assert_eq!(selection.api_key, "sk-primary");
        assert!(selection.is_available());
        assert_eq!(key_store.load().unwrap().openai.usage_count, 100);
    }

    #[test]
    fn test_nothing_configured_returns_empty_key() {
        let (rotator, _) = rotator_with(CredentialSet::default());
        let selection = rotator.select_provider().unwrap();
        assert!(!selection.is_available());
        assert_eq!(selection.slot, ProviderSlot::Primary);
    }

    #[test]
    fn test_selection_never_exceeds_limits() {
        let mut credentials = CredentialSet::default();
        credentials.openai.api_key = "a".to_string();
        credentials.openai.daily_limit = 2;
        credentials.gemini.api_key = "b".to_string();
        credentials.gemini.daily_limit = 1;
        credentials.backup_ai1.api_key = "c".to_string();
        credentials.backup_ai1.daily_limit = 3;

        let mut picks = Vec::new();
        for _ in 0..8 {
            picks.push(select_from(&mut credentials).slot);
            assert!(credentials.openai.usage_count <= credentials.openai.daily_limit);
            assert!(credentials.gemini.usage_count <= credentials.gemini.daily_limit);
            assert!(credentials.backup_ai1.usage_count <= credentials.backup_ai1.daily_limit);
        }

        use ProviderSlot::*;
        assert_eq!(
            picks,
            vec![Primary, Primary, Secondary, Backup, Backup, Backup, Primary, Primary]
        );
        assert_eq!(credentials.openai.usage_count, 2);
    }

    #[test]
    fn test_concurrent_selections_do_not_share_quota() {
        let mut credentials = CredentialSet::default();
        credentials.openai.api_key = "a".to_string();
        credentials.openai.daily_limit = 5;
        let (rotator, key_store) = rotator_with(credentials);

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let rotator = rotator.clone();
                std::thread::spawn(move || rotator.select_provider().unwrap())
            })
            .collect();
        let selections: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(selections.iter().all(|s| s.slot == ProviderSlot::Primary));
        assert_eq!(key_store.load().unwrap().openai.usage_count, 5);
    }

    #[test]
    fn test_usage_report() {
        let mut credentials = CredentialSet::default();
        credentials.gemini.api_key = "gm".to_string();
        credentials.gemini.usage_count = 3;
        let (rotator, _) = rotator_with(credentials);

        let report = rotator.usage_report().unwrap();
        assert_eq!(report.len(), 3);
        assert!(!report[0].configured);
        assert!(report[1].configured);
        assert_eq!(report[1].usage_count, 3);
        assert_eq!(report[2].daily_limit, 50);
    }
}
