//! Per-platform publishing switches
//!
//! Stored under `platform_settings` as an object keyed by platform id. The
//! persisted `hasApiKeys` field is informational only; every read recomputes
//! it from the credential set.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::credentials::CredentialSet;
use crate::error::Result;
use crate::platforms::{is_platform_ready, PlatformId};
use crate::storage::{keys, load_json, save_json, SharedStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlatformToggle {
    pub enabled: bool,
    pub auto_publish: bool,
    pub has_api_keys: bool,
}

impl Default for PlatformToggle {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_publish: false,
            has_api_keys: false,
        }
    }
}

type ToggleMap = BTreeMap<PlatformId, PlatformToggle>;

pub struct PlatformToggles {
    store: SharedStore,
    write_lock: Mutex<()>,
}

impl PlatformToggles {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    fn load_map(&self) -> Result<ToggleMap> {
        Ok(load_json(self.store.as_ref(), keys::PLATFORM_SETTINGS)?.unwrap_or_default())
    }

    /// Toggles for every platform with `has_api_keys` derived from `credentials`
    pub fn list(&self, credentials: &CredentialSet) -> Result<Vec<(PlatformId, PlatformToggle)>> {
        let stored = self.load_map()?;
        Ok(PlatformId::ALL
            .into_iter()
            .map(|platform| {
                let mut toggle = stored.get(&platform).copied().unwrap_or_default();
                toggle.has_api_keys = is_platform_ready(credentials, platform);
                (platform, toggle)
            })
            .collect())
    }

    pub fn get(&self, credentials: &CredentialSet, platform: PlatformId) -> Result<PlatformToggle> {
        let mut toggle = self.load_map()?.get(&platform).copied().unwrap_or_default();
        toggle.has_api_keys = is_platform_ready(credentials, platform);
        Ok(toggle)
    }

    fn update(
        &self,
        credentials: &CredentialSet,
        platform: PlatformId,
        f: impl FnOnce(&mut PlatformToggle),
    ) -> Result<PlatformToggle> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut map = self.load_map()?;
        let toggle = map.entry(platform).or_default();
        f(toggle);
        toggle.has_api_keys = is_platform_ready(credentials, platform);
        let updated = *toggle;
        save_json(self.store.as_ref(), keys::PLATFORM_SETTINGS, &map)?;
        Ok(updated)
    }

    pub fn set_enabled(
        &self,
        credentials: &CredentialSet,
        platform: PlatformId,
        enabled: bool,
    ) -> Result<PlatformToggle> {
        self.update(credentials, platform, |t| t.enabled = enabled)
    }

    pub fn set_auto_publish(
        &self,
        credentials: &CredentialSet,
        platform: PlatformId,
        auto_publish: bool,
    ) -> Result<PlatformToggle> {
        self.update(credentials, platform, |t| t.auto_publish = auto_publish)
    }

    /// Platforms that are enabled and have complete credentials
    pub fn enabled_platforms(&self, credentials: &CredentialSet) -> Result<Vec<PlatformId>> {
        Ok(self
            .list(credentials)?
            .into_iter()
            .filter(|(_, t)| t.enabled && t.has_api_keys)
            .map(|(p, _)| p)
            .collect())
    }

    /// Enabled, ready platforms that also opted into automatic publishing
    pub fn auto_publish_platforms(&self, credentials: &CredentialSet) -> Result<Vec<PlatformId>> {
        Ok(self
            .list(credentials)?
            .into_iter()
            .filter(|(_, t)| t.enabled && t.auto_publish && t.has_api_keys)
            .map(|(p, _)| p)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{DocumentStore, MemoryStore};
    use std::sync::Arc;

    fn devto_ready() -> CredentialSet {
        let mut credentials = CredentialSet::default();
        credentials.devto.api_key = "k".into();
        credentials
    }

    #[test]
    fn test_defaults_when_nothing_stored() {
        let toggles = PlatformToggles::new(MemoryStore::shared());
        let list = toggles.list(&CredentialSet::default()).unwrap();
        assert_eq!(list.len(), PlatformId::ALL.len());
        assert!(list.iter().all(|(_, t)| t.enabled && !t.auto_publish && !t.has_api_keys));
    }

    #[test]
    fn test_has_api_keys_is_never_read_from_storage() {
        let store = MemoryStore::shared();
        store
            .set(
                keys::PLATFORM_SETTINGS,
                r#"{"twitter": {"enabled": true, "autoPublish": true, "hasApiKeys": true}}"#,
            )
            .unwrap();
        let toggles = PlatformToggles::new(Arc::clone(&store));

        let twitter = toggles
            .get(&CredentialSet::default(), PlatformId::Twitter)
            .unwrap();
        assert!(twitter.auto_publish);
        assert!(!twitter.has_api_keys);
        assert!(toggles
            .auto_publish_platforms(&CredentialSet::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_set_flags_persist() {
        let store = MemoryStore::shared();
        let toggles = PlatformToggles::new(Arc::clone(&store));
        let credentials = devto_ready();

        toggles
            .set_auto_publish(&credentials, PlatformId::Devto, true)
            .unwrap();
        toggles
            .set_enabled(&credentials, PlatformId::Hashnode, false)
            .unwrap();

        let reopened = PlatformToggles::new(store);
        assert_eq!(
            reopened.auto_publish_platforms(&credentials).unwrap(),
            vec![PlatformId::Devto]
        );
        assert_eq!(
            reopened.enabled_platforms(&credentials).unwrap(),
            vec![PlatformId::Devto]
        );
        assert!(!reopened.get(&credentials, PlatformId::Hashnode).unwrap().enabled);
    }
}
