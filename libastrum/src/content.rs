//! Content library backed by the `content_items` document

use chrono::{DateTime, Utc};

use crate::error::{AstrumError, Result, StorageError};
use crate::storage::{keys, Collection, SharedStore};
use crate::types::{ContentItem, PublishStatus};

pub struct ContentLibrary {
    items: Collection<ContentItem>,
}

impl ContentLibrary {
    pub fn new(store: SharedStore) -> Self {
        Self {
            items: Collection::new(store, keys::CONTENT_ITEMS),
        }
    }

    /// Add a new item
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an empty title or a duplicate id.
    pub fn create(&self, item: ContentItem) -> Result<ContentItem> {
        if item.title.trim().is_empty() {
            return Err(AstrumError::InvalidInput(
                "Content title cannot be empty".to_string(),
            ));
        }

        let duplicate = self.items.update(|items| {
            if items.iter().any(|existing| existing.id == item.id) {
                return true;
            }
            items.push(item.clone());
            false
        })?;
        if duplicate {
            return Err(AstrumError::InvalidInput(format!(
                "Content item already exists: {}",
                item.id
            )));
        }

        tracing::debug!("Created content item {}", item.id);
        Ok(item)
    }

    pub fn get(&self, id: &str) -> Result<ContentItem> {
        self.items
            .load()?
            .into_iter()
            .find(|item| item.id == id)
            .ok_or_else(|| not_found(id))
    }

    /// Items newest first, optionally filtered by publish status
    pub fn list(&self, status: Option<PublishStatus>) -> Result<Vec<ContentItem>> {
        let mut items: Vec<ContentItem> = self
            .items
            .load()?
            .into_iter()
            .filter(|item| status.is_none_or(|s| item.publish_status == s))
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    /// Apply `f` to the stored item and persist it
    pub fn modify<F>(&self, id: &str, f: F) -> Result<ContentItem>
    where
        F: FnOnce(&mut ContentItem),
    {
        self.items
            .update(|items| {
                items.iter_mut().find(|item| item.id == id).map(|item| {
                    f(item);
                    item.touch();
                    item.clone()
                })
            })?
            .ok_or_else(|| not_found(id))
    }

    pub fn set_status(&self, id: &str, status: PublishStatus) -> Result<ContentItem> {
        self.modify(id, |item| item.publish_status = status)
    }

    /// Mark an item as scheduled for `when`
    pub fn schedule(&self, id: &str, when: DateTime<Utc>) -> Result<ContentItem> {
        self.modify(id, |item| {
            item.publish_status = PublishStatus::Scheduled;
            item.scheduled_for = Some(when);
        })
    }
}

fn not_found(id: &str) -> AstrumError {
    StorageError::NotFound(format!("content item {}", id)).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn library() -> ContentLibrary {
        ContentLibrary::new(MemoryStore::shared())
    }

    #[test]
    fn test_create_and_get() {
        let library = library();
        let item = library
            .create(ContentItem::new("Hello".into(), "World".into()))
            .unwrap();

        let loaded = library.get(&item.id).unwrap();
        assert_eq!(loaded, item);
    }

    #[test]
    fn test_create_rejects_empty_title() {
        let err = library()
            .create(ContentItem::new("  ".into(), "World".into()))
            .unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_create_rejects_duplicate_id() {
        let library = library();
        let item = ContentItem::new("Hello".into(), "World".into());
        library.create(item.clone()).unwrap();
        assert!(library.create(item).is_err());
        assert_eq!(library.list(None).unwrap().len(), 1);
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let err = library().get("nope").unwrap_err();
        assert!(matches!(
            err,
            AstrumError::Storage(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_filters_by_status() {
        let library = library();
        let a = library
            .create(ContentItem::new("A".into(), String::new()))
            .unwrap();
        library
            .create(ContentItem::new("B".into(), String::new()))
            .unwrap();
        library.set_status(&a.id, PublishStatus::Published).unwrap();

        let published = library.list(Some(PublishStatus::Published)).unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].id, a.id);
        assert_eq!(library.list(Some(PublishStatus::Draft)).unwrap().len(), 1);
        assert_eq!(library.list(None).unwrap().len(), 2);
    }

    #[test]
    fn test_schedule_sets_status_and_time() {
        let library = library();
        let item = library
            .create(ContentItem::new("A".into(), String::new()))
            .unwrap();
        let when = Utc::now() + chrono::Duration::hours(2);

        let scheduled = library.schedule(&item.id, when).unwrap();
        assert_eq!(scheduled.publish_status, PublishStatus::Scheduled);
        assert_eq!(scheduled.scheduled_for, Some(when));
        assert!(scheduled.updated_at >= item.updated_at);
    }
}
