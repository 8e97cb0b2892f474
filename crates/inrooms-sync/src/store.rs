//! Document store abstraction

use async_trait::async_trait;

use crate::document::Fields;
use crate::SyncError;

/// Target of the sync: a document database that supports masked writes.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Write `fields` into `collection/id`, touching only the paths in
    /// `mask`. Creates the document if it does not exist.
    async fn merge_document(
        &self,
        collection: &str,
        id: &str,
        fields: &Fields,
        mask: &[&str],
    ) -> Result<(), SyncError>;
}

#[cfg(any(test, feature = "memory"))]
pub use memory::MemoryDocumentStore;

#[cfg(any(test, feature = "memory"))]
mod memory {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use dashmap::DashMap;

    use super::DocumentStore;
    use crate::document::{FieldValue, Fields};
    use crate::SyncError;

    /// In-memory document store for tests
    #[derive(Default, Clone)]
    pub struct MemoryDocumentStore {
        docs: Arc<DashMap<(String, String), Fields>>,
        writes: Arc<AtomicUsize>,
        failures: Arc<AtomicUsize>,
    }

    impl MemoryDocumentStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Seed a document, e.g. with client-owned fields
        pub fn insert(&self, collection: &str, id: &str, fields: Fields) {
            self.docs
                .insert((collection.to_string(), id.to_string()), fields);
        }

        pub fn document(&self, collection: &str, id: &str) -> Option<Fields> {
            self.docs
                .get(&(collection.to_string(), id.to_string()))
                .map(|d| d.value().clone())
        }

        /// `subscription.<key>` of a stored user document
        pub fn subscription_field(&self, id: &str, key: &str) -> Option<FieldValue> {
            self.document("users", id)?
                .get("subscription")?
                .as_map()?
                .get(key)
                .cloned()
        }

        /// Successful writes so far
        pub fn writes(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }

        /// Make the next `n` writes fail with a 503
        pub fn fail_next(&self, n: usize) {
            self.failures.store(n, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl DocumentStore for MemoryDocumentStore {
        async fn merge_document(
            &self,
            collection: &str,
            id: &str,
            fields: &Fields,
            mask: &[&str],
        ) -> Result<(), SyncError> {
            let failing = self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(SyncError::Firestore {
                    status: 503,
                    message: "unavailable".into(),
                });
            }

            let mut doc = self
                .docs
                .entry((collection.to_string(), id.to_string()))
                .or_default();
            for path in mask {
                match fields.get(*path) {
                    Some(value) => doc.insert((*path).to_string(), value.clone()),
                    None => doc.remove(*path),
                };
            }
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}
