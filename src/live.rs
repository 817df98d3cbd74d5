use std::sync::{Arc, PoisonError, RwLock};

use crate::error::Result;
use crate::model::Catalog;

/// The process-wide catalog, published as an immutable snapshot.
///
/// Readers take an [`Arc`] to the snapshot that is current when they ask and
/// keep it for as long as they need. Writers never touch a published
/// snapshot: they build a new one and swap the pointer, so a reader sees
/// either the old catalog or the new one in full.
#[derive(Debug, Default)]
pub struct LiveCatalog {
    current: RwLock<Arc<Catalog>>,
}

impl LiveCatalog {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            current: RwLock::new(Arc::new(catalog)),
        }
    }

    pub fn snapshot(&self) -> Arc<Catalog> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Publishes `catalog`, returning the snapshot it replaced.
    pub fn replace(&self, catalog: Catalog) -> Arc<Catalog> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, Arc::new(catalog))
    }

    /// Applies `edit` to a private copy of the current snapshot and publishes
    /// the copy only when the edit succeeds.
    pub fn update<T>(&self, edit: impl FnOnce(&mut Catalog) -> Result<T>) -> Result<T> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let mut draft = Catalog::clone(&guard);
        let value = edit(&mut draft)?;
        *guard = Arc::new(draft);
        Ok(value)
    }
}
