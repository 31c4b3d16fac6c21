//! Derived-view cache with family-wildcard invalidation.
//!
//! Read views (harvest lists, property lists, calendars) are cached under
//! keys of the form `"<family>:<rest>"`. On commit of any mutation, the
//! whole family is dropped; per-key precision is deliberately not attempted.
//! Readers tolerate a stale view until the next invalidation.

use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::trace;

/// Entity family a cached view is derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    /// Property lists and details
    Property,
    /// Harvest lists, details and calendar feeds
    Harvest,
    /// Equipment-point availability views
    Equipment,
    /// Organization / beneficiary lists
    Organization,
    /// Community member lists
    Person,
}

impl Family {
    /// Key prefix for this family.
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Family::Property => "property",
            Family::Harvest => "harvest",
            Family::Equipment => "equipment",
            Family::Organization => "organization",
            Family::Person => "person",
        }
    }

    /// Builds a cache key under this family.
    #[must_use]
    pub fn key(self, rest: &str) -> String {
        format!("{}:{rest}", self.prefix())
    }
}

/// Shared cache of rendered views
#[derive(Debug, Default)]
pub struct ViewCache {
    inner: RwLock<HashMap<String, String>>,
}

impl ViewCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a cached view.
    pub async fn get(&self, key: &str) -> Option<String> {
        self.inner.read().await.get(key).cloned()
    }

    /// Stores a rendered view.
    pub async fn put(&self, key: impl Into<String>, value: impl Into<String>) {
        self.inner.write().await.insert(key.into(), value.into());
    }

    /// Drops every key belonging to `family`.
    pub async fn invalidate(&self, family: Family) {
        let prefix = family.prefix();
        let mut guard = self.inner.write().await;
        let before = guard.len();
        guard.retain(|key, _| key.split(':').next() != Some(prefix));
        trace!(
            family = prefix,
            dropped = before - guard.len(),
            "cache family invalidated"
        );
    }

    /// Number of cached views, for tests and diagnostics.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}
