/// Playable references
///
/// A revocable handle that lets a blob be used as a preview or playback
/// source. Whoever creates a reference must revoke it; the table only grows
/// otherwise.

use crate::db::Blob;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::trace;

const URL_PREFIX: &str = "blob:soundboard/";

/// Handle to a registered blob
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectUrl(String);

impl ObjectUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Default)]
struct Inner {
    next_id: AtomicU64,
    entries: Mutex<HashMap<ObjectUrl, Arc<Blob>>>,
}

/// Shared registry of live playable references
///
/// Cloning is cheap; clones see the same table.
#[derive(Clone, Default)]
pub struct ObjectUrlTable {
    inner: Arc<Inner>,
}

impl ObjectUrlTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a blob and hand back a fresh reference to it
    pub fn create(&self, blob: Arc<Blob>) -> ObjectUrl {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let url = ObjectUrl(format!("{}{}", URL_PREFIX, id));
        self.entries().insert(url.clone(), blob);
        trace!(url = %url, "object url created");
        url
    }

    /// Look up the blob behind a live reference
    pub fn resolve(&self, url: &ObjectUrl) -> Option<Arc<Blob>> {
        self.entries().get(url).cloned()
    }

    /// Release a reference. Returns false if it was already gone.
    pub fn revoke(&self, url: &ObjectUrl) -> bool {
        let removed = self.entries().remove(url).is_some();
        if removed {
            trace!(url = %url, "object url revoked");
        }
        removed
    }

    /// Number of references not yet revoked
    pub fn live_count(&self) -> usize {
        self.entries().len()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<ObjectUrl, Arc<Blob>>> {
        // A panic while holding the lock leaves the map itself intact
        self.inner
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for ObjectUrlTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectUrlTable")
            .field("live", &self.live_count())
            .finish()
    }
}
