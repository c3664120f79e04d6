//! Table of live engine objects addressed by opaque string IDs.
//!
//! IDs come from a counter that only moves forward, so an ID is never handed
//! out twice even after its entry is removed. Entries disappear only through
//! [`Registry::remove`].

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown ref {0}")]
    UnknownRef(String),
}

struct Inner<T> {
    last_id: u64,
    entries: HashMap<u64, Arc<Mutex<T>>>,
}

pub struct Registry<T> {
    inner: Mutex<Inner<T>>,
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                last_id: 0,
                entries: HashMap::new(),
            }),
        }
    }

    /// Store `object` under a new ID. The first ID is `"1"`.
    pub async fn create(&self, object: T) -> String {
        let mut inner = self.inner.lock().await;
        inner.last_id += 1;
        let id = inner.last_id;
        inner.entries.insert(id, Arc::new(Mutex::new(object)));
        id.to_string()
    }

    pub async fn resolve(&self, id: &str) -> Result<Arc<Mutex<T>>, RegistryError> {
        let key = parse_id(id)?;
        let inner = self.inner.lock().await;
        inner
            .entries
            .get(&key)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownRef(id.to_string()))
    }

    /// Drop the entry for `id`. Returns whether anything was removed;
    /// removing an unknown ID is not an error.
    pub async fn remove(&self, id: &str) -> bool {
        let Ok(key) = parse_id(id) else {
            return false;
        };
        self.inner.lock().await.entries.remove(&key).is_some()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_id(id: &str) -> Result<u64, RegistryError> {
    id.parse::<u64>()
        .map_err(|_| RegistryError::UnknownRef(id.to_string()))
}
