//! Typed access to the session and persistent stores.
//!
//! Nothing here returns an error. Failed reads look like missing keys, failed
//! writes are logged and the scope falls back to an in-memory overlay so the
//! rest of the session still sees its own writes.

use std::collections::{BTreeMap, BTreeSet};

use crate::storage::{KeyValueStore, MemoryStore, StorageError};

const TRUE_MARKER: &str = "true";
const FALSE_MARKER: &str = "false";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Lives as long as the browsing session.
    Session,
    /// Survives across sessions on this device.
    Persistent,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Session => "session",
            Scope::Persistent => "persistent",
        }
    }
}

struct ScopedStore {
    scope: Scope,
    backend: Box<dyn KeyValueStore>,
    /// Present once a write has failed. `None` values are removals.
    overlay: Option<BTreeMap<String, Option<String>>>,
}

impl ScopedStore {
    fn new(scope: Scope, backend: Box<dyn KeyValueStore>) -> Self {
        Self {
            scope,
            backend,
            overlay: None,
        }
    }

    fn get(&self, key: &str) -> Option<String> {
        if let Some(value) = self.overlay.as_ref().and_then(|o| o.get(key)) {
            return value.clone();
        }
        match self.backend.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(scope = self.scope.as_str(), key, "read failed: {e}");
                None
            }
        }
    }

    fn put(&mut self, key: &str, value: Option<&str>) {
        if let Some(overlay) = &mut self.overlay {
            overlay.insert(key.to_string(), value.map(str::to_string));
            return;
        }
        let result = match value {
            Some(v) => self.backend.set(key, v),
            None => self.backend.remove(key),
        };
        if let Err(e) = result {
            self.degrade(key, value, &e);
        }
    }

    fn degrade(&mut self, key: &str, value: Option<&str>, err: &StorageError) {
        tracing::warn!(
            scope = self.scope.as_str(),
            key,
            "write failed, keeping {} state in memory for this session: {err}",
            self.scope.as_str()
        );
        let mut overlay = BTreeMap::new();
        overlay.insert(key.to_string(), value.map(str::to_string));
        self.overlay = Some(overlay);
    }

    fn entries(&self) -> Vec<(String, String)> {
        let mut merged: BTreeMap<String, String> = match self.backend.entries() {
            Ok(entries) => entries.into_iter().collect(),
            Err(e) => {
                tracing::warn!(scope = self.scope.as_str(), "listing failed: {e}");
                BTreeMap::new()
            }
        };
        if let Some(overlay) = &self.overlay {
            for (k, v) in overlay {
                match v {
                    Some(v) => merged.insert(k.clone(), v.clone()),
                    None => merged.remove(k),
                };
            }
        }
        merged.into_iter().collect()
    }
}

/// Session + persistent key/value stores behind typed accessors.
pub struct Persistence {
    session: ScopedStore,
    persistent: ScopedStore,
}

impl Persistence {
    pub fn new<S, P>(session: S, persistent: P) -> Self
    where
        S: KeyValueStore + 'static,
        P: KeyValueStore + 'static,
    {
        Self {
            session: ScopedStore::new(Scope::Session, Box::new(session)),
            persistent: ScopedStore::new(Scope::Persistent, Box::new(persistent)),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new(), MemoryStore::new())
    }

    fn store(&self, scope: Scope) -> &ScopedStore {
        match scope {
            Scope::Session => &self.session,
            Scope::Persistent => &self.persistent,
        }
    }

    fn store_mut(&mut self, scope: Scope) -> &mut ScopedStore {
        match scope {
            Scope::Session => &mut self.session,
            Scope::Persistent => &mut self.persistent,
        }
    }

    /// `true` only when the stored value is exactly the `"true"` marker.
    pub fn read_flag(&self, scope: Scope, key: &str) -> bool {
        self.store(scope).get(key).as_deref() == Some(TRUE_MARKER)
    }

    pub fn write_flag(&mut self, scope: Scope, key: &str, value: bool) {
        let marker = if value { TRUE_MARKER } else { FALSE_MARKER };
        self.store_mut(scope).put(key, Some(marker));
    }

    /// Stored as a JSON array of strings. Anything else reads as empty.
    pub fn read_string_set(&self, scope: Scope, key: &str) -> BTreeSet<String> {
        let Some(raw) = self.store(scope).get(key) else {
            return BTreeSet::new();
        };
        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(items) => items.into_iter().collect(),
            Err(e) => {
                tracing::warn!(scope = scope.as_str(), key, "ignoring malformed set: {e}");
                BTreeSet::new()
            }
        }
    }

    /// Members are written in sorted order, so equal sets serialize identically.
    pub fn write_string_set(&mut self, scope: Scope, key: &str, set: &BTreeSet<String>) {
        let members: Vec<&String> = set.iter().collect();
        match serde_json::to_string(&members) {
            Ok(json) => self.store_mut(scope).put(key, Some(&json)),
            Err(e) => tracing::warn!(scope = scope.as_str(), key, "set not serialized: {e}"),
        }
    }

    /// Finite numbers only; anything unparsable reads as absent.
    pub fn read_number(&self, scope: Scope, key: &str) -> Option<f64> {
        let raw = self.store(scope).get(key)?;
        raw.trim().parse::<f64>().ok().filter(|n| n.is_finite())
    }

    pub fn write_number(&mut self, scope: Scope, key: &str, value: f64) {
        if !value.is_finite() {
            tracing::warn!(scope = scope.as_str(), key, "refusing to store {value}");
            return;
        }
        self.store_mut(scope).put(key, Some(&value.to_string()));
    }

    pub fn read_raw(&self, scope: Scope, key: &str) -> Option<String> {
        self.store(scope).get(key)
    }

    pub fn write_raw(&mut self, scope: Scope, key: &str, value: &str) {
        self.store_mut(scope).put(key, Some(value));
    }

    pub fn remove(&mut self, scope: Scope, key: &str) {
        self.store_mut(scope).put(key, None);
    }

    /// Every key visible in `scope`, including in-memory fallbacks.
    pub fn entries(&self, scope: Scope) -> Vec<(String, String)> {
        self.store(scope).entries()
    }

    /// Whether `scope` has fallen back to memory after a failed write.
    pub fn is_degraded(&self, scope: Scope) -> bool {
        self.store(scope).overlay.is_some()
    }
}
