//! Ownership registry for tunneled subdomains.
//!
//! A subdomain has at most one live session at any instant. Keys map to
//! the canonical subdomain claimed by that session; a session may claim
//! additional aliases (its login, for loopback dials) that route to the
//! same canonical key. Everything a session claimed is released together
//! when its guard drops.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct ClientRegistry {
    inner: Arc<Mutex<HashMap<String, String>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomic test-and-set. Returns `None` when another session already
    /// owns the subdomain; the guard releases every claimed key on drop.
    pub fn try_acquire(&self, subdomain: &str) -> Option<RegistryGuard> {
        let mut map = self.inner.lock().expect("registry lock poisoned");
        if map.contains_key(subdomain) {
            return None;
        }
        map.insert(subdomain.to_string(), subdomain.to_string());
        Some(RegistryGuard {
            registry: self.clone(),
            keys: vec![subdomain.to_string()],
        })
    }

    /// Membership test used by the route guards.
    pub fn has(&self, subdomain: &str) -> bool {
        self.inner
            .lock()
            .expect("registry lock poisoned")
            .contains_key(subdomain)
    }

    /// Canonical subdomain behind a key (identity for non-alias entries).
    pub fn resolve(&self, subdomain: &str) -> Option<String> {
        self.inner
            .lock()
            .expect("registry lock poisoned")
            .get(subdomain)
            .cloned()
    }

    /// Idempotent removal.
    pub fn release(&self, subdomain: &str) {
        self.inner
            .lock()
            .expect("registry lock poisoned")
            .remove(subdomain);
    }

    /// Currently claimed keys, for the debug endpoint.
    pub fn snapshot(&self) -> Vec<String> {
        let map = self.inner.lock().expect("registry lock poisoned");
        let mut keys: Vec<String> = map.keys().cloned().collect();
        keys.sort();
        keys
    }
}

/// Releases every key claimed by its session when dropped.
pub struct RegistryGuard {
    registry: ClientRegistry,
    keys: Vec<String>,
}

impl RegistryGuard {
    /// The canonical subdomain this guard owns.
    pub fn subdomain(&self) -> &str {
        &self.keys[0]
    }

    /// Claim an extra key routing to the same session. Returns `false`
    /// when the alias is owned elsewhere.
    pub fn add_alias(&mut self, alias: &str) -> bool {
        if alias == self.subdomain() {
            return true;
        }
        let mut map = self.registry.inner.lock().expect("registry lock poisoned");
        if map.contains_key(alias) {
            return false;
        }
        map.insert(alias.to_string(), self.keys[0].clone());
        self.keys.push(alias.to_string());
        true
    }
}

impl Drop for RegistryGuard {
    fn drop(&mut self) {
        for key in &self.keys {
            self.registry.release(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_is_exclusive() {
        let registry = ClientRegistry::new();
        let guard = registry.try_acquire("client1");
        assert!(guard.is_some());
        assert!(registry.has("client1"));
        assert!(registry.try_acquire("client1").is_none());
    }

    #[test]
    fn test_drop_releases() {
        let registry = ClientRegistry::new();
        let guard = registry.try_acquire("client1").unwrap();
        drop(guard);
        assert!(!registry.has("client1"));
        assert!(registry.try_acquire("client1").is_some());
    }

    #[test]
    fn test_release_is_idempotent() {
        let registry = ClientRegistry::new();
        registry.release("never-acquired");
        let _guard = registry.try_acquire("client1").unwrap();
        registry.release("client1");
        registry.release("client1");
        assert!(!registry.has("client1"));
    }

    #[test]
    fn test_alias_routes_to_canonical() {
        let registry = ClientRegistry::new();
        let mut guard = registry.try_acquire("localhost:4040").unwrap();
        assert!(guard.add_alias("client1"));
        assert_eq!(registry.resolve("client1").as_deref(), Some("localhost:4040"));
        drop(guard);
        assert!(!registry.has("client1"));
        assert!(!registry.has("localhost:4040"));
    }

    #[test]
    fn test_alias_conflict() {
        let registry = ClientRegistry::new();
        let _other = registry.try_acquire("client1").unwrap();
        let mut guard = registry.try_acquire("localhost:4040").unwrap();
        assert!(!guard.add_alias("client1"));
        assert_eq!(registry.resolve("client1").as_deref(), Some("client1"));
    }

    #[test]
    fn test_snapshot() {
        let registry = ClientRegistry::new();
        let _a = registry.try_acquire("bbb").unwrap();
        let _b = registry.try_acquire("aaa").unwrap();
        assert_eq!(registry.snapshot(), vec!["aaa".to_string(), "bbb".to_string()]);
    }
}
