/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! A key-value configuration store: a two-level namespace/property tree
//! that owns the whole tree and persists it on every `set`.
//!
//! The core only ever *reads* a handful of policy values plus the
//! session-cleanup subtree, and it needs a test double for unit tests, so
//! the tree access is behind a `ConfigStore` trait; the real key-value
//! store is an external collaborator, out of scope, that implements it.

use std::collections::BTreeMap;

/// A two-level key-value tree: `namespace/property -> value`, read and
/// written as strings exactly like the platform's real config daemon.
pub trait ConfigStore: Send {
    fn get(&self, namespace: &str, property: &str) -> Option<String>;
    fn set(&mut self, namespace: &str, property: &str, value: &str);
    /// Remove every property under `namespace`, and every property under
    /// namespaces that start with `namespace/` (used to purge the whole
    /// `/sessionCleanup` subtree at startup).
    fn remove_subtree(&mut self, namespace_prefix: &str);
}

/// In-memory reference implementation, used by tests and as a default when
/// no real config daemon is wired in.
#[derive(Debug, Default)]
pub struct InMemoryConfigStore {
    tree: BTreeMap<String, BTreeMap<String, String>>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for InMemoryConfigStore {
    fn get(&self, namespace: &str, property: &str) -> Option<String> {
        self.tree.get(namespace)?.get(property).cloned()
    }

    fn set(&mut self, namespace: &str, property: &str, value: &str) {
        self.tree
            .entry(namespace.to_owned())
            .or_default()
            .insert(property.to_owned(), value.to_owned());
    }

    fn remove_subtree(&mut self, namespace_prefix: &str) {
        self.tree
            .retain(|ns, _| ns != namespace_prefix && !ns.starts_with(&format!("{namespace_prefix}/")));
    }
}

/// The time-sync protocol named in `/time/protocol`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeProtocol {
    Time,
    Ntp,
}

impl TimeProtocol {
    fn from_code(code: &str) -> Option<Self> {
        match code {
            "0" => Some(TimeProtocol::Time),
            "1" => Some(TimeProtocol::Ntp),
            _ => None,
        }
    }
}

/// Typed accessors layered over the raw namespace/property strings in a
/// `ConfigStore`.
pub struct Policy<'a> {
    store: &'a dyn ConfigStore,
}

impl<'a> Policy<'a> {
    pub fn new(store: &'a dyn ConfigStore) -> Self {
        Policy { store }
    }

    pub fn use_default_route(&self) -> bool {
        self.store
            .get("routing", "useDefaultRoute")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true)
    }

    pub fn wifi_ssid(&self) -> Option<String> {
        self.store.get("wifi", "SSID")
    }

    pub fn wifi_sec_protocol(&self) -> Option<i64> {
        self.store.get("wifi", "secProtocol")?.parse().ok()
    }

    pub fn wifi_passphrase(&self) -> Option<String> {
        self.store.get("wifi", "passphrase")
    }

    pub fn cellular_profile_index(&self) -> Option<u32> {
        self.store.get("cellular", "profileIndex")?.parse().ok()
    }

    pub fn time_protocol(&self) -> Option<TimeProtocol> {
        self.store
            .get("time", "protocol")
            .and_then(|v| TimeProtocol::from_code(&v))
    }

    pub fn time_server(&self) -> Option<String> {
        self.store.get("time", "server")
    }

    /// `/sessionCleanup/<appName>`: whether requests made by this app
    /// should stay alive past session teardown.
    pub fn session_stays_on_exit(&self, app_name: &str) -> bool {
        self.store
            .get("sessionCleanup", app_name)
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false)
    }
}

/// Purge `/sessionCleanup`, called once at process start to clean
/// up entries a crashed client left behind.
pub fn purge_session_cleanup(store: &mut dyn ConfigStore) {
    store.remove_subtree("sessionCleanup");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_use_default_route_is_true() {
        let store = InMemoryConfigStore::new();
        assert!(Policy::new(&store).use_default_route());
    }

    #[test]
    fn explicit_false_is_honoured() {
        let mut store = InMemoryConfigStore::new();
        store.set("routing", "useDefaultRoute", "false");
        assert!(!Policy::new(&store).use_default_route());
    }

    #[test]
    fn purge_removes_whole_subtree_only() {
        let mut store = InMemoryConfigStore::new();
        store.set("sessionCleanup", "myapp", "true");
        store.set("wifi", "SSID", "home");
        purge_session_cleanup(&mut store);
        assert_eq!(store.get("sessionCleanup", "myapp"), None);
        assert_eq!(store.get("wifi", "SSID"), Some("home".to_owned()));
    }

    #[test]
    fn time_protocol_parses_known_codes() {
        let mut store = InMemoryConfigStore::new();
        store.set("time", "protocol", "1");
        assert_eq!(Policy::new(&store).time_protocol(), Some(TimeProtocol::Ntp));
    }
}
