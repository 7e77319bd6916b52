//! Process-wide configuration for a mapping run.
//!
//! [`Settings`] is a string-keyed store with two layers: explicit values and
//! defaults. [`Settings::store`] always overwrites; [`Settings::provide`]
//! only sets a key that has no explicit value yet (it wins over defaults but
//! loses to anything already stored); defaults are filled in by the
//! components that own them and are consulted last on read.
//!
//! Settings are effectively immutable once processing starts: writes happen
//! while an [`crate::Indexer`] is being configured, reads happen from worker
//! threads during the run. The interior `RwLock`s make concurrent reads
//! cheap and the occasional late write safe.
//!
//! Keys consumed by the engine itself:
//!
//! | key | meaning |
//! |---|---|
//! | `processing_thread_pool` | worker count; 0 or absent = synchronous |
//! | `log.batch_size` | progress log cadence in records |
//! | `mapping_rescue` | skip failing records instead of aborting the run |
//! | `allow_blank_values` | keep blank values when merging accumulators |
//! | `allow_duplicate_values` | keep duplicate values within a field |
//! | `allow_empty_fields` | create output keys for empty contributions |

use std::collections::HashMap;
use std::sync::RwLock;

/// Two-layer string-keyed configuration store.
#[derive(Debug, Default)]
pub struct Settings {
    values: RwLock<HashMap<String, String>>,
    defaults: RwLock<HashMap<String, String>>,
}

impl Settings {
    /// Create an empty settings store.
    #[must_use]
    pub fn new() -> Self {
        Settings::default()
    }

    /// Build a settings store from explicit key/value pairs.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let settings = Settings::new();
        for (key, value) in pairs {
            settings.store(key, value);
        }
        settings
    }

    /// Set a value, overwriting any existing value.
    pub fn store(&self, key: &str, value: &str) {
        self.values
            .write()
            .expect("settings lock poisoned")
            .insert(key.to_string(), value.to_string());
    }

    /// Set a value only if the key has no explicit value yet.
    ///
    /// A provided value wins over defaults but loses to any already-stored
    /// value (first-writer-wins).
    pub fn provide(&self, key: &str, value: &str) {
        let mut values = self.values.write().expect("settings lock poisoned");
        values
            .entry(key.to_string())
            .or_insert_with(|| value.to_string());
    }

    /// Fill in default values consulted when no explicit value exists.
    ///
    /// Existing defaults are not overwritten, so earlier (more specific)
    /// default sources win over later (more general) ones.
    pub fn fill_defaults<'a>(&self, pairs: impl IntoIterator<Item = (&'a str, &'a str)>) {
        let mut defaults = self.defaults.write().expect("settings lock poisoned");
        for (key, value) in pairs {
            defaults
                .entry(key.to_string())
                .or_insert_with(|| value.to_string());
        }
    }

    /// Read a value: explicit values first, then defaults.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        if let Some(value) = self.values.read().expect("settings lock poisoned").get(key) {
            return Some(value.clone());
        }
        self.defaults
            .read()
            .expect("settings lock poisoned")
            .get(key)
            .cloned()
    }

    /// Read a value with a fallback.
    #[must_use]
    pub fn get_or(&self, key: &str, fallback: &str) -> String {
        self.get(key).unwrap_or_else(|| fallback.to_string())
    }

    /// Read a value as `usize`; unparsable or absent values fall back.
    #[must_use]
    pub fn get_usize(&self, key: &str, fallback: usize) -> usize {
        self.get(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(fallback)
    }

    /// Read a value as a boolean; accepts `true`/`false` (any case) and
    /// `1`/`0`.
    #[must_use]
    pub fn get_bool(&self, key: &str, fallback: bool) -> bool {
        match self.get(key).as_deref().map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("true") || v == "1" => true,
            Some(v) if v.eq_ignore_ascii_case("false") || v == "0" => false,
            _ => fallback,
        }
    }

    /// Whether the key has an explicit (non-default) value.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.values
            .read()
            .expect("settings lock poisoned")
            .contains_key(key)
    }
}

impl Clone for Settings {
    fn clone(&self) -> Self {
        Settings {
            values: RwLock::new(self.values.read().expect("settings lock poisoned").clone()),
            defaults: RwLock::new(
                self.defaults
                    .read()
                    .expect("settings lock poisoned")
                    .clone(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_store_overwrites() {
        let settings = Settings::new();
        settings.store("k", "one");
        settings.store("k", "two");
        assert_eq!(settings.get("k"), Some("two".to_string()));
    }

    #[test]
    fn test_provide_is_first_writer_wins() {
        let settings = Settings::new();
        settings.provide("k", "one");
        settings.provide("k", "two");
        assert_eq!(settings.get("k"), Some("one".to_string()));
    }

    #[test]
    fn test_provide_loses_to_stored_value() {
        let settings = Settings::new();
        settings.store("k", "stored");
        settings.provide("k", "provided");
        assert_eq!(settings.get("k"), Some("stored".to_string()));
    }

    #[test]
    fn test_provide_wins_over_defaults() {
        let settings = Settings::new();
        settings.fill_defaults([("k", "default")]);
        settings.provide("k", "provided");
        assert_eq!(settings.get("k"), Some("provided".to_string()));
    }

    #[test]
    fn test_defaults_consulted_last_and_not_overwritten() {
        let settings = Settings::new();
        settings.fill_defaults([("k", "specific")]);
        settings.fill_defaults([("k", "general"), ("other", "x")]);
        assert_eq!(settings.get("k"), Some("specific".to_string()));
        assert_eq!(settings.get("other"), Some("x".to_string()));
    }

    #[test]
    fn test_typed_getters() {
        let settings = Settings::from_pairs([
            ("threads", "4"),
            ("flag", "true"),
            ("off", "0"),
            ("junk", "not-a-number"),
        ]);
        assert_eq!(settings.get_usize("threads", 0), 4);
        assert_eq!(settings.get_usize("junk", 7), 7);
        assert_eq!(settings.get_usize("absent", 3), 3);
        assert!(settings.get_bool("flag", false));
        assert!(!settings.get_bool("off", true));
        assert!(settings.get_bool("absent", true));
    }

    #[test]
    fn test_concurrent_reads() {
        let settings = Arc::new(Settings::from_pairs([("k", "v")]));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let settings = Arc::clone(&settings);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        assert_eq!(settings.get("k"), Some("v".to_string()));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn test_clone_is_independent() {
        let settings = Settings::from_pairs([("k", "v")]);
        let copy = settings.clone();
        copy.store("k", "changed");
        assert_eq!(settings.get("k"), Some("v".to_string()));
        assert_eq!(copy.get("k"), Some("changed".to_string()));
    }
}
