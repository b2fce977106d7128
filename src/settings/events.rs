//! Change events for deployment-defined override settings.
//!
//! When an override normalization pass observes a map that differs from
//! the snapshot persisted on the previous observation, one event fires per
//! changed key: first the listeners registered for that specific key, then
//! the generic listeners. Dispatch is synchronous, in-process, and ordered
//! by the plugin's whitelist order. There is no batching or debounce.

use serde::Serialize;

use crate::settings::OverrideMap;

/// A single override settings change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    /// The whitelisted settings key that changed
    pub key: String,

    /// Value after the change; `None` when the key was removed
    pub new: Option<String>,

    /// Value before the change; `None` on first observation
    pub old: Option<String>,
}

type Callback = Box<dyn FnMut(&ChangeEvent)>;

/// Registered observers for override changes.
///
/// Callbacks run synchronously on the thread performing the normalization
/// pass. Register before the first settings load to observe
/// first-observation events.
#[derive(Default)]
pub struct ChangeListeners {
    keyed: Vec<(String, Callback)>,
    generic: Vec<Callback>,
}

impl ChangeListeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for changes to one specific key.
    pub fn on_key(&mut self, key: impl Into<String>, callback: impl FnMut(&ChangeEvent) + 'static) {
        self.keyed.push((key.into(), Box::new(callback)));
    }

    /// Register a listener for every override change.
    pub fn on_any(&mut self, callback: impl FnMut(&ChangeEvent) + 'static) {
        self.generic.push(Box::new(callback));
    }

    /// Dispatch one change: key-specific listeners first, then generic.
    pub(crate) fn dispatch(&mut self, event: &ChangeEvent) {
        for (key, callback) in &mut self.keyed {
            if key == &event.key {
                callback(event);
            }
        }
        for callback in &mut self.generic {
            callback(event);
        }
    }
}

impl std::fmt::Debug for ChangeListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeListeners")
            .field("keyed", &self.keyed.len())
            .field("generic", &self.generic.len())
            .finish()
    }
}

/// Compare two observations over the whitelist, in whitelist order.
///
/// A missing key and an empty string are distinct states. Normalization
/// has already collapsed every value to a canonical string, so string
/// equality is the whole comparison.
pub(crate) fn diff_snapshots(
    previous: &OverrideMap,
    current: &OverrideMap,
    whitelist: &[String],
) -> Vec<ChangeEvent> {
    let mut changes = Vec::new();

    for key in whitelist {
        let old = previous.get(key);
        let new = current.get(key);

        if old != new {
            changes.push(ChangeEvent {
                key: key.clone(),
                new: new.cloned(),
                old: old.cloned(),
            });
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn map(pairs: &[(&str, &str)]) -> OverrideMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn whitelist(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    // ==================== Diff Tests ====================

    #[test]
    fn test_diff_first_observation_reports_old_none() {
        let changes = diff_snapshots(
            &OverrideMap::new(),
            &map(&[("key_id", "AKIA123")]),
            &whitelist(&["key_id"]),
        );

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].key, "key_id");
        assert_eq!(changes[0].new.as_deref(), Some("AKIA123"));
        assert_eq!(changes[0].old, None);
    }

    #[test]
    fn test_diff_unchanged_maps_report_nothing() {
        let current = map(&[("region", "eu-west-1")]);
        let changes = diff_snapshots(&current.clone(), &current, &whitelist(&["region"]));
        assert!(changes.is_empty());
    }

    #[test]
    fn test_diff_missing_key_and_empty_string_are_distinct() {
        let changes = diff_snapshots(
            &OverrideMap::new(),
            &map(&[("region", "")]),
            &whitelist(&["region"]),
        );

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].new.as_deref(), Some(""));
        assert_eq!(changes[0].old, None);
    }

    #[test]
    fn test_diff_removal_reports_new_none() {
        let changes = diff_snapshots(
            &map(&[("region", "eu-west-1")]),
            &OverrideMap::new(),
            &whitelist(&["region"]),
        );

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].new, None);
        assert_eq!(changes[0].old.as_deref(), Some("eu-west-1"));
    }

    #[test]
    fn test_diff_follows_whitelist_order() {
        let changes = diff_snapshots(
            &OverrideMap::new(),
            &map(&[("alpha", "1"), ("zebra", "2")]),
            &whitelist(&["zebra", "alpha"]),
        );

        let keys: Vec<&str> = changes.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["zebra", "alpha"]);
    }

    #[test]
    fn test_diff_ignores_keys_outside_whitelist() {
        let changes = diff_snapshots(
            &OverrideMap::new(),
            &map(&[("rogue", "1")]),
            &whitelist(&["region"]),
        );

        assert!(changes.is_empty());
    }

    // ==================== Dispatch Tests ====================

    #[test]
    fn test_dispatch_key_listener_before_generic() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut listeners = ChangeListeners::new();

        let seen = Rc::clone(&order);
        listeners.on_any(move |event| seen.borrow_mut().push(format!("any:{}", event.key)));
        let seen = Rc::clone(&order);
        listeners.on_key("region", move |event| {
            seen.borrow_mut().push(format!("key:{}", event.key));
        });

        listeners.dispatch(&ChangeEvent {
            key: "region".to_string(),
            new: Some("eu-west-1".to_string()),
            old: None,
        });

        assert_eq!(*order.borrow(), vec!["key:region", "any:region"]);
    }

    #[test]
    fn test_dispatch_skips_unrelated_key_listeners() {
        let hits = Rc::new(RefCell::new(0));
        let mut listeners = ChangeListeners::new();

        let seen = Rc::clone(&hits);
        listeners.on_key("bucket", move |_| *seen.borrow_mut() += 1);

        listeners.dispatch(&ChangeEvent {
            key: "region".to_string(),
            new: None,
            old: None,
        });

        assert_eq!(*hits.borrow(), 0);
    }
}
