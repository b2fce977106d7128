//! Deployment-defined override block: decode, whitelist, normalize.
//!
//! Deployments provision settings by serializing a JSON object into a
//! single named environment slot. The slot is read at most once per
//! process; its decoded contents are filtered to the plugin's whitelist
//! and every retained value is coerced to a canonical string form, so that
//! comparing observations across process lifetimes is deterministic.
//!
//! An absent slot, or a slot that does not decode to an object, degrades
//! to "no overrides" — it is never an error.

use serde_json::Value;
use tracing::warn;

use crate::settings::OverrideMap;

/// The deployment override slot for one plugin.
///
/// Holds the raw slot contents and the memoized normalized map. Hosts
/// construct this once at startup and hand it to the store; tests inject
/// raw blocks directly with [`from_value`](Self::from_value) instead of
/// mutating the process environment.
#[derive(Debug, Default)]
pub struct OverrideSource {
    raw: Option<String>,
    normalized: OverrideMap,
    computed: bool,
}

impl OverrideSource {
    /// Read the override block from the named environment variable.
    pub fn from_process_env(var: &str) -> Self {
        Self::from_value(std::env::var(var).ok())
    }

    /// Use an explicitly supplied override block.
    pub fn from_value(raw: Option<String>) -> Self {
        Self {
            raw,
            normalized: OverrideMap::new(),
            computed: false,
        }
    }

    /// A source with no override block defined.
    pub fn none() -> Self {
        Self::from_value(None)
    }

    /// Whether the slot held any content at construction time.
    pub fn is_defined(&self) -> bool {
        self.raw.is_some()
    }

    /// The current normalized map. Empty until first ensured.
    pub(crate) fn normalized_map(&self) -> &OverrideMap {
        &self.normalized
    }

    /// Drop one key from the normalized map. The slot itself is untouched.
    pub(crate) fn remove(&mut self, key: &str) {
        self.normalized.remove(key);
    }

    /// (Re)compute the normalized map if needed.
    ///
    /// Returns true when a recomputation actually happened, so the caller
    /// can run change detection against the stored snapshot.
    pub(crate) fn ensure_normalized(&mut self, whitelist: &[String], force: bool) -> bool {
        if self.computed && !force {
            return false;
        }

        self.normalized = normalize(&self.decode(), whitelist);
        self.computed = true;
        true
    }

    /// Decode the raw slot into a key/value container.
    fn decode(&self) -> serde_json::Map<String, Value> {
        let Some(raw) = self.raw.as_deref() else {
            return serde_json::Map::new();
        };

        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                warn!("override block does not decode to an object, ignoring");
                serde_json::Map::new()
            }
            Err(err) => {
                warn!(%err, "override block is not valid JSON, ignoring");
                serde_json::Map::new()
            }
        }
    }
}

/// Filter a decoded override block to the whitelist and coerce each
/// retained value to canonical string form. Keys outside the whitelist are
/// dropped silently.
pub(crate) fn normalize(raw: &serde_json::Map<String, Value>, whitelist: &[String]) -> OverrideMap {
    let mut normalized = OverrideMap::new();

    for (key, value) in raw {
        if !whitelist.iter().any(|allowed| allowed == key) {
            continue;
        }
        normalized.insert(key.clone(), normalize_value(value));
    }

    normalized
}

/// Coerce a decoded value to its canonical string form.
///
/// Booleans and null collapse to "1"/"0", numbers keep their decimal form,
/// everything else passes through text sanitization.
pub(crate) fn normalize_value(value: &Value) -> String {
    match value {
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) | Value::Null => "0".to_string(),
        Value::Number(number) => number.to_string(),
        Value::String(text) => sanitize_text(text),
        other => sanitize_text(&other.to_string()),
    }
}

/// Strip markup tags and control characters, collapse whitespace runs, and
/// trim. Content is never truncated.
pub(crate) fn sanitize_text(input: &str) -> String {
    let mut stripped = String::with_capacity(input.len());
    let mut in_tag = false;

    for c in input.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if in_tag => {}
            c if c.is_control() => stripped.push(' '),
            c => stripped.push(c),
        }
    }

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}
