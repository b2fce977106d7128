//! Settings resolution for AWS service plugins.
//!
//! Each plugin owns one flat settings record in the persistence backend,
//! keyed by its namespace. A deployment can additionally provision settings
//! by placing a JSON object in a single named environment slot; those
//! values win over the stored record, but only for keys the plugin has
//! whitelisted.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. Fixed environment credential identifiers (credential fields only,
//!    see [`crate::aws`])
//! 2. Deployment-defined override block (whitelisted keys)
//! 3. Stored settings record
//!
//! ## Change detection
//!
//! The normalized override map is snapshotted in the backend on every
//! observation. When a new observation differs from the snapshot, one
//! event fires per changed key (key-specific listeners first, then generic
//! ones), in whitelist order, before the snapshot is refreshed. Register
//! listeners before the first settings load to observe first-observation
//! events.

pub mod events;
pub mod overrides;
pub mod resolver;
pub mod store;

pub use events::{ChangeEvent, ChangeListeners};
pub use overrides::OverrideSource;
pub use resolver::resolve;
pub use store::SettingsStore;

use serde::{Deserialize, Serialize};

/// Flat settings mapping: one record per plugin namespace.
pub type SettingsMap = std::collections::BTreeMap<String, String>;

/// Normalized override mapping, key-sorted for stable comparison.
pub type OverrideMap = std::collections::BTreeMap<String, String>;

/// Identity and configuration of one plugin consuming this crate.
///
/// Concrete plugins supply their namespace, record key, override slot
/// name, and whitelist here instead of subclassing anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    /// Plugin namespace, e.g. "amazon-web-services"
    pub slug: String,

    /// Backend record key for the stored settings, e.g. "aws_settings"
    pub settings_key: String,

    /// Name of the environment slot holding the override block,
    /// e.g. "AWS_SETTINGS"
    pub override_var: String,

    /// Ordered set of keys the override block may inject. Empty means the
    /// plugin accepts no overrides. Order defines event dispatch order.
    #[serde(default)]
    pub whitelist: Vec<String>,
}

impl PluginDescriptor {
    /// Create a descriptor with an empty whitelist.
    pub fn new(
        slug: impl Into<String>,
        settings_key: impl Into<String>,
        override_var: impl Into<String>,
    ) -> Self {
        Self {
            slug: slug.into(),
            settings_key: settings_key.into(),
            override_var: override_var.into(),
            whitelist: Vec::new(),
        }
    }

    /// Set the override whitelist.
    pub fn with_whitelist<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.whitelist = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Backend record key for the persisted override snapshot.
    pub fn snapshot_key(&self) -> String {
        format!("override-snapshot:{}", self.override_var)
    }
}
