//! Persisted settings store with override merge and change detection.

use tracing::debug;

use crate::Result;
use crate::settings::events::{self, ChangeEvent, ChangeListeners};
use crate::settings::overrides::OverrideSource;
use crate::settings::{OverrideMap, PluginDescriptor, SettingsMap, resolver};
use crate::storage::SettingsBackend;

/// Settings store for one plugin namespace.
///
/// Loads the persisted record lazily, merges the deployment override block
/// over it, and caches the effective map until a forced reload. Mutations
/// are in-memory only until [`save_settings`](Self::save_settings).
pub struct SettingsStore<B: SettingsBackend> {
    descriptor: PluginDescriptor,
    backend: B,
    overrides: OverrideSource,
    settings: Option<SettingsMap>,
    listeners: ChangeListeners,
}

impl<B: SettingsBackend> SettingsStore<B> {
    pub fn new(descriptor: PluginDescriptor, backend: B, overrides: OverrideSource) -> Self {
        Self {
            descriptor,
            backend,
            overrides,
            settings: None,
            listeners: ChangeListeners::new(),
        }
    }

    pub fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    /// The whitelisted override keys for this plugin.
    pub fn whitelist(&self) -> &[String] {
        &self.descriptor.whitelist
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Register a listener for changes to one override key.
    ///
    /// Register before the first load to observe first-observation events.
    pub fn on_key_change(
        &mut self,
        key: impl Into<String>,
        callback: impl FnMut(&ChangeEvent) + 'static,
    ) {
        self.listeners.on_key(key, callback);
    }

    /// Register a listener for every override change.
    pub fn on_change(&mut self, callback: impl FnMut(&ChangeEvent) + 'static) {
        self.listeners.on_any(callback);
    }

    /// The effective settings map: stored record merged under overrides.
    ///
    /// Loaded lazily and cached; `force` re-reads the record. A missing
    /// record is treated as an empty map, not an error.
    pub fn settings(&mut self, force: bool) -> Result<&SettingsMap> {
        if self.settings.is_none() || force {
            let stored = self.read_record()?;
            let defined = self.defined_settings(false)?.clone();
            debug!(
                slug = %self.descriptor.slug,
                stored = stored.len(),
                overridden = defined.len(),
                "loaded settings record"
            );
            self.settings = Some(resolver::resolve(stored, &defined));
        }

        Ok(self.settings.get_or_insert_with(SettingsMap::new))
    }

    /// Get one effective setting, falling back to `default` when absent.
    pub fn setting(&mut self, key: &str, default: &str) -> Result<String> {
        Ok(self
            .settings(false)?
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string()))
    }

    /// Set a value in the in-memory map. No persistence side effect.
    pub fn set_setting(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.settings
            .get_or_insert_with(SettingsMap::new)
            .insert(key.into(), value.into());
    }

    /// Replace the whole in-memory map. No persistence side effect.
    pub fn set_settings(&mut self, settings: SettingsMap) {
        self.settings = Some(settings);
    }

    /// Delete a key from the in-memory map; no-op when absent.
    pub fn remove_setting(&mut self, key: &str) {
        if let Some(settings) = self.settings.as_mut() {
            settings.remove(key);
        }
    }

    /// Persist the current in-memory map verbatim.
    ///
    /// No validation happens here; validating user input is the form
    /// handler's job before it calls this.
    pub fn save_settings(&mut self) -> Result<()> {
        let record = serde_json::to_string(self.settings.get_or_insert_with(SettingsMap::new))?;
        self.backend
            .write(&self.descriptor.slug, &self.descriptor.settings_key, &record)?;
        debug!(slug = %self.descriptor.slug, "saved settings record");
        Ok(())
    }

    /// The normalized deployment override map.
    ///
    /// Computed on first call or when `force` is set: the slot is decoded,
    /// filtered to the whitelist, and coerced to canonical string form.
    /// Each recomputation is compared against the snapshot persisted on
    /// the previous observation; change events fire for every difference
    /// before the fresh snapshot is persisted.
    pub fn defined_settings(&mut self, force: bool) -> Result<&OverrideMap> {
        if self
            .overrides
            .ensure_normalized(&self.descriptor.whitelist, force)
        {
            let current = self.overrides.normalized_map().clone();
            self.detect_override_changes(&current)?;
        }

        Ok(self.overrides.normalized_map())
    }

    /// Get one override value, falling back to `default` when absent.
    pub fn defined_setting(&mut self, key: &str, default: &str) -> Result<String> {
        Ok(self
            .defined_settings(false)?
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string()))
    }

    /// Drop a key from the cached override map.
    ///
    /// The slot itself is untouched; a forced recompute brings the key
    /// back.
    pub fn remove_defined_setting(&mut self, key: &str) -> Result<()> {
        self.defined_settings(false)?;
        self.overrides.remove(key);
        Ok(())
    }

    fn read_record(&self) -> Result<SettingsMap> {
        match self
            .backend
            .read(&self.descriptor.slug, &self.descriptor.settings_key)?
        {
            Some(record) => Ok(serde_json::from_str(&record)?),
            None => Ok(SettingsMap::new()),
        }
    }

    /// Diff the fresh normalized map against the stored snapshot, notify
    /// listeners per changed key, and persist the new snapshot.
    fn detect_override_changes(&mut self, current: &OverrideMap) -> Result<()> {
        let snapshot_key = self.descriptor.snapshot_key();
        let previous: OverrideMap = match self.backend.read(&self.descriptor.slug, &snapshot_key)? {
            Some(snapshot) => serde_json::from_str(&snapshot)?,
            None => OverrideMap::new(),
        };

        let changes = events::diff_snapshots(&previous, current, &self.descriptor.whitelist);
        for event in &changes {
            debug!(slug = %self.descriptor.slug, key = %event.key, "override setting changed");
            self.listeners.dispatch(event);
        }

        // Persisted even with zero changes so the comparison base never
        // goes stale.
        let snapshot = serde_json::to_string(current)?;
        self.backend
            .write(&self.descriptor.slug, &snapshot_key, &snapshot)?;
        Ok(())
    }
}

impl<B: SettingsBackend> std::fmt::Debug for SettingsStore<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore")
            .field("descriptor", &self.descriptor)
            .field("loaded", &self.settings.is_some())
            .finish()
    }
}
