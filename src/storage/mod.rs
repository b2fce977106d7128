//! Persistence backends for settings records.
//!
//! Records are addressed by `(namespace, key)`: one record per plugin
//! namespace for the settings map, and one per namespace for the override
//! snapshot.
//!
//! Two backends ship with the crate:
//!
//! - [`SqliteBackend`] (default): durable storage at
//!   `<data-dir>/aws-settings/settings.db`
//! - [`MemoryBackend`]: process-local, for tests and embedding hosts
//!
//! Hosts that already own a key/value store implement [`SettingsBackend`]
//! themselves. Writes are last-writer-wins; nothing at this layer retries
//! or coordinates concurrent processes.

pub mod backend;
pub mod memory;
pub mod sqlite;

pub use backend::SettingsBackend;
pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;
