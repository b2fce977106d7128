//! In-memory settings backend for tests and embedding hosts.

use std::collections::BTreeMap;

use crate::Result;
use crate::storage::SettingsBackend;

/// Process-local backend; contents are lost when the process exits.
///
/// Cloning produces an independent copy of the stored records, which tests
/// use to simulate a process restart over the same durable state.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    records: BTreeMap<(String, String), String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl SettingsBackend for MemoryBackend {
    fn read(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        Ok(self
            .records
            .get(&(namespace.to_string(), key.to_string()))
            .cloned())
    }

    fn write(&mut self, namespace: &str, key: &str, value: &str) -> Result<()> {
        self.records
            .insert((namespace.to_string(), key.to_string()), value.to_string());
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}
