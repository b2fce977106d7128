//! SQLite-backed settings persistence.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension, params};

use crate::storage::SettingsBackend;
use crate::{Error, Result};

/// Environment variable overriding the default data directory.
pub const DATA_DIR_ENV: &str = "AWS_SETTINGS_DATA_DIR";

const DB_FILE: &str = "settings.db";

/// Durable settings backend over a single SQLite database.
#[derive(Debug)]
pub struct SqliteBackend {
    conn: Connection,
    path: PathBuf,
}

impl SqliteBackend {
    /// Open (or create) the database at the default location.
    pub fn open_default() -> Result<Self> {
        let dir = default_data_dir()?;
        std::fs::create_dir_all(&dir)?;
        Self::open_at(&dir.join(DB_FILE))
    }

    /// Open (or create) the database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS plugin_settings (
                namespace TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (namespace, key)
            );
            "#,
        )?;
        Ok(())
    }
}

impl SettingsBackend for SqliteBackend {
    fn read(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM plugin_settings WHERE namespace = ?1 AND key = ?2",
                params![namespace, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn write(&mut self, namespace: &str, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO plugin_settings (namespace, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT (namespace, key) DO UPDATE SET value = excluded.value",
            params![namespace, key, value],
        )?;
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn backend_type(&self) -> &'static str {
        "sqlite"
    }
}

/// The directory holding the default database.
///
/// `AWS_SETTINGS_DATA_DIR` overrides the platform data directory.
pub fn default_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }

    dirs::data_dir()
        .map(|dir| dir.join("aws-settings"))
        .ok_or_else(|| Error::Backend("could not determine data directory".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_write_then_read_roundtrip() {
        let dir = TempDir::new().unwrap();
        let mut backend = SqliteBackend::open_at(&dir.path().join(DB_FILE)).unwrap();

        assert_eq!(backend.read("aws", "aws_settings").unwrap(), None);
        backend
            .write("aws", "aws_settings", r#"{"region":"us-east-1"}"#)
            .unwrap();
        assert_eq!(
            backend.read("aws", "aws_settings").unwrap().unwrap(),
            r#"{"region":"us-east-1"}"#
        );
    }

    #[test]
    fn test_write_overwrites_existing_record() {
        let dir = TempDir::new().unwrap();
        let mut backend = SqliteBackend::open_at(&dir.path().join(DB_FILE)).unwrap();

        backend.write("aws", "aws_settings", "old").unwrap();
        backend.write("aws", "aws_settings", "new").unwrap();

        assert_eq!(backend.read("aws", "aws_settings").unwrap().unwrap(), "new");
    }

    #[test]
    fn test_records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DB_FILE);

        {
            let mut backend = SqliteBackend::open_at(&path).unwrap();
            backend.write("aws", "aws_settings", "durable").unwrap();
        }

        let backend = SqliteBackend::open_at(&path).unwrap();
        assert_eq!(
            backend.read("aws", "aws_settings").unwrap().unwrap(),
            "durable"
        );
    }

    #[test]
    #[serial]
    fn test_default_data_dir_env_override() {
        // SAFETY: set_var is not thread-safe on POSIX; #[serial] keeps
        // env-mutating tests from overlapping.
        unsafe { std::env::set_var(DATA_DIR_ENV, "/tmp/aws-settings-test") };

        let dir = default_data_dir().unwrap();
        assert_eq!(dir, PathBuf::from("/tmp/aws-settings-test"));

        unsafe { std::env::remove_var(DATA_DIR_ENV) };
    }
}
