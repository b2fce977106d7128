//! Settings resolution and change propagation for AWS service plugins.
//!
//! This library is the shared base layer for a family of admin-configurable
//! plugins that talk to AWS services. Each plugin resolves its operating
//! settings from two competing sources:
//!
//! - a persisted key/value record, editable by users through the host UI
//! - an optional deployment-defined override block, a JSON object placed in
//!   a single named environment slot, which wins over anything a user edits
//!
//! The crate merges the two sources with correct precedence, normalizes and
//! whitelists override values, detects when the override set changes between
//! process lifetimes, and notifies registered observers so dependent
//! subsystems (credential caches, API clients) can react.
//!
//! The host application owns all presentation concerns (menus, forms, asset
//! loading) and talks to this crate through a narrow interface: get a
//! setting, get all settings, persist settings, subscribe to changes.

pub mod aws;
pub mod settings;
pub mod storage;


/// Library-level error type for settings operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage backend unavailable: {0}")]
    Backend(String),

    #[error(
        "AWS access keys are not set: configure access_key_id and secret_access_key, or enable IAM role credentials"
    )]
    CredentialsMissing,

    #[error("Client construction failed: {0}")]
    Client(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for settings operations.
pub type Result<T> = std::result::Result<T, Error>;
