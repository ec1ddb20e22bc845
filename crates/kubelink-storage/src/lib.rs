//! Kubelink Storage Layer
//!
//! SQLite database with field-level encryption for cluster credentials.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                 Application Services                 │
//! ├──────────────────────────────────────────────────────┤
//! │               Repository Traits                      │
//! │  (ConnectionRepository, EventRepository, Registry)   │
//! ├──────────────────────────────────────────────────────┤
//! │            SQLite Implementations                    │
//! │  (SqliteConnectionRepository, SqliteEventRepository, │
//! │   SqliteComponentRegistry)                           │
//! ├──────────────────────────────────────────────────────┤
//! │         FieldEncryptor (AES-256-GCM)                 │
//! │     (Encrypts auth entries and kubeconfigs)          │
//! ├──────────────────────────────────────────────────────┤
//! │   FileKeyProvider / StaticKeyProvider                │
//! │     (master.key in the data dir, or env override)    │
//! ├──────────────────────────────────────────────────────┤
//! │                   Database                           │
//! │                   (SQLite)                           │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use kubelink_storage::{
//!     Database, FieldEncryptor, FileKeyProvider, MasterKeyProvider,
//!     SqliteConnectionRepository, SqliteEventRepository,
//! };
//! use std::sync::Arc;
//! use tokio::sync::Mutex;
//!
//! let master_key = FileKeyProvider::new(data_dir.join("master.key")).get_or_create_key()?;
//!
//! let db = Arc::new(Mutex::new(Database::open(&path)?));
//! let encryptor = Arc::new(FieldEncryptor::new(&master_key)?);
//!
//! let connections = SqliteConnectionRepository::new(db.clone(), encryptor);
//! let events = SqliteEventRepository::new(db.clone());
//! ```

pub mod crypto;
mod database;
pub mod keys;
mod repositories;

pub use crypto::{generate_master_key, FieldEncryptor, KEY_SIZE};
pub use database::Database;
pub use keys::{parse_master_key, FileKeyProvider, MasterKeyProvider, StaticKeyProvider};
pub use repositories::*;

/// Default database file name.
pub const DATABASE_FILE: &str = "kubelink.db";

/// Default master key file name.
pub const MASTER_KEY_FILE: &str = "master.key";

/// Default data directory for the current platform.
pub fn default_data_dir() -> Option<std::path::PathBuf> {
    dirs::data_local_dir().map(|p| p.join("kubelink"))
}

/// Get the default database path for the current platform.
pub fn default_database_path() -> Option<std::path::PathBuf> {
    default_data_dir().map(|p| p.join(DATABASE_FILE))
}
