//! Master key storage.
//!
//! The key encrypting stored credentials lives in a hex file inside the data
//! directory, created on first use. Deployments that manage secrets
//! themselves pass the key in directly (see [`StaticKeyProvider`]).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::crypto::{generate_master_key, KEY_SIZE};

/// Trait for providing the master encryption key.
pub trait MasterKeyProvider: Send + Sync {
    /// Get the master key, creating one if it doesn't exist.
    fn get_or_create_key(&self) -> Result<Zeroizing<[u8; KEY_SIZE]>>;

    /// Check if a master key exists.
    fn key_exists(&self) -> bool;

    /// Delete the master key.
    fn delete_key(&self) -> Result<()>;
}

/// Parse a hex-encoded master key
pub fn parse_master_key(hex_key: &str) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
    let key_bytes =
        Zeroizing::new(hex::decode(hex_key.trim()).context("Invalid master key format")?);
    if key_bytes.len() != KEY_SIZE {
        anyhow::bail!(
            "Invalid master key size: expected {}, got {}",
            KEY_SIZE,
            key_bytes.len()
        );
    }

    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    key.copy_from_slice(&key_bytes);
    Ok(key)
}

/// Master key kept in a file, generated when missing.
pub struct FileKeyProvider {
    path: PathBuf,
}

impl FileKeyProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_key(&self, hex_key: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create key directory: {:?}", parent))?;
        }
        std::fs::write(&self.path, hex_key)
            .with_context(|| format!("Failed to write master key to {:?}", self.path))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("Failed to restrict permissions on {:?}", self.path))?;
        }
        Ok(())
    }
}

impl MasterKeyProvider for FileKeyProvider {
    fn get_or_create_key(&self) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
        match std::fs::read_to_string(&self.path) {
            Ok(hex_key) => {
                debug!("Loaded master key from {:?}", self.path);
                let hex_key = Zeroizing::new(hex_key);
                parse_master_key(&hex_key)
                    .with_context(|| format!("Corrupt master key file {:?}", self.path))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No master key found, generating new key");
                let key = Zeroizing::new(generate_master_key()?);
                let hex_key = Zeroizing::new(hex::encode(*key));
                self.write_key(&hex_key)?;
                info!("Master key generated and stored at {:?}", self.path);
                Ok(key)
            }
            Err(e) => {
                Err(e).with_context(|| format!("Failed to read master key from {:?}", self.path))
            }
        }
    }

    fn key_exists(&self) -> bool {
        self.path.is_file()
    }

    fn delete_key(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Master key deleted from {:?}", self.path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No key to delete");
                Ok(())
            }
            Err(e) => Err(e).with_context(|| format!("Failed to delete {:?}", self.path)),
        }
    }
}

/// Master key supplied by the environment (e.g. `KUBELINK_MASTER_KEY`).
pub struct StaticKeyProvider {
    key: Zeroizing<[u8; KEY_SIZE]>,
}

impl StaticKeyProvider {
    pub fn from_hex(hex_key: &str) -> Result<Self> {
        Ok(Self {
            key: parse_master_key(hex_key)?,
        })
    }
}

impl MasterKeyProvider for StaticKeyProvider {
    fn get_or_create_key(&self) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
        Ok(self.key.clone())
    }

    fn key_exists(&self) -> bool {
        true
    }

    fn delete_key(&self) -> Result<()> {
        anyhow::bail!("A master key supplied by the environment cannot be deleted")
    }
}
