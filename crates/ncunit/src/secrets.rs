//! Credentials kept on disk, readable by root only.
//!
//! The leader generates the admin password during bootstrap and leaves it
//! in a vault; the `get_admin_password` action hands it out once and deletes
//! it. The database password lives in a second vault that is read, not
//! taken, whenever the backup configuration is rendered.

use std::io::Write;
use std::path::{Path, PathBuf};

use rand::Rng;
use secrecy::{ExposeSecret, SecretString};

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("Failed to write credential file '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read credential file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

const ALPHANUMERIC: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const PUNCTUATION: &[u8] = b"!#%+,-.:=@^_~";

pub const MIN_PASSWORD_LEN: usize = 16;
pub const MAX_PASSWORD_LEN: usize = 24;

/// Generates a random password of 16 to 24 characters. The first character
/// is alphanumeric so the value never looks like a command-line flag.
pub fn generate_password() -> SecretString {
    let mut rng = rand::thread_rng();
    let len = rng.gen_range(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN);

    let first = ALPHANUMERIC[rng.gen_range(0..ALPHANUMERIC.len())] as char;
    let charset: Vec<u8> = ALPHANUMERIC.iter().chain(PUNCTUATION).copied().collect();

    let mut password = String::with_capacity(len);
    password.push(first);
    for _ in 1..len {
        password.push(charset[rng.gen_range(0..charset.len())] as char);
    }

    SecretString::from(password)
}

/// File-backed, single-use credential store.
#[derive(Debug, Clone)]
pub struct CredentialVault {
    path: PathBuf,
}

impl CredentialVault {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_available(&self) -> bool {
        self.path.exists()
    }

    /// Stores `secret`, replacing any previous one. The file is created
    /// read-only for its owner.
    pub fn store(&self, secret: &SecretString) -> Result<(), SecretError> {
        let write_err = |source| SecretError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(write_err(e)),
            _ => {}
        }

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o400);
        }

        let mut file = options.open(&self.path).map_err(write_err)?;
        file.write_all(secret.expose_secret().as_bytes())
            .map_err(write_err)?;
        Ok(())
    }

    /// Returns the stored secret and keeps it.
    pub fn read(&self) -> Result<Option<SecretString>, SecretError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(SecretString::from(content))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(SecretError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Removes the stored secret, if any.
    pub fn discard(&self) -> Result<(), SecretError> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(SecretError::Write {
                path: self.path.clone(),
                source: e,
            }),
            _ => Ok(()),
        }
    }

    /// Returns the stored secret and deletes it.
    ///
    /// The file is first renamed aside, so two concurrent callers cannot
    /// both obtain it.
    pub fn take(&self) -> Result<Option<SecretString>, SecretError> {
        let claimed = crate::storage::temp_sibling(&self.path);
        match std::fs::rename(&self.path, &claimed) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(SecretError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        }

        let content = std::fs::read_to_string(&claimed).map_err(|source| SecretError::Read {
            path: claimed.clone(),
            source,
        });
        if let Err(e) = std::fs::remove_file(&claimed) {
            log::warn!("Failed to remove claimed credential {}: {}", claimed.display(), e);
        }

        Ok(Some(SecretString::from(content?)))
    }
}
