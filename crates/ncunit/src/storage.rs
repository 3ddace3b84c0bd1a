//! Small filesystem helpers with path-carrying errors.

use std::path::{Path, PathBuf};

use crate::error::StorageError;

fn ensure_parent(path: &Path) -> Result<(), StorageError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| StorageError::CreateDirectory {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

/// Writes `content` to `path`, creating parent directories.
pub fn write_file(path: &Path, content: &str) -> Result<(), StorageError> {
    ensure_parent(path)?;
    std::fs::write(path, content).map_err(|e| StorageError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Like [`write_file`], but the file ends up readable and writable by its
/// owner only, also when it existed before with a wider mode.
pub fn write_private(path: &Path, content: &str) -> Result<(), StorageError> {
    use std::io::Write;

    ensure_parent(path)?;
    let write_err = |e| StorageError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    };

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
        options.mode(0o600);
        if path.exists() {
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .map_err(write_err)?;
        }
    }

    let mut file = options.open(path).map_err(write_err)?;
    file.write_all(content.as_bytes()).map_err(write_err)
}

/// Writes through a sibling temp file and renames it into place, so readers
/// see either the old or the new content.
pub fn write_atomic(path: &Path, content: &str) -> Result<(), StorageError> {
    let tmp = temp_sibling(path);
    write_file(&tmp, content)?;

    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        StorageError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        }
    })
}

/// Reads `path`, returning `None` if it does not exist.
pub fn read_optional(path: &Path) -> Result<Option<String>, StorageError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Removes `path`; a missing file is not an error. Returns whether a file
/// was removed.
pub fn remove_if_exists(path: &Path) -> Result<bool, StorageError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StorageError::RemoveFile {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Creates an empty file if none exists, leaving existing content alone.
pub fn touch(path: &Path) -> Result<(), StorageError> {
    ensure_parent(path)?;
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(|_| ())
        .map_err(|e| StorageError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })
}

pub(crate) fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp", name))
}
