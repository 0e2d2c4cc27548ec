//! # Sysfs Accessor
//!
//! Reads and writes unsigned integer knobs under `<root>/class/net/<interface>/`.
//!
//! The root is `/sys` on a real host. Tests point it at a temporary
//! directory laid out the same way.
//!
//! Writes never create files: a knob that does not exist is reported as
//! [`ConfigureError::PathNotFound`], which is how a missing interface or an
//! unsupported driver shows up.

use crate::ConfigureError;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Default sysfs mount point.
pub const SYSFS_ROOT: &str = "/sys";

/// Longest path the kernel accepts, including the trailing NUL.
pub const PATH_MAX: usize = 4096;

/// Handle to a sysfs tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sysfs {
    root: PathBuf,
}

impl Default for Sysfs {
    fn default() -> Self {
        Self::new(SYSFS_ROOT)
    }
}

impl Sysfs {
    /// Create a handle rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Get the root this handle resolves paths against.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Build `<root>/class/net/<interface>/<setting>`.
    ///
    /// Fails instead of truncating when the result would not fit in PATH_MAX.
    pub fn net_path(&self, interface: &str, setting: &str) -> Result<PathBuf, ConfigureError> {
        let path = self
            .root
            .join("class")
            .join("net")
            .join(interface)
            .join(setting);

        if path.as_os_str().len() >= PATH_MAX {
            return Err(ConfigureError::PathTooLong {
                interface: interface.to_string(),
                setting: setting.to_string(),
            });
        }
        Ok(path)
    }

    /// Write `value` as ASCII decimal followed by a newline.
    pub fn write_uint_value(&self, path: &Path, value: u64) -> Result<(), ConfigureError> {
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(|e| write_error(path, value, &e))?;

        file.write_all(format!("{}\n", value).as_bytes())
            .map_err(|e| write_error(path, value, &e))
    }

    /// Read an unsigned decimal, ignoring surrounding whitespace.
    pub fn read_uint_value(&self, path: &Path) -> Result<u64, ConfigureError> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ConfigureError::PathNotFound {
                path: path.display().to_string(),
            },
            _ => ConfigureError::ReadFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            },
        })?;

        content
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigureError::InvalidValue {
                path: path.display().to_string(),
                content: content.trim().to_string(),
            })
    }
}

fn write_error(path: &Path, value: u64, err: &std::io::Error) -> ConfigureError {
    match err.kind() {
        ErrorKind::NotFound => ConfigureError::PathNotFound {
            path: path.display().to_string(),
        },
        _ => ConfigureError::WriteRejected {
            path: path.display().to_string(),
            value,
            reason: err.to_string(),
        },
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_knob(root: &Path, interface: &str, setting: &str, content: &str) -> PathBuf {
        let dir = root.join("class/net").join(interface);
        std::fs::create_dir_all(&dir).expect("mkdir");
        let path = dir.join(setting);
        std::fs::write(&path, content).expect("write");
        path
    }

    #[test]
    fn net_path_layout() {
        let sysfs = Sysfs::default();
        let path = sysfs.net_path("eth0", "gro_flush_timeout").expect("path");
        assert_eq!(path, PathBuf::from("/sys/class/net/eth0/gro_flush_timeout"));
    }

    #[test]
    fn net_path_too_long() {
        let sysfs = Sysfs::default();
        let setting = "x".repeat(PATH_MAX);
        let result = sysfs.net_path("eth0", &setting);
        assert!(matches!(result, Err(ConfigureError::PathTooLong { .. })));
    }

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = fake_knob(dir.path(), "eth0", "napi_defer_hard_irqs", "0\n");
        let sysfs = Sysfs::new(dir.path());

        sysfs.write_uint_value(&path, 1_000_000_000).expect("write");

        assert_eq!(
            std::fs::read_to_string(&path).expect("read"),
            "1000000000\n"
        );
        assert_eq!(sysfs.read_uint_value(&path).expect("read"), 1_000_000_000);
    }

    #[test]
    fn write_does_not_create() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sysfs = Sysfs::new(dir.path());
        let path = sysfs.net_path("ghost0", "gro_flush_timeout").expect("path");

        let result = sysfs.write_uint_value(&path, 0);
        assert!(matches!(result, Err(ConfigureError::PathNotFound { .. })));
        assert!(!path.exists());
    }

    #[test]
    fn read_missing_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sysfs = Sysfs::new(dir.path());
        let path = sysfs.net_path("ghost0", "gro_flush_timeout").expect("path");

        let result = sysfs.read_uint_value(&path);
        assert!(matches!(result, Err(ConfigureError::PathNotFound { .. })));
    }

    #[test]
    fn read_garbage_is_invalid() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = fake_knob(dir.path(), "eth0", "gro_flush_timeout", "bogus\n");
        let sysfs = Sysfs::new(dir.path());

        let result = sysfs.read_uint_value(&path);
        assert!(matches!(result, Err(ConfigureError::InvalidValue { .. })));
    }
}
