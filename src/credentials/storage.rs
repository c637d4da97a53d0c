//! Durable storage behind the credential store.
//!
//! The store never touches the filesystem directly; it goes through a
//! `Storage` so the I/O layer can be swapped (tests count reads and
//! inject write failures).  `FsStorage` is the real implementation.

use std::fs;
use std::io;
use std::path::Path;

/// Byte-level access to the credential file.
pub trait Storage: Send + Sync {
    /// Whether a file exists at `path`.  Absence is not an error.
    fn exists(&self, path: &Path) -> io::Result<bool>;

    /// Read the full contents of `path`.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Replace the contents of `path` with `bytes`.
    ///
    /// Implementations must never leave a partially written file at
    /// `path`: after an error the previous contents are still there.
    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;
}

/// Local filesystem storage with atomic replace.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsStorage;

impl Storage for FsStorage {
    fn exists(&self, path: &Path) -> io::Result<bool> {
        path.try_exists()
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    /// Write to a temp file in the same directory, then rename it over
    /// the target.  The rename is atomic on the same filesystem, so
    /// readers never see a half-written credential file.
    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        if !parent.exists() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = parent.join(format!(
            ".{}.tmp",
            path.file_name().unwrap_or_default().to_string_lossy()
        ));

        if let Err(e) = write_private(&tmp_path, bytes) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }
        if let Err(e) = fs::rename(&tmp_path, path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }
        Ok(())
    }
}

/// Write `bytes` to `path` with owner-only permissions on Unix.
fn write_private(path: &Path, bytes: &[u8]) -> io::Result<()> {
    fs::write(path, bytes)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_then_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("auth.vault");
        let fs = FsStorage;

        assert!(!fs.exists(&path).unwrap());
        fs.write(&path, b"one").unwrap();
        assert!(fs.exists(&path).unwrap());
        assert_eq!(fs.read(&path).unwrap(), b"one");

        fs.write(&path, b"two").unwrap();
        assert_eq!(fs.read(&path).unwrap(), b"two");
    }

    #[test]
    fn write_creates_parent_dirs_and_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("auth.vault");
        FsStorage.write(&path, b"data").unwrap();

        let names: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("auth.vault")]);
    }

    #[cfg(unix)]
    #[test]
    fn written_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("auth.vault");
        FsStorage.write(&path, b"data").unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
