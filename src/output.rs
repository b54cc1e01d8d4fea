//! Snapshot persistence.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

#[derive(Debug, Error)]
#[error("failed to write {}: {source}", path.display())]
pub struct WriteError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl WriteError {
    fn new(path: &Path, source: io::Error) -> Self {
        Self {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Writes `contents` to `dst`, creating missing parent directories and
/// replacing any existing file.
///
/// The bytes go to a sibling temp file first and are renamed into place, so
/// `dst` is never left half-written.
pub fn write_snapshot(dst: &Path, contents: &[u8]) -> Result<(), WriteError> {
    if let Some(parent) = dst.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| WriteError::new(parent, e))?;
    }

    // SEC-009: unpredictable temp name, opened with create_new so an existing
    // file or symlink at that path is never followed.
    let random_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = temp_sibling(dst, random_suffix);

    let result = write_then_rename(&temp_path, dst, contents);
    if result.is_err() {
        let _ = std::fs::remove_file(&temp_path);
    }
    result
}

fn temp_sibling(dst: &Path, suffix: u128) -> PathBuf {
    let mut name = dst.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".tmp.{:016x}", suffix));
    dst.with_file_name(name)
}

fn write_then_rename(temp_path: &Path, dst: &Path, contents: &[u8]) -> Result<(), WriteError> {
    let mut temp_file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(temp_path)
        .map_err(|e| WriteError::new(temp_path, e))?;

    temp_file
        .write_all(contents)
        .map_err(|e| WriteError::new(temp_path, e))?;
    temp_file
        .sync_all()
        .map_err(|e| WriteError::new(temp_path, e))?;
    drop(temp_file);

    // On Windows, rename fails if destination exists, so remove it first
    #[cfg(windows)]
    if dst.exists() {
        std::fs::remove_file(dst).map_err(|e| WriteError::new(dst, e))?;
    }

    std::fs::rename(temp_path, dst).map_err(|e| WriteError::new(dst, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("feedsnap_output_{name}"));
        std::fs::remove_dir_all(&dir).ok();
        dir
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = scratch("parents");
        let dst = dir.join("a").join("b").join("feed.json");

        write_snapshot(&dst, b"{}").unwrap();
        assert_eq!(std::fs::read(&dst).unwrap(), b"{}");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_overwrites_existing_file() {
        let dir = scratch("overwrite");
        let dst = dir.join("feed.json");

        write_snapshot(&dst, b"first version, longer").unwrap();
        write_snapshot(&dst, b"second").unwrap();
        assert_eq!(std::fs::read(&dst).unwrap(), b"second");

        // No temp files left behind
        let leftovers: Vec<_> = std::fs::read_dir(&dir)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp."))
            .collect();
        assert!(leftovers.is_empty());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_parent_is_a_file() {
        let dir = scratch("parent_file");
        std::fs::create_dir_all(&dir).unwrap();
        let blocker = dir.join("blocker");
        std::fs::write(&blocker, b"x").unwrap();

        let err = write_snapshot(&blocker.join("feed.json"), b"{}").unwrap_err();
        assert_eq!(err.path, blocker);
        assert!(err.to_string().starts_with("failed to write "));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_temp_sibling_stays_in_directory() {
        let temp = temp_sibling(Path::new("out/feed.json"), 0xabc);
        assert_eq!(temp, Path::new("out/feed.json.tmp.0000000000000abc"));
    }
}
