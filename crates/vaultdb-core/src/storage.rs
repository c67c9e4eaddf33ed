use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::warn;
use uuid::Uuid;

use crate::error::{DatabaseError, Result};

pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    if !path.is_file() {
        return Err(DatabaseError::path(path, "database file not found"));
    }
    fs::read(path).map_err(|e| DatabaseError::path(path, format!("read: {e}")))
}

/// Replace `dest` with `bytes` so readers see either the old file or the new
/// one, never a torn write. The staging file lives next to `dest` so the
/// final rename stays on one filesystem.
pub fn write_atomic(dest: &Path, bytes: &[u8]) -> Result<()> {
    let parent = parent_dir(dest);
    if !parent.is_dir() {
        return Err(DatabaseError::path(parent, "directory does not exist"));
    }
    let staging_path = staging_path(dest)?;
    if let Err(err) = write_and_rename(&staging_path, dest, bytes) {
        if staging_path.exists() {
            warn!(path = %staging_path.display(), "removing staging file after failed write");
            let _ = fs::remove_file(&staging_path);
        }
        return Err(err);
    }
    fsync_dir(&parent)?;
    Ok(())
}

fn write_and_rename(staging_path: &Path, dest: &Path, bytes: &[u8]) -> Result<()> {
    {
        let mut file = File::create(staging_path)
            .map_err(|e| DatabaseError::path(staging_path, format!("create: {e}")))?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(staging_path, dest)
        .map_err(|e| DatabaseError::path(dest, format!("rename into place: {e}")))?;
    Ok(())
}

/// Whether `a` and `b` name the same file once resolved. Either path may not
/// exist yet, in which case its parent directory is resolved instead.
pub(crate) fn same_file(a: &Path, b: &Path) -> bool {
    match (resolve(a), resolve(b)) {
        (Some(a), Some(b)) => a == b,
        _ => a == b,
    }
}

fn resolve(path: &Path) -> Option<PathBuf> {
    if let Ok(full) = fs::canonicalize(path) {
        return Some(full);
    }
    let name = path.file_name()?;
    fs::canonicalize(parent_dir(path)).ok().map(|dir| dir.join(name))
}

fn staging_path(dest: &Path) -> Result<PathBuf> {
    let file_name = dest
        .file_name()
        .ok_or_else(|| DatabaseError::path(dest, "path has no file name"))?;
    let staging_name = format!("{}.{}.staging", file_name.to_string_lossy(), Uuid::new_v4());
    Ok(parent_dir(dest).join(staging_name))
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn fsync_dir(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        let dir = OpenOptions::new().read(true).open(path)?;
        dir.sync_all()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::tempdir;

    #[test]
    fn replaces_existing_file_without_leftovers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.pydb");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(read_file(&path).unwrap(), b"second");
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().flatten().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn missing_directory_is_a_path_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nope").join("db.pydb");
        assert_eq!(write_atomic(&path, b"x").unwrap_err().kind(), ErrorKind::Path);
        assert_eq!(read_file(&path).unwrap_err().kind(), ErrorKind::Path);
    }

    #[test]
    fn same_file_sees_through_relative_segments() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.pydb");
        write_atomic(&path, b"x").unwrap();
        let roundabout = dir.path().join(".").join("db.pydb");
        assert!(same_file(&path, &roundabout));
        assert!(!same_file(&path, &dir.path().join("copy.pydb")));
        assert!(same_file(
            &dir.path().join("new.pydb"),
            &dir.path().join(".").join("new.pydb")
        ));
    }
}
