//! Small file helpers for the state-directory protocol.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;
use std::time::SystemTime;

/// First line of `path`, trimmed. `None` if the file is empty or the first
/// line is blank.
pub(crate) fn read_first_line(path: &Path) -> io::Result<Option<String>> {
    let content = fs::read_to_string(path)?;
    Ok(content
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string))
}

/// Write `content` to `tmp`, then rename it over `path`.
pub(crate) fn write_atomic(tmp: &Path, path: &Path, content: &str) -> io::Result<()> {
    fs::write(tmp, content)?;
    fs::rename(tmp, path)
}

/// Create `path` if absent. Returns `false` if it already existed.
pub(crate) fn create_new(path: &Path) -> io::Result<bool> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e),
    }
}

/// Set the modification time of an existing file.
pub(crate) fn touch(path: &Path, at: SystemTime) -> io::Result<()> {
    File::options().write(true).open(path)?.set_modified(at)
}

/// Remove `path`. Returns `false` if it did not exist.
pub(crate) fn remove_if_present(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn first_line_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, "  WARNING \nignored\n").unwrap();
        assert_eq!(read_first_line(&path).unwrap().as_deref(), Some("WARNING"));
    }

    #[test]
    fn empty_or_blank_first_line_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, "").unwrap();
        assert_eq!(read_first_line(&path).unwrap(), None);
        fs::write(&path, "   \nREADY\n").unwrap();
        assert_eq!(read_first_line(&path).unwrap(), None);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_first_line(&dir.path().join("missing")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn write_atomic_replaces_target_and_removes_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let tmp = dir.path().join("out.tmp");
        let path = dir.path().join("out");
        fs::write(&path, "old").unwrap();

        write_atomic(&tmp, &path, "new").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
        assert!(!tmp.exists());
    }

    #[test]
    fn create_touch_remove_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("marker");

        assert!(create_new(&path).unwrap());
        assert!(!create_new(&path).unwrap());

        let at = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        touch(&path, at).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), at);

        assert!(remove_if_present(&path).unwrap());
        assert!(!remove_if_present(&path).unwrap());
    }
}
