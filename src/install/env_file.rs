//! `KEY=value` environment files.

use std::fs;
use std::path::Path;

use log::info;

use crate::error::{InstallResult, InstallerError};

/// Value of `key` in `content`, trimmed.
pub fn get_value(content: &str, key: &str) -> Option<String> {
    let prefix = format!("{key}=");
    content
        .lines()
        .find_map(|line| line.strip_prefix(prefix.as_str()))
        .map(|v| v.trim().to_string())
}

/// Replace the first `key=` line in `content` or append one.
///
/// Returns the new content and the previous value, if any.
pub fn upsert(content: &str, key: &str, value: &str) -> (String, Option<String>) {
    let prefix = format!("{key}=");
    let mut previous = None;
    let mut lines: Vec<String> = Vec::new();

    for line in content.lines() {
        if previous.is_none()
            && let Some(old) = line.strip_prefix(prefix.as_str())
        {
            previous = Some(old.trim().to_string());
            lines.push(format!("{key}={value}"));
        } else {
            lines.push(line.to_string());
        }
    }
    if previous.is_none() {
        lines.push(format!("{key}={value}"));
    }

    let mut out = lines.join("\n");
    out.push('\n');
    (out, previous)
}

/// Read `key` from the file at `path`; `None` if the file or key is missing.
pub fn read_key(path: &Path, key: &str) -> InstallResult<Option<String>> {
    if !path.is_file() {
        return Ok(None);
    }
    let content = fs::read_to_string(path).map_err(|e| InstallerError::fs(path, e))?;
    Ok(get_value(&content, key))
}

/// Set `key=value` in the file at `path`, creating it if needed.
pub fn update_key(path: &Path, key: &str, value: &str) -> InstallResult<()> {
    let content = if path.is_file() {
        fs::read_to_string(path).map_err(|e| InstallerError::fs(path, e))?
    } else {
        String::new()
    };

    let (updated, previous) = upsert(&content, key, value);
    if let Some(old) = previous
        && old != value
    {
        info!("Updating {}: {key} from: {old} to: {value}", path.display());
    }

    fs::write(path, updated).map_err(|e| InstallerError::fs(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_value() {
        let content = "# comment\nVERSION=2.10.3\nMTX_TAG=1.9.0\n";
        assert_eq!(get_value(content, "VERSION").as_deref(), Some("2.10.3"));
        assert_eq!(get_value(content, "MTX_TAG").as_deref(), Some("1.9.0"));
        assert_eq!(get_value(content, "MISSING"), None);
    }

    #[test]
    fn test_upsert_replaces_existing() {
        let (out, prev) = upsert("A=1\nVERSION=1.0\nB=2", "VERSION", "2.0");
        assert_eq!(out, "A=1\nVERSION=2.0\nB=2\n");
        assert_eq!(prev.as_deref(), Some("1.0"));
    }

    #[test]
    fn test_upsert_appends_missing() {
        let (out, prev) = upsert("A=1\n", "MTX_TAG", "1.9.0");
        assert_eq!(out, "A=1\nMTX_TAG=1.9.0\n");
        assert!(prev.is_none());
    }

    #[test]
    fn test_update_key_twice_keeps_single_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");

        update_key(&path, "VERSION", "2.10.3").unwrap();
        update_key(&path, "VERSION", "2.10.3").unwrap();
        update_key(&path, "VERSION", "2.11.0").unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("VERSION=").count(), 1);
        assert_eq!(read_key(&path, "VERSION").unwrap().as_deref(), Some("2.11.0"));
    }

    #[test]
    fn test_read_key_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_key(&dir.path().join(".env"), "VERSION").unwrap(), None);
    }
}
