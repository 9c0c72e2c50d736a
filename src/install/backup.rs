//! Pre-update `.tgz` backups of the application and token folders.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use flate2::Compression;
use flate2::write::GzEncoder;
use log::info;

use super::file_ops::set_mode;
use crate::error::{InstallResult, InstallerError};

/// `v<version>-<YYYYmmdd-HHMM>-<dirname>.tgz`
pub fn backup_name(version: &str, source: &Path, at: DateTime<Local>) -> String {
    let dirname = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "root".to_string());
    format!("v{version}-{}-{dirname}.tgz", at.format("%Y%m%d-%H%M"))
}

/// Archive `source` into `backup_dir`; `None` when there is nothing to back up.
pub fn create_backup(source: &Path, backup_dir: &Path, version: &str) -> InstallResult<Option<PathBuf>> {
    if !source.is_dir() {
        return Ok(None);
    }

    fs::create_dir_all(backup_dir).map_err(|e| InstallerError::fs(backup_dir, e))?;
    let target = backup_dir.join(backup_name(version, source, Local::now()));
    info!("Backing up {} to {}", source.display(), target.display());

    let file = fs::File::create(&target).map_err(|e| InstallerError::fs(&target, e))?;
    set_mode(&target, 0o600)?;

    let arcname = source.file_name().map(PathBuf::from).unwrap_or_default();
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    builder.follow_symlinks(false);
    builder
        .append_dir_all(&arcname, source)
        .map_err(|e| InstallerError::fs(source, e))?;
    builder
        .into_inner()
        .and_then(|gz| gz.finish())
        .map_err(|e| InstallerError::fs(&target, e))?;

    Ok(Some(target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use flate2::read::GzDecoder;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn test_backup_name() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 0).unwrap();
        assert_eq!(
            backup_name("2.9.12", Path::new("/srv/wyze-bridge"), at),
            "v2.9.12-20240309-0705-wyze-bridge.tgz"
        );
    }

    #[test]
    fn test_create_backup() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("tokens");
        fs::create_dir(&source).unwrap();
        fs::write(source.join("auth.pickle"), "secret").unwrap();
        let backups = dir.path().join("wyze-backups");

        let archive = create_backup(&source, &backups, "2.9.12").unwrap().unwrap();
        let mode = fs::metadata(&archive).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        let mut tar = tar::Archive::new(GzDecoder::new(fs::File::open(&archive).unwrap()));
        let names: Vec<String> = tar
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect();
        assert!(names.iter().any(|n| n == "tokens/auth.pickle"));
    }

    #[test]
    fn test_missing_source_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let result = create_backup(&dir.path().join("nope"), dir.path(), "1.0").unwrap();
        assert!(result.is_none());
    }
}
