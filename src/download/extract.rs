//! `.tar.gz` extraction with member filtering and leading-directory stripping

use std::fs;
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;

use crate::error::{InstallResult, InstallerError};

/// Which archive members to extract and how to place them.
#[derive(Debug, Clone, Default)]
pub struct ExtractFilter {
    /// Only members whose path contains this substring
    pub contains: Option<String>,
    /// Number of leading path components to drop
    pub strip_components: usize,
}

impl ExtractFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn containing(pattern: &str) -> Self {
        Self {
            contains: Some(pattern.to_string()),
            strip_components: 0,
        }
    }

    pub fn strip(mut self, n: usize) -> Self {
        self.strip_components = n;
        self
    }

    /// Destination-relative path for `member`, or `None` to skip it.
    fn target(&self, member: &Path) -> InstallResult<Option<PathBuf>> {
        if let Some(pattern) = &self.contains
            && !member.to_string_lossy().contains(pattern.as_str())
        {
            return Ok(None);
        }

        let relative: PathBuf = member
            .components()
            .filter(|c| !matches!(c, Component::CurDir))
            .skip(self.strip_components)
            .collect();

        if relative.as_os_str().is_empty() {
            return Ok(None);
        }
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(InstallerError::Network(format!(
                "archive member escapes destination: {}",
                member.display()
            )));
        }
        Ok(Some(relative))
    }
}

/// Extract gzip-compressed tar `data` into `dest`.
///
/// Returns the destination-relative paths written, in archive order.
pub fn extract_tar_gz(data: &[u8], dest: &Path, filter: &ExtractFilter) -> InstallResult<Vec<PathBuf>> {
    let io_err = |e| InstallerError::fs(dest, e);

    fs::create_dir_all(dest).map_err(io_err)?;

    let mut archive = Archive::new(GzDecoder::new(data));
    archive.set_preserve_permissions(true);
    archive.set_overwrite(true);

    let mut written = Vec::new();
    for entry in archive.entries().map_err(io_err)? {
        let mut entry = entry.map_err(io_err)?;
        let member = entry.path().map_err(io_err)?.into_owned();

        let Some(relative) = filter.target(&member)? else {
            continue;
        };

        let target = dest.join(&relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| InstallerError::fs(parent, e))?;
        }
        entry
            .unpack(&target)
            .map_err(|e| InstallerError::fs(&target, e))?;
        written.push(relative);
    }

    Ok(written)
}

/// Run [`extract_tar_gz`] on the blocking pool.
pub async fn unpack(data: Vec<u8>, dest: PathBuf, filter: ExtractFilter) -> InstallResult<Vec<PathBuf>> {
    tokio::task::spawn_blocking(move || extract_tar_gz(&data, &dest, &filter))
        .await
        .map_err(|e| InstallerError::Filesystem {
            path: PathBuf::new(),
            source: std::io::Error::other(e),
        })?
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;

    /// Build an in-memory `.tar.gz` from `(path, contents)` pairs.
    pub(crate) fn tar_gz(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        for (path, contents) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, *contents).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[test]
    fn test_extract_app_dir_with_strip() {
        let data = tar_gz(&[
            ("mrlt8-docker-wyze-bridge-abc123/README.md", b"readme"),
            ("mrlt8-docker-wyze-bridge-abc123/app/frontend.py", b"app"),
            ("mrlt8-docker-wyze-bridge-abc123/app/lib/lib.amd64", b"lib"),
        ]);
        let dir = tempfile::tempdir().unwrap();

        let written = extract_tar_gz(&data, dir.path(), &ExtractFilter::containing("/app/").strip(2)).unwrap();

        assert_eq!(written, vec![PathBuf::from("frontend.py"), PathBuf::from("lib/lib.amd64")]);
        assert_eq!(fs::read(dir.path().join("frontend.py")).unwrap(), b"app");
        assert!(!dir.path().join("README.md").exists());
    }

    #[test]
    fn test_extract_all_handles_leading_dot() {
        let data = tar_gz(&[("./usr/local/bin/ffmpeg", b"bin")]);
        let dir = tempfile::tempdir().unwrap();

        extract_tar_gz(&data, dir.path(), &ExtractFilter::all()).unwrap();
        assert!(dir.path().join("usr/local/bin/ffmpeg").is_file());
    }

    #[test]
    fn test_filter_rejects_parent_components() {
        let filter = ExtractFilter::all();
        assert!(filter.target(Path::new("../../etc/passwd")).is_err());
        assert_eq!(
            filter.target(Path::new("mediamtx")).unwrap(),
            Some(PathBuf::from("mediamtx"))
        );
    }

    #[test]
    fn test_filter_skips_stripped_to_nothing() {
        let filter = ExtractFilter::containing("/app/").strip(2);
        assert_eq!(filter.target(Path::new("root/app/")).unwrap(), None);
        assert_eq!(filter.target(Path::new("root/docs/x.md")).unwrap(), None);
    }
}
