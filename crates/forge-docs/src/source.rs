//! Where published archives come from
//!
//! Documentation can be built from a local directory of archives (e.g. the
//! packaging output) or from the assets attached to GitHub Releases.

use crate::DocGenError;
use forge_manifest::ArchiveFormat;
use forge_package::{read_checksum_sidecar, sidecar_path, verify_checksum};
use forge_publish::{ReleaseAsset, ReleaseStore};
use std::fs;
use std::path::{Path, PathBuf};

/// A published archive, before it is fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceArchive {
    pub file_name: String,
    pub size_bytes: u64,
    /// Download link shown on the generated pages
    pub url: String,
    /// Release tag holding the asset, for release-backed sources
    pub tag: Option<String>,
}

pub trait ArchiveSource {
    /// Every candidate archive, in discovery order
    fn list(&self) -> Result<Vec<SourceArchive>, DocGenError>;

    /// Make `archive` available as a local file. `scratch` is a directory the
    /// caller owns and removes afterwards.
    fn fetch(&self, archive: &SourceArchive, scratch: &Path) -> Result<PathBuf, DocGenError>;
}

/// Archives sitting in a local directory
#[derive(Debug, Clone)]
pub struct LocalArchiveDir {
    dir: PathBuf,
    base_url: Option<String>,
}

impl LocalArchiveDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            base_url: None,
        }
    }

    /// Prefix for download links, e.g. a release download URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    fn url_for(&self, file_name: &str) -> String {
        match &self.base_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), file_name),
            None => self.dir.join(file_name).display().to_string(),
        }
    }
}

impl ArchiveSource for LocalArchiveDir {
    fn list(&self) -> Result<Vec<SourceArchive>, DocGenError> {
        let io_err = |e| DocGenError::Io {
            path: self.dir.clone(),
            source: e,
        };

        let mut archives = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            let metadata = entry.metadata().map_err(io_err)?;
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if !metadata.is_file() || ArchiveFormat::from_file_name(&file_name).is_none() {
                continue;
            }
            archives.push(SourceArchive {
                url: self.url_for(&file_name),
                file_name,
                size_bytes: metadata.len(),
                tag: None,
            });
        }
        archives.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(archives)
    }

    /// A `.sha256` sidecar next to the archive, when present, must match
    fn fetch(&self, archive: &SourceArchive, _scratch: &Path) -> Result<PathBuf, DocGenError> {
        let path = self.dir.join(&archive.file_name);
        if !path.is_file() {
            return Err(DocGenError::Io {
                path,
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "archive disappeared"),
            });
        }

        let sidecar = sidecar_path(&path);
        if sidecar.is_file() {
            let (expected, _) =
                read_checksum_sidecar(&sidecar).map_err(|e| DocGenError::io(&sidecar, e))?;
            if !verify_checksum(&path, &expected) {
                return Err(DocGenError::ChecksumMismatch(archive.file_name.clone()));
            }
        }
        Ok(path)
    }
}

/// Archives attached to releases in a [`ReleaseStore`]
pub struct ReleaseArchiveSource<S> {
    store: S,
}

impl<S: ReleaseStore> ReleaseArchiveSource<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S: ReleaseStore> ArchiveSource for ReleaseArchiveSource<S> {
    fn list(&self) -> Result<Vec<SourceArchive>, DocGenError> {
        Ok(self
            .store
            .list_assets()?
            .into_iter()
            .filter(|asset| ArchiveFormat::from_file_name(&asset.name).is_some())
            .map(|asset| SourceArchive {
                file_name: asset.name,
                size_bytes: asset.size,
                url: asset.url,
                tag: Some(asset.tag),
            })
            .collect())
    }

    fn fetch(&self, archive: &SourceArchive, scratch: &Path) -> Result<PathBuf, DocGenError> {
        let asset = ReleaseAsset {
            tag: archive.tag.clone().unwrap_or_default(),
            name: archive.file_name.clone(),
            size: archive.size_bytes,
            url: archive.url.clone(),
        };
        Ok(self.store.download_asset(&asset, scratch)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_local_dir_lists_archives_only() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let dir = temp_dir.path();
        for name in ["b-1.0.0.zip", "a-1.0.0.tar.gz", "a-1.0.0.tar.gz.sha256", "notes.txt"] {
            assert!(fs::write(dir.join(name), "x").is_ok());
        }
        assert!(fs::create_dir_all(dir.join("c-1.0.0.zip")).is_ok());

        let source = LocalArchiveDir::new(dir).with_base_url("https://example.com/dl/");
        let Ok(archives) = source.list() else {
            panic!("listing should succeed");
        };
        let names: Vec<_> = archives.iter().map(|a| a.file_name.as_str()).collect();
        assert_eq!(names, vec!["a-1.0.0.tar.gz", "b-1.0.0.zip"]);
        assert_eq!(archives[0].url, "https://example.com/dl/a-1.0.0.tar.gz");
        assert_eq!(archives[0].size_bytes, 1);
    }

    #[test]
    fn test_local_fetch_checks_sidecar() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let dir = temp_dir.path();
        let archive = dir.join("demo-1.0.0.zip");
        assert!(fs::write(&archive, "payload").is_ok());
        let Ok(checksum) = forge_package::compute_checksum(&archive) else {
            return;
        };
        assert!(forge_package::write_checksum_sidecar(&archive, &checksum).is_ok());

        let source = LocalArchiveDir::new(dir);
        let Ok(archives) = source.list() else {
            panic!("listing should succeed");
        };
        assert!(source.fetch(&archives[0], dir).is_ok_and(|p| p == archive));

        assert!(fs::write(&archive, "tampered").is_ok());
        assert!(matches!(
            source.fetch(&archives[0], dir),
            Err(DocGenError::ChecksumMismatch(name)) if name == "demo-1.0.0.zip"
        ));
    }

    #[test]
    fn test_local_dir_missing_is_error() {
        let source = LocalArchiveDir::new("/tmp/forge-no-such-dir");
        assert!(matches!(source.list(), Err(DocGenError::Io { .. })));
    }

    struct OneAssetStore;

    impl ReleaseStore for OneAssetStore {
        fn release_exists(&self, _tag: &str) -> Result<bool, forge_publish::PublishError> {
            Ok(true)
        }

        fn delete_release(&self, _tag: &str) -> Result<(), forge_publish::PublishError> {
            Ok(())
        }

        fn create_release(
            &self,
            _tag: &str,
            _title: &str,
            _notes: &str,
            _assets: &[PathBuf],
        ) -> Result<(), forge_publish::PublishError> {
            Ok(())
        }

        fn list_assets(&self) -> Result<Vec<ReleaseAsset>, forge_publish::PublishError> {
            Ok(vec![
                ReleaseAsset {
                    tag: "demo-1.0.0".to_string(),
                    name: "demo-1.0.0.zip".to_string(),
                    size: 42,
                    url: "https://example.com/demo-1.0.0.zip".to_string(),
                },
                ReleaseAsset {
                    tag: "demo-1.0.0".to_string(),
                    name: "demo-1.0.0.zip.sha256".to_string(),
                    size: 80,
                    url: String::new(),
                },
            ])
        }

        fn download_asset(
            &self,
            asset: &ReleaseAsset,
            dest_dir: &Path,
        ) -> Result<PathBuf, forge_publish::PublishError> {
            let path = dest_dir.join(format!("{}@{}", asset.tag, asset.name));
            fs::write(&path, "x").map_err(|e| forge_publish::PublishError::Io {
                path: path.clone(),
                source: e,
            })?;
            Ok(path)
        }
    }

    #[test]
    fn test_release_source_keeps_tag_for_download() {
        let Ok(scratch) = TempDir::new() else {
            return;
        };
        let source = ReleaseArchiveSource::new(OneAssetStore);
        let Ok(archives) = source.list() else {
            panic!("listing should succeed");
        };
        assert_eq!(archives.len(), 1);
        assert_eq!(archives[0].tag.as_deref(), Some("demo-1.0.0"));
        assert_eq!(archives[0].size_bytes, 42);

        let fetched = source.fetch(&archives[0], scratch.path());
        assert!(fetched.is_ok_and(|p| p.ends_with("demo-1.0.0@demo-1.0.0.zip")));
    }
}
