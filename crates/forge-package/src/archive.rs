//! Archive building and reading
//!
//! tar.gz archives wrap everything in a `<base_name>/` directory; zip
//! archives hold the plugin files at the root. Entries are written in sorted
//! path order with normalized metadata so rebuilding an unchanged plugin
//! yields the same listing.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use forge_manifest::ArchiveFormat;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

/// Upper bound for a single entry read back out of an archive
const MAX_ENTRY_BYTES: u64 = 16 * 1024 * 1024;

/// Directories never shipped inside a plugin archive
const EXCLUDED_DIRS: &[&str] = &[".git"];

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Source directory does not exist: {0}")]
    SourceMissing(PathBuf),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("ZIP error on {path}: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Unsupported archive type: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("Entry {entry} in {archive} is larger than {limit} bytes")]
    EntryTooLarge {
        archive: PathBuf,
        entry: String,
        limit: u64,
    },
}

impl ArchiveError {
    fn io(path: &Path, source: io::Error) -> Self {
        ArchiveError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn zip(path: &Path, source: zip::result::ZipError) -> Self {
        ArchiveError::Zip {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(Debug)]
enum EntryKind {
    Dir,
    File,
}

#[derive(Debug)]
struct SourceEntry {
    path: PathBuf,
    /// Relative path with `/` separators
    name: String,
    kind: EntryKind,
}

fn collect_entries(source_dir: &Path) -> Result<Vec<SourceEntry>, ArchiveError> {
    let walker = WalkDir::new(source_dir)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            !(e.file_type().is_dir()
                && EXCLUDED_DIRS.iter().any(|d| e.file_name() == *d))
        });

    let mut entries = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| ArchiveError::Walk {
            path: source_dir.to_path_buf(),
            source: e,
        })?;
        let Ok(relative) = entry.path().strip_prefix(source_dir) else {
            continue;
        };
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let kind = if entry.file_type().is_dir() {
            EntryKind::Dir
        } else if entry.path().is_file() {
            // regular files and symlinks to files are shipped by content
            EntryKind::File
        } else {
            debug!("Skipping {:?}: not a regular file", entry.path());
            continue;
        };

        entries.push(SourceEntry {
            path: entry.path().to_path_buf(),
            name,
            kind,
        });
    }
    Ok(entries)
}

/// Package every file under `source_dir` into `output_path`.
///
/// The archive is written to a temporary sibling and renamed into place, so
/// a failure never leaves a partial file at `output_path`.
pub fn build_archive(
    source_dir: &Path,
    output_path: &Path,
    base_name: &str,
    format: ArchiveFormat,
) -> Result<(), ArchiveError> {
    if !source_dir.is_dir() {
        return Err(ArchiveError::SourceMissing(source_dir.to_path_buf()));
    }

    let entries = collect_entries(source_dir)?;
    debug!(
        "Archiving {} entries from {:?} into {:?}",
        entries.len(),
        source_dir,
        output_path
    );

    let parent = match output_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(|e| ArchiveError::io(&parent, e))?;

    let mut staging = tempfile::Builder::new()
        .prefix(".forge-")
        .suffix(".partial")
        .tempfile_in(&parent)
        .map_err(|e| ArchiveError::io(&parent, e))?;

    match format {
        ArchiveFormat::Zip => write_zip(staging.as_file_mut(), &entries, output_path)?,
        ArchiveFormat::TarGz => {
            write_tar_gz(staging.as_file_mut(), &entries, source_dir, base_name, output_path)?
        }
    }

    staging
        .persist(output_path)
        .map_err(|e| ArchiveError::io(output_path, e.error))?;
    Ok(())
}

fn write_tar_gz(
    file: &mut File,
    entries: &[SourceEntry],
    source_dir: &Path,
    base_name: &str,
    output_path: &Path,
) -> Result<(), ArchiveError> {
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.mode(tar::HeaderMode::Deterministic);

    let io_err = |e| ArchiveError::io(output_path, e);

    builder.append_dir(base_name, source_dir).map_err(io_err)?;
    for entry in entries {
        let name = format!("{}/{}", base_name, entry.name);
        match entry.kind {
            EntryKind::Dir => builder.append_dir(&name, &entry.path).map_err(io_err)?,
            EntryKind::File => builder
                .append_path_with_name(&entry.path, &name)
                .map_err(io_err)?,
        }
    }

    let encoder = builder.into_inner().map_err(io_err)?;
    encoder.finish().map_err(io_err)?;
    Ok(())
}

fn write_zip(
    file: &mut File,
    entries: &[SourceEntry],
    output_path: &Path,
) -> Result<(), ArchiveError> {
    let mut writer = zip::ZipWriter::new(file);

    for entry in entries {
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .unix_permissions(unix_mode(&entry.path));
        match entry.kind {
            EntryKind::Dir => writer
                .add_directory(format!("{}/", entry.name), options)
                .map_err(|e| ArchiveError::zip(output_path, e))?,
            EntryKind::File => {
                writer
                    .start_file(entry.name.clone(), options)
                    .map_err(|e| ArchiveError::zip(output_path, e))?;
                let mut source =
                    File::open(&entry.path).map_err(|e| ArchiveError::io(&entry.path, e))?;
                io::copy(&mut source, &mut writer).map_err(|e| ArchiveError::io(&entry.path, e))?;
            }
        }
    }

    writer
        .finish()
        .map_err(|e| ArchiveError::zip(output_path, e))?;
    Ok(())
}

#[cfg(unix)]
fn unix_mode(path: &Path) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o777)
        .unwrap_or(0o644)
}

#[cfg(not(unix))]
fn unix_mode(path: &Path) -> u32 {
    if path.is_dir() {
        0o755
    } else {
        0o644
    }
}

/// An entry read back out of an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Path inside the archive
    pub path: String,
    pub contents: Vec<u8>,
}

impl ArchiveEntry {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.contents).into_owned()
    }
}

/// Rank of `entry_path` against the candidate names, lower is better.
///
/// A match at the archive root beats one under the wrapper directory, then
/// earlier candidates beat later ones. With `wrapper` set only
/// `<wrapper>/<candidate>` counts as wrapped; without it any single leading
/// directory does.
fn candidate_rank(
    entry_path: &str,
    wrapper: Option<&str>,
    candidates: &[&str],
) -> Option<(usize, usize)> {
    let path = entry_path.trim_start_matches("./");
    let (depth, name) = match path.split_once('/') {
        None => (0, path),
        Some((dir, rest)) if wrapper.map_or(true, |w| w == dir) && !rest.contains('/') => {
            (1, rest)
        }
        Some(_) => return None,
    };
    candidates
        .iter()
        .position(|candidate| *candidate == name)
        .map(|index| (depth, index))
}

/// Read the best-matching entry among `candidates` (earlier names win).
///
/// tar.gz archives are expected to wrap their files in a directory named
/// after the archive stem; zip archives hold them at the root.
pub fn read_archive_entry(
    archive: &Path,
    candidates: &[&str],
) -> Result<Option<ArchiveEntry>, ArchiveError> {
    let file_name = archive
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let format = ArchiveFormat::from_file_name(file_name)
        .ok_or_else(|| ArchiveError::UnsupportedFormat(archive.to_path_buf()))?;
    let wrapper = match format {
        ArchiveFormat::Zip => None,
        ArchiveFormat::TarGz => [".tar.gz", ".tgz"]
            .iter()
            .find_map(|ext| file_name.strip_suffix(ext)),
    };

    let file = File::open(archive).map_err(|e| ArchiveError::io(archive, e))?;
    let mut best: Option<((usize, usize), ArchiveEntry)> = None;
    let mut consider = |rank: (usize, usize),
                        path: String,
                        reader: &mut dyn Read|
     -> Result<(), ArchiveError> {
        if best.as_ref().is_some_and(|(r, _)| *r <= rank) {
            return Ok(());
        }
        let mut contents = Vec::new();
        reader
            .take(MAX_ENTRY_BYTES + 1)
            .read_to_end(&mut contents)
            .map_err(|e| ArchiveError::io(archive, e))?;
        if contents.len() as u64 > MAX_ENTRY_BYTES {
            return Err(ArchiveError::EntryTooLarge {
                archive: archive.to_path_buf(),
                entry: path,
                limit: MAX_ENTRY_BYTES,
            });
        }
        best = Some((rank, ArchiveEntry { path, contents }));
        Ok(())
    };

    match format {
        ArchiveFormat::Zip => {
            let mut zip = zip::ZipArchive::new(file).map_err(|e| ArchiveError::zip(archive, e))?;
            for index in 0..zip.len() {
                let mut entry = zip
                    .by_index(index)
                    .map_err(|e| ArchiveError::zip(archive, e))?;
                if !entry.is_file() {
                    continue;
                }
                let path = entry.name().to_string();
                if let Some(rank) = candidate_rank(&path, wrapper, candidates) {
                    consider(rank, path, &mut entry)?;
                }
            }
        }
        ArchiveFormat::TarGz => {
            let mut tar = tar::Archive::new(GzDecoder::new(file));
            let entries = tar.entries().map_err(|e| ArchiveError::io(archive, e))?;
            for entry in entries {
                let mut entry = entry.map_err(|e| ArchiveError::io(archive, e))?;
                if !entry.header().entry_type().is_file() {
                    continue;
                }
                let path = entry
                    .path()
                    .map_err(|e| ArchiveError::io(archive, e))?
                    .to_string_lossy()
                    .replace('\\', "/");
                if let Some(rank) = candidate_rank(&path, wrapper, candidates) {
                    consider(rank, path, &mut entry)?;
                }
            }
        }
    }

    Ok(best.map(|(_, entry)| entry))
}

/// List every file entry path in an archive
pub fn list_archive(archive: &Path) -> Result<Vec<String>, ArchiveError> {
    let file_name = archive
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let format = ArchiveFormat::from_file_name(file_name)
        .ok_or_else(|| ArchiveError::UnsupportedFormat(archive.to_path_buf()))?;
    let file = File::open(archive).map_err(|e| ArchiveError::io(archive, e))?;

    let mut names = Vec::new();
    match format {
        ArchiveFormat::Zip => {
            let mut zip = zip::ZipArchive::new(file).map_err(|e| ArchiveError::zip(archive, e))?;
            for index in 0..zip.len() {
                let entry = zip
                    .by_index(index)
                    .map_err(|e| ArchiveError::zip(archive, e))?;
                if entry.is_file() {
                    names.push(entry.name().to_string());
                }
            }
        }
        ArchiveFormat::TarGz => {
            let mut tar = tar::Archive::new(GzDecoder::new(file));
            for entry in tar.entries().map_err(|e| ArchiveError::io(archive, e))? {
                let entry = entry.map_err(|e| ArchiveError::io(archive, e))?;
                if entry.header().entry_type().is_file() {
                    let path = entry.path().map_err(|e| ArchiveError::io(archive, e))?;
                    names.push(path.to_string_lossy().replace('\\', "/"));
                }
            }
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn plugin_fixture(root: &Path) -> PathBuf {
        let dir = root.join("demo");
        let _ = fs::create_dir_all(dir.join("bin"));
        let _ = fs::create_dir_all(dir.join(".git"));
        let _ = fs::write(dir.join("plugin.json"), r#"{"pkgName":"demo"}"#);
        let _ = fs::write(dir.join("README.md"), "# Demo\n");
        let _ = fs::write(dir.join("bin").join("demo"), "#!/bin/sh\necho demo\n");
        let _ = fs::write(dir.join(".git").join("HEAD"), "ref: refs/heads/main\n");
        dir
    }

    #[test]
    fn test_zip_has_no_wrapper_directory() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let source = plugin_fixture(temp_dir.path());
        let output = temp_dir.path().join("out").join("demo-1.0.0.zip");

        assert!(build_archive(&source, &output, "demo-1.0.0", ArchiveFormat::Zip).is_ok());
        let Ok(mut names) = list_archive(&output) else {
            panic!("archive should be listable");
        };
        names.sort();
        assert_eq!(names, vec!["README.md", "bin/demo", "plugin.json"]);
    }

    #[test]
    fn test_tar_gz_is_rooted_at_base_name() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let source = plugin_fixture(temp_dir.path());
        let output = temp_dir.path().join("demo-1.0.0.tar.gz");

        assert!(build_archive(&source, &output, "demo-1.0.0", ArchiveFormat::TarGz).is_ok());
        let Ok(mut names) = list_archive(&output) else {
            panic!("archive should be listable");
        };
        names.sort();
        assert_eq!(
            names,
            vec![
                "demo-1.0.0/README.md",
                "demo-1.0.0/bin/demo",
                "demo-1.0.0/plugin.json"
            ]
        );
    }

    #[test]
    fn test_missing_source_is_error_and_leaves_nothing() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let output = temp_dir.path().join("x-1.0.0.zip");
        let result = build_archive(
            &temp_dir.path().join("missing"),
            &output,
            "x-1.0.0",
            ArchiveFormat::Zip,
        );
        assert!(matches!(result, Err(ArchiveError::SourceMissing(_))));
        assert!(!output.exists());
    }

    #[test]
    fn test_read_archive_entry_prefers_earlier_candidate() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let source = plugin_fixture(temp_dir.path());
        let _ = fs::write(source.join("NOTES.md"), "notes");

        for (file, format) in [
            ("demo-1.0.0.zip", ArchiveFormat::Zip),
            ("demo-1.0.0.tar.gz", ArchiveFormat::TarGz),
        ] {
            let output = temp_dir.path().join(file);
            assert!(build_archive(&source, &output, "demo-1.0.0", format).is_ok());

            let entry = read_archive_entry(&output, &["README.md", "NOTES.md"]);
            let Ok(Some(entry)) = entry else {
                panic!("README should be found in {}", file);
            };
            assert_eq!(entry.text(), "# Demo\n");
            assert!(entry.path.ends_with("README.md"));

            let missing = read_archive_entry(&output, &["plugin.yaml"]);
            assert!(matches!(missing, Ok(None)));
        }
    }

    #[test]
    fn test_nested_candidate_is_not_matched() {
        assert_eq!(candidate_rank("demo-1.0.0/README.md", None, &["README.md"]), Some((1, 0)));
        assert_eq!(candidate_rank("README.md", None, &["README.md"]), Some((0, 0)));
        assert_eq!(candidate_rank("./plugin.json", None, &["plugin.json"]), Some((0, 0)));
        assert_eq!(candidate_rank("a/b/README.md", None, &["README.md"]), None);
        assert_eq!(
            candidate_rank("assets/README.md", Some("demo-1.0.0"), &["README.md"]),
            None
        );
    }

    #[test]
    fn test_root_entry_beats_same_name_in_subdirectory() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let source = temp_dir.path().join("demo");
        assert!(fs::create_dir_all(source.join("assets")).is_ok());
        assert!(fs::write(source.join("plugin.json"), "ROOT").is_ok());
        assert!(fs::write(source.join("assets").join("plugin.json"), "NESTED").is_ok());

        for (file, format) in [
            ("demo-1.0.0.zip", ArchiveFormat::Zip),
            ("demo-1.0.0.tar.gz", ArchiveFormat::TarGz),
        ] {
            let output = temp_dir.path().join(file);
            assert!(build_archive(&source, &output, "demo-1.0.0", format).is_ok());

            let Ok(Some(entry)) = read_archive_entry(&output, &["plugin.json"]) else {
                panic!("manifest should be found in {}", file);
            };
            assert_eq!(entry.text(), "ROOT", "wrong entry {} in {}", entry.path, file);
        }
    }

    #[test]
    fn test_oversized_entry_is_rejected() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let source = temp_dir.path().join("demo");
        assert!(fs::create_dir_all(&source).is_ok());
        let Ok(big) = File::create(source.join("README.md")) else {
            return;
        };
        assert!(big.set_len(MAX_ENTRY_BYTES + 1).is_ok());

        let output = temp_dir.path().join("demo-1.0.0.zip");
        assert!(build_archive(&source, &output, "demo-1.0.0", ArchiveFormat::Zip).is_ok());
        assert!(matches!(
            read_archive_entry(&output, &["README.md"]),
            Err(ArchiveError::EntryTooLarge { .. })
        ));
    }

    #[test]
    fn test_unsupported_archive() {
        let result = read_archive_entry(Path::new("/tmp/plugin.rar"), &["plugin.json"]);
        assert!(matches!(result, Err(ArchiveError::UnsupportedFormat(_))));
    }
}
