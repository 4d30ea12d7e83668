//! Archive naming convention
//!
//! Archives are always named `<sanitized-name>-<version>.<ext>` so the
//! documentation step can recover the plugin name and version from a file
//! name alone.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

static ARCHIVE_NAME_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^(.+)-(\d+\.\d+\.\d+.*)$").ok());

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArchiveFormat {
    #[default]
    #[serde(rename = "zip")]
    Zip,
    #[serde(rename = "tar.gz")]
    TarGz,
}

impl ArchiveFormat {
    pub const fn extension(self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::TarGz => "tar.gz",
        }
    }

    /// Detect the format from a file name
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        if file_name.ends_with(".zip") {
            Some(ArchiveFormat::Zip)
        } else if file_name.ends_with(".tar.gz") || file_name.ends_with(".tgz") {
            Some(ArchiveFormat::TarGz)
        } else {
            None
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ArchiveFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "zip" => Ok(ArchiveFormat::Zip),
            "tar.gz" | "tgz" | "targz" => Ok(ArchiveFormat::TarGz),
            other => Err(format!(
                "unsupported archive format '{}' (expected zip or tar.gz)",
                other
            )),
        }
    }
}

/// Name and version recovered from an archive file name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArchiveName {
    pub name: String,
    pub version: String,
}

/// Derive a safe registry/file identifier from an arbitrary name.
///
/// Lower-cases, turns whitespace into hyphens, then drops everything outside
/// `[a-z0-9-]`.
pub fn sanitize_name(input: &str) -> String {
    input
        .to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() { '-' } else { c })
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect()
}

/// `<sanitized-name>-<version>.<ext>`
pub fn archive_file_name(name: &str, version: &str, format: ArchiveFormat) -> String {
    format!("{}-{}.{}", sanitize_name(name), version, format.extension())
}

/// Inverse of [`archive_file_name`]. `None` means "not one of ours, skip it".
///
/// The split is greedy on the name side, so a name that itself ends in a
/// version-shaped hyphen segment can be misattributed.
pub fn parse_archive_name(file_name: &str) -> Option<ArchiveName> {
    let stem = [".tar.gz", ".tgz", ".zip"]
        .iter()
        .find_map(|ext| file_name.strip_suffix(ext))?;

    let captures = ARCHIVE_NAME_RE.as_ref()?.captures(stem)?;
    Some(ArchiveName {
        name: captures.get(1)?.as_str().to_string(),
        version: captures.get(2)?.as_str().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("My Cool Tool"), "my-cool-tool");
        assert_eq!(sanitize_name("tool_v2!"), "toolv2");
        assert_eq!(sanitize_name("Already-ok-9"), "already-ok-9");
        assert_eq!(sanitize_name(""), "");
        assert_eq!(sanitize_name("Ünïcode"), "ncode");
    }

    #[test]
    fn test_archive_file_name() {
        assert_eq!(
            archive_file_name("Demo Tool", "1.0.0", ArchiveFormat::Zip),
            "demo-tool-1.0.0.zip"
        );
        assert_eq!(
            archive_file_name("demo", "2.3.4-rc.1", ArchiveFormat::TarGz),
            "demo-2.3.4-rc.1.tar.gz"
        );
    }

    #[test]
    fn test_parse_archive_name_round_trip() {
        for (name, version) in [
            ("demo", "1.0.0"),
            ("multi-word-tool", "0.12.3"),
            ("tool-2", "1.0.0"),
            ("x", "3.0.0-beta.2+build.7"),
        ] {
            for format in [ArchiveFormat::Zip, ArchiveFormat::TarGz] {
                let file = archive_file_name(name, version, format);
                assert_eq!(
                    parse_archive_name(&file),
                    Some(ArchiveName {
                        name: name.to_string(),
                        version: version.to_string(),
                    }),
                    "round trip failed for {}",
                    file
                );
            }
        }
    }

    #[test]
    fn test_parse_archive_name_rejects_foreign_files() {
        assert_eq!(parse_archive_name("demo-1.0.0.zip.sha256"), None);
        assert_eq!(parse_archive_name("notes.txt"), None);
        assert_eq!(parse_archive_name("demo.zip"), None);
        assert_eq!(parse_archive_name("demo-latest.tar.gz"), None);
    }

    #[test]
    fn test_parse_archive_name_tgz() {
        let parsed = parse_archive_name("demo-1.2.3.tgz");
        assert_eq!(parsed.map(|p| p.version), Some("1.2.3".to_string()));
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("zip".parse::<ArchiveFormat>(), Ok(ArchiveFormat::Zip));
        assert_eq!("TAR.GZ".parse::<ArchiveFormat>(), Ok(ArchiveFormat::TarGz));
        assert!("rar".parse::<ArchiveFormat>().is_err());
    }
}
