//! SHA-256 checksums and `.sha256` sidecars
//!
//! Sidecars use the `sha256sum` layout: `<hex>  <basename>\n`.

use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

pub const SIDECAR_EXTENSION: &str = "sha256";

/// SHA-256 of a file as lowercase hex, streamed
pub fn compute_checksum(path: &Path) -> io::Result<String> {
    let mut reader = BufReader::with_capacity(64 * 1024, File::open(path)?);
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// `<path>.sha256`
pub fn sidecar_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(SIDECAR_EXTENSION);
    PathBuf::from(name)
}

/// Write `"<checksum>  <basename>\n"` next to `path` and return the sidecar path
pub fn write_checksum_sidecar(path: &Path, checksum: &str) -> io::Result<PathBuf> {
    let basename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let sidecar = sidecar_path(path);
    fs::write(&sidecar, format!("{}  {}\n", checksum, basename))?;
    Ok(sidecar)
}

/// Parse a sidecar back into `(checksum, basename)`
pub fn read_checksum_sidecar(sidecar: &Path) -> io::Result<(String, String)> {
    let content = fs::read_to_string(sidecar)?;
    let line = content.lines().next().unwrap_or_default();
    line.split_once("  ")
        .map(|(sum, name)| (sum.to_string(), name.trim_start_matches('*').to_string()))
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("malformed checksum file {}", sidecar.display()),
            )
        })
}

/// Recompute and compare against `expected` (lowercase hex, case-sensitive).
/// An unreadable file never verifies.
pub fn verify_checksum(path: &Path, expected: &str) -> bool {
    compute_checksum(path).is_ok_and(|actual| actual == expected)
}
