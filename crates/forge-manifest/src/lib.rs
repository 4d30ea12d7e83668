//! Plugin manifest handling for plugin-forge
//!
//! This crate owns the typed manifest model, JSON/YAML parsing, the
//! validation rules applied before packaging, and the archive naming
//! convention shared by the packaging and documentation steps.

pub mod errors;
pub mod manifest;
pub mod naming;
pub mod types;
pub mod validation;
pub mod version;

pub use errors::{ManifestError, ParseError};
pub use manifest::{
    discover_plugin_dirs, find_manifest, find_readme, parse_manifest, read_manifest,
    ManifestFormat, MANIFEST_FILE_NAMES, README_FILE_NAMES,
};
pub use naming::{archive_file_name, parse_archive_name, sanitize_name, ArchiveFormat, ArchiveName};
pub use types::{Command, CommandKind, Flag, Manifest, Metadata};
pub use validation::{
    validate, validate_all, validate_plugin_dir, PluginValidation, ValidationReport,
    ValidationResult,
};
pub use version::{compare_versions, is_semver};
