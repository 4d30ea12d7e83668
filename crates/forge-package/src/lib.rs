//! Packaging for plugin-forge
//!
//! Builds plugin archives with checksum sidecars and provides the process
//! execution layer shared by the publishing and documentation steps.

pub mod archive;
pub mod checksum;
pub mod orchestrator;
pub mod process;

pub use archive::{build_archive, list_archive, read_archive_entry, ArchiveEntry, ArchiveError};
pub use checksum::{
    compute_checksum, read_checksum_sidecar, sidecar_path, verify_checksum,
    write_checksum_sidecar,
};
pub use orchestrator::{
    human_size, package_all, package_all_with_summary, package_plugin, PackageError, PackageFailure,
    PackageOptions, PackageOutcome, PackageSummary, PackagedArtifact,
};
pub use process::{CommandOutput, CommandRunner, CommandSpec, ProcessError, SystemRunner};
