//! Static documentation for published plugins
//!
//! Reads published archives, extracts each version's manifest and README,
//! and writes a versioned HTML site plus a machine readable `versions.json`.

pub mod assembler;
pub mod branch;
pub mod markdown;
pub mod source;
pub mod template;

use forge_manifest::ParseError;
use forge_package::{ArchiveError, ProcessError};
use forge_publish::PublishError;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use assembler::{
    collect_versions, generate, DocsOptions, DocsReport, PluginVersion, PluginVersionSet,
    VersionFailure, DEFAULT_KEEP_VERSIONS, DEFAULT_SITE_TITLE,
};
pub use branch::{publish_docs_branch, DocsBranchOptions};
pub use markdown::{CommonMarkRenderer, MarkdownRenderer};
pub use source::{ArchiveSource, LocalArchiveDir, ReleaseArchiveSource, SourceArchive};
pub use template::{escape_html, render, Rendered, TemplateSet, TemplateVars};

#[derive(Debug, Error)]
pub enum DocGenError {
    #[error("Failed to read archive {archive}: {source}")]
    Archive {
        archive: String,
        #[source]
        source: ArchiveError,
    },

    #[error("Archive {0} does not match its .sha256 sidecar")]
    ChecksumMismatch(String),

    #[error("Archive {0} contains no plugin manifest")]
    MissingManifest(String),

    #[error("Invalid manifest in {archive}: {source}")]
    Manifest {
        archive: String,
        #[source]
        source: ParseError,
    },

    #[error(transparent)]
    Release(#[from] PublishError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create scratch directory: {0}")]
    Scratch(#[source] std::io::Error),

    #[error("Failed to serialize versions.json: {0}")]
    Json(#[source] serde_json::Error),
}

impl DocGenError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        DocGenError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
