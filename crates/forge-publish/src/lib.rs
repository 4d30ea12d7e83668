//! Publishing for plugin-forge
//!
//! Two destinations are supported: an OCI registry (through `oras`) and
//! GitHub Releases (through `git` plus a [`ReleaseStore`]). Both check for an
//! existing publication first, so re-running a publish is a no-op unless
//! force is set. Any failure aborts the rest of the run.

pub mod oci;
pub mod release;
pub mod summary;

#[cfg(test)]
pub(crate) mod fake;

pub use oci::{OciCredentials, OciOptions, OciPublisher, LAYER_MEDIA_TYPE};
pub use release::{
    release_notes, release_tag, GhCliStore, ReleaseAsset, ReleaseOptions, ReleasePublisher,
    ReleaseStore, TagStrategy,
};
pub use summary::{PublishError, PublishSummary};
