//! OEP-2 repo metadata: splitting the shared repos manifest into per-repo
//! `openedx.yaml` pull requests, and gathering those files back up.

pub mod explode;
pub mod implode;
pub mod manifest;

pub use explode::explode;
pub use implode::{implode, render_imploded};

use thiserror::Error;

use crate::github::GitHubError;
use manifest::ManifestError;

/// Work branch the generated file is committed to.
pub const BRANCH_NAME: &str = "add-openedx-yaml";

/// Per-repo metadata file.
pub const OPEN_EDX_YAML: &str = "openedx.yaml";

#[derive(Debug, Error)]
pub enum Oep2Error {
    #[error(transparent)]
    GitHub(#[from] GitHubError),

    #[error("Invalid manifest: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Manifest {path} not found in {repo}")]
    MissingManifest { repo: String, path: String },
}
