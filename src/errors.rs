//! Typed error hierarchy for the lint pipeline.
//!
//! Three top-level types cover the three failure domains:
//! - `ExtractError`: cloning, commit resolution and change-set materialization
//! - `ObserverNotificationError`: one or more observers failed during a fan-out
//! - `PipelineError`: the first fatal failure of a coordinated run

use std::path::PathBuf;

use thiserror::Error;

use crate::process::ProcessEvent;

/// Boxed source for failures that may originate in git or in the filesystem.
pub type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors from the repository change extractor.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Failed to clone {url} into {destination}: {source}")]
    Clone {
        url: String,
        destination: PathBuf,
        #[source]
        source: BoxedSource,
    },

    #[error("Commit reference '{reference}' does not resolve in the cloned repository")]
    UnresolvableReference {
        reference: String,
        #[source]
        source: git2::Error,
    },

    #[error("Failed to compute the change set of commit {commit}: {source}")]
    ChangeSet {
        commit: String,
        #[source]
        source: git2::Error,
    },

    #[error("Failed to materialize {path} from commit {commit}: {source}")]
    Extraction {
        path: String,
        commit: String,
        #[source]
        source: BoxedSource,
    },
}

impl ExtractError {
    pub(crate) fn extraction(
        path: impl Into<String>,
        commit: impl Into<String>,
        source: impl Into<BoxedSource>,
    ) -> Self {
        ExtractError::Extraction {
            path: path.into(),
            commit: commit.into(),
            source: source.into(),
        }
    }

    /// A reference that could not be derived, e.g. no merge commit to review.
    pub(crate) fn unresolvable(reference: impl Into<String>, message: &str) -> Self {
        ExtractError::UnresolvableReference {
            reference: reference.into(),
            source: git2::Error::from_str(message),
        }
    }

    /// Short machine-friendly label of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractError::Clone { .. } => "clone",
            ExtractError::UnresolvableReference { .. } => "unresolvable_reference",
            ExtractError::ChangeSet { .. } | ExtractError::Extraction { .. } => "extraction",
        }
    }
}

/// A single observer that failed while handling a lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObserverFailure {
    pub observer: String,
    pub message: String,
}

/// One or more observers failed during a fan-out. Every observer was still notified.
#[derive(Debug, Clone, Error)]
#[error("{} observer(s) failed on {event}: {}", .failures.len(), summarize(.failures))]
pub struct ObserverNotificationError {
    pub event: ProcessEvent,
    pub failures: Vec<ObserverFailure>,
}

fn summarize(failures: &[ObserverFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.observer, f.message))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Fatal errors surfaced by the pipeline coordinator.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("Lint engine '{engine}' failed: {source}")]
    Lint {
        engine: String,
        #[source]
        source: anyhow::Error,
    },
}
