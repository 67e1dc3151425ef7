//! Error taxonomy for distribution runs.
//!
//! Fatal errors leave zero side effects: nothing is assigned, nothing is
//! persisted. Running out of capacity partway through a run is *not* an
//! error; the engine returns fewer assignments than items and the caller
//! decides what to do with the remainder.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DistributionError {
    /// Flat distribution was asked to run against an empty agent list
    #[error("No agents available for task distribution")]
    NoAgentsAvailable,

    /// The owner has no active sub-agents
    #[error("No active sub-agents available for distribution (owner {0})")]
    NoEligibleSubAgents(String),

    /// Work items must carry a non-empty title
    #[error("Work item title must not be empty")]
    EmptyTitle,

    /// Failure in the cursor store, directory, or assignment store
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, DistributionError>;
