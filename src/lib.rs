//! AgentX Task Distribution Engine
//!
//! Splits uploaded batches of work items across agents and sub-agents.
//! Two strategies:
//! - Flat: even modulo split across a small fixed pool of top-level agents,
//!   pure and stateless.
//! - Capacity-aware rotation: round-robin over an owner's active sub-agents,
//!   honoring per-sub-agent capacity ceilings and continuing the rotation
//!   across uploads via a persisted per-owner cursor.
//!
//! ## Module Structure
//!
//! - `model`: work items, workers, assignments, result types
//! - `error`: distribution error taxonomy
//! - `config`: engine configuration
//! - `flat`: flat modulo distributor
//! - `rotation`: capacity-aware rotation distributor
//! - `store`: storage contracts + in-memory backend
//! - `sqlite_store`: local SQLite backend
//! - `service`: upload ingestion pipeline

/// Core types
pub mod model;

/// Error taxonomy
pub mod error;

/// Engine configuration
pub mod config;

/// Flat modulo distributor
pub mod flat;

/// Capacity-aware rotation distributor
pub mod rotation;

/// Storage contracts and in-memory backend
pub mod store;

/// Local SQLite backend
pub mod sqlite_store;

/// Upload ingestion pipeline
pub mod service;

pub use config::{DistributionConfig, DEFAULT_MAX_FLAT_AGENTS};
pub use error::{DistributionError, Result};
pub use flat::distribute_flat;
pub use model::{
    Agent, Assignment, DistributionResult, SubAgent, TaskPriority, TaskStatus, UploadRecord,
    WorkItem,
};
pub use rotation::RotationDistributor;
pub use service::{DistributionService, UploadMeta, UploadSummary};
pub use sqlite_store::SqliteStore;
pub use store::{AssignmentStore, CursorStore, MemoryStore, SubAgentDirectory};
