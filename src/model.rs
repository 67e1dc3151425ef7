//! Core types shared by the distribution engines.
//!
//! A distribution run consumes an ordered list of [`WorkItem`]s (produced by
//! the external file parser) and a pool of workers, and produces
//! [`Assignment`] records plus a per-worker count map. Workers come in two
//! variants with the same distribution semantics: top-level [`Agent`]s (flat
//! split) and per-owner [`SubAgent`]s (capacity-aware rotation).

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single parsed work item, immutable once produced by the parser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    /// Task title (non-empty by construction, see [`WorkItem::new`])
    pub title: String,
    /// Optional free-form description
    pub description: Option<String>,
}

impl WorkItem {
    /// Build a work item, rejecting blank titles.
    pub fn new(title: impl Into<String>, description: Option<String>) -> crate::Result<Self> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(crate::DistributionError::EmptyTitle);
        }
        Ok(Self { title, description })
    }
}

/// Task lifecycle status. Distribution always creates `Pending`; transitions
/// happen in the task management layer, never in the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

/// Task priority. Distribution always emits the default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

/// Top-level agent, the worker unit of the flat distributor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Unique identifier (opaque string)
    pub id: String,
    pub name: String,
    pub email: String,
}

/// Sub-agent owned by a parent agent, the worker unit of the rotation
/// distributor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubAgent {
    /// Unique identifier (opaque string)
    pub id: String,
    /// Parent agent id; defines the pool this sub-agent belongs to
    pub owner_agent_id: String,
    pub name: String,
    pub email: String,
    pub mobile: Option<String>,
    /// Only active sub-agents are eligible for distribution
    pub active: bool,
    /// Max tasks per import cycle; `None` or zero means unlimited
    pub capacity: Option<u32>,
}

impl SubAgent {
    /// Remaining-capacity budget for one run: `Some(n)` for a positive
    /// capacity, `None` for unlimited.
    pub fn capacity_budget(&self) -> Option<u32> {
        self.capacity.filter(|&c| c > 0)
    }
}

/// An assignment record produced by a distribution run. Created once per
/// distributed item; the engine never mutates it afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    /// Upload batch this assignment came from
    pub upload_id: String,
    /// Worker (agent or sub-agent) id the item was assigned to
    pub assigned_to: String,
    /// Owner scope, set only by the rotation distributor
    pub owner_agent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Assignment {
    /// Build a pending assignment for one work item.
    pub fn pending(
        item: &WorkItem,
        assigned_to: &str,
        upload_id: &str,
        owner_agent_id: Option<&str>,
    ) -> Self {
        let now = Utc::now();
        Self {
            title: item.title.clone(),
            description: item.description.clone(),
            status: TaskStatus::Pending,
            priority: TaskPriority::default(),
            upload_id: upload_id.to_string(),
            assigned_to: assigned_to.to_string(),
            owner_agent_id: owner_agent_id.map(str::to_string),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Provenance record for one uploaded batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadRecord {
    pub id: String,
    pub filename: String,
    pub original_name: String,
    pub total_tasks: usize,
    pub uploaded_by: String,
    pub created_at: DateTime<Utc>,
}

impl UploadRecord {
    pub fn new(filename: &str, original_name: &str, total_tasks: usize, uploaded_by: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            filename: filename.to_string(),
            original_name: original_name.to_string(),
            total_tasks,
            uploaded_by: uploaded_by.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// Outcome of one distribution run.
///
/// `per_worker_counts` preserves pool iteration order and includes every
/// worker in the pool, zero-count workers included. Partial distribution is
/// detected by comparing `total_assigned` against the number of input items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionResult {
    /// Number of assignments actually produced
    pub total_assigned: usize,
    pub assignments: Vec<Assignment>,
    pub per_worker_counts: IndexMap<String, u32>,
}
