//! Storage contracts consumed by the rotation distributor, plus in-memory
//! implementations used by tests and small deployments.
//!
//! The engine is deliberately storage-agnostic: it sees a rotation-cursor
//! store (pure integer state keyed by owner), a sub-agent directory, and an
//! assignment sink. [`SqliteStore`](crate::sqlite_store::SqliteStore) backs
//! all three with local SQLite.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::model::{Assignment, SubAgent, UploadRecord};

/// Persisted rotation cursor, one integer per owner scope.
///
/// Convention: `fetch_and_increment` returns the **pre-increment** value,
/// zero-initializing the record when absent. The first run for a fresh owner
/// therefore starts at cursor 0, and its first assignment lands on pool
/// index 1 (the engine advances before testing a candidate).
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Atomically bump the owner's cursor and return the pre-increment value.
    /// Must be safe under concurrent callers for the same owner.
    async fn fetch_and_increment(&self, owner_agent_id: &str) -> Result<u64>;

    /// Unconditional overwrite, used to persist the final position after a run.
    async fn set(&self, owner_agent_id: &str, index: u64) -> Result<()>;
}

/// Directory of sub-agents, queried per owner scope.
#[async_trait]
pub trait SubAgentDirectory: Send + Sync {
    /// Active sub-agents for the owner, in stable creation order.
    async fn active_sub_agents(&self, owner_agent_id: &str) -> Result<Vec<SubAgent>>;
}

/// Sink for produced assignments and upload provenance records.
#[async_trait]
pub trait AssignmentStore: Send + Sync {
    /// Bulk-insert the assignments of one run. A no-op for an empty slice.
    async fn insert_many(&self, assignments: &[Assignment]) -> Result<()>;

    async fn record_upload(&self, upload: &UploadRecord) -> Result<()>;
}

/// In-memory backend implementing all three contracts.
#[derive(Default)]
pub struct MemoryStore {
    cursors: Mutex<HashMap<String, u64>>,
    sub_agents: Mutex<Vec<SubAgent>>,
    assignments: Mutex<Vec<Assignment>>,
    uploads: Mutex<Vec<UploadRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sub-agent (keeps insertion order, which is the pool order).
    pub fn add_sub_agent(&self, sub: SubAgent) {
        self.sub_agents.lock().push(sub);
    }

    /// Seed a cursor value, for tests exercising pool-shrink clamping.
    pub fn seed_cursor(&self, owner_agent_id: &str, index: u64) {
        self.cursors.lock().insert(owner_agent_id.to_string(), index);
    }

    pub fn cursor(&self, owner_agent_id: &str) -> Option<u64> {
        self.cursors.lock().get(owner_agent_id).copied()
    }

    pub fn assignments(&self) -> Vec<Assignment> {
        self.assignments.lock().clone()
    }

    pub fn uploads(&self) -> Vec<UploadRecord> {
        self.uploads.lock().clone()
    }
}

#[async_trait]
impl CursorStore for MemoryStore {
    async fn fetch_and_increment(&self, owner_agent_id: &str) -> Result<u64> {
        let mut cursors = self.cursors.lock();
        let entry = cursors.entry(owner_agent_id.to_string()).or_insert(0);
        let previous = *entry;
        *entry += 1;
        Ok(previous)
    }

    async fn set(&self, owner_agent_id: &str, index: u64) -> Result<()> {
        self.cursors
            .lock()
            .insert(owner_agent_id.to_string(), index);
        Ok(())
    }
}

#[async_trait]
impl SubAgentDirectory for MemoryStore {
    async fn active_sub_agents(&self, owner_agent_id: &str) -> Result<Vec<SubAgent>> {
        Ok(self
            .sub_agents
            .lock()
            .iter()
            .filter(|s| s.owner_agent_id == owner_agent_id && s.active)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AssignmentStore for MemoryStore {
    async fn insert_many(&self, assignments: &[Assignment]) -> Result<()> {
        if assignments.is_empty() {
            return Ok(());
        }
        self.assignments.lock().extend_from_slice(assignments);
        Ok(())
    }

    async fn record_upload(&self, upload: &UploadRecord) -> Result<()> {
        self.uploads.lock().push(upload.clone());
        Ok(())
    }
}
