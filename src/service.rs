//! Upload ingestion pipeline.
//!
//! Ties the external collaborators together for one uploaded batch: record
//! the upload, run the requested distributor, bulk-persist assignments, and
//! (rotation only) persist the advanced cursor. Mirrors the order the admin
//! upload endpoints use: provenance first, then distribution.
//!
//! At most one rotation run is in flight per owner; runs for different
//! owners proceed independently.

use std::sync::Arc;

use dashmap::DashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;

use crate::config::DistributionConfig;
use crate::error::Result;
use crate::flat::distribute_flat;
use crate::model::{Agent, UploadRecord, WorkItem};
use crate::rotation::RotationDistributor;
use crate::store::{AssignmentStore, CursorStore, SubAgentDirectory};

/// Metadata about an uploaded file, supplied by the upload endpoint.
#[derive(Debug, Clone)]
pub struct UploadMeta {
    /// Stored filename (after the storage collaborator renamed it)
    pub filename: String,
    /// Name the file was uploaded under
    pub original_name: String,
    /// Id of the admin or agent who uploaded the file
    pub uploaded_by: String,
}

/// Summary returned to the upload endpoint.
///
/// `total_assigned < total_parsed` means the run stopped early because every
/// eligible worker hit its capacity; the leftover items were not persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSummary {
    pub upload_id: String,
    pub total_parsed: usize,
    pub total_assigned: usize,
    pub per_worker_counts: IndexMap<String, u32>,
}

/// Distribution pipeline bound to its storage collaborators.
pub struct DistributionService {
    assignments: Arc<dyn AssignmentStore>,
    rotation: RotationDistributor,
    config: DistributionConfig,
    // One guard per owner scope; only one rotation run in flight per owner
    owner_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl DistributionService {
    pub fn new(
        directory: Arc<dyn SubAgentDirectory>,
        cursors: Arc<dyn CursorStore>,
        assignments: Arc<dyn AssignmentStore>,
        config: DistributionConfig,
    ) -> Self {
        let rotation = RotationDistributor::new(directory, cursors, assignments.clone());
        Self {
            assignments,
            rotation,
            config,
            owner_locks: DashMap::new(),
        }
    }

    /// Split an uploaded batch evenly across top-level agents.
    ///
    /// The agent pool is capped at `config.max_flat_agents`; callers pass the
    /// directory listing and the cap is applied here.
    pub async fn ingest_flat(
        &self,
        items: &[WorkItem],
        agents: &[Agent],
        meta: &UploadMeta,
    ) -> Result<UploadSummary> {
        let pool = &agents[..agents.len().min(self.config.max_flat_agents)];

        let upload = UploadRecord::new(
            &meta.filename,
            &meta.original_name,
            items.len(),
            &meta.uploaded_by,
        );

        let result = distribute_flat(items, pool, &upload.id)?;

        self.assignments.record_upload(&upload).await?;
        self.assignments.insert_many(&result.assignments).await?;

        info!(
            upload_id = %upload.id,
            total = items.len(),
            agents = pool.len(),
            "flat upload ingested"
        );

        Ok(UploadSummary {
            upload_id: upload.id,
            total_parsed: items.len(),
            total_assigned: result.total_assigned,
            per_worker_counts: result.per_worker_counts,
        })
    }

    /// Distribute an uploaded batch across the owner's sub-agents with the
    /// capacity-aware rotation. Serialized per owner.
    pub async fn ingest_rotation(
        &self,
        items: &[WorkItem],
        owner_agent_id: &str,
        meta: &UploadMeta,
    ) -> Result<UploadSummary> {
        let lock = self
            .owner_locks
            .entry(owner_agent_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let upload = UploadRecord::new(
            &meta.filename,
            &meta.original_name,
            items.len(),
            &meta.uploaded_by,
        );
        self.assignments.record_upload(&upload).await?;

        let result = self
            .rotation
            .distribute(items, owner_agent_id, &upload.id)
            .await?;

        info!(
            upload_id = %upload.id,
            owner = owner_agent_id,
            parsed = items.len(),
            assigned = result.total_assigned,
            "rotation upload ingested"
        );

        Ok(UploadSummary {
            upload_id: upload.id,
            total_parsed: items.len(),
            total_assigned: result.total_assigned,
            per_worker_counts: result.per_worker_counts,
        })
    }
}
