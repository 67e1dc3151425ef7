//! Capacity-aware round-robin distributor over a per-owner sub-agent pool.
//!
//! Flow:
//! 1. Load the owner's active sub-agent pool (fatal if empty).
//! 2. Fetch-and-increment the owner's rotation cursor, clamp it modulo the
//!    current pool size. Successive runs continue the rotation instead of
//!    restarting at index 0.
//! 3. Walk the items in order, advancing the cursor circularly and skipping
//!    sub-agents that hit their capacity; a full circle with no eligible
//!    candidate stops the run (partial distribution, not an error).
//! 4. Persist assignments first, then the final cursor position, so a crash
//!    in between costs one repeated sub-agent next run rather than lost
//!    assignments.

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::error::{DistributionError, Result};
use crate::model::{Assignment, DistributionResult, SubAgent, WorkItem};
use crate::store::{AssignmentStore, CursorStore, SubAgentDirectory};

/// Outcome of the pure planning pass.
struct RotationPlan {
    assignments: Vec<Assignment>,
    per_worker_counts: IndexMap<String, u32>,
    /// Pool index of the last successful assignment (or the starting
    /// position when nothing was assigned)
    final_cursor: usize,
}

/// Pure in-memory planning over an already-loaded pool and starting cursor.
///
/// The cursor always advances one position before a candidate is tested, so
/// a run starting at cursor `c` places its first assignment at
/// `(c + 1) % pool.len()`. For each item the sweep performs at most
/// `pool.len()` advance-then-test steps; "all full" is declared after the
/// `pool.len()`-th failed test, which leaves the cursor back where the sweep
/// began.
fn plan_rotation(
    items: &[WorkItem],
    pool: &[SubAgent],
    start: usize,
    upload_id: &str,
    owner_agent_id: &str,
) -> RotationPlan {
    debug_assert!(!pool.is_empty());

    let mut per_worker_counts: IndexMap<String, u32> =
        pool.iter().map(|s| (s.id.clone(), 0)).collect();
    // None = unlimited
    let mut budgets: Vec<Option<u32>> = pool.iter().map(|s| s.capacity_budget()).collect();

    let mut assignments = Vec::new();
    let mut cursor = start;

    'items: for item in items {
        for _ in 0..pool.len() {
            cursor = (cursor + 1) % pool.len();
            let under_capacity = match budgets[cursor] {
                Some(remaining) => remaining > 0,
                None => true,
            };
            if under_capacity {
                if let Some(remaining) = budgets[cursor].as_mut() {
                    *remaining -= 1;
                }
                let sub = &pool[cursor];
                assignments.push(Assignment::pending(
                    item,
                    &sub.id,
                    upload_id,
                    Some(owner_agent_id),
                ));
                *per_worker_counts.entry(sub.id.clone()).or_insert(0) += 1;
                continue 'items;
            }
        }
        // Full circle, every sub-agent at capacity
        break;
    }

    RotationPlan {
        assignments,
        per_worker_counts,
        final_cursor: cursor,
    }
}

/// Capacity-aware rotation distributor bound to its storage collaborators.
pub struct RotationDistributor {
    directory: Arc<dyn SubAgentDirectory>,
    cursors: Arc<dyn CursorStore>,
    assignments: Arc<dyn AssignmentStore>,
}

impl RotationDistributor {
    pub fn new(
        directory: Arc<dyn SubAgentDirectory>,
        cursors: Arc<dyn CursorStore>,
        assignments: Arc<dyn AssignmentStore>,
    ) -> Self {
        Self {
            directory,
            cursors,
            assignments,
        }
    }

    /// Distribute `items` to the owner's active sub-agents and persist the
    /// produced assignments plus the advanced rotation cursor.
    ///
    /// Fails with [`DistributionError::NoEligibleSubAgents`] when the pool is
    /// empty; the cursor store is not touched in that case. Running out of
    /// total capacity partway through is success: the result simply carries
    /// fewer assignments than items.
    pub async fn distribute(
        &self,
        items: &[WorkItem],
        owner_agent_id: &str,
        upload_id: &str,
    ) -> Result<DistributionResult> {
        let pool = self.directory.active_sub_agents(owner_agent_id).await?;
        if pool.is_empty() {
            return Err(DistributionError::NoEligibleSubAgents(
                owner_agent_id.to_string(),
            ));
        }

        // Clamp against the current pool size; the stored value may predate
        // a pool shrink.
        let raw_cursor = self.cursors.fetch_and_increment(owner_agent_id).await?;
        let start = (raw_cursor % pool.len() as u64) as usize;

        info!(
            owner = owner_agent_id,
            upload_id,
            items = items.len(),
            pool = pool.len(),
            start,
            "starting rotation distribution"
        );

        let plan = plan_rotation(items, &pool, start, upload_id, owner_agent_id);

        if plan.assignments.len() < items.len() {
            warn!(
                owner = owner_agent_id,
                assigned = plan.assignments.len(),
                unassigned = items.len() - plan.assignments.len(),
                "all sub-agents at capacity, stopping early"
            );
        }

        // Assignments before cursor: a crash in between repeats a sub-agent
        // on the next run instead of losing assignments.
        self.assignments.insert_many(&plan.assignments).await?;
        self.cursors
            .set(owner_agent_id, plan.final_cursor as u64)
            .await?;

        debug!(
            owner = owner_agent_id,
            final_cursor = plan.final_cursor,
            "rotation cursor persisted"
        );

        Ok(DistributionResult {
            total_assigned: plan.assignments.len(),
            assignments: plan.assignments,
            per_worker_counts: plan.per_worker_counts,
        })
    }
}
