//! Flat distributor: even modulo split across top-level agents.
//!
//! Pure function of its inputs. No capacity limits, no persisted state; the
//! caller persists the returned assignments. Item `i` goes to agent
//! `i % agents.len()`, so per-agent counts differ by at most one.

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{DistributionError, Result};
use crate::model::{Agent, Assignment, DistributionResult, WorkItem};

/// Distribute `items` evenly across `agents`, preserving input order.
///
/// Fails with [`DistributionError::NoAgentsAvailable`] when the agent list
/// is empty.
pub fn distribute_flat(
    items: &[WorkItem],
    agents: &[Agent],
    upload_id: &str,
) -> Result<DistributionResult> {
    if agents.is_empty() {
        return Err(DistributionError::NoAgentsAvailable);
    }

    let mut per_worker_counts: IndexMap<String, u32> =
        agents.iter().map(|a| (a.id.clone(), 0)).collect();
    let mut assignments = Vec::with_capacity(items.len());

    for (index, item) in items.iter().enumerate() {
        let agent = &agents[index % agents.len()];
        assignments.push(Assignment::pending(item, &agent.id, upload_id, None));
        *per_worker_counts.entry(agent.id.clone()).or_insert(0) += 1;
    }

    debug!(
        upload_id,
        items = items.len(),
        agents = agents.len(),
        "flat distribution complete"
    );

    Ok(DistributionResult {
        total_assigned: assignments.len(),
        assignments,
        per_worker_counts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(id: &str) -> Agent {
        Agent {
            id: id.to_string(),
            name: format!("Agent {}", id),
            email: format!("{}@example.com", id),
        }
    }

    fn items(n: usize) -> Vec<WorkItem> {
        (0..n)
            .map(|i| WorkItem::new(format!("t{}", i + 1), None).unwrap())
            .collect()
    }

    #[test]
    fn test_no_agents_is_fatal() {
        let result = distribute_flat(&items(3), &[], "u1");
        assert!(matches!(result, Err(DistributionError::NoAgentsAvailable)));
    }

    #[test]
    fn test_even_split() {
        let agents = vec![agent("a1"), agent("a2"), agent("a3")];
        let result = distribute_flat(&items(10), &agents, "u1").unwrap();

        assert_eq!(result.total_assigned, 10);
        let counts: Vec<u32> = result.per_worker_counts.values().copied().collect();
        assert_eq!(counts.iter().sum::<u32>(), 10);
        let max = counts.iter().max().unwrap();
        let min = counts.iter().min().unwrap();
        assert!(max - min <= 1);
    }

    #[test]
    fn test_modulo_order_preserved() {
        let agents = vec![agent("a1"), agent("a2")];
        let result = distribute_flat(&items(4), &agents, "u1").unwrap();

        let assigned: Vec<&str> = result
            .assignments
            .iter()
            .map(|a| a.assigned_to.as_str())
            .collect();
        assert_eq!(assigned, vec!["a1", "a2", "a1", "a2"]);
        assert_eq!(result.assignments[0].title, "t1");
        assert_eq!(result.assignments[3].title, "t4");
    }

    #[test]
    fn test_zero_count_agents_present() {
        let agents = vec![agent("a1"), agent("a2"), agent("a3")];
        let result = distribute_flat(&items(1), &agents, "u1").unwrap();

        assert_eq!(result.per_worker_counts.len(), 3);
        assert_eq!(result.per_worker_counts["a1"], 1);
        assert_eq!(result.per_worker_counts["a2"], 0);
        assert_eq!(result.per_worker_counts["a3"], 0);
    }

    #[test]
    fn test_empty_items_ok() {
        let agents = vec![agent("a1")];
        let result = distribute_flat(&[], &agents, "u1").unwrap();
        assert_eq!(result.total_assigned, 0);
        assert_eq!(result.per_worker_counts["a1"], 0);
    }
}
