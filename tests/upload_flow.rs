//! End-to-end upload pipeline over the SQLite backend.

use std::sync::Arc;

use agentx_distribution::{
    DistributionConfig, DistributionService, SqliteStore, SubAgent, UploadMeta, WorkItem,
};

fn sub(id: &str, owner: &str, capacity: Option<u32>) -> SubAgent {
    SubAgent {
        id: id.to_string(),
        owner_agent_id: owner.to_string(),
        name: format!("Sub {}", id),
        email: format!("{}@example.com", id),
        mobile: None,
        active: true,
        capacity,
    }
}

fn items(titles: &[&str]) -> Vec<WorkItem> {
    titles
        .iter()
        .map(|t| WorkItem::new(*t, None).unwrap())
        .collect()
}

fn meta(name: &str) -> UploadMeta {
    UploadMeta {
        filename: format!("stored-{}", name),
        original_name: name.to_string(),
        uploaded_by: "admin1".to_string(),
    }
}

fn service(store: &Arc<SqliteStore>) -> DistributionService {
    DistributionService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        DistributionConfig::default(),
    )
}

#[tokio::test]
async fn rotation_upload_persists_assignments_cursor_and_provenance() {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    store.create_sub_agent(&sub("s1", "a1", Some(2))).unwrap();
    store.create_sub_agent(&sub("s2", "a1", None)).unwrap();

    let svc = service(&store);
    let summary = svc
        .ingest_rotation(&items(&["t1", "t2", "t3"]), "a1", &meta("tasks.csv"))
        .await
        .unwrap();

    assert_eq!(summary.total_parsed, 3);
    assert_eq!(summary.total_assigned, 3);
    assert!(summary.per_worker_counts["s1"] <= 2);

    let upload = store.get_upload(&summary.upload_id).unwrap().unwrap();
    assert_eq!(upload.original_name, "tasks.csv");
    assert_eq!(upload.total_tasks, 3);

    let persisted = store.assignments_for_upload(&summary.upload_id).unwrap();
    assert_eq!(persisted.len(), 3);
    assert_eq!(persisted[0].title, "t1");
    assert_eq!(persisted[0].owner_agent_id.as_deref(), Some("a1"));

    // Cursor reflects the last sub-agent touched
    assert!(store.cursor("a1").unwrap().is_some());
}

#[tokio::test]
async fn successive_uploads_continue_the_rotation() {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    for id in ["s1", "s2", "s3"] {
        store.create_sub_agent(&sub(id, "a1", None)).unwrap();
    }

    let svc = service(&store);
    let first = svc
        .ingest_rotation(&items(&["t1"]), "a1", &meta("one.csv"))
        .await
        .unwrap();
    let second = svc
        .ingest_rotation(&items(&["t2"]), "a1", &meta("two.csv"))
        .await
        .unwrap();

    let target = |s: &agentx_distribution::UploadSummary| {
        s.per_worker_counts
            .iter()
            .find(|(_, &c)| c > 0)
            .map(|(id, _)| id.clone())
            .unwrap()
    };
    assert_ne!(target(&first), target(&second));
}

#[tokio::test]
async fn capacity_exhaustion_is_a_successful_partial_upload() {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    store.create_sub_agent(&sub("s1", "a1", Some(1))).unwrap();
    store.create_sub_agent(&sub("s2", "a1", Some(1))).unwrap();

    let svc = service(&store);
    let summary = svc
        .ingest_rotation(&items(&["t1", "t2", "t3"]), "a1", &meta("big.csv"))
        .await
        .unwrap();

    assert_eq!(summary.total_parsed, 3);
    assert_eq!(summary.total_assigned, 2);
    assert_eq!(
        store
            .assignments_for_upload(&summary.upload_id)
            .unwrap()
            .len(),
        2
    );
}

#[tokio::test]
async fn no_active_sub_agents_rejects_the_upload_without_touching_the_cursor() {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    store.create_sub_agent(&sub("s1", "a1", None)).unwrap();
    store.set_sub_agent_active("s1", false).unwrap();

    let svc = service(&store);
    let result = svc
        .ingest_rotation(&items(&["t1"]), "a1", &meta("tasks.csv"))
        .await;

    assert!(result.is_err());
    assert_eq!(store.cursor("a1").unwrap(), None);
}

#[tokio::test]
async fn deactivating_a_sub_agent_shrinks_the_pool_without_breaking_the_cursor() {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    for id in ["s1", "s2", "s3", "s4", "s5"] {
        store.create_sub_agent(&sub(id, "a1", None)).unwrap();
    }

    let svc = service(&store);
    // Push the cursor well past the size of the shrunken pool
    for i in 0..7 {
        svc.ingest_rotation(&items(&["t"]), "a1", &meta(&format!("f{}.csv", i)))
            .await
            .unwrap();
    }

    for id in ["s3", "s4", "s5"] {
        store.set_sub_agent_active(id, false).unwrap();
    }

    // Pool is now 2; the stale cursor is clamped, not an out-of-range index
    let summary = svc
        .ingest_rotation(&items(&["t1", "t2"]), "a1", &meta("after.csv"))
        .await
        .unwrap();
    assert_eq!(summary.total_assigned, 2);
    assert_eq!(summary.per_worker_counts.len(), 2);
    assert_eq!(summary.per_worker_counts["s1"], 1);
    assert_eq!(summary.per_worker_counts["s2"], 1);
}
