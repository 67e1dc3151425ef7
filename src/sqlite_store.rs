//! Local SQLite persistence for the distribution engine.
//!
//! Backs all three storage contracts with a single database file:
//! - sub-agent directory (with CRUD used by the admin surface)
//! - rotation cursors, one row per owner
//! - assignments and upload provenance records
//!
//! The connection sits behind a mutex; cursor fetch-and-increment runs as a
//! guarded read-modify-write, which serializes concurrent callers on the
//! same owner.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use tracing::info;

use crate::model::{Assignment, SubAgent, UploadRecord};
use crate::store::{AssignmentStore, CursorStore, SubAgentDirectory};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS subagents (
    id TEXT PRIMARY KEY,
    owner_agent_id TEXT NOT NULL,
    name TEXT NOT NULL,
    email TEXT NOT NULL,
    mobile TEXT,
    active INTEGER NOT NULL DEFAULT 1,
    capacity INTEGER,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_subagents_owner ON subagents(owner_agent_id, active);

CREATE TABLE IF NOT EXISTS rotation_cursors (
    owner_agent_id TEXT PRIMARY KEY,
    last_index INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    description TEXT,
    status TEXT NOT NULL,
    priority TEXT NOT NULL,
    upload_id TEXT NOT NULL,
    assigned_to TEXT NOT NULL,
    owner_agent_id TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tasks_upload ON tasks(upload_id);
CREATE INDEX IF NOT EXISTS idx_tasks_assigned ON tasks(assigned_to);

CREATE TABLE IF NOT EXISTS uploads (
    id TEXT PRIMARY KEY,
    filename TEXT NOT NULL,
    original_name TEXT NOT NULL,
    total_tasks INTEGER NOT NULL,
    uploaded_by TEXT NOT NULL,
    created_at TEXT NOT NULL
);
"#;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at the specified path.
    pub fn open(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path)?;
        conn.execute_batch(SCHEMA)?;
        info!("Distribution storage initialized at {:?}", path);
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create in-memory storage (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // ========================================================================
    // SUB-AGENT DIRECTORY
    // ========================================================================

    /// Insert a sub-agent. Emails are stored lowercased.
    pub fn create_sub_agent(&self, sub: &SubAgent) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO subagents (id, owner_agent_id, name, email, mobile, active, capacity, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            params![
                sub.id,
                sub.owner_agent_id,
                sub.name,
                sub.email.to_lowercase(),
                sub.mobile,
                sub.active as i64,
                sub.capacity,
                now,
            ],
        )?;
        Ok(())
    }

    /// Flip the active flag; inactive sub-agents drop out of the pool.
    pub fn set_sub_agent_active(&self, id: &str, active: bool) -> Result<bool> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE subagents SET active = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, active as i64, now],
        )?;
        Ok(changed == 1)
    }

    /// Update the per-cycle capacity ceiling (`None` clears it to unlimited).
    pub fn set_sub_agent_capacity(&self, id: &str, capacity: Option<u32>) -> Result<bool> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE subagents SET capacity = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, capacity, now],
        )?;
        Ok(changed == 1)
    }

    pub fn delete_sub_agent(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let deleted = conn.execute("DELETE FROM subagents WHERE id = ?1", params![id])?;
        Ok(deleted == 1)
    }

    pub fn get_sub_agent(&self, id: &str) -> Result<Option<SubAgent>> {
        let conn = self.conn.lock();
        let sub = conn
            .query_row(
                "SELECT id, owner_agent_id, name, email, mobile, active, capacity
                 FROM subagents WHERE id = ?1",
                params![id],
                Self::row_to_sub_agent,
            )
            .optional()?;
        Ok(sub)
    }

    /// All sub-agents for an owner in creation order, active or not.
    pub fn list_sub_agents(&self, owner_agent_id: &str) -> Result<Vec<SubAgent>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, owner_agent_id, name, email, mobile, active, capacity
             FROM subagents WHERE owner_agent_id = ?1 ORDER BY rowid",
        )?;
        let subs = stmt
            .query_map(params![owner_agent_id], Self::row_to_sub_agent)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(subs)
    }

    fn row_to_sub_agent(row: &rusqlite::Row<'_>) -> rusqlite::Result<SubAgent> {
        Ok(SubAgent {
            id: row.get(0)?,
            owner_agent_id: row.get(1)?,
            name: row.get(2)?,
            email: row.get(3)?,
            mobile: row.get(4)?,
            active: row.get::<_, i64>(5)? != 0,
            capacity: row.get(6)?,
        })
    }

    // ========================================================================
    // QUERY HELPERS
    // ========================================================================

    pub fn cursor(&self, owner_agent_id: &str) -> Result<Option<u64>> {
        let conn = self.conn.lock();
        let value: Option<i64> = conn
            .query_row(
                "SELECT last_index FROM rotation_cursors WHERE owner_agent_id = ?1",
                params![owner_agent_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.map(|v| v as u64))
    }

    pub fn assignments_for_upload(&self, upload_id: &str) -> Result<Vec<Assignment>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT title, description, status, priority, upload_id, assigned_to, owner_agent_id,
                    created_at, updated_at
             FROM tasks WHERE upload_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![upload_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, Option<String>>(6)?,
                    row.get::<_, String>(7)?,
                    row.get::<_, String>(8)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|row| {
                Ok(Assignment {
                    title: row.0,
                    description: row.1,
                    status: serde_json::from_value(serde_json::Value::String(row.2))?,
                    priority: serde_json::from_value(serde_json::Value::String(row.3))?,
                    upload_id: row.4,
                    assigned_to: row.5,
                    owner_agent_id: row.6,
                    created_at: parse_timestamp(&row.7)?,
                    updated_at: parse_timestamp(&row.8)?,
                })
            })
            .collect()
    }

    pub fn get_upload(&self, id: &str) -> Result<Option<UploadRecord>> {
        let conn = self.conn.lock();
        let record = conn
            .query_row(
                "SELECT id, filename, original_name, total_tasks, uploaded_by, created_at
                 FROM uploads WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;

        record
            .map(|r| {
                Ok(UploadRecord {
                    id: r.0,
                    filename: r.1,
                    original_name: r.2,
                    total_tasks: r.3 as usize,
                    uploaded_by: r.4,
                    created_at: parse_timestamp(&r.5)?,
                })
            })
            .transpose()
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

fn status_label(assignment: &Assignment) -> Result<(String, String)> {
    // Serde is the single source of truth for the wire labels
    let status = serde_json::to_value(assignment.status)?
        .as_str()
        .map(str::to_string)
        .unwrap_or_default();
    let priority = serde_json::to_value(assignment.priority)?
        .as_str()
        .map(str::to_string)
        .unwrap_or_default();
    Ok((status, priority))
}

#[async_trait]
impl CursorStore for SqliteStore {
    async fn fetch_and_increment(&self, owner_agent_id: &str) -> Result<u64> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO rotation_cursors (owner_agent_id, last_index) VALUES (?1, 0)
             ON CONFLICT(owner_agent_id) DO NOTHING",
            params![owner_agent_id],
        )?;
        let previous: i64 = conn.query_row(
            "SELECT last_index FROM rotation_cursors WHERE owner_agent_id = ?1",
            params![owner_agent_id],
            |row| row.get(0),
        )?;
        conn.execute(
            "UPDATE rotation_cursors SET last_index = last_index + 1 WHERE owner_agent_id = ?1",
            params![owner_agent_id],
        )?;
        Ok(previous as u64)
    }

    async fn set(&self, owner_agent_id: &str, index: u64) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO rotation_cursors (owner_agent_id, last_index) VALUES (?1, ?2)
             ON CONFLICT(owner_agent_id) DO UPDATE SET last_index = ?2",
            params![owner_agent_id, index as i64],
        )?;
        Ok(())
    }
}

#[async_trait]
impl SubAgentDirectory for SqliteStore {
    async fn active_sub_agents(&self, owner_agent_id: &str) -> Result<Vec<SubAgent>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, owner_agent_id, name, email, mobile, active, capacity
             FROM subagents WHERE owner_agent_id = ?1 AND active = 1 ORDER BY rowid",
        )?;
        let subs = stmt
            .query_map(params![owner_agent_id], Self::row_to_sub_agent)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(subs)
    }
}

#[async_trait]
impl AssignmentStore for SqliteStore {
    async fn insert_many(&self, assignments: &[Assignment]) -> Result<()> {
        if assignments.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO tasks (title, description, status, priority, upload_id,
                                    assigned_to, owner_agent_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for assignment in assignments {
                let (status, priority) = status_label(assignment)?;
                stmt.execute(params![
                    assignment.title,
                    assignment.description,
                    status,
                    priority,
                    assignment.upload_id,
                    assignment.assigned_to,
                    assignment.owner_agent_id,
                    assignment.created_at.to_rfc3339(),
                    assignment.updated_at.to_rfc3339(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    async fn record_upload(&self, upload: &UploadRecord) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO uploads (id, filename, original_name, total_tasks, uploaded_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                upload.id,
                upload.filename,
                upload.original_name,
                upload.total_tasks as i64,
                upload.uploaded_by,
                upload.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}
