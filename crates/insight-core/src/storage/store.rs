//! Execution history persistence using SQLite
//!
//! Three tables: analysis requests, per-agent executions, workflow
//! executions. Payloads are stored as JSON text blobs; nothing above
//! this module depends on the schema beyond store/fetch of the blobs.

use chrono::Utc;
use rusqlite::{Connection, params};

use crate::{Error, Result};

/// SQLite-backed execution store
pub struct ExecutionStore {
    conn: Connection,
}

/// Row of the analysis_requests table
#[derive(Debug, Clone)]
pub struct AnalysisRecord {
    pub id: String,
    pub project_id: String,
    pub status: String,
    pub request_data: String,
    pub result_data: Option<String>,
    pub error: Option<String>,
    pub created_at: String,
    pub completed_at: Option<String>,
    pub execution_time_ms: Option<i64>,
}

/// Row of the workflow_executions table
#[derive(Debug, Clone)]
pub struct WorkflowRecord {
    pub id: String,
    pub workflow: String,
    pub status: String,
    pub input_data: String,
    pub output_data: Option<String>,
    pub error: Option<String>,
    pub created_at: String,
    pub execution_time_ms: i64,
}

impl ExecutionStore {
    /// Create a store backed by the given database path
    pub fn new(db_path: &str) -> Result<Self> {
        if let Some(parent) = std::path::Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path)?;
        let store = Self { conn };
        store.init_tables()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_tables()?;
        Ok(store)
    }

    /// Initialize database tables
    fn init_tables(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS analysis_requests (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                status TEXT NOT NULL,
                request_data TEXT NOT NULL,
                result_data TEXT,
                error TEXT,
                created_at TEXT NOT NULL,
                completed_at TEXT,
                execution_time_ms INTEGER
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS agent_executions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                analysis_id TEXT NOT NULL,
                agent_kind TEXT NOT NULL,
                status TEXT NOT NULL,
                input_data TEXT NOT NULL,
                output_data TEXT,
                error TEXT,
                created_at TEXT NOT NULL,
                completed_at TEXT,
                execution_time_ms INTEGER
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS workflow_executions (
                id TEXT PRIMARY KEY,
                workflow TEXT NOT NULL,
                status TEXT NOT NULL,
                input_data TEXT NOT NULL,
                output_data TEXT,
                error TEXT,
                created_at TEXT NOT NULL,
                completed_at TEXT,
                execution_time_ms INTEGER
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_agent_executions_analysis_id
             ON agent_executions(analysis_id)",
            [],
        )?;

        Ok(())
    }

    /// Record a newly submitted analysis request
    pub fn analysis_started(&self, id: &str, project_id: &str, request_data: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO analysis_requests
             (id, project_id, status, request_data, created_at)
             VALUES (?1, ?2, 'processing', ?3, ?4)",
            params![id, project_id, request_data, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Finalize an analysis request as completed
    pub fn analysis_completed(
        &self,
        id: &str,
        result_data: &str,
        execution_time_ms: i64,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE analysis_requests
             SET status = 'completed', result_data = ?2, completed_at = ?3,
                 execution_time_ms = ?4
             WHERE id = ?1",
            params![id, result_data, Utc::now().to_rfc3339(), execution_time_ms],
        )?;
        Ok(())
    }

    /// Finalize an analysis request as failed
    pub fn analysis_failed(&self, id: &str, error: &str, execution_time_ms: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE analysis_requests
             SET status = 'failed', error = ?2, completed_at = ?3,
                 execution_time_ms = ?4
             WHERE id = ?1",
            params![id, error, Utc::now().to_rfc3339(), execution_time_ms],
        )?;
        Ok(())
    }

    /// Record one settled agent execution within a run
    #[allow(clippy::too_many_arguments)]
    pub fn agent_execution(
        &self,
        analysis_id: &str,
        agent_kind: &str,
        status: &str,
        input_data: &str,
        output_data: Option<&str>,
        error: Option<&str>,
        execution_time_ms: i64,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO agent_executions
             (analysis_id, agent_kind, status, input_data, output_data, error,
              created_at, completed_at, execution_time_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                analysis_id,
                agent_kind,
                status,
                input_data,
                output_data,
                error,
                now,
                now,
                execution_time_ms,
            ],
        )?;
        Ok(())
    }

    /// Record one settled workflow execution
    #[allow(clippy::too_many_arguments)]
    pub fn workflow_execution(
        &self,
        id: &str,
        workflow: &str,
        status: &str,
        input_data: &str,
        output_data: Option<&str>,
        error: Option<&str>,
        execution_time_ms: i64,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT OR REPLACE INTO workflow_executions
             (id, workflow, status, input_data, output_data, error,
              created_at, completed_at, execution_time_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                id,
                workflow,
                status,
                input_data,
                output_data,
                error,
                now,
                now,
                execution_time_ms,
            ],
        )?;
        Ok(())
    }

    /// Load an analysis request by id
    pub fn get_analysis(&self, id: &str) -> Result<Option<AnalysisRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, project_id, status, request_data, result_data, error,
                    created_at, completed_at, execution_time_ms
             FROM analysis_requests WHERE id = ?1",
        )?;

        let result = stmt.query_row(params![id], |row| {
            Ok(AnalysisRecord {
                id: row.get(0)?,
                project_id: row.get(1)?,
                status: row.get(2)?,
                request_data: row.get(3)?,
                result_data: row.get(4)?,
                error: row.get(5)?,
                created_at: row.get(6)?,
                completed_at: row.get(7)?,
                execution_time_ms: row.get(8)?,
            })
        });

        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Error::from(e)),
        }
    }

    /// Most recent analysis requests, newest first
    pub fn recent_analyses(&self, limit: usize) -> Result<Vec<AnalysisRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, project_id, status, request_data, result_data, error,
                    created_at, completed_at, execution_time_ms
             FROM analysis_requests ORDER BY created_at DESC LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(AnalysisRecord {
                id: row.get(0)?,
                project_id: row.get(1)?,
                status: row.get(2)?,
                request_data: row.get(3)?,
                result_data: row.get(4)?,
                error: row.get(5)?,
                created_at: row.get(6)?,
                completed_at: row.get(7)?,
                execution_time_ms: row.get(8)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Count agent execution rows for one analysis
    pub fn agent_execution_count(&self, analysis_id: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM agent_executions WHERE analysis_id = ?1",
            params![analysis_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Count executions recorded for one workflow name
    pub fn workflow_execution_count(&self, workflow: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM workflow_executions WHERE workflow = ?1",
            params![workflow],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Load a workflow execution by id
    pub fn get_workflow_execution(&self, id: &str) -> Result<Option<WorkflowRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, workflow, status, input_data, output_data, error,
                    created_at, execution_time_ms
             FROM workflow_executions WHERE id = ?1",
        )?;

        let result = stmt.query_row(params![id], |row| {
            Ok(WorkflowRecord {
                id: row.get(0)?,
                workflow: row.get(1)?,
                status: row.get(2)?,
                input_data: row.get(3)?,
                output_data: row.get(4)?,
                error: row.get(5)?,
                created_at: row.get(6)?,
                execution_time_ms: row.get(7)?,
            })
        });

        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Error::from(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_lifecycle() {
        let store = ExecutionStore::in_memory().unwrap();

        store
            .analysis_started("a1", "p1", r#"{"analysis_types":["sentiment"]}"#)
            .unwrap();
        store
            .analysis_completed("a1", r#"{"sentiment":{"score":0.8}}"#, 120)
            .unwrap();

        let record = store.get_analysis("a1").unwrap().unwrap();
        assert_eq!(record.project_id, "p1");
        assert_eq!(record.status, "completed");
        assert!(record.result_data.unwrap().contains("0.8"));
        assert_eq!(record.execution_time_ms, Some(120));
    }

    #[test]
    fn test_analysis_failure_records_error() {
        let store = ExecutionStore::in_memory().unwrap();

        store.analysis_started("a1", "p1", "{}").unwrap();
        store.analysis_failed("a1", "no agents available", 5).unwrap();

        let record = store.get_analysis("a1").unwrap().unwrap();
        assert_eq!(record.status, "failed");
        assert_eq!(record.error.as_deref(), Some("no agents available"));
    }

    #[test]
    fn test_agent_execution_rows() {
        let store = ExecutionStore::in_memory().unwrap();

        store.analysis_started("a1", "p1", "{}").unwrap();
        store
            .agent_execution("a1", "sentiment", "completed", "{}", Some("{}"), None, 30)
            .unwrap();
        store
            .agent_execution("a1", "market", "failed", "{}", None, Some("timeout"), 60)
            .unwrap();

        assert_eq!(store.agent_execution_count("a1").unwrap(), 2);
        assert_eq!(store.agent_execution_count("other").unwrap(), 0);
    }

    #[test]
    fn test_workflow_execution_round_trip() {
        let store = ExecutionStore::in_memory().unwrap();

        store
            .workflow_execution(
                "w1",
                "customer_support",
                "completed",
                r#"{"message":"refund"}"#,
                Some(r#"{"category":"billing"}"#),
                None,
                12,
            )
            .unwrap();

        let record = store.get_workflow_execution("w1").unwrap().unwrap();
        assert_eq!(record.workflow, "customer_support");
        assert_eq!(record.status, "completed");
        assert!(record.output_data.unwrap().contains("billing"));
    }

    #[test]
    fn test_recent_analyses_limit() {
        let store = ExecutionStore::in_memory().unwrap();

        store.analysis_started("a1", "p1", "{}").unwrap();
        store.analysis_started("a2", "p1", "{}").unwrap();
        store.analysis_started("a3", "p2", "{}").unwrap();

        let recent = store.recent_analyses(2).unwrap();
        assert_eq!(recent.len(), 2);
    }

    #[test]
    fn test_missing_rows_are_none() {
        let store = ExecutionStore::in_memory().unwrap();
        assert!(store.get_analysis("missing").unwrap().is_none());
        assert!(store.get_workflow_execution("missing").unwrap().is_none());
    }
}
