//! Embedded relational store (§6): three tables — `sessions`, `steps`,
//! `artifacts` — backing session lifecycle, per-step logs, and
//! screenshot/trace artifacts. Short-term history is served straight from
//! `steps` via the query named in §6.
#![allow(dead_code)]

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection};

use crate::errors::SoulResult;

pub struct Db {
    conn: Mutex<Connection>,
}

impl Db {
    pub fn open(path: &Path) -> SoulResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                task TEXT NOT NULL,
                start_url TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS steps (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                step_number INTEGER NOT NULL,
                phase TEXT NOT NULL,
                action_type TEXT,
                action_data_json TEXT,
                observation TEXT,
                error TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_steps_session_id ON steps(session_id);
            CREATE TABLE IF NOT EXISTS artifacts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                step_number INTEGER NOT NULL,
                file_path TEXT NOT NULL,
                file_type TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_artifacts_session_id ON artifacts(session_id);",
        )?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> SoulResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            "CREATE TABLE sessions (id TEXT PRIMARY KEY, task TEXT NOT NULL, start_url TEXT NOT NULL,
                status TEXT NOT NULL, created_at TEXT NOT NULL, updated_at TEXT NOT NULL);
             CREATE TABLE steps (id INTEGER PRIMARY KEY AUTOINCREMENT, session_id TEXT NOT NULL,
                step_number INTEGER NOT NULL, phase TEXT NOT NULL, action_type TEXT,
                action_data_json TEXT, observation TEXT, error TEXT, created_at TEXT NOT NULL);
             CREATE INDEX idx_steps_session_id ON steps(session_id);
             CREATE TABLE artifacts (id INTEGER PRIMARY KEY AUTOINCREMENT, session_id TEXT NOT NULL,
                step_number INTEGER NOT NULL, file_path TEXT NOT NULL, file_type TEXT NOT NULL,
                created_at TEXT NOT NULL);
             CREATE INDEX idx_artifacts_session_id ON artifacts(session_id);",
        )?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn create_session(&self, id: &str, task: &str, start_url: &str) -> SoulResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.lock().unwrap().execute(
            "INSERT INTO sessions (id, task, start_url, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, 'started', ?4, ?4)",
            params![id, task, start_url, now],
        )?;
        Ok(())
    }

    pub fn set_session_status(&self, id: &str, status: &str) -> SoulResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.lock().unwrap().execute(
            "UPDATE sessions SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status, now, id],
        )?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn record_step(
        &self,
        session_id: &str,
        step_number: u64,
        phase: &str,
        action_type: Option<&str>,
        action_data_json: Option<&str>,
        observation: Option<&str>,
        error: Option<&str>,
    ) -> SoulResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.lock().unwrap().execute(
            "INSERT INTO steps (session_id, step_number, phase, action_type, action_data_json, observation, error, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![session_id, step_number as i64, phase, action_type, action_data_json, observation, error, now],
        )?;
        Ok(())
    }

    pub fn record_artifact(
        &self,
        session_id: &str,
        step_number: u64,
        file_path: &str,
        file_type: &str,
    ) -> SoulResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.lock().unwrap().execute(
            "INSERT INTO artifacts (session_id, step_number, file_path, file_type, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![session_id, step_number as i64, file_path, file_type, now],
        )?;
        Ok(())
    }

    /// `SELECT ... FROM steps WHERE sessionId=? ORDER BY stepNumber DESC LIMIT 5`.
    pub fn recent_steps(&self, session_id: &str, limit: u32) -> SoulResult<Vec<StepRow>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT step_number, phase, action_type, action_data_json, observation, error
             FROM steps WHERE session_id = ?1 ORDER BY step_number DESC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![session_id, limit], |row| {
                Ok(StepRow {
                    step_number: row.get::<_, i64>(0)? as u64,
                    phase: row.get(1)?,
                    action_type: row.get(2)?,
                    action_data_json: row.get(3)?,
                    observation: row.get(4)?,
                    error: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[derive(Clone, Debug)]
pub struct StepRow {
    pub step_number: u64,
    pub phase: String,
    pub action_type: Option<String>,
    pub action_data_json: Option<String>,
    pub observation: Option<String>,
    pub error: Option<String>,
}

/// Stable artifact path, `/artifacts/<sessionId>/step-<0000>.png`
/// (zero-padded to 4 digits), per §6.
pub fn screenshot_artifact_path(session_id: &str, step_number: u64) -> String {
    format!("{session_id}/step-{step_number:04}.png")
}

pub fn trace_artifact_path(session_id: &str, step_number: u64) -> String {
    format!("{session_id}/step-{step_number:04}-trace.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recent_steps_respects_limit_and_order() {
        let db = Db::open_in_memory().expect("in-memory db opens");
        db.create_session("s1", "task", "about:blank").unwrap();
        for i in 1..=8u64 {
            db.record_step("s1", i, "OBSERVE", None, None, None, None).unwrap();
        }
        let recent = db.recent_steps("s1", 5).unwrap();
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0].step_number, 8);
        assert_eq!(recent[4].step_number, 4);
    }

    #[test]
    fn artifact_paths_are_zero_padded() {
        assert_eq!(
            screenshot_artifact_path("abc", 7),
            "abc/step-0007.png"
        );
    }
}
