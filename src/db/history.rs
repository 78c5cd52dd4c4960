use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;
use uuid::Uuid;

use super::sqlite::{open_database, open_memory_database};
use super::DatabaseError;

/// One analyzed candidate as remembered across runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub run_id: Uuid,
    pub candidate_name: String,
    /// `MetricsRecord::summary()` at the time of the run.
    pub summary: String,
    pub recorded_at: DateTime<Utc>,
    pub analysis: String,
}

impl HistoryEntry {
    pub fn new(run_id: Uuid, candidate_name: &str, summary: String, analysis: &str) -> Self {
        Self {
            run_id,
            candidate_name: candidate_name.to_string(),
            summary,
            recorded_at: Utc::now(),
            analysis: analysis.to_string(),
        }
    }
}

/// History-persistence capability: appends one record per analyzed candidate.
pub trait HistorySink: Send + Sync {
    fn append(&self, entry: &HistoryEntry) -> Result<(), DatabaseError>;
}

/// SQLite-backed history store.
pub struct SqliteHistory {
    conn: Mutex<Connection>,
}

impl SqliteHistory {
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Ok(Self {
            conn: Mutex::new(open_database(path)?),
        })
    }

    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Ok(Self {
            conn: Mutex::new(open_memory_database()?),
        })
    }

    /// Most recent entries first.
    pub fn recent(&self, limit: usize) -> Result<Vec<HistoryEntry>, DatabaseError> {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        let mut stmt = conn.prepare(
            "SELECT run_id, candidate_name, summary, recorded_at, analysis
             FROM analyses
             ORDER BY recorded_at DESC, id DESC
             LIMIT ?1",
        )?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![limit], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (run_id, candidate_name, summary, recorded_at, analysis) = row?;
            entries.push(HistoryEntry {
                run_id: Uuid::parse_str(&run_id).map_err(|_| DatabaseError::InvalidValue {
                    field: "run_id".into(),
                    value: run_id.clone(),
                })?,
                candidate_name,
                summary,
                recorded_at: DateTime::parse_from_rfc3339(&recorded_at)
                    .map_err(|_| DatabaseError::InvalidValue {
                        field: "recorded_at".into(),
                        value: recorded_at.clone(),
                    })?
                    .with_timezone(&Utc),
                analysis,
            });
        }
        Ok(entries)
    }
}

impl HistorySink for SqliteHistory {
    fn append(&self, entry: &HistoryEntry) -> Result<(), DatabaseError> {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        conn.execute(
            "INSERT INTO analyses (run_id, candidate_name, summary, recorded_at, analysis)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.run_id.to_string(),
                entry.candidate_name,
                entry.summary,
                entry.recorded_at.to_rfc3339_opts(SecondsFormat::Micros, true),
                entry.analysis,
            ],
        )?;
        tracing::debug!(candidate = %entry.candidate_name, "History entry recorded");
        Ok(())
    }
}
