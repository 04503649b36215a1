//! Append-only prediction log with duplicate suppression.
//!
//! Only this module talks to the database. Records are never updated or
//! deleted. The duplicate check and the insert run inside one immediate
//! transaction on a single mutex-guarded connection, so two identical
//! concurrent submissions cannot both be persisted.

use crate::error::PersistenceError;
use crate::types::application::{
    Category, Education, Gender, HomeOwnership, LoanApplication, LoanIntent, PriorDefaults,
};
use crate::types::decision::{DecisionLabel, PredictionRecord};
use chrono::{DateTime, Duration, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Default duplicate-suppression window in seconds.
pub const DEFAULT_DEDUP_WINDOW_SECS: u64 = 60;

/// Upper bound on the records a single history query returns.
pub const MAX_HISTORY_LIMIT: usize = 100;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS predictions (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at_ms  INTEGER NOT NULL,
    timestamp      TEXT    NOT NULL,
    age            INTEGER NOT NULL,
    income         INTEGER NOT NULL,
    emp_exp        INTEGER NOT NULL,
    loan_amnt      INTEGER NOT NULL,
    int_rate       REAL    NOT NULL,
    credit_score   INTEGER NOT NULL,
    defaults       TEXT    NOT NULL,
    gender         TEXT    NOT NULL,
    education      TEXT    NOT NULL,
    home_ownership TEXT    NOT NULL,
    loan_intent    TEXT    NOT NULL,
    prediction     TEXT    NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_predictions_key
    ON predictions (credit_score, income, loan_amnt, created_at_ms);
CREATE INDEX IF NOT EXISTS idx_predictions_created
    ON predictions (created_at_ms);
";

const RECORD_COLUMNS: &str = "id, created_at_ms, age, income, emp_exp, loan_amnt, int_rate, \
     credit_score, defaults, gender, education, home_ownership, loan_intent, prediction";

/// What happened to a decision handed to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// A new record was appended
    Inserted { id: i64 },
    /// An identical application was recorded inside the window; nothing written
    Duplicate { previous_id: i64, age: Duration },
}

/// Approval statistics over the most recent records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySummary {
    pub total_records: u64,
    pub considered: usize,
    pub approved: usize,
    pub rejected: usize,
    /// Percentage of approvals among the considered records
    pub approval_rate: f64,
}

/// SQLite-backed prediction log
pub struct PredictionStore {
    conn: Mutex<Connection>,
    dedup_window: Duration,
}

impl PredictionStore {
    /// Open (or create) the database file.
    pub fn open<P: AsRef<Path>>(path: P, dedup_window: Duration) -> Result<Self, PersistenceError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        // WAL only matters for real files
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        info!(path = %path.display(), window_secs = dedup_window.num_seconds(), "Prediction store opened");
        Self::with_connection(conn, dedup_window)
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory(dedup_window: Duration) -> Result<Self, PersistenceError> {
        Self::with_connection(Connection::open_in_memory()?, dedup_window)
    }

    fn with_connection(conn: Connection, dedup_window: Duration) -> Result<Self, PersistenceError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            dedup_window,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, PersistenceError> {
        self.conn.lock().map_err(|_| PersistenceError::LockPoisoned)
    }

    pub fn dedup_window(&self) -> Duration {
        self.dedup_window
    }

    /// Append a decision unless an identical application was recorded less
    /// than one window before `now`.
    pub fn record(
        &self,
        app: &LoanApplication,
        prediction: DecisionLabel,
        now: DateTime<Utc>,
    ) -> Result<PersistOutcome, PersistenceError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let latest: Option<(i64, i64)> = tx
            .query_row(
                "SELECT id, created_at_ms FROM predictions
                 WHERE age = ?1 AND income = ?2 AND emp_exp = ?3 AND loan_amnt = ?4
                   AND int_rate = ?5 AND credit_score = ?6 AND defaults = ?7
                   AND gender = ?8 AND education = ?9 AND home_ownership = ?10
                   AND loan_intent = ?11
                 ORDER BY created_at_ms DESC, id DESC
                 LIMIT 1",
                params![
                    app.age,
                    app.income,
                    app.employment_experience,
                    app.loan_amount,
                    app.interest_rate,
                    app.credit_score,
                    app.prior_defaults.as_str(),
                    app.gender.as_str(),
                    app.education.as_str(),
                    app.home_ownership.as_str(),
                    app.loan_intent.as_str(),
                ],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        if let Some((previous_id, created_at_ms)) = latest {
            let age = Duration::milliseconds(now.timestamp_millis() - created_at_ms);
            if age < self.dedup_window {
                debug!(previous_id = previous_id, age_ms = age.num_milliseconds(), "Duplicate application, not persisted");
                return Ok(PersistOutcome::Duplicate { previous_id, age });
            }
        }

        tx.execute(
            "INSERT INTO predictions (created_at_ms, timestamp, age, income, emp_exp, loan_amnt,
                 int_rate, credit_score, defaults, gender, education, home_ownership,
                 loan_intent, prediction)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                now.timestamp_millis(),
                now.format("%Y-%m-%d %H:%M:%S").to_string(),
                app.age,
                app.income,
                app.employment_experience,
                app.loan_amount,
                app.interest_rate,
                app.credit_score,
                app.prior_defaults.as_str(),
                app.gender.as_str(),
                app.education.as_str(),
                app.home_ownership.as_str(),
                app.loan_intent.as_str(),
                prediction.as_str(),
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(PersistOutcome::Inserted { id })
    }

    /// Most recent records, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<PredictionRecord>, PersistenceError> {
        let conn = self.lock()?;
        recent_records(&conn, limit)
    }

    /// Total number of persisted records.
    pub fn count(&self) -> Result<u64, PersistenceError> {
        let conn = self.lock()?;
        count_records(&conn)
    }

    /// Approval rate over the most recent `limit` records.
    pub fn summary(&self, limit: usize) -> Result<HistorySummary, PersistenceError> {
        self.history(limit).map(|(_, summary)| summary)
    }

    /// Recent records and their summary, read from one snapshot.
    pub fn history(
        &self,
        limit: usize,
    ) -> Result<(Vec<PredictionRecord>, HistorySummary), PersistenceError> {
        let conn = self.lock()?;
        let records = recent_records(&conn, limit)?;
        let total_records = count_records(&conn)?;
        drop(conn);

        let approved = records
            .iter()
            .filter(|r| r.prediction == DecisionLabel::Approved)
            .count();
        let considered = records.len();
        let approval_rate = if considered > 0 {
            approved as f64 / considered as f64 * 100.0
        } else {
            0.0
        };

        let summary = HistorySummary {
            total_records,
            considered,
            approved,
            rejected: considered - approved,
            approval_rate,
        };
        Ok((records, summary))
    }

    /// Drop the table so every later query fails.
    #[cfg(test)]
    pub(crate) fn drop_table(&self) {
        if let Ok(conn) = self.lock() {
            let _ = conn.execute_batch("DROP TABLE predictions;");
        }
    }
}

fn recent_records(conn: &Connection, limit: usize) -> Result<Vec<PredictionRecord>, PersistenceError> {
    // SQLite reads a negative LIMIT as unbounded
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let mut stmt = conn.prepare(&format!(
        "SELECT {RECORD_COLUMNS} FROM predictions
         ORDER BY created_at_ms DESC, id DESC
         LIMIT ?1"
    ))?;

    let records = stmt
        .query_map(params![limit], record_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

fn count_records(conn: &Connection) -> Result<u64, PersistenceError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM predictions", [], |row| row.get(0))?;
    Ok(count as u64)
}

fn conversion_error(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, message.into())
}

fn category_column<C: Category>(row: &Row<'_>, column: usize) -> rusqlite::Result<C> {
    let raw: String = row.get(column)?;
    C::parse(&raw).map_err(|e| conversion_error(column, e.to_string()))
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<PredictionRecord> {
    let created_at_ms: i64 = row.get(1)?;
    let timestamp = DateTime::<Utc>::from_timestamp_millis(created_at_ms)
        .ok_or_else(|| conversion_error(1, format!("invalid timestamp {created_at_ms}")))?;

    let label: String = row.get(13)?;
    let prediction = DecisionLabel::from_stored(&label)
        .ok_or_else(|| conversion_error(13, format!("invalid prediction label '{label}'")))?;

    Ok(PredictionRecord {
        id: row.get(0)?,
        timestamp,
        application: LoanApplication {
            age: row.get(2)?,
            income: row.get(3)?,
            employment_experience: row.get(4)?,
            loan_amount: row.get(5)?,
            interest_rate: row.get(6)?,
            credit_score: row.get(7)?,
            prior_defaults: category_column::<PriorDefaults>(row, 8)?,
            gender: category_column::<Gender>(row, 9)?,
            education: category_column::<Education>(row, 10)?,
            home_ownership: category_column::<HomeOwnership>(row, 11)?,
            loan_intent: category_column::<LoanIntent>(row, 12)?,
        },
        prediction,
    })
}
