//! SQLite-backed consumption store
//!
//! One wide table keyed logically by (etso, year, month, day, hour). The
//! dedup guarantee lives in the schema: a unique index over the key plus a
//! conflict-target upsert, so there is no window between a read and a
//! write for two writers to both insert.

pub mod reconcile;

pub use reconcile::{BatchOutcome, ReadingReconciler};

use crate::error::{OsosyncError, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{Connection, params};
use std::path::Path;

const MIGRATION_0001: &str = include_str!("../../migrations/0001_init.sql");

const MIGRATIONS: &[(&str, &str)] = &[("0001_init", MIGRATION_0001)];

const READING_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One persisted hourly consumption row
#[derive(Debug, Clone)]
pub struct ConsumptionRow {
    pub period: String,
    pub natural_code: String,
    pub installation_number: String,
    pub meter_id: Option<i64>,
    pub distribution_company: String,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub reading_time: NaiveDateTime,
    pub value: f64,
    pub created_at: DateTime<Utc>,
}

/// Handle over the consumption database
pub struct ConsumptionStore {
    conn: Connection,
}

impl ConsumptionStore {
    /// Open (or create) the database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::apply_pragmas(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database, mainly for tests
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::apply_pragmas(&conn)?;
        Ok(Self { conn })
    }

    fn apply_pragmas(conn: &Connection) -> Result<()> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "temp_store", "MEMORY")?;
        Ok(())
    }

    /// Apply the schema; every statement is idempotent
    pub fn migrate(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        for (_name, sql) in MIGRATIONS {
            tx.execute_batch(sql)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Insert or update one row under the dedup key.
    ///
    /// On conflict the newer observation wins: value, reading time,
    /// installation number and write stamp are replaced in place.
    pub fn upsert_row(&self, row: &ConsumptionRow) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO meter_consumption (
              period, etso, tesisat_no, meter_id, distribution_company,
              year, month, day, hour, reading_time, value, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT(etso, year, month, day, hour) DO UPDATE SET
              value = excluded.value,
              reading_time = excluded.reading_time,
              tesisat_no = excluded.tesisat_no,
              created_at = excluded.created_at
            "#,
            params![
                row.period,
                row.natural_code,
                row.installation_number,
                row.meter_id,
                row.distribution_company,
                row.year,
                row.month,
                row.day,
                row.hour,
                row.reading_time.format(READING_TIME_FORMAT).to_string(),
                row.value,
                row.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Total number of stored rows
    pub fn count_rows(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM meter_consumption", [], |row| {
                row.get(0)
            })?;
        Ok(count)
    }

    /// Rows for one natural code within `[from, to)`, ordered by time.
    ///
    /// This is the query the reporting/export adapter consumes; the window
    /// cap keeps a single export from dragging years of rows into memory.
    pub fn readings_in_range(
        &self,
        natural_code: &str,
        from: NaiveDateTime,
        to: NaiveDateTime,
        max_range_days: i64,
    ) -> Result<Vec<ConsumptionRow>> {
        if to < from {
            return Err(OsosyncError::validation(
                "range",
                "range end precedes range start",
            ));
        }
        if (to - from).num_days() > max_range_days {
            return Err(OsosyncError::validation(
                "range",
                &format!("date range exceeds the configured maximum of {} days", max_range_days),
            ));
        }

        let mut stmt = self.conn.prepare(
            r#"
            SELECT period, etso, tesisat_no, meter_id, distribution_company,
                   year, month, day, hour, reading_time, value, created_at
            FROM meter_consumption
            WHERE etso = ?1 AND reading_time >= ?2 AND reading_time < ?3
            ORDER BY reading_time ASC
            "#,
        )?;
        let rows = stmt.query_map(
            params![
                natural_code,
                from.format(READING_TIME_FORMAT).to_string(),
                to.format(READING_TIME_FORMAT).to_string(),
            ],
            row_to_consumption,
        )?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Stored value for one dedup key, when present
    pub fn value_for_key(
        &self,
        natural_code: &str,
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
    ) -> Result<Option<f64>> {
        use rusqlite::OptionalExtension;

        let value = self
            .conn
            .query_row(
                r#"
                SELECT value FROM meter_consumption
                WHERE etso = ?1 AND year = ?2 AND month = ?3 AND day = ?4 AND hour = ?5
                "#,
                params![natural_code, year, month, day, hour],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }
}

fn row_to_consumption(
    row: &rusqlite::Row<'_>,
) -> std::result::Result<ConsumptionRow, rusqlite::Error> {
    let reading_time: String = row.get(9)?;
    let created_at: String = row.get(11)?;
    Ok(ConsumptionRow {
        period: row.get(0)?,
        natural_code: row.get(1)?,
        installation_number: row.get(2)?,
        meter_id: row.get(3)?,
        distribution_company: row.get(4)?,
        year: row.get(5)?,
        month: row.get(6)?,
        day: row.get(7)?,
        hour: row.get(8)?,
        reading_time: NaiveDateTime::parse_from_str(&reading_time, READING_TIME_FORMAT)
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    9,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?,
        value: row.get(10)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    11,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?
            .with_timezone(&Utc),
    })
}
