use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use tracing::info;
use uuid::Uuid;

use super::types::FoodLogRecord;
use crate::analyzer::FoodAnalysis;

const COLUMNS: &str = "id, logged_at, meal_type, total_calories, description, \
                       ingredients_json, thumbnail_jpeg, created_at, updated_at";

/// SQLite store for saved food logs.
/// All operations are synchronous (rusqlite is blocking).
/// Callers in async contexts should use `tokio::task::spawn_blocking`.
pub struct FoodLogStore {
    conn: Connection,
}

impl FoodLogStore {
    /// Create or open the food log database at `db_path`.
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create data dir")?;
        }

        let conn = Connection::open(db_path).context("Failed to open food log db")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS food_logs (
                id TEXT PRIMARY KEY,
                logged_at TEXT NOT NULL,
                meal_type TEXT NOT NULL,
                total_calories REAL NOT NULL,
                description TEXT NOT NULL,
                ingredients_json TEXT NOT NULL,
                thumbnail_jpeg BLOB,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )
        .context("Failed to create food_logs table")?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_food_logs_logged_at
             ON food_logs(logged_at DESC)",
            [],
        )
        .context("Failed to create date index")?;

        info!("Opened food log database at {:?}", db_path);
        Ok(Self { conn })
    }

    /// Default on-disk location under the platform data directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("mealscan").join("food_logs.db"))
    }

    /// Persist an analysis as a new food log entry.
    pub fn save_log(
        &self,
        analysis: &FoodAnalysis,
        thumbnail_jpeg: Option<&[u8]>,
        logged_at: DateTime<Utc>,
    ) -> Result<FoodLogRecord> {
        let now = Utc::now();
        let record = FoodLogRecord {
            id: Uuid::new_v4(),
            logged_at,
            meal_type: analysis.meal_type.clone(),
            total_calories: analysis.total_calories,
            description: analysis.description.clone(),
            ingredients_json: serde_json::to_string(&analysis.ingredients)
                .context("Failed to serialize ingredients")?,
            thumbnail_jpeg: thumbnail_jpeg.map(|bytes| bytes.to_vec()),
            created_at: now,
            updated_at: now,
        };

        self.conn
            .execute(
                "INSERT INTO food_logs (id, logged_at, meal_type, total_calories, description,
                                        ingredients_json, thumbnail_jpeg, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    record.id.to_string(),
                    timestamp(&record.logged_at),
                    record.meal_type,
                    record.total_calories,
                    record.description,
                    record.ingredients_json,
                    record.thumbnail_jpeg,
                    timestamp(&record.created_at),
                    timestamp(&record.updated_at),
                ],
            )
            .context("Failed to insert food log")?;

        info!(
            "Saved food log {} ({}, {} kcal)",
            record.id, record.meal_type, record.total_calories
        );
        Ok(record)
    }

    /// All food logs, newest first.
    pub fn fetch_all_logs(&self) -> Result<Vec<FoodLogRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {COLUMNS} FROM food_logs ORDER BY logged_at DESC"
            ))
            .context("Failed to prepare query")?;

        let rows = stmt
            .query_map([], map_row)
            .context("Failed to query food logs")?;

        collect_records(rows)
    }

    /// Food logs for one calendar day (UTC), newest first.
    pub fn fetch_logs_for_date(&self, date: NaiveDate) -> Result<Vec<FoodLogRecord>> {
        let (start, end) = day_bounds(date)?;
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {COLUMNS} FROM food_logs
                 WHERE logged_at >= ?1 AND logged_at < ?2
                 ORDER BY logged_at DESC"
            ))
            .context("Failed to prepare query")?;

        let rows = stmt
            .query_map(params![timestamp(&start), timestamp(&end)], map_row)
            .context("Failed to query food logs")?;

        collect_records(rows)
    }

    /// Food logs in an inclusive timestamp range, newest first.
    pub fn fetch_logs_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<FoodLogRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {COLUMNS} FROM food_logs
                 WHERE logged_at >= ?1 AND logged_at <= ?2
                 ORDER BY logged_at DESC"
            ))
            .context("Failed to prepare query")?;

        let rows = stmt
            .query_map(params![timestamp(&start), timestamp(&end)], map_row)
            .context("Failed to query food logs")?;

        collect_records(rows)
    }

    /// Overwrite a log's analysis fields.
    pub fn update_log(&self, id: Uuid, analysis: &FoodAnalysis) -> Result<()> {
        let ingredients_json = serde_json::to_string(&analysis.ingredients)
            .context("Failed to serialize ingredients")?;

        let rows = self
            .conn
            .execute(
                "UPDATE food_logs
                 SET meal_type = ?1, total_calories = ?2, description = ?3,
                     ingredients_json = ?4, updated_at = ?5
                 WHERE id = ?6",
                params![
                    analysis.meal_type,
                    analysis.total_calories,
                    analysis.description,
                    ingredients_json,
                    timestamp(&Utc::now()),
                    id.to_string(),
                ],
            )
            .context("Failed to update food log")?;

        if rows == 0 {
            bail!("Food log {id} not found");
        }
        info!("Updated food log {}", id);
        Ok(())
    }

    pub fn delete_log(&self, id: Uuid) -> Result<()> {
        let rows = self
            .conn
            .execute("DELETE FROM food_logs WHERE id = ?1", params![id.to_string()])
            .context("Failed to delete food log")?;

        if rows == 0 {
            bail!("Food log {id} not found");
        }
        info!("Deleted food log {}", id);
        Ok(())
    }

    /// Distinct days within a month (UTC) that have at least one log.
    /// Backs calendar views that mark logged days.
    pub fn dates_with_logs(&self, year: i32, month: u32) -> Result<Vec<NaiveDate>> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)
            .with_context(|| format!("Invalid month: {year}-{month}"))?;
        let end = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .context("Invalid month bound")?;

        let mut stmt = self
            .conn
            .prepare(
                "SELECT DISTINCT substr(logged_at, 1, 10) FROM food_logs
                 WHERE logged_at >= ?1 AND logged_at < ?2
                 ORDER BY 1",
            )
            .context("Failed to prepare query")?;

        let days = stmt
            .query_map(
                params![
                    timestamp(&start.and_hms_opt(0, 0, 0).context("Invalid date")?.and_utc()),
                    timestamp(&end.and_hms_opt(0, 0, 0).context("Invalid date")?.and_utc()),
                ],
                |row| row.get::<_, String>(0),
            )
            .context("Failed to query logged days")?;

        days.map(|day| {
            let day = day.context("Failed to read logged day")?;
            day.parse::<NaiveDate>()
                .with_context(|| format!("Invalid stored day: {day}"))
        })
        .collect()
    }

    /// Calorie total across one calendar day (UTC).
    pub fn total_calories_for_date(&self, date: NaiveDate) -> Result<f64> {
        let (start, end) = day_bounds(date)?;
        self.conn
            .query_row(
                "SELECT COALESCE(SUM(total_calories), 0)
                 FROM food_logs WHERE logged_at >= ?1 AND logged_at < ?2",
                params![timestamp(&start), timestamp(&end)],
                |row| row.get(0),
            )
            .context("Failed to sum calories")
    }
}

/// Fixed-width UTC timestamps so string comparison in SQL orders correctly.
fn timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Invalid stored timestamp: {s}"))
}

fn day_bounds(date: NaiveDate) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let start = date
        .and_hms_opt(0, 0, 0)
        .context("Invalid date")?
        .and_utc();
    Ok((start, start + Duration::days(1)))
}

struct RawLog {
    id: String,
    logged_at: String,
    meal_type: String,
    total_calories: f64,
    description: String,
    ingredients_json: String,
    thumbnail_jpeg: Option<Vec<u8>>,
    created_at: String,
    updated_at: String,
}

fn map_row(row: &rusqlite::Row) -> rusqlite::Result<RawLog> {
    Ok(RawLog {
        id: row.get(0)?,
        logged_at: row.get(1)?,
        meal_type: row.get(2)?,
        total_calories: row.get(3)?,
        description: row.get(4)?,
        ingredients_json: row.get(5)?,
        thumbnail_jpeg: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn collect_records(
    rows: impl Iterator<Item = rusqlite::Result<RawLog>>,
) -> Result<Vec<FoodLogRecord>> {
    rows.map(|raw| {
        let raw = raw.context("Failed to read food log row")?;
        Ok(FoodLogRecord {
            id: Uuid::parse_str(&raw.id)
                .with_context(|| format!("Invalid stored id: {}", raw.id))?,
            logged_at: parse_timestamp(&raw.logged_at)?,
            meal_type: raw.meal_type,
            total_calories: raw.total_calories,
            description: raw.description,
            ingredients_json: raw.ingredients_json,
            thumbnail_jpeg: raw.thumbnail_jpeg,
            created_at: parse_timestamp(&raw.created_at)?,
            updated_at: parse_timestamp(&raw.updated_at)?,
        })
    })
    .collect()
}
