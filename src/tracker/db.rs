use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::models::*;
use super::production::compute_hour;
use crate::errors::TrackerError;

/// Async-safe handle to the tracker database.
///
/// Wraps `TrackerDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, so synchronous SQLite I/O never
/// ties up async worker threads.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<TrackerDb>>,
}

impl DbHandle {
    pub fn new(db: TrackerDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&TrackerDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db.lock().map_err(|_| TrackerError::LockPoisoned)?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }
}

/// Filter for hourly inspection listings. `None` matches everything.
#[derive(Debug, Clone, Default)]
pub struct InspectionFilter {
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub report_date: Option<NaiveDate>,
}

const TIMESTAMP_NOW: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

const REGISTER_COLUMNS: &str =
    "id, building, floor, line, buyer, style, item, color, created_by, created_at, updated_at";

const INSPECTION_TOP_COLUMNS: &str = "id, user_id, user_name, report_date, building, floor, line, \
     buyer, style, item, color, created_at, updated_at";

const HOURLY_INSPECTION_COLUMNS: &str = "id, user_id, user_name, report_date, hour, hour_label, \
     selected_defects, total_defects, defective_pcs, inspected_qty, passed_qty, after_repair, \
     created_at, updated_at";

const HEADER_COLUMNS: &str = "id, header_date, production_user_id, production_user_name, \
     production_user_phone, production_user_bio, quality_user, operator_to, manpower_present, \
     manpower_absent, working_hour, plan_quantity, plan_efficiency, today_target, achieve, smv, \
     created_at, updated_at";

const HOURLY_PRODUCTION_COLUMNS: &str = "id, header_id, hour, achieved_qty, base_target_per_hour, \
     dynamic_target, variance_qty, hourly_efficiency, achieve_efficiency, total_efficiency, \
     production_user_id, production_user_name, production_user_phone, production_user_bio, \
     created_at, updated_at";

const MEDIA_LINK_COLUMNS: &str =
    "id, user_id, user_name, image_src, video_src, created_at, updated_at";

fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn read_date(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn read_json<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn register_from_row(row: &Row<'_>) -> rusqlite::Result<Register> {
    Ok(Register {
        id: row.get(0)?,
        line_info: LineInfo {
            building: row.get(1)?,
            floor: row.get(2)?,
            line: row.get(3)?,
            buyer: row.get(4)?,
            style: row.get(5)?,
            item: row.get(6)?,
            color: row.get(7)?,
        },
        created_by: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn inspection_top_from_row(row: &Row<'_>) -> rusqlite::Result<InspectionTop> {
    Ok(InspectionTop {
        id: row.get(0)?,
        user: UserRef {
            id: row.get(1)?,
            user_name: row.get(2)?,
        },
        report_date: read_date(row, 3)?,
        line_info: LineInfo {
            building: row.get(4)?,
            floor: row.get(5)?,
            line: row.get(6)?,
            buyer: row.get(7)?,
            style: row.get(8)?,
            item: row.get(9)?,
            color: row.get(10)?,
        },
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn hourly_inspection_from_row(row: &Row<'_>) -> rusqlite::Result<HourlyInspection> {
    Ok(HourlyInspection {
        id: row.get(0)?,
        user: UserRef {
            id: row.get(1)?,
            user_name: row.get(2)?,
        },
        report_date: read_date(row, 3)?,
        hour: row.get(4)?,
        hour_label: row.get(5)?,
        counts: InspectionCounts {
            selected_defects: read_json(row, 6)?,
            total_defects: row.get(7)?,
            defective_pcs: row.get(8)?,
            inspected_qty: row.get(9)?,
            passed_qty: row.get(10)?,
            after_repair: row.get(11)?,
        },
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

fn header_from_row(row: &Row<'_>) -> rusqlite::Result<ProductionHeader> {
    let quality_user: Option<String> = row.get(6)?;
    let quality_user = match quality_user {
        Some(raw) => Some(
            serde_json::from_str(&raw)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?,
        ),
        None => None,
    };
    Ok(ProductionHeader {
        id: row.get(0)?,
        header_date: read_date(row, 1)?,
        production_user: ProductionUser {
            id: row.get(2)?,
            production_user_name: row.get(3)?,
            phone: row.get(4)?,
            bio: row.get(5)?,
        },
        quality_user,
        figures: HeaderFigures {
            operator_to: row.get(7)?,
            manpower_present: row.get(8)?,
            manpower_absent: row.get(9)?,
            working_hour: row.get(10)?,
            plan_quantity: row.get(11)?,
            plan_efficiency: row.get(12)?,
            today_target: row.get(13)?,
            achieve: row.get(14)?,
            smv: row.get(15)?,
        },
        created_at: row.get(16)?,
        updated_at: row.get(17)?,
    })
}

fn hourly_production_from_row(row: &Row<'_>) -> rusqlite::Result<HourlyProduction> {
    Ok(HourlyProduction {
        id: row.get(0)?,
        header_id: row.get(1)?,
        hour: row.get(2)?,
        achieved_qty: row.get(3)?,
        base_target_per_hour: row.get(4)?,
        dynamic_target: row.get(5)?,
        variance_qty: row.get(6)?,
        hourly_efficiency: row.get(7)?,
        achieve_efficiency: row.get(8)?,
        total_efficiency: row.get(9)?,
        production_user: ProductionUser {
            id: row.get(10)?,
            production_user_name: row.get(11)?,
            phone: row.get(12)?,
            bio: row.get(13)?,
        },
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

fn media_link_from_row(row: &Row<'_>) -> rusqlite::Result<MediaLink> {
    Ok(MediaLink {
        id: row.get(0)?,
        user: UserRef {
            id: row.get(1)?,
            user_name: row.get(2)?,
        },
        image_src: row.get(3)?,
        video_src: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

pub struct TrackerDb {
    conn: Connection,
}

impl TrackerDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS registers (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    building TEXT NOT NULL,
                    floor TEXT NOT NULL,
                    line TEXT NOT NULL,
                    buyer TEXT NOT NULL,
                    style TEXT NOT NULL DEFAULT '',
                    item TEXT NOT NULL DEFAULT '',
                    color TEXT NOT NULL DEFAULT '',
                    created_by TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
                );

                CREATE TABLE IF NOT EXISTS inspection_tops (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id TEXT NOT NULL,
                    user_name TEXT NOT NULL,
                    report_date TEXT NOT NULL,
                    building TEXT NOT NULL DEFAULT '',
                    floor TEXT NOT NULL DEFAULT '',
                    line TEXT NOT NULL DEFAULT '',
                    buyer TEXT NOT NULL DEFAULT '',
                    style TEXT NOT NULL DEFAULT '',
                    item TEXT NOT NULL DEFAULT '',
                    color TEXT NOT NULL DEFAULT '',
                    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                    UNIQUE(user_id, report_date, line)
                );

                CREATE TABLE IF NOT EXISTS hourly_inspections (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id TEXT NOT NULL,
                    user_name TEXT NOT NULL,
                    report_date TEXT NOT NULL,
                    hour INTEGER NOT NULL,
                    hour_label TEXT NOT NULL,
                    selected_defects TEXT NOT NULL DEFAULT '[]',
                    total_defects INTEGER NOT NULL DEFAULT 0,
                    defective_pcs INTEGER NOT NULL DEFAULT 0,
                    inspected_qty INTEGER NOT NULL DEFAULT 0,
                    passed_qty INTEGER NOT NULL DEFAULT 0,
                    after_repair INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                    UNIQUE(user_id, report_date, hour)
                );

                CREATE TABLE IF NOT EXISTS production_headers (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    header_date TEXT NOT NULL,
                    production_user_id TEXT NOT NULL,
                    production_user_name TEXT,
                    production_user_phone TEXT,
                    production_user_bio TEXT,
                    quality_user TEXT,
                    operator_to REAL NOT NULL DEFAULT 0,
                    manpower_present REAL NOT NULL DEFAULT 0,
                    manpower_absent REAL NOT NULL DEFAULT 0,
                    working_hour REAL NOT NULL DEFAULT 0,
                    plan_quantity REAL NOT NULL DEFAULT 0,
                    plan_efficiency REAL NOT NULL DEFAULT 0,
                    today_target REAL NOT NULL DEFAULT 0,
                    achieve REAL NOT NULL DEFAULT 0,
                    smv REAL NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                    UNIQUE(production_user_id, header_date)
                );

                CREATE TABLE IF NOT EXISTS hourly_productions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    header_id INTEGER NOT NULL,
                    hour INTEGER NOT NULL,
                    achieved_qty REAL NOT NULL DEFAULT 0,
                    base_target_per_hour REAL NOT NULL DEFAULT 0,
                    dynamic_target REAL NOT NULL DEFAULT 0,
                    variance_qty REAL NOT NULL DEFAULT 0,
                    hourly_efficiency REAL NOT NULL DEFAULT 0,
                    achieve_efficiency REAL NOT NULL DEFAULT 0,
                    total_efficiency REAL NOT NULL DEFAULT 0,
                    production_user_id TEXT NOT NULL,
                    production_user_name TEXT,
                    production_user_phone TEXT,
                    production_user_bio TEXT,
                    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                    UNIQUE(header_id, production_user_id, hour)
                );

                CREATE TABLE IF NOT EXISTS media_links (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id TEXT NOT NULL UNIQUE,
                    user_name TEXT NOT NULL,
                    image_src TEXT NOT NULL DEFAULT '',
                    video_src TEXT NOT NULL DEFAULT '',
                    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
                );

                CREATE INDEX IF NOT EXISTS idx_registers_created_by ON registers(created_by);
                CREATE INDEX IF NOT EXISTS idx_hourly_inspections_user_date
                    ON hourly_inspections(user_name, report_date);
                CREATE INDEX IF NOT EXISTS idx_hourly_productions_header
                    ON hourly_productions(header_id, hour);
                ",
            )
            .context("Failed to create tables")?;
        Ok(())
    }

    // ── Register CRUD ─────────────────────────────────────────────────

    pub fn create_register(&self, info: &LineInfo, created_by: &str) -> Result<Register> {
        self.conn
            .execute(
                "INSERT INTO registers (building, floor, line, buyer, style, item, color, created_by)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    info.building,
                    info.floor,
                    info.line,
                    info.buyer,
                    info.style,
                    info.item,
                    info.color,
                    created_by
                ],
            )
            .context("Failed to insert register")?;
        let id = self.conn.last_insert_rowid();
        self.get_register(id)?
            .context("Register not found after insert")
    }

    pub fn get_register(&self, id: i64) -> Result<Option<Register>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM registers WHERE id = ?1", REGISTER_COLUMNS),
                params![id],
                register_from_row,
            )
            .optional()
            .context("Failed to query register")
    }

    /// Registrations newest first, optionally limited to one owner.
    pub fn list_registers(&self, created_by: Option<&str>) -> Result<Vec<Register>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {} FROM registers
                 WHERE (?1 IS NULL OR created_by = ?1)
                 ORDER BY created_at DESC, id DESC",
                REGISTER_COLUMNS
            ))
            .context("Failed to prepare list_registers")?;
        let rows = stmt
            .query_map(params![created_by], register_from_row)
            .context("Failed to query registers")?;
        let mut registers = Vec::new();
        for row in rows {
            registers.push(row.context("Failed to read register row")?);
        }
        Ok(registers)
    }

    pub fn delete_register(&self, id: i64) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM registers WHERE id = ?1", params![id])
            .context("Failed to delete register")?;
        Ok(affected > 0)
    }

    // ── Inspection top input ──────────────────────────────────────────

    /// Insert or refresh the line snapshot for (user, date, line).
    pub fn upsert_inspection_top(
        &self,
        user: &UserRef,
        report_date: NaiveDate,
        info: &LineInfo,
    ) -> Result<InspectionTop> {
        let day = date_key(report_date);
        self.conn
            .execute(
                &format!(
                    "INSERT INTO inspection_tops
                        (user_id, user_name, report_date, building, floor, line, buyer, style, item, color)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                     ON CONFLICT(user_id, report_date, line) DO UPDATE SET
                        user_name = excluded.user_name,
                        building = excluded.building,
                        floor = excluded.floor,
                        buyer = excluded.buyer,
                        style = excluded.style,
                        item = excluded.item,
                        color = excluded.color,
                        updated_at = {}",
                    TIMESTAMP_NOW
                ),
                params![
                    user.id,
                    user.user_name,
                    day,
                    info.building,
                    info.floor,
                    info.line,
                    info.buyer,
                    info.style,
                    info.item,
                    info.color
                ],
            )
            .context("Failed to upsert inspection top input")?;
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM inspection_tops
                     WHERE user_id = ?1 AND report_date = ?2 AND line = ?3",
                    INSPECTION_TOP_COLUMNS
                ),
                params![user.id, day, info.line],
                inspection_top_from_row,
            )
            .context("Inspection top input not found after upsert")
    }

    pub fn get_inspection_top(&self, id: i64) -> Result<Option<InspectionTop>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM inspection_tops WHERE id = ?1",
                    INSPECTION_TOP_COLUMNS
                ),
                params![id],
                inspection_top_from_row,
            )
            .optional()
            .context("Failed to query inspection top input")
    }

    /// Replace the line metadata of an existing row.
    pub fn update_inspection_top(&self, id: i64, info: &LineInfo) -> Result<Option<InspectionTop>> {
        let result = self.conn.execute(
            &format!(
                "UPDATE inspection_tops SET
                    building = ?1, floor = ?2, line = ?3, buyer = ?4,
                    style = ?5, item = ?6, color = ?7, updated_at = {}
                 WHERE id = ?8",
                TIMESTAMP_NOW
            ),
            params![
                info.building,
                info.floor,
                info.line,
                info.buyer,
                info.style,
                info.item,
                info.color,
                id
            ],
        );
        match result {
            Ok(0) => Ok(None),
            Ok(_) => self.get_inspection_top(id),
            Err(e) if is_unique_violation(&e) => Err(TrackerError::Conflict(format!(
                "Another top input already exists for line '{}' on this date",
                info.line
            ))
            .into()),
            Err(e) => Err(anyhow::Error::new(e).context("Failed to update inspection top input")),
        }
    }

    pub fn delete_inspection_top(&self, id: i64) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM inspection_tops WHERE id = ?1", params![id])
            .context("Failed to delete inspection top input")?;
        Ok(affected > 0)
    }

    /// Newest first, at most `limit` rows.
    pub fn list_inspection_tops(
        &self,
        user_id: Option<&str>,
        report_date: Option<NaiveDate>,
        limit: usize,
    ) -> Result<Vec<InspectionTop>> {
        let day = report_date.map(date_key);
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {} FROM inspection_tops
                 WHERE (?1 IS NULL OR user_id = ?1)
                   AND (?2 IS NULL OR report_date = ?2)
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?3",
                INSPECTION_TOP_COLUMNS
            ))
            .context("Failed to prepare list_inspection_tops")?;
        let rows = stmt
            .query_map(params![user_id, day, limit as i64], inspection_top_from_row)
            .context("Failed to query inspection top inputs")?;
        let mut tops = Vec::new();
        for row in rows {
            tops.push(row.context("Failed to read inspection top row")?);
        }
        Ok(tops)
    }

    // ── Hourly inspections ────────────────────────────────────────────

    /// Insert or overwrite the inspection figures for (user, date, hour).
    pub fn upsert_hourly_inspection(
        &self,
        user: &UserRef,
        report_date: NaiveDate,
        hour: i64,
        counts: &InspectionCounts,
    ) -> Result<HourlyInspection> {
        let day = date_key(report_date);
        let defects = serde_json::to_string(&counts.selected_defects)
            .context("Failed to serialize selected defects")?;
        self.conn
            .execute(
                &format!(
                    "INSERT INTO hourly_inspections
                        (user_id, user_name, report_date, hour, hour_label, selected_defects,
                         total_defects, defective_pcs, inspected_qty, passed_qty, after_repair)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                     ON CONFLICT(user_id, report_date, hour) DO UPDATE SET
                        user_name = excluded.user_name,
                        hour_label = excluded.hour_label,
                        selected_defects = excluded.selected_defects,
                        total_defects = excluded.total_defects,
                        defective_pcs = excluded.defective_pcs,
                        inspected_qty = excluded.inspected_qty,
                        passed_qty = excluded.passed_qty,
                        after_repair = excluded.after_repair,
                        updated_at = {}",
                    TIMESTAMP_NOW
                ),
                params![
                    user.id,
                    user.user_name,
                    day,
                    hour,
                    hour_label(hour),
                    defects,
                    counts.total_defects,
                    counts.defective_pcs,
                    counts.inspected_qty,
                    counts.passed_qty,
                    counts.after_repair
                ],
            )
            .context("Failed to upsert hourly inspection")?;
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM hourly_inspections
                     WHERE user_id = ?1 AND report_date = ?2 AND hour = ?3",
                    HOURLY_INSPECTION_COLUMNS
                ),
                params![user.id, day, hour],
                hourly_inspection_from_row,
            )
            .context("Hourly inspection not found after upsert")
    }

    /// Upsert a whole batch of hours in one transaction. Nothing is written
    /// unless every entry succeeds.
    pub fn save_hourly_inspections(
        &self,
        user: &UserRef,
        report_date: NaiveDate,
        entries: &[(i64, InspectionCounts)],
    ) -> Result<Vec<HourlyInspection>> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;

        let mut saved = Vec::with_capacity(entries.len());
        for (hour, counts) in entries {
            saved.push(self.upsert_hourly_inspection(user, report_date, *hour, counts)?);
        }

        tx.commit().context("Failed to commit hourly inspections")?;
        Ok(saved)
    }

    /// Matching rows ordered by date, then hour.
    pub fn list_hourly_inspections(&self, filter: &InspectionFilter) -> Result<Vec<HourlyInspection>> {
        let day = filter.report_date.map(date_key);
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {} FROM hourly_inspections
                 WHERE (?1 IS NULL OR user_id = ?1)
                   AND (?2 IS NULL OR user_name = ?2)
                   AND (?3 IS NULL OR report_date = ?3)
                 ORDER BY report_date, hour, id",
                HOURLY_INSPECTION_COLUMNS
            ))
            .context("Failed to prepare list_hourly_inspections")?;
        let rows = stmt
            .query_map(
                params![filter.user_id, filter.user_name, day],
                hourly_inspection_from_row,
            )
            .context("Failed to query hourly inspections")?;
        let mut inspections = Vec::new();
        for row in rows {
            inspections.push(row.context("Failed to read hourly inspection row")?);
        }
        Ok(inspections)
    }

    pub fn delete_hourly_inspection(&self, id: i64) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM hourly_inspections WHERE id = ?1", params![id])
            .context("Failed to delete hourly inspection")?;
        Ok(affected > 0)
    }

    // ── Production headers ────────────────────────────────────────────

    /// Create the header for (production user, date). Fails with
    /// `TrackerError::Conflict` when one already exists.
    pub fn create_production_header(
        &self,
        header_date: NaiveDate,
        user: &ProductionUser,
        quality_user: Option<&QualityUser>,
        figures: &HeaderFigures,
    ) -> Result<ProductionHeader> {
        if self.find_production_header(&user.id, header_date)?.is_some() {
            return Err(TrackerError::Conflict(format!(
                "Production header already exists for {} on {}. Use PATCH to update.",
                user.id, header_date
            ))
            .into());
        }
        let quality_json = quality_user
            .map(serde_json::to_string)
            .transpose()
            .context("Failed to serialize quality user")?;
        self.conn
            .execute(
                "INSERT INTO production_headers
                    (header_date, production_user_id, production_user_name, production_user_phone,
                     production_user_bio, quality_user, operator_to, manpower_present,
                     manpower_absent, working_hour, plan_quantity, plan_efficiency,
                     today_target, achieve, smv)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    date_key(header_date),
                    user.id,
                    user.production_user_name,
                    user.phone,
                    user.bio,
                    quality_json,
                    figures.operator_to,
                    figures.manpower_present,
                    figures.manpower_absent,
                    figures.working_hour,
                    figures.plan_quantity,
                    figures.plan_efficiency,
                    figures.today_target,
                    figures.achieve,
                    figures.smv
                ],
            )
            .context("Failed to insert production header")?;
        let id = self.conn.last_insert_rowid();
        self.get_production_header(id)?
            .context("Production header not found after insert")
    }

    pub fn get_production_header(&self, id: i64) -> Result<Option<ProductionHeader>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM production_headers WHERE id = ?1", HEADER_COLUMNS),
                params![id],
                header_from_row,
            )
            .optional()
            .context("Failed to query production header")
    }

    pub fn find_production_header(
        &self,
        production_user_id: &str,
        header_date: NaiveDate,
    ) -> Result<Option<ProductionHeader>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM production_headers
                     WHERE production_user_id = ?1 AND header_date = ?2",
                    HEADER_COLUMNS
                ),
                params![production_user_id, date_key(header_date)],
                header_from_row,
            )
            .optional()
            .context("Failed to query production header")
    }

    /// The most recently created header across all users.
    pub fn latest_production_header(&self) -> Result<Option<ProductionHeader>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM production_headers ORDER BY created_at DESC, id DESC LIMIT 1",
                    HEADER_COLUMNS
                ),
                [],
                header_from_row,
            )
            .optional()
            .context("Failed to query latest production header")
    }

    /// Apply `inputs` over the stored figures. `None` when the header is missing.
    pub fn update_production_header(
        &self,
        id: i64,
        inputs: &FigureInputs,
        quality_user: Option<&QualityUser>,
    ) -> Result<Option<ProductionHeader>> {
        let Some(mut header) = self.get_production_header(id)? else {
            return Ok(None);
        };
        inputs.apply_to(&mut header.figures);
        if let Some(q) = quality_user {
            header.quality_user = Some(q.clone());
        }
        let quality_json = header
            .quality_user
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .context("Failed to serialize quality user")?;
        let f = &header.figures;
        self.conn
            .execute(
                &format!(
                    "UPDATE production_headers SET
                        quality_user = ?1, operator_to = ?2, manpower_present = ?3,
                        manpower_absent = ?4, working_hour = ?5, plan_quantity = ?6,
                        plan_efficiency = ?7, today_target = ?8, achieve = ?9, smv = ?10,
                        updated_at = {}
                     WHERE id = ?11",
                    TIMESTAMP_NOW
                ),
                params![
                    quality_json,
                    f.operator_to,
                    f.manpower_present,
                    f.manpower_absent,
                    f.working_hour,
                    f.plan_quantity,
                    f.plan_efficiency,
                    f.today_target,
                    f.achieve,
                    f.smv,
                    id
                ],
            )
            .context("Failed to update production header")?;
        self.get_production_header(id)
    }

    pub fn delete_production_header(&self, id: i64) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM production_headers WHERE id = ?1", params![id])
            .context("Failed to delete production header")?;
        Ok(affected > 0)
    }

    // ── Hourly production ─────────────────────────────────────────────

    /// Rows for a header ordered by hour, optionally for one production user.
    pub fn list_hourly_productions(
        &self,
        header_id: i64,
        production_user_id: Option<&str>,
    ) -> Result<Vec<HourlyProduction>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {} FROM hourly_productions
                 WHERE header_id = ?1 AND (?2 IS NULL OR production_user_id = ?2)
                 ORDER BY hour, id",
                HOURLY_PRODUCTION_COLUMNS
            ))
            .context("Failed to prepare list_hourly_productions")?;
        let rows = stmt
            .query_map(params![header_id, production_user_id], hourly_production_from_row)
            .context("Failed to query hourly productions")?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row.context("Failed to read hourly production row")?);
        }
        Ok(records)
    }

    /// Compute this hour's carry-over target from the earlier hours of the
    /// same header and production user, then upsert the row.
    ///
    /// Read, compute and write share one transaction, so two submissions for
    /// the same hour cannot interleave.
    pub fn save_hourly_production(
        &self,
        header_id: i64,
        hour: i64,
        achieved_qty: f64,
        user: &ProductionUser,
    ) -> Result<HourlyProduction> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;

        let header = self
            .get_production_header(header_id)?
            .ok_or_else(|| TrackerError::not_found("Production header", header_id))?;
        let previous = self.list_hourly_productions(header_id, Some(user.id.as_str()))?;
        let figures = compute_hour(&header.figures, &previous, hour, achieved_qty);

        tx.execute(
            &format!(
                "INSERT INTO hourly_productions
                    (header_id, hour, achieved_qty, base_target_per_hour, dynamic_target,
                     variance_qty, hourly_efficiency, achieve_efficiency, total_efficiency,
                     production_user_id, production_user_name, production_user_phone,
                     production_user_bio)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                 ON CONFLICT(header_id, production_user_id, hour) DO UPDATE SET
                    achieved_qty = excluded.achieved_qty,
                    base_target_per_hour = excluded.base_target_per_hour,
                    dynamic_target = excluded.dynamic_target,
                    variance_qty = excluded.variance_qty,
                    hourly_efficiency = excluded.hourly_efficiency,
                    achieve_efficiency = excluded.achieve_efficiency,
                    total_efficiency = excluded.total_efficiency,
                    production_user_name = excluded.production_user_name,
                    production_user_phone = excluded.production_user_phone,
                    production_user_bio = excluded.production_user_bio,
                    updated_at = {}",
                TIMESTAMP_NOW
            ),
            params![
                header_id,
                hour,
                achieved_qty,
                figures.base_target_per_hour,
                figures.dynamic_target,
                figures.variance_qty,
                figures.hourly_efficiency,
                figures.achieve_efficiency,
                figures.total_efficiency,
                user.id,
                user.production_user_name,
                user.phone,
                user.bio
            ],
        )
        .context("Failed to upsert hourly production")?;

        let saved = tx
            .query_row(
                &format!(
                    "SELECT {} FROM hourly_productions
                     WHERE header_id = ?1 AND production_user_id = ?2 AND hour = ?3",
                    HOURLY_PRODUCTION_COLUMNS
                ),
                params![header_id, user.id, hour],
                hourly_production_from_row,
            )
            .context("Hourly production not found after upsert")?;

        tx.commit().context("Failed to commit hourly production")?;
        Ok(saved)
    }

    pub fn delete_hourly_production(&self, id: i64) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM hourly_productions WHERE id = ?1", params![id])
            .context("Failed to delete hourly production")?;
        Ok(affected > 0)
    }

    // ── Media links ───────────────────────────────────────────────────

    pub fn get_media_link(&self, user_id: &str) -> Result<Option<MediaLink>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM media_links WHERE user_id = ?1", MEDIA_LINK_COLUMNS),
                params![user_id],
                media_link_from_row,
            )
            .optional()
            .context("Failed to query media link")
    }

    /// Media links are matched by user name on the summary board.
    pub fn find_media_link_by_user_name(&self, user_name: &str) -> Result<Option<MediaLink>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM media_links WHERE user_name = ?1 ORDER BY id LIMIT 1",
                    MEDIA_LINK_COLUMNS
                ),
                params![user_name],
                media_link_from_row,
            )
            .optional()
            .context("Failed to query media link by user name")
    }

    pub fn create_media_link(
        &self,
        user: &UserRef,
        image_src: &str,
        video_src: &str,
    ) -> Result<MediaLink> {
        if self.get_media_link(&user.id)?.is_some() {
            return Err(TrackerError::Conflict(
                "Media links already exist. Use PATCH to update.".to_string(),
            )
            .into());
        }
        self.conn
            .execute(
                "INSERT INTO media_links (user_id, user_name, image_src, video_src)
                 VALUES (?1, ?2, ?3, ?4)",
                params![user.id, user.user_name, image_src, video_src],
            )
            .context("Failed to insert media link")?;
        self.get_media_link(&user.id)?
            .context("Media link not found after insert")
    }

    pub fn update_media_link(
        &self,
        user_id: &str,
        image_src: &str,
        video_src: &str,
    ) -> Result<Option<MediaLink>> {
        let affected = self
            .conn
            .execute(
                &format!(
                    "UPDATE media_links SET image_src = ?1, video_src = ?2, updated_at = {}
                     WHERE user_id = ?3",
                    TIMESTAMP_NOW
                ),
                params![image_src, video_src, user_id],
            )
            .context("Failed to update media link")?;
        if affected == 0 {
            return Ok(None);
        }
        self.get_media_link(user_id)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────
