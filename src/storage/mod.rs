//! # Persistent Log
//!
//! SQLite-backed storage of [`LogRecord`] rows in a single `logdata` table,
//! plus the worker that owns the store ([`lifecycle`]).

pub mod lifecycle;

use rusqlite::{params, Connection};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::Result;
use crate::telemetry::LogRecord;

pub use lifecycle::PersistentLog;

/// Column definitions of `logdata`, in insert order
const COLUMNS: [(&str, &str); 32] = [
    ("device_id", "TEXT"),
    ("valid_time", "INTEGER"),
    ("timestamp", "TEXT"),
    ("fix_status", "TEXT"),
    ("latitude", "REAL"),
    ("longitude", "REAL"),
    ("speed_over_ground", "REAL"),
    ("course_over_ground", "REAL"),
    ("fix_quality", "INTEGER"),
    ("satellite_count", "INTEGER"),
    ("horizontal_dilution", "REAL"),
    ("altitude", "REAL"),
    ("acc_x", "REAL"),
    ("acc_y", "REAL"),
    ("acc_z", "REAL"),
    ("gyro_x", "REAL"),
    ("gyro_y", "REAL"),
    ("gyro_z", "REAL"),
    ("pitch", "REAL"),
    ("roll", "REAL"),
    ("mag_x", "REAL"),
    ("mag_y", "REAL"),
    ("mag_z", "REAL"),
    ("heading", "REAL"),
    ("battery_voltage", "REAL"),
    ("battery_percent", "REAL"),
    ("wind_speed", "REAL"),
    ("wind_angle", "REAL"),
    ("wind_speed_knots", "REAL"),
    ("wind_true_direction", "REAL"),
    ("link_connected", "INTEGER"),
    ("link_signal", "INTEGER"),
];

/// Destination for persisted records
#[cfg_attr(test, mockall::automock)]
pub trait LogSink: Send {
    fn insert(&mut self, record: &LogRecord) -> Result<()>;

    /// Destroy every stored row and start over with an empty store
    fn wipe(&mut self) -> Result<()>;

    fn count(&mut self) -> Result<u64>;
}

/// SQLite log file
///
/// The connection is dropped when an erase fails part-way and reattached
/// to the file on next use.
#[derive(Debug)]
pub struct LogStore {
    conn: Option<Connection>,
    path: PathBuf,
    insert_sql: String,
}

fn create_table_sql() -> String {
    let columns: Vec<String> = COLUMNS
        .iter()
        .map(|(name, kind)| format!("{} {}", name, kind))
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS logdata (id INTEGER PRIMARY KEY AUTOINCREMENT, {})",
        columns.join(", ")
    )
}

fn insert_sql() -> String {
    let names: Vec<&str> = COLUMNS.iter().map(|(name, _)| *name).collect();
    let placeholders: Vec<String> = (1..=COLUMNS.len()).map(|i| format!("?{}", i)).collect();
    format!(
        "INSERT INTO logdata ({}) VALUES ({})",
        names.join(", "),
        placeholders.join(", ")
    )
}

/// Create the parent directory, open the file and ensure the schema
fn connect(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let conn = Connection::open(path)?;
    conn.execute(&create_table_sql(), [])?;
    Ok(conn)
}

fn attached<'a>(conn: &'a mut Option<Connection>, path: &Path) -> Result<&'a Connection> {
    let live = match conn.take() {
        Some(live) => live,
        None => {
            let fresh = connect(path)?;
            info!("Reattached log store {}", path.display());
            fresh
        }
    };
    Ok(conn.insert(live))
}

impl LogStore {
    /// Open the log file at `path`, creating it and its schema if needed
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or the
    /// database cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = connect(&path)?;
        info!("Opened log store {}", path.display());
        Ok(Self {
            conn: Some(conn),
            path,
            insert_sql: insert_sql(),
        })
    }
}

impl LogSink for LogStore {
    fn insert(&mut self, r: &LogRecord) -> Result<()> {
        let conn = attached(&mut self.conn, &self.path)?;
        let mut stmt = conn.prepare_cached(&self.insert_sql)?;
        stmt.execute(params![
            r.device_id,
            r.valid_time,
            r.timestamp,
            r.fix_status,
            r.latitude,
            r.longitude,
            r.speed_over_ground,
            r.course_over_ground,
            r.fix_quality,
            r.satellite_count,
            r.horizontal_dilution,
            r.altitude,
            r.acc_x,
            r.acc_y,
            r.acc_z,
            r.gyro_x,
            r.gyro_y,
            r.gyro_z,
            r.pitch,
            r.roll,
            r.mag_x,
            r.mag_y,
            r.mag_z,
            r.heading,
            r.battery_voltage,
            r.battery_percent,
            r.wind_speed,
            r.wind_angle,
            r.wind_speed_knots,
            r.wind_true_direction,
            r.link_connected,
            r.link_signal,
        ])?;
        Ok(())
    }

    fn wipe(&mut self) -> Result<()> {
        if let Some(old) = self.conn.take() {
            if let Err((old, e)) = old.close() {
                self.conn = Some(old);
                return Err(e.into());
            }
        }

        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        self.conn = Some(connect(&self.path)?);
        debug!("Recreated log store {}", self.path.display());
        Ok(())
    }

    fn count(&mut self) -> Result<u64> {
        let conn = attached(&mut self.conn, &self.path)?;
        let rows: i64 = conn.query_row("SELECT COUNT(*) FROM logdata", [], |row| row.get(0))?;
        Ok(rows.max(0) as u64)
    }
}
