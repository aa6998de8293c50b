use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{params, Connection, OpenFlags};
use tracing::{debug, warn};

use crate::error::AppResult;
use crate::model::tick::{NewTick, Side, Tick};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS ticks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    instrument_code TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    price REAL NOT NULL,
    volume INTEGER NOT NULL,
    side TEXT NOT NULL,
    UNIQUE(instrument_code, timestamp, price, volume, side)
);

CREATE INDEX IF NOT EXISTS idx_ticks_instrument_id ON ticks (instrument_code, id);
"#;

/// One incremental read. `high_water` is the largest id scanned, including rows
/// that could not be decoded, so the cursor never revisits them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickBatch {
    pub ticks: Vec<Tick>,
    pub high_water: Option<i64>,
}

impl TickBatch {
    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }
}

/// Incremental, cursor-based access to one instrument's tick sequence.
pub trait TickReader {
    fn read_since(&self, instrument: &str, cursor: i64) -> AppResult<TickBatch>;
}

/// Establishes fresh store connections. The session drops and re-creates its reader
/// whenever the monitored instrument changes.
pub trait StoreConnector {
    type Reader: TickReader;

    fn connect(&self) -> AppResult<Self::Reader>;
}

/// Append-only, deduplicated tick log backed by SQLite in WAL mode.
pub struct TickStore {
    conn: Connection,
}

impl TickStore {
    /// Open for writing, creating the file and schema when missing.
    pub fn open(path: &Path, busy_timeout: Duration) -> AppResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!(path = %path.display(), journal_mode = %mode, "Opened tick store");
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Open an existing store read-only. Fails if the file or schema does not exist yet.
    pub fn open_read_only(path: &Path, busy_timeout: Duration) -> AppResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(busy_timeout)?;
        // Fails with "no such table" until the ingestion side has created the schema.
        conn.prepare("SELECT 1 FROM ticks LIMIT 1")?;
        Ok(Self { conn })
    }

    /// Append a batch atomically. Exact natural-key duplicates are ignored.
    /// Returns the number of rows actually inserted.
    pub fn append(&mut self, instrument: &str, ticks: &[NewTick]) -> AppResult<usize> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare_cached(
                r#"
                INSERT OR IGNORE INTO ticks (instrument_code, timestamp, price, volume, side)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )?;
            for t in ticks {
                inserted += stmt.execute(params![
                    instrument,
                    t.timestamp,
                    t.price,
                    t.volume,
                    t.side.as_str(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    pub fn latest_sequence_id(&self, instrument: &str) -> AppResult<Option<i64>> {
        let max_id = self.conn.query_row(
            "SELECT MAX(id) FROM ticks WHERE instrument_code = ?1",
            [instrument],
            |row| row.get::<_, Option<i64>>(0),
        )?;
        Ok(max_id)
    }
}

impl TickReader for TickStore {
    fn read_since(&self, instrument: &str, cursor: i64) -> AppResult<TickBatch> {
        let mut stmt = self.conn.prepare_cached(
            r#"
            SELECT id, timestamp, price, volume, side
            FROM ticks
            WHERE instrument_code = ?1 AND id > ?2
            ORDER BY id ASC
            "#,
        )?;

        let rows = stmt.query_map(params![instrument, cursor], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut batch = TickBatch::default();
        for row in rows {
            let (sequence_id, timestamp, price, volume, side) = row?;
            batch.high_water = Some(sequence_id);
            let Some(side) = Side::from_raw_code(&side) else {
                warn!(sequence_id, side = %side, "Skipping stored tick with unknown side");
                continue;
            };
            batch.ticks.push(Tick {
                sequence_id,
                instrument_code: instrument.to_string(),
                timestamp,
                price,
                volume,
                side,
            });
        }
        Ok(batch)
    }
}

/// Connects to the store file the ingestion side writes to.
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    path: PathBuf,
    busy_timeout: Duration,
    read_only: bool,
}

impl SqliteConnector {
    pub fn new(path: impl Into<PathBuf>, busy_timeout: Duration) -> Self {
        Self {
            path: path.into(),
            busy_timeout,
            read_only: true,
        }
    }

    /// Open read-write instead, creating the store if needed.
    pub fn writable(mut self) -> Self {
        self.read_only = false;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StoreConnector for SqliteConnector {
    type Reader = TickStore;

    fn connect(&self) -> AppResult<TickStore> {
        if self.read_only {
            TickStore::open_read_only(&self.path, self.busy_timeout)
        } else {
            TickStore::open(&self.path, self.busy_timeout)
        }
    }
}
