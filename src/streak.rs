//! Daily streak tracking - key/value persistence and completion bookkeeping

use chrono::{Local, NaiveDate};
use log::{debug, info, warn};
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use crate::error::{LingoError, LingoResult};

#[cfg(feature = "python")]
use pyo3::prelude::*;

pub const LAST_COMPLETION_DATE_KEY: &str = "lastCompletionDate";
pub const STREAK_COUNT_KEY: &str = "streakCount";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Durable key/value storage for streak bookkeeping
pub trait StreakStore: Send + Sync {
    fn get(&self, key: &str) -> LingoResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> LingoResult<()>;
}

/// Source of the learner's current calendar date
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Calendar date in the local time zone
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// SQLite-backed store that survives restarts
pub struct SqliteStreakStore {
    conn: Mutex<Connection>,
}

impl SqliteStreakStore {
    pub fn open<P: AsRef<Path>>(db_path: P) -> LingoResult<Self> {
        let conn = Connection::open(db_path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> LingoResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> LingoResult<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> LingoResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| LingoError::Lock("streak store".to_string()))
    }
}

impl StreakStore for SqliteStreakStore {
    fn get(&self, key: &str) -> LingoResult<Option<String>> {
        let conn = self.lock()?;
        let result = conn.query_row(
            "SELECT value FROM kv_store WHERE key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> LingoResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, CURRENT_TIMESTAMP)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
            params![key, value],
        )?;
        Ok(())
    }
}

/// Process-local store, lost on exit
#[derive(Debug, Default)]
pub struct MemoryStreakStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStreakStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StreakStore for MemoryStreakStore {
    fn get(&self, key: &str) -> LingoResult<Option<String>> {
        let values = self
            .values
            .lock()
            .map_err(|_| LingoError::Lock("streak store".to_string()))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> LingoResult<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| LingoError::Lock("streak store".to_string()))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Outcome of recording a finished lesson
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakUpdate {
    pub streak: u32,
    pub incremented: bool,
}

/// Current streak count; missing or unreadable values count as zero
pub fn read_streak(store: &dyn StreakStore) -> LingoResult<u32> {
    let raw = store.get(STREAK_COUNT_KEY)?;
    Ok(match raw {
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring unreadable streak count '{}'", value);
            0
        }),
        None => 0,
    })
}

/// Date of the last finished lesson, if any was recorded
pub fn last_completion_date(store: &dyn StreakStore) -> LingoResult<Option<NaiveDate>> {
    let raw = store.get(LAST_COMPLETION_DATE_KEY)?;
    Ok(raw.and_then(|value| match NaiveDate::parse_from_str(value.trim(), DATE_FORMAT) {
        Ok(date) => Some(date),
        Err(_) => {
            warn!("Ignoring unreadable completion date '{}'", value);
            None
        }
    }))
}

/// Record a finished lesson on `today`.
///
/// The streak grows by one per calendar date no matter how many lessons are
/// finished that day. A skipped day does not reset the count.
pub fn reconcile_streak(store: &dyn StreakStore, today: NaiveDate) -> LingoResult<StreakUpdate> {
    let current = read_streak(store)?;

    if last_completion_date(store)? == Some(today) {
        debug!("Lesson already completed on {}, streak stays at {}", today, current);
        return Ok(StreakUpdate { streak: current, incremented: false });
    }

    let streak = current.saturating_add(1);
    store.set(LAST_COMPLETION_DATE_KEY, &today.format(DATE_FORMAT).to_string())?;
    store.set(STREAK_COUNT_KEY, &streak.to_string())?;
    info!("Streak advanced to {} on {}", streak, today);

    Ok(StreakUpdate { streak, incremented: true })
}

// ============= Python Bindings =============

#[cfg(feature = "python")]
#[pyfunction]
#[pyo3(name = "get_streak")]
pub fn py_get_streak(db_path: &str) -> PyResult<u32> {
    let store = SqliteStreakStore::open(db_path)?;
    Ok(read_streak(&store)?)
}

/// Record a finished lesson for today; returns the streak afterwards
#[cfg(feature = "python")]
#[pyfunction]
#[pyo3(name = "record_completion")]
pub fn py_record_completion(db_path: &str) -> PyResult<u32> {
    let store = SqliteStreakStore::open(db_path)?;
    let update = reconcile_streak(&store, LocalClock.today())?;
    Ok(update.streak)
}
