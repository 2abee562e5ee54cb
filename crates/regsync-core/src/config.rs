use crate::error::ConfigError;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

pub const MANTIS_PATH: &str = "MANTIS_PATH";
pub const TOKEN_FILE: &str = "TOKEN_FILE";
pub const FILTER_ID: &str = "REGRESSION_FILTER_ID";
pub const SHEET_KEY: &str = "REGRESSION_SHEET_KEY";
pub const SHEET_NAME: &str = "MANTIS_TICKETS_NEXUS_E6";
pub const INTERVAL_MINUTES: &str = "JOB_INTERVAL_MINUTES";
pub const PAGE_SIZE: &str = "PAGE_SIZE";
pub const GS_TOKEN_FILE: &str = "GS_TOKEN_FILE";
pub const GS_CREDENTIAL_FILE: &str = "GS_CREDENTIAL_FILE";
pub const SHEETS_API_BASE: &str = "SHEETS_API_BASE";
pub const LOG_DIR: &str = "LOG_DIR";

/// Keys the web control surface may read back.
pub const EXPOSED_KEYS: &[&str] = &[SHEET_KEY, SHEET_NAME, FILTER_ID, INTERVAL_MINUTES];

pub const DEFAULT_INTERVAL_MINUTES: u64 = 60;
pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const DEFAULT_SHEETS_API_BASE: &str = "https://sheets.googleapis.com";
pub const DEFAULT_LOG_DIR: &str = "logs";

/// Daily log file name for `date`, e.g. `regression_progress_2024-03-05.log`.
pub fn log_file_name(date: chrono::NaiveDate) -> String {
    format!("regression_progress_{}.log", date.format("%Y-%m-%d"))
}

// ---------------------------------------------------------------------------
// ConfigStore
// ---------------------------------------------------------------------------

/// Flat key/value configuration backed by a JSON object file.
///
/// Every `set` persists immediately. The lock is held across the
/// mutate-and-write cycle so concurrent writers never interleave file writes.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    data: Mutex<Map<String, Value>>,
}

impl ConfigStore {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let data = read_object(&path)?;
        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    /// Create a store at `path` seeded with `initial`, writing it to disk.
    pub fn create(path: impl Into<PathBuf>, initial: Map<String, Value>) -> Result<Self, ConfigError> {
        let store = Self {
            path: path.into(),
            data: Mutex::new(initial),
        };
        store.persist(&store.lock())?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().get(key).cloned()
    }

    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).unwrap_or(default)
    }

    /// String view of a value. Numbers are rendered; null and empty strings
    /// count as absent.
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => {
                let s = s.trim().to_string();
                (!s.is_empty()).then_some(s)
            }
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Unsigned integer view of a value; numeric strings are accepted since
    /// the control surface posts form values as text.
    pub fn get_u64(&self, key: &'static str) -> Result<Option<u64>, ConfigError> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n.as_u64().map(Some).ok_or_else(|| ConfigError::InvalidValue {
                key,
                reason: format!("expected a non-negative integer, got {n}"),
            }),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => {
                s.trim()
                    .parse::<u64>()
                    .map(Some)
                    .map_err(|e| ConfigError::InvalidValue {
                        key,
                        reason: format!("'{s}': {e}"),
                    })
            }
            Some(other) => Err(ConfigError::InvalidValue {
                key,
                reason: format!("expected a number, got {other}"),
            }),
        }
    }

    pub fn require_str(&self, key: &'static str) -> Result<String, ConfigError> {
        self.get_str(key).ok_or(ConfigError::MissingKey(key))
    }

    pub fn interval_minutes(&self) -> Result<u64, ConfigError> {
        match self.get_u64(INTERVAL_MINUTES)? {
            Some(0) => Err(ConfigError::InvalidValue {
                key: INTERVAL_MINUTES,
                reason: "interval must be at least one minute".to_string(),
            }),
            Some(n) => Ok(n),
            None => Ok(DEFAULT_INTERVAL_MINUTES),
        }
    }

    pub fn page_size(&self) -> Result<u32, ConfigError> {
        match self.get_u64(PAGE_SIZE)? {
            None => Ok(DEFAULT_PAGE_SIZE),
            Some(n) if n == 0 || n > u64::from(u32::MAX) => Err(ConfigError::InvalidValue {
                key: PAGE_SIZE,
                reason: format!("page size {n} out of range"),
            }),
            Some(n) => Ok(n as u32),
        }
    }

    pub fn log_dir(&self) -> PathBuf {
        PathBuf::from(
            self.get_str(LOG_DIR)
                .unwrap_or_else(|| DEFAULT_LOG_DIR.to_string()),
        )
    }

    /// Set one key and persist.
    pub fn set(&self, key: &str, value: Value) -> Result<(), ConfigError> {
        let mut data = self.lock();
        data.insert(key.to_string(), value);
        self.persist(&data)
    }

    /// Set several keys under a single lock window and persist once.
    pub fn set_many(&self, entries: Map<String, Value>) -> Result<(), ConfigError> {
        let mut data = self.lock();
        for (key, value) in entries {
            data.insert(key, value);
        }
        self.persist(&data)
    }

    /// Re-read the backing file, replacing the in-memory view.
    pub fn reload(&self) -> Result<(), ConfigError> {
        let fresh = read_object(&self.path)?;
        *self.lock() = fresh;
        Ok(())
    }

    pub fn snapshot(&self) -> Map<String, Value> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Map<String, Value>> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, data: &Map<String, Value>) -> Result<(), ConfigError> {
        let mut json = serde_json::to_string_pretty(data).map_err(|e| {
            ConfigError::Persist(std::io::Error::other(e))
        })?;
        json.push('\n');
        crate::io::atomic_write(&self.path, json.as_bytes())?;
        Ok(())
    }
}

fn read_object(path: &Path) -> Result<Map<String, Value>, ConfigError> {
    let display = path.display().to_string();
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::NotFound(display))
        }
        Err(e) => return Err(ConfigError::Persist(e)),
    };
    let value: Value = serde_json::from_str(&raw).map_err(|source| ConfigError::Malformed {
        path: display.clone(),
        source,
    })?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ConfigError::NotAnObject(display)),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
