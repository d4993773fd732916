//! Durable user preferences.
//!
//! Preferences outlive any single snapshot: they are read at start-up and
//! written on every change, independently of the controller's busy state.
//! Values carry no schema version, so every typed reader defaults gracefully
//! on missing or legacy-shaped values (numbers stored as strings, floats
//! where integers are expected).
//!
//! # Keys
//!
//! | Key | Type | Description |
//! |-----|------|-------------|
//! | `petri.active-simulation` | String | Last used simulation identity |
//! | `petri.speed` | Integer | Speed multiplier `1..=10` |
//! | `petri.autosave` | Bool | Autosave toggle |
//! | `petri.target-generation` | Integer | Target for run-to-target mode |
//! | `petri.snapshot-cache` | JSON | Last applied snapshot, non-authoritative |

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use petri_types::{SimulationId, Snapshot, SpeedMultiplier};
use serde::Serialize;
use tracing::warn;

/// Storage keys.
pub mod keys {
    /// Last used simulation identity.
    pub const ACTIVE_SIMULATION: &str = "petri.active-simulation";
    /// Persisted speed multiplier.
    pub const SPEED: &str = "petri.speed";
    /// Persisted autosave flag.
    pub const AUTOSAVE: &str = "petri.autosave";
    /// Persisted target generation.
    pub const TARGET_GENERATION: &str = "petri.target-generation";
    /// Best-effort cache of the last applied snapshot.
    pub const SNAPSHOT_CACHE: &str = "petri.snapshot-cache";
}

/// Errors that can occur while persisting preferences.
#[derive(Debug, thiserror::Error)]
pub enum PreferenceError {
    /// Reading or writing the backing file failed.
    #[error("preference file I/O failed: {0}")]
    Io(#[from] io::Error),

    /// A value could not be serialized.
    #[error("preference serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Raw key/value persistence for preferences.
///
/// Writes are synchronous. Implementations use interior mutability so one
/// backend can be shared between the controller and its owner.
pub trait PreferenceBackend {
    /// Read the value stored at `key`.
    fn get(&self, key: &str) -> Option<serde_json::Value>;

    /// Store `value` at `key`, replacing any previous value.
    fn set(&self, key: &str, value: serde_json::Value) -> Result<(), PreferenceError>;

    /// Delete `key`. Deleting a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), PreferenceError>;
}

impl<T: PreferenceBackend + ?Sized> PreferenceBackend for Arc<T> {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: serde_json::Value) -> Result<(), PreferenceError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), PreferenceError> {
        (**self).remove(key)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Volatile backend, used by tests and when no file is configured.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    values: Mutex<BTreeMap<String, serde_json::Value>>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceBackend for MemoryBackend {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        lock(&self.values).get(key).cloned()
    }

    fn set(&self, key: &str, value: serde_json::Value) -> Result<(), PreferenceError> {
        lock(&self.values).insert(key.to_owned(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PreferenceError> {
        lock(&self.values).remove(key);
        Ok(())
    }
}

/// JSON-file backend scoped to one client.
///
/// The whole map is rewritten on every change through a temporary file and
/// a rename, so a crash never leaves a half-written file behind.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    values: Mutex<BTreeMap<String, serde_json::Value>>,
}

impl FileBackend {
    /// Open the preference file at `path`.
    ///
    /// A missing file starts empty. An unreadable or corrupt file is logged
    /// and also starts empty; the next write replaces it.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Ignoring corrupt preference file");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Preference file unreadable");
                BTreeMap::new()
            }
        };
        Self {
            path,
            values: Mutex::new(values),
        }
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, values: &BTreeMap<String, serde_json::Value>) -> Result<(), PreferenceError> {
        let text = serde_json::to_string_pretty(values)?;
        write_text_atomic(&self.path, &text)?;
        Ok(())
    }
}

impl PreferenceBackend for FileBackend {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        lock(&self.values).get(key).cloned()
    }

    fn set(&self, key: &str, value: serde_json::Value) -> Result<(), PreferenceError> {
        let mut values = lock(&self.values);
        values.insert(key.to_owned(), value);
        self.flush(&values)
    }

    fn remove(&self, key: &str) -> Result<(), PreferenceError> {
        let mut values = lock(&self.values);
        if values.remove(key).is_some() {
            self.flush(&values)?;
        }
        Ok(())
    }
}

fn write_text_atomic(path: &Path, text: &str) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("preferences.json");
    let tmp_path = path.with_file_name(format!("{file_name}.tmp"));
    fs::write(&tmp_path, text)?;

    if let Err(error) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(error);
    }
    Ok(())
}

/// Read an integer out of a value that may be a float or a numeric string.
///
/// Floats are floored, matching how older clients stored the speed slider.
pub(crate) fn lenient_integer(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(floor_to_i64)),
        serde_json::Value::String(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().and_then(floor_to_i64))
        }
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn floor_to_i64(raw: f64) -> Option<i64> {
    // Bounds keep the cast exact; NaN fails both comparisons.
    let floored = raw.floor();
    (-9.0e15..=9.0e15).contains(&floored).then_some(floored as i64)
}

fn lenient_bool(value: &serde_json::Value) -> Option<bool> {
    match value {
        serde_json::Value::Bool(b) => Some(*b),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Snapshot of all preferences, with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preferences {
    /// Speed multiplier for step batches.
    pub speed: SpeedMultiplier,
    /// Whether autosave is enabled.
    pub autosave: bool,
    /// Target generation for run-to-target mode.
    pub target_generation: Option<u64>,
    /// Last used simulation identity.
    pub last_identity: Option<SimulationId>,
}

/// Typed access to the preference keys over any [`PreferenceBackend`].
#[derive(Debug)]
pub struct PreferenceStore<B> {
    backend: B,
}

impl<B: PreferenceBackend> PreferenceStore<B> {
    /// Wrap a backend.
    pub const fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Borrow the raw backend.
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Raw read.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.backend.get(key)
    }

    /// Serialize and store a value.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), PreferenceError> {
        self.backend.set(key, serde_json::to_value(value)?)
    }

    /// Read every preference, falling back to `default_speed` when no valid
    /// speed is stored.
    pub fn load(&self, default_speed: SpeedMultiplier) -> Preferences {
        Preferences {
            speed: self.speed().unwrap_or(default_speed),
            autosave: self.autosave().unwrap_or(false),
            target_generation: self.target_generation(),
            last_identity: self.last_identity(),
        }
    }

    /// Persisted speed, if present and within range.
    pub fn speed(&self) -> Option<SpeedMultiplier> {
        self.get(keys::SPEED)
            .as_ref()
            .and_then(lenient_integer)
            .and_then(|raw| SpeedMultiplier::new(raw).ok())
    }

    /// Persist the speed multiplier.
    pub fn set_speed(&self, speed: SpeedMultiplier) -> Result<(), PreferenceError> {
        self.set(keys::SPEED, &speed.get())
    }

    /// Persisted autosave flag.
    pub fn autosave(&self) -> Option<bool> {
        self.get(keys::AUTOSAVE).as_ref().and_then(lenient_bool)
    }

    /// Persist the autosave flag.
    pub fn set_autosave(&self, enabled: bool) -> Result<(), PreferenceError> {
        self.set(keys::AUTOSAVE, &enabled)
    }

    /// Persisted target generation; negative values read as absent.
    pub fn target_generation(&self) -> Option<u64> {
        self.get(keys::TARGET_GENERATION)
            .as_ref()
            .and_then(lenient_integer)
            .and_then(|raw| u64::try_from(raw).ok())
    }

    /// Persist the target generation.
    pub fn set_target_generation(&self, target: u64) -> Result<(), PreferenceError> {
        self.set(keys::TARGET_GENERATION, &target)
    }

    /// Last used simulation identity.
    pub fn last_identity(&self) -> Option<SimulationId> {
        match self.get(keys::ACTIVE_SIMULATION)? {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(SimulationId::new(s)),
            _ => None,
        }
    }

    /// Remember the simulation identity for reload survival.
    pub fn set_last_identity(&self, id: &SimulationId) -> Result<(), PreferenceError> {
        self.set(keys::ACTIVE_SIMULATION, id.as_str())
    }

    /// Forget the remembered identity.
    pub fn forget_last_identity(&self) -> Result<(), PreferenceError> {
        self.backend.remove(keys::ACTIVE_SIMULATION)
    }

    /// Last cached snapshot, if it still parses.
    pub fn cached_snapshot(&self) -> Option<Snapshot> {
        self.get(keys::SNAPSHOT_CACHE)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    /// Cache a snapshot for offline fallback.
    pub fn cache_snapshot(&self, snapshot: &Snapshot) -> Result<(), PreferenceError> {
        self.set(keys::SNAPSHOT_CACHE, snapshot)
    }

    /// Drop the cached snapshot.
    pub fn clear_cached_snapshot(&self) -> Result<(), PreferenceError> {
        self.backend.remove(keys::SNAPSHOT_CACHE)
    }
}
