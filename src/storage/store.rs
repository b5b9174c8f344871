//! JSON file storage layer for Flow Guardian
//!
//! Every file under the storage root is replaced atomically: content is
//! written to a temporary file in the same directory and renamed into
//! place, so a reader never sees a half-written file. Reads never fail;
//! missing or corrupt files degrade to a default value.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};

use super::models::{IndexEntry, Learning, Session, SessionPatch, Stats};
use super::search;

/// Largest collision counter appended to a generated id.
const MAX_ID_SUFFIX: u32 = 99;

/// Errors raised by storage writes.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem failure while writing.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A value could not be serialized to JSON.
    #[error("Failed to serialize {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// An id is already taken and would be overwritten.
    #[error("Id '{0}' already exists")]
    DuplicateId(String),

    /// `update_session` was given an unknown id.
    #[error("Session '{0}' not found")]
    SessionNotFound(String),

    /// A session id that cannot name a file inside `sessions/`.
    #[error("Invalid session id '{0}'")]
    InvalidId(String),

    /// A dotted config key was empty or had an empty segment.
    #[error("Invalid config key '{0}'")]
    InvalidKey(String),
}

/// Whether `id` names a single file directly under `sessions/`.
fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && !id.contains(['/', '\\']) && !id.contains("..")
}

/// Returns the default config document written by [`Store::init`].
pub fn default_config() -> Value {
    json!({
        "user": {
            "name": null
        },
        "backboard": {
            "api_key": null,
            "base_url": crate::team::DEFAULT_BACKBOARD_URL,
            "personal_thread_id": null,
            "team_thread_id": null
        },
        "settings": {
            "stale_threshold_days": crate::restore::DEFAULT_STALE_THRESHOLD_DAYS,
            "git_timeout_ms": crate::git::DEFAULT_TIMEOUT.as_millis() as u64,
            "ai_provider": null,
            "ai_api_key": null,
            "ai_model": null,
            "share_with_team": false
        }
    })
}

/// Serializes `value` as pretty JSON and atomically replaces `path`.
///
/// The previous content of `path` is untouched unless the final rename
/// succeeds.
pub fn atomic_write<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let content = serde_json::to_string_pretty(value).map_err(|source| StoreError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "data".to_string());
    let temp_path = path.with_file_name(format!(".{file_name}.{}.tmp", std::process::id()));

    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    let result = (|| -> std::io::Result<()> {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(content.as_bytes())?;
        file.write_all(b"\n")?;
        file.sync_all()?;
        drop(file);
        fs::rename(&temp_path, path)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&temp_path);
        return Err(io_err(e));
    }

    tracing::debug!("Wrote {}", path.display());
    Ok(())
}

/// Reads and parses `path`, returning `default` when the file is missing,
/// unreadable, or not valid JSON for `T`.
pub fn safe_read<T: DeserializeOwned>(path: &Path, default: T) -> T {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Could not read {}: {e}", path.display());
            }
            return default;
        }
    };

    match serde_json::from_str(&content) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Ignoring corrupt file {}: {e}", path.display());
            default
        }
    }
}

/// Formats the second-granularity id for `prefix` at `now`.
fn timestamp_id(prefix: &str, now: DateTime<Local>) -> String {
    format!("{prefix}_{}", now.format("%Y-%m-%d_%H-%M-%S"))
}

/// Picks the first free id derived from `base`.
///
/// `base` itself is tried first, then `base_01` through `base_99`. The
/// zero-padded counter keeps ids ordered by creation time.
fn unique_id(base: &str, taken: impl Fn(&str) -> bool) -> Result<String, StoreError> {
    if !taken(base) {
        return Ok(base.to_string());
    }
    for n in 1..=MAX_ID_SUFFIX {
        let candidate = format!("{base}_{n:02}");
        if !taken(&candidate) {
            return Ok(candidate);
        }
    }
    Err(StoreError::DuplicateId(base.to_string()))
}

/// Handle to a storage root on disk.
///
/// ```text
/// <root>/config.json
/// <root>/learnings.json
/// <root>/sessions/index.json
/// <root>/sessions/<id>.json
/// ```
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    /// Creates a handle for the given root. Nothing is touched on disk.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Opens the default storage root and initializes it.
    pub fn open_default() -> anyhow::Result<Self> {
        let store = Self::new(crate::config::storage_root()?);
        store.init()?;
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.root.join("sessions")
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.json")
    }

    pub fn index_path(&self) -> PathBuf {
        self.sessions_dir().join("index.json")
    }

    pub fn learnings_path(&self) -> PathBuf {
        self.root.join("learnings.json")
    }

    fn session_path(&self, id: &str) -> PathBuf {
        self.sessions_dir().join(format!("{id}.json"))
    }

    /// Creates the directory layout and seed files that are missing.
    ///
    /// Existing files are never rewritten, so calling this repeatedly
    /// leaves the tree unchanged.
    pub fn init(&self) -> Result<(), StoreError> {
        let sessions_dir = self.sessions_dir();
        fs::create_dir_all(&sessions_dir).map_err(|source| StoreError::Io {
            path: sessions_dir.clone(),
            source,
        })?;

        let config_path = self.config_path();
        if !config_path.exists() {
            atomic_write(&config_path, &default_config())?;
        }

        let empty: [Value; 0] = [];
        let index_path = self.index_path();
        if !index_path.exists() {
            atomic_write(&index_path, &empty)?;
        }

        let learnings_path = self.learnings_path();
        if !learnings_path.exists() {
            atomic_write(&learnings_path, &empty)?;
        }

        Ok(())
    }

    // ==================== Sessions ====================

    fn read_index(&self) -> Vec<IndexEntry> {
        safe_read(&self.index_path(), Vec::new())
    }

    /// Inserts or replaces the index entry for `session`.
    fn upsert_index(&self, session: &Session) -> Result<(), StoreError> {
        let mut index = self.read_index();
        let entry = session.index_entry();
        match index.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => *existing = entry,
            None => index.push(entry),
        }
        atomic_write(&self.index_path(), &index)
    }

    /// Persists a new session and indexes it. Returns the session id.
    ///
    /// A missing id or timestamp is filled in. A caller-supplied id that
    /// already exists is rejected with [`StoreError::DuplicateId`]; use
    /// [`Store::update_session`] to change a saved session.
    pub fn save_session(&self, session: &Session) -> Result<String, StoreError> {
        let sessions_dir = self.sessions_dir();
        fs::create_dir_all(&sessions_dir).map_err(|source| StoreError::Io {
            path: sessions_dir,
            source,
        })?;

        let mut session = session.clone();
        let now = Local::now();
        let index = self.read_index();
        let taken = |id: &str| self.session_path(id).exists() || index.iter().any(|e| e.id == id);

        if session.id.is_empty() {
            session.id = unique_id(&timestamp_id("session", now), taken)?;
        } else if !is_valid_id(&session.id) {
            return Err(StoreError::InvalidId(session.id));
        } else if taken(&session.id) {
            return Err(StoreError::DuplicateId(session.id));
        }
        if session.timestamp.is_empty() {
            session.timestamp = now.to_rfc3339();
        }

        atomic_write(&self.session_path(&session.id), &session)?;
        self.upsert_index(&session)?;

        tracing::info!("Saved session {}", session.id);
        Ok(session.id)
    }

    /// Applies `patch` to a saved session and rewrites its body and index
    /// entry.
    pub fn update_session(&self, id: &str, patch: SessionPatch) -> Result<Session, StoreError> {
        if !is_valid_id(id) {
            return Err(StoreError::InvalidId(id.to_string()));
        }
        let mut session = self
            .load_session(id)
            .ok_or_else(|| StoreError::SessionNotFound(id.to_string()))?;

        patch.apply(&mut session);

        atomic_write(&self.session_path(id), &session)?;
        self.upsert_index(&session)?;

        tracing::debug!("Updated session {id}");
        Ok(session)
    }

    /// Loads a session body by id.
    pub fn load_session(&self, id: &str) -> Option<Session> {
        if !is_valid_id(id) {
            return None;
        }
        let path = self.session_path(id);
        if !path.exists() {
            return None;
        }
        safe_read::<Option<Session>>(&path, None)
    }

    /// Returns the newest session, by id order.
    ///
    /// Index entries whose body is missing are skipped.
    pub fn latest_session(&self) -> Option<Session> {
        let mut ids: Vec<String> = self.read_index().into_iter().map(|e| e.id).collect();
        ids.sort_unstable_by(|a, b| b.cmp(a));
        ids.iter().find_map(|id| self.load_session(id))
    }

    /// Lists index entries newest first, optionally filtered to an exact
    /// branch and truncated to `limit`.
    pub fn list_sessions(&self, limit: Option<usize>, branch: Option<&str>) -> Vec<IndexEntry> {
        let mut entries: Vec<IndexEntry> = self
            .read_index()
            .into_iter()
            .filter(|e| branch.is_none_or(|b| e.branch.as_deref() == Some(b)))
            .collect();

        entries.sort_by(|a, b| b.id.cmp(&a.id));
        if let Some(limit) = limit {
            entries.truncate(limit);
        }
        entries
    }

    /// Rewrites the index from the session bodies on disk.
    ///
    /// Entries without a body are dropped and bodies without an entry are
    /// added. Returns `(added, removed)`.
    pub fn rebuild_index(&self) -> Result<(usize, usize), StoreError> {
        let sessions_dir = self.sessions_dir();
        let read_dir = fs::read_dir(&sessions_dir).map_err(|source| StoreError::Io {
            path: sessions_dir.clone(),
            source,
        })?;

        let mut rebuilt: Vec<IndexEntry> = read_dir
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension().is_some_and(|ext| ext == "json")
                    && path.file_stem().is_some_and(|stem| stem != "index")
            })
            .filter_map(|path| safe_read::<Option<Session>>(&path, None))
            .filter(|session| !session.id.is_empty())
            .map(|session| session.index_entry())
            .collect();
        rebuilt.sort_by(|a, b| a.id.cmp(&b.id));

        let old = self.read_index();
        let added = rebuilt
            .iter()
            .filter(|e| !old.iter().any(|o| o.id == e.id))
            .count();
        let removed = old
            .iter()
            .filter(|o| !rebuilt.iter().any(|e| e.id == o.id))
            .count();

        atomic_write(&self.index_path(), &rebuilt)?;
        tracing::info!("Rebuilt session index: {added} added, {removed} removed");
        Ok((added, removed))
    }

    // ==================== Learnings ====================

    fn read_learnings(&self) -> Vec<Learning> {
        safe_read(&self.learnings_path(), Vec::new())
    }

    /// Appends a learning to the collection. Returns its id.
    pub fn save_learning(&self, learning: &Learning) -> Result<String, StoreError> {
        let mut learnings = self.read_learnings();
        let mut learning = learning.clone();
        let now = Local::now();
        let taken = |id: &str| learnings.iter().any(|l| l.id == id);

        if learning.id.is_empty() {
            learning.id = unique_id(&timestamp_id("learning", now), taken)?;
        } else if taken(&learning.id) {
            return Err(StoreError::DuplicateId(learning.id));
        }
        if learning.timestamp.is_empty() {
            learning.timestamp = now.to_rfc3339();
        }

        let id = learning.id.clone();
        learnings.push(learning);
        atomic_write(&self.learnings_path(), &learnings)?;

        tracing::info!("Saved learning {id}");
        Ok(id)
    }

    /// Finds learnings whose text or tags contain `query`, in insertion
    /// order. See [`search::matches`].
    pub fn search_learnings(&self, query: &str, tags: Option<&[String]>) -> Vec<Learning> {
        self.read_learnings()
            .into_iter()
            .filter(|l| search::matches(l, query, tags))
            .collect()
    }

    /// Returns all learnings, optionally only team or only personal ones.
    pub fn all_learnings(&self, team: Option<bool>) -> Vec<Learning> {
        self.read_learnings()
            .into_iter()
            .filter(|l| team.is_none_or(|t| l.team == t))
            .collect()
    }

    // ==================== Config ====================

    /// Returns the full config document.
    pub fn config(&self) -> Value {
        safe_read(&self.config_path(), default_config())
    }

    /// Reads a value by dotted path, e.g. `backboard.team_thread_id`.
    pub fn config_value(&self, key: &str) -> Option<Value> {
        let config = self.config();
        key.split('.')
            .try_fold(&config, |node, segment| node.get(segment))
            .cloned()
    }

    /// Writes a value by dotted path, creating intermediate maps.
    pub fn set_config(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let segments: Vec<&str> = key.split('.').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(StoreError::InvalidKey(key.to_string()));
        }

        let mut config = self.config();
        set_dotted(&mut config, &segments, value);
        atomic_write(&self.config_path(), &config)?;

        tracing::debug!("Set config {key}");
        Ok(())
    }

    // ==================== Stats ====================

    pub fn stats(&self) -> Stats {
        let sessions_count = self.read_index().len();
        let learnings = self.read_learnings();
        let team_learnings = learnings.iter().filter(|l| l.team).count();

        Stats {
            sessions_count,
            personal_learnings: learnings.len() - team_learnings,
            team_learnings,
            total_learnings: learnings.len(),
        }
    }
}

/// Sets `segments` inside `node`, replacing any non-map on the way.
fn set_dotted(node: &mut Value, segments: &[&str], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };

    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    let Value::Object(map) = node else {
        return;
    };

    if rest.is_empty() {
        map.insert(first.to_string(), value);
    } else {
        let child = map.entry(first.to_string()).or_insert(Value::Null);
        set_dotted(child, rest, value);
    }
}
