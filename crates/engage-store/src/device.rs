use std::path::{Path, PathBuf};
use std::{env, fs};

use engage_core::Persistence;

use crate::error::{Result, StoreError};
use crate::store::Store;

const SESSIONS_DIR: &str = "sessions";
const DEVICE_DB: &str = "device.db";
const CURRENT_SESSION: &str = "current-session";

/// Base directory for all engage storage: `$ENGAGE_DATA_DIR`, else `~/.engage`.
pub fn default_base_dir() -> PathBuf {
    if let Ok(dir) = env::var("ENGAGE_DATA_DIR")
        && !dir.trim().is_empty()
    {
        return PathBuf::from(dir);
    }
    dirs_home().join(".engage")
}

fn dirs_home() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Sanitize a session id for use as a filename.
fn sanitize_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn read_pointer(base: &Path) -> Option<String> {
    let raw = fs::read_to_string(base.join(CURRENT_SESSION)).ok()?;
    let id = sanitize_name(&raw);
    if id.is_empty() { None } else { Some(id) }
}

fn write_pointer(base: &Path, id: &str) -> Result<()> {
    fs::write(base.join(CURRENT_SESSION), format!("{id}\n"))?;
    Ok(())
}

fn ensure_layout(base: &Path) -> Result<PathBuf> {
    let sessions = base.join(SESSIONS_DIR);
    fs::create_dir_all(&sessions).map_err(|e| {
        StoreError::InvalidData(format!("failed to create {}: {e}", sessions.display()))
    })?;
    Ok(sessions)
}

/// Pick the session to open.
///
/// Priority chain:
/// 1. Explicit id (sanitized)
/// 2. The `current-session` pointer
/// 3. A fresh UUID, which becomes the pointer
fn resolve_session_id(explicit: Option<&str>, base: &Path) -> Result<String> {
    if let Some(name) = explicit {
        let sanitized = sanitize_name(name);
        if !sanitized.is_empty() {
            return Ok(sanitized);
        }
    }
    if let Some(id) = read_pointer(base) {
        return Ok(id);
    }
    let id = uuid::Uuid::new_v4().to_string();
    write_pointer(base, &id)?;
    tracing::info!(session = %id, "started new session");
    Ok(id)
}

/// Session-scoped and device-scoped stores for one simulated browser.
///
/// Layout:
/// ```text
/// ~/.engage/
/// ├── config.toml
/// ├── device.db
/// ├── current-session
/// └── sessions/
///     ├── <session-id>.db
///     └── ...
/// ```
pub struct DeviceStore {
    session: Store,
    device: Store,
    session_id: String,
}

impl DeviceStore {
    /// Open the session and device stores, creating directories as needed.
    /// `session`: explicit session id (overrides the pointer file).
    /// `base_dir`: override the base directory (for testing).
    pub fn open(session: Option<&str>, base_dir: Option<&Path>) -> Result<Self> {
        let base = base_dir.map(PathBuf::from).unwrap_or_else(default_base_dir);
        let sessions_dir = ensure_layout(&base)?;

        let session_id = resolve_session_id(session, &base)?;
        let session = Store::open(&sessions_dir.join(format!("{session_id}.db")))?;
        let device = Store::open(&base.join(DEVICE_DB))?;
        tracing::debug!(session = %session_id, base = %base.display(), "opened stores");

        Ok(Self {
            session,
            device,
            session_id,
        })
    }

    /// Open with in-memory stores (for testing).
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            session: Store::open_in_memory()?,
            device: Store::open_in_memory()?,
            session_id: "test".to_string(),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn session_store(&self) -> &Store {
        &self.session
    }

    pub fn device_store(&self) -> &Store {
        &self.device
    }

    /// Hand both stores to the persistence facade.
    pub fn into_persistence(self) -> Persistence {
        Persistence::new(self.session, self.device)
    }

    /// Mint a fresh session id and point at it. The previous session's
    /// database is left on disk.
    pub fn new_session(base_dir: Option<&Path>) -> Result<String> {
        let base = base_dir.map(PathBuf::from).unwrap_or_else(default_base_dir);
        ensure_layout(&base)?;
        let id = uuid::Uuid::new_v4().to_string();
        write_pointer(&base, &id)?;
        tracing::info!(session = %id, "started new session");
        Ok(id)
    }

    /// The id the pointer file names, if any.
    pub fn current_session(base_dir: Option<&Path>) -> Option<String> {
        let base = base_dir.map(PathBuf::from).unwrap_or_else(default_base_dir);
        read_pointer(&base)
    }

    /// Delete a session's database, as closing the tab would. Returns `true`
    /// if anything was removed.
    pub fn clear_session(id: &str, base_dir: Option<&Path>) -> Result<bool> {
        let base = base_dir.map(PathBuf::from).unwrap_or_else(default_base_dir);
        let id = sanitize_name(id);
        if id.is_empty() {
            return Err(StoreError::InvalidData("empty session id".to_string()));
        }
        let db = base.join(SESSIONS_DIR).join(format!("{id}.db"));
        let mut removed = false;
        for suffix in ["", "-wal", "-shm"] {
            let path = PathBuf::from(format!("{}{suffix}", db.display()));
            match fs::remove_file(&path) {
                Ok(()) => removed = true,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        tracing::info!(session = %id, removed, "cleared session");
        Ok(removed)
    }

    /// Session ids with a database on disk, sorted.
    pub fn list_sessions(base_dir: Option<&Path>) -> Result<Vec<String>> {
        let base = base_dir.map(PathBuf::from).unwrap_or_else(default_base_dir);
        let dir = base.join(SESSIONS_DIR);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids: Vec<String> = fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                name.strip_suffix(".db").map(str::to_string)
            })
            .collect();
        ids.sort();
        Ok(ids)
    }
}
