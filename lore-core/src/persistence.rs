//! SQLite persistence for the LORE engine.
//!
//! Each world's [`LoreEngine`] state is serialised to JSON and stored in a
//! per-save SQLite database. The schema is intentionally simple:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS worlds (
//!     world_id   TEXT PRIMARY KEY,
//!     data       BLOB NOT NULL,
//!     updated_at TEXT NOT NULL,
//!     checksum   TEXT
//! );
//! ```
//!
//! - WAL mode for concurrent reads during gameplay.
//! - JSON inside a BLOB column keeps the schema stable while the engine's
//!   in-memory shape evolves (forward-compatible).
//! - Optional CRC-32 checksum detects save corruption.
//! - Backup support via SQLite's online-backup API.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use tracing::{debug, info, warn};

use crate::config::PersistenceConfig;
use crate::engine::LoreEngine;
use crate::error::{LoreError, Result};
use crate::types::WorldId;

// ---------------------------------------------------------------------------
// CRC-32 checksum helper
// ---------------------------------------------------------------------------

/// CRC-32 of `data` as a lowercase hex string.
fn crc32_hex(data: &[u8]) -> String {
    format!("{:08x}", crc32_compute(data))
}

/// CRC-32 (ISO 3309 / ITU-T V.42), reflected form.
fn crc32_compute(data: &[u8]) -> u32 {
    const POLY: u32 = 0xEDB8_8320;
    !data.iter().fold(u32::MAX, |crc, &byte| {
        (0..8).fold(crc ^ u32::from(byte), |c, _| {
            (c >> 1) ^ (POLY * (c & 1))
        })
    })
}

// ---------------------------------------------------------------------------
// SaveStore
// ---------------------------------------------------------------------------

/// Handle to an open SQLite database that stores per-world engine state.
///
/// # Usage
///
/// ```no_run
/// # use lore_core::persistence::SaveStore;
/// # use lore_core::config::PersistenceConfig;
/// # use lore_core::engine::LoreEngine;
/// # use lore_core::types::WorldId;
/// let store = SaveStore::open("world_save.db", &PersistenceConfig::default())?;
/// let world = WorldId::new();
/// let engine = LoreEngine::default();
/// store.save_world(&world, &engine)?;
/// let loaded = store.load_world(&world)?;
/// # Ok::<(), lore_core::error::LoreError>(())
/// ```
pub struct SaveStore {
    conn: Connection,
    config: PersistenceConfig,
    db_path: PathBuf,
}

impl std::fmt::Debug for SaveStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaveStore")
            .field("db_path", &self.db_path)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS worlds (
    world_id   TEXT PRIMARY KEY,
    data       BLOB NOT NULL,
    updated_at TEXT NOT NULL,
    checksum   TEXT
);";

impl SaveStore {
    /// Open (or create) an SQLite database at `path`.
    ///
    /// The schema is created if it does not exist. WAL mode is enabled when
    /// `config.wal_mode` is `true`.
    ///
    /// # Errors
    ///
    /// Returns [`LoreError::Database`] on SQLite failures.
    pub fn open<P: AsRef<Path>>(path: P, config: &PersistenceConfig) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(&db_path, flags)?;

        if config.wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;

        conn.execute_batch(SCHEMA)?;

        info!(
            path = %db_path.display(),
            wal = config.wal_mode,
            "LORE save store opened"
        );

        Ok(Self {
            conn,
            config: config.clone(),
            db_path,
        })
    }

    /// Open an in-memory database (useful for tests).
    ///
    /// # Errors
    ///
    /// Returns [`LoreError::Database`] on SQLite failures.
    pub fn open_in_memory(config: &PersistenceConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn,
            config: config.clone(),
            db_path: PathBuf::from(":memory:"),
        })
    }

    // ------------------------------------------------------------------
    // Core CRUD
    // ------------------------------------------------------------------

    /// Save (upsert) a world's engine state.
    ///
    /// The engine is serialised to JSON. If `config.checksum_enabled` is
    /// true, a CRC-32 of the JSON bytes is stored alongside the data.
    ///
    /// # Errors
    ///
    /// Returns [`LoreError::Serialization`] if JSON encoding fails, or
    /// [`LoreError::Database`] on SQLite failures.
    pub fn save_world(&self, world_id: &WorldId, engine: &LoreEngine) -> Result<()> {
        let start = Instant::now();

        let json =
            serde_json::to_vec(engine).map_err(|e| LoreError::Serialization(e.to_string()))?;

        let checksum = if self.config.checksum_enabled {
            Some(crc32_hex(&json))
        } else {
            None
        };

        let now = Utc::now().to_rfc3339();
        let id_str = world_id.0.to_string();

        self.conn.execute(
            "INSERT INTO worlds (world_id, data, updated_at, checksum)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(world_id) DO UPDATE SET
                data = excluded.data,
                updated_at = excluded.updated_at,
                checksum = excluded.checksum",
            params![id_str, json, now, checksum],
        )?;

        debug!(
            world = %world_id,
            facts = engine.fact_count(),
            beliefs = engine.knowledge_count(),
            bytes = json.len(),
            elapsed_us = start.elapsed().as_micros(),
            "Saved world state"
        );

        Ok(())
    }

    /// Load a world's engine state.
    ///
    /// Returns `None` if no row exists for the given world. If checksums
    /// are enabled and the stored checksum does not match, a warning is
    /// logged but the data is still returned.
    ///
    /// # Errors
    ///
    /// Returns [`LoreError::Serialization`] if JSON decoding fails, or
    /// [`LoreError::Database`] on SQLite failures.
    pub fn load_world(&self, world_id: &WorldId) -> Result<Option<LoreEngine>> {
        let start = Instant::now();
        let id_str = world_id.0.to_string();

        let mut stmt = self
            .conn
            .prepare_cached("SELECT data, checksum FROM worlds WHERE world_id = ?1")?;

        let result: Option<(Vec<u8>, Option<String>)> = stmt
            .query_row(params![id_str], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()?;

        let Some((data, stored_checksum)) = result else {
            return Ok(None);
        };

        if self.config.checksum_enabled {
            if let Some(ref expected) = stored_checksum {
                let actual = crc32_hex(&data);
                if *expected != actual {
                    warn!(
                        world = %world_id,
                        expected = %expected,
                        actual = %actual,
                        "Checksum mismatch — possible save corruption"
                    );
                }
            }
        }

        let engine: LoreEngine =
            serde_json::from_slice(&data).map_err(|e| LoreError::Serialization(e.to_string()))?;

        debug!(
            world = %world_id,
            facts = engine.fact_count(),
            elapsed_us = start.elapsed().as_micros(),
            "Loaded world state"
        );

        Ok(Some(engine))
    }

    /// Delete a world's saved state. Returns `true` if a row was deleted.
    ///
    /// # Errors
    ///
    /// Returns [`LoreError::Database`] on SQLite failures.
    pub fn delete_world(&self, world_id: &WorldId) -> Result<bool> {
        let id_str = world_id.0.to_string();
        let deleted = self
            .conn
            .execute("DELETE FROM worlds WHERE world_id = ?1", params![id_str])?;
        Ok(deleted > 0)
    }

    /// List all world IDs with saved state.
    ///
    /// # Errors
    ///
    /// Returns [`LoreError::Database`] on SQLite failures.
    pub fn list_worlds(&self) -> Result<Vec<WorldId>> {
        let mut stmt = self.conn.prepare_cached("SELECT world_id FROM worlds")?;

        let rows = stmt.query_map([], |row| {
            let id_str: String = row.get(0)?;
            Ok(id_str)
        })?;

        let mut worlds = Vec::new();
        for row in rows {
            let id_str = row?;
            if let Ok(uuid) = uuid::Uuid::parse_str(&id_str) {
                worlds.push(WorldId(uuid));
            } else {
                warn!(id = %id_str, "Skipping row with invalid UUID");
            }
        }

        Ok(worlds)
    }

    /// Total number of saved worlds.
    ///
    /// # Errors
    ///
    /// Returns [`LoreError::Database`] on SQLite failures.
    pub fn world_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM worlds", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    // ------------------------------------------------------------------
    // Backup
    // ------------------------------------------------------------------

    /// Back up the database to `dest_path` via SQLite's online-backup API.
    /// Safe to call while the database is being read and written.
    ///
    /// # Errors
    ///
    /// Returns [`LoreError::Database`] on SQLite failures, or
    /// [`LoreError::Io`] if the destination is not writable.
    pub fn backup<P: AsRef<Path>>(&self, dest_path: P) -> Result<()> {
        // Stepping in chunks with a pause lets writers get a word in.
        const PAGES_PER_STEP: std::ffi::c_int = 256;
        const STEP_PAUSE: std::time::Duration = std::time::Duration::from_millis(50);

        let start = Instant::now();
        let mut dest = Connection::open(dest_path.as_ref())?;
        rusqlite::backup::Backup::new(&self.conn, &mut dest)?
            .run_to_completion(PAGES_PER_STEP, STEP_PAUSE, None)?;

        info!(
            dest = %dest_path.as_ref().display(),
            elapsed_ms = start.elapsed().as_millis(),
            "Database backup completed"
        );
        Ok(())
    }

    /// Create a numbered backup alongside the database file, rotating old
    /// backups so that at most `config.backup_count` are kept.
    ///
    /// # Errors
    ///
    /// Returns [`LoreError::Database`] or [`LoreError::Io`] on failure.
    pub fn create_rotating_backup(&self) -> Result<()> {
        let keep = self.config.backup_count;
        if keep == 0 || self.db_path.as_os_str() == ":memory:" {
            return Ok(());
        }

        // Slide slot n into n + 1, newest last, freeing slot 1.
        for n in (1..keep).rev() {
            let from = self.backup_path(n);
            if from.exists() {
                std::fs::rename(&from, self.backup_path(n + 1))?;
            }
        }
        // Drop any stray overflow slot left by a lowered keep count.
        let overflow = self.backup_path(keep + 1);
        if overflow.exists() {
            std::fs::remove_file(&overflow)?;
        }

        self.backup(self.backup_path(1))?;
        info!(keep, "Rotating backup created");
        Ok(())
    }

    /// Path to a numbered backup slot (e.g. `world_save.db.bak.1`).
    fn backup_path(&self, n: u32) -> PathBuf {
        let Some(name) = self.db_path.file_name() else {
            return self.db_path.with_file_name(format!("save.bak.{n}"));
        };
        let mut name = name.to_os_string();
        name.push(format!(".bak.{n}"));
        self.db_path.with_file_name(name)
    }

    // ------------------------------------------------------------------
    // Utility
    // ------------------------------------------------------------------

    /// The database file path (`:memory:` for in-memory stores).
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Run an integrity check on the database.
    ///
    /// Returns `Ok(true)` if the database passes, `Ok(false)` if corruption
    /// is detected.
    ///
    /// # Errors
    ///
    /// Returns [`LoreError::Database`] if the check query itself fails.
    pub fn integrity_check(&self) -> Result<bool> {
        let result: String = self
            .conn
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        Ok(result == "ok")
    }

    /// Reclaim unused space by running `VACUUM`.
    ///
    /// # Errors
    ///
    /// Returns [`LoreError::Database`] on SQLite failures.
    pub fn vacuum(&self) -> Result<()> {
        self.conn.execute_batch("VACUUM;")?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
