//! Database location and connection settings.
//!
//! A database is chosen, in priority order, from a `.litequery.json` file in
//! the current directory, the `LITEQUERY_DATABASE_URL` or `DATABASE_URL`
//! environment variables, or the default `./litequery.sqlite`.
//!
//! ```json
//! {
//!   "database": { "type": "file", "path": "./app.sqlite" },
//!   "options": { "busy_timeout_ms": 2000, "journal_mode": "wal" }
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::connection::{Connection, OpenMode};
use crate::db::{DbError, Result};

/// Name of the configuration file looked up by [`ConfigFile::load_default`].
pub const CONFIG_FILE_NAME: &str = ".litequery.json";

/// Path used when nothing else is configured.
pub const DEFAULT_DATABASE: &str = "./litequery.sqlite";

const JOURNAL_MODES: &[&str] = &["DELETE", "TRUNCATE", "PERSIST", "MEMORY", "WAL", "OFF"];

/// Which database to open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DatabaseConfig {
    /// A database file; `mode` decides whether it may be created or written.
    File {
        path: PathBuf,
        #[serde(default)]
        mode: OpenMode,
    },
    /// Private in-memory database.
    Memory,
    /// Private on-disk database removed on close.
    Temporary,
}

/// Settings applied to every connection right after it opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionOptions {
    /// How long to retry on a locked database before failing with SQLITE_BUSY.
    pub busy_timeout_ms: u32,
    /// Enforce `REFERENCES` constraints.
    pub foreign_keys: bool,
    /// `PRAGMA journal_mode`, left as the database's own when unset.
    pub journal_mode: Option<String>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5000,
            foreign_keys: true,
            journal_mode: None,
        }
    }
}

impl ConnectionOptions {
    fn journal_mode(&self) -> Result<Option<String>> {
        match &self.journal_mode {
            None => Ok(None),
            Some(mode) => {
                let upper = mode.to_ascii_uppercase();
                if JOURNAL_MODES.contains(&upper.as_str()) {
                    Ok(Some(upper))
                } else {
                    Err(DbError::InvalidConfig {
                        message: format!(
                            "unknown journal_mode '{}', expected one of {}",
                            mode,
                            JOURNAL_MODES.join(", ")
                        ),
                    })
                }
            }
        }
    }
}

/// Contents of `.litequery.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub options: ConnectionOptions,
}

impl ConfigFile {
    /// Parse a configuration file.
    ///
    /// # Errors
    ///
    /// [`DbError::InvalidConfig`] when the file cannot be read or is not
    /// valid configuration JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| DbError::InvalidConfig {
            message: format!("Failed to read {}: {}", path.display(), e),
        })?;
        serde_json::from_str(&content).map_err(|e| DbError::InvalidConfig {
            message: format!("Invalid JSON in {}: {}", path.display(), e),
        })
    }

    /// Load `.litequery.json` from the current directory, `Ok(None)` when
    /// there is no such file.
    pub fn load_default() -> Result<Option<Self>> {
        let path = PathBuf::from(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(None);
        }
        Self::load(&path).map(Some)
    }
}

impl DatabaseConfig {
    /// Parse a connection URL or file path.
    ///
    /// - `:memory:` → [`DatabaseConfig::Memory`]
    /// - empty string → [`DatabaseConfig::Temporary`]
    /// - `sqlite://<path>`, optionally with `?mode=ro`, `?mode=rw` (file must
    ///   exist) or `?mode=rwc`
    /// - anything else is a file path
    pub fn from_url(url: &str) -> Result<Self> {
        if url == ":memory:" {
            return Ok(Self::Memory);
        }
        if url.is_empty() {
            return Ok(Self::Temporary);
        }
        let Some(rest) = url.strip_prefix("sqlite://") else {
            return Ok(Self::File {
                path: PathBuf::from(url),
                mode: OpenMode::ReadWriteCreate,
            });
        };
        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (rest, None),
        };
        if path == ":memory:" {
            return Ok(Self::Memory);
        }
        let mode = match query {
            None | Some("") | Some("mode=rwc") => OpenMode::ReadWriteCreate,
            Some("mode=rw") => OpenMode::ReadWrite,
            Some("mode=ro") => OpenMode::ReadOnly,
            Some(other) => {
                return Err(DbError::InvalidConfig {
                    message: format!("unsupported URL parameters '{}' in {}", other, url),
                });
            }
        };
        Ok(Self::File {
            path: PathBuf::from(path),
            mode,
        })
    }

    /// Configuration from `LITEQUERY_DATABASE_URL`, then `DATABASE_URL`.
    pub fn from_env() -> Result<Option<Self>> {
        for var in ["LITEQUERY_DATABASE_URL", "DATABASE_URL"] {
            if let Ok(url) = std::env::var(var) {
                debug!(var, "database configured from environment");
                return Self::from_url(&url).map(Some);
            }
        }
        Ok(None)
    }

    /// Resolve configuration from config file and environment.
    ///
    /// Priority: config file > environment > default (`./litequery.sqlite`).
    pub fn resolve() -> Result<Self> {
        if let Some(file) = ConfigFile::load_default()? {
            return Ok(file.database);
        }
        if let Some(config) = Self::from_env()? {
            return Ok(config);
        }
        Self::from_url(DEFAULT_DATABASE)
    }

    /// Open with default [`ConnectionOptions`].
    pub fn connect(&self) -> Result<Connection> {
        self.connect_with(&ConnectionOptions::default())
    }

    /// Open and apply `options`.
    pub fn connect_with(&self, options: &ConnectionOptions) -> Result<Connection> {
        let journal_mode = options.journal_mode()?;
        let (conn, read_only) = match self {
            Self::File { path, mode } => (
                Connection::open_with_flags(path, *mode)?,
                *mode == OpenMode::ReadOnly,
            ),
            Self::Memory => (Connection::open_in_memory()?, false),
            Self::Temporary => (Connection::open_temporary()?, false),
        };
        conn.set_busy_timeout(options.busy_timeout_ms)?;
        let foreign_keys = if options.foreign_keys { "ON" } else { "OFF" };
        conn.execute_batch(&format!("PRAGMA foreign_keys = {}", foreign_keys))?;
        if let Some(mode) = journal_mode {
            if !read_only {
                conn.execute_batch(&format!("PRAGMA journal_mode = {}", mode))?;
            }
        }
        debug!(config = ?self, "connected");
        Ok(conn)
    }
}
