use std::path::PathBuf;

/// Path sentinel selecting an in-memory SQLite database.
pub const SQLITE_MEMORY_PATH: &str = ":memory:";

/// Pool limits for client-server backends. Embedded backends ignore this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub acquire_timeout_ms: u64,
    pub idle_timeout_ms: u64,
    pub max_lifetime_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout_ms: 5_000,
            idle_timeout_ms: 60_000,
            max_lifetime_ms: 30 * 60_000,
        }
    }
}

/// Backend selection for the database capability. Read once at startup.
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseConfig {
    Sqlite {
        /// File path, or [`SQLITE_MEMORY_PATH`].
        path: String,
        /// Write-ahead-log mode for file-backed databases.
        wal: bool,
        busy_timeout_ms: u64,
    },
    Postgres {
        url: String,
        pool: PoolConfig,
    },
    /// Everything goes through the host import surface.
    Bridge,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: SQLITE_MEMORY_PATH.to_string(),
            wal: false,
            busy_timeout_ms: 5_000,
        }
    }
}

/// Backend selection for the storage capability.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageConfig {
    LocalFs { root: PathBuf },
    Bridge,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::LocalFs {
            root: PathBuf::from("storage"),
        }
    }
}

/// The full data-layer configuration. Constructed once at process start and
/// passed by reference to every consumer; a process uses exactly one adapter
/// per capability for its lifetime.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataConfig {
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
}
