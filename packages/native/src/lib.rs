mod fs;
mod postgres;
mod sqlite;

pub use fs::FsStorage;
pub use postgres::PostgresDatabase;
pub use sqlite::SqliteDatabase;

use skiff_core::{Database, DatabaseConfig, Error, StorageConfig, StorageProvider};

/// Builds the configured database adapter. The configuration object is
/// constructed once at process start; there is no registry behind this.
pub fn open_database(config: &DatabaseConfig) -> Result<Box<dyn Database>, Error> {
    match config {
        DatabaseConfig::Sqlite {
            path,
            wal,
            busy_timeout_ms,
        } => Ok(Box::new(SqliteDatabase::open(path, *wal, *busy_timeout_ms)?)),
        DatabaseConfig::Postgres { url, pool } => {
            Ok(Box::new(PostgresDatabase::new(url.clone(), *pool)))
        }
        DatabaseConfig::Bridge => Err(Error::unsupported("native open_database", "bridge")),
    }
}

/// Builds the configured storage adapter.
pub fn open_storage(config: &StorageConfig) -> Result<Box<dyn StorageProvider>, Error> {
    match config {
        StorageConfig::LocalFs { root } => Ok(Box::new(FsStorage::new(root.clone())?)),
        StorageConfig::Bridge => Err(Error::unsupported("native open_storage", "bridge")),
    }
}
