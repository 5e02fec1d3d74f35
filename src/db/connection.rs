/// Database connection management
///
/// Opens the SQLite pool, creates the parent directory when needed and
/// brings the schema up to date before anyone touches the data.

use crate::config::StoreConfig;
use crate::db::migrations;
use crate::error::{Result, SoundboardError};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Maximum number of database connections in the pool
const MAX_CONNECTIONS: u32 = 5;

/// Database wrapper with connection pool
#[derive(Clone, Debug)]
pub struct Database {
    pool: Arc<SqlitePool>,
    db_path: Option<PathBuf>,
}

impl Database {
    /// Open the database described by `config`
    ///
    /// # Returns
    /// * `Ok(Database)` - Connected and migrated
    /// * `Err(SoundboardError::UnsupportedEnvironment)` - No usable location
    /// * `Err(SoundboardError::Storage)` - SQLite refused to open or migrate
    pub async fn open(config: &StoreConfig) -> Result<Self> {
        let started_at = Instant::now();
        let db_path = config.database_path()?;

        let result = match &db_path {
            Some(path) => Self::connect_file(path, config).await,
            None => Self::connect_memory(config).await,
        };

        match result {
            Ok(db) => {
                info!(
                    path = %db.describe(),
                    duration_ms = started_at.elapsed().as_millis() as u64,
                    "database opened"
                );
                Ok(db)
            }
            Err(e) => {
                error!(error = %e, "database open failed");
                Err(e)
            }
        }
    }

    async fn connect_file(path: &Path, config: &StoreConfig) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    SoundboardError::UnsupportedEnvironment(format!(
                        "cannot create {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .busy_timeout(config.busy_timeout)
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await?;

        Self::bootstrap(pool, Some(path.to_path_buf())).await
    }

    async fn connect_memory(config: &StoreConfig) -> Result<Self> {
        // Every in-memory connection is its own database, so keep exactly one
        // alive for the lifetime of the pool
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?
            .busy_timeout(config.busy_timeout)
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::bootstrap(pool, None).await
    }

    async fn bootstrap(pool: SqlitePool, db_path: Option<PathBuf>) -> Result<Self> {
        if let Err(e) = migrations::apply_migrations(&pool).await {
            pool.close().await;
            return Err(e);
        }

        Ok(Self {
            pool: Arc::new(pool),
            db_path,
        })
    }

    /// Create a test database in memory
    ///
    /// Used for testing. Creates a fresh database for each test.
    #[cfg(test)]
    pub async fn new_test() -> Result<Self> {
        Self::open(&StoreConfig::in_memory()).await
    }

    /// Get reference to the connection pool
    ///
    /// Used internally by query modules.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Whether `close()` has been called on this pool
    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    /// Whether two handles point at the same pool
    pub fn shares_pool_with(&self, other: &Database) -> bool {
        Arc::ptr_eq(&self.pool, &other.pool)
    }

    /// Get the database file path (`None` for in-memory databases)
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn describe(&self) -> String {
        self.db_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| ":memory:".to_string())
    }

    /// Close all connections in the pool
    ///
    /// Should be called on application shutdown.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Get database statistics
    pub async fn stats(&self) -> Result<DatabaseStats> {
        let category_count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM categories")
            .fetch_one(self.pool())
            .await?;

        let item_count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM items")
            .fetch_one(self.pool())
            .await?;

        Ok(DatabaseStats {
            total_categories: category_count.0,
            total_items: item_count.0,
            schema_version: migrations::current_version(self.pool()).await?,
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseStats {
    pub total_categories: i64,
    pub total_items: i64,
    pub schema_version: i64,
}
