//! Database Connection Management
//!
//! This module provides the database connection and schema initialization for
//! the relational category store, using libsql (embedded, SQLite-compatible).
//!
//! # Architecture
//!
//! - **Path-agnostic**: Accepts any valid PathBuf
//! - **One relation**: `category (id, parent_id, name, description, icon, root_id, "left", "right")`
//! - **WAL mode**: Write-Ahead Logging so readers never wait for writers
//! - **Busy timeout**: Writers queue on the database write lock instead of failing
//!
//! # Connection Pattern
//!
//! Every store call opens its own connection with `connect_with_timeout()` and
//! drops it before returning; no connection is shared between calls.
//!
//! ```no_run
//! # use catalog_core::db::DatabaseService;
//! # use std::path::PathBuf;
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let db_service = DatabaseService::new(PathBuf::from("./data/catalog.db")).await?;
//! let conn = db_service.connect_with_timeout().await?;
//! # Ok(())
//! # }
//! ```

use crate::db::error::DatabaseError;
use libsql::{Builder, Database};
use std::path::PathBuf;
use std::sync::Arc;

/// Busy timeout applied to every connection unless configured otherwise
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// Database service for managing the libsql database and schema
///
/// # Examples
///
/// ```no_run
/// use catalog_core::db::DatabaseService;
/// use std::path::PathBuf;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let db_path = PathBuf::from("/path/to/catalog.db");
///     let db_service = DatabaseService::new(db_path).await?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseService {
    /// libsql database handle (wrapped in Arc for sharing)
    pub db: Arc<Database>,

    /// Path to the database file
    pub db_path: PathBuf,

    busy_timeout_ms: u64,
}

impl DatabaseService {
    /// Create a new DatabaseService with the specified database path
    ///
    /// This will:
    /// 1. Ensure the parent directory exists (create if needed)
    /// 2. Open/create the database file
    /// 3. Initialize the schema (CREATE TABLE IF NOT EXISTS)
    /// 4. Seed the identity sequence from existing rows
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if:
    /// - Parent directory cannot be created
    /// - Database connection fails
    /// - Schema initialization fails
    pub async fn new(db_path: PathBuf) -> Result<Self, DatabaseError> {
        Self::with_busy_timeout(db_path, DEFAULT_BUSY_TIMEOUT_MS).await
    }

    /// Same as [`DatabaseService::new`] with an explicit busy timeout
    pub async fn with_busy_timeout(
        db_path: PathBuf,
        busy_timeout_ms: u64,
    ) -> Result<Self, DatabaseError> {
        if db_path.as_os_str().is_empty() || db_path.is_dir() {
            return Err(DatabaseError::invalid_path(db_path));
        }

        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::PermissionDenied {
                        DatabaseError::permission_denied(db_path.clone())
                    } else {
                        DatabaseError::DirectoryCreationFailed(e)
                    }
                })?;
            }
        }

        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| DatabaseError::connection_failed(db_path.clone(), e))?;

        let service = Self {
            db: Arc::new(db),
            db_path,
            busy_timeout_ms,
        };

        service.initialize_schema().await?;

        Ok(service)
    }

    /// Execute a PRAGMA statement
    ///
    /// PRAGMA statements return rows, so we must use query() instead of execute().
    async fn execute_pragma(
        &self,
        conn: &libsql::Connection,
        pragma: &str,
    ) -> Result<(), DatabaseError> {
        let mut stmt = conn.prepare(pragma).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        let _ = stmt.query(()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        Ok(())
    }

    /// Initialize database schema and configuration
    ///
    /// Idempotent: safe to call on an existing database.
    ///
    /// # Schema
    ///
    /// - `category`: one row per category; `name` holds the JSON-encoded
    ///   display name, mnemonic and alias
    /// - `idx_category_root_left`: containment queries scan one tree in left order
    /// - `idx_category_parent`: parent lookups
    /// - `category_sequence`: identity sequence behind `next_identity`
    async fn initialize_schema(&self) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        self.execute_pragma(&conn, "PRAGMA journal_mode = WAL")
            .await?;

        conn.execute(
            r#"CREATE TABLE IF NOT EXISTS category (
                id INTEGER PRIMARY KEY,
                parent_id INTEGER NOT NULL,
                name JSON NOT NULL,
                description TEXT,
                icon TEXT,
                root_id INTEGER NOT NULL,
                "left" INTEGER NOT NULL,
                "right" INTEGER NOT NULL
            )"#,
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::initialization_failed(format!("Failed to create category table: {}", e))
        })?;

        let indexes = [
            r#"CREATE INDEX IF NOT EXISTS idx_category_root_left ON category(root_id, "left")"#,
            "CREATE INDEX IF NOT EXISTS idx_category_parent ON category(parent_id)",
        ];
        for statement in indexes {
            conn.execute(statement, ()).await.map_err(|e| {
                DatabaseError::initialization_failed(format!("Failed to create index: {}", e))
            })?;
        }

        conn.execute(
            "CREATE TABLE IF NOT EXISTS category_sequence (
                name TEXT PRIMARY KEY,
                value INTEGER NOT NULL
            )",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::initialization_failed(format!("Failed to create sequence table: {}", e))
        })?;

        // Existing data keeps its ids; the sequence starts after the largest one
        conn.execute(
            "INSERT OR IGNORE INTO category_sequence (name, value)
             SELECT 'category', COALESCE(MAX(id), 0) FROM category",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::initialization_failed(format!("Failed to seed sequence: {}", e))
        })?;

        tracing::info!(path = %self.db_path.display(), "Category schema initialized");
        Ok(())
    }

    /// Get a connection without the busy timeout
    ///
    /// Only for single-threaded, synchronous contexts; store code uses
    /// `connect_with_timeout()`.
    pub fn connect(&self) -> Result<libsql::Connection, DatabaseError> {
        self.db.connect().map_err(DatabaseError::LibsqlError)
    }

    /// Get a connection with the configured busy timeout
    ///
    /// Concurrent writers wait up to the timeout for the database write lock
    /// instead of failing immediately with `SQLITE_BUSY`.
    pub async fn connect_with_timeout(&self) -> Result<libsql::Connection, DatabaseError> {
        let conn = self.connect()?;
        self.execute_pragma(&conn, &format!("PRAGMA busy_timeout = {}", self.busy_timeout_ms))
            .await?;
        Ok(conn)
    }

    pub fn busy_timeout_ms(&self) -> u64 {
        self.busy_timeout_ms
    }

    /// Flush the WAL into the main database file
    ///
    /// Call before shutdown or before copying the database file.
    pub async fn db_close(&self) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        self.execute_pragma(&conn, "PRAGMA wal_checkpoint(TRUNCATE)")
            .await?;
        Ok(())
    }
}
