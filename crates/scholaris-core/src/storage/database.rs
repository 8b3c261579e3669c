//! SQLite database
//!
//! Owns the connection pool behind the knowledge base and chat history and
//! hands out the repositories that read and write them.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use tracing::debug;

use crate::config::Config;
use crate::infrastructure::{SqliteChatRepository, SqliteKnowledgeStore};
use crate::storage::migrations;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const MEMORY_PATH: &str = ":memory:";

/// How to open the database
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
    /// Apply pending migrations on open
    pub auto_migrate: bool,
    pub journal_mode: SqliteJournalMode,
    pub synchronous: SqliteSynchronous,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::with_path(default_database_path())
    }
}

impl DatabaseConfig {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            auto_migrate: true,
            journal_mode: SqliteJournalMode::Wal,
            synchronous: SqliteSynchronous::Normal,
        }
    }

    /// A private in-memory database; it lives as long as its single connection
    pub fn in_memory() -> Self {
        Self {
            max_connections: 1,
            ..Self::with_path(MEMORY_PATH)
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn no_migrate(mut self) -> Self {
        self.auto_migrate = false;
        self
    }

    fn is_memory(&self) -> bool {
        self.path.as_os_str() == MEMORY_PATH
    }

    fn connection_string(&self) -> String {
        if self.is_memory() {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{}?mode=rwc", self.path.display())
        }
    }
}

/// `scholaris.db` inside the configuration directory
pub fn default_database_path() -> PathBuf {
    Config::config_dir()
        .map(|dir| dir.join("scholaris.db"))
        .unwrap_or_else(|_| PathBuf::from("scholaris.db"))
}

/// Row counts reported by `scholaris doctor`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DatabaseStats {
    pub knowledge_entries: u64,
    pub embedded_entries: u64,
    pub chat_messages: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    config: DatabaseConfig,
}

impl Database {
    pub async fn new(config: DatabaseConfig) -> Result<Self> {
        if !config.is_memory() {
            if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory: {}", parent.display())
                })?;
            }
        }

        let options = SqliteConnectOptions::from_str(&config.connection_string())?
            .journal_mode(config.journal_mode)
            .synchronous(config.synchronous)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database: {}", config.path.display()))?;

        let db = Self { pool, config };
        if db.config.auto_migrate {
            db.migrate().await?;
        }
        debug!(path = %db.path().display(), "Database ready");
        Ok(db)
    }

    /// Open `scholaris.db` in the configuration directory
    pub async fn open_default() -> Result<Self> {
        Self::new(DatabaseConfig::default()).await
    }

    pub async fn in_memory() -> Result<Self> {
        Self::new(DatabaseConfig::in_memory()).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    pub fn knowledge_store(&self) -> SqliteKnowledgeStore {
        SqliteKnowledgeStore::new(self.pool.clone())
    }

    pub fn chat_repository(&self) -> SqliteChatRepository {
        SqliteChatRepository::new(self.pool.clone())
    }

    pub async fn migrate(&self) -> Result<()> {
        migrations::run_migrations(&self.pool)
            .await
            .context("Failed to run database migrations")
    }

    pub async fn migration_status(&self) -> Result<migrations::MigrationStatus> {
        migrations::migration_status(&self.pool)
            .await
            .context("Failed to check migration status")
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("Database health check failed")?;
        Ok(())
    }

    pub async fn stats(&self) -> Result<DatabaseStats> {
        let (knowledge, embedded): (i64, i64) =
            sqlx::query_as("SELECT COUNT(*), COUNT(embedding) FROM knowledge_entries")
                .fetch_one(&self.pool)
                .await
                .context("Failed to count knowledge entries")?;
        let (messages,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chat_messages")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count chat messages")?;

        Ok(DatabaseStats {
            knowledge_entries: u64::try_from(knowledge).unwrap_or_default(),
            embedded_entries: u64::try_from(embedded).unwrap_or_default(),
            chat_messages: u64::try_from(messages).unwrap_or_default(),
        })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
