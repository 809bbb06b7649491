use crate::{RoundStore, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use gm_core::RoundDocument;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Sqlite;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// Filesystem path of a file-backed SQLite URL.
fn database_path(url: &str) -> Option<&Path> {
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = path.split('?').next().unwrap_or(path);
    (!path.is_empty() && !path.starts_with(":memory:")).then(|| Path::new(path))
}

/// Open (creating if needed) the SQLite database at `url` and apply migrations.
pub async fn init_db(url: &str) -> Result<SqlitePool, StoreError> {
    if let Some(parent) = database_path(url)
        .and_then(Path::parent)
        .filter(|p| !p.as_os_str().is_empty())
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!(url, "document database ready");
    Ok(pool)
}

/// Round documents stored as JSON text in an append-only SQLite table.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        Ok(Self::new(init_db(url).await?))
    }

    /// Private in-memory database; one connection so every query sees it.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self::new(pool))
    }

    /// Number of stored documents for a game.
    pub async fn count(&self, game_id: &str) -> Result<i64, StoreError> {
        let n = sqlx::query_scalar::<Sqlite, i64>(
            "SELECT COUNT(*) FROM round_documents WHERE game_id = ?",
        )
        .bind(game_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(n)
    }
}

#[async_trait]
impl RoundStore for SqliteStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn pull_latest(&self, game_id: &str) -> Result<Option<RoundDocument>, StoreError> {
        let row = sqlx::query_scalar::<Sqlite, String>(
            "SELECT document FROM round_documents WHERE game_id = ? \
             ORDER BY round_id DESC, seq DESC LIMIT 1",
        )
        .bind(game_id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(text) => {
                let doc: RoundDocument = serde_json::from_str(&text)?;
                debug!(game_id, round_id = doc.round_id, "pulled latest round");
                Ok(Some(doc))
            }
            None => Ok(None),
        }
    }

    async fn push_new(&self, doc: &RoundDocument) -> Result<(), StoreError> {
        let text = serde_json::to_string(doc)?;
        let round_id = i64::try_from(doc.round_id).unwrap_or(i64::MAX);
        sqlx::query(
            "INSERT INTO round_documents (game_id, round_id, document, uploaded_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(&doc.game_id)
        .bind(round_id)
        .bind(text)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        info!(game_id = %doc.game_id, round_id = doc.round_id, "inserted round document");
        Ok(())
    }
}
