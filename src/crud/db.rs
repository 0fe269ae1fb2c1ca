use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::BackendError;
use crate::utils::get_data_dir;

pub const DB_FILE_NAME: &str = "studyflow.db";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct DB {
    pub(super) pool: SqlitePool,
}

impl DB {
    pub async fn new() -> anyhow::Result<Self> {
        let data_dir = get_data_dir()?;
        Ok(Self::open(&data_dir.join(DB_FILE_NAME)).await?)
    }

    pub async fn open(db_path: &Path) -> Result<Self, BackendError> {
        let options = SqliteConnectOptions::from_str(&db_path.to_string_lossy())?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        Self::connect(options, 5).await
    }

    async fn connect(options: SqliteConnectOptions, max_connections: u32) -> Result<Self, BackendError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }
}

#[cfg(test)]
impl DB {
    /// Every connection to `:memory:` is its own database, so keep just one.
    pub async fn new_in_memory() -> Result<Self, BackendError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        Self::connect(options, 1).await
    }
}
