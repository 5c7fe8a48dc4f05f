pub mod repository;

use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite_migration::{Migrations, M};

use crate::error::{Error, Result};
use crate::metrics::{AbsenceTotals, MetricConfig, MetricKey, OvertimeTotals};
use crate::period::Period;
use crate::source::{ConfigSource, FactSource};

/// Database wraps two `tokio_rusqlite::Connection` instances (writer + reader)
/// using WAL mode for concurrent access. The writer serializes writes via
/// `tokio_rusqlite`'s internal channel; the reader can proceed without blocking.
#[derive(Clone)]
pub struct Database {
    writer: tokio_rusqlite::Connection,
    reader: tokio_rusqlite::Connection,
}

impl Database {
    /// Default on-disk location, `~/.hrkpi/hrkpi.db`.
    pub fn default_path() -> Result<std::path::PathBuf> {
        let dir = dirs::home_dir()
            .ok_or_else(|| Error::Config("cannot determine home directory".into()))?
            .join(".hrkpi");
        Ok(dir.join("hrkpi.db"))
    }

    /// Open the database at the default path.
    pub async fn open() -> Result<Self> {
        Self::open_at(Self::default_path()?).await
    }

    /// Open the database at the given path, creating parent directories.
    pub async fn open_at(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| Error::Config(e.to_string()))?;
        }

        let writer = tokio_rusqlite::Connection::open(&path).await?;
        Self::init_writer(&writer).await?;

        let reader = tokio_rusqlite::Connection::open(&path).await?;
        Self::init_reader(&reader).await?;

        log::debug!("opened fact store at {}", path.display());
        Ok(Self { writer, reader })
    }

    /// Open an in-memory database (for testing).
    pub async fn open_memory() -> Result<Self> {
        let writer = tokio_rusqlite::Connection::open_in_memory().await?;
        Self::init_writer(&writer).await?;

        // For in-memory, we share the same connection for reader/writer
        // since in-memory DBs are per-connection.
        Ok(Self {
            reader: writer.clone(),
            writer,
        })
    }

    async fn init_writer(conn: &tokio_rusqlite::Connection) -> Result<()> {
        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode=WAL;\
                 PRAGMA foreign_keys=ON;\
                 PRAGMA busy_timeout=5000;",
            )
            .map_err(|e| e.to_string())?;
            let migrations = Migrations::new(vec![M::up(include_str!("migrations/001_initial.sql"))]);
            migrations.to_latest(conn).map_err(|e| e.to_string())?;
            Ok::<(), String>(())
        })
        .await
        .map_err(|e| Error::Migration(e.to_string()))
    }

    async fn init_reader(conn: &tokio_rusqlite::Connection) -> Result<()> {
        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode=WAL;\
                 PRAGMA foreign_keys=ON;\
                 PRAGMA busy_timeout=5000;",
            )?;
            Ok::<(), rusqlite::Error>(())
        })
        .await?;
        Ok(())
    }

    /// Get a reference to the writer connection.
    pub fn writer(&self) -> &tokio_rusqlite::Connection {
        &self.writer
    }

    /// Get a reference to the reader connection.
    pub fn reader(&self) -> &tokio_rusqlite::Connection {
        &self.reader
    }
}

#[async_trait]
impl FactSource for Database {
    async fn sum_absence(&self, company_id: i64, period: Period) -> Result<AbsenceTotals> {
        Ok(self
            .reader
            .call(move |conn| repository::sum_absence(conn, company_id, period))
            .await?)
    }

    async fn sum_overtime(&self, company_id: i64, period: Period) -> Result<OvertimeTotals> {
        Ok(self
            .reader
            .call(move |conn| repository::sum_overtime(conn, company_id, period))
            .await?)
    }

    async fn count_active_as_of(&self, company_id: i64, as_of: NaiveDate) -> Result<u64> {
        Ok(self
            .reader
            .call(move |conn| repository::count_active_as_of(conn, company_id, as_of))
            .await?)
    }

    async fn count_terminations_in_range(&self, company_id: i64, period: Period) -> Result<u64> {
        Ok(self
            .reader
            .call(move |conn| repository::count_terminations_in_range(conn, company_id, period))
            .await?)
    }

    async fn daily_headcounts(&self, company_id: i64, period: Period) -> Result<Vec<u64>> {
        Ok(self
            .reader
            .call(move |conn| repository::daily_headcounts(conn, company_id, period))
            .await?)
    }
}

#[async_trait]
impl ConfigSource for Database {
    async fn find_effective_config(
        &self,
        company_id: i64,
        metric: MetricKey,
        as_of: NaiveDate,
    ) -> Result<Option<MetricConfig>> {
        Ok(self
            .reader
            .call(move |conn| repository::find_effective_config(conn, company_id, metric, as_of))
            .await?)
    }
}
