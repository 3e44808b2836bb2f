//! Persistent payroll store.
//!
//! All payroll data lives in SQLite behind a [`SqlitePool`]. The schema is
//! applied from `migrations/` on connect. Mutating operations go through
//! [`PayrollStore::begin`], which serializes writers and yields a database
//! transaction that is rolled back unless it is committed.

use std::ops::{Deref, DerefMut};
use std::str::FromStr;
use std::time::Duration;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, SqliteConnection, Transaction};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::error::{EngineError, EngineResult};
use crate::models::{Employee, PayrollBatch};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// The payroll database.
#[derive(Debug)]
pub struct PayrollStore {
    pool: SqlitePool,
    writer: Mutex<()>,
}

/// A write transaction holding the store's writer lock.
///
/// Dereferences to the underlying connection, so queries execute with
/// `&mut *tx`. Dropping it without [`commit`](Self::commit) rolls back.
pub struct StoreTransaction<'a> {
    tx: Transaction<'static, Sqlite>,
    _writer: MutexGuard<'a, ()>,
}

impl StoreTransaction<'_> {
    /// Commits every statement run in this transaction.
    pub async fn commit(self) -> EngineResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

impl Deref for StoreTransaction<'_> {
    type Target = SqliteConnection;

    fn deref(&self) -> &Self::Target {
        &self.tx
    }
}

impl DerefMut for StoreTransaction<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.tx
    }
}

impl PayrollStore {
    /// Opens (creating if needed) the configured database and applies
    /// pending migrations.
    pub async fn connect(config: &DatabaseConfig) -> EngineResult<Self> {
        info!(url = %config.url, "Connecting to payroll database");

        let options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    /// A private in-memory database, used by tests and benchmarks.
    ///
    /// The pool keeps exactly one connection alive, since each SQLite
    /// in-memory connection is its own database.
    pub async fn in_memory() -> EngineResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> EngineResult<Self> {
        MIGRATOR.run(&pool).await?;

        let store = Self {
            pool,
            writer: Mutex::new(()),
        };
        let mut tx = store.begin().await?;
        let batch = ensure_open_batch(&mut tx).await?;
        tx.commit().await?;
        debug!(batch_id = %batch.id, "Payroll store ready");
        Ok(store)
    }

    /// The connection pool, for reads.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Starts a write transaction.
    ///
    /// Writers are serialized so that SQLite never has to upgrade two
    /// competing read locks.
    pub async fn begin(&self) -> EngineResult<StoreTransaction<'_>> {
        let writer = self.writer.lock().await;
        let tx = self.pool.begin().await?;
        Ok(StoreTransaction {
            tx,
            _writer: writer,
        })
    }

    /// The batch currently collecting results.
    pub async fn open_batch(&self) -> EngineResult<PayrollBatch> {
        let mut conn = self.pool.acquire().await?;
        open_batch(&mut conn).await
    }

    /// Number of employees in the directory.
    pub async fn employee_count(&self) -> EngineResult<i64> {
        self.count("SELECT COUNT(*) FROM employees").await
    }

    /// Number of components waiting in the ledger.
    pub async fn ledger_len(&self) -> EngineResult<i64> {
        self.count("SELECT COUNT(*) FROM components").await
    }

    /// Number of results in the open batch.
    pub async fn open_result_count(&self) -> EngineResult<i64> {
        self.count(
            "SELECT COUNT(*) FROM payroll_results r
             JOIN payroll_batches b ON b.id = r.batch_id
             WHERE b.closed_at IS NULL",
        )
        .await
    }

    /// Number of archived results across all runs.
    pub async fn archived_count(&self) -> EngineResult<i64> {
        self.count("SELECT COUNT(*) FROM archived_payroll_results").await
    }

    async fn count(&self, query: &str) -> EngineResult<i64> {
        let count: i64 = sqlx::query_scalar(query).fetch_one(&self.pool).await?;
        Ok(count)
    }

    /// Closes the pool, waiting for connections to finish.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Loads the open batch.
pub(crate) async fn open_batch(conn: &mut SqliteConnection) -> EngineResult<PayrollBatch> {
    sqlx::query_as::<_, PayrollBatch>(
        "SELECT id, opened_at FROM payroll_batches WHERE closed_at IS NULL",
    )
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| EngineError::Database {
        message: "no open payroll batch".to_string(),
    })
}

/// Inserts a new open batch.
pub(crate) async fn insert_batch(
    conn: &mut SqliteConnection,
    batch: &PayrollBatch,
) -> EngineResult<()> {
    sqlx::query("INSERT INTO payroll_batches (id, opened_at) VALUES (?, ?)")
        .bind(batch.id)
        .bind(batch.opened_at)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn ensure_open_batch(conn: &mut SqliteConnection) -> EngineResult<PayrollBatch> {
    let existing = sqlx::query_as::<_, PayrollBatch>(
        "SELECT id, opened_at FROM payroll_batches WHERE closed_at IS NULL",
    )
    .fetch_optional(&mut *conn)
    .await?;

    match existing {
        Some(batch) => Ok(batch),
        None => {
            let batch = PayrollBatch::open(Utc::now());
            insert_batch(conn, &batch).await?;
            info!(batch_id = %batch.id, "Opened payroll batch");
            Ok(batch)
        }
    }
}

/// Loads one employee.
///
/// # Errors
///
/// Returns [`EngineError::NotFound`] if the employee does not exist.
pub(crate) async fn employee(
    conn: &mut SqliteConnection,
    employee_id: &str,
) -> EngineResult<Employee> {
    sqlx::query_as::<_, Employee>("SELECT * FROM employees WHERE employee_id = ?")
        .bind(employee_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| EngineError::not_found("Employee", employee_id))
}
