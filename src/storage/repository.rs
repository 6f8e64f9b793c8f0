use anyhow::{Context, Result};
use chrono::Utc;
use futures::future::BoxFuture;
use sqlx::{Row, SqlitePool};

use crate::domain::{Account, Cents};

use super::unit_of_work::{fetch_account_by_iban, fetch_total_deposited, row_to_account};
use super::{Atomicity, MIGRATION_001_INITIAL, UnitOfWork};

/// How atomic units of work acquire the database write lock.
///
/// SQLite transactions are serializable in both modes and, with
/// `read_uncommitted` off, never expose uncommitted rows to other connections.
/// The modes differ in what happens when two units touch the same accounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransactionMode {
    /// `BEGIN IMMEDIATE`: the write lock is taken when the unit starts. A
    /// second unit waits (up to the connection's busy timeout) until the
    /// first commits or rolls back, so concurrent transfers on the same
    /// account run one after the other.
    #[default]
    Immediate,
    /// `BEGIN DEFERRED`: the lock is taken on the first write. Two units that both read
    /// before writing can collide, and the later writer fails with a busy
    /// error instead of waiting. Nothing retries it.
    Deferred,
}

impl TransactionMode {
    pub fn begin_statement(&self) -> &'static str {
        match self {
            TransactionMode::Immediate => "BEGIN IMMEDIATE",
            TransactionMode::Deferred => "BEGIN DEFERRED",
        }
    }
}

/// Repository for persisting and querying accounts.
pub struct Repository {
    pool: SqlitePool,
    transaction_mode: TransactionMode,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            transaction_mode: TransactionMode::default(),
        }
    }

    pub fn with_transaction_mode(mut self, mode: TransactionMode) -> Self {
        self.transaction_mode = mode;
        self
    }

    /// Connect to a SQLite database.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    pub fn transaction_mode(&self) -> TransactionMode {
        self.transaction_mode
    }

    /// Whether connections may observe uncommitted writes of other connections.
    pub async fn reads_uncommitted(&self) -> Result<bool> {
        let row = sqlx::query("PRAGMA read_uncommitted")
            .fetch_one(&self.pool)
            .await
            .context("Failed to read isolation pragma")?;
        let flag: i64 = row.try_get(0).context("Unexpected isolation pragma value")?;
        Ok(flag != 0)
    }

    // ========================
    // Units of work
    // ========================

    /// Open a unit of work.
    pub async fn begin(&self, atomicity: Atomicity) -> Result<UnitOfWork> {
        let unit = match atomicity {
            Atomicity::Atomic => UnitOfWork::Atomic(
                self.pool
                    .begin_with(self.transaction_mode.begin_statement())
                    .await
                    .context("Failed to begin transaction")?,
            ),
            Atomicity::AutoCommit => UnitOfWork::AutoCommit(
                self.pool
                    .acquire()
                    .await
                    .context("Failed to acquire connection")?,
            ),
        };
        tracing::debug!(?atomicity, mode = ?self.transaction_mode, "unit of work started");
        Ok(unit)
    }

    /// Run `body` inside a unit of work: commit when it returns `Ok`, roll back
    /// when it returns `Err`. The body's error is returned unchanged; a failed
    /// rollback is logged rather than masking it.
    pub async fn in_unit_of_work<T, E, F>(&self, atomicity: Atomicity, body: F) -> Result<T, E>
    where
        F: for<'u> FnOnce(&'u mut UnitOfWork) -> BoxFuture<'u, Result<T, E>>,
        E: From<anyhow::Error>,
    {
        let mut unit = self.begin(atomicity).await?;
        match body(&mut unit).await {
            Ok(value) => {
                unit.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = unit.rollback().await {
                    tracing::error!(error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }

    // ========================
    // Account operations
    // ========================

    /// Insert a new account with a zero balance. The store assigns the ID.
    pub async fn create_account(&self, iban: &str) -> Result<Account> {
        let row = sqlx::query(
            r#"
            INSERT INTO accounts (iban, balance_cents, created_at)
            VALUES (?, 0, ?)
            RETURNING id, iban, balance_cents, created_at
            "#,
        )
        .bind(iban)
        .bind(Utc::now().to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("Failed to create account {}", iban))?;

        row_to_account(&row)
    }

    /// Look up an account by IBAN outside of any unit of work.
    pub async fn find_by_iban(&self, iban: &str) -> Result<Option<Account>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .context("Failed to acquire connection")?;
        fetch_account_by_iban(&mut conn, iban).await
    }

    /// List all accounts, ordered by IBAN.
    pub async fn list_accounts(&self) -> Result<Vec<Account>> {
        let rows = sqlx::query(
            r#"
            SELECT id, iban, balance_cents, created_at
            FROM accounts
            ORDER BY iban
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list accounts")?;

        rows.iter().map(row_to_account).collect()
    }

    /// Total money deposited into the ledger so far.
    pub async fn total_deposited(&self) -> Result<Cents> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .context("Failed to acquire connection")?;
        fetch_total_deposited(&mut conn).await
    }
}
