use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqliteConnection, Transaction};

use crate::domain::{Account, Cents};

/// How the writes of a unit of work reach the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Atomicity {
    /// All writes commit together or not at all.
    Atomic,
    /// Every write commits on its own. A failure halfway leaves earlier
    /// writes in place; only used to demonstrate that defect.
    AutoCommit,
}

/// A sequence of store operations sharing one commit boundary.
///
/// Obtained from [`Repository::begin`](super::Repository::begin) or, more
/// usually, through [`Repository::in_unit_of_work`](super::Repository::in_unit_of_work).
pub enum UnitOfWork {
    Atomic(Transaction<'static, Sqlite>),
    AutoCommit(PoolConnection<Sqlite>),
}

impl UnitOfWork {
    pub fn atomicity(&self) -> Atomicity {
        match self {
            UnitOfWork::Atomic(_) => Atomicity::Atomic,
            UnitOfWork::AutoCommit(_) => Atomicity::AutoCommit,
        }
    }

    fn connection(&mut self) -> &mut SqliteConnection {
        match self {
            UnitOfWork::Atomic(tx) => &mut **tx,
            UnitOfWork::AutoCommit(conn) => &mut **conn,
        }
    }

    /// Look up an account by IBAN.
    pub async fn find_by_iban(&mut self, iban: &str) -> Result<Option<Account>> {
        fetch_account_by_iban(self.connection(), iban).await
    }

    /// Write the account's balance back and return the stored row.
    pub async fn save(&mut self, account: &Account) -> Result<Account> {
        let row = sqlx::query(
            r#"
            UPDATE accounts
            SET balance_cents = ?
            WHERE id = ?
            RETURNING id, iban, balance_cents, created_at
            "#,
        )
        .bind(account.balance)
        .bind(account.id)
        .fetch_optional(self.connection())
        .await
        .with_context(|| format!("Failed to save account {}", account.iban))?;

        match row {
            Some(row) => row_to_account(&row),
            None => anyhow::bail!("Account {} vanished while saving", account.iban),
        }
    }

    /// Running total of deposited money, as seen by this unit of work.
    pub async fn total_deposited(&mut self) -> Result<Cents> {
        fetch_total_deposited(self.connection()).await
    }

    /// Overwrite the running total of deposited money.
    pub async fn set_total_deposited(&mut self, total: Cents) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE ledger_totals
            SET value = ?
            WHERE name = 'total_deposited'
            "#,
        )
        .bind(total)
        .execute(self.connection())
        .await
        .context("Failed to update deposited total")?;
        Ok(())
    }

    pub async fn commit(self) -> Result<()> {
        match self {
            UnitOfWork::Atomic(tx) => {
                tx.commit().await.context("Failed to commit transaction")?;
                tracing::debug!("unit of work committed");
            }
            UnitOfWork::AutoCommit(_) => {
                tracing::debug!("auto-commit unit of work finished");
            }
        }
        Ok(())
    }

    /// Discard the writes of an atomic unit. In auto-commit mode the writes
    /// are already durable and nothing can be undone.
    pub async fn rollback(self) -> Result<()> {
        match self {
            UnitOfWork::Atomic(tx) => {
                tx.rollback()
                    .await
                    .context("Failed to roll back transaction")?;
                tracing::debug!("unit of work rolled back");
            }
            UnitOfWork::AutoCommit(_) => {
                tracing::warn!("auto-commit unit of work failed; earlier writes were kept");
            }
        }
        Ok(())
    }
}

pub(super) async fn fetch_account_by_iban(
    conn: &mut SqliteConnection,
    iban: &str,
) -> Result<Option<Account>> {
    let row = sqlx::query(
        r#"
        SELECT id, iban, balance_cents, created_at
        FROM accounts
        WHERE iban = ?
        "#,
    )
    .bind(iban)
    .fetch_optional(conn)
    .await
    .context("Failed to fetch account by IBAN")?;

    row.as_ref().map(row_to_account).transpose()
}

pub(super) async fn fetch_total_deposited(conn: &mut SqliteConnection) -> Result<Cents> {
    let row = sqlx::query("SELECT value FROM ledger_totals WHERE name = 'total_deposited'")
        .fetch_one(conn)
        .await
        .context("Failed to read deposited total")?;
    row.try_get("value")
        .context("Deposited total is not an integer")
}

pub(super) fn row_to_account(row: &SqliteRow) -> Result<Account> {
    let created_at_str: String = row.try_get("created_at")?;

    Ok(Account {
        id: row.try_get("id")?,
        iban: row.try_get("iban")?,
        balance: row
            .try_get("balance_cents")
            .context("Account balance is not an integer")?,
        created_at: DateTime::parse_from_rfc3339(&created_at_str)
            .context("Invalid created_at timestamp")?
            .with_timezone(&Utc),
    })
}
