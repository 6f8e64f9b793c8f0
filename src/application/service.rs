use futures::FutureExt;

use crate::domain::{
    Account, Cents, IntegrityReport, TransferPlan, build_integrity_report, format_cents,
    normalize_iban, plan_transfer, validate_amount,
};
use crate::storage::{Atomicity, Repository, UnitOfWork};

use super::AppError;

/// Application service providing deposits and transfers between accounts.
/// This is the primary interface for any client (CLI, API, tests).
pub struct LedgerService {
    repo: Repository,
}

/// Result of a committed transfer
#[derive(Debug)]
pub struct TransferResult {
    pub source: Account,
    pub destination: Account,
    pub amount: Cents,
}

impl LedgerService {
    /// Create a new ledger service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    // ========================
    // Account operations
    // ========================

    /// Open a new account with a zero balance.
    pub async fn create_account(&self, iban: &str) -> Result<Account, AppError> {
        let iban = normalize_iban(iban).ok_or(AppError::InvalidIban)?;

        if self.repo.find_by_iban(&iban).await?.is_some() {
            return Err(AppError::AccountAlreadyExists(iban));
        }

        let account = self.repo.create_account(&iban).await?;
        tracing::info!(iban = %account.iban, id = account.id, "account created");
        Ok(account)
    }

    /// Get an account by IBAN.
    pub async fn get_account(&self, iban: &str) -> Result<Account, AppError> {
        self.repo
            .find_by_iban(iban)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(iban.to_string()))
    }

    /// List all accounts.
    pub async fn list_accounts(&self) -> Result<Vec<Account>, AppError> {
        Ok(self.repo.list_accounts().await?)
    }

    // ========================
    // Balance operations
    // ========================

    /// Add `amount` to an account's balance.
    ///
    /// Deposits follow the same rule as transfers: the amount must be at
    /// least 0.01.
    pub async fn deposit(&self, iban: &str, amount: Cents) -> Result<Account, AppError> {
        validate_amount(amount)?;
        let iban = iban.to_string();

        let account = self
            .repo
            .in_unit_of_work(Atomicity::Atomic, move |unit| {
                async move {
                    let account = require_account(unit, &iban).await?;
                    let new_balance = account.credit(amount)?;
                    let new_total = unit
                        .total_deposited()
                        .await?
                        .checked_add(amount)
                        .ok_or_else(|| {
                            AppError::InvalidAmount(format!(
                                "depositing {} would overflow the ledger total",
                                format_cents(amount)
                            ))
                        })?;
                    let saved = unit.save(&account.with_balance(new_balance)).await?;
                    unit.set_total_deposited(new_total).await?;
                    Ok::<_, AppError>(saved)
                }
                .boxed()
            })
            .await?;

        tracing::info!(
            iban = %account.iban,
            amount = %format_cents(amount),
            balance = %format_cents(account.balance),
            "deposit committed"
        );
        Ok(account)
    }

    // ========================
    // Transfer operations
    // ========================

    /// Move `amount` from `source` to `destination` as one atomic unit of work.
    ///
    /// Either both balances change or neither does. `force_failure` injects a
    /// fault after the source has been written and before the destination is;
    /// the call then fails with [`AppError::SystemFailure`] and the source
    /// write is rolled back.
    pub async fn transfer(
        &self,
        source: &str,
        destination: &str,
        amount: Cents,
        force_failure: bool,
    ) -> Result<TransferResult, AppError> {
        self.execute_transfer(Atomicity::Atomic, source, destination, amount, force_failure)
            .await
    }

    /// Same as [`transfer`](Self::transfer) but every write commits on its own.
    ///
    /// UNSAFE: a fault between the two writes leaves the source debited and the
    /// destination not credited, destroying the transferred amount. This entry
    /// point exists only to demonstrate that defect.
    pub async fn transfer_unsafe(
        &self,
        source: &str,
        destination: &str,
        amount: Cents,
        force_failure: bool,
    ) -> Result<TransferResult, AppError> {
        tracing::warn!(
            source,
            destination,
            "running transfer without atomicity; a failure can lose money"
        );
        self.execute_transfer(
            Atomicity::AutoCommit,
            source,
            destination,
            amount,
            force_failure,
        )
        .await
    }

    async fn execute_transfer(
        &self,
        atomicity: Atomicity,
        source: &str,
        destination: &str,
        amount: Cents,
        force_failure: bool,
    ) -> Result<TransferResult, AppError> {
        validate_amount(amount)?;
        let source = source.to_string();
        let destination = destination.to_string();

        let result = self
            .repo
            .in_unit_of_work(atomicity, move |unit| {
                async move {
                    let source = require_account(unit, &source).await?;
                    let destination = require_account(unit, &destination).await?;
                    let plan = plan_transfer(source, destination, amount)?;
                    persist_transfer(unit, plan, force_failure).await
                }
                .boxed()
            })
            .await;

        match &result {
            Ok(done) => tracing::info!(
                source = %done.source.iban,
                destination = %done.destination.iban,
                amount = %format_cents(done.amount),
                ?atomicity,
                "transfer committed"
            ),
            Err(err) => tracing::debug!(error = %err, ?atomicity, "transfer aborted"),
        }
        result
    }

    // ========================
    // Integrity operations
    // ========================

    /// Compare the sum of all balances against everything ever deposited.
    pub async fn check_integrity(&self) -> Result<IntegrityReport, AppError> {
        let accounts = self.repo.list_accounts().await?;
        let total_deposited = self.repo.total_deposited().await?;
        Ok(build_integrity_report(&accounts, total_deposited))
    }
}

async fn require_account(unit: &mut UnitOfWork, iban: &str) -> Result<Account, AppError> {
    unit.find_by_iban(iban)
        .await?
        .ok_or_else(|| AppError::AccountNotFound(iban.to_string()))
}

/// Write the source, then the destination. With `force_failure` the second
/// write never happens.
async fn persist_transfer(
    unit: &mut UnitOfWork,
    plan: TransferPlan,
    force_failure: bool,
) -> Result<TransferResult, AppError> {
    let source = unit.save(&plan.source).await?;

    if force_failure {
        tracing::warn!(
            source = %source.iban,
            atomicity = ?unit.atomicity(),
            "simulated failure after debiting source"
        );
        return Err(AppError::SystemFailure(format!(
            "simulated failure after debiting {} and before crediting {}",
            source.iban, plan.destination.iban
        )));
    }

    let destination = unit.save(&plan.destination).await?;

    Ok(TransferResult {
        source,
        destination,
        amount: plan.amount,
    })
}
