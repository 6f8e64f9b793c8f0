// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use ibank::application::LedgerService;
use ibank::domain::Cents;
use tempfile::TempDir;

pub const IBAN_SOURCE: &str = "ES1320952591908522383887";
pub const IBAN_DESTINATION: &str = "ES3101284562156139923123";
pub const IBAN_UNKNOWN: &str = "ES1234567890";

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = LedgerService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Test fixture: a source and a destination account, both starting at zero
pub struct StandardAccounts;

impl StandardAccounts {
    pub async fn create(service: &LedgerService) -> Result<()> {
        service.create_account(IBAN_SOURCE).await?;
        service.create_account(IBAN_DESTINATION).await?;
        Ok(())
    }

    /// Create both accounts and fund the source
    pub async fn create_funded(service: &LedgerService, source_balance: Cents) -> Result<()> {
        Self::create(service).await?;
        service.deposit(IBAN_SOURCE, source_balance).await?;
        Ok(())
    }
}

/// Current (source, destination) balances
pub async fn balances(service: &LedgerService) -> Result<(Cents, Cents)> {
    let source = service.get_account(IBAN_SOURCE).await?;
    let destination = service.get_account(IBAN_DESTINATION).await?;
    Ok((source.balance, destination.balance))
}
