use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::application::{AppError, LedgerService};
use crate::domain::{Account, format_cents, parse_cents, total_balance};

/// ibank - Bank Account Ledger
#[derive(Parser)]
#[command(name = "ibank")]
#[command(about = "A bank-account ledger with atomic transfers between IBAN accounts")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "IBANK_DATABASE", default_value = "ibank.db")]
    pub database: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log filter directive (e.g. "ibank=debug"); overrides --verbose
    #[arg(long, env = "IBANK_LOG", global = true)]
    pub log_filter: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Account management commands
    #[command(subcommand)]
    Account(AccountCommands),

    /// Deposit money into an account
    Deposit {
        /// Account IBAN
        iban: String,

        /// Amount to deposit (e.g., "100.00" or "100")
        #[arg(allow_negative_numbers = true)]
        amount: String,
    },

    /// Transfer money between two accounts
    Transfer {
        /// Amount to transfer (e.g., "10.00" or "10")
        #[arg(allow_negative_numbers = true)]
        amount: String,

        /// Source account IBAN
        #[arg(long)]
        from: String,

        /// Destination account IBAN
        #[arg(long)]
        to: String,

        /// Inject a failure after the source is debited
        #[arg(long)]
        simulate_failure: bool,

        /// Run without a transaction (a failure can lose money)
        #[arg(long = "unsafe")]
        non_atomic: bool,
    },

    /// Show balance for an account or all accounts
    Balance {
        /// Account IBAN (omit for all accounts)
        iban: Option<String>,
    },

    /// Verify that no money was lost or created
    Check,
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Open a new account with a zero balance
    Create {
        /// Account IBAN (must be unique)
        iban: String,
    },

    /// List all accounts
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show detailed account information
    Show {
        /// Account IBAN
        iban: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    /// Tracing filter derived from the flags: an explicit filter wins, then
    /// --verbose, then warnings only.
    pub fn log_directive(&self) -> String {
        match (&self.log_filter, self.verbose) {
            (Some(filter), _) => filter.clone(),
            (None, true) => "warn,ibank=debug".to_string(),
            (None, false) => "warn".to_string(),
        }
    }

    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Init => {
                LedgerService::init(&self.database).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Account(account_cmd) => {
                let service = LedgerService::connect(&self.database).await?;
                run_account_command(&service, account_cmd).await?;
            }

            Commands::Deposit { iban, amount } => {
                let service = LedgerService::connect(&self.database).await?;
                let amount_cents =
                    parse_cents(&amount).context("Invalid amount format. Use '100.00' or '100'")?;

                let account = service.deposit(&iban, amount_cents).await?;
                println!(
                    "Deposited {} into {} (balance {})",
                    format_cents(amount_cents),
                    account.iban,
                    format_cents(account.balance)
                );
            }

            Commands::Transfer {
                amount,
                from,
                to,
                simulate_failure,
                non_atomic,
            } => {
                let service = LedgerService::connect(&self.database).await?;
                let amount_cents =
                    parse_cents(&amount).context("Invalid amount format. Use '10.00' or '10'")?;

                let outcome = if non_atomic {
                    service
                        .transfer_unsafe(&from, &to, amount_cents, simulate_failure)
                        .await
                } else {
                    service
                        .transfer(&from, &to, amount_cents, simulate_failure)
                        .await
                };

                match outcome {
                    Ok(result) => println!(
                        "Transferred {} {} -> {} (balances {} / {})",
                        format_cents(result.amount),
                        result.source.iban,
                        result.destination.iban,
                        format_cents(result.source.balance),
                        format_cents(result.destination.balance)
                    ),
                    Err(err @ AppError::SystemFailure(_)) => {
                        print_transfer_aftermath(&service, &from, &to).await?;
                        return Err(err.into());
                    }
                    Err(err) => return Err(err.into()),
                }
            }

            Commands::Balance { iban } => {
                let service = LedgerService::connect(&self.database).await?;
                run_balance_command(&service, iban).await?;
            }

            Commands::Check => {
                let service = LedgerService::connect(&self.database).await?;
                run_check_command(&service).await?;
            }
        }

        Ok(())
    }
}

async fn run_account_command(service: &LedgerService, cmd: AccountCommands) -> Result<()> {
    match cmd {
        AccountCommands::Create { iban } => {
            let account = service.create_account(&iban).await?;
            println!("Created account: {} (id {})", account.iban, account.id);
        }

        AccountCommands::List { json } => {
            let accounts = service.list_accounts().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&accounts)?);
            } else if accounts.is_empty() {
                println!("No accounts found.");
            } else {
                println!("{:<6} {:<34} {:>14}", "ID", "IBAN", "BALANCE");
                println!("{}", "-".repeat(56));
                for account in accounts {
                    print_account_row(&account);
                }
            }
        }

        AccountCommands::Show { iban, json } => {
            let account = service.get_account(&iban).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&account)?);
            } else {
                println!("Account: {}", account.iban);
                println!("  ID:       {}", account.id);
                println!("  Balance:  {}", format_cents(account.balance));
                println!(
                    "  Created:  {}",
                    account.created_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
    }
    Ok(())
}

async fn run_balance_command(service: &LedgerService, iban: Option<String>) -> Result<()> {
    match iban {
        Some(iban) => {
            let account = service.get_account(&iban).await?;
            println!("{}: {}", account.iban, format_cents(account.balance));
        }
        None => {
            let accounts = service.list_accounts().await?;
            if accounts.is_empty() {
                println!("No accounts found.");
            } else {
                println!("{:<6} {:<34} {:>14}", "ID", "IBAN", "BALANCE");
                println!("{}", "-".repeat(56));
                for account in &accounts {
                    print_account_row(account);
                }
                let total = total_balance(&accounts)
                    .map(format_cents)
                    .unwrap_or_else(|| "overflow".to_string());
                println!("{}", "-".repeat(56));
                println!("{:<41} {:>14}", "Total", total);
            }
        }
    }
    Ok(())
}

async fn run_check_command(service: &LedgerService) -> Result<()> {
    println!("Checking ledger integrity...\n");

    let report = service.check_integrity().await?;

    println!("Accounts:  {}", report.account_count);
    println!("Deposited: {:>14}", format_cents(report.total_deposited));
    println!(
        "Balances:  {:>14}  {}",
        format_cents(report.total_balance),
        if report.is_conserved() {
            "OK"
        } else {
            "UNBALANCED!"
        }
    );
    println!();

    if report.is_healthy() {
        println!("Ledger is consistent.");
    } else {
        println!("Issues found:");
        for issue in &report.issues {
            println!("  - {}", issue);
        }
        anyhow::bail!("Ledger integrity check failed");
    }

    Ok(())
}

/// After a failed transfer, show what actually landed in the database.
async fn print_transfer_aftermath(service: &LedgerService, from: &str, to: &str) -> Result<()> {
    let source = service.get_account(from).await?;
    let destination = service.get_account(to).await?;
    eprintln!(
        "After failure: {} = {}, {} = {}",
        source.iban,
        format_cents(source.balance),
        destination.iban,
        format_cents(destination.balance)
    );
    Ok(())
}

fn print_account_row(account: &Account) {
    println!(
        "{:<6} {:<34} {:>14}",
        account.id,
        truncate(&account.iban, 34),
        format_cents(account.balance)
    );
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_transfer_flags() {
        let cli = Cli::try_parse_from([
            "ibank",
            "--database",
            "test.db",
            "transfer",
            "10",
            "--from",
            "ES1",
            "--to",
            "ES2",
            "--simulate-failure",
            "--unsafe",
        ])
        .unwrap();

        assert_eq!(cli.database, "test.db");
        match cli.command {
            Commands::Transfer {
                amount,
                from,
                to,
                simulate_failure,
                non_atomic,
            } => {
                assert_eq!(amount, "10");
                assert_eq!(from, "ES1");
                assert_eq!(to, "ES2");
                assert!(simulate_failure);
                assert!(non_atomic);
            }
            _ => panic!("expected transfer command"),
        }
    }

    #[test]
    fn test_transfer_is_atomic_by_default() {
        let cli =
            Cli::try_parse_from(["ibank", "transfer", "10", "--from", "A", "--to", "B"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Transfer {
                non_atomic: false,
                simulate_failure: false,
                ..
            }
        ));
    }

    #[test]
    fn test_negative_amounts_parse_as_values() {
        let cli =
            Cli::try_parse_from(["ibank", "transfer", "-5", "--from", "A", "--to", "B"]).unwrap();
        assert!(matches!(cli.command, Commands::Transfer { amount, .. } if amount == "-5"));

        let cli = Cli::try_parse_from(["ibank", "deposit", "ES1", "-0.50"]).unwrap();
        assert!(matches!(cli.command, Commands::Deposit { amount, .. } if amount == "-0.50"));
    }

    fn check_cli(verbose: bool, log_filter: Option<&str>) -> Cli {
        Cli {
            database: "test.db".to_string(),
            verbose,
            log_filter: log_filter.map(str::to_string),
            command: Commands::Check,
        }
    }

    #[test]
    fn test_log_directive() {
        assert_eq!(check_cli(false, None).log_directive(), "warn");
        assert_eq!(check_cli(true, None).log_directive(), "warn,ibank=debug");
        assert_eq!(check_cli(true, Some("trace")).log_directive(), "trace");
    }

    #[test]
    fn test_log_filter_flag() {
        // An explicit flag wins over IBANK_LOG, so the environment cannot leak in
        let cli = Cli::try_parse_from(["ibank", "--log-filter", "trace", "check"]).unwrap();
        assert_eq!(cli.log_filter.as_deref(), Some("trace"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("ES12", 34), "ES12");
        assert_eq!(truncate("ABCDEFGHIJ", 6), "ABC...");
    }
}
