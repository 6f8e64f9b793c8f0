use thiserror::Error;

use crate::domain::{BalanceError, Cents, TransferError, format_cents};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Account already exists: {0}")]
    AccountAlreadyExists(String),

    #[error("IBAN must not be empty")]
    InvalidIban,

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error(
        "Insufficient balance in account {iban}: balance {}, required {}",
        money(.balance),
        money(.required)
    )]
    InsufficientBalance {
        iban: String,
        balance: Cents,
        required: Cents,
    },

    #[error("Cannot transfer from account {0} to itself")]
    SameAccount(String),

    #[error("System failure: {0}")]
    SystemFailure(String),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

fn money(cents: &Cents) -> String {
    format_cents(*cents)
}

impl From<TransferError> for AppError {
    fn from(err: TransferError) -> Self {
        match err {
            TransferError::InvalidAmount(_) => AppError::InvalidAmount(err.to_string()),
            TransferError::SameAccount(iban) => AppError::SameAccount(iban),
            TransferError::Balance(balance_err) => balance_err.into(),
        }
    }
}

impl From<BalanceError> for AppError {
    fn from(err: BalanceError) -> Self {
        match err {
            BalanceError::Insufficient {
                iban,
                balance,
                required,
            } => AppError::InsufficientBalance {
                iban,
                balance,
                required,
            },
            BalanceError::Overflow { .. } => AppError::InvalidAmount(err.to_string()),
        }
    }
}
