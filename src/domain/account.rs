use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{Cents, format_cents};

/// Store-assigned account identifier.
pub type AccountId = i64;

/// A bank account, looked up by its IBAN.
///
/// The IBAN is unique and never changes after creation. The balance starts at
/// zero and only moves through deposits and transfers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub id: AccountId,
    pub iban: String,
    /// Balance in cents
    pub balance: Cents,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Balance after adding `amount`.
    pub fn credit(&self, amount: Cents) -> Result<Cents, BalanceError> {
        self.balance
            .checked_add(amount)
            .ok_or_else(|| BalanceError::Overflow {
                iban: self.iban.clone(),
            })
    }

    /// Balance after removing `amount`. The balance may never drop below zero.
    pub fn debit(&self, amount: Cents) -> Result<Cents, BalanceError> {
        if self.balance < amount {
            return Err(BalanceError::Insufficient {
                iban: self.iban.clone(),
                balance: self.balance,
                required: amount,
            });
        }
        self.balance
            .checked_sub(amount)
            .ok_or_else(|| BalanceError::Overflow {
                iban: self.iban.clone(),
            })
    }

    pub fn with_balance(mut self, balance: Cents) -> Self {
        self.balance = balance;
        self
    }
}

/// Normalize a user-supplied IBAN: surrounding whitespace is dropped.
/// No format validation is implied; any non-empty string is an IBAN.
pub fn normalize_iban(iban: &str) -> Option<String> {
    let iban = iban.trim();
    if iban.is_empty() {
        None
    } else {
        Some(iban.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BalanceError {
    Insufficient {
        iban: String,
        balance: Cents,
        required: Cents,
    },
    Overflow {
        iban: String,
    },
}

impl std::fmt::Display for BalanceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BalanceError::Insufficient {
                iban,
                balance,
                required,
            } => write!(
                f,
                "Account {} has {} but {} is required",
                iban,
                format_cents(*balance),
                format_cents(*required)
            ),
            BalanceError::Overflow { iban } => {
                write!(f, "Balance of account {} would overflow", iban)
            }
        }
    }
}

impl std::error::Error for BalanceError {}
