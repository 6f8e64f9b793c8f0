use super::{Account, BalanceError, Cents, MIN_AMOUNT, format_cents};

/// The in-memory outcome of a transfer: both accounts carrying their new
/// balances, ready to be written back.
///
/// Computing a plan touches no storage. Whether the two writes land together
/// is decided by the unit of work that persists it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPlan {
    pub source: Account,
    pub destination: Account,
    pub amount: Cents,
}

/// Reject amounts below the smallest unit (0.01).
pub fn validate_amount(amount: Cents) -> Result<(), TransferError> {
    if amount < MIN_AMOUNT {
        return Err(TransferError::InvalidAmount(amount));
    }
    Ok(())
}

/// Compute the new balances for moving `amount` from `source` to `destination`.
pub fn plan_transfer(
    source: Account,
    destination: Account,
    amount: Cents,
) -> Result<TransferPlan, TransferError> {
    validate_amount(amount)?;

    if source.id == destination.id || source.iban == destination.iban {
        return Err(TransferError::SameAccount(source.iban));
    }

    let new_source_balance = source.debit(amount)?;
    let new_destination_balance = destination.credit(amount)?;

    Ok(TransferPlan {
        source: source.with_balance(new_source_balance),
        destination: destination.with_balance(new_destination_balance),
        amount,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    InvalidAmount(Cents),
    SameAccount(String),
    Balance(BalanceError),
}

impl From<BalanceError> for TransferError {
    fn from(err: BalanceError) -> Self {
        TransferError::Balance(err)
    }
}

impl std::fmt::Display for TransferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferError::InvalidAmount(amount) => write!(
                f,
                "Amount {} is below the minimum of {}",
                format_cents(*amount),
                format_cents(MIN_AMOUNT)
            ),
            TransferError::SameAccount(iban) => {
                write!(f, "Cannot transfer from account {} to itself", iban)
            }
            TransferError::Balance(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for TransferError {}
