use super::{Account, Cents, format_cents};

/// Result of checking the ledger for lost or created money.
#[derive(Debug, Clone)]
pub struct IntegrityReport {
    pub account_count: usize,
    /// Sum of every account balance
    pub total_balance: Cents,
    /// Sum of every committed deposit
    pub total_deposited: Cents,
    pub negative_accounts: Vec<String>,
    pub issues: Vec<String>,
}

impl IntegrityReport {
    /// Transfers only move money, so the balances must add up to what was deposited.
    pub fn is_conserved(&self) -> bool {
        self.total_balance == self.total_deposited
    }

    pub fn is_healthy(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Sum all balances. Returns `None` on overflow.
pub fn total_balance(accounts: &[Account]) -> Option<Cents> {
    accounts
        .iter()
        .try_fold(0 as Cents, |total, account| total.checked_add(account.balance))
}

pub fn build_integrity_report(accounts: &[Account], total_deposited: Cents) -> IntegrityReport {
    let mut issues = Vec::new();

    let total = match total_balance(accounts) {
        Some(total) => total,
        None => {
            issues.push("Sum of balances overflows".to_string());
            Cents::MAX
        }
    };

    if total != total_deposited {
        let difference = total - total_deposited;
        issues.push(format!(
            "Balances sum to {} but {} was deposited ({} {})",
            format_cents(total),
            format_cents(total_deposited),
            format_cents(difference.abs()),
            if difference < 0 { "lost" } else { "created" }
        ));
    }

    let negative_accounts: Vec<String> = accounts
        .iter()
        .filter(|a| a.balance < 0)
        .map(|a| a.iban.clone())
        .collect();
    for iban in &negative_accounts {
        issues.push(format!("Account {} has a negative balance", iban));
    }

    IntegrityReport {
        account_count: accounts.len(),
        total_balance: total,
        total_deposited,
        negative_accounts,
        issues,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn account(id: i64, balance: Cents) -> Account {
        Account {
            id,
            iban: format!("ES{:022}", id),
            balance,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_ledger_is_healthy() {
        let report = build_integrity_report(&[], 0);
        assert!(report.is_healthy());
        assert!(report.is_conserved());
        assert_eq!(report.account_count, 0);
    }

    #[test]
    fn test_conserved_ledger() {
        let accounts = vec![account(1, 9000), account(2, 1000)];
        let report = build_integrity_report(&accounts, 10000);

        assert!(report.is_conserved());
        assert!(report.is_healthy());
        assert_eq!(report.total_balance, 10000);
    }

    #[test]
    fn test_lost_money_is_reported() {
        // Source debited, destination never credited
        let accounts = vec![account(1, 9000), account(2, 0)];
        let report = build_integrity_report(&accounts, 10000);

        assert!(!report.is_conserved());
        assert_eq!(report.issues.len(), 1);
        assert!(report.issues[0].contains("10.00 lost"));
    }

    #[test]
    fn test_negative_balance_is_reported() {
        let accounts = vec![account(1, -100), account(2, 100)];
        let report = build_integrity_report(&accounts, 0);

        assert!(report.is_conserved());
        assert!(!report.is_healthy());
        assert_eq!(report.negative_accounts, vec![accounts[0].iban.clone()]);
    }

    #[test]
    fn test_total_balance_overflow() {
        let accounts = vec![account(1, Cents::MAX), account(2, 1)];
        assert_eq!(total_balance(&accounts), None);
    }
}
