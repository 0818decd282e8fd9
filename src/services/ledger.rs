//! Token-balance ledger: every paid action settles against `accounts.token_balance`.
//!
//! All balance mutations are single conditional UPDATEs in the account
//! repository, never read-then-write, so concurrent debits cannot drive a
//! balance negative.

use chrono::{DateTime, Months, Utc};
use thiserror::Error;
use tracing::{debug, info};

use crate::db::Store;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Account not found")]
    NotFound,

    #[error("Insufficient balance: {balance} available, {requested} requested")]
    InsufficientBalance { balance: i64, requested: i64 },

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for LedgerError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

#[derive(Clone)]
pub struct LedgerService {
    store: Store,
    monthly_allowance: i64,
}

impl LedgerService {
    #[must_use]
    pub const fn new(store: Store, monthly_allowance: i64) -> Self {
        Self {
            store,
            monthly_allowance,
        }
    }

    pub async fn balance(&self, account_id: i32) -> Result<i64, LedgerError> {
        self.store
            .account_balance(account_id)
            .await?
            .ok_or(LedgerError::NotFound)
    }

    /// Deducts `amount` if and only if the balance covers it. The guard is a
    /// conditional UPDATE (`token_balance >= amount`), so two concurrent
    /// debits that together exceed the balance resolve to exactly one
    /// success.
    pub async fn debit(&self, account_id: i32, amount: i64) -> Result<i64, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount);
        }

        let affected = self.store.debit_account(account_id, amount).await?;
        if affected == 0 {
            // Zero rows means either no such account or not enough tokens.
            let balance = self
                .store
                .account_balance(account_id)
                .await?
                .ok_or(LedgerError::NotFound)?;
            return Err(LedgerError::InsufficientBalance {
                balance,
                requested: amount,
            });
        }

        let balance = self.balance(account_id).await?;
        debug!(account_id, amount, balance, "Debited tokens");
        Ok(balance)
    }

    pub async fn credit(&self, account_id: i32, amount: i64) -> Result<i64, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount);
        }

        let affected = self.store.credit_account(account_id, amount).await?;
        if affected == 0 {
            return Err(LedgerError::NotFound);
        }

        let balance = self.balance(account_id).await?;
        debug!(account_id, amount, balance, "Credited tokens");
        Ok(balance)
    }

    /// Applies the monthly allowance when at least one full calendar month
    /// has elapsed since `tokens_reset_at`. The anchor advances in whole
    /// months so a dormant account catches up to just past due instead of
    /// drifting to the sign-in instant. Runs synchronously at sign-in.
    pub async fn reset_if_due(&self, account_id: i32) -> Result<bool, LedgerError> {
        let account = self
            .store
            .get_account(account_id)
            .await?
            .ok_or(LedgerError::NotFound)?;

        let now = Utc::now();
        let Some(new_anchor) = advance_anchor(account.tokens_reset_at, now) else {
            return Ok(false);
        };

        // Compare-and-set on the old anchor; a concurrent sign-in that got
        // there first leaves nothing for this one to do.
        let affected = self
            .store
            .apply_monthly_reset(
                account_id,
                account.tokens_reset_at,
                new_anchor,
                self.monthly_allowance,
            )
            .await?;

        if affected > 0 {
            info!(
                account_id,
                allowance = self.monthly_allowance,
                "Monthly token allowance applied"
            );
        }
        Ok(affected > 0)
    }
}

/// Advances `anchor` one calendar month at a time while a full month has
/// elapsed. Returns `None` when no reset is due.
fn advance_anchor(anchor: DateTime<Utc>, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let mut current = anchor;
    let mut advanced = false;

    loop {
        let Some(next) = current.checked_add_months(Months::new(1)) else {
            break;
        };
        if next > now {
            break;
        }
        current = next;
        advanced = true;
    }

    advanced.then_some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn no_reset_before_a_month_elapses() {
        let anchor = utc(2026, 3, 1);
        assert_eq!(advance_anchor(anchor, anchor + Duration::days(20)), None);
        assert_eq!(advance_anchor(anchor, anchor), None);
    }

    #[test]
    fn forty_five_days_advances_one_month() {
        let anchor = utc(2026, 3, 1);
        let now = anchor + Duration::days(45);
        assert_eq!(advance_anchor(anchor, now), Some(utc(2026, 4, 1)));
    }

    #[test]
    fn dormant_account_catches_up_to_just_past_due() {
        let anchor = utc(2025, 11, 10);
        let now = utc(2026, 3, 25);
        let new_anchor = advance_anchor(anchor, now).unwrap();
        assert_eq!(new_anchor, utc(2026, 3, 10));
        // Just past due: less than one month remains until the next reset.
        assert!(new_anchor <= now);
        assert!(new_anchor.checked_add_months(Months::new(1)).unwrap() > now);
    }

    #[test]
    fn exact_month_boundary_triggers_reset() {
        let anchor = utc(2026, 1, 15);
        assert_eq!(
            advance_anchor(anchor, utc(2026, 2, 15)),
            Some(utc(2026, 2, 15))
        );
    }

    #[test]
    fn end_of_month_anchors_clamp() {
        // Jan 31 + 1 month clamps to Feb 28.
        let anchor = utc(2026, 1, 31);
        let now = utc(2026, 3, 2);
        assert_eq!(advance_anchor(anchor, now), Some(utc(2026, 2, 28)));
    }
}
