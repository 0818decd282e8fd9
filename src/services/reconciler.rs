//! Applies payment-processor webhooks to the ledger and subscriptions.
//!
//! The processor retries deliveries, so every mutation is preceded by an
//! atomic claim of the merchant reference. Business failures are logged and
//! acknowledged; only a structurally invalid body is rejected upstream.

use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::db::Store;
use crate::reference::PaymentReference;
use crate::services::ledger::{LedgerError, LedgerService};

pub mod reference_kind {
    pub const TOPUP: &str = "topup";
    pub const SUBSCRIPTION: &str = "subscription";
}

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub reference: String,
    pub status: String,
    #[serde(default)]
    pub invoice_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Balance or subscription state was mutated.
    Applied,
    /// Reference already claimed by an earlier delivery; no-op.
    Duplicate,
    /// Non-final status, unknown status, or a reference for a vanished
    /// account; acknowledged without effect.
    Ignored,
    /// Reference did not parse; acknowledged without effect.
    Malformed,
}

#[derive(Clone)]
pub struct PaymentReconciler {
    store: Store,
    ledger: LedgerService,
    subscription_bonus_tokens: i64,
}

impl PaymentReconciler {
    #[must_use]
    pub const fn new(store: Store, ledger: LedgerService, subscription_bonus_tokens: i64) -> Self {
        Self {
            store,
            ledger,
            subscription_bonus_tokens,
        }
    }

    pub async fn apply(&self, event: &WebhookEvent) -> anyhow::Result<ReconcileOutcome> {
        let parsed = match PaymentReference::parse(&event.reference) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(
                    reference = %event.reference,
                    invoice_id = ?event.invoice_id,
                    %err,
                    "Ignoring webhook with malformed reference"
                );
                return Ok(ReconcileOutcome::Malformed);
            }
        };

        match event.status.as_str() {
            "success" => self.apply_success(&event.reference, &parsed).await,
            "processing" | "failure" => {
                debug!(
                    reference = %event.reference,
                    status = %event.status,
                    "Acknowledging non-final payment status"
                );
                Ok(ReconcileOutcome::Ignored)
            }
            other => {
                warn!(reference = %event.reference, status = %other, "Unknown payment status");
                Ok(ReconcileOutcome::Ignored)
            }
        }
    }

    async fn apply_success(
        &self,
        raw_reference: &str,
        parsed: &PaymentReference,
    ) -> anyhow::Result<ReconcileOutcome> {
        match *parsed {
            PaymentReference::TopUp {
                account_id, tokens, ..
            } => {
                let claimed = self
                    .store
                    .claim_payment_reference(raw_reference, account_id, reference_kind::TOPUP)
                    .await?;
                if !claimed {
                    debug!(reference = %raw_reference, "Duplicate top-up delivery");
                    return Ok(ReconcileOutcome::Duplicate);
                }

                match self.ledger.credit(account_id, tokens).await {
                    Ok(balance) => {
                        info!(account_id, tokens, balance, "Top-up credited");
                        Ok(ReconcileOutcome::Applied)
                    }
                    Err(LedgerError::NotFound) => {
                        warn!(account_id, reference = %raw_reference, "Top-up for missing account");
                        Ok(ReconcileOutcome::Ignored)
                    }
                    Err(err) => {
                        // Release the claim so the processor's retry can
                        // credit cleanly.
                        self.store.release_payment_reference(raw_reference).await?;
                        Err(err.into())
                    }
                }
            }
            PaymentReference::Subscription {
                account_id,
                ref tier,
                ..
            } => {
                let claimed = self
                    .store
                    .claim_payment_reference(
                        raw_reference,
                        account_id,
                        reference_kind::SUBSCRIPTION,
                    )
                    .await?;
                if !claimed {
                    debug!(reference = %raw_reference, "Duplicate subscription delivery");
                    return Ok(ReconcileOutcome::Duplicate);
                }

                // Renewal and bonus commit together: a partial apply could
                // not be retried once the reference is claimed.
                let subscription = match self
                    .store
                    .apply_subscription_payment(
                        account_id,
                        tier,
                        self.subscription_bonus_tokens,
                        Utc::now(),
                    )
                    .await
                {
                    Ok(Some(subscription)) => subscription,
                    Ok(None) => {
                        warn!(account_id, reference = %raw_reference, "Subscription payment for missing account");
                        return Ok(ReconcileOutcome::Ignored);
                    }
                    Err(err) => {
                        self.store.release_payment_reference(raw_reference).await?;
                        return Err(err);
                    }
                };

                info!(
                    account_id,
                    tier = %subscription.tier,
                    ends_at = %subscription.ends_at,
                    "Subscription payment applied"
                );
                Ok(ReconcileOutcome::Applied)
            }
        }
    }
}
