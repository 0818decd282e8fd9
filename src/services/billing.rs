//! Outbound invoice creation against the payment processor.
//!
//! Each invoice carries a merchant reference encoding who paid for what; the
//! webhook reconciler decodes the same reference when the processor reports
//! the result.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::clients::payments::{InvoiceRequest, PaymentsClient};
use crate::config::BillingConfig;
use crate::reference::PaymentReference;

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("Billing is disabled")]
    Disabled,

    #[error("Token amount must be positive")]
    InvalidAmount,

    #[error("Payment processor unavailable: {0}")]
    Upstream(String),
}

#[derive(Debug, Serialize)]
pub struct CreatedInvoice {
    pub invoice_id: String,
    pub page_url: String,
    pub reference: String,
}

pub struct BillingService {
    payments: Option<Arc<PaymentsClient>>,
    config: BillingConfig,
    webhook_url: String,
    redirect_url: String,
}

impl BillingService {
    #[must_use]
    pub fn new(
        payments: Option<Arc<PaymentsClient>>,
        config: BillingConfig,
        public_base_url: &str,
    ) -> Self {
        let base = public_base_url.trim_end_matches('/');
        Self {
            payments,
            config,
            webhook_url: format!("{base}/api/payments/webhook"),
            redirect_url: format!("{base}/billing/complete"),
        }
    }

    pub async fn create_topup_invoice(
        &self,
        account_id: i32,
        tokens: i64,
    ) -> Result<CreatedInvoice, BillingError> {
        if tokens <= 0 {
            return Err(BillingError::InvalidAmount);
        }
        let payments = self.payments.as_ref().ok_or(BillingError::Disabled)?;

        let reference =
            PaymentReference::top_up(account_id, Utc::now().timestamp_millis(), tokens);
        let amount_cents = tokens * self.config.token_price_cents;

        let invoice = payments
            .create_invoice(&InvoiceRequest {
                amount_cents,
                currency_code: self.config.currency_code,
                reference: reference.clone(),
                redirect_url: self.redirect_url.clone(),
                webhook_url: self.webhook_url.clone(),
                validity_seconds: self.config.invoice_validity_seconds,
            })
            .await
            .map_err(|err| BillingError::Upstream(err.to_string()))?;

        info!(account_id, tokens, invoice_id = %invoice.invoice_id, "Created top-up invoice");
        Ok(CreatedInvoice {
            invoice_id: invoice.invoice_id,
            page_url: invoice.page_url,
            reference,
        })
    }

    pub async fn create_subscription_invoice(
        &self,
        account_id: i32,
    ) -> Result<CreatedInvoice, BillingError> {
        let payments = self.payments.as_ref().ok_or(BillingError::Disabled)?;

        let reference = PaymentReference::subscription(
            account_id,
            Utc::now().timestamp_millis(),
            &self.config.subscription_tier,
        );

        let invoice = payments
            .create_invoice(&InvoiceRequest {
                amount_cents: self.config.subscription_price_cents,
                currency_code: self.config.currency_code,
                reference: reference.clone(),
                redirect_url: self.redirect_url.clone(),
                webhook_url: self.webhook_url.clone(),
                validity_seconds: self.config.invoice_validity_seconds,
            })
            .await
            .map_err(|err| BillingError::Upstream(err.to_string()))?;

        info!(account_id, invoice_id = %invoice.invoice_id, "Created subscription invoice");
        Ok(CreatedInvoice {
            invoice_id: invoice.invoice_id,
            page_url: invoice.page_url,
            reference,
        })
    }
}
