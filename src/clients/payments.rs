//! Payment processor client: outbound invoice creation.
//!
//! The processor reports results asynchronously through the webhook; this
//! client only opens invoices.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum PaymentsError {
    #[error("Processor request failed: {0}")]
    Request(String),

    #[error("Processor returned {status}: {body}")]
    Status { status: u16, body: String },
}

impl From<reqwest::Error> for PaymentsError {
    fn from(err: reqwest::Error) -> Self {
        Self::Request(err.to_string())
    }
}

#[derive(Debug, Serialize)]
pub struct InvoiceRequest {
    pub amount_cents: i64,
    pub currency_code: u32,
    pub reference: String,
    pub redirect_url: String,
    pub webhook_url: String,
    pub validity_seconds: u64,
}

#[derive(Debug, Deserialize)]
pub struct Invoice {
    #[serde(rename = "invoiceId")]
    pub invoice_id: String,
    #[serde(rename = "pageUrl")]
    pub page_url: String,
}

pub struct PaymentsClient {
    client: Client,
    base_url: String,
    token: String,
}

impl PaymentsClient {
    #[must_use]
    pub fn with_shared_client(client: Client, base_url: &str, token: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    pub async fn create_invoice(&self, request: &InvoiceRequest) -> Result<Invoice, PaymentsError> {
        let body = json!({
            "amount": request.amount_cents,
            "ccy": request.currency_code,
            "merchantPaymInfo": {
                "reference": request.reference,
                "destination": "adforge tokens",
            },
            "redirectUrl": request.redirect_url,
            "webHookUrl": request.webhook_url,
            "validity": request.validity_seconds,
        });

        let response = self
            .client
            .post(format!("{}/api/merchant/invoice/create", self.base_url))
            .header("X-Token", &self.token)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(PaymentsError::Status { status, body });
        }

        let invoice: Invoice = response.json().await?;
        debug!(invoice_id = %invoice.invoice_id, "Invoice created");
        Ok(invoice)
    }
}
