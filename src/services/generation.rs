//! Paid AI generation gate: charge first, call the provider, refund on failure.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::clients::textgen::TextGenClient;
use crate::services::ledger::{LedgerError, LedgerService};

/// What to generate ad copy for.
#[derive(Debug, Clone, Deserialize)]
pub struct AdBrief {
    pub country: String,
    pub language: String,
    pub vertical: String,
    pub variations: u32,
}

impl AdBrief {
    /// Prompt sent to the provider. The numbered-JSON response contract is
    /// part of the prompt so the reply can be parsed mechanically.
    #[must_use]
    pub fn prompt(&self) -> String {
        format!(
            "Generate {} short variations of text for a minimalist creative in the field of {}, \
             targeting an audience in {}. Use the following languages {}. The content should be \
             10-15 words long with a call to action. Do not include the country name in the text. \
             The response should be a valid JSON object in the following format: \
             {{\"1\": \"\", ...}} without code block",
            self.variations, self.vertical, self.country, self.language
        )
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Account not found")]
    AccountNotFound,

    #[error("Insufficient balance: {balance} available, {price} required")]
    InsufficientBalance { balance: i64, price: i64 },

    #[error("Generation provider unavailable: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct GenerationResult {
    pub variations: Vec<String>,
    pub balance: i64,
}

#[derive(Clone)]
pub struct GenerationService {
    ledger: LedgerService,
    textgen: Arc<TextGenClient>,
    price_tokens: i64,
}

impl GenerationService {
    #[must_use]
    pub const fn new(ledger: LedgerService, textgen: Arc<TextGenClient>, price_tokens: i64) -> Self {
        Self {
            ledger,
            textgen,
            price_tokens,
        }
    }

    #[must_use]
    pub const fn price_tokens(&self) -> i64 {
        self.price_tokens
    }

    /// Debits the generation price, then calls the provider. Any provider
    /// failure or timeout refunds the debit, so tokens are never captured
    /// for content that was not produced. The debit happening first means a
    /// broke account never incurs provider cost.
    pub async fn generate(
        &self,
        account_id: i32,
        brief: &AdBrief,
    ) -> Result<GenerationResult, GenerationError> {
        let balance_after_charge = match self.ledger.debit(account_id, self.price_tokens).await {
            Ok(balance) => balance,
            Err(LedgerError::NotFound) => return Err(GenerationError::AccountNotFound),
            Err(LedgerError::InsufficientBalance { balance, requested }) => {
                return Err(GenerationError::InsufficientBalance {
                    balance,
                    price: requested,
                });
            }
            Err(err) => return Err(GenerationError::Internal(err.to_string())),
        };

        match self.textgen.generate(&brief.prompt()).await {
            Ok(generated) => {
                info!(
                    account_id,
                    count = generated.len(),
                    balance = balance_after_charge,
                    "Generated ad variations"
                );
                Ok(GenerationResult {
                    variations: generated,
                    balance: balance_after_charge,
                })
            }
            Err(err) => {
                warn!(account_id, %err, "Provider call failed, refunding charge");
                if let Err(refund_err) = self.ledger.credit(account_id, self.price_tokens).await {
                    // The account may have been deleted mid-flight; anything
                    // else is a real inconsistency worth an operator's eyes.
                    error!(
                        account_id,
                        amount = self.price_tokens,
                        %refund_err,
                        "Failed to refund generation charge"
                    );
                }
                Err(GenerationError::Upstream(err.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_carries_brief_fields_and_response_contract() {
        let brief = AdBrief {
            country: "Ukraine".to_string(),
            language: "Ukrainian".to_string(),
            vertical: "fitness".to_string(),
            variations: 3,
        };
        let prompt = brief.prompt();
        assert!(prompt.contains("Generate 3 short variations"));
        assert!(prompt.contains("field of fitness"));
        assert!(prompt.contains("audience in Ukraine"));
        assert!(prompt.contains("languages Ukrainian"));
        assert!(prompt.contains("{\"1\": \"\", ...}"));
    }
}
