//! Payment reference grammar.
//!
//! Every invoice the billing layer creates carries an opaque reference
//! string that comes back verbatim on the processor webhook. The reference
//! is the only link between a webhook delivery and the account mutation it
//! pays for, so it is parsed strictly: anything that does not match the
//! grammar is rejected as malformed and acknowledged without effect.
//!
//! Grammar:
//! - `TOPUP_<account>_<ts>_tokens_<amount>` — one-off token purchase
//! - `SUB_<account>_<ts>_plan_<tier>` — subscription payment

use std::fmt;

use thiserror::Error;

const TOPUP_PREFIX: &str = "TOPUP";
const SUBSCRIPTION_PREFIX: &str = "SUB";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentReference {
    TopUp {
        account_id: i32,
        issued_at_ms: i64,
        tokens: i64,
    },
    Subscription {
        account_id: i32,
        issued_at_ms: i64,
        tier: String,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("unknown reference prefix: {0}")]
    UnknownPrefix(String),

    #[error("reference has wrong shape: {0}")]
    WrongShape(String),

    #[error("invalid numeric field {field}: {value}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("token amount must be positive, got {0}")]
    NonPositiveAmount(i64),

    #[error("tier must be non-empty alphanumeric, got {0:?}")]
    InvalidTier(String),
}

impl PaymentReference {
    pub const fn account_id(&self) -> i32 {
        match self {
            Self::TopUp { account_id, .. } | Self::Subscription { account_id, .. } => *account_id,
        }
    }

    #[must_use]
    pub fn top_up(account_id: i32, issued_at_ms: i64, tokens: i64) -> String {
        format!("{TOPUP_PREFIX}_{account_id}_{issued_at_ms}_tokens_{tokens}")
    }

    #[must_use]
    pub fn subscription(account_id: i32, issued_at_ms: i64, tier: &str) -> String {
        format!("{SUBSCRIPTION_PREFIX}_{account_id}_{issued_at_ms}_plan_{tier}")
    }

    pub fn parse(raw: &str) -> Result<Self, ReferenceError> {
        let parts: Vec<&str> = raw.split('_').collect();

        match parts.as_slice() {
            [TOPUP_PREFIX, account, ts, "tokens", amount] => {
                let account_id = parse_number("account", account)?;
                let issued_at_ms = parse_number("timestamp", ts)?;
                let tokens: i64 = parse_number("amount", amount)?;
                if tokens <= 0 {
                    return Err(ReferenceError::NonPositiveAmount(tokens));
                }
                Ok(Self::TopUp {
                    account_id,
                    issued_at_ms,
                    tokens,
                })
            }
            [SUBSCRIPTION_PREFIX, account, ts, "plan", tier] => {
                let account_id = parse_number("account", account)?;
                let issued_at_ms = parse_number("timestamp", ts)?;
                if tier.is_empty() || !tier.chars().all(char::is_alphanumeric) {
                    return Err(ReferenceError::InvalidTier((*tier).to_string()));
                }
                Ok(Self::Subscription {
                    account_id,
                    issued_at_ms,
                    tier: (*tier).to_string(),
                })
            }
            [prefix, ..] if *prefix != TOPUP_PREFIX && *prefix != SUBSCRIPTION_PREFIX => {
                Err(ReferenceError::UnknownPrefix((*prefix).to_string()))
            }
            _ => Err(ReferenceError::WrongShape(raw.to_string())),
        }
    }
}

impl fmt::Display for PaymentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TopUp {
                account_id,
                issued_at_ms,
                tokens,
            } => write!(f, "{}", Self::top_up(*account_id, *issued_at_ms, *tokens)),
            Self::Subscription {
                account_id,
                issued_at_ms,
                tier,
            } => write!(f, "{}", Self::subscription(*account_id, *issued_at_ms, tier)),
        }
    }
}

fn parse_number<T: std::str::FromStr>(
    field: &'static str,
    value: &str,
) -> Result<T, ReferenceError> {
    value.parse().map_err(|_| ReferenceError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_top_up_reference() {
        let parsed = PaymentReference::parse("TOPUP_42_1767225600000_tokens_500").unwrap();
        assert_eq!(
            parsed,
            PaymentReference::TopUp {
                account_id: 42,
                issued_at_ms: 1_767_225_600_000,
                tokens: 500,
            }
        );
    }

    #[test]
    fn parses_subscription_reference() {
        let parsed = PaymentReference::parse("SUB_7_1767225600000_plan_pro").unwrap();
        assert_eq!(
            parsed,
            PaymentReference::Subscription {
                account_id: 7,
                issued_at_ms: 1_767_225_600_000,
                tier: "pro".to_string(),
            }
        );
    }

    #[test]
    fn round_trips_through_display() {
        let raw = PaymentReference::top_up(3, 1000, 250);
        let parsed = PaymentReference::parse(&raw).unwrap();
        assert_eq!(parsed.to_string(), raw);
    }

    #[test]
    fn rejects_unknown_prefix() {
        assert_eq!(
            PaymentReference::parse("REFUND_1_2_tokens_3"),
            Err(ReferenceError::UnknownPrefix("REFUND".to_string()))
        );
    }

    #[test]
    fn rejects_wrong_shape() {
        assert!(matches!(
            PaymentReference::parse("TOPUP_1_2_tokens"),
            Err(ReferenceError::WrongShape(_))
        ));
        assert!(matches!(
            PaymentReference::parse("TOPUP_1_2_credits_50"),
            Err(ReferenceError::WrongShape(_))
        ));
        assert!(matches!(
            PaymentReference::parse(""),
            Err(ReferenceError::UnknownPrefix(_))
        ));
    }

    #[test]
    fn rejects_bad_numbers_and_amounts() {
        assert!(matches!(
            PaymentReference::parse("TOPUP_abc_2_tokens_50"),
            Err(ReferenceError::InvalidNumber { field: "account", .. })
        ));
        assert_eq!(
            PaymentReference::parse("TOPUP_1_2_tokens_0"),
            Err(ReferenceError::NonPositiveAmount(0))
        );
        assert_eq!(
            PaymentReference::parse("TOPUP_1_2_tokens_-5"),
            Err(ReferenceError::NonPositiveAmount(-5))
        );
    }

    #[test]
    fn rejects_bad_tier() {
        assert!(matches!(
            PaymentReference::parse("SUB_1_2_plan_pro!"),
            Err(ReferenceError::InvalidTier(_))
        ));
    }
}
