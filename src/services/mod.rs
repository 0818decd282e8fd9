pub mod tokens;
pub use tokens::{Claims, TokenError, TokenKeys, TokenPair};

pub mod ledger;
pub use ledger::{LedgerError, LedgerService};

pub mod generation;
pub use generation::{GenerationError, GenerationService};

pub mod reconciler;
pub use reconciler::{PaymentReconciler, ReconcileOutcome, WebhookEvent};

pub mod subscriptions;
pub use subscriptions::{SubscriptionError, SubscriptionService};

pub mod billing;
pub use billing::{BillingError, BillingService, CreatedInvoice};

pub mod creatives;
pub use creatives::{CreativeBlock, CreativeError, CreativeService};

pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AccountInfo, AuthError, AuthService, SessionTokens};
pub use auth_service_impl::SeaOrmAuthService;
