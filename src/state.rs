use std::sync::Arc;

use tokio::sync::RwLock;

use crate::clients::google::GoogleClient;
use crate::clients::mailer::Mailer;
use crate::clients::payments::PaymentsClient;
use crate::clients::storage::StorageClient;
use crate::clients::textgen::TextGenClient;
use crate::config::Config;
use crate::db::Store;
use crate::services::{
    AuthService, BillingService, CreativeService, GenerationService, LedgerService,
    PaymentReconciler, SeaOrmAuthService, SubscriptionService, TokenKeys,
};

/// Build a shared HTTP client with reasonable defaults for API calls.
/// This client is reused across all HTTP-based clients to enable
/// connection pooling and avoid socket exhaustion.
fn build_shared_http_client(timeout_seconds: u64) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_seconds))
        .user_agent("Adforge/1.0")
        .pool_max_idle_per_host(10)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build shared HTTP client: {e}"))
}

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub store: Store,

    pub keys: TokenKeys,

    pub ledger: LedgerService,

    pub generation: Arc<GenerationService>,

    pub reconciler: Arc<PaymentReconciler>,

    pub subscriptions: Arc<SubscriptionService>,

    pub billing: Arc<BillingService>,

    pub creatives: Arc<CreativeService>,

    pub storage: Option<Arc<StorageClient>>,

    pub auth: Arc<dyn AuthService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;
        Self::with_store(config, store)
    }

    /// Wires every service from an already-connected store. Tests use this
    /// with an in-memory database.
    pub fn with_store(config: Config, store: Store) -> anyhow::Result<Self> {
        let http_client =
            build_shared_http_client(config.general.request_timeout_seconds.into())?;

        let keys = TokenKeys::new(&config.security.jwt_secret);
        let ledger = LedgerService::new(store.clone(), config.ledger.monthly_allowance);

        let textgen = Arc::new(TextGenClient::with_shared_client(
            http_client.clone(),
            &config.generation,
        ));
        let generation = Arc::new(GenerationService::new(
            ledger.clone(),
            textgen,
            config.generation.price_tokens,
        ));

        let reconciler = Arc::new(PaymentReconciler::new(
            store.clone(),
            ledger.clone(),
            config.billing.subscription_bonus_tokens,
        ));

        let subscriptions = Arc::new(SubscriptionService::new(store.clone()));

        let payments = if config.billing.enabled {
            Some(Arc::new(PaymentsClient::with_shared_client(
                http_client.clone(),
                &config.billing.processor_url,
                &config.billing.processor_token,
            )))
        } else {
            None
        };
        let billing = Arc::new(BillingService::new(
            payments,
            config.billing.clone(),
            &config.server.public_base_url,
        ));

        let storage = if config.storage.enabled {
            Some(Arc::new(StorageClient::with_shared_client(
                http_client.clone(),
                &config.storage,
            )))
        } else {
            None
        };
        let creatives = Arc::new(CreativeService::new(store.clone(), storage.clone()));

        let google = if config.google.enabled {
            Some(Arc::new(GoogleClient::with_shared_client(
                http_client,
                &config.google.client_id,
            )))
        } else {
            None
        };

        let mailer = Arc::new(Mailer::from_config(
            &config.smtp,
            &config.server.public_base_url,
        )?);

        let auth = Arc::new(SeaOrmAuthService::new(
            store.clone(),
            ledger.clone(),
            keys.clone(),
            mailer,
            google,
            creatives.clone(),
            config.security.clone(),
            config.ledger.monthly_allowance,
        )) as Arc<dyn AuthService>;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            store,
            keys,
            ledger,
            generation,
            reconciler,
            subscriptions,
            billing,
            creatives,
            storage,
            auth,
        })
    }

    pub async fn config(&self) -> Config {
        self.config.read().await.clone()
    }
}
