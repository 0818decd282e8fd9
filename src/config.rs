use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub security: SecurityConfig,

    pub ledger: LedgerConfig,

    pub billing: BillingConfig,

    pub generation: GenerationConfig,

    pub google: GoogleConfig,

    pub smtp: SmtpConfig,

    pub storage: StorageConfig,

    pub scheduler: SchedulerConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    #[serde(default)]
    pub suppress_connection_errors: bool,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,

    /// Shared outbound HTTP client timeout in seconds.
    pub request_timeout_seconds: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/adforge.db".to_string(),
            log_level: "info".to_string(),
            suppress_connection_errors: false,
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
            request_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,

    pub port: u16,

    pub cors_allowed_origins: Vec<String>,

    /// Externally reachable base URL, used for payment redirects and the
    /// links embedded in verification/reset mail.
    pub public_base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 6780,
            cors_allowed_origins: vec![
                "http://localhost:6780".to_string(),
                "http://127.0.0.1:6780".to_string(),
            ],
            public_base_url: "http://localhost:6780".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Argon2 memory cost in KiB (default: 8192 = 8MB)
    pub argon2_memory_cost_kib: u32,

    /// Argon2 time cost (iterations) - higher = more CPU work
    pub argon2_time_cost: u32,

    /// Argon2 parallelism (default: 1)
    pub argon2_parallelism: u32,

    /// HS256 signing secret for the access/refresh token pair.
    /// Overridden by `ADFORGE_JWT_SECRET`; never commit a real value.
    #[serde(skip_serializing)]
    pub jwt_secret: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            argon2_memory_cost_kib: 8192,
            argon2_time_cost: 3,
            argon2_parallelism: 1,
            jwt_secret: "change-me".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Tokens granted at the start of every monthly period.
    pub monthly_allowance: i64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            monthly_allowance: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingConfig {
    pub enabled: bool,

    /// Payment processor API base URL.
    pub processor_url: String,

    /// Merchant token. Overridden by `ADFORGE_PROCESSOR_TOKEN`.
    #[serde(skip_serializing)]
    pub processor_token: String,

    /// ISO 4217 numeric currency code sent on invoices.
    pub currency_code: u32,

    /// Price of one token in minor currency units.
    pub token_price_cents: i64,

    pub subscription_tier: String,

    pub subscription_price_cents: i64,

    /// Tokens credited on every successful subscription payment,
    /// including renewals.
    pub subscription_bonus_tokens: i64,

    /// Seconds an invoice stays payable.
    pub invoice_validity_seconds: u64,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            processor_url: "https://api.monobank.ua".to_string(),
            processor_token: String::new(),
            currency_code: 840,
            token_price_cents: 10,
            subscription_tier: "pro".to_string(),
            subscription_price_cents: 9900,
            subscription_bonus_tokens: 500,
            invoice_validity_seconds: 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Token price of one generation request.
    pub price_tokens: i64,

    pub provider_url: String,

    /// Overridden by `ADFORGE_TEXTGEN_API_KEY`.
    #[serde(skip_serializing)]
    pub api_key: String,

    pub assistant_id: String,

    /// First poll delay while waiting on a generation run.
    pub poll_initial_ms: u64,

    /// Poll delays grow by this factor up to `poll_max_ms`.
    pub poll_backoff_factor: f64,

    pub poll_max_ms: u64,

    /// Hard deadline for one generation run. The charge is refunded
    /// when this elapses.
    pub poll_deadline_seconds: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            price_tokens: 10,
            provider_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            assistant_id: String::new(),
            poll_initial_ms: 500,
            poll_backoff_factor: 2.0,
            poll_max_ms: 5000,
            poll_deadline_seconds: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GoogleConfig {
    pub enabled: bool,

    /// OAuth client id; the `aud` claim of incoming id-tokens must match.
    pub client_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    pub enabled: bool,

    pub host: String,

    pub port: u16,

    pub username: String,

    /// Overridden by `ADFORGE_SMTP_PASSWORD`.
    #[serde(skip_serializing)]
    pub password: String,

    pub use_tls: bool,

    pub from_address: String,

    pub from_name: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "localhost".to_string(),
            port: 587,
            username: String::new(),
            password: String::new(),
            use_tls: true,
            from_address: "noreply@adforge.local".to_string(),
            from_name: "Adforge".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub enabled: bool,

    /// Object store HTTP endpoint (S3-compatible PUT/DELETE by key).
    pub endpoint: String,

    pub bucket: String,

    /// Overridden by `ADFORGE_STORAGE_TOKEN`.
    #[serde(skip_serializing)]
    pub access_token: String,

    /// Public base under which uploaded objects are served.
    pub public_base_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "http://localhost:9000".to_string(),
            bucket: "creatives".to_string(),
            access_token: String::new(),
            public_base_url: "http://localhost:9000/creatives".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,

    /// Six-field cron for the daily subscription expiry sweep.
    pub sweep_cron: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sweep_cron: "0 0 0 * * *".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                let mut config = Self::load_from_path(path)?;
                config.apply_env_overrides();
                return Ok(config);
            }
        }

        info!("No config file found, using defaults");
        let mut config = Self::default();
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Secrets always win from the environment so they never have to live
    /// in config.toml.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("ADFORGE_JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = std::env::var("ADFORGE_PROCESSOR_TOKEN") {
            self.billing.processor_token = v;
        }
        if let Ok(v) = std::env::var("ADFORGE_TEXTGEN_API_KEY") {
            self.generation.api_key = v;
        }
        if let Ok(v) = std::env::var("ADFORGE_SMTP_PASSWORD") {
            self.smtp.password = v;
        }
        if let Ok(v) = std::env::var("ADFORGE_STORAGE_TOKEN") {
            self.storage.access_token = v;
        }
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("adforge").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".adforge").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.ledger.monthly_allowance < 0 {
            anyhow::bail!("Monthly token allowance cannot be negative");
        }

        if self.generation.price_tokens <= 0 {
            anyhow::bail!("Generation price must be positive");
        }

        if self.generation.poll_deadline_seconds == 0 {
            anyhow::bail!("Generation poll deadline must be positive");
        }

        if self.billing.enabled && self.billing.processor_url.is_empty() {
            anyhow::bail!("Payment processor URL cannot be empty when billing is enabled");
        }

        if self.smtp.enabled && self.smtp.host.is_empty() {
            anyhow::bail!("SMTP host cannot be empty when mail is enabled");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.ledger.monthly_allowance, 100);
        assert_eq!(config.generation.price_tokens, 10);
        assert_eq!(config.billing.currency_code, 840);
        assert_eq!(config.scheduler.sweep_cron, "0 0 0 * * *");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[billing]"));
        assert!(toml_str.contains("[generation]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [generation]
            price_tokens = 25
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.generation.price_tokens, 25);

        assert_eq!(config.billing.subscription_tier, "pro");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.generation.price_tokens = 0;
        assert!(config.validate().is_err());
    }
}
