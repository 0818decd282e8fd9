pub mod api;
pub mod clients;
pub mod config;
pub mod constants;
pub mod db;
pub mod entities;
pub mod reference;
pub mod scheduler;
pub mod services;
pub mod state;

use std::sync::Arc;
use tokio::signal;

use anyhow::Context;
pub use config::Config;
use scheduler::Scheduler;
use state::SharedState;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

pub async fn run() -> anyhow::Result<()> {
    let config = Config::load()?;
    config.validate()?;

    let prometheus_handle = if config.observability.metrics_enabled {
        use metrics_exporter_prometheus::PrometheusBuilder;
        let builder = PrometheusBuilder::new();
        let handle = builder
            .install_recorder()
            .context("Failed to install Prometheus recorder")?;
        info!("Prometheus metrics recorder initialized");
        Some(handle)
    } else {
        None
    };

    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let mut log_level = config.general.log_level.clone();
    if config.general.suppress_connection_errors {
        log_level.push_str(",reqwest::retry=off,hyper_util=off");
    }

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

    let fmt_layer = tracing_subscriber::fmt::layer();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);

    if config.observability.loki_enabled {
        let url = url::Url::parse(&config.observability.loki_url).context("Invalid Loki URL")?;

        let (layer, task) = tracing_loki::builder()
            .label("app", "adforge")?
            .extra_field("env", "production")?
            .build_url(url)?;

        tokio::spawn(task);

        registry.with(layer).init();
        info!(
            "Loki logging initialized at {}",
            config.observability.loki_url
        );
    } else {
        registry.init();
    }

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(String::as_str) {
        None | Some("serve" | "-d" | "--daemon") => run_daemon(config, prometheus_handle).await,

        Some("sweep") => run_sweep(config).await,

        Some("init" | "--init") => {
            Config::create_default_if_missing()?;
            println!("✓ Config file created. Edit config.toml and run again.");
            Ok(())
        }

        Some("help" | "-h" | "--help") => {
            print_help();
            Ok(())
        }

        Some(other) => {
            println!("Unknown command: {other}");
            println!();
            print_help();
            Ok(())
        }
    }
}

fn print_help() {
    println!("Adforge - ad creative generation backend");
    println!();
    println!("USAGE:");
    println!("  adforge [COMMAND]");
    println!();
    println!("COMMANDS:");
    println!("  serve    Run the API server with the background scheduler (default)");
    println!("  sweep    Expire overdue subscriptions once and exit");
    println!("  init     Create a default config file");
    println!("  help     Show this help message");
    println!();
    println!("CONFIG:");
    println!("  Edit config.toml to configure billing, generation, SMTP, etc.");
    println!("  Secrets come from the environment: ADFORGE_JWT_SECRET,");
    println!("  ADFORGE_PROCESSOR_TOKEN, ADFORGE_TEXTGEN_API_KEY,");
    println!("  ADFORGE_SMTP_PASSWORD, ADFORGE_STORAGE_TOKEN.");
}

async fn run_daemon(
    config: Config,
    prometheus_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
) -> anyhow::Result<()> {
    info!(
        "Adforge v{} starting in server mode...",
        env!("CARGO_PKG_VERSION")
    );

    let shared = Arc::new(SharedState::new(config.clone()).await?);
    let api_state = api::create_app_state(shared.clone(), prometheus_handle);

    let scheduler = Arc::new(Scheduler::new(shared.clone(), config.scheduler.clone()));

    let scheduler_handle = {
        let sched = Arc::clone(&scheduler);
        tokio::spawn(async move {
            if let Err(e) = sched.start().await {
                error!("Scheduler error: {}", e);
            }
        })
    };

    let server_handle: Option<tokio::task::JoinHandle<()>> = if config.server.enabled {
        let port = config.server.port;
        info!("Starting Web API on port {}", port);

        let app = api::router(api_state).await;
        let addr = format!("0.0.0.0:{port}");
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        Some(tokio::spawn(async move {
            info!("🌐 Web Server running at http://0.0.0.0:{}", port);
            if let Err(e) = axum::serve(listener, app).await {
                error!("Web server error: {}", e);
            }
        }))
    } else {
        None
    };

    info!("Server running. Press Ctrl+C to stop.");

    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received");
        }
        Err(e) => {
            error!("Error listening for shutdown: {}", e);
        }
    }

    scheduler.stop().await;
    scheduler_handle.abort();
    if let Some(handle) = server_handle {
        handle.abort();
    }
    info!("Server stopped");

    Ok(())
}

async fn run_sweep(config: Config) -> anyhow::Result<()> {
    info!("Running subscription expiry sweep...");

    let shared = Arc::new(SharedState::new(config.clone()).await?);
    let scheduler = Scheduler::new(shared, config.scheduler);

    let expired = scheduler.run_once().await?;

    info!("Sweep complete, {} subscriptions expired", expired);
    Ok(())
}
