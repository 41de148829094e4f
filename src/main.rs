//! Coordination engine for a distributed log consumer.
//!
//! Wires together the group registry (Redis), the broker-fetch layer
//! (rskafka), and the consume loop (rebalancing, parallel fetch, offset
//! persistence) behind a minimal health/readiness HTTP surface.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};

use api::{router, AppState};
use engine::ConsumeLoop;
use engine_core::EngineConfig;
use registry::{GroupRegistry, RedisGroupRegistry};
use telemetry::{health, init_tracing_from_env};

/// Application configuration: the coordination engine plus the HTTP
/// surface it exposes health on.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Config {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,

    #[serde(default)]
    engine: EngineConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            engine: EngineConfig::default(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider BEFORE any TLS operations
    // rustls 0.23+ requires explicit crypto provider selection
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    init_tracing_from_env();

    info!("Starting coordination engine v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = load_config()?;
    let member_id = config.engine.member_id();

    info!(
        brokers = ?config.engine.brokers,
        topics = ?config.engine.topics,
        member_id = %member_id,
        "Loaded engine config"
    );

    // Connect the group registry (distributed locks, membership, offsets)
    let redis_addr = registry::config::connection_string(&config.engine.redis_conf);
    let group_registry: Arc<dyn GroupRegistry> = Arc::new(
        RedisGroupRegistry::connect(&redis_addr)
            .await
            .context("Failed to connect to group registry")?,
    );

    // Check health and update status
    check_health(&config, group_registry.as_ref()).await;

    // Start the heartbeat task so this member stays visible to peers.
    let heartbeat_ttl = Duration::from_secs(config.engine.redis_conf.heart_beat_freq * 3);
    let heartbeat_period = Duration::from_secs(config.engine.redis_conf.heart_beat_freq);
    let _heartbeat_handle = spawn_heartbeat(
        group_registry.clone(),
        member_id.clone(),
        heartbeat_period,
        heartbeat_ttl,
    );

    // Spawn the consume loop: rebalancing, per-broker parallel fetch,
    // offset persistence.
    let consume_loop = ConsumeLoop::new(&config.engine, group_registry.clone());
    let mut consumer_handle = consume_loop.spawn();

    // Drain consumed messages in the background. Downstream delivery is
    // out of scope here, so we just log at debug and drop them.
    let drain_handle = tokio::spawn(async move {
        while let Some(message) = consumer_handle.read_msg(None).await {
            tracing::debug!(
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                "consumed message"
            );
        }
    });

    // Create application state and router
    let state = AppState::default();
    let app = router(state);

    // Start HTTP server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid server address")?;

    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Cleanup
    info!("Shutting down...");
    drain_handle.abort();

    info!("Shutdown complete");
    Ok(())
}

/// Periodically marks this member alive in the group registry.
fn spawn_heartbeat(
    registry: Arc<dyn GroupRegistry>,
    member_id: String,
    period: Duration,
    ttl: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            if let Err(e) = registry.heartbeat(&member_id, ttl).await {
                warn!(error = %e, "failed to heartbeat to group registry");
            }
        }
    })
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("COHORT")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // Manual overrides for nested engine config from environment. The
    // config crate's nested parsing doesn't work reliably with our custom
    // string-or-list deserializers.
    if let Ok(brokers) = std::env::var("COHORT_ENGINE_BROKERS") {
        config.engine.brokers = brokers.split(',').map(|s| s.trim().to_string()).collect();
    }
    if let Ok(topics) = std::env::var("COHORT_ENGINE_TOPICS") {
        config.engine.topics = topics.split(',').map(|s| s.trim().to_string()).collect();
    }
    if let Ok(host_name) = std::env::var("COHORT_ENGINE_HOST_NAME") {
        config.engine.host_name = Some(host_name);
    }
    if let Ok(redis_host) = std::env::var("COHORT_ENGINE_REDIS_CONF_REDIS_HOST") {
        config.engine.redis_conf.redis_host = redis_host;
    }

    Ok(config)
}

/// Check component health on startup.
async fn check_health(config: &Config, group_registry: &dyn GroupRegistry) {
    // Check broker connectivity
    let broker_healthy = broker::health::check_connection(&config.engine.brokers).await;
    if broker_healthy {
        health().broker.set_healthy();
        info!("Broker connection: healthy");
    } else {
        health().broker.set_unhealthy("Connection failed");
        error!("Broker connection: unhealthy");
    }

    // Check registry connectivity via a cheap membership read
    match group_registry
        .members(Duration::from_secs(config.engine.redis_conf.heart_beat_freq * 3))
        .await
    {
        Ok(_) => {
            health().registry.set_healthy();
            info!("Registry connection: healthy");
        }
        Err(e) => {
            health().registry.set_unhealthy(e.to_string());
            error!("Registry connection: unhealthy");
        }
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
