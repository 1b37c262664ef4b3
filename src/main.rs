//! lark-spark-bridge server entry point.

use std::process::ExitCode;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use lark_spark_bridge::adapters::ai::{ChatParameters, SparkConfig, SparkConnector};
use lark_spark_bridge::adapters::events::InMemoryProcessedEventStore;
use lark_spark_bridge::adapters::http::{webhook_router, WebhookAppState};
use lark_spark_bridge::adapters::lark::{LarkConfig, LarkMessageClient};
use lark_spark_bridge::application::{
    AnswerChannelSession, CorrelationBridge, SessionConfig, SessionDriver, WebhookDispatcher,
};
use lark_spark_bridge::config::{AppConfig, ConfigError, ValidationError};
use lark_spark_bridge::domain::LarkSignatureVerifier;
use lark_spark_bridge::ports::{ChatPlatformError, VendorError};
use secrecy::ExposeSecret;

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid server address: {0}")]
    Address(#[from] ValidationError),

    #[error("cannot set up Spark connector: {0}")]
    Vendor(#[from] VendorError),

    #[error("cannot set up Lark client: {0}")]
    ChatPlatform(#[from] ChatPlatformError),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match AppConfig::load_validated() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("lark-spark-bridge: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Server exited with error");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if config.is_production() {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(config: AppConfig) -> Result<(), StartupError> {
    let addr = config.server.socket_addr()?;

    // Answer channel: bridge for the HTTP side, session task for the vendor side
    let (bridge, endpoint) = CorrelationBridge::new(config.bridge.answer_timeout());
    let bridge = Arc::new(bridge);

    let spark = SparkConfig::new(
        config.spark.app_id.clone(),
        config.spark.api_key.expose_secret().clone(),
        config.spark.api_secret.expose_secret().clone(),
    )
    .with_ws_url(config.spark.ws_url.clone())
    .with_chat_parameters(ChatParameters {
        domain: config.spark.domain.clone(),
        temperature: config.spark.temperature,
        max_tokens: config.spark.max_tokens,
    });
    let connector = Arc::new(SparkConnector::new(spark)?);

    let session_config = SessionConfig::default()
        .with_reconnect_backoff(config.bridge.reconnect_initial(), config.bridge.reconnect_max())
        .with_connect_timeout(config.bridge.connect_timeout())
        .with_answer_timeout(config.bridge.answer_timeout());
    let driver = SessionDriver::spawn(AnswerChannelSession::with_config(
        connector,
        endpoint,
        session_config,
    ));

    // Callback handling
    let lark = LarkMessageClient::new(
        LarkConfig::new(
            config.lark.app_id.clone(),
            config.lark.app_secret.expose_secret().clone(),
        )
        .with_host(config.lark.host.clone()),
    )?;

    let mut dispatcher = WebhookDispatcher::new(
        bridge.clone(),
        Arc::new(lark),
        Arc::new(InMemoryProcessedEventStore::new()),
        config.lark.verification_token.clone(),
    );
    if let Some(key) = config.lark.encrypt_key() {
        dispatcher = dispatcher.with_signature_verifier(LarkSignatureVerifier::new(key));
    } else {
        tracing::warn!("No Lark encrypt key configured, callback signatures are not checked");
    }

    let app = webhook_router(WebhookAppState {
        dispatcher: Arc::new(dispatcher),
        session_state: bridge.subscribe_state(),
    })
    .layer(DefaultBodyLimit::max(config.server.body_limit_bytes))
    .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, environment = ?config.server.environment, "Listening for Lark callbacks");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    driver.shutdown().await;
    tracing::info!("Shutdown complete");
    served.map_err(StartupError::from)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
