//! `fusion-dispatcher`: runs the email subscriber until shutdown.

use product_fusion::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

// =============================================================================
// Wiring
// =============================================================================

fn redis_config(settings: &Settings) -> RedisConfig {
    RedisConfig::builder()
        .url(&settings.redis_url)
        .pool_size(settings.redis_pool_size)
        .build()
}

fn smtp_config(settings: &Settings) -> Result<SmtpConfig, Box<dyn std::error::Error>> {
    let security: SmtpSecurity = settings.smtp_security.parse()?;
    let mut config = SmtpConfig::new(&settings.smtp_server)
        .security(security)
        .port(settings.smtp_port);

    if settings.has_smtp_credentials() {
        config = config.credentials(&settings.smtp_username, &settings.smtp_password);
    }
    Ok(config)
}

fn mailer(settings: &Settings) -> Result<Mailer, Box<dyn std::error::Error>> {
    let mailer = Mailer::smtp(smtp_config(settings)?)?;
    let sender = settings.sender();

    if sender.is_empty() {
        warn!("No sender configured; every email will fail until FUSION_MAIL_FROM or FUSION_SMTP_USERNAME is set");
        return Ok(mailer);
    }
    Ok(mailer.default_from(sender)?)
}

// =============================================================================
// Graceful Shutdown
// =============================================================================

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received, starting graceful shutdown...");
}

/// Resolves once the subscriber has stopped on its own.
async fn subscriber_exited(dispatch: &DispatchService) {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    loop {
        interval.tick().await;
        if !dispatch.is_running() {
            return;
        }
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::load()?;

    let mut log_config = LogConfig::from_env();
    let level_error = match settings.log_level.as_deref() {
        Some(name) => log_config.apply_level(name).err(),
        None => None,
    };
    product_fusion::log::init_with(log_config);
    if let Some(e) = level_error {
        warn!(error = %e, "Ignoring configured log level");
    }

    info!(
        environment = %settings.environment,
        smtp_server = %settings.smtp_server,
        "Starting fusion-dispatcher"
    );

    let redis = Arc::new(RedisService::new(redis_config(&settings)).await?);
    let mailer = mailer(&settings)?;
    if !mailer.is_healthy().await {
        warn!(smtp_server = %settings.smtp_server, "SMTP server refused a test connection");
    }

    let mut dispatch = DispatchService::redis(redis, mailer)
        .with_templates(HandlebarsEngine::transactional()?);
    if let Some(channel) = &settings.email_channel {
        dispatch = dispatch.with_channel_name(channel);
    }

    dispatch.start().await?;
    info!(channel = %dispatch.channel_name(), "Dispatcher ready");

    tokio::select! {
        _ = shutdown_signal() => {
            info!("Shutting down...");
        }
        _ = subscriber_exited(&dispatch) => {
            warn!("Subscriber stopped without a shutdown signal");
        }
    }

    let exit = dispatch.stop().await;
    let stats = dispatch.stats();
    info!(
        exit = %exit,
        received = stats.received,
        sent = stats.sent,
        failed = stats.failed,
        skipped = stats.skipped,
        "Dispatcher stopped"
    );

    match exit {
        SubscriberExit::Cancelled => Ok(()),
        other => Err(format!("subscriber exited: {other}").into()),
    }
}
