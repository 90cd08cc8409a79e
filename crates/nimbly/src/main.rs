mod cli;
mod metrics;
mod token_file;
mod web;

use std::sync::{Arc, Mutex};

use clap::Parser;
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use nimbly_api::{HomeCoachClient, OAuthClient, Scope, TransportConfig, WeatherClient};
use nimbly_config::Settings;
use nimbly_core::{
    Aggregator, CoreError, FetchFuture, LabelSchema, RefreshCache, Snapshot, SourceKind,
};

use crate::cli::Cli;
use crate::metrics::MetricsView;
use crate::web::AppState;

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("API client setup failed: {0}")]
    Api(#[from] nimbly_api::Error),

    #[error("metrics setup failed: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut settings = match nimbly_config::load_settings(cli.config_file.as_deref()) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("Error in configuration: {err}");
            std::process::exit(1);
        }
    };
    cli.apply(&mut settings);

    // Configuration problems are the only fatal error class; everything
    // after this point degrades gracefully.
    if let Err(err) = settings.validate() {
        eprintln!("Error in configuration: {err}");
        std::process::exit(1);
    }

    init_tracing(&settings.log_level);
    info!(version = env!("CARGO_PKG_VERSION"), "starting nimbly");

    if let Err(err) = run(settings).await {
        error!(error = %err, "exporter failed");
        std::process::exit(1);
    }
}

fn init_tracing(directive: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive)),
        )
        .with_target(false)
        .init();
}

#[allow(clippy::too_many_lines)]
async fn run(settings: Settings) -> Result<(), StartupError> {
    let collector = settings.collector();
    let transport = TransportConfig::default();

    let mut scopes = Vec::new();
    if collector.enable_weather {
        scopes.push(Scope::ReadStation);
    }
    if collector.enable_homecoach {
        scopes.push(Scope::ReadHomecoach);
    }

    let auth = Arc::new(OAuthClient::new(
        settings.client_id.clone(),
        SecretString::from(settings.client_secret.clone()),
        scopes,
        &transport,
    )?);

    // Restore persisted authentication, if any.
    match settings.token_file {
        Some(ref path) => {
            if let Some(token) = token_file::load_token(path)? {
                auth.install_token(token);
            }
        }
        None => warn!("No token file set! Authentication will be lost on restart."),
    }

    let cancel = CancellationToken::new();

    // Persist token updates (grant results rotate the refresh token, so
    // every update must reach disk).
    if let Some(path) = settings.token_file.clone() {
        let mut updates = auth.subscribe();
        let persist_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = persist_cancel.cancelled() => break,
                    changed = updates.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let token = updates.borrow_and_update().clone();
                        // A cleared token (None) is handled by the
                        // delete-token endpoint, which removes the file.
                        if let Some(token) = token {
                            match token_file::save_token(&path, &token) {
                                Ok(()) => debug!(path = %path.display(), "token persisted"),
                                Err(err) => error!(error = %err, "error saving token"),
                            }
                        }
                    }
                }
            }
        });
    }

    // One refresh cache per enabled data source.
    let mut sources = Vec::new();

    if collector.enable_weather {
        let client = Arc::new(WeatherClient::new(&transport)?);
        let reader_auth = Arc::clone(&auth);
        let reader = Box::new(move || -> FetchFuture {
            let client = Arc::clone(&client);
            let auth = Arc::clone(&reader_auth);
            Box::pin(async move {
                let token = auth.current_token().await.map_err(CoreError::from)?;
                let access = token
                    .access_token
                    .ok_or(nimbly_api::Error::NotAuthenticated)
                    .map_err(CoreError::from)?;
                let data = client
                    .get_stations_data(&access)
                    .await
                    .map_err(CoreError::from)?;
                Ok(Snapshot::from(data))
            })
        });
        sources.push(RefreshCache::new(
            SourceKind::Weather,
            reader,
            collector.refresh_interval,
            cancel.clone(),
        ));
    } else {
        info!("Weather station collector disabled by configuration.");
    }

    if collector.enable_homecoach {
        let client = Arc::new(HomeCoachClient::new(&transport)?);
        let reader_auth = Arc::clone(&auth);
        let reader = Box::new(move || -> FetchFuture {
            let client = Arc::clone(&client);
            let auth = Arc::clone(&reader_auth);
            Box::pin(async move {
                let token = auth.current_token().await.map_err(CoreError::from)?;
                let access = token
                    .access_token
                    .ok_or(nimbly_api::Error::NotAuthenticated)
                    .map_err(CoreError::from)?;
                let data = client
                    .get_homecoach_data(&access)
                    .await
                    .map_err(CoreError::from)?;
                Ok(Snapshot::from(data))
            })
        });
        sources.push(RefreshCache::new(
            SourceKind::HomeCoach,
            reader,
            collector.refresh_interval,
            cancel.clone(),
        ));
    } else {
        info!("Home Coach collector disabled by configuration.");
    }

    let enabled: Vec<SourceKind> = sources.iter().map(|cache| cache.kind()).collect();
    let aggregator = Aggregator::new(sources, collector.stale_threshold);

    let state = Arc::new(AppState {
        aggregator,
        auth: Arc::clone(&auth),
        v1: MetricsView::new(LabelSchema::PerSource, &enabled)?,
        v2: MetricsView::new(LabelSchema::Unified, &enabled)?,
        settings: settings.clone(),
        pending_auth_state: Mutex::new(None),
    });

    let app = web::router(state);
    let listener = tokio::net::TcpListener::bind(&settings.listen_address).await?;
    info!("Listening on {}...", settings.listen_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel))
        .await?;

    // Final save: a refresh may have rotated the token after the last
    // persisted update was written.
    if let Some(ref path) = settings.token_file {
        if let Some(token) = auth.current() {
            info!("Saving token to {} ...", path.display());
            if let Err(err) = token_file::save_token(path, &token) {
                error!(error = %err, "error persisting token");
            }
        }
    }

    info!("shutdown complete");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM, cancelling in-flight refreshes. Their
/// partial work is discarded safely -- state only commits atomically at
/// the end of an attempt.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("ctrl-c handler installs");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installs")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received");
    cancel.cancel();
}
