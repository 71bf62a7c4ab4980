// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use axum_server::tls_rustls::RustlsConfig;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use nano_wallet_gateway::{
    api::router,
    config::{GatewayConfig, DEFAULT_LOG_FILTER, LOG_FORMAT_ENV},
    hub::SubscriptionHub,
    ledger::NodeClient,
    prices::{InMemoryPriceCache, PriceMirror, RedisPriceSource},
    push::{CallbackProcessor, InMemoryTokenStore, LogNotifier},
    relay::{self, UpstreamRelay},
    state::AppState,
    submission::SubmissionPipeline,
    work::{
        providers::{BoomPowProvider, NodeWorkProvider},
        WorkArbiter, WorkProvider,
    },
};

const PRICE_CACHE_CAPACITY: usize = 256;
const PRICE_TTL: Duration = Duration::from_secs(600);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    // Install the ring crypto provider for rustls (must be done before any TLS operations)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let config = match GatewayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Gateway failed");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var(LOG_FORMAT_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn work_providers(config: &GatewayConfig) -> Result<Vec<Arc<dyn WorkProvider>>, String> {
    let mut providers: Vec<Arc<dyn WorkProvider>> = Vec::new();
    if let Some(url) = &config.work_url {
        providers.push(Arc::new(
            NodeWorkProvider::new(url.clone()).map_err(|e| e.to_string())?,
        ));
    }
    if let Some(bpow) = &config.bpow {
        providers.push(Arc::new(
            BoomPowProvider::new(bpow.url.clone(), bpow.key.clone()).map_err(|e| e.to_string())?,
        ));
    }
    Ok(providers)
}

async fn run(config: GatewayConfig) -> Result<(), String> {
    let mode = config.mode;
    let node = Arc::new(NodeClient::new(config.rpc_url.clone()).map_err(|e| e.to_string())?);
    info!(url = node.url(), mode = ?mode, "Node RPC client ready");

    let arbiter = WorkArbiter::new(work_providers(&config)?);
    if arbiter.provider_count() == 0 {
        warn!("No work provider configured; do_work submissions will be refused");
    } else {
        info!(providers = ?arbiter.provider_names(), "Work providers configured");
    }

    let shutdown = CancellationToken::new();

    let prices = Arc::new(InMemoryPriceCache::new(PRICE_CACHE_CAPACITY, PRICE_TTL));
    match &config.redis_url {
        Some(url) => {
            let source = RedisPriceSource::new(url).map_err(|e| e.to_string())?;
            let mirror = PriceMirror::new(
                Arc::new(source),
                prices.clone(),
                config.price_sync_interval,
            );
            tokio::spawn(mirror.run(shutdown.clone()));
        }
        None => warn!("REDIS_URL not set; prices will be reported as null"),
    }

    let tokens = Arc::new(InMemoryTokenStore::new());
    let hub = Arc::new(SubscriptionHub::new(
        node.clone(),
        prices,
        tokens.clone(),
        mode,
    ));

    let (events_tx, events_rx) = relay::channel();

    let (relay_state, _idle_events) = match &config.node_ws_url {
        Some(url) => {
            let upstream = UpstreamRelay::new(url.clone());
            let state = upstream.state();
            tokio::spawn(upstream.run(events_tx, shutdown.clone()));
            (Some(state), None)
        }
        None => {
            warn!("NODE_WS_URL not set; confirmations will not be pushed");
            // Held open so the hub keeps its price timer without a relay.
            (None, Some(events_tx))
        }
    };
    let hub_task = tokio::spawn(hub.clone().run(
        events_rx,
        config.price_interval,
        shutdown.clone(),
    ));

    let state = AppState {
        node: node.clone(),
        submissions: SubmissionPipeline::new(node.clone(), arbiter, mode, config.work_deadline),
        hub,
        callbacks: CallbackProcessor::new(node, tokens, Arc::new(LogNotifier), mode),
        relay_state,
        mode,
        max_count: config.max_count,
    };
    let app = router(state);

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match wait_for_signal().await {
                Ok(signal) => info!(signal, "Shutdown signal received"),
                Err(e) => error!(error = %e, "Failed to install signal handlers"),
            }
            shutdown.cancel();
        }
    });

    let handle = axum_server::Handle::new();
    tokio::spawn({
        let handle = handle.clone();
        let shutdown = shutdown.clone();
        async move {
            shutdown.cancelled().await;
            handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
        }
    });

    let addr = config.bind_addr;
    let served = match &config.tls {
        Some(paths) => {
            let tls = RustlsConfig::from_pem_file(&paths.cert, &paths.key)
                .await
                .map_err(|e| format!("failed to load TLS certificate: {e}"))?;
            println!("Wallet gateway listening on https://{addr} (docs at /docs)");
            axum_server::bind_rustls(addr, tls)
                .handle(handle)
                .serve(app.into_make_service())
                .await
        }
        None => {
            println!("Wallet gateway listening on http://{addr} (docs at /docs)");
            axum_server::bind(addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await
        }
    };

    shutdown.cancel();
    let _ = hub_task.await;
    info!("Gateway stopped");
    served.map_err(|e| format!("server error: {e}"))
}

async fn wait_for_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigquit = signal(SignalKind::quit())?;

    Ok(tokio::select! {
        _ = sigint.recv() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
        _ = sighup.recv() => "SIGHUP",
        _ = sigquit.recv() => "SIGQUIT",
    })
}
