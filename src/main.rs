// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context as _, Result};
use clap::Parser;
use futures::StreamExt;
use gslb::{
    config::{ResolverConfig, SharedConfig},
    constants::{DEFAULT_CONFIG_PATH, DEFAULT_CONTROLLER_CONCURRENCY, TOKIO_WORKER_THREADS},
    crd::Gslb,
    reconcilers::{error_policy, reconcile, GslbReconciler},
    resolver::Resolver,
    signals::{DnsHealthSource, StaticGeoSource},
    store::KubeObjectStore,
};
use k8s_openapi::api::networking::v1::Ingress;
use kube::{
    runtime::{controller, watcher, Controller},
    Api, Client,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Multi-cluster GSLB controller.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path of the zone configuration file
    #[arg(long, env = "GSLB_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Maximum number of `Gslb` objects reconciled in parallel
    #[arg(long, env = "GSLB_CONCURRENCY", default_value_t = DEFAULT_CONTROLLER_CONCURRENCY)]
    concurrency: u16,

    /// Watch a single namespace instead of the whole cluster
    #[arg(long, env = "GSLB_NAMESPACE")]
    namespace: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("gslb-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<()> {
    // Respects RUST_LOG (default: info) and RUST_LOG_FORMAT (json or text)
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    info!("Starting GSLB controller");
    debug!(?args, "Parsed arguments");

    let config = ResolverConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    info!(
        zones = config.zones.len(),
        geo_tag = %config.cluster_geo_tag,
        "Loaded zone configuration"
    );
    let probe_timeout = config.dns_probe_timeout();
    let config = SharedConfig::new(config);

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;
    debug!("Kubernetes client initialized successfully");

    let resolver = Resolver::new(
        Arc::new(DnsHealthSource::with_timeout(probe_timeout)),
        Arc::new(StaticGeoSource),
    );
    let shutdown = CancellationToken::new();
    let reconciler = Arc::new(
        GslbReconciler::new(
            Arc::new(KubeObjectStore::new(client.clone())),
            Arc::new(resolver),
            config.clone(),
        )
        .with_shutdown(shutdown.clone()),
    );

    tokio::spawn(reload_on_hangup(args.config.clone(), config));

    let (gslbs, ingresses) = match args.namespace.as_deref() {
        Some(namespace) => {
            info!(namespace, "Watching a single namespace");
            (
                Api::<Gslb>::namespaced(client.clone(), namespace),
                Api::<Ingress>::namespaced(client, namespace),
            )
        }
        None => (Api::<Gslb>::all(client.clone()), Api::<Ingress>::all(client)),
    };

    info!(concurrency = args.concurrency, "Starting Gslb controller");

    Controller::new(gslbs, watcher::Config::default())
        .owns(ingresses, watcher::Config::default())
        .with_config(controller::Config::default().concurrency(args.concurrency))
        .graceful_shutdown_on(shutdown_signal(shutdown))
        .run(reconcile, error_policy, reconciler)
        .for_each(|result| {
            match result {
                Ok((object, _)) => debug!(gslb = %object.name, "Reconciled"),
                Err(controller::Error::ReconcilerFailed(err, object)) => {
                    debug!(gslb = %object.name, error = %err, "Reconcile failed");
                }
                Err(err) => warn!(error = %err, "Controller error"),
            }
            futures::future::ready(())
        })
        .await;

    info!("GSLB controller stopped");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM after cancelling every in-flight call.
async fn shutdown_signal(shutdown: CancellationToken) {
    wait_for_termination().await;
    info!("Shutdown requested, cancelling in-flight reconciliations");
    shutdown.cancel();
}

#[cfg(unix)]
async fn wait_for_termination() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(e) => {
            error!(error = %e, "Failed to install SIGTERM handler");
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl-C");
            }
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_termination() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C");
    }
}

/// Reload the zone configuration on SIGHUP. An invalid file keeps the
/// previous snapshot.
#[cfg(unix)]
async fn reload_on_hangup(path: PathBuf, config: SharedConfig) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(hangup) => hangup,
        Err(e) => {
            warn!(error = %e, "Failed to install SIGHUP handler, configuration reload disabled");
            return;
        }
    };

    while hangup.recv().await.is_some() {
        reload(&path, &config);
    }
}

#[cfg(not(unix))]
async fn reload_on_hangup(_path: PathBuf, _config: SharedConfig) {}

fn reload(path: &Path, config: &SharedConfig) {
    match ResolverConfig::load(path) {
        Ok(next) => {
            info!(zones = next.zones.len(), "Reloaded zone configuration");
            config.replace(next);
        }
        Err(e) => error!(
            path = %path.display(),
            error = %e,
            "Invalid configuration, keeping the previous one"
        ),
    }
}
