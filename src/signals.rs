// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Health and geo signals consumed by the resolver.
//!
//! Both collaborators are pull-only and eventually consistent. The resolver
//! never sees a probe failure directly: [`DnsHealthSource`] falls back to the
//! last known good answer per cluster and reports an unknown cluster as
//! unhealthy.
//!
//! # Health probing
//!
//! Each cluster's GSLB name server answers `localtargets-<host>` with the
//! addresses of the ingress nodes that currently serve `<host>` in that
//! cluster. A non-empty answer means the cluster is healthy for the host.

use crate::config::{normalize_host, ResolverConfig, Zone};
use crate::constants::{DEFAULT_DNS_PROBE_TIMEOUT_MILLIS, DNS_PORT, LOCAL_TARGETS_PREFIX};
use crate::errors::SignalError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use hickory_client::client::{Client, SyncClient};
use hickory_client::rr::{DNSClass, Name, RecordType};
use hickory_client::udp::UdpClientConnection;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

/// Health of one cluster for one host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterHealth {
    /// Whether the cluster currently serves the host
    pub healthy: bool,
    /// When `healthy` last changed; `None` if no change was ever observed
    pub last_transition: Option<DateTime<Utc>>,
}

impl ClusterHealth {
    /// A cluster whose health never changed.
    #[must_use]
    pub fn steady(healthy: bool) -> Self {
        Self {
            healthy,
            last_transition: None,
        }
    }
}

/// Point-in-time view of cluster health for one host.
///
/// `observed_at` is part of the snapshot so that every time-dependent
/// decision made from it (failover damping) is a pure function of the
/// snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HealthSnapshot {
    /// When the snapshot was taken
    pub observed_at: DateTime<Utc>,
    /// Health per cluster name
    pub clusters: BTreeMap<String, ClusterHealth>,
}

impl HealthSnapshot {
    /// A snapshot in which no cluster is known.
    #[must_use]
    pub fn empty(observed_at: DateTime<Utc>) -> Self {
        Self {
            observed_at,
            clusters: BTreeMap::new(),
        }
    }

    /// Whether `cluster` is known and healthy.
    #[must_use]
    pub fn is_healthy(&self, cluster: &str) -> bool {
        self.clusters.get(cluster).is_some_and(|h| h.healthy)
    }

    /// Whether `cluster` is healthy and has been for at least `window`.
    #[must_use]
    pub fn is_stable(&self, cluster: &str, window: Duration) -> bool {
        let Some(health) = self.clusters.get(cluster) else {
            return false;
        };
        if !health.healthy {
            return false;
        }
        match health.last_transition {
            None => true,
            Some(at) => chrono::Duration::from_std(window)
                .is_ok_and(|window| self.observed_at.signed_duration_since(at) >= window),
        }
    }
}

/// Source of per-host cluster health.
#[async_trait]
pub trait HealthSource: Send + Sync {
    /// Health of every cluster of `zone` for `host`.
    ///
    /// # Errors
    ///
    /// Returns a [`SignalError`] if no snapshot can be produced at all. The
    /// caller degrades to an empty snapshot.
    async fn snapshot(&self, host: &str, zone: &Zone) -> Result<HealthSnapshot, SignalError>;
}

/// Source of cluster geo tags.
#[async_trait]
pub trait GeoSource: Send + Sync {
    /// Geo tag of `cluster` under `config`, `None` if the cluster is untagged.
    ///
    /// # Errors
    ///
    /// Returns a [`SignalError`] if the source cannot be consulted.
    async fn geo_tag(
        &self,
        config: &ResolverConfig,
        cluster: &str,
    ) -> Result<Option<String>, SignalError>;
}

/// A single `localtargets-` lookup against one name server.
#[async_trait]
pub trait LocalTargetsProbe: Send + Sync {
    /// Whether `name_server` returns at least one address for `fqdn`.
    ///
    /// # Errors
    ///
    /// Returns a [`SignalError`] if the name server cannot be reached or
    /// answers with something that is not a DNS response.
    async fn has_targets(&self, name_server: &str, fqdn: &str) -> Result<bool, SignalError>;
}

/// [`LocalTargetsProbe`] over UDP using `hickory-client`.
#[derive(Clone, Debug)]
pub struct HickoryProbe {
    timeout: Duration,
}

impl HickoryProbe {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl LocalTargetsProbe for HickoryProbe {
    async fn has_targets(&self, name_server: &str, fqdn: &str) -> Result<bool, SignalError> {
        let unavailable = |reason: String| SignalError::Unavailable {
            source_name: name_server.to_string(),
            reason,
        };

        let server_addr = tokio::net::lookup_host((name_server, DNS_PORT))
            .await
            .map_err(|e| unavailable(format!("cannot resolve name server: {e}")))?
            .next()
            .ok_or_else(|| unavailable("name server has no address".to_string()))?;

        let name = Name::from_str(fqdn).map_err(|e| SignalError::InvalidData {
            source_name: name_server.to_string(),
            reason: format!("invalid query name {fqdn}: {e}"),
        })?;
        let timeout = self.timeout;

        let answered = tokio::task::spawn_blocking(move || {
            let conn = UdpClientConnection::with_timeout(server_addr, timeout)
                .map_err(|e| format!("failed to create UDP connection: {e}"))?;
            let client = SyncClient::new(conn);
            let response = client
                .query(&name, DNSClass::IN, RecordType::A)
                .map_err(|e| format!("query failed: {e}"))?;
            Ok::<bool, String>(
                response
                    .answers()
                    .iter()
                    .any(|r| r.record_type() == RecordType::A),
            )
        })
        .await
        .map_err(|e| unavailable(format!("probe task failed: {e}")))?;

        answered.map_err(unavailable)
    }
}

/// Health source probing each cluster's name server for `localtargets-<host>`.
///
/// Remembers the last successful answer per `(host, cluster)`. A failed probe
/// reuses that answer; a cluster that was never answered for is unhealthy.
///
/// Name servers are queried concurrently and each query is bounded by the
/// probe timeout, so one observation takes at most one probe timeout no
/// matter how many clusters a zone has.
pub struct DnsHealthSource<P = HickoryProbe> {
    probe: P,
    probe_timeout: Duration,
    last_known: Mutex<BTreeMap<(String, String), ClusterHealth>>,
}

impl DnsHealthSource<HickoryProbe> {
    /// Probe over UDP with the given per-query timeout.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(HickoryProbe::new(timeout)).with_probe_timeout(timeout)
    }
}

impl<P: LocalTargetsProbe> DnsHealthSource<P> {
    #[must_use]
    pub fn new(probe: P) -> Self {
        Self {
            probe,
            probe_timeout: Duration::from_millis(DEFAULT_DNS_PROBE_TIMEOUT_MILLIS),
            last_known: Mutex::new(BTreeMap::new()),
        }
    }

    /// Bound each name server query to `timeout`. A query that runs out of
    /// time counts as a failed probe.
    #[must_use]
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    async fn probe_one(&self, name_server: &str, fqdn: &str) -> Result<bool, SignalError> {
        tokio::time::timeout(self.probe_timeout, self.probe.has_targets(name_server, fqdn))
            .await
            .unwrap_or_else(|_| {
                Err(SignalError::Unavailable {
                    source_name: name_server.to_string(),
                    reason: format!("no answer within {:?}", self.probe_timeout),
                })
            })
    }

    /// Probe every cluster of `zone` for `host` and record the answers as
    /// observed at `now`.
    pub async fn observe(&self, host: &str, zone: &Zone, now: DateTime<Utc>) -> HealthSnapshot {
        let host = normalize_host(host);
        let fqdn = &format!("{LOCAL_TARGETS_PREFIX}{host}.");

        let probes = zone
            .external_cluster_names
            .iter()
            .map(|(cluster, name_server)| async move {
                (cluster.clone(), self.probe_one(name_server, fqdn).await)
            });
        let probed = join_all(probes).await;

        let mut last_known = self
            .last_known
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut clusters = BTreeMap::new();
        for (cluster, answer) in probed {
            let key = (host.clone(), cluster.clone());
            let previous = last_known.get(&key).cloned();
            let health = match (answer, previous) {
                (Ok(healthy), Some(prev)) if prev.healthy == healthy => prev,
                (Ok(healthy), Some(_)) => ClusterHealth {
                    healthy,
                    last_transition: Some(now),
                },
                (Ok(healthy), None) => ClusterHealth::steady(healthy),
                (Err(e), Some(prev)) => {
                    warn!(
                        host = %host,
                        cluster = %cluster,
                        error = %e,
                        "Health probe failed, keeping last known state"
                    );
                    prev
                }
                (Err(e), None) => {
                    warn!(
                        host = %host,
                        cluster = %cluster,
                        error = %e,
                        "Health probe failed with no prior state, treating cluster as unhealthy"
                    );
                    clusters.insert(cluster, ClusterHealth::steady(false));
                    continue;
                }
            };
            debug!(
                host = %host,
                cluster = %cluster,
                healthy = health.healthy,
                "Observed cluster health"
            );
            last_known.insert(key, health.clone());
            clusters.insert(cluster, health);
        }

        HealthSnapshot {
            observed_at: now,
            clusters,
        }
    }
}

#[async_trait]
impl<P: LocalTargetsProbe> HealthSource for DnsHealthSource<P> {
    async fn snapshot(&self, host: &str, zone: &Zone) -> Result<HealthSnapshot, SignalError> {
        Ok(self.observe(host, zone, Utc::now()).await)
    }
}

/// Geo source backed by `clusterGeoTags` of the configuration in use for the
/// pass.
#[derive(Clone, Copy, Debug, Default)]
pub struct StaticGeoSource;

#[async_trait]
impl GeoSource for StaticGeoSource {
    async fn geo_tag(
        &self,
        config: &ResolverConfig,
        cluster: &str,
    ) -> Result<Option<String>, SignalError> {
        Ok(config.cluster_geo_tags.get(cluster).cloned())
    }
}

#[cfg(test)]
#[path = "signals_tests.rs"]
mod signals_tests;
