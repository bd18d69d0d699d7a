// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Resolution of declared hosts into the clusters that serve them.
//!
//! A [`GslbResolver`] turns a `Gslb` spec into a [`ResolvedState`]: for every
//! host managed by a configured zone, the clusters (and their name servers)
//! that should answer for it right now. The result is rebuilt on every pass
//! and never stored.
//!
//! Resolution only fails for conditions that another pass cannot fix (an
//! unknown strategy type, a corrupt zone) or when the reconciliation is
//! interrupted. Missing health or geo data degrades the answer instead.

pub mod strategy;

use crate::config::{ResolverConfig, Zone};
use crate::context::ReconcileContext;
use crate::crd::GslbSpec;
use crate::errors::{Interrupted, ResolveError};
use crate::signals::{GeoSource, HealthSnapshot, HealthSource};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub use strategy::{Selection, Strategy};

/// A cluster selected to answer for a host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedTarget {
    /// Externally reachable name server of the cluster
    pub name_server: String,
    /// Relative weight, set by the weighted strategy only
    pub weight: Option<u32>,
}

/// Cluster name → target, for one host.
pub type HostTargets = BTreeMap<String, ResolvedTarget>;

/// Resolved backend set of one `Gslb` for one pass.
///
/// Hosts that no zone manages are absent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolvedState {
    /// Host → selected clusters
    pub hosts: BTreeMap<String, HostTargets>,
}

impl ResolvedState {
    /// Hosts managed by a zone, sorted.
    #[must_use]
    pub fn managed_hosts(&self) -> Vec<String> {
        self.hosts.keys().cloned().collect()
    }

    /// Host → name servers answering for it, sorted.
    #[must_use]
    pub fn healthy_records(&self) -> BTreeMap<String, Vec<String>> {
        self.hosts
            .iter()
            .map(|(host, targets)| {
                let mut servers: Vec<String> =
                    targets.values().map(|t| t.name_server.clone()).collect();
                servers.sort();
                (host.clone(), servers)
            })
            .collect()
    }

    /// Compact, deterministic rendering of the whole state.
    ///
    /// `host=cluster[:weight],...` entries separated by `;`. A host without
    /// targets renders as `host=`.
    #[must_use]
    pub fn render(&self) -> String {
        self.hosts
            .iter()
            .map(|(host, targets)| {
                let clusters = targets
                    .iter()
                    .map(|(cluster, target)| match target.weight {
                        Some(weight) => format!("{cluster}:{weight}"),
                        None => cluster.clone(),
                    })
                    .collect::<Vec<_>>()
                    .join(",");
                format!("{host}={clusters}")
            })
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// Turns a `Gslb` spec into its resolved backend set.
#[async_trait]
pub trait GslbResolver: Send + Sync {
    /// Resolve every declared host of `spec` against one configuration
    /// snapshot.
    ///
    /// Identical inputs (spec, configuration snapshot, health snapshot)
    /// produce identical output.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::UnknownStrategy`], [`ResolveError::CorruptZone`],
    /// or [`ResolveError::Interrupted`] when `ctx` is cancelled. A signal call
    /// that exceeds its deadline degrades the answer instead.
    async fn resolve(
        &self,
        ctx: &ReconcileContext,
        config: &ResolverConfig,
        spec: &GslbSpec,
    ) -> Result<ResolvedState, ResolveError>;
}

/// Resolver backed by injected signal sources.
#[derive(Clone)]
pub struct Resolver {
    health: Arc<dyn HealthSource>,
    geo: Arc<dyn GeoSource>,
}

impl Resolver {
    #[must_use]
    pub fn new(health: Arc<dyn HealthSource>, geo: Arc<dyn GeoSource>) -> Self {
        Self { health, geo }
    }

    async fn health_for(
        &self,
        ctx: &ReconcileContext,
        host: &str,
        zone: &Zone,
    ) -> Result<HealthSnapshot, Interrupted> {
        match ctx.run("health snapshot", self.health.snapshot(host, zone)).await {
            Ok(Ok(snapshot)) => Ok(snapshot),
            Ok(Err(e)) => {
                warn!(
                    host = %host,
                    error = %e,
                    "Health signal unavailable, no cluster is considered healthy"
                );
                Ok(HealthSnapshot::empty(Utc::now()))
            }
            Err(e @ Interrupted::DeadlineExceeded { .. }) => {
                warn!(
                    host = %host,
                    error = %e,
                    "Health signal too slow, no cluster is considered healthy"
                );
                Ok(HealthSnapshot::empty(Utc::now()))
            }
            Err(e) => Err(e),
        }
    }

    async fn geo_tags_for(
        &self,
        ctx: &ReconcileContext,
        config: &ResolverConfig,
        zone: &Zone,
    ) -> Result<BTreeMap<String, String>, Interrupted> {
        let mut tags = BTreeMap::new();
        for cluster in zone.external_cluster_names.keys() {
            match ctx.run("geo lookup", self.geo.geo_tag(config, cluster)).await {
                Ok(Ok(Some(tag))) => {
                    tags.insert(cluster.clone(), tag);
                }
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    warn!(
                        cluster = %cluster,
                        error = %e,
                        "Geo signal unavailable, treating cluster as untagged"
                    );
                }
                Err(e @ Interrupted::DeadlineExceeded { .. }) => {
                    warn!(
                        cluster = %cluster,
                        error = %e,
                        "Geo signal too slow, treating cluster as untagged"
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Ok(tags)
    }
}

/// Reject zones that cannot be turned into answers.
fn check_zone(zone: &Zone) -> Result<(), ResolveError> {
    if zone.external_cluster_names.is_empty() {
        return Err(ResolveError::CorruptZone {
            domain: zone.domain_pattern.clone(),
            reason: "zone has no clusters".to_string(),
        });
    }
    if let Some((cluster, _)) = zone
        .external_cluster_names
        .iter()
        .find(|(_, ns)| ns.trim().is_empty())
    {
        return Err(ResolveError::CorruptZone {
            domain: zone.domain_pattern.clone(),
            reason: format!("cluster '{cluster}' has an empty name server"),
        });
    }
    Ok(())
}

#[async_trait]
impl GslbResolver for Resolver {
    async fn resolve(
        &self,
        ctx: &ReconcileContext,
        config: &ResolverConfig,
        spec: &GslbSpec,
    ) -> Result<ResolvedState, ResolveError> {
        let strategy = Strategy::from_spec(&spec.strategy)?;

        let mut state = ResolvedState::default();
        for host in spec.normalized_hosts() {
            if ctx.is_cancelled() {
                return Err(Interrupted::Cancelled {
                    operation: "resolve".to_string(),
                }
                .into());
            }

            let Some(zone) = config.find_zone(&host) else {
                debug!(host = %host, "No configured zone manages host, skipping");
                continue;
            };
            check_zone(zone)?;

            let health = if strategy.needs_health() {
                self.health_for(ctx, &host, zone).await?
            } else {
                HealthSnapshot::empty(Utc::now())
            };
            let geo_tags = if strategy.needs_geo() {
                self.geo_tags_for(ctx, config, zone).await?
            } else {
                BTreeMap::new()
            };

            let targets = strategy.select(&Selection {
                zone,
                health: &health,
                geo_tags: &geo_tags,
                local_geo_tag: &config.cluster_geo_tag,
                stability: config.failover_stability(),
            });
            debug!(
                host = %host,
                strategy = %strategy,
                zone = %zone.domain_pattern,
                clusters = targets.len(),
                "Resolved host"
            );
            state.hosts.insert(host, targets);
        }

        Ok(state)
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
