// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Strategy variants and their target selection.
//!
//! Selection is a pure function of the zone, a health snapshot and the geo
//! tags of the zone's clusters. Every ordering below is derived from sorted
//! maps or from the configured priority, never from the order in which a
//! signal source happened to report clusters.

use super::{HostTargets, ResolvedTarget};
use crate::config::Zone;
use crate::constants::DEFAULT_CLUSTER_WEIGHT;
use crate::crd::StrategySpec;
use crate::errors::ResolveError;
use crate::signals::HealthSnapshot;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Strategy declared on a `Gslb`, built once from `spec.strategy`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Every cluster of the zone, health ignored.
    Static,
    /// Every healthy cluster with equal eligibility.
    RoundRobin,
    /// The highest-priority healthy cluster.
    Failover {
        /// Explicit priority list, highest first
        priority: Vec<String>,
        /// Geo tag whose clusters come first when `priority` is empty
        primary_geo_tag: Option<String>,
    },
    /// The healthy clusters closest to the local cluster.
    GeoIp,
    /// Healthy clusters with a non-zero weight.
    Weighted {
        /// Weights by cluster name; unlisted clusters weigh 1
        weights: BTreeMap<String, u32>,
    },
}

/// Inputs of a single host selection.
#[derive(Clone, Copy, Debug)]
pub struct Selection<'a> {
    /// Zone managing the host
    pub zone: &'a Zone,
    /// Health of the zone's clusters for the host
    pub health: &'a HealthSnapshot,
    /// Geo tag by cluster name; untagged clusters are absent
    pub geo_tags: &'a BTreeMap<String, String>,
    /// Geo tag of the cluster running this controller
    pub local_geo_tag: &'a str,
    /// Failover stability window
    pub stability: Duration,
}

impl Strategy {
    /// Build the strategy declared in `spec`. Type names are case-insensitive.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::UnknownStrategy`] for an unrecognized type.
    pub fn from_spec(spec: &StrategySpec) -> Result<Self, ResolveError> {
        match spec.r#type.trim().to_ascii_lowercase().as_str() {
            "static" => Ok(Self::Static),
            "roundrobin" => Ok(Self::RoundRobin),
            "failover" => Ok(Self::Failover {
                priority: spec.priority.clone(),
                primary_geo_tag: spec
                    .primary_geo_tag
                    .as_deref()
                    .map(str::trim)
                    .filter(|tag| !tag.is_empty())
                    .map(str::to_string),
            }),
            "geoip" => Ok(Self::GeoIp),
            "weighted" => Ok(Self::Weighted {
                weights: spec.weights.clone(),
            }),
            _ => Err(ResolveError::UnknownStrategy(spec.r#type.clone())),
        }
    }

    /// Canonical type name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::RoundRobin => "roundRobin",
            Self::Failover { .. } => "failover",
            Self::GeoIp => "geoip",
            Self::Weighted { .. } => "weighted",
        }
    }

    /// Whether selection consults cluster health.
    #[must_use]
    pub fn needs_health(&self) -> bool {
        !matches!(self, Self::Static)
    }

    /// Whether selection consults cluster geo tags.
    #[must_use]
    pub fn needs_geo(&self) -> bool {
        match self {
            Self::GeoIp => true,
            Self::Failover {
                priority,
                primary_geo_tag,
            } => priority.is_empty() && primary_geo_tag.is_some(),
            Self::Static | Self::RoundRobin | Self::Weighted { .. } => false,
        }
    }

    /// Select the clusters answering for one host.
    #[must_use]
    pub fn select(&self, input: &Selection<'_>) -> HostTargets {
        match self {
            Self::Static => targets(input.zone, input.zone.external_cluster_names.keys()),
            Self::RoundRobin => targets(input.zone, healthy(input)),
            Self::Failover {
                priority,
                primary_geo_tag,
            } => {
                let order = failover_order(input, priority, primary_geo_tag.as_deref());
                order
                    .iter()
                    .find(|cluster| input.health.is_stable(cluster, input.stability))
                    .or_else(|| order.iter().find(|cluster| input.health.is_healthy(cluster)))
                    .map(|cluster| targets(input.zone, std::iter::once(cluster)))
                    .unwrap_or_default()
            }
            Self::GeoIp => {
                let mut tiers: BTreeMap<u8, Vec<&String>> = BTreeMap::new();
                for cluster in healthy(input) {
                    let tier = proximity(input.local_geo_tag, input.geo_tags.get(cluster));
                    tiers.entry(tier).or_default().push(cluster);
                }
                tiers
                    .into_values()
                    .next()
                    .map(|closest| targets(input.zone, closest))
                    .unwrap_or_default()
            }
            Self::Weighted { weights } => healthy(input)
                .into_iter()
                .filter_map(|cluster| {
                    let weight = weights
                        .get(cluster)
                        .copied()
                        .unwrap_or(DEFAULT_CLUSTER_WEIGHT);
                    if weight == 0 {
                        return None;
                    }
                    input.zone.external_cluster_names.get(cluster).map(|ns| {
                        (
                            cluster.clone(),
                            ResolvedTarget {
                                name_server: ns.clone(),
                                weight: Some(weight),
                            },
                        )
                    })
                })
                .collect(),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Clusters of the zone that are healthy, in name order.
fn healthy<'a>(input: &Selection<'a>) -> Vec<&'a String> {
    input
        .zone
        .external_cluster_names
        .keys()
        .filter(|cluster| input.health.is_healthy(cluster))
        .collect()
}

fn targets<'a>(zone: &Zone, clusters: impl IntoIterator<Item = &'a String>) -> HostTargets {
    clusters
        .into_iter()
        .filter_map(|cluster| {
            let ns = zone.external_cluster_names.get(cluster)?;
            let target = ResolvedTarget {
                name_server: ns.clone(),
                weight: None,
            };
            Some((cluster.clone(), target))
        })
        .collect()
}

/// Zone clusters in failover order, highest priority first.
///
/// Listed priorities come first (unknown names are ignored), then clusters
/// tagged with the primary geo tag, then everything else by name.
fn failover_order(
    input: &Selection<'_>,
    priority: &[String],
    primary_geo_tag: Option<&str>,
) -> Vec<String> {
    let clusters = &input.zone.external_cluster_names;
    let mut order: Vec<String> = Vec::with_capacity(clusters.len());
    for cluster in priority {
        if clusters.contains_key(cluster) && !order.contains(cluster) {
            order.push(cluster.clone());
        }
    }

    let mut rest: Vec<&String> = clusters.keys().filter(|c| !order.contains(c)).collect();
    if let Some(primary) = primary_geo_tag {
        rest.sort_by_key(|cluster| {
            input.geo_tags.get(*cluster).map(String::as_str) != Some(primary)
        });
    }
    order.extend(rest.into_iter().cloned());
    order
}

/// Distance tier of a cluster's geo tag from the local tag.
///
/// 0: same tag, 1: same region (`eu` in `eu-west-1`), 2: other, 3: untagged.
/// When the local cluster is untagged every tagged cluster is tier 2.
fn proximity(local: &str, remote: Option<&String>) -> u8 {
    let Some(remote) = remote else {
        return 3;
    };
    if local.is_empty() {
        return 2;
    }
    if remote == local {
        0
    } else if region(remote) == region(local) {
        1
    } else {
        2
    }
}

fn region(tag: &str) -> &str {
    tag.split('-').next().unwrap_or(tag)
}

#[cfg(test)]
#[path = "strategy_tests.rs"]
mod strategy_tests;
