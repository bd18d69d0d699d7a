// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Zone configuration and zone lookup.
//!
//! The configuration is loaded once at start (and again on reload) from a YAML
//! document and then treated as an immutable snapshot. Readers take an
//! `Arc<ResolverConfig>` from [`SharedConfig::snapshot`] and keep it for the
//! whole reconciliation; a reload replaces the `Arc` wholesale and never
//! mutates a published snapshot.
//!
//! # Example
//!
//! ```yaml
//! reconcileRequeueSeconds: 30
//! clusterGeoTag: eu
//! clusterGeoTags:
//!   eu-cluster: eu
//!   us-cluster: us
//! zones:
//!   - domainPattern: cloud.example.com
//!     externalClusterNames:
//!       eu-cluster: gslb-ns-eu-cloud.example.com
//!       us-cluster: gslb-ns-us-cloud.example.com
//! ```

use crate::constants::{
    DEFAULT_DNS_PROBE_TIMEOUT_MILLIS, DEFAULT_FAILOVER_STABILITY_SECS,
    DEFAULT_OPERATION_TIMEOUT_SECS, DEFAULT_RECONCILE_REQUEUE_SECS,
};
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

/// A domain-pattern scoped unit mapping cluster names to their name servers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    /// Domain suffix managed by this zone (e.g. `cloud.example.com`)
    pub domain_pattern: String,

    /// Cluster name → externally reachable name server hostname
    #[serde(default)]
    pub external_cluster_names: BTreeMap<String, String>,
}

impl Zone {
    /// Whether this zone manages `hostname`.
    ///
    /// Matching is a suffix match on label boundaries, so `app.example.com`
    /// and `example.com` match `example.com` but `badexample.com` does not.
    /// `hostname` must already be normalized with [`normalize_host`].
    #[must_use]
    pub fn manages(&self, hostname: &str) -> bool {
        let domain = self.domain_pattern.as_str();
        hostname == domain
            || hostname
                .strip_suffix(domain)
                .is_some_and(|prefix| prefix.ends_with('.'))
    }

    fn normalized(self) -> Result<Self, ConfigError> {
        let domain_pattern = normalize_host(&self.domain_pattern);
        if domain_pattern.is_empty() {
            return Err(ConfigError::InvalidZone {
                domain: self.domain_pattern,
                reason: "domain pattern must not be empty".to_string(),
            });
        }
        if self.external_cluster_names.is_empty() {
            return Err(ConfigError::InvalidZone {
                domain: domain_pattern,
                reason: "at least one external cluster is required".to_string(),
            });
        }

        let mut external_cluster_names = BTreeMap::new();
        for (cluster, ns) in self.external_cluster_names {
            let cluster = cluster.trim().to_string();
            let ns = normalize_host(&ns);
            if cluster.is_empty() || ns.is_empty() {
                return Err(ConfigError::InvalidZone {
                    domain: domain_pattern,
                    reason: format!("cluster '{cluster}' needs a non-empty name and name server"),
                });
            }
            external_cluster_names.insert(cluster, ns);
        }

        Ok(Self {
            domain_pattern,
            external_cluster_names,
        })
    }
}

/// Process-wide configuration snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverConfig {
    /// Zones in declaration order
    #[serde(default)]
    pub zones: Vec<Zone>,

    /// Delay before a successfully reconciled object is evaluated again
    #[serde(default = "default_reconcile_requeue_seconds")]
    pub reconcile_requeue_seconds: u64,

    /// Geo tag of the cluster this controller runs in
    #[serde(default)]
    pub cluster_geo_tag: String,

    /// Static geo tagging of every known cluster
    #[serde(default)]
    pub cluster_geo_tags: BTreeMap<String, String>,

    /// How long a cluster must stay healthy before failover prefers it again
    #[serde(default = "default_failover_stability_seconds")]
    pub failover_stability_seconds: u64,

    /// Deadline attached to each store and signal call
    #[serde(default = "default_operation_timeout_seconds")]
    pub operation_timeout_seconds: u64,

    /// Timeout of a single DNS health probe
    #[serde(default = "default_dns_probe_timeout_millis")]
    pub dns_probe_timeout_millis: u64,
}

fn default_reconcile_requeue_seconds() -> u64 {
    DEFAULT_RECONCILE_REQUEUE_SECS
}

fn default_failover_stability_seconds() -> u64 {
    DEFAULT_FAILOVER_STABILITY_SECS
}

fn default_operation_timeout_seconds() -> u64 {
    DEFAULT_OPERATION_TIMEOUT_SECS
}

fn default_dns_probe_timeout_millis() -> u64 {
    DEFAULT_DNS_PROBE_TIMEOUT_MILLIS
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            zones: Vec::new(),
            reconcile_requeue_seconds: DEFAULT_RECONCILE_REQUEUE_SECS,
            cluster_geo_tag: String::new(),
            cluster_geo_tags: BTreeMap::new(),
            failover_stability_seconds: DEFAULT_FAILOVER_STABILITY_SECS,
            operation_timeout_seconds: DEFAULT_OPERATION_TIMEOUT_SECS,
            dns_probe_timeout_millis: DEFAULT_DNS_PROBE_TIMEOUT_MILLIS,
        }
    }
}

impl ResolverConfig {
    /// Parse and validate a YAML document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be parsed or fails validation.
    pub fn from_yaml(document: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(document)?;
        config.validated()
    }

    /// Read, parse and validate a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let document = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&document)
    }

    /// Normalize zones and check every invariant of the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error for empty or duplicate domain patterns, zones without
    /// clusters, empty name servers, or a zero operation timeout.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        let mut seen = BTreeSet::new();
        let mut zones = Vec::with_capacity(self.zones.len());
        for zone in self.zones {
            let zone = zone.normalized()?;
            if !seen.insert(zone.domain_pattern.clone()) {
                return Err(ConfigError::DuplicateZone(zone.domain_pattern));
            }
            zones.push(zone);
        }
        self.zones = zones;

        if self.operation_timeout_seconds == 0 {
            return Err(ConfigError::InvalidTunable {
                field: "operationTimeoutSeconds",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.dns_probe_timeout_millis == 0 {
            return Err(ConfigError::InvalidTunable {
                field: "dnsProbeTimeoutMillis",
                reason: "must be greater than zero".to_string(),
            });
        }

        self.cluster_geo_tag = self.cluster_geo_tag.trim().to_string();
        Ok(self)
    }

    /// Find the zone managing `hostname`. See [`find_zone`].
    #[must_use]
    pub fn find_zone(&self, hostname: &str) -> Option<&Zone> {
        find_zone(self, hostname)
    }

    /// Requeue interval after a successful reconciliation.
    #[must_use]
    pub fn requeue_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_requeue_seconds)
    }

    /// Deadline attached to every store and signal call.
    #[must_use]
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_seconds)
    }

    /// Failover stability window.
    #[must_use]
    pub fn failover_stability(&self) -> Duration {
        Duration::from_secs(self.failover_stability_seconds)
    }

    /// Timeout of a single DNS health probe.
    #[must_use]
    pub fn dns_probe_timeout(&self) -> Duration {
        Duration::from_millis(self.dns_probe_timeout_millis)
    }
}

/// Lower-case a hostname and strip surrounding whitespace and the root dot.
#[must_use]
pub fn normalize_host(hostname: &str) -> String {
    hostname.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Find the zone managing `hostname`.
///
/// Every zone whose domain pattern is a label-boundary suffix of the hostname
/// matches; when several match, the longest domain pattern wins. Returns
/// `None` when no zone manages the hostname, which callers treat as "not my
/// domain" rather than as an error.
#[must_use]
pub fn find_zone<'a>(config: &'a ResolverConfig, hostname: &str) -> Option<&'a Zone> {
    let hostname = normalize_host(hostname);
    if hostname.is_empty() {
        return None;
    }

    config
        .zones
        .iter()
        .filter(|zone| zone.manages(&hostname))
        .max_by_key(|zone| zone.domain_pattern.len())
}

/// Handle to the current configuration snapshot.
///
/// Cloning the handle is cheap and every clone observes the same snapshot.
/// Readers never hold the lock while working: [`snapshot`](Self::snapshot)
/// clones the inner `Arc` and releases the lock immediately.
#[derive(Clone, Debug)]
pub struct SharedConfig {
    current: Arc<RwLock<Arc<ResolverConfig>>>,
}

impl SharedConfig {
    /// Publish an initial snapshot.
    #[must_use]
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(config))),
        }
    }

    /// The snapshot currently in effect.
    #[must_use]
    pub fn snapshot(&self) -> Arc<ResolverConfig> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Atomically replace the snapshot. Readers holding the previous snapshot
    /// keep using it until they finish.
    pub fn replace(&self, config: ResolverConfig) {
        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(config);
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
