// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definition for global load balancing.
//!
//! A [`Gslb`] declares a set of hostnames and the strategy used to pick the
//! clusters that serve them. The controller never writes `spec`; it derives
//! an owned `Ingress` from it and reports progress through `status`.
//!
//! # Example
//!
//! ```rust,no_run
//! use gslb::crd::{GslbSpec, StrategySpec};
//!
//! let spec = GslbSpec {
//!     hosts: vec!["app.cloud.example.com".to_string()],
//!     strategy: StrategySpec {
//!         r#type: "roundRobin".to_string(),
//!         dns_ttl_seconds: Some(30),
//!         ..Default::default()
//!     },
//!     ingress: None,
//! };
//! ```

use crate::config::normalize_host;
use crate::constants::DEFAULT_DNS_TTL_SECS;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Condition represents an observation of a resource's current state.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition (e.g. Ready).
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief CamelCase reason for the condition's last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// Traffic-steering strategy declared on a [`Gslb`].
///
/// `type` is kept as a free-form string so that an unknown value can be
/// reported on the object instead of being rejected by deserialization.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StrategySpec {
    /// Strategy type: `static`, `roundRobin`, `failover`, `geoip` or `weighted`.
    pub r#type: String,

    /// TTL of the DNS answers produced for this object. Defaults to 30 seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_ttl_seconds: Option<i64>,

    /// Geo tag of the preferred cluster (failover only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_geo_tag: Option<String>,

    /// Explicit cluster priority, highest first (failover only).
    ///
    /// Takes precedence over `primaryGeoTag`. Clusters of the zone not listed
    /// here come after the listed ones, ordered by name.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub priority: Vec<String>,

    /// Cluster weights (weighted only). Unlisted clusters weigh 1; weight 0
    /// removes a cluster from the answer.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub weights: BTreeMap<String, u32>,
}

impl StrategySpec {
    /// Effective DNS TTL.
    #[must_use]
    pub fn dns_ttl(&self) -> i64 {
        self.dns_ttl_seconds.unwrap_or(DEFAULT_DNS_TTL_SECS)
    }
}

/// Backend service the generated ingress routes to.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IngressBackendSpec {
    /// Name of the backing service in the same namespace.
    pub service_name: String,

    /// Port number of the backing service.
    pub service_port: i32,
}

/// Template for the owned ingress.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IngressTemplate {
    /// Ingress class of the generated ingress.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingress_class_name: Option<String>,

    /// Backend every declared host is routed to. Without a backend the
    /// generated rules carry hosts only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<IngressBackendSpec>,
}

/// `Gslb` declares globally load-balanced hostnames.
///
/// # Example
///
/// ```yaml
/// apiVersion: k8gb.absa.oss/v1beta1
/// kind: Gslb
/// metadata:
///   name: app
///   namespace: default
/// spec:
///   hosts:
///     - app.cloud.example.com
///   strategy:
///     type: failover
///     primaryGeoTag: eu
///     dnsTtlSeconds: 30
///   ingress:
///     ingressClassName: nginx
///     backend:
///       serviceName: app
///       servicePort: 80
/// ```
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[kube(
    group = "k8gb.absa.oss",
    version = "v1beta1",
    kind = "Gslb",
    namespaced,
    shortname = "gslb",
    doc = "Gslb declares hostnames that are load-balanced across clusters with a selectable strategy.",
    printcolumn = r#"{"name":"Strategy","type":"string","jsonPath":".spec.strategy.type"}"#,
    printcolumn = r#"{"name":"GeoTag","type":"string","jsonPath":".status.geoTag"}"#,
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#
)]
#[kube(status = "GslbStatus")]
#[serde(rename_all = "camelCase")]
pub struct GslbSpec {
    /// Hostnames to load-balance.
    #[serde(default)]
    pub hosts: Vec<String>,

    /// Resolution strategy.
    pub strategy: StrategySpec,

    /// Template of the generated ingress.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingress: Option<IngressTemplate>,
}

impl GslbSpec {
    /// Declared hosts, normalized and deduplicated. Empty entries are dropped.
    #[must_use]
    pub fn normalized_hosts(&self) -> BTreeSet<String> {
        self.hosts
            .iter()
            .map(|h| normalize_host(h))
            .filter(|h| !h.is_empty())
            .collect()
    }
}

/// `Gslb` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GslbStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Geo tag of the cluster that wrote this status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo_tag: Option<String>,

    /// Hosts managed by a configured zone.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<String>,

    /// Host → name servers currently answering for it.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub healthy_records: BTreeMap<String, Vec<String>>,
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
