// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Standard Kubernetes status condition reasons for `Gslb` resources.
//!
//! Reasons are programmatic identifiers in `CamelCase` that explain why a
//! condition has a particular status.
//!
//! # Example Status
//!
//! ```yaml
//! status:
//!   conditions:
//!     - type: Ready
//!       status: "True"
//!       reason: Resolved
//!       message: "2 of 2 hosts resolved with strategy roundRobin"
//!   geoTag: eu
//!   hosts: [app.cloud.example.com, api.cloud.example.com]
//!   healthyRecords:
//!     app.cloud.example.com: [gslb-ns-eu-cloud.example.com, gslb-ns-us-cloud.example.com]
//! ```

/// Condition type for the encompassing readiness condition.
pub const CONDITION_TYPE_READY: &str = "Ready";

/// Every declared host resolved to at least one cluster.
pub const REASON_RESOLVED: &str = "Resolved";

/// Some hosts resolved to an empty cluster set (no healthy cluster or no zone).
///
/// This is a degraded state, not a failure: the controller keeps reconciling
/// and the condition clears as soon as health recovers.
pub const REASON_PARTIALLY_RESOLVED: &str = "PartiallyResolved";

/// No declared host resolved to any cluster.
pub const REASON_NO_HEALTHY_TARGETS: &str = "NoHealthyTargets";

/// The declared strategy type is not one the controller knows.
///
/// Needs operator intervention; the controller backs off at its longest interval.
pub const REASON_UNKNOWN_STRATEGY: &str = "UnknownStrategy";

/// The zone configuration managing one of the hosts is malformed.
///
/// Needs operator intervention; the controller backs off at its longest interval.
pub const REASON_CORRUPT_ZONE: &str = "CorruptZone";
