// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the GSLB controller.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// Fully qualified API version (group/version)
pub const API_GROUP_VERSION: &str = "k8gb.absa.oss/v1beta1";

/// Kind name for `Gslb` resource
pub const KIND_GSLB: &str = "Gslb";

/// Field manager used for every write issued by the controller
pub const FIELD_MANAGER: &str = "gslb-controller";

// ============================================================================
// DNS Constants
// ============================================================================

/// Standard DNS port used when probing cluster name servers
pub const DNS_PORT: u16 = 53;

/// Prefix of the per-cluster health record published by every cluster's name server.
///
/// A cluster that serves `app.example.com` answers `localtargets-app.example.com`
/// with its local ingress addresses; an empty answer means the cluster is unhealthy.
pub const LOCAL_TARGETS_PREFIX: &str = "localtargets-";

/// Default TTL for GSLB answers (30 seconds)
pub const DEFAULT_DNS_TTL_SECS: i64 = 30;

/// Default timeout of a single health probe query (2 seconds)
pub const DEFAULT_DNS_PROBE_TIMEOUT_MILLIS: u64 = 2000;

// ============================================================================
// Resolver Constants
// ============================================================================

/// Default requeue interval after a successful reconciliation (30 seconds)
pub const DEFAULT_RECONCILE_REQUEUE_SECS: u64 = 30;

/// Default failover stability window (30 seconds)
pub const DEFAULT_FAILOVER_STABILITY_SECS: u64 = 30;

/// Default weight of a cluster under the weighted strategy
pub const DEFAULT_CLUSTER_WEIGHT: u32 = 1;

/// Default deadline attached to every store and signal call (10 seconds)
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// Controller Error Handling Constants
// ============================================================================

/// Number of attempts for a child write before a conflict becomes a reconcile error
pub const APPLY_MAX_ATTEMPTS: u32 = 2;

/// First requeue delay after a failed reconciliation (5 seconds)
pub const ERROR_REQUEUE_INITIAL_SECS: u64 = 5;

/// Upper bound of the error requeue delay (5 minutes)
pub const ERROR_REQUEUE_MAX_SECS: u64 = 300;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

/// Default number of reconciliations allowed to run in parallel
pub const DEFAULT_CONTROLLER_CONCURRENCY: u16 = 4;

/// Default location of the zone configuration file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/gslb/config.yaml";
