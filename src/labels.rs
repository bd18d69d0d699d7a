// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common label and annotation constants written onto child objects.
//!
//! Labels identify which `Gslb` owns an object; annotations carry the resolved
//! state of the last reconciliation. Every annotation the controller manages
//! starts with [`ANNOTATION_PREFIX`], which is how foreign annotations are told
//! apart during a diff.

// ============================================================================
// Kubernetes Standard Labels
// https://kubernetes.io/docs/concepts/overview/working-with-objects/common-labels/
// ============================================================================

/// Standard label for the tool being used to manage the operation of an application
pub const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Standard label for the name of a higher-level application this one is part of
pub const K8S_PART_OF: &str = "app.kubernetes.io/part-of";

/// Value for `app.kubernetes.io/managed-by` on objects created by this controller
pub const MANAGED_BY_GSLB: &str = "gslb-controller";

/// Value for `app.kubernetes.io/part-of`
pub const PART_OF_K8GB: &str = "k8gb";

// ============================================================================
// GSLB-Specific Labels
// ============================================================================

/// Label carrying the name of the owning `Gslb`
pub const GSLB_NAME_LABEL: &str = "k8gb.io/gslb";

// ============================================================================
// GSLB-Specific Annotations
// ============================================================================

/// Prefix shared by every annotation managed by the controller
pub const ANNOTATION_PREFIX: &str = "k8gb.io/";

/// Strategy that produced the resolved targets
pub const STRATEGY_ANNOTATION: &str = "k8gb.io/strategy";

/// TTL the DNS layer should use for the answers
pub const DNS_TTL_ANNOTATION: &str = "k8gb.io/dns-ttl-seconds";

/// JSON encoding of the resolved targets, keyed by hostname
pub const RESOLVED_TARGETS_ANNOTATION: &str = "k8gb.io/resolved-targets";

/// Geo tag of the cluster that wrote the annotations
pub const GEO_TAG_ANNOTATION: &str = "k8gb.io/geo-tag";
