// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # GSLB - Multi-cluster Global Server Load Balancer controller
//!
//! A Kubernetes controller that turns `Gslb` resources into an ingress
//! carrying the set of clusters that should answer for each host.
//!
//! ## Overview
//!
//! - A static zone configuration maps DNS domains to the clusters serving them
//! - A resolver applies one of a closed set of strategies (static,
//!   round-robin, failover, geo proximity, weighted) to health and geo signals
//! - A reconcile loop fetches each `Gslb`, resolves it, synthesizes the owned
//!   ingress and applies it with optimistic concurrency
//!
//! ## Modules
//!
//! - [`config`] - Zone configuration and `findZone`-style lookup
//! - [`crd`] - The `Gslb` Custom Resource Definition
//! - [`resolver`] - Strategy resolution
//! - [`signals`] - Health and geo collaborators
//! - [`store`] - Object store abstraction over the Kubernetes API
//! - [`reconcilers`] - The reconciliation loop
//! - [`context`] - Reconcile keys, cancellation and deadlines
//! - [`errors`] - Error types and their classification
//! - [`fakes`] - In-memory collaborators for tests
//!
//! ## Example
//!
//! ```rust,no_run
//! use gslb::config::ResolverConfig;
//!
//! let config = ResolverConfig::from_yaml(
//!     r"
//! zones:
//!   - domainPattern: cloud.example.com
//!     externalClusterNames:
//!       eu: gslb-ns-eu.cloud.example.com
//!       us: gslb-ns-us.cloud.example.com
//! ",
//! )
//! .unwrap();
//!
//! let zone = config.find_zone("app.cloud.example.com").unwrap();
//! assert_eq!(zone.domain_pattern, "cloud.example.com");
//! ```

pub mod config;
pub mod constants;
pub mod context;
pub mod crd;
pub mod errors;
pub mod fakes;
pub mod labels;
pub mod reconcilers;
pub mod resolver;
pub mod signals;
pub mod status_reasons;
pub mod store;
