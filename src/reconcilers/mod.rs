// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes reconciliation for `Gslb` resources.
//!
//! The controller follows the standard Kubernetes controller pattern:
//!
//! 1. **Watch** - `Gslb` objects and the ingresses they own
//! 2. **Reconcile** - Resolve the declared hosts against zone configuration,
//!    health and geo signals
//! 3. **Update** - Converge the owned ingress to the resolved state
//! 4. **Status** - Report the outcome back on the `Gslb`
//!
//! # Modules
//!
//! - [`gslb`] - The reconciliation loop and its controller adapters
//! - [`ingress`] - Desired state of the owned ingress
//! - [`status`] - Status conditions
//! - [`retry`] - Requeue backoff after failures
//!
//! # Example: Running one pass
//!
//! ```rust,no_run
//! use gslb::config::SharedConfig;
//! use gslb::context::ReconcileKey;
//! use gslb::reconcilers::{GslbReconciler, Outcome};
//! use gslb::resolver::GslbResolver;
//! use gslb::store::ObjectStore;
//! use std::sync::Arc;
//!
//! async fn once(
//!     store: Arc<dyn ObjectStore>,
//!     resolver: Arc<dyn GslbResolver>,
//!     config: SharedConfig,
//! ) -> anyhow::Result<()> {
//!     let reconciler = GslbReconciler::new(store, resolver, config);
//!     let key = ReconcileKey::new("default", "app");
//!
//!     match reconciler.reconcile(&reconciler.context(), &key).await? {
//!         Outcome::Requeue(after) => println!("requeue in {after:?}"),
//!         Outcome::Deleted => println!("gone"),
//!     }
//!     Ok(())
//! }
//! ```

pub mod gslb;
pub mod ingress;
pub mod retry;
pub mod status;

pub use gslb::{error_policy, reconcile, GslbReconciler, Outcome};
pub use retry::ErrorBackoff;
