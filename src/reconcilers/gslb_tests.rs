// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the `Gslb` reconciliation loop.

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::config::{ResolverConfig, Zone};
    use crate::crd::{GslbSpec, StrategySpec};
    use crate::fakes::{FakeGeoSource, FakeHealthSource, FakeObjectStore, StoreCall};
    use crate::labels::{RESOLVED_TARGETS_ANNOTATION, STRATEGY_ANNOTATION};
    use crate::resolver::Resolver;
    use crate::status_reasons::{
        CONDITION_TYPE_READY, REASON_NO_HEALTHY_TARGETS, REASON_RESOLVED, REASON_UNKNOWN_STRATEGY,
    };
    use std::collections::BTreeMap;

    fn config() -> SharedConfig {
        SharedConfig::new(
            ResolverConfig {
                zones: vec![Zone {
                    domain_pattern: "example.com".into(),
                    external_cluster_names: BTreeMap::from([
                        ("eu".to_string(), "ns-eu.example.com".to_string()),
                        ("us".to_string(), "ns-us.example.com".to_string()),
                    ]),
                }],
                cluster_geo_tag: "eu".into(),
                ..Default::default()
            }
            .validated()
            .unwrap(),
        )
    }

    fn gslb(strategy: &str, hosts: &[&str]) -> Gslb {
        let mut gslb = Gslb::new(
            "app",
            GslbSpec {
                hosts: hosts.iter().map(|h| (*h).to_string()).collect(),
                strategy: StrategySpec {
                    r#type: strategy.to_string(),
                    ..Default::default()
                },
                ingress: None,
            },
        );
        gslb.metadata.namespace = Some("default".into());
        gslb.metadata.uid = Some("uid-app".into());
        gslb.metadata.generation = Some(1);
        gslb
    }

    fn key() -> ReconcileKey {
        ReconcileKey::new("default", "app")
    }

    fn ctx() -> ReconcileContext {
        ReconcileContext::detached(Duration::from_secs(5))
    }

    struct Harness {
        store: Arc<FakeObjectStore>,
        config: SharedConfig,
        reconciler: GslbReconciler,
    }

    fn harness_with(health: FakeHealthSource) -> Harness {
        let config = config();
        let store = Arc::new(FakeObjectStore::new());
        let resolver = Resolver::new(
            Arc::new(health),
            Arc::new(FakeGeoSource::new(&[("eu", "eu"), ("us", "us")])),
        );
        let reconciler = GslbReconciler::new(store.clone(), Arc::new(resolver), config.clone());
        Harness {
            store,
            config,
            reconciler,
        }
    }

    fn harness() -> Harness {
        harness_with(FakeHealthSource::healthy(&["eu", "us"]))
    }

    fn ready(store: &FakeObjectStore) -> crate::crd::Condition {
        store
            .gslb(&key())
            .and_then(|g| g.status)
            .and_then(|s| {
                s.conditions
                    .into_iter()
                    .find(|c| c.r#type == CONDITION_TYPE_READY)
            })
            .unwrap()
    }

    #[tokio::test]
    async fn test_missing_gslb_is_not_requeued() {
        let h = harness();

        let outcome = h.reconciler.reconcile(&ctx(), &key()).await.unwrap();

        assert_eq!(outcome, Outcome::Deleted);
        assert_eq!(h.store.calls(), vec![StoreCall::GetGslb(key())]);
    }

    #[tokio::test]
    async fn test_first_pass_creates_skeleton_and_requeues() {
        let h = harness();
        h.store.insert_gslb(gslb("static", &["app.example.com"]));

        let outcome = h.reconciler.reconcile(&ctx(), &key()).await.unwrap();

        assert_eq!(outcome, Outcome::Requeue(Duration::from_secs(30)));
        assert_eq!(h.store.ingress_writes(), vec![StoreCall::CreateIngress(key())]);
        let ingress = h.store.ingress(&key()).unwrap();
        assert!(ingress.metadata.annotations.is_none());

        let condition = ready(&h.store);
        assert_eq!(condition.status, "True");
        assert_eq!(condition.reason.as_deref(), Some(REASON_RESOLVED));
        let status = h.store.gslb(&key()).unwrap().status.unwrap();
        assert_eq!(status.geo_tag.as_deref(), Some("eu"));
        assert_eq!(
            status.healthy_records["app.example.com"],
            vec!["ns-eu.example.com", "ns-us.example.com"]
        );
    }

    #[tokio::test]
    async fn test_passes_converge_without_redundant_writes() {
        let h = harness();
        h.store.insert_gslb(gslb("static", &["app.example.com"]));
        h.reconciler.reconcile(&ctx(), &key()).await.unwrap();
        h.store.clear_calls();

        h.reconciler.reconcile(&ctx(), &key()).await.unwrap();

        assert_eq!(h.store.ingress_writes(), vec![StoreCall::UpdateIngress(key())]);
        let annotations = h.store.ingress(&key()).unwrap().metadata.annotations.unwrap();
        assert_eq!(annotations[STRATEGY_ANNOTATION], "static");
        assert_eq!(
            annotations[RESOLVED_TARGETS_ANNOTATION],
            "app.example.com=eu,us"
        );

        h.store.clear_calls();
        h.reconciler.reconcile(&ctx(), &key()).await.unwrap();

        assert_eq!(
            h.store.calls(),
            vec![StoreCall::GetGslb(key()), StoreCall::GetIngress(key())]
        );
    }

    #[tokio::test]
    async fn test_unknown_strategy_touches_no_child() {
        let h = harness();
        h.store.insert_gslb(gslb("geoDNS", &["app.example.com"]));

        let err = h.reconciler.reconcile(&ctx(), &key()).await.unwrap_err();

        assert_eq!(err.class(), ErrorClass::Permanent);
        assert!(h.store.ingress_writes().is_empty());
        assert!(h.store.ingress(&key()).is_none());
        let condition = ready(&h.store);
        assert_eq!(condition.status, "False");
        assert_eq!(condition.reason.as_deref(), Some(REASON_UNKNOWN_STRATEGY));
    }

    #[tokio::test]
    async fn test_repeated_permanent_failure_writes_status_once() {
        let h = harness();
        h.store.insert_gslb(gslb("geoDNS", &["app.example.com"]));
        h.reconciler.reconcile(&ctx(), &key()).await.unwrap_err();
        h.store.clear_calls();

        h.reconciler.reconcile(&ctx(), &key()).await.unwrap_err();

        assert_eq!(h.store.calls(), vec![StoreCall::GetGslb(key())]);
    }

    #[tokio::test]
    async fn test_no_healthy_targets_reports_not_ready() {
        let h = harness_with(FakeHealthSource::healthy(&[]));
        h.store.insert_gslb(gslb("roundRobin", &["app.example.com"]));

        h.reconciler.reconcile(&ctx(), &key()).await.unwrap();

        let condition = ready(&h.store);
        assert_eq!(condition.status, "False");
        assert_eq!(condition.reason.as_deref(), Some(REASON_NO_HEALTHY_TARGETS));
    }

    #[tokio::test]
    async fn test_single_conflict_is_retried() {
        let h = harness();
        h.store.insert_gslb(gslb("static", &["app.example.com"]));
        h.reconciler.reconcile(&ctx(), &key()).await.unwrap();
        h.store.clear_calls();
        h.store.inject_conflicts(1);

        let outcome = h.reconciler.reconcile(&ctx(), &key()).await.unwrap();

        assert_eq!(outcome, Outcome::Requeue(Duration::from_secs(30)));
        assert_eq!(
            h.store.ingress_writes(),
            vec![StoreCall::UpdateIngress(key()), StoreCall::UpdateIngress(key())]
        );
        assert!(h.store.ingress(&key()).unwrap().metadata.annotations.is_some());
    }

    #[tokio::test]
    async fn test_persistent_conflict_is_transient_error() {
        let h = harness();
        h.store.insert_gslb(gslb("static", &["app.example.com"]));
        h.reconciler.reconcile(&ctx(), &key()).await.unwrap();
        h.store.inject_conflicts(2);

        let err = h.reconciler.reconcile(&ctx(), &key()).await.unwrap_err();

        assert_eq!(err.class(), ErrorClass::Transient);
        assert!(matches!(
            err,
            ReconcileError::Conflict { attempts: 2, .. }
        ));
    }

    #[tokio::test]
    async fn test_create_race_is_retried_as_update() {
        let h = harness();
        h.store.insert_gslb(gslb("static", &["app.example.com"]));
        h.store.inject_conflicts(1);

        h.reconciler.reconcile(&ctx(), &key()).await.unwrap();

        assert_eq!(
            h.store.ingress_writes(),
            vec![StoreCall::CreateIngress(key()), StoreCall::CreateIngress(key())]
        );
        assert!(h.store.ingress(&key()).is_some());
    }

    #[tokio::test]
    async fn test_cancelled_context_issues_no_calls() {
        let h = harness();
        h.store.insert_gslb(gslb("static", &["app.example.com"]));
        let ctx = ctx();
        ctx.cancel();

        let err = h.reconciler.reconcile(&ctx, &key()).await.unwrap_err();

        assert_eq!(err.class(), ErrorClass::Transient);
        assert!(matches!(
            err,
            ReconcileError::Interrupted(Interrupted::Cancelled { .. })
        ));
        assert!(h.store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_slow_health_source_degrades_to_no_healthy_targets() {
        let h = harness_with(
            FakeHealthSource::healthy(&["eu", "us"]).with_delay(Duration::from_secs(5)),
        );
        h.store.insert_gslb(gslb("failover", &["app.example.com"]));
        let ctx = ReconcileContext::detached(Duration::from_millis(20));

        let outcome = h.reconciler.reconcile(&ctx, &key()).await.unwrap();

        assert_eq!(outcome, Outcome::Requeue(Duration::from_secs(30)));
        assert_eq!(h.store.ingress_writes(), vec![StoreCall::CreateIngress(key())]);
        let condition = ready(&h.store);
        assert_eq!(condition.status, "False");
        assert_eq!(condition.reason.as_deref(), Some(REASON_NO_HEALTHY_TARGETS));
    }

    #[tokio::test]
    async fn test_pass_uses_one_configuration_snapshot() {
        let h = harness_with(
            FakeHealthSource::healthy(&["eu", "us"]).with_delay(Duration::from_millis(200)),
        );
        h.store.insert_gslb(gslb("roundRobin", &["app.example.com"]));

        let (c, k) = (ctx(), key());
        let (outcome, ()) = tokio::join!(h.reconciler.reconcile(&c, &k), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            h.config.replace(ResolverConfig {
                reconcile_requeue_seconds: 90,
                cluster_geo_tag: "us".into(),
                ..Default::default()
            });
        });

        assert_eq!(outcome.unwrap(), Outcome::Requeue(Duration::from_secs(30)));
        let status = h.store.gslb(&key()).unwrap().status.unwrap();
        assert_eq!(status.hosts, vec!["app.example.com"]);
        assert_eq!(status.geo_tag.as_deref(), Some("eu"));
        assert_eq!(
            status.healthy_records["app.example.com"],
            vec!["ns-eu.example.com", "ns-us.example.com"]
        );
    }

    #[tokio::test]
    async fn test_unavailable_store_is_transient() {
        let h = harness();
        h.store.insert_gslb(gslb("static", &["app.example.com"]));
        h.store.set_unavailable(Some("connection refused"));

        let err = h.reconciler.reconcile(&ctx(), &key()).await.unwrap_err();

        assert_eq!(err.class(), ErrorClass::Transient);
        assert!(matches!(
            err,
            ReconcileError::Store {
                operation: "get gslb",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_gslb_without_hosts_removes_owned_ingress() {
        let h = harness();
        h.store.insert_gslb(gslb("static", &["app.example.com"]));
        h.reconciler.reconcile(&ctx(), &key()).await.unwrap();
        h.store.insert_gslb(gslb("static", &[]));
        h.store.clear_calls();

        h.reconciler.reconcile(&ctx(), &key()).await.unwrap();

        assert_eq!(h.store.ingress_writes(), vec![StoreCall::DeleteIngress(key())]);
        assert!(h.store.ingress(&key()).is_none());
    }

    #[tokio::test]
    async fn test_foreign_ingress_is_not_deleted() {
        let h = harness();
        h.store.insert_gslb(gslb("static", &[]));
        let mut foreign = Ingress::default();
        foreign.metadata.name = Some("app".into());
        foreign.metadata.namespace = Some("default".into());
        h.store.insert_ingress(foreign);

        h.reconciler.reconcile(&ctx(), &key()).await.unwrap();

        assert!(h.store.ingress_writes().is_empty());
        assert!(h.store.ingress(&key()).is_some());
    }

    #[tokio::test]
    async fn test_success_resets_backoff() {
        let h = harness();
        h.store.insert_gslb(gslb("static", &["app.example.com"]));
        h.store.set_unavailable(Some("connection refused"));
        let err = h.reconciler.reconcile(&ctx(), &key()).await.unwrap_err();
        h.reconciler.on_error(&key(), &err);
        assert_eq!(h.reconciler.backoff().failures(&key()), 1);

        h.store.set_unavailable(None);
        h.reconciler.reconcile(&ctx(), &key()).await.unwrap();

        assert_eq!(h.reconciler.backoff().failures(&key()), 0);
    }

    #[tokio::test]
    async fn test_permanent_error_requeues_at_cap() {
        let h = harness();
        let err = ReconcileError::Resolve(crate::errors::ResolveError::UnknownStrategy(
            "geoDNS".into(),
        ));

        assert_eq!(h.reconciler.on_error(&key(), &err), Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_shutdown_cancels_pass_contexts() {
        let token = CancellationToken::new();
        let h = harness();
        let reconciler = GslbReconciler::new(
            h.store.clone(),
            Arc::new(Resolver::new(
                Arc::new(FakeHealthSource::healthy(&[])),
                Arc::new(FakeGeoSource::default()),
            )),
            config(),
        )
        .with_shutdown(token.clone());
        let pass = reconciler.context();

        token.cancel();

        assert!(pass.is_cancelled());
        assert_eq!(pass.timeout(), Duration::from_secs(10));
    }
}
