// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the resolver.

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::config::ResolverConfig;
    use crate::crd::StrategySpec;
    use crate::errors::SignalError;
    use crate::fakes::{FakeGeoSource, FakeHealthSource};
    use std::time::Duration;

    fn config() -> ResolverConfig {
        ResolverConfig {
            zones: vec![Zone {
                domain_pattern: "example.com".into(),
                external_cluster_names: BTreeMap::from([
                    ("clusterA".to_string(), "ns-a.example.com".to_string()),
                    ("clusterB".to_string(), "ns-b.example.com".to_string()),
                ]),
            }],
            ..Default::default()
        }
        .validated()
        .unwrap()
    }

    fn resolver(health: FakeHealthSource, geo: FakeGeoSource) -> Resolver {
        Resolver::new(Arc::new(health), Arc::new(geo))
    }

    fn spec(kind: &str, hosts: &[&str]) -> GslbSpec {
        GslbSpec {
            hosts: hosts.iter().map(|h| (*h).to_string()).collect(),
            strategy: StrategySpec {
                r#type: kind.to_string(),
                ..Default::default()
            },
            ingress: None,
        }
    }

    fn ctx() -> ReconcileContext {
        ReconcileContext::detached(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_static_returns_zone_mapping_verbatim() {
        let resolver = resolver(FakeHealthSource::healthy(&[]), FakeGeoSource::default());

        let state = resolver
            .resolve(&ctx(), &config(), &spec("static", &["app.example.com"]))
            .await
            .unwrap();

        let expected: HostTargets = BTreeMap::from([
            (
                "clusterA".to_string(),
                ResolvedTarget {
                    name_server: "ns-a.example.com".into(),
                    weight: None,
                },
            ),
            (
                "clusterB".to_string(),
                ResolvedTarget {
                    name_server: "ns-b.example.com".into(),
                    weight: None,
                },
            ),
        ]);
        assert_eq!(state.hosts.len(), 1);
        assert_eq!(state.hosts["app.example.com"], expected);
    }

    #[tokio::test]
    async fn test_unmanaged_host_yields_empty_state() {
        let resolver = resolver(FakeHealthSource::healthy(&[]), FakeGeoSource::default());

        let state = resolver
            .resolve(&ctx(), &config(), &spec("static", &["app.other.com"]))
            .await
            .unwrap();

        assert_eq!(state, ResolvedState::default());
    }

    #[tokio::test]
    async fn test_resolve_is_idempotent() {
        let resolver = resolver(
            FakeHealthSource::healthy(&["clusterB", "clusterA"]),
            FakeGeoSource::default(),
        );
        let spec = spec("roundRobin", &["b.example.com", "a.example.com", "A.example.com."]);

        let first = resolver.resolve(&ctx(), &config(), &spec).await.unwrap();
        let second = resolver.resolve(&ctx(), &config(), &spec).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.render(), second.render());
        assert_eq!(
            first.managed_hosts(),
            vec!["a.example.com".to_string(), "b.example.com".to_string()]
        );
    }

    #[tokio::test]
    async fn test_unknown_strategy_fails() {
        let resolver = resolver(FakeHealthSource::healthy(&[]), FakeGeoSource::default());

        let result = resolver
            .resolve(&ctx(), &config(), &spec("random", &["app.example.com"]))
            .await;

        assert_eq!(
            result,
            Err(ResolveError::UnknownStrategy("random".to_string()))
        );
    }

    #[tokio::test]
    async fn test_corrupt_zone_fails() {
        let corrupt = ResolverConfig {
            zones: vec![Zone {
                domain_pattern: "example.com".into(),
                external_cluster_names: BTreeMap::from([("clusterA".to_string(), String::new())]),
            }],
            ..Default::default()
        };
        let resolver = resolver(FakeHealthSource::healthy(&[]), FakeGeoSource::default());

        let result = resolver
            .resolve(&ctx(), &corrupt, &spec("static", &["app.example.com"]))
            .await;

        assert!(matches!(result, Err(ResolveError::CorruptZone { .. })));
    }

    #[tokio::test]
    async fn test_health_failure_degrades_to_empty() {
        let resolver = resolver(
            FakeHealthSource::failing(SignalError::Unavailable {
                source_name: "ns-a.example.com".into(),
                reason: "timeout".into(),
            }),
            FakeGeoSource::default(),
        );

        let state = resolver
            .resolve(&ctx(), &config(), &spec("roundRobin", &["app.example.com"]))
            .await
            .unwrap();

        assert!(state.hosts["app.example.com"].is_empty());
        assert_eq!(state.render(), "app.example.com=");
    }

    #[tokio::test]
    async fn test_geo_failure_degrades_to_untagged() {
        let resolver = resolver(
            FakeHealthSource::healthy(&["clusterA", "clusterB"]),
            FakeGeoSource::failing(SignalError::Unavailable {
                source_name: "geo".into(),
                reason: "down".into(),
            }),
        );

        let config = ResolverConfig {
            cluster_geo_tag: "eu".into(),
            ..config()
        };

        let state = resolver
            .resolve(&ctx(), &config, &spec("geoip", &["app.example.com"]))
            .await
            .unwrap();

        assert_eq!(state.hosts["app.example.com"].len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_context_interrupts() {
        let resolver = resolver(FakeHealthSource::healthy(&[]), FakeGeoSource::default());
        let ctx = ctx();
        ctx.cancel();

        let result = resolver
            .resolve(&ctx, &config(), &spec("static", &["app.example.com"]))
            .await;

        assert!(matches!(result, Err(ResolveError::Interrupted(_))));
    }

    #[tokio::test]
    async fn test_slow_health_source_degrades_to_empty() {
        let resolver = resolver(
            FakeHealthSource::healthy(&["clusterA"]).with_delay(Duration::from_secs(5)),
            FakeGeoSource::default(),
        );
        let ctx = ReconcileContext::detached(Duration::from_millis(10));

        let state = resolver
            .resolve(&ctx, &config(), &spec("roundRobin", &["app.example.com"]))
            .await
            .unwrap();

        assert!(state.hosts["app.example.com"].is_empty());
    }

    #[tokio::test]
    async fn test_slow_geo_source_degrades_to_untagged() {
        let resolver = resolver(
            FakeHealthSource::healthy(&["clusterA", "clusterB"]),
            FakeGeoSource::default().with_delay(Duration::from_secs(5)),
        );
        let ctx = ReconcileContext::detached(Duration::from_millis(10));

        let state = resolver
            .resolve(&ctx, &config(), &spec("geoip", &["app.example.com"]))
            .await
            .unwrap();

        assert_eq!(state.hosts["app.example.com"].len(), 2);
    }

    #[tokio::test]
    async fn test_cancellation_during_health_call_interrupts() {
        let resolver = resolver(
            FakeHealthSource::healthy(&["clusterA"]).with_delay(Duration::from_secs(5)),
            FakeGeoSource::default(),
        );
        let ctx = ctx();
        let config = config();
        let spec = spec("roundRobin", &["app.example.com"]);

        let (result, ()) = tokio::join!(resolver.resolve(&ctx, &config, &spec), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            ctx.cancel();
        });

        assert!(matches!(
            result,
            Err(ResolveError::Interrupted(Interrupted::Cancelled { .. }))
        ));
    }

    #[test]
    fn test_healthy_records_and_render() {
        let state = ResolvedState {
            hosts: BTreeMap::from([(
                "app.example.com".to_string(),
                BTreeMap::from([
                    (
                        "clusterB".to_string(),
                        ResolvedTarget {
                            name_server: "ns-b.example.com".into(),
                            weight: Some(2),
                        },
                    ),
                    (
                        "clusterA".to_string(),
                        ResolvedTarget {
                            name_server: "ns-a.example.com".into(),
                            weight: Some(1),
                        },
                    ),
                ]),
            )]),
        };

        assert_eq!(
            state.healthy_records()["app.example.com"],
            vec!["ns-a.example.com".to_string(), "ns-b.example.com".to_string()]
        );
        assert_eq!(state.render(), "app.example.com=clusterA:1,clusterB:2");
    }
}
