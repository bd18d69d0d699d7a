// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the owned ingress builders.

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::crd::{GslbSpec, IngressBackendSpec, IngressTemplate, StrategySpec};
    use crate::resolver::ResolvedTarget;

    fn gslb() -> Gslb {
        let mut gslb = Gslb::new(
            "app",
            GslbSpec {
                hosts: vec!["b.example.com".into(), "A.example.com".into()],
                strategy: StrategySpec {
                    r#type: "roundRobin".into(),
                    dns_ttl_seconds: Some(60),
                    ..Default::default()
                },
                ingress: Some(IngressTemplate {
                    ingress_class_name: Some("nginx".into()),
                    backend: Some(IngressBackendSpec {
                        service_name: "app".into(),
                        service_port: 80,
                    }),
                }),
            },
        );
        gslb.metadata.namespace = Some("default".into());
        gslb.metadata.uid = Some("uid-1".into());
        gslb
    }

    fn state() -> ResolvedState {
        ResolvedState {
            hosts: BTreeMap::from([(
                "a.example.com".to_string(),
                BTreeMap::from([(
                    "eu".to_string(),
                    ResolvedTarget {
                        name_server: "ns-eu.example.com".into(),
                        weight: None,
                    },
                )]),
            )]),
        }
    }

    #[test]
    fn test_desired_ingress_shape() {
        let ingress = desired_ingress(&gslb(), &state(), "eu");

        assert_eq!(ingress.metadata.name.as_deref(), Some("app"));
        assert_eq!(ingress.metadata.namespace.as_deref(), Some("default"));
        let labels = ingress.metadata.labels.as_ref().unwrap();
        assert_eq!(labels[GSLB_NAME_LABEL], "app");
        assert_eq!(labels[K8S_MANAGED_BY], MANAGED_BY_GSLB);

        let owners = ingress.metadata.owner_references.as_ref().unwrap();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].kind, "Gslb");
        assert_eq!(owners[0].uid, "uid-1");
        assert_eq!(owners[0].controller, Some(true));

        let annotations = ingress.metadata.annotations.as_ref().unwrap();
        assert_eq!(annotations[STRATEGY_ANNOTATION], "roundRobin");
        assert_eq!(annotations[DNS_TTL_ANNOTATION], "60");
        assert_eq!(annotations[RESOLVED_TARGETS_ANNOTATION], "a.example.com=eu");
        assert_eq!(annotations[GEO_TAG_ANNOTATION], "eu");

        let spec = ingress.spec.as_ref().unwrap();
        assert_eq!(spec.ingress_class_name.as_deref(), Some("nginx"));
        let rules = spec.rules.as_ref().unwrap();
        let hosts: Vec<_> = rules.iter().map(|r| r.host.clone().unwrap()).collect();
        assert_eq!(hosts, vec!["a.example.com", "b.example.com"]);
        let path = &rules[0].http.as_ref().unwrap().paths[0];
        let service = path.backend.service.as_ref().unwrap();
        assert_eq!(service.name, "app");
        assert_eq!(service.port.as_ref().unwrap().number, Some(80));
    }

    #[test]
    fn test_desired_ingress_without_backend_has_host_only_rules() {
        let mut gslb = gslb();
        gslb.spec.ingress = None;

        let ingress = desired_ingress(&gslb, &state(), "");

        let spec = ingress.spec.unwrap();
        assert!(spec.ingress_class_name.is_none());
        assert!(spec.rules.unwrap().iter().all(|r| r.http.is_none()));
        assert!(!ingress
            .metadata
            .annotations
            .unwrap()
            .contains_key(GEO_TAG_ANNOTATION));
    }

    #[test]
    fn test_desired_ingress_is_deterministic() {
        assert_eq!(
            desired_ingress(&gslb(), &state(), "eu"),
            desired_ingress(&gslb(), &state(), "eu")
        );
    }

    #[test]
    fn test_skeleton_has_no_annotations() {
        let desired = desired_ingress(&gslb(), &state(), "eu");

        let skeleton = skeleton(&desired);

        assert!(skeleton.metadata.annotations.is_none());
        assert_eq!(skeleton.spec, desired.spec);
        assert_eq!(skeleton.metadata.owner_references, desired.metadata.owner_references);
    }

    #[test]
    fn test_merge_fills_annotations_on_skeleton() {
        let desired = desired_ingress(&gslb(), &state(), "eu");

        let merged = merge(&skeleton(&desired), &desired).unwrap();

        assert_eq!(merged, desired);
    }

    #[test]
    fn test_merge_without_changes_is_none() {
        let desired = desired_ingress(&gslb(), &state(), "eu");

        assert!(merge(&desired, &desired).is_none());
    }

    #[test]
    fn test_merge_preserves_foreign_metadata() {
        let desired = desired_ingress(&gslb(), &state(), "eu");
        let mut current = desired.clone();
        current
            .metadata
            .annotations
            .as_mut()
            .unwrap()
            .insert("nginx.ingress.kubernetes.io/rewrite-target".into(), "/".into());
        current
            .metadata
            .labels
            .as_mut()
            .unwrap()
            .insert("team".into(), "payments".into());

        assert!(merge(&current, &desired).is_none());
    }

    #[test]
    fn test_merge_drops_stale_managed_annotation() {
        let desired = desired_ingress(&gslb(), &state(), "");
        let mut current = desired.clone();
        current
            .metadata
            .annotations
            .as_mut()
            .unwrap()
            .insert(GEO_TAG_ANNOTATION.into(), "us".into());

        let merged = merge(&current, &desired).unwrap();

        assert!(!merged
            .metadata
            .annotations
            .unwrap()
            .contains_key(GEO_TAG_ANNOTATION));
    }

    #[test]
    fn test_merge_restores_drifted_spec() {
        let desired = desired_ingress(&gslb(), &state(), "eu");
        let mut current = desired.clone();
        current.spec.as_mut().unwrap().ingress_class_name = Some("traefik".into());

        let merged = merge(&current, &desired).unwrap();

        assert_eq!(merged.spec, desired.spec);
    }
}
