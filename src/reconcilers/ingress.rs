// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Desired state of the ingress owned by a `Gslb`.
//!
//! Everything here is a pure function of the `Gslb` and its resolved state.
//! The controller manages a fixed set of fields on the child:
//!
//! - labels listed in [`build_labels`]
//! - annotations under the `k8gb.io/` prefix
//! - the owner reference to the `Gslb`
//! - the whole `spec`
//!
//! Labels and annotations written by anyone else are left untouched.

use crate::constants::{API_GROUP_VERSION, KIND_GSLB};
use crate::crd::Gslb;
use crate::labels::{
    ANNOTATION_PREFIX, DNS_TTL_ANNOTATION, GEO_TAG_ANNOTATION, GSLB_NAME_LABEL, K8S_MANAGED_BY,
    K8S_PART_OF, MANAGED_BY_GSLB, PART_OF_K8GB, RESOLVED_TARGETS_ANNOTATION, STRATEGY_ANNOTATION,
};
use crate::resolver::ResolvedState;
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::ResourceExt;
use std::collections::BTreeMap;

/// Labels set on every owned ingress.
#[must_use]
pub fn build_labels(gslb: &Gslb) -> BTreeMap<String, String> {
    BTreeMap::from([
        (K8S_MANAGED_BY.to_string(), MANAGED_BY_GSLB.to_string()),
        (K8S_PART_OF.to_string(), PART_OF_K8GB.to_string()),
        (GSLB_NAME_LABEL.to_string(), gslb.name_any()),
    ])
}

/// Owner reference making the ingress garbage-collected with its `Gslb`.
#[must_use]
pub fn build_owner_references(gslb: &Gslb) -> Vec<OwnerReference> {
    vec![OwnerReference {
        api_version: API_GROUP_VERSION.to_string(),
        kind: KIND_GSLB.to_string(),
        name: gslb.name_any(),
        uid: gslb.metadata.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }]
}

/// Annotations describing the resolved state.
#[must_use]
pub fn build_annotations(
    gslb: &Gslb,
    state: &ResolvedState,
    geo_tag: &str,
) -> BTreeMap<String, String> {
    let mut annotations = BTreeMap::from([
        (
            STRATEGY_ANNOTATION.to_string(),
            gslb.spec.strategy.r#type.trim().to_string(),
        ),
        (
            DNS_TTL_ANNOTATION.to_string(),
            gslb.spec.strategy.dns_ttl().to_string(),
        ),
        (RESOLVED_TARGETS_ANNOTATION.to_string(), state.render()),
    ]);
    if !geo_tag.is_empty() {
        annotations.insert(GEO_TAG_ANNOTATION.to_string(), geo_tag.to_string());
    }
    annotations
}

/// Ingress rules: one per declared host, sorted and deduplicated.
fn build_rules(gslb: &Gslb) -> Vec<IngressRule> {
    let hosts = gslb.spec.normalized_hosts();
    let backend = gslb
        .spec
        .ingress
        .as_ref()
        .and_then(|template| template.backend.as_ref());

    hosts
        .into_iter()
        .map(|host| IngressRule {
            host: Some(host),
            http: backend.map(|backend| HTTPIngressRuleValue {
                paths: vec![HTTPIngressPath {
                    path: Some("/".to_string()),
                    path_type: "Prefix".to_string(),
                    backend: IngressBackend {
                        service: Some(IngressServiceBackend {
                            name: backend.service_name.clone(),
                            port: Some(ServiceBackendPort {
                                number: Some(backend.service_port),
                                name: None,
                            }),
                        }),
                        resource: None,
                    },
                }],
            }),
        })
        .collect()
}

/// Full desired ingress for `gslb`.
#[must_use]
pub fn desired_ingress(gslb: &Gslb, state: &ResolvedState, geo_tag: &str) -> Ingress {
    Ingress {
        metadata: ObjectMeta {
            name: Some(gslb.name_any()),
            namespace: gslb.namespace(),
            labels: Some(build_labels(gslb)),
            annotations: Some(build_annotations(gslb, state, geo_tag)),
            owner_references: Some(build_owner_references(gslb)),
            ..Default::default()
        },
        spec: Some(IngressSpec {
            ingress_class_name: gslb
                .spec
                .ingress
                .as_ref()
                .and_then(|template| template.ingress_class_name.clone()),
            rules: Some(build_rules(gslb)),
            ..Default::default()
        }),
        status: None,
    }
}

/// The object created when no child exists yet: the desired ingress without
/// annotations. Annotations are added by the next pass through [`merge`].
#[must_use]
pub fn skeleton(desired: &Ingress) -> Ingress {
    let mut skeleton = desired.clone();
    skeleton.metadata.annotations = None;
    skeleton
}

fn is_managed_annotation(key: &str) -> bool {
    key.starts_with(ANNOTATION_PREFIX)
}

fn non_empty(map: BTreeMap<String, String>) -> Option<BTreeMap<String, String>> {
    (!map.is_empty()).then_some(map)
}

/// Apply the managed fields of `desired` onto `current`.
///
/// Returns `None` when `current` already carries every managed field, so the
/// caller can skip the write.
#[must_use]
pub fn merge(current: &Ingress, desired: &Ingress) -> Option<Ingress> {
    let mut merged = current.clone();

    let mut labels = merged.metadata.labels.take().unwrap_or_default();
    labels.extend(desired.metadata.labels.clone().unwrap_or_default());
    merged.metadata.labels = non_empty(labels);

    let wanted = desired.metadata.annotations.clone().unwrap_or_default();
    let mut annotations = merged.metadata.annotations.take().unwrap_or_default();
    annotations.retain(|key, _| !is_managed_annotation(key) || wanted.contains_key(key));
    annotations.extend(wanted);
    merged.metadata.annotations = non_empty(annotations);

    let mut owners = merged.metadata.owner_references.take().unwrap_or_default();
    for owner in desired.metadata.owner_references.iter().flatten() {
        match owners.iter_mut().find(|o| o.uid == owner.uid) {
            Some(existing) => existing.clone_from(owner),
            None => owners.push(owner.clone()),
        }
    }
    merged.metadata.owner_references = (!owners.is_empty()).then_some(owners);

    merged.spec.clone_from(&desired.spec);

    (merged != *current).then_some(merged)
}

#[cfg(test)]
#[path = "ingress_tests.rs"]
mod ingress_tests;
