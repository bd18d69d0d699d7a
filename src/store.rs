// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Object store access for `Gslb` objects and their owned ingresses.
//!
//! Every call either succeeds with the object and its version token or fails
//! with one of the [`StoreError`] outcomes. Writes of existing objects carry
//! the version token they were based on, so a concurrent writer surfaces as
//! [`StoreError::Conflict`] instead of a lost update.

use crate::constants::{API_GROUP_VERSION, FIELD_MANAGER, KIND_GSLB};
use crate::context::ReconcileKey;
use crate::crd::{Gslb, GslbStatus};
use crate::errors::StoreError;
use async_trait::async_trait;
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::{DeleteParams, Patch, PatchParams, PostParams, Preconditions};
use kube::{Api, Client, ResourceExt};
use serde_json::json;

/// An object together with the version token it was read or written at.
#[derive(Clone, Debug, PartialEq)]
pub struct Versioned<T> {
    /// The object
    pub value: T,
    /// Opaque version token (`metadata.resourceVersion`)
    pub version: String,
}

impl<T: ResourceExt> Versioned<T> {
    /// Wrap an object returned by the API server.
    #[must_use]
    pub fn from_object(value: T) -> Self {
        let version = value.resource_version().unwrap_or_default();
        Self { value, version }
    }
}

/// Store contract used by the reconciler.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Read a `Gslb` by key.
    async fn get_gslb(&self, key: &ReconcileKey) -> Result<Versioned<Gslb>, StoreError>;

    /// Replace the status of a `Gslb`.
    async fn update_gslb_status(
        &self,
        key: &ReconcileKey,
        status: &GslbStatus,
    ) -> Result<(), StoreError>;

    /// Read the ingress owned by the `Gslb` with `key`.
    async fn get_ingress(&self, key: &ReconcileKey) -> Result<Versioned<Ingress>, StoreError>;

    /// Create an ingress. An existing object is a [`StoreError::Conflict`].
    async fn create_ingress(&self, ingress: &Ingress) -> Result<Versioned<Ingress>, StoreError>;

    /// Replace an ingress previously read at `version`.
    async fn update_ingress(
        &self,
        ingress: &Ingress,
        version: &str,
    ) -> Result<Versioned<Ingress>, StoreError>;

    /// Delete the ingress with `key` if it is still at `version`.
    async fn delete_ingress(&self, key: &ReconcileKey, version: &str) -> Result<(), StoreError>;
}

/// [`ObjectStore`] backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeObjectStore {
    client: Client,
}

impl KubeObjectStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn gslbs(&self, namespace: &str) -> Api<Gslb> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn ingresses(&self, namespace: &str) -> Api<Ingress> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

/// Map a kube client error onto the store outcomes.
///
/// 404 is [`StoreError::NotFound`]; 409 (stale `resourceVersion` or
/// `AlreadyExists`) is [`StoreError::Conflict`]; everything else is opaque.
#[must_use]
pub fn classify_kube_error(err: kube::Error) -> StoreError {
    if let kube::Error::Api(api_err) = &err {
        match api_err.code {
            404 => return StoreError::NotFound,
            409 => return StoreError::Conflict(api_err.message.clone()),
            _ => {}
        }
    }
    StoreError::Other(err.into())
}

fn post_params() -> PostParams {
    PostParams {
        dry_run: false,
        field_manager: Some(FIELD_MANAGER.to_string()),
    }
}

#[async_trait]
impl ObjectStore for KubeObjectStore {
    async fn get_gslb(&self, key: &ReconcileKey) -> Result<Versioned<Gslb>, StoreError> {
        self.gslbs(&key.namespace)
            .get_opt(&key.name)
            .await
            .map_err(classify_kube_error)?
            .map(Versioned::from_object)
            .ok_or(StoreError::NotFound)
    }

    async fn update_gslb_status(
        &self,
        key: &ReconcileKey,
        status: &GslbStatus,
    ) -> Result<(), StoreError> {
        // Server-side apply: fields dropped from `status` are removed too.
        let patch = json!({
            "apiVersion": API_GROUP_VERSION,
            "kind": KIND_GSLB,
            "status": status,
        });
        self.gslbs(&key.namespace)
            .patch_status(
                &key.name,
                &PatchParams::apply(FIELD_MANAGER).force(),
                &Patch::Apply(&patch),
            )
            .await
            .map_err(classify_kube_error)?;
        Ok(())
    }

    async fn get_ingress(&self, key: &ReconcileKey) -> Result<Versioned<Ingress>, StoreError> {
        self.ingresses(&key.namespace)
            .get_opt(&key.name)
            .await
            .map_err(classify_kube_error)?
            .map(Versioned::from_object)
            .ok_or(StoreError::NotFound)
    }

    async fn create_ingress(&self, ingress: &Ingress) -> Result<Versioned<Ingress>, StoreError> {
        let namespace = ingress.namespace().unwrap_or_default();
        self.ingresses(&namespace)
            .create(&post_params(), ingress)
            .await
            .map(Versioned::from_object)
            .map_err(classify_kube_error)
    }

    async fn update_ingress(
        &self,
        ingress: &Ingress,
        version: &str,
    ) -> Result<Versioned<Ingress>, StoreError> {
        let namespace = ingress.namespace().unwrap_or_default();
        let mut ingress = ingress.clone();
        ingress.metadata.resource_version = Some(version.to_string());
        self.ingresses(&namespace)
            .replace(&ingress.name_any(), &post_params(), &ingress)
            .await
            .map(Versioned::from_object)
            .map_err(classify_kube_error)
    }

    async fn delete_ingress(&self, key: &ReconcileKey, version: &str) -> Result<(), StoreError> {
        let params = DeleteParams {
            preconditions: Some(Preconditions {
                resource_version: Some(version.to_string()),
                uid: None,
            }),
            ..DeleteParams::default()
        };
        self.ingresses(&key.namespace)
            .delete(&key.name, &params)
            .await
            .map_err(classify_kube_error)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod store_tests;
