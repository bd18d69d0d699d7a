// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory collaborators for tests.
//!
//! [`FakeObjectStore`] keeps objects in maps and hands out monotonically
//! increasing version tokens, so optimistic-concurrency behaviour (stale
//! writes, create races) can be exercised without an API server. Every call
//! is recorded for assertions.

use crate::config::{ResolverConfig, Zone};
use crate::context::ReconcileKey;
use crate::crd::{Gslb, GslbStatus};
use crate::errors::{SignalError, StoreError};
use crate::signals::{ClusterHealth, GeoSource, HealthSnapshot, HealthSource};
use crate::store::{ObjectStore, Versioned};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::networking::v1::Ingress;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// A call received by [`FakeObjectStore`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreCall {
    GetGslb(ReconcileKey),
    UpdateGslbStatus(ReconcileKey),
    GetIngress(ReconcileKey),
    CreateIngress(ReconcileKey),
    UpdateIngress(ReconcileKey),
    DeleteIngress(ReconcileKey),
}

impl StoreCall {
    /// Whether the call mutates an ingress.
    #[must_use]
    pub fn is_ingress_write(&self) -> bool {
        matches!(
            self,
            Self::CreateIngress(_) | Self::UpdateIngress(_) | Self::DeleteIngress(_)
        )
    }
}

#[derive(Default)]
struct FakeState {
    gslbs: BTreeMap<ReconcileKey, Versioned<Gslb>>,
    ingresses: BTreeMap<ReconcileKey, Versioned<Ingress>>,
    next_version: u64,
    injected_conflicts: u32,
    unavailable: Option<String>,
    calls: Vec<StoreCall>,
}

impl FakeState {
    fn bump(&mut self) -> String {
        self.next_version += 1;
        self.next_version.to_string()
    }

    fn take_conflict(&mut self) -> bool {
        if self.injected_conflicts == 0 {
            return false;
        }
        self.injected_conflicts -= 1;
        true
    }
}

/// In-memory [`ObjectStore`].
#[derive(Default)]
pub struct FakeObjectStore {
    state: Mutex<FakeState>,
}

impl FakeObjectStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: StoreCall) -> Result<MutexGuard<'_, FakeState>, StoreError> {
        let mut state = self.state();
        state.calls.push(call);
        if let Some(reason) = state.unavailable.clone() {
            return Err(StoreError::Other(anyhow::anyhow!(reason)));
        }
        Ok(state)
    }

    /// Store a `Gslb` as if a user had applied it.
    pub fn insert_gslb(&self, gslb: Gslb) {
        let mut state = self.state();
        let version = state.bump();
        let key = ReconcileKey::from_object(&gslb);
        state.gslbs.insert(key, Versioned { value: gslb, version });
    }

    /// Store an ingress as if another writer had created it.
    pub fn insert_ingress(&self, ingress: Ingress) {
        let mut state = self.state();
        let version = state.bump();
        let key = ReconcileKey::from_object(&ingress);
        state
            .ingresses
            .insert(key, Versioned { value: ingress, version });
    }

    /// Current `Gslb` with `key`.
    #[must_use]
    pub fn gslb(&self, key: &ReconcileKey) -> Option<Gslb> {
        self.state().gslbs.get(key).map(|v| v.value.clone())
    }

    /// Current ingress with `key`.
    #[must_use]
    pub fn ingress(&self, key: &ReconcileKey) -> Option<Ingress> {
        self.state().ingresses.get(key).map(|v| v.value.clone())
    }

    /// Make the next `count` ingress writes fail with a conflict, as if another
    /// writer updated the object just before each of them.
    pub fn inject_conflicts(&self, count: u32) {
        self.state().injected_conflicts = count;
    }

    /// Make every call fail with an opaque error until `None` is set.
    pub fn set_unavailable(&self, reason: Option<&str>) {
        self.state().unavailable = reason.map(str::to_string);
    }

    /// Every call received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<StoreCall> {
        self.state().calls.clone()
    }

    /// Ingress writes received so far.
    #[must_use]
    pub fn ingress_writes(&self) -> Vec<StoreCall> {
        self.calls()
            .into_iter()
            .filter(StoreCall::is_ingress_write)
            .collect()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    async fn get_gslb(&self, key: &ReconcileKey) -> Result<Versioned<Gslb>, StoreError> {
        let state = self.record(StoreCall::GetGslb(key.clone()))?;
        state.gslbs.get(key).cloned().ok_or(StoreError::NotFound)
    }

    async fn update_gslb_status(
        &self,
        key: &ReconcileKey,
        status: &GslbStatus,
    ) -> Result<(), StoreError> {
        let mut state = self.record(StoreCall::UpdateGslbStatus(key.clone()))?;
        let version = state.bump();
        let entry = state.gslbs.get_mut(key).ok_or(StoreError::NotFound)?;
        entry.value.status = Some(status.clone());
        entry.version = version;
        Ok(())
    }

    async fn get_ingress(&self, key: &ReconcileKey) -> Result<Versioned<Ingress>, StoreError> {
        let state = self.record(StoreCall::GetIngress(key.clone()))?;
        state.ingresses.get(key).cloned().ok_or(StoreError::NotFound)
    }

    async fn create_ingress(&self, ingress: &Ingress) -> Result<Versioned<Ingress>, StoreError> {
        let key = ReconcileKey::from_object(ingress);
        let mut state = self.record(StoreCall::CreateIngress(key.clone()))?;
        if state.take_conflict() {
            return Err(StoreError::Conflict(format!("ingress {key} already exists")));
        }
        if state.ingresses.contains_key(&key) {
            return Err(StoreError::Conflict(format!("ingress {key} already exists")));
        }

        let version = state.bump();
        let mut stored = ingress.clone();
        stored.metadata.resource_version = Some(version.clone());
        let stored = Versioned {
            value: stored,
            version,
        };
        state.ingresses.insert(key, stored.clone());
        Ok(stored)
    }

    async fn update_ingress(
        &self,
        ingress: &Ingress,
        version: &str,
    ) -> Result<Versioned<Ingress>, StoreError> {
        let key = ReconcileKey::from_object(ingress);
        let mut state = self.record(StoreCall::UpdateIngress(key.clone()))?;
        if state.take_conflict() {
            let bumped = state.bump();
            if let Some(current) = state.ingresses.get_mut(&key) {
                current.version = bumped.clone();
                current.value.metadata.resource_version = Some(bumped);
            }
            return Err(StoreError::Conflict(format!(
                "ingress {key} was modified concurrently"
            )));
        }

        let current = state.ingresses.get(&key).ok_or(StoreError::NotFound)?;
        if current.version != version {
            return Err(StoreError::Conflict(format!(
                "ingress {key} is at version {}, write was based on {version}",
                current.version
            )));
        }

        let version = state.bump();
        let mut stored = ingress.clone();
        stored.metadata.resource_version = Some(version.clone());
        let stored = Versioned {
            value: stored,
            version,
        };
        state.ingresses.insert(key, stored.clone());
        Ok(stored)
    }

    async fn delete_ingress(&self, key: &ReconcileKey, version: &str) -> Result<(), StoreError> {
        let mut state = self.record(StoreCall::DeleteIngress(key.clone()))?;
        let current = state.ingresses.get(key).ok_or(StoreError::NotFound)?;
        if current.version != version {
            return Err(StoreError::Conflict(format!(
                "ingress {key} is at version {}",
                current.version
            )));
        }
        state.ingresses.remove(key);
        Ok(())
    }
}

/// Health source returning a fixed snapshot for every host.
pub struct FakeHealthSource {
    snapshot: Mutex<Result<HealthSnapshot, SignalError>>,
    delay: Option<Duration>,
}

impl FakeHealthSource {
    /// Snapshot taken at `observed_at` with the given cluster health.
    #[must_use]
    pub fn new(
        observed_at: DateTime<Utc>,
        clusters: impl IntoIterator<Item = (String, ClusterHealth)>,
    ) -> Self {
        Self {
            snapshot: Mutex::new(Ok(HealthSnapshot {
                observed_at,
                clusters: clusters.into_iter().collect(),
            })),
            delay: None,
        }
    }

    /// Every listed cluster steadily healthy, every other cluster unknown.
    #[must_use]
    pub fn healthy(clusters: &[&str]) -> Self {
        Self::new(
            Utc::now(),
            clusters
                .iter()
                .map(|c| ((*c).to_string(), ClusterHealth::steady(true))),
        )
    }

    /// A source that always fails.
    #[must_use]
    pub fn failing(error: SignalError) -> Self {
        Self {
            snapshot: Mutex::new(Err(error)),
            delay: None,
        }
    }

    /// Delay every answer by `delay`.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Change the health of one cluster.
    pub fn set(&self, cluster: &str, health: ClusterHealth) {
        if let Ok(snapshot) = self
            .snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_mut()
        {
            snapshot.clusters.insert(cluster.to_string(), health);
        }
    }
}

#[async_trait]
impl HealthSource for FakeHealthSource {
    async fn snapshot(&self, _host: &str, _zone: &Zone) -> Result<HealthSnapshot, SignalError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Geo source backed by a fixed map.
#[derive(Default)]
pub struct FakeGeoSource {
    tags: BTreeMap<String, String>,
    error: Option<SignalError>,
    delay: Option<Duration>,
}

impl FakeGeoSource {
    #[must_use]
    pub fn new(tags: &[(&str, &str)]) -> Self {
        Self {
            tags: tags
                .iter()
                .map(|(c, t)| ((*c).to_string(), (*t).to_string()))
                .collect(),
            error: None,
            delay: None,
        }
    }

    /// A source that always fails.
    #[must_use]
    pub fn failing(error: SignalError) -> Self {
        Self {
            tags: BTreeMap::new(),
            error: Some(error),
            delay: None,
        }
    }

    /// Delay every answer by `delay`.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl GeoSource for FakeGeoSource {
    async fn geo_tag(
        &self,
        _config: &ResolverConfig,
        cluster: &str,
    ) -> Result<Option<String>, SignalError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.error {
            Some(error) => Err(error.clone()),
            None => Ok(self.tags.get(cluster).cloned()),
        }
    }
}

