//! Bridges [`ZbusNmGateway`] onto `pia-runtime`'s event-loop thread
//! (spec.md 4.7: "every call must be issued from the thread that owns the
//! event loop, and every completion is delivered as a callback on that same
//! thread"). `ZbusNmGateway` itself has no thread affinity - `zbus::Connection`
//! is `Send + Sync` - but the controller still routes every call through
//! here so the system has exactly one place issuing NM I/O, matching the
//! design this crate was asked to implement rather than the looser
//! guarantee `zbus` alone would allow.

use crate::error::NmError;
use crate::gateway::{NMGateway, ZbusNmGateway};
use crate::types::{ActiveConnectionBinding, AppliedConfig, SavedConnection};
use async_trait::async_trait;
use pia_profile::RegionProfile;
use pia_runtime::{LazyOnLoop, Runtime};
use std::sync::Arc;

/// The `NMGateway` the rest of the crate is expected to construct: real
/// D-Bus calls, all dispatched through the process-wide runtime loop.
pub struct LoopBoundGateway {
    runtime: Runtime,
    inner: LazyOnLoop<Arc<ZbusNmGateway>>,
}

impl LoopBoundGateway {
    pub fn new(runtime: Runtime) -> Self {
        Self {
            runtime,
            inner: LazyOnLoop::new(),
        }
    }

    /// Uses the process-wide [`Runtime::global`] loop.
    pub fn global() -> Self {
        Self::new(Runtime::global().clone())
    }

    async fn connection(&self) -> Result<Arc<ZbusNmGateway>, NmError> {
        self.inner
            .get_or_init(&self.runtime, || async {
                ZbusNmGateway::connect_system().await.map(Arc::new)
            })
            .await
    }
}

#[async_trait]
impl NMGateway for LoopBoundGateway {
    async fn find_by_uuid(&self, uuid: &str) -> Result<Option<SavedConnection>, NmError> {
        let gw = self.connection().await?;
        let uuid = uuid.to_string();
        self.runtime
            .submit(move || async move { gw.find_by_uuid(&uuid).await })
            .await?
    }

    async fn add_saved(&self, profile: &RegionProfile) -> Result<SavedConnection, NmError> {
        let gw = self.connection().await?;
        let profile = profile.clone();
        self.runtime
            .submit(move || async move { gw.add_saved(&profile).await })
            .await?
    }

    async fn update_saved(
        &self,
        saved: &SavedConnection,
        profile: &RegionProfile,
    ) -> Result<(), NmError> {
        let gw = self.connection().await?;
        let saved = saved.clone();
        let profile = profile.clone();
        self.runtime
            .submit(move || async move { gw.update_saved(&saved, &profile).await })
            .await?
    }

    async fn find_active_for(
        &self,
        uuid: &str,
    ) -> Result<Option<ActiveConnectionBinding>, NmError> {
        let gw = self.connection().await?;
        let uuid = uuid.to_string();
        self.runtime
            .submit(move || async move { gw.find_active_for(&uuid).await })
            .await?
    }

    async fn get_applied(
        &self,
        active: &ActiveConnectionBinding,
    ) -> Result<(AppliedConfig, u64), NmError> {
        let gw = self.connection().await?;
        let active = active.clone();
        self.runtime
            .submit(move || async move { gw.get_applied(&active).await })
            .await?
    }

    async fn reapply(
        &self,
        active: &ActiveConnectionBinding,
        applied: AppliedConfig,
        version_id: u64,
        profile: &RegionProfile,
    ) -> Result<(), NmError> {
        let gw = self.connection().await?;
        let active = active.clone();
        let profile = profile.clone();
        self.runtime
            .submit(move || async move { gw.reapply(&active, applied, version_id, &profile).await })
            .await?
    }
}
