//! In-memory `NMGateway` fake (spec.md 8: "a lightweight in-memory fake
//! for each collaborator trait"). Lives in this crate, not the caller's,
//! because `SavedConnection`/`ActiveConnectionBinding`/`AppliedConfig`
//! carry `pub(crate)` object-path and settings fields that only code
//! inside `pia-nm` can construct.

use crate::error::NmError;
use crate::gateway::NMGateway;
use crate::types::{ActiveConnectionBinding, AppliedConfig, SavedConnection};
use async_trait::async_trait;
use pia_profile::{ProfileBuilder, RegionId, RegionProfile};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use zvariant::OwnedObjectPath;

fn dummy_path(tag: &str) -> OwnedObjectPath {
    OwnedObjectPath::try_from(format!("/pia_wg_ctl/fake/{tag}"))
        .expect("well-formed object path literal")
}

/// Drives `RefreshController`/`RefreshOrchestrator` test scenarios without
/// a live D-Bus connection. Construct with one of the named scenario
/// constructors; inspect what happened via the public `Arc<Mutex<...>>`
/// fields afterwards.
pub struct FakeNmGateway {
    saved_uuids: Mutex<HashSet<String>>,
    active_uuids: Mutex<HashSet<String>>,
    pub added: Arc<Mutex<Vec<RegionProfile>>>,
    pub updated: Arc<Mutex<Vec<RegionProfile>>>,
    pub reapply_calls: Arc<Mutex<u32>>,
    deny_update: bool,
    fail_update_after_reapply: bool,
    always_version_mismatch_on_reapply: bool,
    find_by_uuid_delay: Option<Duration>,
}

impl FakeNmGateway {
    /// No saved profile, no active connection anywhere — the cold-start
    /// scenario (spec.md 8, S1).
    pub fn empty() -> Self {
        Self {
            saved_uuids: Mutex::new(HashSet::new()),
            active_uuids: Mutex::new(HashSet::new()),
            added: Arc::new(Mutex::new(Vec::new())),
            updated: Arc::new(Mutex::new(Vec::new())),
            reapply_calls: Arc::new(Mutex::new(0)),
            deny_update: false,
            fail_update_after_reapply: false,
            always_version_mismatch_on_reapply: false,
            find_by_uuid_delay: None,
        }
    }

    /// A saved profile exists and is currently active (S2/S3 setup).
    pub fn with_active_connection(region_id: &RegionId) -> Self {
        let gw = Self::empty();
        let uuid = ProfileBuilder::uuid_for(region_id);
        gw.saved_uuids.lock().unwrap().insert(uuid.clone());
        gw.active_uuids.lock().unwrap().insert(uuid);
        gw
    }

    /// A saved profile exists, nothing is active, and `update_saved` is
    /// denied by PolicyKit (S6).
    pub fn with_saved_connection_denying_update(region_id: &RegionId) -> Self {
        let gw = Self::empty();
        let uuid = ProfileBuilder::uuid_for(region_id);
        gw.saved_uuids.lock().unwrap().insert(uuid);
        Self {
            deny_update: true,
            ..gw
        }
    }

    /// Active connection exists; the post-reapply `update_saved` fails
    /// (Open Question resolution test: downgrades to `Warn`, not `Err`).
    pub fn active_but_update_saved_fails(region_id: &RegionId) -> Self {
        let gw = Self::with_active_connection(region_id);
        Self {
            fail_update_after_reapply: true,
            ..gw
        }
    }

    /// Active connection exists; `reapply` persistently returns
    /// `VersionMismatch`, as if the gateway's own refetch-and-retry had
    /// already been exhausted (S3: surfaces as `Warn`, not `Err`).
    pub fn with_active_connection_reapply_always_mismatches(region_id: &RegionId) -> Self {
        let gw = Self::with_active_connection(region_id);
        Self {
            always_version_mismatch_on_reapply: true,
            ..gw
        }
    }

    /// Cold-start, but `find_by_uuid` is slow enough for a concurrent
    /// second refresh to observe `RegionState::Refreshing`.
    pub fn slow_empty() -> Self {
        let gw = Self::empty();
        Self {
            find_by_uuid_delay: Some(Duration::from_millis(100)),
            ..gw
        }
    }
}

#[async_trait]
impl NMGateway for FakeNmGateway {
    async fn find_by_uuid(&self, uuid: &str) -> Result<Option<SavedConnection>, NmError> {
        if let Some(delay) = self.find_by_uuid_delay {
            tokio::time::sleep(delay).await;
        }
        if self.saved_uuids.lock().unwrap().contains(uuid) {
            Ok(Some(SavedConnection {
                uuid: uuid.to_string(),
                path: dummy_path("saved"),
            }))
        } else {
            Ok(None)
        }
    }

    async fn add_saved(&self, profile: &RegionProfile) -> Result<SavedConnection, NmError> {
        self.saved_uuids.lock().unwrap().insert(profile.uuid.clone());
        self.added.lock().unwrap().push(profile.clone());
        Ok(SavedConnection {
            uuid: profile.uuid.clone(),
            path: dummy_path("added"),
        })
    }

    async fn update_saved(
        &self,
        _saved: &SavedConnection,
        profile: &RegionProfile,
    ) -> Result<(), NmError> {
        if self.deny_update || self.fail_update_after_reapply {
            return Err(NmError::NotAuthorized);
        }
        self.updated.lock().unwrap().push(profile.clone());
        Ok(())
    }

    async fn find_active_for(
        &self,
        uuid: &str,
    ) -> Result<Option<ActiveConnectionBinding>, NmError> {
        if self.active_uuids.lock().unwrap().contains(uuid) {
            Ok(Some(ActiveConnectionBinding {
                uuid: uuid.to_string(),
                device_path: dummy_path("device"),
            }))
        } else {
            Ok(None)
        }
    }

    async fn get_applied(
        &self,
        _active: &ActiveConnectionBinding,
    ) -> Result<(AppliedConfig, u64), NmError> {
        Ok((
            AppliedConfig {
                settings: HashMap::new(),
            },
            7,
        ))
    }

    async fn reapply(
        &self,
        _active: &ActiveConnectionBinding,
        _applied: AppliedConfig,
        _version_id: u64,
        _profile: &RegionProfile,
    ) -> Result<(), NmError> {
        *self.reapply_calls.lock().unwrap() += 1;
        if self.always_version_mismatch_on_reapply {
            return Err(NmError::VersionMismatch);
        }
        Ok(())
    }
}
