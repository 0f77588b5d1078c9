//! The `NMGateway` collaborator seam and its real `zbus` implementation
//! (spec.md 4.3, C3). Mirrors the narrow, purpose-built surface the gio-based
//! client exposes in
//! `examples/other_examples/644166f7_xiaotinglian-vibepanel__crates-
//! vibepanel-src-services-vpn.rs.rs` (find-by-uuid, add, update, find the
//! active binding, reapply) rather than NM's full object model.

use crate::error::NmError;
use crate::proxies::{ActiveProxy, ConnectionProxy, DeviceProxy, NetworkManagerProxy, SettingsProxy};
use crate::settings::{apply_refresh_fields, build_connection_settings};
use crate::types::{ActiveConnectionBinding, AppliedConfig, SavedConnection};
use async_trait::async_trait;
use pia_profile::RegionProfile;

const NO_REAPPLY_FLAGS: u32 = 0;

/// Everything the refresh controller needs from NetworkManager, expressed
/// without naming the `zbus` types so the controller can be driven by an
/// in-memory fake in tests (spec.md 4.3, 8).
#[async_trait]
pub trait NMGateway: Send + Sync {
    async fn find_by_uuid(&self, uuid: &str) -> Result<Option<SavedConnection>, NmError>;
    async fn add_saved(&self, profile: &RegionProfile) -> Result<SavedConnection, NmError>;
    async fn update_saved(
        &self,
        saved: &SavedConnection,
        profile: &RegionProfile,
    ) -> Result<(), NmError>;
    async fn find_active_for(
        &self,
        uuid: &str,
    ) -> Result<Option<ActiveConnectionBinding>, NmError>;
    async fn get_applied(
        &self,
        active: &ActiveConnectionBinding,
    ) -> Result<(AppliedConfig, u64), NmError>;
    /// Mutates `applied`'s three refresh-affected fields to match `profile`
    /// and reapplies it, retrying exactly once on a stale `version_id`
    /// (spec.md 4.3: "a fresh `GetAppliedConnection` and a single retried
    /// `Reapply`").
    async fn reapply(
        &self,
        active: &ActiveConnectionBinding,
        applied: AppliedConfig,
        version_id: u64,
        profile: &RegionProfile,
    ) -> Result<(), NmError>;
}

pub struct ZbusNmGateway {
    connection: zbus::Connection,
}

impl ZbusNmGateway {
    pub async fn connect_system() -> Result<Self, NmError> {
        let connection = zbus::Connection::system().await?;
        Ok(Self { connection })
    }

    async fn settings_proxy(&self) -> Result<SettingsProxy<'_>, NmError> {
        Ok(SettingsProxy::builder(&self.connection).build().await?)
    }

    async fn networkmanager_proxy(&self) -> Result<NetworkManagerProxy<'_>, NmError> {
        Ok(NetworkManagerProxy::builder(&self.connection).build().await?)
    }

    async fn connection_proxy_at<'a>(
        &'a self,
        path: &zvariant::OwnedObjectPath,
    ) -> Result<ConnectionProxy<'a>, NmError> {
        Ok(ConnectionProxy::builder(&self.connection)
            .path(path.clone())?
            .build()
            .await?)
    }

    async fn active_proxy_at<'a>(
        &'a self,
        path: &zvariant::OwnedObjectPath,
    ) -> Result<ActiveProxy<'a>, NmError> {
        Ok(ActiveProxy::builder(&self.connection)
            .path(path.clone())?
            .build()
            .await?)
    }

    async fn device_proxy_at<'a>(
        &'a self,
        path: &zvariant::OwnedObjectPath,
    ) -> Result<DeviceProxy<'a>, NmError> {
        Ok(DeviceProxy::builder(&self.connection)
            .path(path.clone())?
            .build()
            .await?)
    }
}

fn classify(err: zbus::Error) -> NmError {
    if let zbus::Error::MethodError(name, _, _) = &err {
        if name.as_str().ends_with(".PermissionDenied")
            || name.as_str().ends_with(".NotAuthorized")
        {
            return NmError::NotAuthorized;
        }
        if name.as_str().ends_with(".UnknownConnection")
            || name.as_str().ends_with(".ConnectionNotActive")
        {
            return NmError::NotFound;
        }
        if name.as_str().ends_with(".VersionMismatch") {
            return NmError::VersionMismatch;
        }
    }
    NmError::DBus(err)
}

#[async_trait]
impl NMGateway for ZbusNmGateway {
    async fn find_by_uuid(&self, uuid: &str) -> Result<Option<SavedConnection>, NmError> {
        let settings = self.settings_proxy().await?;
        match settings.get_connection_by_uuid(uuid).await {
            Ok(path) => Ok(Some(SavedConnection {
                uuid: uuid.to_string(),
                path,
            })),
            Err(e) => match classify(e) {
                NmError::NotFound => Ok(None),
                other => Err(other),
            },
        }
    }

    async fn add_saved(&self, profile: &RegionProfile) -> Result<SavedConnection, NmError> {
        let settings = self.settings_proxy().await?;
        let dict = build_connection_settings(profile);
        let path = settings
            .add_connection(dict)
            .await
            .map_err(classify)?;
        Ok(SavedConnection {
            uuid: profile.uuid.clone(),
            path,
        })
    }

    async fn update_saved(
        &self,
        saved: &SavedConnection,
        profile: &RegionProfile,
    ) -> Result<(), NmError> {
        let conn = self.connection_proxy_at(&saved.path).await?;
        let dict = build_connection_settings(profile);
        conn.update(dict).await.map_err(classify)
    }

    async fn find_active_for(
        &self,
        uuid: &str,
    ) -> Result<Option<ActiveConnectionBinding>, NmError> {
        let nm = self.networkmanager_proxy().await?;
        let active_paths = nm.active_connections().await.map_err(classify)?;
        for path in active_paths {
            let active = self.active_proxy_at(&path).await?;
            let active_uuid = active.uuid().await.map_err(classify)?;
            if active_uuid != uuid {
                continue;
            }
            let devices = active.devices().await.map_err(classify)?;
            let Some(device_path) = devices.into_iter().next() else {
                continue;
            };
            return Ok(Some(ActiveConnectionBinding {
                uuid: active_uuid,
                device_path,
            }));
        }
        Ok(None)
    }

    async fn get_applied(
        &self,
        active: &ActiveConnectionBinding,
    ) -> Result<(AppliedConfig, u64), NmError> {
        let device = self.device_proxy_at(&active.device_path).await?;
        let (settings, version_id) = device
            .get_applied_connection(NO_REAPPLY_FLAGS)
            .await
            .map_err(classify)?;
        Ok((AppliedConfig { settings }, version_id))
    }

    async fn reapply(
        &self,
        active: &ActiveConnectionBinding,
        mut applied: AppliedConfig,
        version_id: u64,
        profile: &RegionProfile,
    ) -> Result<(), NmError> {
        apply_refresh_fields(&mut applied, profile);
        let device = self.device_proxy_at(&active.device_path).await?;
        let outcome = device
            .reapply(applied.settings.clone(), version_id, NO_REAPPLY_FLAGS)
            .await
            .map_err(classify);

        match outcome {
            Ok(()) => Ok(()),
            Err(NmError::VersionMismatch) => {
                let (mut fresh, fresh_version) = self.get_applied(active).await?;
                apply_refresh_fields(&mut fresh, profile);
                device
                    .reapply(fresh.settings, fresh_version, NO_REAPPLY_FLAGS)
                    .await
                    .map_err(classify)
            }
            Err(other) => Err(other),
        }
    }
}
