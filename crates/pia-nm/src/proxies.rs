//! Typed zbus proxies over the slice of NetworkManager's D-Bus API this
//! crate needs (spec.md 4.3, 6: "The surface is deliberately narrower than
//! NM's full API"). Interface names, object paths, and method names follow
//! NetworkManager's published D-Bus API
//! (`org.freedesktop.NetworkManager{,.Settings,.Settings.Connection,
//! .Connection.Active,.Device}`), the same constants used in
//! `examples/other_examples/644166f7_xiaotinglian-vibepanel__crates-
//! vibepanel-src-services-vpn.rs.rs`.

use zbus::proxy;
use zvariant::{OwnedObjectPath, OwnedValue};

pub(crate) type NmSettings =
    std::collections::HashMap<String, std::collections::HashMap<String, OwnedValue>>;

#[proxy(
    interface = "org.freedesktop.NetworkManager",
    default_service = "org.freedesktop.NetworkManager",
    default_path = "/org/freedesktop/NetworkManager"
)]
pub(crate) trait NetworkManager {
    #[zbus(property)]
    fn active_connections(&self) -> zbus::Result<Vec<OwnedObjectPath>>;
}

#[proxy(
    interface = "org.freedesktop.NetworkManager.Settings",
    default_service = "org.freedesktop.NetworkManager",
    default_path = "/org/freedesktop/NetworkManager/Settings"
)]
pub(crate) trait Settings {
    fn get_connection_by_uuid(&self, uuid: &str) -> zbus::Result<OwnedObjectPath>;

    #[zbus(name = "AddConnection")]
    fn add_connection(&self, connection: NmSettings) -> zbus::Result<OwnedObjectPath>;
}

/// Per-connection settings object
/// (`org.freedesktop.NetworkManager.Settings.Connection`). No default path:
/// built per-object with `.path(...)`.
#[proxy(
    interface = "org.freedesktop.NetworkManager.Settings.Connection",
    default_service = "org.freedesktop.NetworkManager"
)]
pub(crate) trait Connection {
    fn get_settings(&self) -> zbus::Result<NmSettings>;
    fn update(&self, connection: NmSettings) -> zbus::Result<()>;
}

/// An active connection (`org.freedesktop.NetworkManager.Connection.Active`).
#[proxy(
    interface = "org.freedesktop.NetworkManager.Connection.Active",
    default_service = "org.freedesktop.NetworkManager"
)]
pub(crate) trait Active {
    #[zbus(property)]
    fn uuid(&self) -> zbus::Result<String>;

    #[zbus(property)]
    fn connection(&self) -> zbus::Result<OwnedObjectPath>;

    #[zbus(property)]
    fn devices(&self) -> zbus::Result<Vec<OwnedObjectPath>>;
}

/// A network device (`org.freedesktop.NetworkManager.Device`), used only
/// for `GetAppliedConnection`/`Reapply`.
#[proxy(
    interface = "org.freedesktop.NetworkManager.Device",
    default_service = "org.freedesktop.NetworkManager"
)]
pub(crate) trait Device {
    fn get_applied_connection(&self, flags: u32) -> zbus::Result<(NmSettings, u64)>;
    fn reapply(&self, connection: NmSettings, version_id: u64, flags: u32) -> zbus::Result<()>;
}
