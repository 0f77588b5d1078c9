//! NM-facing value types (spec.md 3).

/// A connection NM already knows about, keyed by its saved object path.
#[derive(Debug, Clone)]
pub struct SavedConnection {
    pub uuid: String,
    pub(crate) path: zvariant::OwnedObjectPath,
}

/// Discovered fresh on every refresh; never cached across cycles because NM
/// may invalidate the version id (spec.md 3).
#[derive(Debug, Clone)]
pub struct ActiveConnectionBinding {
    pub uuid: String,
    pub(crate) device_path: zvariant::OwnedObjectPath,
}

/// The mutable running configuration for an active connection, as returned
/// by `GetAppliedConnection`. Opaque to everything except `apply_refresh`.
#[derive(Debug, Clone)]
pub struct AppliedConfig {
    pub(crate) settings: crate::proxies::NmSettings,
}
