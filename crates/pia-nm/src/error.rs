//! NMGateway failure semantics (spec.md 4.3).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NmError {
    #[error("D-Bus transport error: {0}")]
    DBus(#[from] zbus::Error),

    /// PolicyKit denied the operation. Always carries the remediation hint
    /// that the saved connection must be user-owned (spec.md 3 invariant,
    /// 7: "NotAuthorized carries a fixed remediation hint").
    #[error(
        "not authorized by PolicyKit; the saved connection must list the invoking user in its \
         permissions (see RegionProfile.permissions.owner_user)"
    )]
    NotAuthorized,

    /// Stale version id on reapply - the controller re-fetches and retries
    /// exactly once (spec.md 4.3).
    #[error("applied-configuration version id is stale")]
    VersionMismatch,

    #[error("connection or device not found")]
    NotFound,

    /// The `pia-runtime` event-loop bridge could not carry the call through
    /// (loop thread gone, or the submitted operation was lost - see
    /// `pia_runtime::RuntimeError`). Distinct from `DBus` because no D-Bus
    /// round-trip was ever attempted.
    #[error("runtime bridge error: {0}")]
    Runtime(#[from] pia_runtime::RuntimeError),
}
