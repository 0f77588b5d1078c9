//! The controller's single error enum (spec.md 7), mirroring the teacher's
//! one-error-enum-per-module convention (`fos_vpn::{KeyError, RegionError,
//! VpnError}`). Every variant is one of the kinds named in spec.md 7; the
//! orchestrator groups them into Ok/Warn/Err per spec.md 4.5's
//! classification table, never inspecting the source error directly.

use thiserror::Error;

/// A refresh failure, tagged with the region and operation that produced
/// it. Never carries a credential, token, or key byte - `Display`
/// delegates to the wrapped kind, which is itself built only from error
/// *shapes* (status codes, D-Bus error names), never response bodies.
#[derive(Debug, Error)]
#[error("region {region_id}: {op} failed: {kind}")]
pub struct RefreshError {
    pub region_id: String,
    pub op: &'static str,
    pub kind: RefreshErrorKind,
}

impl RefreshError {
    pub fn new(region_id: impl Into<String>, op: &'static str, kind: RefreshErrorKind) -> Self {
        Self {
            region_id: region_id.into(),
            op,
            kind,
        }
    }
}

/// Error kinds named by spec.md 7. Opaque to callers beyond the
/// Ok/Warn/Err grouping the orchestrator performs (spec.md 4.5).
#[derive(Debug, Clone, Error)]
pub enum RefreshErrorKind {
    /// 401/403 bad creds, account locked. Not retried; fatal for the region.
    #[error("authentication permanently rejected")]
    AuthPermanent,

    /// Provider rejected the token. Retried once after re-auth.
    #[error("provider token rejected")]
    TokenExpired,

    /// Provider rejected the registered public key. Retried once after
    /// rotation.
    #[error("provider rejected the registered public key")]
    KeyRejected,

    /// Transport failure, 5xx, or similar. Retried once.
    #[error("transient network error: {0}")]
    NetTransient(String),

    /// D-Bus timeout or transport failure. Retried once.
    #[error("transient D-Bus error: {0}")]
    DBusTransient(String),

    /// Stale version id on reapply. Retried once after a refetch.
    #[error("reapply version id was stale")]
    VersionMismatch,

    /// PolicyKit denial. Not retried; carries a fixed remediation hint.
    #[error(
        "not authorized by PolicyKit; ensure the saved connection lists the invoking user in \
         its permissions"
    )]
    NotAuthorized,

    /// Malformed provider response. Not retried; likely a bug.
    #[error("validation error in field {0}")]
    ValidationError(String),

    /// Cancellation observed at a suspension point before any NM mutation.
    #[error("refresh cancelled")]
    Cancelled,

    /// KeyStore file I/O failure.
    #[error("key storage I/O error: {0}")]
    IoError(String),
}

impl RefreshErrorKind {
    /// Whether this kind is ever retried by the controller, and how many
    /// times (spec.md 4.5, 7: "exactly once, immediate"). Used only for
    /// documentation/assertions in tests - the controller's retry counts
    /// are hardcoded per step, not driven by this table, since each step
    /// retries under a different condition (re-auth, key rotation, refetch).
    pub fn max_retries(&self) -> u32 {
        match self {
            RefreshErrorKind::TokenExpired
            | RefreshErrorKind::KeyRejected
            | RefreshErrorKind::NetTransient(_)
            | RefreshErrorKind::DBusTransient(_)
            | RefreshErrorKind::VersionMismatch => 1,
            RefreshErrorKind::AuthPermanent
            | RefreshErrorKind::NotAuthorized
            | RefreshErrorKind::ValidationError(_)
            | RefreshErrorKind::Cancelled
            | RefreshErrorKind::IoError(_) => 0,
        }
    }

    /// Whether a failure of this kind, surviving past the retry above, is
    /// surfaced as a warning rather than a hard failure (spec.md 4.5: a
    /// persistent `VersionMismatch` or transient D-Bus/net error still
    /// leaves the tunnel usable, unlike auth/key/validation failures).
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            RefreshErrorKind::VersionMismatch
                | RefreshErrorKind::NetTransient(_)
                | RefreshErrorKind::DBusTransient(_)
        )
    }
}

impl From<pia_provider::ProviderError> for RefreshErrorKind {
    fn from(e: pia_provider::ProviderError) -> Self {
        use pia_provider::{AuthError, ProviderError};
        match e {
            ProviderError::Auth(AuthError::Invalid) | ProviderError::Auth(AuthError::Locked) => {
                RefreshErrorKind::AuthPermanent
            }
            ProviderError::Auth(AuthError::TokenExpired) => RefreshErrorKind::TokenExpired,
            ProviderError::Region(region_err) => {
                RefreshErrorKind::ValidationError(region_err.to_string())
            }
            ProviderError::Net(net_err) => RefreshErrorKind::NetTransient(net_err.to_string()),
            ProviderError::KeyRejected(_) => RefreshErrorKind::KeyRejected,
            ProviderError::Validation(field) => RefreshErrorKind::ValidationError(field),
        }
    }
}

impl From<pia_nm::NmError> for RefreshErrorKind {
    fn from(e: pia_nm::NmError) -> Self {
        use pia_nm::NmError;
        match e {
            NmError::NotAuthorized => RefreshErrorKind::NotAuthorized,
            NmError::VersionMismatch => RefreshErrorKind::VersionMismatch,
            NmError::NotFound => RefreshErrorKind::DBusTransient("not found".to_string()),
            NmError::DBus(err) => RefreshErrorKind::DBusTransient(err.to_string()),
            NmError::Runtime(err) => RefreshErrorKind::DBusTransient(err.to_string()),
        }
    }
}

impl From<pia_profile::ValidationError> for RefreshErrorKind {
    fn from(e: pia_profile::ValidationError) -> Self {
        RefreshErrorKind::ValidationError(e.to_string())
    }
}

impl From<pia_keys::KeyStoreError> for RefreshErrorKind {
    fn from(e: pia_keys::KeyStoreError) -> Self {
        RefreshErrorKind::IoError(e.to_string())
    }
}
