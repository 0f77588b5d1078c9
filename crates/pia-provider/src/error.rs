//! Provider-client error kinds (spec.md 4.2, 7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    Invalid,
    #[error("account locked")]
    Locked,
    /// Trigger for re-auth + single retry in the controller (spec.md 4.5 step 3).
    #[error("token rejected by provider")]
    TokenExpired,
}

#[derive(Debug, Error)]
pub enum RegionError {
    #[error("region {0} is not offered by the provider")]
    Unknown(String),
}

/// The provider accepted the token but rejected the public key being
/// registered. Distinct from `AuthError::TokenExpired`: this is about the
/// key, not the session, and is the controller's trigger to rotate the
/// keypair and retry registration exactly once (spec.md 4.5 step 3,
/// "server rejected this public key").
#[derive(Debug, Error)]
#[error("provider rejected the registered public key")]
pub struct KeyRejectedError;

/// Transport-level failure. Retried exactly once, immediately, inside this
/// component (spec.md 4.2 retry policy) - never exponential back-off here.
#[derive(Debug, Error)]
#[error("network error: {0}")]
pub struct NetError(pub String);

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),
    #[error("region error: {0}")]
    Region(#[from] RegionError),
    #[error(transparent)]
    Net(#[from] NetError),
    #[error(transparent)]
    KeyRejected(#[from] KeyRejectedError),
    /// The provider's JSON response didn't match its declared shape. Never
    /// logged with the offending value, only the field name (spec.md 7).
    #[error("malformed provider response: field {0}")]
    Validation(String),
}
