//! Provider session token.

use crate::redacted::Redacted;

/// An opaque bearer credential returned by `authenticate` and consumed by
/// `register_key` (spec.md 4.2). Never `Debug`/`Display`-ed.
#[derive(Clone)]
pub struct Token(Redacted<String>);

impl Token {
    pub(crate) fn new(raw: String) -> Self {
        Self(Redacted::new(raw))
    }

    /// Exposes the raw token for building the `Authorization` header.
    /// Callers must not log or format the result.
    pub(crate) fn expose(&self) -> &str {
        self.0.expose()
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Token({:?})", self.0)
    }
}

/// A region offered by the provider (spec.md 4.2, `list_regions`).
#[derive(Debug, Clone)]
pub struct RegionDescriptor {
    pub id: String,
    pub label: String,
    pub port_forwarding: bool,
}
