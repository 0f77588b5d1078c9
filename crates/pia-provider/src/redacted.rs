//! A wrapper that refuses to print what it holds.
//!
//! Generalizes `pia_keys::PrivateKey`'s custom `Debug` impl (which prints
//! `"PrivateKey([redacted])"`) to any credential or token value: passwords,
//! auth tokens, anything that must never reach a log line (spec.md 4.2 -
//! "No credential or token is ever logged; this is a hard invariant").

use std::fmt;

#[derive(Clone)]
pub struct Redacted<T>(T);

impl<T> Redacted<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Access the wrapped value. Callers must not pass the result to
    /// anything that logs or formats it.
    pub fn expose(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[redacted]")
    }
}

impl<T> fmt::Display for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[redacted]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_never_leaks() {
        let r = Redacted::new("super-secret-password".to_string());
        assert_eq!(format!("{r:?}"), "[redacted]");
        assert_eq!(format!("{r}"), "[redacted]");
    }

    #[test]
    fn expose_returns_the_value() {
        let r = Redacted::new(42u32);
        assert_eq!(*r.expose(), 42);
    }
}
