//! WireGuard key material.
//!
//! Curve25519 keypairs used as WireGuard identities. The shape mirrors a
//! plain X25519 key exchange: a 32-byte secret scalar and its corresponding
//! public point.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::rngs::OsRng;
use std::fmt;
use std::time::SystemTime;
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};

/// WireGuard private key (Curve25519 scalar).
#[derive(Clone)]
pub struct PrivateKey {
    secret: StaticSecret,
}

impl PartialEq for PrivateKey {
    fn eq(&self, other: &Self) -> bool {
        self.secret.to_bytes() == other.secret.to_bytes()
    }
}

impl Eq for PrivateKey {}

impl PrivateKey {
    pub fn generate() -> Self {
        Self {
            secret: StaticSecret::random_from_rng(OsRng),
        }
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self {
            secret: StaticSecret::from(bytes),
        }
    }

    pub fn from_base64(s: &str) -> Result<Self, KeyError> {
        let bytes = BASE64.decode(s.trim()).map_err(|_| KeyError::InvalidBase64)?;
        if bytes.len() != 32 {
            return Err(KeyError::InvalidLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self::from_bytes(arr))
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            key: X25519Public::from(&self.secret),
        }
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes()
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(self.to_bytes())
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey([redacted])")
    }
}

/// WireGuard public key (Curve25519 point).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PublicKey {
    key: X25519Public,
}

impl PublicKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self {
            key: X25519Public::from(bytes),
        }
    }

    pub fn from_base64(s: &str) -> Result<Self, KeyError> {
        let bytes = BASE64.decode(s.trim()).map_err(|_| KeyError::InvalidBase64)?;
        if bytes.len() != 32 {
            return Err(KeyError::InvalidLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self::from_bytes(arr))
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.key.to_bytes()
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(self.to_bytes())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}...)", &self.to_base64()[..8])
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_base64())
    }
}

/// A keypair with the timestamp it was generated, used by the rotation
/// policy (`KeyStore::age`).
#[derive(Clone)]
pub struct Keypair {
    pub private: PrivateKey,
    pub public: PublicKey,
    pub created_at: SystemTime,
}

impl Keypair {
    pub fn generate() -> Self {
        let private = PrivateKey::generate();
        let public = private.public_key();
        Self {
            private,
            public,
            created_at: SystemTime::now(),
        }
    }

    pub fn from_private(private: PrivateKey, created_at: SystemTime) -> Self {
        let public = private.public_key();
        Self {
            private,
            public,
            created_at,
        }
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("public", &self.public)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Pluggable key-generation capability (spec.md 4.1: "implementations may
/// shell out to a well-known key tool or use a native crypto
/// implementation"). The default is the native x25519-dalek generator.
pub trait KeyGenerator: Send + Sync {
    fn generate(&self) -> PrivateKey;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NativeKeyGenerator;

impl KeyGenerator for NativeKeyGenerator {
    fn generate(&self) -> PrivateKey {
        PrivateKey::generate()
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum KeyError {
    #[error("invalid base64 encoding")]
    InvalidBase64,
    #[error("invalid key length (expected 32 bytes)")]
    InvalidLength,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_generation_roundtrip() {
        let kp = Keypair::generate();
        let b64 = kp.private.to_base64();
        let restored = PrivateKey::from_base64(&b64).unwrap();
        assert_eq!(kp.private.to_bytes(), restored.to_bytes());
    }

    #[test]
    fn public_key_is_deterministic() {
        let private = PrivateKey::generate();
        assert_eq!(
            private.public_key().to_bytes(),
            private.public_key().to_bytes()
        );
    }

    #[test]
    fn rejects_bad_base64() {
        assert!(matches!(
            PublicKey::from_base64("not-valid-base64!!!"),
            Err(KeyError::InvalidBase64)
        ));
    }

    #[test]
    fn rejects_wrong_length() {
        let short = BASE64.encode([0u8; 16]);
        assert!(matches!(
            PublicKey::from_base64(&short),
            Err(KeyError::InvalidLength)
        ));
    }

    #[test]
    fn debug_never_prints_private_bytes() {
        let kp = Keypair::generate();
        let debug = format!("{kp:?}");
        assert!(!debug.contains(&kp.private.to_base64()));
    }
}
