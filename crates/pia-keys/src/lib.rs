//! Persistent WireGuard key material for the token-refresh controller.
//!
//! Owns one keypair per region on disk, under restrictive permissions, and
//! the horizon-based rotation policy that decides when a keypair is stale
//! enough to replace.

mod material;
mod store;

pub use material::{KeyError, KeyGenerator, Keypair, NativeKeyGenerator, PrivateKey, PublicKey};
pub use store::{KeyStore, KeyStoreError};
