//! HTTPS client for the provider's authentication and key-registration API
//! (spec.md 4.2). Owns all network conversation with the provider; never
//! logs a credential or token.

mod auth;
mod client;
mod error;
#[cfg(feature = "test-util")]
mod fakes;
mod provider;
mod redacted;
mod wire;

pub use auth::{RegionDescriptor, Token};
pub use error::{AuthError, KeyRejectedError, NetError, ProviderError, RegionError};
#[cfg(feature = "test-util")]
pub use fakes::FakeProviderClient;
pub use provider::{HttpsProviderClient, ProviderClient, ProviderEndpoint};
pub use redacted::Redacted;
