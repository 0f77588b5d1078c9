//! In-memory `ProviderClient` fake (spec.md 8: "a lightweight in-memory
//! fake for each collaborator trait"). Lives in this crate because `Token`
//! can only be constructed here (its inner value is `pub(crate)` so it is
//! never accidentally built from a string literal elsewhere and logged).

use crate::auth::{RegionDescriptor, Token};
use crate::error::{AuthError, KeyRejectedError, ProviderError, RegionError};
use crate::provider::ProviderClient;
use async_trait::async_trait;
use pia_keys::PublicKey;
use pia_profile::ConnectionDetails;
use std::sync::Mutex;

enum Script {
    Ok,
    TokenExpiresOnce,
    /// First register attempt expires the token; the retry (after
    /// re-authenticating) fails with a bad-credentials error, the way
    /// spec.md 8 scenario S4's second branch does.
    TokenExpiresThenInvalid,
    KeyRejectedOnce,
    KeyRejectedAlways,
    UnknownRegion,
}

/// Drives `RefreshController` test scenarios without a live provider
/// network. Construct with a named scenario constructor.
pub struct FakeProviderClient {
    script: Script,
    register_calls: Mutex<u32>,
}

impl FakeProviderClient {
    pub fn ok() -> Self {
        Self::new(Script::Ok)
    }

    pub fn token_expires_once() -> Self {
        Self::new(Script::TokenExpiresOnce)
    }

    pub fn token_always_expires() -> Self {
        Self::new(Script::TokenExpiresThenInvalid)
    }

    pub fn key_rejected_once() -> Self {
        Self::new(Script::KeyRejectedOnce)
    }

    pub fn key_always_rejected() -> Self {
        Self::new(Script::KeyRejectedAlways)
    }

    pub fn unknown_region() -> Self {
        Self::new(Script::UnknownRegion)
    }

    fn new(script: Script) -> Self {
        Self {
            script,
            register_calls: Mutex::new(0),
        }
    }

    fn fixed_details() -> ConnectionDetails {
        ConnectionDetails {
            server_public_key: pia_keys::PrivateKey::generate().public_key().to_base64(),
            server_endpoint_host: "203.0.113.5".to_string(),
            server_endpoint_port: 1337,
            assigned_peer_ip: "10.2.0.2".parse().unwrap(),
            dns_servers: vec!["10.2.0.1".parse().unwrap()],
            server_label: "US East".to_string(),
        }
    }
}

#[async_trait]
impl ProviderClient for FakeProviderClient {
    async fn authenticate(&self, _username: &str, _password: &str) -> Result<Token, ProviderError> {
        Ok(Token::new("fake-token".to_string()))
    }

    async fn list_regions(&self) -> Result<Vec<RegionDescriptor>, ProviderError> {
        Ok(Vec::new())
    }

    async fn register_key(
        &self,
        _token: &Token,
        region_id: &str,
        _public_key: &PublicKey,
    ) -> Result<ConnectionDetails, ProviderError> {
        let call = {
            let mut calls = self.register_calls.lock().unwrap();
            *calls += 1;
            *calls
        };

        match self.script {
            Script::Ok => Ok(Self::fixed_details()),
            Script::TokenExpiresOnce => {
                if call == 1 {
                    Err(ProviderError::Auth(AuthError::TokenExpired))
                } else {
                    Ok(Self::fixed_details())
                }
            }
            Script::TokenExpiresThenInvalid => {
                if call == 1 {
                    Err(ProviderError::Auth(AuthError::TokenExpired))
                } else {
                    Err(ProviderError::Auth(AuthError::Invalid))
                }
            }
            Script::KeyRejectedOnce => {
                if call == 1 {
                    Err(ProviderError::KeyRejected(KeyRejectedError))
                } else {
                    Ok(Self::fixed_details())
                }
            }
            Script::KeyRejectedAlways => Err(ProviderError::KeyRejected(KeyRejectedError)),
            Script::UnknownRegion => {
                Err(ProviderError::Region(RegionError::Unknown(region_id.to_string())))
            }
        }
    }
}
