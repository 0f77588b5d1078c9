//! `ProviderClient` (C2): authenticate, list regions, register a WireGuard
//! public key against a chosen server (spec.md 4.2).

use crate::auth::{RegionDescriptor, Token};
use crate::client::{Auth, HttpTransport};
use crate::error::{AuthError, NetError, ProviderError, RegionError};
use crate::redacted::Redacted;
use crate::wire::{RegionListResponse, RegisterKeyResponse, TokenResponse};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hyper::{Method, StatusCode};
use pia_keys::PublicKey;
use pia_profile::ConnectionDetails;
use std::time::Duration;
use tracing::{error, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[async_trait]
pub trait ProviderClient: Send + Sync {
    async fn authenticate(&self, username: &str, password: &str) -> Result<Token, ProviderError>;
    async fn list_regions(&self) -> Result<Vec<RegionDescriptor>, ProviderError>;
    async fn register_key(
        &self,
        token: &Token,
        region_id: &str,
        public_key: &PublicKey,
    ) -> Result<ConnectionDetails, ProviderError>;
}

#[derive(Debug, Clone)]
pub struct ProviderEndpoint {
    pub host: String,
    pub port: u16,
}

impl Default for ProviderEndpoint {
    fn default() -> Self {
        Self {
            host: "api.provider.example".to_string(),
            port: 443,
        }
    }
}

/// Real provider client. TLS is mandatory and not configurable
/// (see `HttpTransport`).
pub struct HttpsProviderClient {
    endpoint: ProviderEndpoint,
    transport: HttpTransport,
}

impl HttpsProviderClient {
    pub fn new(endpoint: ProviderEndpoint) -> Self {
        Self {
            endpoint,
            transport: HttpTransport::new(),
        }
    }

    /// Each request is tried once, and on transport errors retried exactly
    /// once, immediately - no exponential back-off inside this component
    /// (spec.md 4.2, 7).
    async fn send_with_retry(
        &self,
        method: Method,
        path: &str,
        auth: Auth,
        body: Option<Vec<u8>>,
    ) -> Result<(StatusCode, Vec<u8>), ProviderError> {
        let attempt = |auth: Auth, body: Option<Vec<u8>>| {
            let transport = &self.transport;
            let host = self.endpoint.host.clone();
            let port = self.endpoint.port;
            let path = path.to_string();
            let method = method.clone();
            async move {
                tokio::time::timeout(
                    REQUEST_TIMEOUT,
                    transport.request(method, &host, port, &path, auth, body),
                )
                .await
                .map_err(|_| NetError("provider request timed out".to_string()))?
            }
        };

        match attempt(auth_clone(&auth), body.clone()).await {
            Ok(resp) => Ok((resp.status, resp.body)),
            Err(e) => {
                warn!(error = %e, "provider request failed, retrying once");
                let resp = attempt(auth, body).await?;
                Ok((resp.status, resp.body))
            }
        }
    }
}

fn auth_clone(auth: &Auth) -> Auth {
    match auth {
        Auth::None => Auth::None,
        Auth::Basic(v) => Auth::Basic(v.clone()),
        Auth::Bearer(v) => Auth::Bearer(v.clone()),
    }
}

#[async_trait]
impl ProviderClient for HttpsProviderClient {
    async fn authenticate(&self, username: &str, password: &str) -> Result<Token, ProviderError> {
        let credential = Redacted::new(BASE64.encode(format!("{username}:{password}")));
        let (status, body) = self
            .send_with_retry(
                Method::POST,
                "/api/client/v2/token",
                Auth::Basic(credential.expose().clone()),
                None,
            )
            .await?;

        match status {
            StatusCode::OK => {
                let parsed: TokenResponse = serde_json::from_slice(&body)
                    .map_err(|_| ProviderError::Validation("token".to_string()))?;
                Ok(Token::new(parsed.token))
            }
            StatusCode::LOCKED => Err(ProviderError::Auth(AuthError::Locked)),
            s if s.is_client_error() => Err(ProviderError::Auth(AuthError::Invalid)),
            s => {
                error!(status = %s, "unexpected status authenticating with provider");
                Err(ProviderError::Net(NetError(format!(
                    "unexpected status {s}"
                ))))
            }
        }
    }

    async fn list_regions(&self) -> Result<Vec<RegionDescriptor>, ProviderError> {
        let (status, body) = self
            .send_with_retry(Method::GET, "/api/client/v2/regions", Auth::None, None)
            .await?;

        if !status.is_success() {
            return Err(ProviderError::Net(NetError(format!(
                "unexpected status {status}"
            ))));
        }

        let parsed: RegionListResponse = serde_json::from_slice(&body)
            .map_err(|_| ProviderError::Validation("regions".to_string()))?;

        Ok(parsed
            .regions
            .into_iter()
            .map(|r| RegionDescriptor {
                id: r.id,
                label: r.name,
                port_forwarding: r.port_forward,
            })
            .collect())
    }

    async fn register_key(
        &self,
        token: &Token,
        region_id: &str,
        public_key: &PublicKey,
    ) -> Result<ConnectionDetails, ProviderError> {
        let body = serde_json::json!({
            "region": region_id,
            "pubkey": public_key.to_base64(),
        });
        let bytes = serde_json::to_vec(&body).map_err(|e| ProviderError::Validation(e.to_string()))?;

        let (status, resp_body) = self
            .send_with_retry(
                Method::POST,
                "/api/client/v2/register_key",
                Auth::Bearer(token.expose().to_string()),
                Some(bytes),
            )
            .await?;

        match status {
            StatusCode::OK => {
                let parsed: RegisterKeyResponse = serde_json::from_slice(&resp_body)
                    .map_err(|_| ProviderError::Validation("register_key response".to_string()))?;
                to_connection_details(parsed)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(ProviderError::Auth(AuthError::TokenExpired))
            }
            StatusCode::NOT_FOUND => Err(ProviderError::Region(RegionError::Unknown(
                region_id.to_string(),
            ))),
            // The provider signals a rejected public key with 400 Bad
            // Request, distinct from the 401/403 used for an expired
            // token (spec.md 4.5 step 3, "server rejected this public key").
            StatusCode::BAD_REQUEST => Err(ProviderError::KeyRejected(crate::error::KeyRejectedError)),
            s => Err(ProviderError::Net(NetError(format!(
                "unexpected status {s}"
            )))),
        }
    }
}

fn to_connection_details(resp: RegisterKeyResponse) -> Result<ConnectionDetails, ProviderError> {
    let assigned_peer_ip = resp
        .peer_ip
        .parse()
        .map_err(|_| ProviderError::Validation("peer_ip".to_string()))?;
    let dns_servers = resp
        .dns_servers
        .iter()
        .map(|s| s.parse())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| ProviderError::Validation("dns_servers".to_string()))?;

    Ok(ConnectionDetails {
        server_public_key: resp.server_key,
        server_endpoint_host: resp.server_ip,
        server_endpoint_port: resp.server_port,
        assigned_peer_ip,
        dns_servers,
        server_label: resp.server_label,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_details_round_trip() {
        let resp = RegisterKeyResponse {
            server_key: "SK".to_string(),
            server_ip: "1.2.3.4".to_string(),
            server_port: 1337,
            peer_ip: "10.2.0.2".to_string(),
            dns_servers: vec!["10.2.0.1".to_string()],
            server_label: "US East".to_string(),
        };
        let details = to_connection_details(resp).unwrap();
        assert_eq!(details.server_label, "US East");
        assert_eq!(details.endpoint(), "1.2.3.4:1337");
    }

    #[test]
    fn malformed_peer_ip_is_validation_error() {
        let resp = RegisterKeyResponse {
            server_key: "SK".to_string(),
            server_ip: "1.2.3.4".to_string(),
            server_port: 1337,
            peer_ip: "not-an-ip".to_string(),
            dns_servers: vec![],
            server_label: "US East".to_string(),
        };
        assert!(matches!(
            to_connection_details(resp),
            Err(ProviderError::Validation(_))
        ));
    }
}
