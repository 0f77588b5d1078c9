//! Ephemeral connection details returned by a registration call.

use std::net::IpAddr;

/// What `ProviderClient::register_key` hands back for one region.
/// Never persisted; replaced on every successful registration.
#[derive(Debug, Clone)]
pub struct ConnectionDetails {
    pub server_public_key: String,
    pub server_endpoint_host: String,
    pub server_endpoint_port: u16,
    pub assigned_peer_ip: IpAddr,
    pub dns_servers: Vec<IpAddr>,
    pub server_label: String,
}

impl ConnectionDetails {
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.server_endpoint_host, self.server_endpoint_port)
    }
}
