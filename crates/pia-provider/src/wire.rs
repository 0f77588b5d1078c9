//! JSON shapes exchanged with the provider (spec.md 6, "ProviderClient wire
//! protocol"). Treated as untrusted input: every field is declared, and a
//! shape mismatch becomes `ProviderError::Validation`, never a panic.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RegionListResponse {
    pub regions: Vec<RegionEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RegionEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub port_forward: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RegisterKeyResponse {
    pub server_key: String,
    pub server_ip: String,
    pub server_port: u16,
    pub peer_ip: String,
    #[serde(default)]
    pub dns_servers: Vec<String>,
    pub server_label: String,
}
