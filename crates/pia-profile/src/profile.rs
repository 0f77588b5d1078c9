//! The canonical, provider-independent connection description fed to
//! NMGateway (spec.md 3: `RegionProfile`).

use crate::region_id::RegionId;
use pia_keys::{PrivateKey, PublicKey};
use std::net::{IpAddr, Ipv4Addr};

pub const CONNECTION_NAME_PREFIX: &str = "PIA-";
pub const INTERFACE_NAME_PREFIX: &str = "wg-pia-";

#[derive(Debug, Clone, PartialEq)]
pub struct PeerSetting {
    pub pubkey: PublicKey,
    pub endpoint: String,
    pub allowed_ips: Vec<(IpAddr, u8)>,
    pub keepalive: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ipv4Setting {
    pub address: Ipv4Addr,
    pub prefix: u8,
    pub dns_servers: Vec<IpAddr>,
    /// `None` when VPN DNS is disabled: DNS fields are entirely omitted.
    pub dns_priority: Option<i32>,
    pub dns_search: Option<String>,
    pub ignore_auto_dns: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ipv6Setting {
    Disabled,
    Auto,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Permissions {
    pub owner_user: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionProfile {
    pub region_id: RegionId,
    pub connection_name: String,
    pub interface_name: String,
    pub uuid: String,
    pub private_key: PrivateKey,
    pub peer: PeerSetting,
    pub ipv4: Ipv4Setting,
    pub ipv6: Ipv6Setting,
    pub fwmark: u32,
    pub permissions: Permissions,
    pub autoconnect: bool,
    pub save_to_disk: bool,
}

impl RegionProfile {
    pub fn connection_name_for(label: &str) -> String {
        format!("{CONNECTION_NAME_PREFIX}{label}")
    }

    pub fn interface_name_for(region_id: &RegionId) -> String {
        // NM interface names are capped at 15 bytes (IFNAMSIZ - 1); truncate
        // the region id portion to fit, keeping the mandatory prefix intact.
        let max_region_len = 15usize.saturating_sub(INTERFACE_NAME_PREFIX.len());
        let region: String = region_id
            .as_str()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
            .take(max_region_len)
            .collect();
        format!("{INTERFACE_NAME_PREFIX}{region}")
    }
}
