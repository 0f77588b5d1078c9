//! `ProfileBuilder` — pure, deterministic construction of a `RegionProfile`
//! from a keypair, registration result, and host preferences (spec.md 4.4).

use crate::connection::ConnectionDetails;
use crate::preferences::{Ipv6Mode, Preferences, SplitTunnel};
use crate::profile::{Ipv4Setting, Ipv6Setting, PeerSetting, Permissions, RegionProfile};
use crate::region_id::RegionId;
use pia_keys::{Keypair, PublicKey};
use std::net::{IpAddr, Ipv4Addr};
use uuid::Uuid;

/// The full-IPv4 CIDR minus RFC1918, link-local, and multicast space
/// (spec.md 4.4, "split_tunnel = exclude-rfc1918"). Each entry is a CIDR
/// block that together cover all of IPv4 except the excluded ranges.
pub const EXCLUDE_RFC1918_ALLOWED_IPS: &[&str] = &[
    "0.0.0.0/5",
    "8.0.0.0/7",
    "11.0.0.0/8",
    "12.0.0.0/6",
    "16.0.0.0/4",
    "32.0.0.0/3",
    "64.0.0.0/2",
    "128.0.0.0/3",
    "160.0.0.0/5",
    "168.0.0.0/8",
    "169.0.0.0/9",
    "169.128.0.0/10",
    "169.192.0.0/11",
    "169.224.0.0/12",
    "169.240.0.0/13",
    "169.248.0.0/14",
    "169.252.0.0/15",
    "169.255.0.0/16",
    "170.0.0.0/7",
    "172.0.0.0/12",
    "172.32.0.0/11",
    "172.64.0.0/10",
    "172.128.0.0/9",
    "173.0.0.0/8",
    "174.0.0.0/7",
    "176.0.0.0/4",
    "192.0.0.0/9",
    "192.128.0.0/11",
    "192.160.0.0/13",
    "192.169.0.0/16",
    "192.170.0.0/15",
    "192.172.0.0/14",
    "192.176.0.0/12",
    "192.192.0.0/10",
    "193.0.0.0/8",
    "194.0.0.0/7",
    "196.0.0.0/6",
    "200.0.0.0/5",
    "208.0.0.0/4",
];

#[derive(Debug, Clone, thiserror::Error)]
pub enum ValidationError {
    #[error("endpoint is not host:port with a valid port: {0}")]
    InvalidEndpoint(String),
    #[error("assigned peer ip {0} is not a usable IPv4 host address")]
    InvalidPeerIp(IpAddr),
    #[error("server public key is not a valid base64-encoded 32-byte key")]
    InvalidServerKey,
}

/// Deterministic region-profile construction: same inputs always produce a
/// byte-equal `RegionProfile` (spec.md 8, property 6).
pub struct ProfileBuilder;

impl ProfileBuilder {
    /// The UUID `build` will assign to `region_id`, computable without a
    /// keypair or registration result in hand. Lets callers (fakes,
    /// GC-of-stale-connections tooling) look up or pre-seed NM state by
    /// UUID before a profile has actually been built (spec.md 3: "uuid is
    /// stable across refreshes for the life of the region").
    pub fn uuid_for(region_id: &RegionId) -> String {
        stable_uuid(region_id)
    }

    pub fn build(
        region_id: &RegionId,
        keypair: &Keypair,
        details: &ConnectionDetails,
        prefs: &Preferences,
    ) -> Result<RegionProfile, ValidationError> {
        if details.server_endpoint_port == 0 {
            return Err(ValidationError::InvalidEndpoint(details.endpoint()));
        }
        let server_pubkey = PublicKey::from_base64(&details.server_public_key)
            .map_err(|_| ValidationError::InvalidServerKey)?;

        if !matches!(details.assigned_peer_ip, IpAddr::V4(_)) {
            return Err(ValidationError::InvalidPeerIp(details.assigned_peer_ip));
        }

        let allowed_ips = match prefs.split_tunnel {
            SplitTunnel::Off => vec![(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0u8)],
            SplitTunnel::ExcludeRfc1918 => EXCLUDE_RFC1918_ALLOWED_IPS
                .iter()
                .map(|cidr| parse_cidr(cidr).expect("EXCLUDE_RFC1918_ALLOWED_IPS is well-formed"))
                .collect(),
        };

        let peer = PeerSetting {
            pubkey: server_pubkey,
            endpoint: details.endpoint(),
            allowed_ips,
            keepalive: prefs.keepalive,
        };

        let ipv4 = if prefs.use_vpn_dns {
            Ipv4Setting {
                address: ipv4_of(details.assigned_peer_ip),
                prefix: 32,
                dns_servers: details.dns_servers.clone(),
                dns_priority: Some(-1500),
                dns_search: Some("~".to_string()),
                ignore_auto_dns: true,
            }
        } else {
            Ipv4Setting {
                address: ipv4_of(details.assigned_peer_ip),
                prefix: 32,
                dns_servers: Vec::new(),
                dns_priority: None,
                dns_search: None,
                ignore_auto_dns: false,
            }
        };

        let ipv6 = match prefs.ipv6 {
            Ipv6Mode::Disabled => Ipv6Setting::Disabled,
            Ipv6Mode::Auto => Ipv6Setting::Auto,
        };

        let uuid = stable_uuid(region_id);

        Ok(RegionProfile {
            region_id: region_id.clone(),
            connection_name: RegionProfile::connection_name_for(&details.server_label),
            interface_name: RegionProfile::interface_name_for(region_id),
            uuid,
            private_key: keypair.private.clone(),
            peer,
            ipv4,
            ipv6,
            fwmark: prefs.fwmark,
            permissions: Permissions {
                owner_user: current_user(),
            },
            autoconnect: false,
            save_to_disk: true,
        })
    }
}

/// Derives a UUID deterministically from the region id so it is stable
/// across refreshes for the life of the region (spec.md 3 invariant),
/// without needing to consult NM first. Grounded on
/// `cachebag-nmrs`'s `Uuid::new_v5(&Uuid::NAMESPACE_DNS, ...)` pattern.
fn stable_uuid(region_id: &RegionId) -> String {
    Uuid::new_v5(
        &Uuid::NAMESPACE_DNS,
        format!("pia-wg-ctl:{region_id}").as_bytes(),
    )
    .to_string()
}

fn ipv4_of(addr: IpAddr) -> Ipv4Addr {
    match addr {
        IpAddr::V4(v4) => v4,
        IpAddr::V6(_) => unreachable!("validated as V4 before calling ipv4_of"),
    }
}

fn parse_cidr(cidr: &str) -> Option<(IpAddr, u8)> {
    let (ip, prefix) = cidr.split_once('/')?;
    Some((ip.parse().ok()?, prefix.parse().ok()?))
}

fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .unwrap_or_else(|_| "root".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pia_keys::Keypair;

    fn details() -> ConnectionDetails {
        ConnectionDetails {
            server_public_key: pia_keys::Keypair::generate().public.to_base64(),
            server_endpoint_host: "1.2.3.4".to_string(),
            server_endpoint_port: 1337,
            assigned_peer_ip: "10.2.0.2".parse().unwrap(),
            dns_servers: vec!["10.2.0.1".parse().unwrap()],
            server_label: "US East".to_string(),
        }
    }

    #[test]
    fn build_is_pure() {
        let region = RegionId::new("us-east");
        let kp = Keypair::generate();
        let prefs = Preferences::default();
        let d = details();

        let p1 = ProfileBuilder::build(&region, &kp, &d, &prefs).unwrap();
        let p2 = ProfileBuilder::build(&region, &kp, &d, &prefs).unwrap();
        assert_eq!(p1, p2);
    }

    #[test]
    fn naming_invariants_hold() {
        let region = RegionId::new("us-east");
        let kp = Keypair::generate();
        let prefs = Preferences::default();
        let profile = ProfileBuilder::build(&region, &kp, &details(), &prefs).unwrap();

        assert!(profile.connection_name.starts_with("PIA-"));
        assert!(profile.interface_name.starts_with("wg-pia-"));
        assert!(profile.interface_name.len() <= 15);
    }

    #[test]
    fn full_tunnel_allowed_ips_is_default_route() {
        let region = RegionId::new("us-east");
        let kp = Keypair::generate();
        let prefs = Preferences::default();
        let profile = ProfileBuilder::build(&region, &kp, &details(), &prefs).unwrap();

        assert_eq!(
            profile.peer.allowed_ips,
            vec![(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0)]
        );
    }

    #[test]
    fn dns_fields_are_set_when_enabled() {
        let region = RegionId::new("us-east");
        let kp = Keypair::generate();
        let mut prefs = Preferences::default();
        prefs.use_vpn_dns = true;
        let profile = ProfileBuilder::build(&region, &kp, &details(), &prefs).unwrap();

        assert_eq!(profile.ipv4.dns_priority, Some(-1500));
        assert!(profile.ipv4.ignore_auto_dns);
        assert!(!profile.ipv4.dns_servers.is_empty());
    }

    #[test]
    fn dns_fields_are_omitted_when_disabled() {
        let region = RegionId::new("us-east");
        let kp = Keypair::generate();
        let mut prefs = Preferences::default();
        prefs.use_vpn_dns = false;
        let profile = ProfileBuilder::build(&region, &kp, &details(), &prefs).unwrap();

        assert_eq!(profile.ipv4.dns_priority, None);
        assert!(!profile.ipv4.ignore_auto_dns);
        assert!(profile.ipv4.dns_servers.is_empty());
    }

    #[test]
    fn uuid_is_stable_across_calls() {
        let region = RegionId::new("us-east");
        let kp1 = Keypair::generate();
        let kp2 = Keypair::generate();
        let prefs = Preferences::default();

        let p1 = ProfileBuilder::build(&region, &kp1, &details(), &prefs).unwrap();
        let p2 = ProfileBuilder::build(&region, &kp2, &details(), &prefs).unwrap();
        assert_eq!(p1.uuid, p2.uuid);
    }

    #[test]
    fn rejects_invalid_endpoint_port() {
        let region = RegionId::new("us-east");
        let kp = Keypair::generate();
        let prefs = Preferences::default();
        let mut d = details();
        d.server_endpoint_port = 0;

        assert!(matches!(
            ProfileBuilder::build(&region, &kp, &d, &prefs),
            Err(ValidationError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn rejects_invalid_server_key() {
        let region = RegionId::new("us-east");
        let kp = Keypair::generate();
        let prefs = Preferences::default();
        let mut d = details();
        d.server_public_key = "not-base64!!".to_string();

        assert!(matches!(
            ProfileBuilder::build(&region, &kp, &d, &prefs),
            Err(ValidationError::InvalidServerKey)
        ));
    }

    #[test]
    fn split_tunnel_excludes_rfc1918() {
        let region = RegionId::new("us-east");
        let kp = Keypair::generate();
        let mut prefs = Preferences::default();
        prefs.split_tunnel = SplitTunnel::ExcludeRfc1918;
        let profile = ProfileBuilder::build(&region, &kp, &details(), &prefs).unwrap();

        assert!(profile.peer.allowed_ips.len() > 1);
        assert!(!profile
            .peer
            .allowed_ips
            .contains(&(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0)));
    }
}
