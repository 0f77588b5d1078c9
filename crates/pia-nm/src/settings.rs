//! Translates between `pia_profile::RegionProfile` and NM's *native*
//! WireGuard connection-settings dictionary (spec.md 4.3).
//!
//! Grounded on the WireGuard-native settings shape sketched in
//! `examples/other_examples/2c470354_cachebag-nmrs__nmrs-src-api-builders-
//! vpn.rs.rs` (`[connection]`/`[ipv4]`/`[ipv6]` sections as a
//! `HashMap<&str, HashMap<&str, Value>>`), adjusted to NM's native
//! `type = "wireguard"` connection (a top-level `[wireguard]` section
//! holding `private-key`/`peers`/`fwmark`) instead of the legacy VPN-plugin
//! shape that manifest targets, and to the nested-peer-dict encoding used by
//! `examples/other_examples/ff019891_lilioid-nm-file-secret-agent__src-
//! dbus_server.rs.rs`'s `build_wireguard_secrets` (one `a{sv}` dict per
//! peer, keyed by `public-key`).

use crate::proxies::NmSettings;
use crate::types::AppliedConfig;
use pia_profile::{Ipv6Setting, RegionProfile};
use std::collections::HashMap;
use zvariant::{OwnedValue, Value};

fn owned<'a, T: Into<Value<'a>>>(v: T) -> OwnedValue {
    OwnedValue::try_from(v.into()).expect("primitive zvariant value conversion is infallible")
}

fn peer_dict(profile: &RegionProfile) -> HashMap<String, OwnedValue> {
    let mut peer = HashMap::new();
    peer.insert(
        "public-key".to_string(),
        owned(profile.peer.pubkey.to_base64()),
    );
    peer.insert("endpoint".to_string(), owned(profile.peer.endpoint.clone()));
    let allowed_ips: Vec<String> = profile
        .peer
        .allowed_ips
        .iter()
        .map(|(ip, prefix)| format!("{ip}/{prefix}"))
        .collect();
    peer.insert("allowed-ips".to_string(), owned(allowed_ips));
    peer.insert(
        "persistent-keepalive".to_string(),
        owned(profile.peer.keepalive as u32),
    );
    peer
}

fn wireguard_section(profile: &RegionProfile) -> HashMap<String, OwnedValue> {
    let mut wg = HashMap::new();
    wg.insert(
        "private-key".to_string(),
        owned(profile.private_key.to_base64()),
    );
    wg.insert("private-key-flags".to_string(), owned(0u32));
    wg.insert("fwmark".to_string(), owned(profile.fwmark));
    wg.insert("peers".to_string(), owned(vec![peer_dict(profile)]));
    wg
}

fn ipv4_section(profile: &RegionProfile) -> HashMap<String, OwnedValue> {
    let mut ipv4 = HashMap::new();
    ipv4.insert("method".to_string(), owned("manual"));
    let address_entry: HashMap<String, OwnedValue> = [
        ("address".to_string(), owned(profile.ipv4.address.to_string())),
        ("prefix".to_string(), owned(profile.ipv4.prefix as u32)),
    ]
    .into_iter()
    .collect();
    ipv4.insert("address-data".to_string(), owned(vec![address_entry]));

    if let Some(priority) = profile.ipv4.dns_priority {
        let dns: Vec<String> = profile.ipv4.dns_servers.iter().map(|d| d.to_string()).collect();
        ipv4.insert("dns".to_string(), owned(dns));
        ipv4.insert("dns-priority".to_string(), owned(priority));
        ipv4.insert("ignore-auto-dns".to_string(), owned(profile.ipv4.ignore_auto_dns));
        if let Some(search) = &profile.ipv4.dns_search {
            ipv4.insert("dns-search".to_string(), owned(vec![search.clone()]));
        }
    }
    ipv4
}

fn ipv6_section(profile: &RegionProfile) -> HashMap<String, OwnedValue> {
    let method = match profile.ipv6 {
        Ipv6Setting::Disabled => "disabled",
        Ipv6Setting::Auto => "auto",
    };
    [("method".to_string(), owned(method))].into_iter().collect()
}

fn connection_section(profile: &RegionProfile) -> HashMap<String, OwnedValue> {
    let permissions = vec![format!("user:{}:", profile.permissions.owner_user)];
    [
        ("id".to_string(), owned(profile.connection_name.clone())),
        ("uuid".to_string(), owned(profile.uuid.clone())),
        ("type".to_string(), owned("wireguard")),
        (
            "interface-name".to_string(),
            owned(profile.interface_name.clone()),
        ),
        ("autoconnect".to_string(), owned(profile.autoconnect)),
        ("permissions".to_string(), owned(permissions)),
    ]
    .into_iter()
    .collect()
}

/// Builds the full `a{sa{sv}}` settings dictionary for `AddConnection`/
/// `Connection.Update`.
pub(crate) fn build_connection_settings(profile: &RegionProfile) -> NmSettings {
    let mut settings = NmSettings::new();
    settings.insert("connection".to_string(), connection_section(profile));
    settings.insert("wireguard".to_string(), wireguard_section(profile));
    settings.insert("ipv4".to_string(), ipv4_section(profile));
    settings.insert("ipv6".to_string(), ipv6_section(profile));
    settings
}

/// Mutates the three fields that change across a refresh in an already
/// fetched `AppliedConfig`: the local private key, the peer endpoint, and
/// (when DNS is enabled) the DNS server set (spec.md 4.3, "Reapply-vs-Update
/// policy").
pub(crate) fn apply_refresh_fields(applied: &mut AppliedConfig, profile: &RegionProfile) {
    if let Some(wg) = applied.settings.get_mut("wireguard") {
        wg.insert(
            "private-key".to_string(),
            owned(profile.private_key.to_base64()),
        );
        wg.insert("peers".to_string(), owned(vec![peer_dict(profile)]));
    }

    if let Some(ipv4) = applied.settings.get_mut("ipv4") {
        if let Some(priority) = profile.ipv4.dns_priority {
            let dns: Vec<String> = profile.ipv4.dns_servers.iter().map(|d| d.to_string()).collect();
            ipv4.insert("dns".to_string(), owned(dns));
            ipv4.insert("dns-priority".to_string(), owned(priority));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pia_keys::PrivateKey;
    use pia_profile::{Permissions, RegionId};
    use std::net::Ipv4Addr;

    fn sample_profile(label: &str) -> RegionProfile {
        let private_key = PrivateKey::generate();
        let peer_key = PrivateKey::generate().public_key();
        let region_id = RegionId::new(label);
        RegionProfile {
            connection_name: RegionProfile::connection_name_for(label),
            interface_name: RegionProfile::interface_name_for(&region_id),
            uuid: "11111111-1111-5111-8111-111111111111".to_string(),
            private_key,
            peer: pia_profile::PeerSetting {
                pubkey: peer_key,
                endpoint: "203.0.113.5:1337".to_string(),
                allowed_ips: vec![("0.0.0.0".parse().unwrap(), 0)],
                keepalive: 25,
            },
            ipv4: pia_profile::Ipv4Setting {
                address: Ipv4Addr::new(10, 6, 0, 2),
                prefix: 32,
                dns_servers: vec!["10.0.0.1".parse().unwrap()],
                dns_priority: Some(-1500),
                dns_search: None,
                ignore_auto_dns: true,
            },
            ipv6: Ipv6Setting::Disabled,
            fwmark: 0,
            permissions: Permissions {
                owner_user: "alice".to_string(),
            },
            autoconnect: false,
            save_to_disk: true,
            region_id,
        }
    }

    #[test]
    fn built_settings_carry_native_wireguard_section() {
        let profile = sample_profile("de-frankfurt");
        let settings = build_connection_settings(&profile);

        assert_eq!(
            settings["connection"]["type"],
            owned("wireguard")
        );
        assert!(settings.contains_key("wireguard"));
        assert!(settings["wireguard"].contains_key("peers"));
    }

    #[test]
    fn dns_fields_are_omitted_when_disabled() {
        let mut profile = sample_profile("us-nyc");
        profile.ipv4.dns_priority = None;
        let settings = build_connection_settings(&profile);

        assert!(!settings["ipv4"].contains_key("dns"));
        assert!(!settings["ipv4"].contains_key("dns-priority"));
    }

    #[test]
    fn refresh_mutates_only_the_three_dynamic_fields() {
        let profile = sample_profile("ca-toronto");
        let settings = build_connection_settings(&profile);
        let original_uuid = settings["connection"]["uuid"].clone();
        let original_interface = settings["connection"]["interface-name"].clone();

        let mut applied = AppliedConfig { settings };
        let mut refreshed_profile = profile.clone();
        refreshed_profile.private_key = PrivateKey::generate();
        refreshed_profile.peer.endpoint = "198.51.100.9:51820".to_string();

        apply_refresh_fields(&mut applied, &refreshed_profile);

        assert_eq!(applied.settings["connection"]["uuid"], original_uuid);
        assert_eq!(
            applied.settings["connection"]["interface-name"],
            original_interface
        );
        assert_eq!(
            applied.settings["wireguard"]["private-key"],
            owned(refreshed_profile.private_key.to_base64())
        );
    }
}
