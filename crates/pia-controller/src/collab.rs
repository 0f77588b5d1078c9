//! External collaborator seams named in spec.md 6: `ConfigStore`,
//! `CredentialSource`, `Scheduler`. Defined here, where the controller
//! depends on them; implemented minimally in `pia-cli` (spec.md §6
//! addition - these traits are the seam, not the product).

use pia_profile::{Ipv6Mode, Preferences, RegionId, SplitTunnel};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// `config.yaml`'s recognized shape (spec.md 6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub regions: Vec<RegionId>,
    pub preferences: ConfigPreferences,
    pub metadata: ConfigMetadata,
}

/// The boolean-flag surface spec.md 6 exposes in YAML, which
/// `ProfileBuilder` instead wants as the richer `pia_profile::Preferences`
/// enum set (spec.md 4.4: `use_vpn_dns`, `ipv6`, `split_tunnel` are
/// enumerated, not boolean, once past the config file boundary).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigPreferences {
    pub dns: bool,
    pub ipv6: bool,
    pub split_tunnel: bool,
    #[serde(default = "default_fwmark")]
    pub fwmark: u32,
    #[serde(default = "default_keepalive")]
    pub keepalive: u16,
}

fn default_fwmark() -> u32 {
    0
}

fn default_keepalive() -> u16 {
    25
}

impl Default for ConfigPreferences {
    fn default() -> Self {
        Self {
            dns: true,
            ipv6: false,
            split_tunnel: false,
            fwmark: default_fwmark(),
            keepalive: default_keepalive(),
        }
    }
}

impl From<&ConfigPreferences> for Preferences {
    fn from(p: &ConfigPreferences) -> Self {
        Preferences {
            use_vpn_dns: p.dns,
            ipv6: if p.ipv6 { Ipv6Mode::Auto } else { Ipv6Mode::Disabled },
            split_tunnel: if p.split_tunnel {
                SplitTunnel::ExcludeRfc1918
            } else {
                SplitTunnel::Off
            },
            fwmark: p.fwmark,
            keepalive: p.keepalive,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigMetadata {
    pub version: u32,
    /// RFC 3339 / ISO-8601 UTC timestamp of the last completed refresh
    /// cycle, updated by the orchestrator after it aggregates results
    /// (spec.md 6, "Observable side effects").
    pub last_refresh: Option<String>,
}

impl Default for ConfigMetadata {
    fn default() -> Self {
        Self {
            version: 1,
            last_refresh: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigStoreError {
    #[error("io error: {0}")]
    Io(String),
    #[error("malformed config: {0}")]
    Malformed(String),
}

/// Persists and loads `config.yaml` (spec.md 6). Out of scope for this
/// crate per spec.md §1 ("the on-disk YAML configuration reader/writer");
/// implemented minimally in `pia-cli`.
pub trait ConfigStore: Send + Sync {
    fn load(&self) -> Result<Config, ConfigStoreError>;
    fn save(&self, config: &Config) -> Result<(), ConfigStoreError>;
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("no credentials configured")]
    NotConfigured,
}

/// Supplies the (username, password) pair the controller authenticates
/// with. Out of scope per spec.md §1 ("credential entry and their storage
/// in an OS secret store"); implemented minimally in `pia-cli`.
pub trait CredentialSource: Send + Sync {
    fn get(&self) -> Result<(String, String), CredentialError>;
}

/// Invokes `f` when a refresh cycle is due. Out of scope per spec.md §1
/// ("the persistent timer that invokes refresh every 12h and 5m after
/// boot"); the real timer lives outside this process (a systemd timer
/// unit, say). Implemented in `pia-cli` as a one-shot stub: call `f` once,
/// immediately, on entry.
pub trait Scheduler: Send + Sync {
    fn on_due(&self, f: Box<dyn FnMut() + Send>);
}
