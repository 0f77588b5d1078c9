//! Data model and pure `ProfileBuilder` for canonical NM connection
//! descriptions (spec.md 3, 4.4).

mod builder;
mod connection;
mod preferences;
mod profile;
mod region_id;

pub use builder::{ProfileBuilder, ValidationError, EXCLUDE_RFC1918_ALLOWED_IPS};
pub use connection::ConnectionDetails;
pub use preferences::{Ipv6Mode, Preferences, SplitTunnel};
pub use profile::{
    Ipv4Setting, Ipv6Setting, PeerSetting, Permissions, RegionProfile, CONNECTION_NAME_PREFIX,
    INTERFACE_NAME_PREFIX,
};
pub use region_id::RegionId;
