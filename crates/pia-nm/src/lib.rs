//! Typed NetworkManager gateway: saves, finds, and reapplies WireGuard
//! connections over D-Bus (spec.md 4.3, C3).

mod error;
#[cfg(feature = "test-util")]
mod fakes;
mod gateway;
mod loop_bound;
mod proxies;
mod settings;
mod types;

pub use error::NmError;
#[cfg(feature = "test-util")]
pub use fakes::FakeNmGateway;
pub use gateway::{NMGateway, ZbusNmGateway};
pub use loop_bound::LoopBoundGateway;
pub use types::{ActiveConnectionBinding, AppliedConfig, SavedConnection};
