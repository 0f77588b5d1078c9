//! Re-exports the collaborator fakes that actually live in `pia-nm` and
//! `pia-provider`, behind their `test-util` features, since this crate
//! cannot construct their crate-private types itself (spec.md 8).

pub use pia_nm::FakeNmGateway;
pub use pia_provider::FakeProviderClient;
