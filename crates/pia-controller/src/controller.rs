//! `RefreshController` (C5) — the per-region state machine (spec.md 4.5).
//!
//! Modeled on `fos_vpn::region::VpnRegionManager::switch_region`'s
//! switching-flag-guarded async method: a guard is taken before the body
//! runs and released on every exit path, success or failure. That teacher
//! method uses one global `Arc<RwLock<bool>>` flag because it only ever
//! manages one active region; this controller generalizes the same shape
//! to a `tokio::sync::Mutex` keyed per region, since distinct regions must
//! be able to refresh concurrently (spec.md 5: "Across regions: no
//! ordering is guaranteed and none is required").

use crate::error::RefreshErrorKind;
use crate::state::RegionState;
use pia_keys::KeyStore;
use pia_profile::{Preferences, ProfileBuilder, RegionId, RegionProfile};
use pia_provider::{AuthError, ProviderClient, ProviderError, Token};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Default key-rotation horizon (spec.md 3, 9: "This specification makes
/// the horizon an explicit parameter defaulting to 30 days").
pub const DEFAULT_ROTATION_HORIZON: Duration = Duration::from_secs(30 * 24 * 3600);

/// A refresh cycle's outcome for one region, as classified by spec.md 4.5's
/// Ok/Warn/Err grouping plus the cancellation case spec.md 5 carves out
/// separately from both.
#[derive(Debug, Clone)]
pub enum Outcome {
    Ok,
    Warn(RefreshErrorKind),
    Err(RefreshErrorKind),
    /// Cancellation was observed at a suspension point before any NM
    /// mutation (spec.md 5, 8 property 10). Distinct from `Err` because it
    /// is neither a provider/NM failure nor a reason to mark the region
    /// `Failed` — the next refresh simply starts from `Idle` again.
    Cancelled,
}

/// What `reconcile` (spec.md 4.5 step 5) produced, before the controller
/// has decided how to fold it into an `Outcome` and a `RegionState`.
enum StepResult {
    Clean,
    Warned(RefreshErrorKind),
}

/// Any way a refresh step can fail short of a clean or warned success.
enum StepError {
    Cancelled,
    Failed(RefreshErrorKind),
}

impl From<ProviderError> for StepError {
    fn from(e: ProviderError) -> Self {
        StepError::Failed(e.into())
    }
}

impl From<pia_nm::NmError> for StepError {
    fn from(e: pia_nm::NmError) -> Self {
        StepError::Failed(e.into())
    }
}

impl From<pia_keys::KeyStoreError> for StepError {
    fn from(e: pia_keys::KeyStoreError) -> Self {
        StepError::Failed(e.into())
    }
}

impl From<pia_profile::ValidationError> for StepError {
    fn from(e: pia_profile::ValidationError) -> Self {
        StepError::Failed(e.into())
    }
}

/// Orchestrates C1–C4 for one region with at-most-one-concurrent-refresh
/// (spec.md 4.5), retry, and live-vs-saved reconciliation.
pub struct RefreshController {
    provider: Arc<dyn ProviderClient>,
    keys: Arc<KeyStore>,
    nm: Arc<dyn pia_nm::NMGateway>,
    prefs: Preferences,
    rotation_horizon: Duration,
    regions: StdMutex<HashMap<RegionId, Arc<tokio::sync::Mutex<RegionState>>>>,
}

impl RefreshController {
    pub fn new(
        provider: Arc<dyn ProviderClient>,
        keys: Arc<KeyStore>,
        nm: Arc<dyn pia_nm::NMGateway>,
        prefs: Preferences,
    ) -> Self {
        Self::with_rotation_horizon(provider, keys, nm, prefs, DEFAULT_ROTATION_HORIZON)
    }

    pub fn with_rotation_horizon(
        provider: Arc<dyn ProviderClient>,
        keys: Arc<KeyStore>,
        nm: Arc<dyn pia_nm::NMGateway>,
        prefs: Preferences,
        rotation_horizon: Duration,
    ) -> Self {
        Self {
            provider,
            keys,
            nm,
            prefs,
            rotation_horizon,
            regions: StdMutex::new(HashMap::new()),
        }
    }

    fn region_lock(&self, region_id: &RegionId) -> Arc<tokio::sync::Mutex<RegionState>> {
        let mut regions = self.regions.lock().expect("region map lock poisoned");
        regions
            .entry(region_id.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(RegionState::Idle)))
            .clone()
    }

    /// The region's current state, for status printers and tests. Does not
    /// itself take part in the refresh's exclusivity — it is a snapshot.
    pub async fn state(&self, region_id: &RegionId) -> RegionState {
        self.region_lock(region_id).lock().await.clone()
    }

    /// Runs one refresh cycle for `region_id` (spec.md 4.5). Serializes
    /// with any other in-flight refresh of the *same* region; distinct
    /// regions proceed independently.
    pub async fn refresh(
        &self,
        region_id: &RegionId,
        username: &str,
        password: &str,
        cancel: &CancellationToken,
    ) -> Outcome {
        let lock = self.region_lock(region_id);
        let mut state = lock.lock().await;
        let attempts = state.attempts() + 1;
        *state = RegionState::Refreshing {
            started_at: Instant::now(),
        };

        let result = self.run(region_id, username, password, cancel).await;

        *state = match &result {
            Ok(_) => RegionState::Healthy {
                last_refresh: Instant::now(),
            },
            Err(StepError::Cancelled) => RegionState::Idle,
            Err(StepError::Failed(kind)) => RegionState::Failed {
                kind: kind.clone(),
                at: Instant::now(),
                attempts,
            },
        };

        match result {
            Ok(StepResult::Clean) => Outcome::Ok,
            Ok(StepResult::Warned(kind)) => Outcome::Warn(kind),
            Err(StepError::Cancelled) => {
                info!(region_id = %region_id, "refresh cancelled before any NM mutation");
                Outcome::Cancelled
            }
            Err(StepError::Failed(kind)) => Outcome::Err(kind),
        }
    }

    async fn run(
        &self,
        region_id: &RegionId,
        username: &str,
        password: &str,
        cancel: &CancellationToken,
    ) -> Result<StepResult, StepError> {
        if cancel.is_cancelled() {
            return Err(StepError::Cancelled);
        }

        // Step 1: authenticate. AuthError::Invalid|Locked is permanent, no
        // retry (spec.md 4.5 step 1).
        let mut token = self.provider.authenticate(username, password).await?;

        if cancel.is_cancelled() {
            return Err(StepError::Cancelled);
        }

        // Step 2: load or rotate the keypair past the rotation horizon.
        let mut keypair = self.keys.load_or_create(region_id.as_str())?;
        if self
            .keys
            .age(region_id.as_str())
            .map(|age| age > self.rotation_horizon)
            .unwrap_or(false)
        {
            info!(region_id = %region_id, "keypair past rotation horizon, rotating");
            keypair = self.keys.rotate(region_id.as_str())?;
        }

        if cancel.is_cancelled() {
            return Err(StepError::Cancelled);
        }

        // Step 3: register, with the two one-shot retries spec.md 4.5
        // names: re-auth on `TokenExpired`, key rotation on rejection.
        let details = self
            .register_with_retry(region_id, &mut token, &mut keypair, username, password)
            .await?;

        if cancel.is_cancelled() {
            return Err(StepError::Cancelled);
        }

        // Step 4: pure profile construction.
        let profile = ProfileBuilder::build(region_id, &keypair, &details, &self.prefs)?;

        // Step 5: NM reconciliation.
        self.reconcile(region_id, &profile, cancel).await
    }

    async fn register_with_retry(
        &self,
        region_id: &RegionId,
        token: &mut Token,
        keypair: &mut pia_keys::Keypair,
        username: &str,
        password: &str,
    ) -> Result<pia_profile::ConnectionDetails, StepError> {
        match self
            .provider
            .register_key(token, region_id.as_str(), &keypair.public)
            .await
        {
            Ok(details) => Ok(details),

            // First occurrence this refresh: re-authenticate, then retry
            // registration exactly once (spec.md 4.5 step 3).
            Err(ProviderError::Auth(AuthError::TokenExpired)) => {
                warn!(region_id = %region_id, "provider token rejected, re-authenticating");
                *token = self.provider.authenticate(username, password).await?;
                self.provider
                    .register_key(token, region_id.as_str(), &keypair.public)
                    .await
                    .map_err(StepError::from)
            }

            // Provider rejected the public key: rotate and retry exactly
            // once with the new key (spec.md 4.5 step 3). A second
            // consecutive rejection is `KeyRejected`, not retried further.
            Err(ProviderError::KeyRejected(_)) => {
                warn!(region_id = %region_id, "provider rejected public key, rotating");
                *keypair = self.keys.rotate(region_id.as_str())?;
                self.provider
                    .register_key(token, region_id.as_str(), &keypair.public)
                    .await
                    .map_err(|e| match e {
                        ProviderError::KeyRejected(_) => {
                            StepError::Failed(RefreshErrorKind::KeyRejected)
                        }
                        other => StepError::from(other),
                    })
            }

            Err(other) => Err(StepError::from(other)),
        }
    }

    /// Step 5 (spec.md 4.5): lookup-saved → add-if-absent →
    /// lookup-active → update-if-inactive → reapply-then-update-if-active.
    ///
    /// `NMGateway::reapply` already performs the "refetch once, retry
    /// once" dance on a stale version id internally (spec.md 4.3), so this
    /// level only has to thread the cancellation checkpoints spec.md 5
    /// names and decide what a post-reapply `update_saved` failure means
    /// for the cycle outcome.
    async fn reconcile(
        &self,
        region_id: &RegionId,
        profile: &RegionProfile,
        cancel: &CancellationToken,
    ) -> Result<StepResult, StepError> {
        if cancel.is_cancelled() {
            return Err(StepError::Cancelled);
        }

        let saved = self.nm.find_by_uuid(&profile.uuid).await?;

        let Some(saved) = saved else {
            self.nm.add_saved(profile).await?;
            return Ok(StepResult::Clean);
        };

        if cancel.is_cancelled() {
            return Err(StepError::Cancelled);
        }

        let active = self.nm.find_active_for(&profile.uuid).await?;

        let Some(active) = active else {
            self.nm.update_saved(&saved, profile).await?;
            return Ok(StepResult::Clean);
        };

        // Cancellation between here and `reapply` is permitted: simply
        // abandon the work without having mutated NM (spec.md 5).
        if cancel.is_cancelled() {
            return Err(StepError::Cancelled);
        }

        let (applied, version_id) = self.nm.get_applied(&active).await?;

        // `reapply` is not safe to cancel mid-call; it is allowed to
        // complete once started (spec.md 5, 4.6). The gateway already
        // retried a stale version id once internally (spec.md 4.3); a
        // `VersionMismatch` or D-Bus/net transient that still reaches here
        // is persistent, but the tunnel may still be usable, so it
        // downgrades the cycle to `Warn` rather than failing it outright
        // (spec.md 4.5, 8 property 9).
        if let Err(e) = self.nm.reapply(&active, applied, version_id, profile).await {
            let kind = RefreshErrorKind::from(e);
            if kind.is_warning() {
                warn!(region_id = %region_id, kind = %kind, "reapply failed persistently; surfacing as warning");
                return Ok(StepResult::Warned(kind));
            }
            return Err(StepError::Failed(kind));
        }

        // Open Question (spec.md 9) resolved as: a post-reapply
        // `update_saved` failure does not invalidate an already-live
        // refresh. It downgrades the cycle to `Warn`, annotated with the
        // failure, rather than staying silently `Ok`.
        match self.nm.update_saved(&saved, profile).await {
            Ok(()) => Ok(StepResult::Clean),
            Err(e) => {
                warn!(region_id = %region_id, "post-reapply update_saved failed; refresh is live but saved profile is stale");
                Ok(StepResult::Warned(e.into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeNmGateway, FakeProviderClient};
    use pia_nm::NmError;
    use pia_provider::RegionError;

    fn keystore() -> (tempfile::TempDir, Arc<KeyStore>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(KeyStore::new(dir.path()));
        (dir, store)
    }

    fn controller(
        provider: FakeProviderClient,
        nm: FakeNmGateway,
        keys: Arc<KeyStore>,
    ) -> RefreshController {
        RefreshController::new(Arc::new(provider), keys, Arc::new(nm), Preferences::default())
    }

    #[tokio::test]
    async fn s1_cold_provision_adds_saved_connection() {
        let (_dir, keys) = keystore();
        let nm = FakeNmGateway::empty();
        let seen_adds = nm.added.clone();
        let controller = controller(FakeProviderClient::ok(), nm, keys);

        let region = RegionId::new("us-east");
        let outcome = controller
            .refresh(&region, "user", "pass", &CancellationToken::new())
            .await;

        assert!(matches!(outcome, Outcome::Ok));
        let added = seen_adds.lock().unwrap();
        assert_eq!(added.len(), 1);
        assert!(added[0].connection_name.starts_with("PIA-"));
        assert!(matches!(
            controller.state(&region).await,
            RegionState::Healthy { .. }
        ));
    }

    #[tokio::test]
    async fn s2_hot_refresh_reapplies_without_dropping_binding() {
        let (_dir, keys) = keystore();
        let region = RegionId::new("us-east");
        let nm = FakeNmGateway::with_active_connection(&region);
        let reapply_calls = nm.reapply_calls.clone();
        let controller = controller(FakeProviderClient::ok(), nm, keys);

        let outcome = controller
            .refresh(&region, "user", "pass", &CancellationToken::new())
            .await;

        assert!(matches!(outcome, Outcome::Ok));
        assert_eq!(*reapply_calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn s4_expired_token_retries_once_then_succeeds() {
        let (_dir, keys) = keystore();
        let provider = FakeProviderClient::token_expires_once();
        let nm = FakeNmGateway::empty();
        let controller = controller(provider, nm, keys);
        let region = RegionId::new("us-east");

        let outcome = controller
            .refresh(&region, "user", "pass", &CancellationToken::new())
            .await;

        assert!(matches!(outcome, Outcome::Ok));
    }

    #[tokio::test]
    async fn s4_expired_token_retry_also_fails_is_auth_permanent() {
        let (_dir, keys) = keystore();
        let provider = FakeProviderClient::token_always_expires();
        let nm = FakeNmGateway::empty();
        let controller = controller(provider, nm, keys);
        let region = RegionId::new("us-east");

        let outcome = controller
            .refresh(&region, "user", "pass", &CancellationToken::new())
            .await;

        assert!(matches!(
            outcome,
            Outcome::Err(RefreshErrorKind::AuthPermanent)
        ));
        assert!(matches!(
            controller.state(&region).await,
            RegionState::Failed {
                kind: RefreshErrorKind::AuthPermanent,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn s5_rejected_key_rotates_and_retries_once() {
        let (_dir, keys) = keystore();
        let provider = FakeProviderClient::key_rejected_once();
        let nm = FakeNmGateway::empty();
        let controller = controller(provider, nm, keys);
        let region = RegionId::new("us-east");

        let first_key = controller.keys.load_or_create(region.as_str()).unwrap();
        let outcome = controller
            .refresh(&region, "user", "pass", &CancellationToken::new())
            .await;

        assert!(matches!(outcome, Outcome::Ok));
        let rotated_key = controller.keys.load_or_create(region.as_str()).unwrap();
        assert_ne!(
            first_key.private.to_bytes(),
            rotated_key.private.to_bytes()
        );
    }

    #[tokio::test]
    async fn s5_rejected_key_twice_is_key_rejected() {
        let (_dir, keys) = keystore();
        let provider = FakeProviderClient::key_always_rejected();
        let nm = FakeNmGateway::empty();
        let controller = controller(provider, nm, keys);
        let region = RegionId::new("us-east");

        let outcome = controller
            .refresh(&region, "user", "pass", &CancellationToken::new())
            .await;

        assert!(matches!(
            outcome,
            Outcome::Err(RefreshErrorKind::KeyRejected)
        ));
    }

    #[tokio::test]
    async fn s6_policy_kit_denial_on_inactive_update_is_not_authorized() {
        let (_dir, keys) = keystore();
        let region = RegionId::new("us-east");
        let nm = FakeNmGateway::with_saved_connection_denying_update(&region);
        let controller = controller(FakeProviderClient::ok(), nm, keys);

        let outcome = controller
            .refresh(&region, "user", "pass", &CancellationToken::new())
            .await;

        assert!(matches!(
            outcome,
            Outcome::Err(RefreshErrorKind::NotAuthorized)
        ));
    }

    #[tokio::test]
    async fn region_errors_are_validation_errors() {
        let (_dir, keys) = keystore();
        let provider = FakeProviderClient::unknown_region();
        let nm = FakeNmGateway::empty();
        let controller = controller(provider, nm, keys);
        let region = RegionId::new("nowhere");

        let outcome = controller
            .refresh(&region, "user", "pass", &CancellationToken::new())
            .await;

        assert!(matches!(
            outcome,
            Outcome::Err(RefreshErrorKind::ValidationError(_))
        ));
        // sanity: the fake really does return this kind of error
        let err = ProviderError::Region(RegionError::Unknown("nowhere".to_string()));
        assert!(matches!(err, ProviderError::Region(_)));
    }

    #[tokio::test]
    async fn cancellation_before_reconcile_makes_no_nm_mutation() {
        let (_dir, keys) = keystore();
        let nm = FakeNmGateway::empty();
        let add_calls = nm.added.clone();
        let controller = controller(FakeProviderClient::ok(), nm, keys);
        let region = RegionId::new("us-east");

        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = controller.refresh(&region, "user", "pass", &cancel).await;

        assert!(matches!(outcome, Outcome::Cancelled));
        assert!(add_calls.lock().unwrap().is_empty());
        assert!(matches!(controller.state(&region).await, RegionState::Idle));
    }

    #[tokio::test]
    async fn at_most_one_refresh_in_flight_per_region() {
        let (_dir, keys) = keystore();
        let region = RegionId::new("us-east");
        let nm = FakeNmGateway::slow_empty();
        let controller = Arc::new(controller(FakeProviderClient::ok(), nm, keys));

        let c1 = controller.clone();
        let r1 = region.clone();
        let first = tokio::spawn(async move {
            c1.refresh(&r1, "user", "pass", &CancellationToken::new())
                .await
        });

        // Give the first refresh a chance to take the region lock and
        // start its slow NM call before checking the second observes
        // `Refreshing`.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(matches!(
            controller.state(&region).await,
            RegionState::Refreshing { .. }
        ));

        first.await.unwrap();
    }

    #[tokio::test]
    async fn distinct_regions_refresh_independently() {
        let (_dir, keys) = keystore();
        let nm = FakeNmGateway::empty();
        let controller = Arc::new(controller(FakeProviderClient::ok(), nm, keys));

        let a = RegionId::new("us-east");
        let b = RegionId::new("de-frankfurt");
        let ca = controller.clone();
        let cb = controller.clone();
        let (ra, rb) = tokio::join!(
            ca.refresh(&a, "user", "pass", &CancellationToken::new()),
            cb.refresh(&b, "user", "pass", &CancellationToken::new())
        );

        assert!(matches!(ra, Outcome::Ok));
        assert!(matches!(rb, Outcome::Ok));
    }

    #[tokio::test]
    async fn post_reapply_update_saved_failure_downgrades_to_warn() {
        let (_dir, keys) = keystore();
        let region = RegionId::new("us-east");
        let nm = FakeNmGateway::active_but_update_saved_fails(&region);
        let controller = controller(FakeProviderClient::ok(), nm, keys);

        let outcome = controller
            .refresh(&region, "user", "pass", &CancellationToken::new())
            .await;

        assert!(matches!(outcome, Outcome::Warn(_)));
    }

    #[tokio::test]
    async fn s3_persistent_version_mismatch_on_reapply_is_warn_not_err() {
        let (_dir, keys) = keystore();
        let region = RegionId::new("us-east");
        let nm = FakeNmGateway::with_active_connection_reapply_always_mismatches(&region);
        let controller = controller(FakeProviderClient::ok(), nm, keys);

        let outcome = controller
            .refresh(&region, "user", "pass", &CancellationToken::new())
            .await;

        assert!(matches!(
            outcome,
            Outcome::Warn(RefreshErrorKind::VersionMismatch)
        ));
        assert!(matches!(
            controller.state(&region).await,
            RegionState::Healthy { .. }
        ));
    }

    // Silences an unused-import warning in builds where `NmError` isn't
    // otherwise referenced from this module directly.
    #[allow(dead_code)]
    fn _use(e: NmError) -> NmError {
        e
    }
}
