//! `RefreshOrchestrator` (C6) — drives `RefreshController` across every
//! configured region and aggregates the results (spec.md 4.6, 6, 7).

use crate::collab::{CredentialError, CredentialSource};
use crate::controller::{Outcome, RefreshController};
use pia_profile::RegionId;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Default bound on concurrent in-flight region refreshes (spec.md 4.6).
pub const DEFAULT_CONCURRENCY: usize = 4;

/// A failure that aborts the whole run before any region is attempted -
/// distinct from a per-region `Outcome::Err`, and mapped by the caller to
/// exit code 3 rather than 2 (spec.md 6: "fatal environmental error ...
/// credentials missing").
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("credentials unavailable: {0}")]
    CredentialsUnavailable(#[from] CredentialError),
}

/// One region's result for the summary line and exit-code computation
/// (spec.md 4.6: "Collects `{region_id, outcome, duration}` reports").
#[derive(Debug, Clone)]
pub struct RegionReport {
    pub region_id: RegionId,
    pub outcome: Outcome,
    pub duration: Duration,
}

impl RegionReport {
    /// `✓`/`⚠`/`✗` plus a short reason drawn from the kind (spec.md 7:
    /// "orchestrator prints one line per region").
    pub fn summary_line(&self) -> String {
        match &self.outcome {
            Outcome::Ok => format!("✓ {} ({:.1}s)", self.region_id, self.duration.as_secs_f32()),
            Outcome::Warn(kind) => format!(
                "⚠ {} ({:.1}s): {kind}",
                self.region_id,
                self.duration.as_secs_f32()
            ),
            Outcome::Err(kind) => format!(
                "✗ {} ({:.1}s): {kind}",
                self.region_id,
                self.duration.as_secs_f32()
            ),
            Outcome::Cancelled => {
                format!("✗ {} ({:.1}s): cancelled", self.region_id, self.duration.as_secs_f32())
            }
        }
    }
}

/// Bounded-concurrency fan-out over `RefreshController::refresh` (spec.md
/// 4.6). Grounded on `fos_vpn::region::VpnRegionManager`'s use of
/// `tokio::sync::RwLock`-guarded shared state for the same family of
/// concern — here generalized to a `Semaphore` since the orchestrator
/// bounds how many regions refresh at once rather than excluding all but
/// one.
pub struct RefreshOrchestrator {
    controller: Arc<RefreshController>,
    credentials: Arc<dyn CredentialSource>,
    concurrency: usize,
}

impl RefreshOrchestrator {
    pub fn new(controller: Arc<RefreshController>, credentials: Arc<dyn CredentialSource>) -> Self {
        Self::with_concurrency(controller, credentials, DEFAULT_CONCURRENCY)
    }

    pub fn with_concurrency(
        controller: Arc<RefreshController>,
        credentials: Arc<dyn CredentialSource>,
        concurrency: usize,
    ) -> Self {
        Self {
            controller,
            credentials,
            concurrency: concurrency.max(1),
        }
    }

    /// Refreshes every region in `regions`, at most `concurrency` at a
    /// time, and returns one report per region in the order refreshes
    /// completed (spec.md 4.5: "Across regions: no ordering is guaranteed
    /// and none is required").
    pub async fn run(
        &self,
        regions: &[RegionId],
        cancel: &CancellationToken,
    ) -> Result<Vec<RegionReport>, OrchestratorError> {
        let (username, password) = self.credentials.get().map_err(|e| {
            warn!(error = %e, "no credentials available; cannot refresh any region");
            OrchestratorError::from(e)
        })?;

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = Vec::with_capacity(regions.len());

        for region_id in regions {
            let controller = self.controller.clone();
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();
            let region_id = region_id.clone();
            let username = username.clone();
            let password = password.clone();

            tasks.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore is never closed");
                let started = Instant::now();
                let outcome = controller.refresh(&region_id, &username, &password, &cancel).await;
                RegionReport {
                    region_id,
                    outcome,
                    duration: started.elapsed(),
                }
            }));
        }

        let mut reports = Vec::with_capacity(tasks.len());
        for task in tasks {
            match task.await {
                Ok(report) => reports.push(report),
                Err(join_err) => {
                    warn!(error = %join_err, "region refresh task panicked");
                }
            }
        }
        Ok(reports)
    }

    /// The process exit code for a completed run, per spec.md 6's table.
    /// `3` (fatal environmental error) is the caller's responsibility to
    /// signal directly - it never arises from within a completed `run`.
    pub fn exit_code(reports: &[RegionReport]) -> i32 {
        if reports.iter().any(|r| matches!(r.outcome, Outcome::Cancelled)) {
            return 130;
        }
        if reports.iter().any(|r| matches!(r.outcome, Outcome::Err(_))) {
            return 2;
        }
        if reports.iter().any(|r| matches!(r.outcome, Outcome::Warn(_))) {
            return 1;
        }
        0
    }

    /// Prints the `✓`/`⚠`/`✗` summary spec.md 7 describes and logs a
    /// structured completion event per region.
    pub fn print_summary(reports: &[RegionReport]) {
        for report in reports {
            println!("{}", report.summary_line());
            match &report.outcome {
                Outcome::Ok => info!(region_id = %report.region_id, duration_s = report.duration.as_secs_f32(), "refresh ok"),
                Outcome::Warn(kind) => warn!(region_id = %report.region_id, kind = %kind, "refresh completed with warning"),
                Outcome::Err(kind) => warn!(region_id = %report.region_id, kind = %kind, "refresh failed"),
                Outcome::Cancelled => warn!(region_id = %report.region_id, "refresh cancelled"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::CredentialError;
    use crate::fakes::{FakeNmGateway, FakeProviderClient};
    use pia_keys::KeyStore;
    use pia_profile::Preferences;

    struct FixedCredentials;

    impl CredentialSource for FixedCredentials {
        fn get(&self) -> Result<(String, String), CredentialError> {
            Ok(("user".to_string(), "pass".to_string()))
        }
    }

    struct MissingCredentials;

    impl CredentialSource for MissingCredentials {
        fn get(&self) -> Result<(String, String), CredentialError> {
            Err(CredentialError::NotConfigured)
        }
    }

    fn controller() -> (tempfile::TempDir, Arc<RefreshController>) {
        let dir = tempfile::tempdir().unwrap();
        let keys = Arc::new(KeyStore::new(dir.path()));
        let nm = FakeNmGateway::empty();
        let provider = FakeProviderClient::ok();
        (
            dir,
            Arc::new(RefreshController::new(
                Arc::new(provider),
                keys,
                Arc::new(nm),
                Preferences::default(),
            )),
        )
    }

    #[tokio::test]
    async fn all_ok_regions_exit_code_is_zero() {
        let (_dir, controller) = controller();
        let orchestrator = RefreshOrchestrator::new(controller, Arc::new(FixedCredentials));
        let regions = vec![RegionId::new("us-east"), RegionId::new("de-frankfurt")];

        let reports = orchestrator
            .run(&regions, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| matches!(r.outcome, Outcome::Ok)));
        assert_eq!(RefreshOrchestrator::exit_code(&reports), 0);
    }

    #[tokio::test]
    async fn missing_credentials_aborts_the_run_before_touching_any_region() {
        let (_dir, controller) = controller();
        let orchestrator = RefreshOrchestrator::new(controller, Arc::new(MissingCredentials));
        let regions = vec![RegionId::new("us-east")];

        let result = orchestrator.run(&regions, &CancellationToken::new()).await;

        assert!(matches!(
            result,
            Err(OrchestratorError::CredentialsUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn cancelled_region_drives_exit_code_130() {
        let (_dir, controller) = controller();
        let orchestrator = RefreshOrchestrator::new(controller, Arc::new(FixedCredentials));
        let regions = vec![RegionId::new("us-east")];

        let cancel = CancellationToken::new();
        cancel.cancel();
        let reports = orchestrator.run(&regions, &cancel).await.unwrap();

        assert!(matches!(reports[0].outcome, Outcome::Cancelled));
        assert_eq!(RefreshOrchestrator::exit_code(&reports), 130);
    }

    #[tokio::test]
    async fn concurrency_bound_is_respected() {
        let (_dir, controller) = controller();
        let orchestrator =
            RefreshOrchestrator::with_concurrency(controller, Arc::new(FixedCredentials), 1);
        let regions = vec![
            RegionId::new("us-east"),
            RegionId::new("de-frankfurt"),
            RegionId::new("uk-london"),
        ];

        let reports = orchestrator
            .run(&regions, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(reports.len(), 3);
        assert!(reports.iter().all(|r| matches!(r.outcome, Outcome::Ok)));
    }
}
