//! `pia-wg-ctl` — refreshes WireGuard provider tokens for every configured
//! region without dropping an active tunnel (spec.md 1).
//!
//! Wires the collaborator seams `pia-controller` defines
//! (`ConfigStore`/`CredentialSource`/`Scheduler`) to the minimal
//! implementations spec.md §6 permits, and drives `RefreshOrchestrator`
//! once per invocation - the real 12h/5m-after-boot cadence is supplied by
//! an external timer (a systemd timer unit, say) that simply re-runs this
//! binary.

mod config;
mod credentials;
mod scheduler;

use crate::config::YamlConfigStore;
use crate::credentials::EnvOrFileCredentialSource;
use crate::scheduler::OneShotScheduler;
use anyhow::Context;
use clap::Parser;
use pia_controller::{
    ConfigStore, CredentialSource, OrchestratorError, RefreshController, RefreshOrchestrator,
    Scheduler,
};
use pia_nm::LoopBoundGateway;
use pia_profile::Preferences;
use pia_provider::{HttpsProviderClient, ProviderEndpoint};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Exit codes per spec.md 6.
const EXIT_OK: u8 = 0;
const EXIT_WARN: u8 = 1;
const EXIT_FAILED: u8 = 2;
const EXIT_FATAL: u8 = 3;
const EXIT_CANCELLED: u8 = 130;

#[derive(Parser, Debug)]
#[command(name = "pia-wg-ctl", about = "Refreshes WireGuard provider tokens for configured regions")]
struct Args {
    /// Path to config.yaml (spec.md 6).
    #[arg(long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Plaintext username/password file (two lines). If absent,
    /// PIA_USERNAME/PIA_PASSWORD are read from the environment instead.
    #[arg(long)]
    credentials_file: Option<PathBuf>,

    /// Maximum number of regions refreshed concurrently (spec.md 4.6).
    #[arg(long, default_value_t = pia_controller::DEFAULT_CONCURRENCY)]
    concurrency: usize,
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pia-wg-ctl")
        .join("config.yaml")
}

fn default_keys_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pia-wg-ctl")
        .join("keys")
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pia_cli=info,pia_controller=info,pia_nm=info".into()),
        )
        .init();

    let args = Args::parse();

    match run(args).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!(error = %e, "fatal error before any region could be refreshed");
            ExitCode::from(EXIT_FATAL)
        }
    }
}

async fn run(args: Args) -> anyhow::Result<u8> {
    let config_store = YamlConfigStore::new(&args.config);
    let config = config_store
        .load()
        .with_context(|| format!("loading {}", config_store.path().display()))?;

    let credentials: Arc<dyn CredentialSource> = match &args.credentials_file {
        Some(path) => Arc::new(EnvOrFileCredentialSource::file(path)),
        None => Arc::new(EnvOrFileCredentialSource::env()),
    };

    let keys = Arc::new(pia_keys::KeyStore::new(default_keys_dir()));
    let provider = Arc::new(HttpsProviderClient::new(ProviderEndpoint::default()));
    let nm = Arc::new(LoopBoundGateway::global());
    let prefs: Preferences = (&config.preferences).into();

    let controller = Arc::new(RefreshController::new(provider, keys, nm, prefs));
    let orchestrator = RefreshOrchestrator::with_concurrency(controller, credentials, args.concurrency);

    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received interrupt, cancelling in-flight refreshes");
            cancel_on_signal.cancel();
        }
    });

    // The real persistent timer lives outside this process (spec.md 6, 9);
    // this stand-in just confirms a cycle is due before the one run below.
    let due = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let due_flag = due.clone();
    OneShotScheduler.on_due(Box::new(move || {
        due_flag.store(true, std::sync::atomic::Ordering::SeqCst);
    }));
    if !due.load(std::sync::atomic::Ordering::SeqCst) {
        anyhow::bail!("scheduler never signaled a due cycle");
    }

    let regions = config.regions.clone();
    let reports = match orchestrator.run(&regions, &cancel).await {
        Ok(reports) => reports,
        Err(OrchestratorError::CredentialsUnavailable(e)) => {
            error!(error = %e, "credentials unavailable");
            return Ok(EXIT_FATAL);
        }
    };

    RefreshOrchestrator::print_summary(&reports);

    let mut updated_config = config;
    updated_config.metadata.last_refresh = Some(now_iso8601());
    config_store
        .save(&updated_config)
        .with_context(|| format!("saving {}", config_store.path().display()))?;

    if cancel.is_cancelled() {
        return Ok(EXIT_CANCELLED);
    }

    Ok(match RefreshOrchestrator::exit_code(&reports) {
        0 => EXIT_OK,
        1 => EXIT_WARN,
        2 => EXIT_FAILED,
        130 => EXIT_CANCELLED,
        _ => EXIT_FAILED,
    })
}

/// RFC 3339 / ISO-8601 UTC timestamp for `config.yaml`'s `last_refresh`
/// field (spec.md 6). No time crate in the dependency graph elsewhere in
/// the workspace, so this formats `SystemTime` directly rather than
/// pulling one in for a single call site.
fn now_iso8601() -> String {
    let since_epoch = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    let secs = since_epoch.as_secs();
    let days = secs / 86_400;
    let (year, month, day) = civil_from_days(days as i64);
    let rem = secs % 86_400;
    format!(
        "{year:04}-{month:02}-{day:02}T{:02}:{:02}:{:02}Z",
        rem / 3600,
        (rem % 3600) / 60,
        rem % 60
    )
}

/// Howard Hinnant's `civil_from_days`: days-since-epoch to a Gregorian
/// (year, month, day) triple, valid for any day count.
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let y = if m <= 2 { y + 1 } else { y };
    (y, m, d)
}
