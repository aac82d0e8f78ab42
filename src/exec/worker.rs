// src/exec/worker.rs

//! One emulator's worker: boot, connect, run, report back.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};

use crate::bot::app::{handle_popups, start_app};
use crate::bot::poll::{poll_until, sleep_or_stop};
use crate::bot::{AppControl, AppProfile, BotContext, DeviceApp, Timings};
use crate::config::ConfigFile;
use crate::device::{AdbDriver, Driver};
use crate::emulator::EmulatorManager;
use crate::engine::{SessionEvent, WorkerMode, WorkerRequest};
use crate::errors::{BotError, Result};
use crate::sched::{refresh_all, ChannelSink, Scheduler, StatusEvent, StatusSink, TracingSink};
use crate::tasks::TaskRegistry;
use crate::vision::ImageMatcher;

const ADB_STATE_POLL: Duration = Duration::from_secs(2);

/// Opens a driver for an adb serial.
#[async_trait]
pub trait DeviceConnector: Send + Sync {
    async fn connect(&self, serial: &str) -> Result<Arc<dyn Driver>>;
}

/// Connects through the `adb` binary.
#[derive(Debug, Clone)]
pub struct AdbConnector {
    adb_path: String,
}

impl AdbConnector {
    pub fn new(adb_path: impl Into<String>) -> Self {
        Self {
            adb_path: adb_path.into(),
        }
    }
}

#[async_trait]
impl DeviceConnector for AdbConnector {
    async fn connect(&self, serial: &str) -> Result<Arc<dyn Driver>> {
        let driver = AdbDriver::new(self.adb_path.clone(), serial);
        driver.connect().await?;
        Ok(Arc::new(driver))
    }
}

/// Everything a worker shares with its siblings.
pub struct WorkerEnv {
    pub config: Arc<ConfigFile>,
    pub registry: Arc<TaskRegistry>,
    pub emulators: Arc<dyn EmulatorManager>,
    pub connector: Arc<dyn DeviceConnector>,
    pub matcher: Arc<dyn ImageMatcher>,
    pub status_tx: Option<mpsc::UnboundedSender<StatusEvent>>,
    /// Emulator boots go one at a time, `stagger` apart.
    launch_gate: Mutex<()>,
    stagger: Duration,
}

impl WorkerEnv {
    pub fn new(
        config: Arc<ConfigFile>,
        registry: Arc<TaskRegistry>,
        emulators: Arc<dyn EmulatorManager>,
        connector: Arc<dyn DeviceConnector>,
        matcher: Arc<dyn ImageMatcher>,
    ) -> Self {
        let stagger = Duration::from_secs(config.emulator.stagger_secs);
        Self {
            config,
            registry,
            emulators,
            connector,
            matcher,
            status_tx: None,
            launch_gate: Mutex::new(()),
            stagger,
        }
    }

    pub fn with_status_channel(mut self, tx: mpsc::UnboundedSender<StatusEvent>) -> Self {
        self.status_tx = Some(tx);
        self
    }

    fn sink_for(&self, emulator: u32) -> Arc<dyn StatusSink> {
        match &self.status_tx {
            Some(tx) => Arc::new(ChannelSink::new(emulator, tx.clone())),
            None => Arc::new(TracingSink),
        }
    }
}

/// Run a worker to completion and report `WorkerFinished`, whatever the
/// outcome.
pub async fn run_worker(
    request: WorkerRequest,
    env: Arc<WorkerEnv>,
    cancel: CancellationToken,
    runtime_tx: mpsc::Sender<SessionEvent>,
) {
    let emulator = request.emulator;
    let generation = request.generation;
    let name = env
        .config
        .account(emulator)
        .map(|a| a.display_name())
        .unwrap_or_else(|| format!("emulator-{emulator}"));
    let span = info_span!("worker", emulator, account = %name);

    async {
        match run_worker_inner(&request, &env, &cancel).await {
            Ok(()) => info!("worker done"),
            Err(BotError::Stopped) => info!("worker stopped"),
            Err(e) => error!(error = %e, "worker failed"),
        }
    }
    .instrument(span)
    .await;

    let _ = runtime_tx
        .send(SessionEvent::WorkerFinished {
            emulator,
            generation,
        })
        .await;
}

async fn run_worker_inner(
    request: &WorkerRequest,
    env: &WorkerEnv,
    cancel: &CancellationToken,
) -> Result<()> {
    let emulator = request.emulator;
    let cfg = &env.config;

    if cfg.emulator.launch {
        let _gate = tokio::select! {
            gate = env.launch_gate.lock() => gate,
            _ = cancel.cancelled() => return Err(BotError::Stopped),
        };
        // Dropping the launch future on stop releases the gate for the
        // next worker.
        let booted = tokio::select! {
            booted = env.emulators.launch(emulator, cancel) => booted?,
            _ = cancel.cancelled() => return Err(BotError::Stopped),
        };
        if !booted {
            return Err(BotError::DeviceError(format!(
                "emulator {emulator} did not boot"
            )));
        }
        sleep_or_stop(cancel, env.stagger).await?;
    }
    wait_for_adb(env, emulator, cancel).await?;

    let serial = env.emulators.device_address(emulator);
    info!(%serial, "connecting device");
    let driver = env.connector.connect(&serial).await?;

    let ctx = BotContext::new(
        driver,
        Arc::clone(&env.matcher),
        cancel.clone(),
        Timings::from_config(&cfg.timing),
        AppProfile::from_config(&cfg.device),
    );
    let app: Arc<dyn AppControl> = Arc::new(DeviceApp::new(
        ctx.clone(),
        env.registry.extra_active_labels(),
    ));
    let sink = env.sink_for(emulator);

    start_app(&ctx).await?;
    handle_popups(&ctx).await?;

    match &request.mode {
        WorkerMode::Run { target } => {
            let scheduler = Scheduler::new(
                Arc::clone(&app),
                ctx.clone(),
                Arc::clone(&env.registry),
                Arc::clone(&sink),
            );
            let report = scheduler.run(target.as_deref()).await?;
            info!(
                failed = report.failed().count(),
                total = report.statuses.len(),
                "run complete"
            );
            if target.is_none() && !cancel.is_cancelled() {
                refresh_all(app.as_ref(), &ctx, &env.registry, sink.as_ref()).await?;
            }
        }
        WorkerMode::Refresh => {
            refresh_all(app.as_ref(), &ctx, &env.registry, sink.as_ref()).await?;
        }
    }
    Ok(())
}

/// Poll the emulator's adb state until it reports `device`.
async fn wait_for_adb(env: &WorkerEnv, emulator: u32, cancel: &CancellationToken) -> Result<()> {
    let timeout = Duration::from_secs(env.config.emulator.boot_timeout_secs);
    let ready = poll_until(cancel, ADB_STATE_POLL, timeout, || async {
        Ok(env.emulators.device_state(emulator).await?.as_deref() == Some("device"))
    })
    .await?;

    if ready {
        Ok(())
    } else {
        warn!(?timeout, "adb never reported the device as ready");
        Err(BotError::Disconnected(format!(
            "emulator {emulator} not reachable over adb"
        )))
    }
}
