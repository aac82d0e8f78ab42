// tests/session_runtime.rs

mod common;
use crate::common::{init_tracing, with_timeout};

use std::error::Error;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use dailybot::engine::{
    CoreCommand, CoreSessions, EmulatorId, Runtime, RuntimeOptions, SessionEvent, WorkerMode,
    WorkerRequest,
};
use dailybot::exec::backend::BackendFuture;
use dailybot::exec::WorkerBackend;

type TestResult = Result<(), Box<dyn Error>>;

#[derive(Debug, Default)]
struct Record {
    spawned: Vec<WorkerRequest>,
    cancelled: Vec<(EmulatorId, u64)>,
}

/// A fake backend that:
/// - records spawn and cancel commands
/// - finishes a worker as soon as it is cancelled
/// - finishes targeted runs and refreshes right after spawning them, and
///   keeps full runs alive until cancelled.
struct FakeBackend {
    runtime_tx: mpsc::Sender<SessionEvent>,
    record: Arc<Mutex<Record>>,
}

impl FakeBackend {
    fn new(runtime_tx: mpsc::Sender<SessionEvent>, record: Arc<Mutex<Record>>) -> Self {
        Self { runtime_tx, record }
    }
}

impl WorkerBackend for FakeBackend {
    fn spawn_worker(&mut self, request: WorkerRequest) -> BackendFuture<'_> {
        let tx = self.runtime_tx.clone();
        let record = Arc::clone(&self.record);

        Box::pin(async move {
            let finishes_at_once = !matches!(request.mode, WorkerMode::Run { target: None });
            let finished = SessionEvent::WorkerFinished {
                emulator: request.emulator,
                generation: request.generation,
            };
            record.lock().unwrap().spawned.push(request);
            if finishes_at_once {
                tx.send(finished).await.map_err(anyhow::Error::from)?;
            }
            Ok(())
        })
    }

    fn cancel_worker(&mut self, emulator: EmulatorId, generation: u64) -> BackendFuture<'_> {
        let tx = self.runtime_tx.clone();
        let record = Arc::clone(&self.record);

        Box::pin(async move {
            record.lock().unwrap().cancelled.push((emulator, generation));
            tx.send(SessionEvent::WorkerFinished {
                emulator,
                generation,
            })
            .await
            .map_err(anyhow::Error::from)?;
            Ok(())
        })
    }
}

async fn run_with_events(events: Vec<SessionEvent>) -> Result<Record, Box<dyn Error>> {
    let (tx, rx) = mpsc::channel(32);
    let record = Arc::new(Mutex::new(Record::default()));
    let backend = FakeBackend::new(tx.clone(), Arc::clone(&record));

    for event in events {
        tx.send(event).await?;
    }

    let core = CoreSessions::new(RuntimeOptions {
        exit_when_idle: true,
    });
    let runtime = Runtime::new(core, rx, backend);
    with_timeout(runtime.run()).await?;

    let record = std::mem::take(&mut *record.lock().unwrap());
    Ok(record)
}

fn start(emulator: EmulatorId, target: Option<&str>) -> SessionEvent {
    SessionEvent::Start {
        emulator,
        target: target.map(str::to_string),
    }
}

#[tokio::test]
async fn second_start_restarts_worker_with_new_request() -> TestResult {
    init_tracing();

    let record = run_with_events(vec![start(0, None), start(0, Some("发布说说"))]).await?;

    assert_eq!(record.cancelled, vec![(0, 1)]);
    assert_eq!(record.spawned.len(), 2);
    assert_eq!(record.spawned[0].mode, WorkerMode::Run { target: None });
    assert_eq!(record.spawned[1].generation, 2);
    assert_eq!(
        record.spawned[1].mode,
        WorkerMode::Run {
            target: Some("发布说说".to_string())
        }
    );
    Ok(())
}

#[tokio::test]
async fn shutdown_cancels_every_worker_then_exits() -> TestResult {
    init_tracing();

    let record = run_with_events(vec![
        start(0, None),
        start(3, None),
        SessionEvent::ShutdownRequested,
    ])
    .await?;

    assert_eq!(record.spawned.len(), 2);
    let mut cancelled = record.cancelled.clone();
    cancelled.sort();
    assert_eq!(cancelled, vec![(0, 1), (3, 2)]);
    Ok(())
}

#[tokio::test]
async fn refresh_while_running_is_ignored() -> TestResult {
    init_tracing();

    let record = run_with_events(vec![
        start(1, None),
        SessionEvent::Refresh { emulator: 1 },
        SessionEvent::Stop { emulator: 1 },
    ])
    .await?;

    assert_eq!(record.spawned.len(), 1);
    assert_eq!(record.cancelled, vec![(1, 1)]);
    Ok(())
}

#[tokio::test]
async fn refresh_on_idle_emulator_runs_and_exits() -> TestResult {
    init_tracing();

    let record = run_with_events(vec![SessionEvent::Refresh { emulator: 2 }]).await?;

    assert_eq!(record.spawned.len(), 1);
    assert_eq!(record.spawned[0].mode, WorkerMode::Refresh);
    assert!(record.cancelled.is_empty());
    Ok(())
}

#[test]
fn third_start_while_restart_pending_is_dropped() {
    let mut core = CoreSessions::new(RuntimeOptions {
        exit_when_idle: false,
    });
    core.step(start(0, None));

    let second = core.step(start(0, Some("a")));
    assert_eq!(
        second.commands,
        vec![CoreCommand::Cancel {
            emulator: 0,
            generation: 1
        }]
    );

    let third = core.step(start(0, Some("b")));
    assert!(third.commands.is_empty());

    let finished = core.step(SessionEvent::WorkerFinished {
        emulator: 0,
        generation: 1,
    });
    assert!(finished.keep_running);
    assert_eq!(
        finished.commands,
        vec![CoreCommand::Spawn(WorkerRequest {
            emulator: 0,
            generation: 2,
            mode: WorkerMode::Run {
                target: Some("a".to_string())
            },
        })]
    );
}

#[test]
fn idle_core_keeps_running_without_exit_when_idle() {
    let mut core = CoreSessions::new(RuntimeOptions {
        exit_when_idle: false,
    });
    core.step(start(4, None));
    let step = core.step(SessionEvent::WorkerFinished {
        emulator: 4,
        generation: 1,
    });
    assert!(step.keep_running);
    assert!(core.is_idle());

    let shutdown = core.step(SessionEvent::ShutdownRequested);
    assert!(!shutdown.keep_running);
    assert_eq!(shutdown.commands, vec![CoreCommand::RequestExit]);
}
