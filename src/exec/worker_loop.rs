// src/exec/worker_loop.rs

//! Background loop owning the running workers.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::{EmulatorId, SessionEvent, WorkerRequest};
use crate::exec::worker::{run_worker, WorkerEnv};

#[derive(Debug, Clone)]
pub enum WorkerCommand {
    Spawn(WorkerRequest),
    Cancel { emulator: EmulatorId, generation: u64 },
}

/// Handle for a running worker.
///
/// - `cancel` is the worker's stop signal; every wait inside the worker
///   races it.
/// - `handle` is the Tokio task running the worker.
struct ActiveWorker {
    generation: u64,
    cancel: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
}

/// Spawn the background worker loop.
///
/// There is never more than one worker per emulator: the coordinator only
/// spawns after the previous worker reported finished, and a stray spawn
/// for a busy emulator cancels the old worker first.
pub fn spawn_worker_loop(
    env: Arc<WorkerEnv>,
    runtime_tx: mpsc::Sender<SessionEvent>,
) -> mpsc::Sender<WorkerCommand> {
    let (tx, mut rx) = mpsc::channel::<WorkerCommand>(32);

    tokio::spawn(async move {
        info!("worker loop started");
        let mut active: HashMap<EmulatorId, ActiveWorker> = HashMap::new();

        while let Some(command) = rx.recv().await {
            match command {
                WorkerCommand::Spawn(request) => {
                    spawn(request, &mut active, &env, &runtime_tx);
                }
                WorkerCommand::Cancel {
                    emulator,
                    generation,
                } => cancel(emulator, generation, &active),
            }
        }

        for (emulator, worker) in active.drain() {
            debug!(emulator, "worker loop closing; cancelling worker");
            worker.cancel.cancel();
        }
        info!("worker loop finished (channel closed)");
    });

    tx
}

fn spawn(
    request: WorkerRequest,
    active: &mut HashMap<EmulatorId, ActiveWorker>,
    env: &Arc<WorkerEnv>,
    runtime_tx: &mpsc::Sender<SessionEvent>,
) {
    let emulator = request.emulator;

    if let Some(existing) = active.get(&emulator) {
        if !existing.handle.is_finished() {
            warn!(
                emulator,
                old = existing.generation,
                new = request.generation,
                "worker still running; cancelling it before spawning"
            );
            existing.cancel.cancel();
        }
    }

    let cancel = CancellationToken::new();
    let generation = request.generation;
    let handle = tokio::spawn(run_worker(
        request,
        Arc::clone(env),
        cancel.clone(),
        runtime_tx.clone(),
    ));

    active.insert(
        emulator,
        ActiveWorker {
            generation,
            cancel,
            handle,
        },
    );
}

fn cancel(emulator: EmulatorId, generation: u64, active: &HashMap<EmulatorId, ActiveWorker>) {
    match active.get(&emulator) {
        Some(worker) if worker.generation == generation => {
            info!(emulator, generation, "cancelling worker");
            worker.cancel.cancel();
        }
        _ => debug!(emulator, generation, "no matching worker to cancel"),
    }
}
