// src/engine/event_handlers.rs

//! Event handling logic for the session core.

use tracing::{debug, info, warn};

use crate::engine::core::WorkerTable;
use crate::engine::{EmulatorId, RuntimeOptions, WorkerMode, WorkerRequest};

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Start a worker.
    Spawn(WorkerRequest),
    /// Fire the stop signal of a running worker.
    Cancel { emulator: EmulatorId, generation: u64 },
    /// Request that the process exits.
    RequestExit,
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    fn continue_with(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }
}

/// Start a worker on an idle emulator.
///
/// If a worker is already running there it is cancelled and the request is
/// queued until it reports finished. Only one request is queued; further
/// starts while a restart is pending are dropped.
pub fn handle_start(table: &mut WorkerTable, emulator: EmulatorId, mode: WorkerMode) -> CoreStep {
    if table.shutting_down() {
        debug!(emulator, "shutdown in progress; ignoring start");
        return CoreStep::continue_with(Vec::new());
    }

    let Some(slot) = table.slot_mut(emulator) else {
        let request = table.admit(emulator, mode);
        info!(emulator, generation = request.generation, "starting worker");
        return CoreStep::continue_with(vec![CoreCommand::Spawn(request)]);
    };

    if slot.queued.is_some() {
        warn!(emulator, "restart already pending; ignoring start");
        return CoreStep::continue_with(Vec::new());
    }

    info!(emulator, generation = slot.generation, "worker busy; restarting on demand");
    slot.queued = Some(mode);
    let mut commands = Vec::new();
    if !slot.cancelling {
        slot.cancelling = true;
        commands.push(CoreCommand::Cancel {
            emulator,
            generation: slot.generation,
        });
    }
    CoreStep::continue_with(commands)
}

/// Refresh only runs on an idle emulator.
pub fn handle_refresh(table: &mut WorkerTable, emulator: EmulatorId) -> CoreStep {
    if table.slot_mut(emulator).is_some() {
        warn!(emulator, "worker running; refresh ignored");
        return CoreStep::continue_with(Vec::new());
    }
    handle_start(table, emulator, WorkerMode::Refresh)
}

pub fn handle_stop(table: &mut WorkerTable, emulator: EmulatorId) -> CoreStep {
    let Some(slot) = table.slot_mut(emulator) else {
        debug!(emulator, "stop for idle emulator ignored");
        return CoreStep::continue_with(Vec::new());
    };

    slot.queued = None;
    if slot.cancelling {
        return CoreStep::continue_with(Vec::new());
    }
    slot.cancelling = true;
    info!(emulator, generation = slot.generation, "stopping worker");
    CoreStep::continue_with(vec![CoreCommand::Cancel {
        emulator,
        generation: slot.generation,
    }])
}

/// A worker returned. Start the queued request, if any, and decide whether
/// the coordinator is done.
pub fn handle_worker_finished(
    table: &mut WorkerTable,
    options: &RuntimeOptions,
    emulator: EmulatorId,
    generation: u64,
) -> CoreStep {
    let mut commands = Vec::new();

    match table.finish(emulator, generation) {
        None => debug!(emulator, generation, "stale worker finish ignored"),
        Some(None) => info!(emulator, generation, "worker finished"),
        Some(Some(queued)) => {
            if table.shutting_down() {
                debug!(emulator, "dropping queued restart during shutdown");
            } else {
                let request = table.admit(emulator, queued);
                info!(emulator, generation = request.generation, "starting queued worker");
                commands.push(CoreCommand::Spawn(request));
            }
        }
    }

    let mut keep_running = true;
    if table.is_idle() && (options.exit_when_idle || table.shutting_down()) {
        keep_running = false;
        commands.push(CoreCommand::RequestExit);
    }

    CoreStep {
        commands,
        keep_running,
    }
}

/// Cancel every worker; exit right away when none is running.
pub fn handle_shutdown(table: &mut WorkerTable) -> CoreStep {
    table.begin_shutdown();
    let commands: Vec<CoreCommand> = table
        .cancel_all()
        .into_iter()
        .map(|(emulator, generation)| CoreCommand::Cancel {
            emulator,
            generation,
        })
        .collect();

    if table.is_idle() {
        return CoreStep {
            commands: vec![CoreCommand::RequestExit],
            keep_running: false,
        };
    }
    info!(workers = commands.len(), "shutdown: waiting for workers to stop");
    CoreStep::continue_with(commands)
}
