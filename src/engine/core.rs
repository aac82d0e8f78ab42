// src/engine/core.rs

//! Pure core session state machine.
//!
//! This module contains a synchronous, deterministic core that consumes
//! [`SessionEvent`]s and produces commands describing what the IO shell
//! should do next (spawn a worker, cancel one, exit).
//!
//! It has no channels, no Tokio types, and performs no IO, so the whole
//! start/stop/restart policy is unit tested without devices.

use std::collections::BTreeMap;

use crate::engine::event_handlers::{
    handle_refresh, handle_shutdown, handle_start, handle_stop, handle_worker_finished, CoreStep,
};
use crate::engine::{EmulatorId, RuntimeOptions, SessionEvent, WorkerMode, WorkerRequest};

/// Bookkeeping for the worker on one emulator.
#[derive(Debug, Clone)]
pub struct WorkerSlot {
    pub generation: u64,
    /// Request to start once this worker is gone.
    pub queued: Option<WorkerMode>,
    /// Cancel already sent.
    pub cancelling: bool,
}

/// At most one live worker per emulator.
#[derive(Debug, Default)]
pub struct WorkerTable {
    slots: BTreeMap<EmulatorId, WorkerSlot>,
    next_generation: u64,
    shutting_down: bool,
}

impl WorkerTable {
    pub fn slot_mut(&mut self, emulator: EmulatorId) -> Option<&mut WorkerSlot> {
        self.slots.get_mut(&emulator)
    }

    /// Register a new worker and return the request to spawn it.
    pub fn admit(&mut self, emulator: EmulatorId, mode: WorkerMode) -> WorkerRequest {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.slots.insert(
            emulator,
            WorkerSlot {
                generation,
                queued: None,
                cancelling: false,
            },
        );
        WorkerRequest {
            emulator,
            generation,
            mode,
        }
    }

    /// Remove a finished worker.
    ///
    /// `None` if `generation` is not the current worker; otherwise its
    /// queued request, if any.
    pub fn finish(&mut self, emulator: EmulatorId, generation: u64) -> Option<Option<WorkerMode>> {
        match self.slots.get(&emulator) {
            Some(slot) if slot.generation == generation => {
                self.slots.remove(&emulator).map(|slot| slot.queued)
            }
            _ => None,
        }
    }

    /// Mark every live worker as cancelling; returns those newly cancelled.
    pub fn cancel_all(&mut self) -> Vec<(EmulatorId, u64)> {
        self.slots
            .iter_mut()
            .filter(|(_, slot)| !slot.cancelling)
            .map(|(emulator, slot)| {
                slot.cancelling = true;
                slot.queued = None;
                (*emulator, slot.generation)
            })
            .collect()
    }

    pub fn begin_shutdown(&mut self) {
        self.shutting_down = true;
    }

    pub fn shutting_down(&self) -> bool {
        self.shutting_down
    }

    pub fn is_idle(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn running(&self) -> impl Iterator<Item = EmulatorId> + '_ {
        self.slots.keys().copied()
    }
}

/// Pure core state: the worker table plus runtime options.
#[derive(Debug)]
pub struct CoreSessions {
    table: WorkerTable,
    options: RuntimeOptions,
}

impl CoreSessions {
    pub fn new(options: RuntimeOptions) -> Self {
        Self {
            table: WorkerTable::default(),
            options,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.table.is_idle()
    }

    /// Emulators with a live worker.
    pub fn running(&self) -> Vec<EmulatorId> {
        self.table.running().collect()
    }

    /// Handle a single event, updating state and returning the commands for
    /// the IO shell.
    pub fn step(&mut self, event: SessionEvent) -> CoreStep {
        match event {
            SessionEvent::Start { emulator, target } => {
                handle_start(&mut self.table, emulator, WorkerMode::Run { target })
            }
            SessionEvent::Refresh { emulator } => handle_refresh(&mut self.table, emulator),
            SessionEvent::Stop { emulator } => handle_stop(&mut self.table, emulator),
            SessionEvent::WorkerFinished {
                emulator,
                generation,
            } => handle_worker_finished(&mut self.table, &self.options, emulator, generation),
            SessionEvent::ShutdownRequested => handle_shutdown(&mut self.table),
        }
    }
}
