// src/engine/mod.rs

//! Session coordinator.
//!
//! One worker per emulator instance, each running one scheduler run (or a
//! progress refresh). The coordinator decides when workers start, stop and
//! restart; it never touches a device itself.
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`]. Workers are spawned through the
//! [`WorkerBackend`](crate::exec::WorkerBackend) seam.

/// Emulator instance index, as used by the emulator console.
pub type EmulatorId = u32;

/// What a worker should do once its device is ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerMode {
    /// Run all tasks, or only the named one.
    Run { target: Option<String> },
    /// Only read task progress from the surface.
    Refresh,
}

/// A worker the shell should spawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerRequest {
    pub emulator: EmulatorId,
    /// Distinguishes a worker from earlier ones on the same emulator.
    pub generation: u64,
    pub mode: WorkerMode,
}

/// Options used by both the core and the async shell.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// Exit once no worker is running (one-shot CLI mode).
    pub exit_when_idle: bool,
}

/// Events flowing into the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Start {
        emulator: EmulatorId,
        target: Option<String>,
    },
    Refresh {
        emulator: EmulatorId,
    },
    Stop {
        emulator: EmulatorId,
    },
    /// A worker returned, for whatever reason.
    WorkerFinished {
        emulator: EmulatorId,
        generation: u64,
    },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod core;
pub mod event_handlers;
pub mod runtime;

pub use core::CoreSessions;
pub use event_handlers::{CoreCommand, CoreStep};
pub use runtime::Runtime;
