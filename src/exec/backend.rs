// src/exec/backend.rs

//! Pluggable worker backend.
//!
//! The session runtime talks to a `WorkerBackend` instead of spawning
//! workers itself, so tests can swap in a fake that records requests and
//! reports `WorkerFinished` directly.
//!
//! `RealWorkerBackend` forwards commands to the background worker loop in
//! [`worker_loop`](super::worker_loop).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::engine::{EmulatorId, SessionEvent, WorkerRequest};
use crate::errors::{Error, Result};

use super::worker::WorkerEnv;
use super::worker_loop::{spawn_worker_loop, WorkerCommand};

pub type BackendFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

pub trait WorkerBackend: Send {
    /// Start a worker for the request.
    fn spawn_worker(&mut self, request: WorkerRequest) -> BackendFuture<'_>;

    /// Fire the stop signal of a worker. Unknown or finished workers are
    /// ignored.
    fn cancel_worker(&mut self, emulator: EmulatorId, generation: u64) -> BackendFuture<'_>;
}

/// Backend used in production.
pub struct RealWorkerBackend {
    tx: mpsc::Sender<WorkerCommand>,
}

impl RealWorkerBackend {
    /// Spawns the background worker loop immediately.
    pub fn new(env: Arc<WorkerEnv>, runtime_tx: mpsc::Sender<SessionEvent>) -> Self {
        let tx = spawn_worker_loop(env, runtime_tx);
        Self { tx }
    }

    fn send(&self, command: WorkerCommand) -> BackendFuture<'_> {
        let tx = self.tx.clone();
        Box::pin(async move {
            tx.send(command)
                .await
                .map_err(|e| Error::msg(format!("worker loop closed: {e}")))?;
            Ok(())
        })
    }
}

impl WorkerBackend for RealWorkerBackend {
    fn spawn_worker(&mut self, request: WorkerRequest) -> BackendFuture<'_> {
        self.send(WorkerCommand::Spawn(request))
    }

    fn cancel_worker(&mut self, emulator: EmulatorId, generation: u64) -> BackendFuture<'_> {
        self.send(WorkerCommand::Cancel {
            emulator,
            generation,
        })
    }
}
