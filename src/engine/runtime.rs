// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::errors::Result;
use crate::exec::WorkerBackend;

use super::core::CoreSessions;
use super::{CoreCommand, SessionEvent};

/// Drives the session core in response to [`SessionEvent`]s and delegates
/// worker lifecycle to a [`WorkerBackend`].
///
/// All coordination semantics live in [`CoreSessions`]; this shell only
/// reads events and executes commands.
pub struct Runtime<W: WorkerBackend> {
    core: CoreSessions,
    event_rx: mpsc::Receiver<SessionEvent>,
    backend: W,
}

impl<W: WorkerBackend> fmt::Debug for Runtime<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<W: WorkerBackend> Runtime<W> {
    pub fn new(core: CoreSessions, event_rx: mpsc::Receiver<SessionEvent>, backend: W) -> Self {
        Self {
            core,
            event_rx,
            backend,
        }
    }

    /// Main event loop.
    pub async fn run(mut self) -> Result<()> {
        info!("session runtime started");

        loop {
            let Some(event) = self.event_rx.recv().await else {
                info!("session event channel closed; exiting");
                break;
            };

            debug!(?event, "runtime received event");
            let step = self.core.step(event);

            for command in step.commands {
                self.execute_command(command).await?;
            }

            if !step.keep_running {
                info!("core requested exit; stopping runtime");
                break;
            }
        }

        info!(still_running = self.core.running().len(), "session runtime exiting");
        Ok(())
    }

    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::Spawn(request) => {
                debug!(
                    emulator = request.emulator,
                    generation = request.generation,
                    mode = ?request.mode,
                    "spawning worker"
                );
                self.backend.spawn_worker(request).await
            }
            CoreCommand::Cancel {
                emulator,
                generation,
            } => {
                debug!(emulator, generation, "cancelling worker");
                self.backend.cancel_worker(emulator, generation).await
            }
            CoreCommand::RequestExit => {
                info!("all sessions done; exit requested");
                Ok(())
            }
        }
    }
}
