// src/exec/mod.rs

//! Worker execution layer.
//!
//! - [`worker_loop`] owns the running workers, one per emulator, each with
//!   its own cancellation token.
//! - [`worker`] is the body of one worker: boot the emulator, connect the
//!   device, run the scheduler or a progress refresh.
//! - [`backend`] provides the `WorkerBackend` trait the session runtime
//!   uses, and the production `RealWorkerBackend`. Tests replace it with a
//!   fake.

pub mod backend;
pub mod worker;
pub mod worker_loop;

pub use backend::{RealWorkerBackend, WorkerBackend};
pub use worker::{AdbConnector, DeviceConnector, WorkerEnv};
