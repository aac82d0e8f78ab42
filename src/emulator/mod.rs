// src/emulator/mod.rs

//! Emulator process management.
//!
//! The session workers need little from an emulator host: start an instance
//! and wait until Android is up, ask whether it is running or attached to
//! adb, and learn the adb address to connect to. [`LdConsole`] provides those on top
//! of LDPlayer's `dnconsole` tool.

pub mod ldconsole;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::errors::Result;

pub use ldconsole::{parse_adb_state, parse_list2, InstanceInfo, LdConsole};

#[async_trait]
pub trait EmulatorManager: Send + Sync {
    /// Start the instance (if needed) and wait until Android reports running.
    /// `Ok(false)` means the boot did not finish in time; a fired `cancel`
    /// ends the wait with `Stopped`.
    async fn launch(&self, index: u32, cancel: &CancellationToken) -> Result<bool>;

    async fn is_running(&self, index: u32) -> Result<bool>;

    async fn quit(&self, index: u32) -> Result<()>;

    /// adb state of the instance as the host sees it (`device`, `offline`),
    /// `None` when it is not attached at all.
    async fn device_state(&self, index: u32) -> Result<Option<String>>;

    /// adb serial for the instance, e.g. `127.0.0.1:5555`.
    fn device_address(&self, index: u32) -> String;
}
