// src/emulator/ldconsole.rs

//! LDPlayer `dnconsole` wrapper.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bot::poll::poll_until;
use crate::config::EmulatorSection;
use crate::emulator::EmulatorManager;
use crate::errors::{BotError, Result};

const COMMAND_RETRIES: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(1);
const BOOT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// One row of `dnconsole list2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceInfo {
    pub index: u32,
    pub title: String,
    pub android_running: bool,
    pub pid: i64,
}

/// Parse `list2` output: `index,title,top_hwnd,bind_hwnd,android,pid,vbox_pid`.
pub fn parse_list2(output: &str) -> Vec<InstanceInfo> {
    output
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.trim().split(',').collect();
            if parts.len() < 7 {
                return None;
            }
            Some(InstanceInfo {
                index: parts[0].trim().parse().ok()?,
                title: parts[1].to_string(),
                android_running: parts[4].trim() == "1",
                pid: parts[5].trim().parse().unwrap_or(-1),
            })
        })
        .collect()
}

/// Last non-empty line of `adb get-state`, if it names a state.
pub fn parse_adb_state(output: &str) -> Option<String> {
    let last = output.lines().map(str::trim).filter(|l| !l.is_empty()).last()?;
    if last.starts_with("error") {
        return None;
    }
    Some(last.to_string())
}

#[derive(Debug, Clone)]
pub struct LdConsole {
    console_path: PathBuf,
    resolution: [u32; 3],
    boot_timeout: Duration,
}

impl LdConsole {
    pub fn new(console_path: impl Into<PathBuf>, resolution: [u32; 3], boot_timeout: Duration) -> Self {
        Self {
            console_path: console_path.into(),
            resolution,
            boot_timeout,
        }
    }

    pub fn from_config(cfg: &EmulatorSection) -> Self {
        Self::new(
            cfg.console_path.clone(),
            cfg.resolution,
            Duration::from_secs(cfg.boot_timeout_secs),
        )
    }

    /// Run a console command, retrying transient failures.
    async fn run(&self, args: &[&str]) -> Result<String> {
        let mut last_error = String::new();

        for attempt in 1..=COMMAND_RETRIES {
            let result = Command::new(&self.console_path)
                .args(args)
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .output()
                .await
                .with_context(|| {
                    format!("spawning '{}'", self.console_path.display())
                });

            match result {
                Ok(output) if output.status.success() => {
                    return Ok(String::from_utf8_lossy(&output.stdout).trim().to_string());
                }
                Ok(output) => {
                    last_error = format!(
                        "exit code {:?}: {}",
                        output.status.code(),
                        String::from_utf8_lossy(&output.stderr).trim()
                    );
                }
                Err(e) => last_error = format!("{e:#}"),
            }

            debug!(?args, attempt, error = %last_error, "dnconsole command failed");
            if attempt < COMMAND_RETRIES {
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }

        Err(BotError::DeviceError(format!(
            "dnconsole {args:?} failed after {COMMAND_RETRIES} attempts: {last_error}"
        )))
    }

    pub async fn list(&self) -> Result<Vec<InstanceInfo>> {
        let out = self.run(&["list2"]).await?;
        Ok(parse_list2(&out))
    }

    /// Takes effect on the next boot.
    pub async fn set_resolution(&self, index: u32) -> Result<()> {
        let [w, h, dpi] = self.resolution;
        info!(emulator = index, width = w, height = h, dpi, "setting emulator resolution");
        self.run(&[
            "modify",
            "--index",
            &index.to_string(),
            "--resolution",
            &format!("{w},{h},{dpi}"),
        ])
        .await?;
        Ok(())
    }
}

#[async_trait]
impl EmulatorManager for LdConsole {
    async fn launch(&self, index: u32, cancel: &CancellationToken) -> Result<bool> {
        if self.is_running(index).await? {
            debug!(emulator = index, "emulator already running");
            return Ok(true);
        }

        if let Err(e) = self.set_resolution(index).await {
            warn!(emulator = index, error = %e, "could not set resolution; launching anyway");
        }

        info!(emulator = index, "launching emulator");
        self.run(&["launch", "--index", &index.to_string()]).await?;

        let up = poll_until(cancel, BOOT_POLL_INTERVAL, self.boot_timeout, || {
            self.is_running(index)
        })
        .await?;
        if up {
            info!(emulator = index, "emulator is up");
            return Ok(true);
        }

        warn!(emulator = index, timeout = ?self.boot_timeout, "emulator boot timed out");
        Ok(false)
    }

    async fn is_running(&self, index: u32) -> Result<bool> {
        Ok(self
            .list()
            .await?
            .iter()
            .any(|i| i.index == index && i.android_running))
    }

    async fn quit(&self, index: u32) -> Result<()> {
        info!(emulator = index, "quitting emulator");
        self.run(&["quit", "--index", &index.to_string()]).await?;
        Ok(())
    }

    async fn device_state(&self, index: u32) -> Result<Option<String>> {
        let out = self
            .run(&["adb", "--index", &index.to_string(), "--command", "get-state"])
            .await;
        match out {
            Ok(state) => Ok(parse_adb_state(&state)),
            Err(e) => {
                debug!(emulator = index, error = %e, "adb state unavailable");
                Ok(None)
            }
        }
    }

    fn device_address(&self, index: u32) -> String {
        format!("127.0.0.1:{}", 5555 + 2 * index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list2_rows_are_parsed() {
        let out = "0,雷电模拟器,1050862,2623900,1,10512,11216\r\n1,雷电模拟器-1,0,0,0,-1,-1\r\nbogus\r\n";
        let rows = parse_list2(out);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].index, 0);
        assert!(rows[0].android_running);
        assert_eq!(rows[0].pid, 10512);
        assert_eq!(rows[1].title, "雷电模拟器-1");
        assert!(!rows[1].android_running);
    }

    #[test]
    fn adb_state_takes_last_line() {
        assert_eq!(parse_adb_state("\r\ndevice\r\n").as_deref(), Some("device"));
        assert_eq!(parse_adb_state("error: device offline"), None);
        assert_eq!(parse_adb_state(""), None);
    }

    #[test]
    fn adb_ports_step_by_two() {
        let console = LdConsole::new("dnconsole.exe", [504, 955, 240], Duration::from_secs(1));
        assert_eq!(console.device_address(0), "127.0.0.1:5555");
        assert_eq!(console.device_address(3), "127.0.0.1:5561");
    }
}
