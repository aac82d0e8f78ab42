// src/device/adb.rs

//! Production [`Driver`] backed by the `adb` command line tool.
//!
//! Every operation is one `adb -s <serial> ...` invocation through
//! `tokio::process::Command`. Hierarchy lookups dump the window with
//! `uiautomator dump`, screenshots are PNGs from `screencap -p`.

use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use image::RgbImage;
use regex::Regex;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use crate::device::hierarchy::parse_hierarchy;
use crate::device::{Driver, Element, Key};
use crate::errors::{BotError, Result};

const DUMP_PATH: &str = "/sdcard/dailybot_window_dump.xml";
const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

static FOCUS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"mCurrentFocus=Window\{\S+ \S+ ([A-Za-z0-9_.]+)/").expect("static regex")
});

static SIZE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(Physical|Override) size:\s*(\d+)x(\d+)").expect("static regex")
});

/// adb's own "unknown serial" messages, not a shell command's stderr.
static MISSING_DEVICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"device (?:'[^']*' )?not found").expect("static regex")
});

#[derive(Debug)]
pub struct AdbDriver {
    adb: String,
    serial: String,
    window: Mutex<Option<(u32, u32)>>,
}

impl AdbDriver {
    pub fn new(adb: impl Into<String>, serial: impl Into<String>) -> Self {
        Self {
            adb: adb.into(),
            serial: serial.into(),
            window: Mutex::new(None),
        }
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// `adb connect <serial>` for TCP serials; harmless when already connected.
    pub async fn connect(&self) -> Result<()> {
        if !self.serial.contains(':') {
            return Ok(());
        }
        let output = Command::new(&self.adb)
            .args(["connect", &self.serial])
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("spawning '{} connect {}'", self.adb, self.serial))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.contains("connected to") {
            debug!(serial = %self.serial, "adb connected");
            Ok(())
        } else {
            Err(BotError::Disconnected(format!(
                "adb connect {} failed: {}",
                self.serial,
                stdout.trim()
            )))
        }
    }

    async fn run(&self, args: &[&str]) -> Result<Vec<u8>> {
        trace!(serial = %self.serial, ?args, "adb");

        let mut cmd = Command::new(&self.adb);
        cmd.arg("-s")
            .arg(&self.serial)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(COMMAND_TIMEOUT, cmd.output())
            .await
            .map_err(|_| {
                BotError::DeviceError(format!("adb {args:?} timed out after {COMMAND_TIMEOUT:?}"))
            })?
            .with_context(|| format!("spawning adb for serial '{}'", self.serial))?;

        if output.status.success() {
            return Ok(output.stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if is_connection_error(&stderr) {
            Err(BotError::Disconnected(stderr))
        } else {
            Err(BotError::DeviceError(format!("adb {args:?}: {stderr}")))
        }
    }

    async fn shell_text(&self, args: &[&str]) -> Result<String> {
        let mut full = vec!["shell"];
        full.extend_from_slice(args);
        let out = self.run(&full).await?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

fn is_connection_error(stderr: &str) -> bool {
    stderr.contains("device offline")
        || MISSING_DEVICE_RE.is_match(stderr)
        || stderr.contains("no devices/emulators")
        || stderr.contains("device unauthorized")
}

/// Escape text for `input text`, which splits on spaces and goes through
/// the device shell.
pub fn escape_input_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 2);
    for c in text.chars() {
        match c {
            ' ' => out.push_str("%s"),
            '\'' | '"' | '\\' | '&' | '|' | ';' | '<' | '>' | '(' | ')' | '$' | '`' | '*'
            | '?' | '~' | '#' | '!' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Extract the focused package from `dumpsys window` output.
pub fn parse_focused_package(dumpsys: &str) -> Option<String> {
    FOCUS_RE
        .captures_iter(dumpsys)
        .last()
        .map(|c| c[1].to_string())
}

/// Parse `wm size` output, preferring an override size.
pub fn parse_window_size(output: &str) -> Option<(u32, u32)> {
    let mut physical = None;
    let mut overridden = None;
    for cap in SIZE_RE.captures_iter(output) {
        let w = cap[2].parse().ok()?;
        let h = cap[3].parse().ok()?;
        if &cap[1] == "Override" {
            overridden = Some((w, h));
        } else {
            physical = Some((w, h));
        }
    }
    overridden.or(physical)
}

#[async_trait]
impl Driver for AdbDriver {
    async fn dump(&self) -> Result<Vec<Element>> {
        self.shell_text(&["uiautomator", "dump", DUMP_PATH]).await?;
        let xml = self.run(&["exec-out", "cat", DUMP_PATH]).await?;
        parse_hierarchy(&xml)
    }

    async fn tap(&self, x: i32, y: i32) -> Result<()> {
        self.shell_text(&["input", "tap", &x.to_string(), &y.to_string()])
            .await?;
        Ok(())
    }

    async fn swipe_between(
        &self,
        from: (i32, i32),
        to: (i32, i32),
        duration: Duration,
    ) -> Result<()> {
        self.shell_text(&[
            "input",
            "swipe",
            &from.0.to_string(),
            &from.1.to_string(),
            &to.0.to_string(),
            &to.1.to_string(),
            &duration.as_millis().to_string(),
        ])
        .await?;
        Ok(())
    }

    async fn press(&self, key: Key) -> Result<()> {
        self.shell_text(&["input", "keyevent", &key.keycode().to_string()])
            .await?;
        Ok(())
    }

    async fn screenshot(&self) -> Result<RgbImage> {
        let png = self.run(&["exec-out", "screencap", "-p"]).await?;
        let img = image::load_from_memory(&png)?;
        Ok(img.to_rgb8())
    }

    async fn window_size(&self) -> Result<(u32, u32)> {
        let mut cached = self.window.lock().await;
        if let Some(size) = *cached {
            return Ok(size);
        }
        let out = self.shell_text(&["wm", "size"]).await?;
        let size = parse_window_size(&out)
            .ok_or_else(|| BotError::DeviceError(format!("unexpected `wm size` output: {out}")))?;
        *cached = Some(size);
        Ok(size)
    }

    async fn shell(&self, command: &str) -> Result<String> {
        self.shell_text(&[command]).await
    }

    async fn send_keys(&self, text: &str) -> Result<()> {
        if !text.is_ascii() {
            warn!(serial = %self.serial, "input text only supports ASCII; non-ASCII characters may be dropped");
        }
        self.shell_text(&["input", "text", &escape_input_text(text)])
            .await?;
        Ok(())
    }

    async fn app_start(&self, package: &str) -> Result<()> {
        self.shell_text(&[
            "monkey",
            "-p",
            package,
            "-c",
            "android.intent.category.LAUNCHER",
            "1",
        ])
        .await?;
        Ok(())
    }

    async fn app_stop(&self, package: &str) -> Result<()> {
        self.shell_text(&["am", "force-stop", package]).await?;
        Ok(())
    }

    async fn current_package(&self) -> Result<Option<String>> {
        let out = self.shell_text(&["dumpsys", "window"]).await?;
        Ok(parse_focused_package(&out))
    }

    async fn is_connected(&self) -> bool {
        match self.run(&["get-state"]).await {
            Ok(out) => String::from_utf8_lossy(&out).trim() == "device",
            Err(e) => {
                debug!(serial = %self.serial, error = %e, "adb get-state failed");
                false
            }
        }
    }
}
