// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    /// The device connection went away (adb offline, emulator closed).
    #[error("Device disconnected: {0}")]
    Disconnected(String),

    /// The worker's stop signal fired.
    #[error("Stop requested")]
    Stopped,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Device command failed: {0}")]
    DeviceError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BotError {
    /// Errors that end the whole run instead of failing a single step.
    pub fn is_abort(&self) -> bool {
        matches!(self, BotError::Disconnected(_) | BotError::Stopped)
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_disconnect_and_stop_abort() {
        assert!(BotError::Disconnected("adb offline".into()).is_abort());
        assert!(BotError::Stopped.is_abort());
        assert!(!BotError::DeviceError("tap failed".into()).is_abort());
        assert!(!BotError::TaskNotFound("x".into()).is_abort());
    }
}
