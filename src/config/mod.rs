// src/config/mod.rs

//! Configuration loading and validation for dailybot.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate accounts, timings and friend ids (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{
    AccountConfig, ConfigFile, DeviceSection, EmulatorSection, RawConfigFile, TasksSection,
    TimingSection,
};
