#![allow(dead_code)]

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use dailybot::bot::{AppProfile, BotContext, Timings};
use dailybot::config::{
    AccountConfig, ConfigFile, DeviceSection, EmulatorSection, RawConfigFile, TasksSection,
    TimingSection,
};
use dailybot::device::Driver;
use dailybot::tasks::{Task, TaskDefinition, TaskRegistry};
use dailybot::vision::ImageMatcher;

use crate::fake_device::{FakeDevice, FakeMatcher};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                device: DeviceSection::default(),
                emulator: EmulatorSection::default(),
                timing: TimingSection::default(),
                tasks: TasksSection::default(),
                accounts: Vec::new(),
            },
        }
    }

    pub fn with_account(mut self, emulator_index: u32, name: &str) -> Self {
        self.config.accounts.push(AccountConfig {
            emulator_index,
            name: Some(name.to_string()),
        });
        self
    }

    pub fn with_friend_ids(mut self, ids: &[&str]) -> Self {
        self.config.tasks.friend_ids = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Skip booting emulators; workers go straight to adb.
    pub fn without_launch(mut self) -> Self {
        self.config.emulator.launch = false;
        self
    }

    pub fn with_boot_timeout(mut self, secs: u64) -> Self {
        self.config.emulator.boot_timeout_secs = secs;
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for a `BotContext` over fakes, with zero pauses.
pub struct ContextBuilder {
    driver: Arc<dyn Driver>,
    matcher: Arc<dyn ImageMatcher>,
    cancel: CancellationToken,
    timings: Timings,
    profile: AppProfile,
}

impl ContextBuilder {
    pub fn new(device: Arc<FakeDevice>) -> Self {
        Self {
            driver: device,
            matcher: Arc::new(FakeMatcher::new()),
            cancel: CancellationToken::new(),
            timings: Timings::instant(),
            profile: AppProfile::default(),
        }
    }

    pub fn matcher(mut self, matcher: Arc<FakeMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn max_swipes(mut self, max: u32) -> Self {
        self.timings.max_swipes = max;
        self
    }

    pub fn refresh_max_scrolls(mut self, max: u32) -> Self {
        self.timings.refresh_max_scrolls = max;
        self
    }

    pub fn build(self) -> BotContext {
        BotContext::new(
            self.driver,
            self.matcher,
            self.cancel,
            self.timings,
            self.profile,
        )
    }
}

/// Builder for a `TaskRegistry` of arbitrary tasks.
#[derive(Default)]
pub struct RegistryBuilder {
    tasks: Vec<TaskDefinition>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A task that is not on the shared surface.
    pub fn plain(mut self, name: &str, task: Arc<dyn Task>) -> Self {
        self.tasks.push(TaskDefinition::new(name, task));
        self
    }

    /// A task whose row lives on the shared surface.
    pub fn surface(mut self, name: &str, label: &str, task: Arc<dyn Task>) -> Self {
        self.tasks
            .push(TaskDefinition::new(name, task).with_label(label));
        self
    }

    pub fn refreshing(mut self, name: &str, task: Arc<dyn Task>) -> Self {
        self.tasks
            .push(TaskDefinition::new(name, task).with_refresh_before());
        self
    }

    pub fn build(self) -> TaskRegistry {
        TaskRegistry::new(self.tasks)
    }
}
