// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::types::ResetDepth;

/// Configuration exactly as read from the TOML file.
///
/// ```toml
/// [device]
/// package = "com.tencent.mobileqq"
/// reset_depth = "full"
///
/// [emulator]
/// console_path = 'C:\leidian\LDPlayer9\dnconsole.exe'
///
/// [tasks]
/// friend_ids = "123456，234567"
///
/// [[account]]
/// emulator_index = 0
/// ```
///
/// Every section is optional except at least one `[[account]]`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub device: DeviceSection,

    #[serde(default)]
    pub emulator: EmulatorSection,

    #[serde(default)]
    pub timing: TimingSection,

    #[serde(default)]
    pub tasks: TasksSection,

    #[serde(default, rename = "account")]
    pub accounts: Vec<AccountConfig>,
}

/// Validated configuration. Only obtainable through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub device: DeviceSection,
    pub emulator: EmulatorSection,
    pub timing: TimingSection,
    pub tasks: TasksSection,
    pub accounts: Vec<AccountConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            device: raw.device,
            emulator: raw.emulator,
            timing: raw.timing,
            tasks: raw.tasks,
            accounts: raw.accounts,
        }
    }

    pub fn account(&self, emulator_index: u32) -> Option<&AccountConfig> {
        self.accounts
            .iter()
            .find(|a| a.emulator_index == emulator_index)
    }

    /// Friend ids the add-friend task should process, capped at `max_friends`.
    pub fn friend_ids(&self) -> Vec<String> {
        self.tasks
            .friend_ids
            .iter()
            .take(self.tasks.max_friends)
            .cloned()
            .collect()
    }
}

/// `[device]` section: the app under automation and how to reach it.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceSection {
    #[serde(default = "default_package")]
    pub package: String,

    /// Apps the host app hands off to; a full reset stops these too.
    #[serde(default = "default_companion_packages")]
    pub companion_packages: Vec<String>,

    #[serde(default)]
    pub reset_depth: ResetDepth,

    #[serde(default = "default_adb_path")]
    pub adb_path: String,

    /// Directory holding the PNG templates used by image matching.
    #[serde(default = "default_assets_dir")]
    pub assets_dir: PathBuf,
}

fn default_package() -> String {
    "com.tencent.mobileqq".to_string()
}

fn default_companion_packages() -> Vec<String> {
    vec![
        "cn.wenyu.bodian".to_string(),
        "com.tencent.qqmusic".to_string(),
    ]
}

fn default_adb_path() -> String {
    "adb".to_string()
}

fn default_assets_dir() -> PathBuf {
    PathBuf::from("assets")
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            package: default_package(),
            companion_packages: default_companion_packages(),
            reset_depth: ResetDepth::default(),
            adb_path: default_adb_path(),
            assets_dir: default_assets_dir(),
        }
    }
}

/// `[emulator]` section: LDPlayer console settings.
#[derive(Debug, Clone, Deserialize)]
pub struct EmulatorSection {
    #[serde(default = "default_console_path")]
    pub console_path: PathBuf,

    /// How long to wait for a launched instance to report `android_running`.
    #[serde(default = "default_boot_timeout_secs")]
    pub boot_timeout_secs: u64,

    /// `[width, height, dpi]` applied before launch. The image templates are
    /// captured at this resolution.
    #[serde(default = "default_resolution")]
    pub resolution: [u32; 3],

    /// Delay between starting consecutive workers.
    #[serde(default = "default_stagger_secs")]
    pub stagger_secs: u64,

    /// If false the emulator is assumed to be running already and only the
    /// adb connection is established.
    #[serde(default = "default_true")]
    pub launch: bool,
}

fn default_console_path() -> PathBuf {
    PathBuf::from(r"C:\leidian\LDPlayer9\dnconsole.exe")
}

fn default_boot_timeout_secs() -> u64 {
    60
}

fn default_resolution() -> [u32; 3] {
    [504, 955, 240]
}

fn default_stagger_secs() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

impl Default for EmulatorSection {
    fn default() -> Self {
        Self {
            console_path: default_console_path(),
            boot_timeout_secs: default_boot_timeout_secs(),
            resolution: default_resolution(),
            stagger_secs: default_stagger_secs(),
            launch: true,
        }
    }
}

/// `[timing]` section: settle delays and loop budgets.
#[derive(Debug, Clone, Deserialize)]
pub struct TimingSection {
    /// Pause before and after every element click.
    #[serde(default = "default_click_settle_ms")]
    pub click_settle_ms: u64,

    /// Pause after each scroll swipe.
    #[serde(default = "default_swipe_settle_ms")]
    pub swipe_settle_ms: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Forward swipe budget of scroll searches.
    #[serde(default = "default_max_swipes")]
    pub max_swipes: u32,

    #[serde(default = "default_refresh_max_scrolls")]
    pub refresh_max_scrolls: u32,
}

fn default_click_settle_ms() -> u64 {
    1000
}

fn default_swipe_settle_ms() -> u64 {
    800
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_max_swipes() -> u32 {
    10
}

fn default_refresh_max_scrolls() -> u32 {
    15
}

impl Default for TimingSection {
    fn default() -> Self {
        Self {
            click_settle_ms: default_click_settle_ms(),
            swipe_settle_ms: default_swipe_settle_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            max_swipes: default_max_swipes(),
            refresh_max_scrolls: default_refresh_max_scrolls(),
        }
    }
}

impl TimingSection {
    pub fn click_settle(&self) -> Duration {
        Duration::from_millis(self.click_settle_ms)
    }

    pub fn swipe_settle(&self) -> Duration {
        Duration::from_millis(self.swipe_settle_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// `[tasks]` section: inputs for individual tasks.
#[derive(Debug, Clone, Deserialize)]
pub struct TasksSection {
    /// Accepts a TOML array or a single comma separated string (ASCII or
    /// full-width commas).
    #[serde(default, deserialize_with = "deserialize_friend_ids")]
    pub friend_ids: Vec<String>,

    #[serde(default = "default_max_friends")]
    pub max_friends: usize,
}

fn default_max_friends() -> usize {
    3
}

impl Default for TasksSection {
    fn default() -> Self {
        Self {
            friend_ids: Vec::new(),
            max_friends: default_max_friends(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FriendIdsRepr {
    List(Vec<String>),
    Joined(String),
}

fn deserialize_friend_ids<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = match FriendIdsRepr::deserialize(deserializer)? {
        FriendIdsRepr::List(items) => items,
        FriendIdsRepr::Joined(joined) => joined
            .replace('，', ",")
            .split(',')
            .map(str::to_string)
            .collect(),
    };

    Ok(items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

/// One `[[account]]` entry: an emulator instance with a logged-in account.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    pub emulator_index: u32,

    #[serde(default)]
    pub name: Option<String>,
}

impl AccountConfig {
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("emulator-{}", self.emulator_index))
    }
}
