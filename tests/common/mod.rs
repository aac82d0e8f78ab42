#![allow(dead_code, unused_imports)]

pub use dailybot_test_utils::builders;
pub use dailybot_test_utils::fake_device::{row, text_at};
pub use dailybot_test_utils::{init_tracing, with_timeout, FakeApp, FakeDevice, FakeMatcher, FakeTask, RecordingSink};
