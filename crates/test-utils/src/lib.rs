//! Test doubles shared by the `dailybot` integration tests.
//!
//! - [`fake_device`]: a paged in-memory `Driver` and a template matcher
//!   that "sees" whatever the test tells it to.
//! - [`fake_app`]: counting `AppControl`, scripted tasks, a recording
//!   status sink.
//! - [`builders`]: config, context and registry builders.

pub mod builders;
pub mod fake_app;
pub mod fake_device;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

pub use fake_app::{FakeApp, FakeTask, RecordingSink};
pub use fake_device::{FakeDevice, FakeMatcher};

static TRACING: Once = Once::new();

/// Route `tracing` output into the test harness capture.
///
/// Verbosity follows `RUST_LOG` (default `info`); output only shows for
/// failing tests unless `--nocapture` is given.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Fail the test if `f` takes longer than five seconds.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(5), f)
        .await
        .expect("test timed out after 5s")
}
