// src/bot/context.rs

//! The driving context handed to tasks.
//!
//! [`BotContext`] bundles one worker's device handle, image matcher, stop
//! signal, timings and app profile, and layers the recurring interaction
//! patterns on top of the raw [`Driver`]: click-with-timeout, image clicks,
//! waiting for a button to turn active, and the shared publish flow.
//!
//! Error policy: driver failures inside helpers are logged and treated as a
//! miss (`Ok(false)` / `Ok(None)`). Only stop requests and a lost device
//! connection travel as `Err`, so they abort the run from any depth.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use image::RgbImage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bot::poll::{poll_until, sleep_or_stop};
use crate::config::{DeviceSection, TimingSection};
use crate::device::{Driver, Element, Key, PageSignature, Selector, SwipeDirection};
use crate::errors::{BotError, Result};
use crate::types::ResetDepth;
use crate::vision::color::{is_active_blue, mean_rgb};
use crate::vision::{ImageMatcher, TemplateMatch};

/// Settle delays and loop budgets.
#[derive(Debug, Clone)]
pub struct Timings {
    pub click_settle: Duration,
    pub swipe_settle: Duration,
    pub poll_interval: Duration,
    pub max_swipes: u32,
    pub refresh_max_scrolls: u32,
    /// Multiplier applied to every fixed pause and poll window.
    pub pause_scale: f32,
}

impl Timings {
    pub fn from_config(cfg: &TimingSection) -> Self {
        Self {
            click_settle: cfg.click_settle(),
            swipe_settle: cfg.swipe_settle(),
            poll_interval: cfg.poll_interval(),
            max_swipes: cfg.max_swipes,
            refresh_max_scrolls: cfg.refresh_max_scrolls,
            pause_scale: 1.0,
        }
    }

    /// No waiting at all; every poll probes exactly once.
    pub fn instant() -> Self {
        Self {
            click_settle: Duration::ZERO,
            swipe_settle: Duration::ZERO,
            poll_interval: Duration::ZERO,
            max_swipes: 10,
            refresh_max_scrolls: 15,
            pause_scale: 0.0,
        }
    }
}

impl Default for Timings {
    fn default() -> Self {
        Self::from_config(&TimingSection::default())
    }
}

/// The application under automation.
#[derive(Debug, Clone)]
pub struct AppProfile {
    pub package: String,
    pub companion_packages: Vec<String>,
    pub reset_depth: ResetDepth,
    /// Text that identifies the app's home screen.
    pub home_marker: String,
}

impl AppProfile {
    pub fn from_config(cfg: &DeviceSection) -> Self {
        Self {
            package: cfg.package.clone(),
            companion_packages: cfg.companion_packages.clone(),
            reset_depth: cfg.reset_depth,
            home_marker: "消息".to_string(),
        }
    }
}

impl Default for AppProfile {
    fn default() -> Self {
        Self::from_config(&DeviceSection::default())
    }
}

#[derive(Clone)]
pub struct BotContext {
    driver: Arc<dyn Driver>,
    matcher: Arc<dyn ImageMatcher>,
    cancel: CancellationToken,
    timings: Timings,
    profile: AppProfile,
}

impl fmt::Debug for BotContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotContext")
            .field("timings", &self.timings)
            .field("profile", &self.profile)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Treat non-abort errors as "not found".
fn soften<T>(res: Result<T>, fallback: T, what: &str) -> Result<T> {
    match res {
        Ok(v) => Ok(v),
        Err(e) if e.is_abort() => Err(e),
        Err(e) => {
            debug!(error = %e, what, "device call failed; treating as miss");
            Ok(fallback)
        }
    }
}

impl BotContext {
    pub fn new(
        driver: Arc<dyn Driver>,
        matcher: Arc<dyn ImageMatcher>,
        cancel: CancellationToken,
        timings: Timings,
        profile: AppProfile,
    ) -> Self {
        Self {
            driver,
            matcher,
            cancel,
            timings,
            profile,
        }
    }

    pub fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    pub fn timings(&self) -> &Timings {
        &self.timings
    }

    pub fn profile(&self) -> &AppProfile {
        &self.profile
    }

    pub fn stop_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn check_stop(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(BotError::Stopped)
        } else {
            Ok(())
        }
    }

    /// Stop signal clear and device reachable.
    pub async fn is_alive(&self) -> bool {
        !self.cancel.is_cancelled() && self.driver.is_connected().await
    }

    pub async fn ensure_alive(&self) -> Result<()> {
        self.check_stop()?;
        if self.driver.is_connected().await {
            Ok(())
        } else {
            Err(BotError::Disconnected("device is not responding".to_string()))
        }
    }

    fn scaled(&self, d: Duration) -> Duration {
        d.mul_f32(self.timings.pause_scale.max(0.0))
    }

    /// Fixed wait (page loads, animations), scaled by `pause_scale`.
    pub async fn pause(&self, d: Duration) -> Result<()> {
        sleep_or_stop(&self.cancel, self.scaled(d)).await
    }

    pub async fn poll<F, Fut>(&self, interval: Duration, timeout: Duration, probe: F) -> Result<bool>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool>>,
    {
        poll_until(
            &self.cancel,
            self.scaled(interval),
            self.scaled(timeout),
            probe,
        )
        .await
    }

    // ---- element lookups ------------------------------------------------

    pub async fn exists(&self, selector: &Selector) -> Result<bool> {
        self.check_stop()?;
        soften(self.driver.exists(selector).await, false, "exists")
    }

    pub async fn find_first(&self, selector: &Selector) -> Result<Option<Element>> {
        self.check_stop()?;
        soften(self.driver.find_first(selector).await, None, "find_first")
    }

    pub async fn find_all(&self, selector: &Selector) -> Result<Vec<Element>> {
        self.check_stop()?;
        soften(self.driver.find_all(selector).await, Vec::new(), "find_all")
    }

    pub async fn any_exists(&self, selectors: &[Selector]) -> Result<bool> {
        for sel in selectors {
            if self.exists(sel).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Single immediate click with no settling.
    pub async fn click(&self, selector: &Selector) -> Result<bool> {
        self.check_stop()?;
        soften(self.driver.click(selector).await, false, "click")
    }

    /// Wait up to `timeout` for any selector variant to appear, then click it
    /// with a settle pause on both sides.
    pub async fn click_element(&self, variants: &[Selector], timeout: Duration) -> Result<bool> {
        self.ensure_alive().await?;

        let hit = AtomicUsize::new(usize::MAX);
        let found = self
            .poll(Duration::from_millis(500), timeout, || {
                let hit = &hit;
                async move {
                    for (i, sel) in variants.iter().enumerate() {
                        if self.exists(sel).await? {
                            hit.store(i, Ordering::Relaxed);
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
            })
            .await?;

        let selector = match variants.get(hit.load(Ordering::Relaxed)) {
            Some(sel) if found => sel,
            _ => {
                debug!(?timeout, "click_element: no variant appeared");
                return Ok(false);
            }
        };

        self.pause(self.timings.click_settle).await?;
        let clicked = self.click(selector).await?;
        self.pause(self.timings.click_settle).await?;
        debug!(%selector, clicked, "click_element");
        Ok(clicked)
    }

    // ---- raw gestures ---------------------------------------------------

    pub async fn tap(&self, x: i32, y: i32) -> Result<()> {
        self.check_stop()?;
        soften(self.driver.tap(x, y).await, (), "tap")
    }

    /// Tap at a fraction of the screen size.
    pub async fn tap_ratio(&self, fx: f32, fy: f32) -> Result<()> {
        let (w, h) = self.window_size().await?;
        self.tap((w as f32 * fx) as i32, (h as f32 * fy) as i32)
            .await
    }

    pub async fn window_size(&self) -> Result<(u32, u32)> {
        self.check_stop()?;
        match self.driver.window_size().await {
            Ok(size) => Ok(size),
            Err(e) if e.is_abort() => Err(e),
            Err(e) => {
                warn!(error = %e, "window size unavailable; assuming configured resolution");
                Ok((504, 955))
            }
        }
    }

    pub async fn swipe(&self, direction: SwipeDirection, scale: f32) -> Result<()> {
        self.check_stop()?;
        soften(self.driver.swipe(direction, scale).await, (), "swipe")
    }

    pub async fn swipe_between(
        &self,
        from: (i32, i32),
        to: (i32, i32),
        duration: Duration,
    ) -> Result<()> {
        self.check_stop()?;
        soften(
            self.driver.swipe_between(from, to, duration).await,
            (),
            "swipe_between",
        )
    }

    pub async fn press(&self, key: Key) -> Result<()> {
        self.check_stop()?;
        soften(self.driver.press(key).await, (), "press")
    }

    pub async fn send_keys(&self, text: &str) -> Result<()> {
        self.check_stop()?;
        soften(self.driver.send_keys(text).await, (), "send_keys")
    }

    pub async fn shell(&self, command: &str) -> Result<Option<String>> {
        self.check_stop()?;
        soften(self.driver.shell(command).await.map(Some), None, "shell")
    }

    /// Signature of the visible page, `None` if the dump failed.
    pub async fn signature(&self) -> Result<Option<PageSignature>> {
        self.check_stop()?;
        soften(
            self.driver.hierarchy_signature().await.map(Some),
            None,
            "hierarchy_signature",
        )
    }

    // ---- images ---------------------------------------------------------

    pub async fn screenshot(&self) -> Result<Option<RgbImage>> {
        self.check_stop()?;
        soften(self.driver.screenshot().await.map(Some), None, "screenshot")
    }

    /// Look for a template on the current screen.
    pub async fn find_image(
        &self,
        template: &str,
        threshold: f32,
        ignore_color: bool,
    ) -> Result<Option<TemplateMatch>> {
        let Some(screen) = self.screenshot().await? else {
            return Ok(None);
        };
        match self
            .matcher
            .match_template(&screen, template, threshold, ignore_color)
        {
            Ok(m) if m.found => Ok(Some(m)),
            Ok(_) => Ok(None),
            Err(e) => {
                warn!(template, error = %e, "template match failed");
                Ok(None)
            }
        }
    }

    pub async fn image_visible(&self, template: &str, threshold: f32) -> Result<bool> {
        Ok(self.find_image(template, threshold, false).await?.is_some())
    }

    /// Tap the centre of a matched template, then wait for the UI to react.
    pub async fn click_image(&self, template: &str, threshold: f32) -> Result<bool> {
        let Some(m) = self.find_image(template, threshold, false).await? else {
            return Ok(false);
        };
        let Some(rect) = m.rect else {
            return Ok(false);
        };
        let (x, y) = rect.center();
        info!(template, score = m.score, x, y, "clicking template match");
        self.tap(x, y).await?;
        self.pause(Duration::from_secs(2)).await?;
        Ok(true)
    }

    /// Retry [`click_image`](Self::click_image) once per second until
    /// `timeout`. A dead device aborts the wait.
    pub async fn wait_and_click_image(
        &self,
        template: &str,
        timeout: Duration,
        threshold: f32,
    ) -> Result<bool> {
        self.poll(Duration::from_secs(1), timeout, || async move {
            self.ensure_alive().await?;
            self.click_image(template, threshold).await
        })
        .await
    }

    /// Wait until the button labelled `text` is visible and rendered in the
    /// active (saturated blue) colour.
    pub async fn wait_for_active_button(
        &self,
        text: &str,
        timeout: Duration,
        interval: Duration,
    ) -> Result<bool> {
        info!(button = text, "waiting for button to become active");
        let selector = Selector::text(text);
        let active = self
            .poll(interval, timeout, || {
                let selector = &selector;
                async move {
                    self.ensure_alive().await?;
                    let Some(element) = self.find_first(selector).await? else {
                        return Ok(false);
                    };
                    let Some(screen) = self.screenshot().await? else {
                        return Ok(false);
                    };
                    let Some(mean) = mean_rgb(&screen, element.bounds) else {
                        return Ok(false);
                    };
                    debug!(button = text, r = mean[0], g = mean[1], b = mean[2], "button colour");
                    Ok(is_active_blue(mean))
                }
            })
            .await?;

        if !active {
            warn!(button = text, "button did not become active in time");
        }
        Ok(active)
    }

    /// Fill the post composer and press publish.
    ///
    /// Falls back from the publish icon to the publish text to a blind tap
    /// in the top-right corner.
    pub async fn publish_comment(&self, content: &str) -> Result<bool> {
        info!("publishing post");

        let composer = [
            Selector::text_contains("分享新鲜事"),
            Selector::class_name("android.widget.EditText"),
        ];
        let mut found_editor = false;
        for _ in 0..10 {
            self.check_stop()?;
            let mut clicked = false;
            for sel in composer.iter() {
                if self.click(sel).await? {
                    clicked = true;
                    break;
                }
            }
            if clicked {
                found_editor = true;
                break;
            }
            self.pause(Duration::from_secs(2)).await?;
        }

        if found_editor {
            self.pause(Duration::from_secs(1)).await?;
            self.send_keys(content).await?;
            self.pause(Duration::from_secs(1)).await?;
        } else {
            warn!("post editor not found; pressing publish anyway");
        }

        if self
            .wait_and_click_image("发表.png", Duration::from_secs(10), 0.8)
            .await?
        {
            self.pause(Duration::from_secs(3)).await?;
            return Ok(true);
        }

        if self
            .click_element(&[Selector::text("发表")], Duration::from_secs(5))
            .await?
        {
            self.pause(Duration::from_secs(3)).await?;
            return Ok(true);
        }

        warn!("publish button not recognised; tapping top-right corner");
        let (w, _) = self.window_size().await?;
        self.tap(w as i32 - 50, 100).await?;
        self.pause(Duration::from_secs(3)).await?;
        Ok(true)
    }
}
