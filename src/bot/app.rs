// src/bot/app.rs

//! App lifecycle: start, reset, restart, popup dismissal.
//!
//! [`AppControl`] is the seam between the orchestration core (scheduler,
//! retry controller, refresher) and everything that touches the app
//! process. [`DeviceApp`] is the production implementation.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::bot::context::BotContext;
use crate::bot::navigator::navigate_to_shared_surface;
use crate::bot::scroll::scroll_and_check_completed;
use crate::device::{Key, Selector};
use crate::errors::Result;
use crate::types::ResetDepth;

const POPUP_BUTTONS: [&str; 5] = ["允许", "同意", "确定", "始终允许", "仅在使用中允许"];
const RESTART_ATTEMPTS: u32 = 5;
const HOME_WAIT: Duration = Duration::from_secs(20);

/// App operations the orchestration core needs.
#[async_trait]
pub trait AppControl: Send + Sync {
    /// Bring the host app to the foreground if something else is focused.
    async fn ensure_app_started(&self) -> Result<()>;

    /// Navigate to the shared task surface.
    async fn navigate(&self) -> Result<bool>;

    /// Force-stop and relaunch into a known state.
    async fn reset_app(&self) -> Result<bool>;

    /// Bounded stop/start cycle used after a task failure.
    async fn restart_app(&self) -> Result<bool>;

    /// Scroll the surface and report whether `label` is marked complete.
    async fn check_completed(&self, label: &str) -> Result<bool>;
}

fn driver_failure<T>(res: Result<T>, what: &str) -> Result<Option<T>> {
    match res {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.is_abort() => Err(e),
        Err(e) => {
            warn!(error = %e, what, "app control call failed");
            Ok(None)
        }
    }
}

/// Launch the host app and wait for its home screen.
pub async fn start_app(ctx: &BotContext) -> Result<bool> {
    let package = &ctx.profile().package;
    info!(package, "starting app");
    if driver_failure(ctx.driver().app_start(package).await, "app_start")?.is_none() {
        return Ok(false);
    }

    let home = Selector::text(ctx.profile().home_marker.as_str());
    let ready = ctx
        .poll(Duration::from_secs(1), HOME_WAIT, || ctx.exists(&home))
        .await?;
    if !ready {
        warn!(package, "home screen did not appear");
    }
    Ok(ready)
}

pub async fn ensure_app_started(ctx: &BotContext) -> Result<()> {
    ctx.check_stop()?;
    let package = &ctx.profile().package;
    match ctx.driver().current_package().await {
        Ok(Some(current)) if &current == package => {
            debug!(package, "app already in foreground");
            Ok(())
        }
        Ok(current) => {
            info!(package, ?current, "app not in foreground; starting");
            start_app(ctx).await?;
            ctx.pause(Duration::from_secs(5)).await
        }
        Err(e) if e.is_abort() => Err(e),
        Err(e) => {
            warn!(error = %e, "could not read foreground app; starting blindly");
            driver_failure(ctx.driver().app_start(package).await, "app_start")?;
            ctx.pause(Duration::from_secs(5)).await
        }
    }
}

/// Dismiss permission and agreement dialogs, if any are showing.
pub async fn handle_popups(ctx: &BotContext) -> Result<()> {
    for text in POPUP_BUTTONS {
        if ctx.click(&Selector::text(text)).await? {
            info!(button = text, "dismissed popup");
            ctx.pause(Duration::from_secs(1)).await?;
        }
    }
    Ok(())
}

pub async fn reset_app(ctx: &BotContext) -> Result<bool> {
    let profile = ctx.profile();
    info!(depth = ?profile.reset_depth, "resetting app");

    if driver_failure(ctx.driver().app_stop(&profile.package).await, "app_stop")?.is_none() {
        return Ok(false);
    }
    if profile.reset_depth == ResetDepth::Full {
        for companion in &profile.companion_packages {
            ctx.pause(Duration::from_secs(2)).await?;
            driver_failure(ctx.driver().app_stop(companion).await, "app_stop")?;
        }
    }
    ctx.pause(Duration::from_secs(5)).await?;

    if driver_failure(ctx.driver().app_start(&profile.package).await, "app_start")?.is_none() {
        return Ok(false);
    }
    driver_failure(ctx.driver().screen_on().await, "screen_on")?;

    let home = Selector::text(profile.home_marker.as_str());
    let ready = ctx
        .poll(Duration::from_secs(1), HOME_WAIT, || ctx.exists(&home))
        .await?;
    if !ready {
        warn!("home screen not seen after reset; continuing");
    }
    handle_popups(ctx).await?;
    Ok(true)
}

pub async fn restart_app(ctx: &BotContext) -> Result<bool> {
    let package = &ctx.profile().package;

    for attempt in 1..=RESTART_ATTEMPTS {
        ctx.ensure_alive().await?;
        info!(attempt, "restarting app");
        driver_failure(ctx.driver().app_stop(package).await, "app_stop")?;
        ctx.pause(Duration::from_secs(2)).await?;

        if start_app(ctx).await? {
            ctx.pause(Duration::from_secs(5)).await?;
            handle_popups(ctx).await?;
            return Ok(true);
        }

        warn!(attempt, "restart did not reach home screen");
        ctx.press(Key::Home).await?;
        driver_failure(ctx.driver().app_stop(package).await, "app_stop")?;
        ctx.pause(Duration::from_secs(2)).await?;
    }
    Ok(false)
}

/// [`AppControl`] over a live device.
#[derive(Debug, Clone)]
pub struct DeviceApp {
    ctx: BotContext,
    labels: Vec<String>,
}

impl DeviceApp {
    /// `labels` are the surface row labels used as navigation indicators.
    pub fn new(ctx: BotContext, labels: Vec<String>) -> Self {
        Self { ctx, labels }
    }
}

#[async_trait]
impl AppControl for DeviceApp {
    async fn ensure_app_started(&self) -> Result<()> {
        ensure_app_started(&self.ctx).await
    }

    async fn navigate(&self) -> Result<bool> {
        navigate_to_shared_surface(&self.ctx, &self.labels).await
    }

    async fn reset_app(&self) -> Result<bool> {
        reset_app(&self.ctx).await
    }

    async fn restart_app(&self) -> Result<bool> {
        restart_app(&self.ctx).await
    }

    async fn check_completed(&self, label: &str) -> Result<bool> {
        let max = self.ctx.timings().max_swipes;
        scroll_and_check_completed(&self.ctx, label, max).await
    }
}
