// src/bot/navigator.rs

//! Path from the home screen to the shared task-list surface.
//!
//! The route is a fixed sequence of pages:
//!
//! home -> side panel (avatar) -> level page -> "more tasks" -> surface.
//!
//! Navigation is idempotent: if the surface is already visible nothing is
//! tapped. Misses return `Ok(false)` and leave recovery to the caller.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::bot::context::BotContext;
use crate::device::{Key, Selector};
use crate::errors::Result;

pub const SURFACE_TITLE: &str = "额外活跃";

const AVATAR_ID: &str = "com.tencent.mobileqq:id/conversation_head";
const MORE_TASKS: &str = "更多任务";
const MORE_TASKS_IMAGE: &str = "更多任务.png";

const SIDE_PANEL_ATTEMPTS: u32 = 3;
const MORE_TASKS_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NavStage {
    CheckPresent,
    OpenSidePanel,
    EnterLevelPage,
    OpenMoreTasks,
    EnterSurface,
}

fn level_indicators() -> [Selector; 3] {
    [
        Selector::text_contains("LV"),
        Selector::desc_contains("等级"),
        Selector::resource_id("com.tencent.mobileqq:id/my_level"),
    ]
}

/// Selectors proving the surface is on screen.
fn surface_indicators(labels: &[String]) -> Vec<Selector> {
    std::iter::once(Selector::text_contains(SURFACE_TITLE))
        .chain(labels.iter().map(|l| Selector::text_contains(l.as_str())))
        .collect()
}

/// Drive the app onto the shared surface.
///
/// `labels` are the on-screen labels of the tasks living there; seeing any
/// of them counts as already being on the surface.
pub async fn navigate_to_shared_surface(ctx: &BotContext, labels: &[String]) -> Result<bool> {
    let mut stage = NavStage::CheckPresent;

    loop {
        ctx.ensure_alive().await?;
        debug!(?stage, "navigating");

        stage = match stage {
            NavStage::CheckPresent => {
                if ctx.any_exists(&surface_indicators(labels)).await? {
                    info!("already on task surface");
                    return Ok(true);
                }
                NavStage::OpenSidePanel
            }
            NavStage::OpenSidePanel => {
                if !open_side_panel(ctx).await? {
                    warn!("could not open side panel");
                    return Ok(false);
                }
                NavStage::EnterLevelPage
            }
            NavStage::EnterLevelPage => {
                if !enter_level_page(ctx).await? {
                    warn!("could not open level page");
                    return Ok(false);
                }
                NavStage::OpenMoreTasks
            }
            NavStage::OpenMoreTasks => {
                if !open_more_tasks(ctx).await? {
                    // The title click below gets one more chance.
                    warn!("task surface title not seen after opening more tasks");
                }
                NavStage::EnterSurface
            }
            NavStage::EnterSurface => {
                let entered = ctx
                    .click_element(
                        &[Selector::text_contains(SURFACE_TITLE)],
                        Duration::from_secs(10),
                    )
                    .await?;
                if entered {
                    info!("entered task surface");
                } else {
                    warn!("could not enter task surface");
                }
                return Ok(entered);
            }
        };
    }
}

async fn open_side_panel(ctx: &BotContext) -> Result<bool> {
    let avatar = Selector::resource_id(AVATAR_ID);
    ctx.poll(Duration::from_secs(1), Duration::from_secs(10), || {
        ctx.exists(&avatar)
    })
    .await?;

    let levels = level_indicators();
    for attempt in 1..=SIDE_PANEL_ATTEMPTS {
        ctx.ensure_alive().await?;
        if !ctx.click(&avatar).await?
            && !ctx.click(&Selector::desc_contains("帐户及设置")).await?
        {
            debug!(attempt, "avatar not found; tapping top-left corner");
            ctx.tap(50, 100).await?;
        }
        ctx.pause(Duration::from_secs(2)).await?;

        if ctx.any_exists(&levels).await? {
            return Ok(true);
        }
        debug!(attempt, "side panel not open yet");
    }
    Ok(false)
}

async fn enter_level_page(ctx: &BotContext) -> Result<bool> {
    let levels = level_indicators();
    if !ctx.click_element(&levels, Duration::from_secs(5)).await? {
        return Ok(false);
    }

    let more = Selector::text(MORE_TASKS);
    let shown = ctx
        .poll(Duration::from_secs(1), Duration::from_secs(5), || {
            ctx.exists(&more)
        })
        .await?;
    if !shown {
        debug!("more tasks not visible; clicking level again");
        ctx.click_element(&levels, Duration::from_secs(5)).await?;
    }
    Ok(true)
}

async fn open_more_tasks(ctx: &BotContext) -> Result<bool> {
    let title = Selector::text_contains(SURFACE_TITLE);

    for attempt in 1..=MORE_TASKS_ATTEMPTS {
        ctx.ensure_alive().await?;
        if !ctx.click_image(MORE_TASKS_IMAGE, 0.7).await? {
            debug!(attempt, "more tasks template not matched");
        }
        let seen = ctx
            .poll(Duration::from_secs(1), Duration::from_secs(15), || {
                ctx.exists(&title)
            })
            .await?;
        if seen {
            return Ok(true);
        }
        if attempt == MORE_TASKS_ATTEMPTS {
            break;
        }
        debug!(attempt, "task surface not detected; backing out");
        ctx.press(Key::Back).await?;
        ctx.pause(Duration::from_secs(2)).await?;
    }
    Ok(false)
}
