// src/bot/scroll.rs

//! Scroll-to-find over long lists.
//!
//! Scrolling stops early once the page signature stops changing, which
//! means the list hit its end.

use tracing::{debug, info};

use crate::bot::completion::is_completed;
use crate::bot::context::BotContext;
use crate::device::{Selector, SwipeDirection};
use crate::errors::Result;

const SWIPE_SCALE: f32 = 0.6;
/// Extra swipes for the reverse pass, which starts below the origin.
const REVERSE_EXTRA: u32 = 5;

/// Swipe in one direction until `selector` appears, the page freezes or
/// `max_swipes` is used up.
async fn scroll_pass(
    ctx: &BotContext,
    selector: &Selector,
    direction: SwipeDirection,
    max_swipes: u32,
) -> Result<bool> {
    let mut last = ctx.signature().await?;

    for swipe in 1..=max_swipes {
        ctx.ensure_alive().await?;
        ctx.swipe(direction, SWIPE_SCALE).await?;
        ctx.pause(ctx.timings().swipe_settle).await?;

        let current = ctx.signature().await?;
        if current.is_some() && current == last {
            debug!(%selector, ?direction, swipe, "page stopped moving");
            break;
        }
        last = current;

        if ctx.exists(selector).await? {
            debug!(%selector, ?direction, swipe, "found after scrolling");
            return Ok(true);
        }
    }
    Ok(false)
}

/// Find `selector` on the current list, scrolling down first and then back
/// up past the starting point.
pub async fn scroll_and_find(ctx: &BotContext, selector: &Selector, max_swipes: u32) -> Result<bool> {
    ctx.ensure_alive().await?;
    if ctx.exists(selector).await? {
        return Ok(true);
    }

    if scroll_pass(ctx, selector, SwipeDirection::Up, max_swipes).await? {
        return Ok(true);
    }
    if scroll_pass(ctx, selector, SwipeDirection::Down, max_swipes + REVERSE_EXTRA).await? {
        return Ok(true);
    }

    info!(%selector, "element not found after scrolling both ways");
    Ok(false)
}

/// Scroll forward looking for the row `label`, and report whether it
/// carries the completion marker.
///
/// `false` both when the row is visible but not done and when it was never
/// found.
pub async fn scroll_and_check_completed(ctx: &BotContext, label: &str, max_swipes: u32) -> Result<bool> {
    let selector = Selector::text_contains(label);
    let mut last = ctx.signature().await?;

    // One check per page: the starting one plus one after each swipe.
    for swipe in 0..=max_swipes {
        ctx.ensure_alive().await?;
        if is_completed(ctx, label).await? {
            return Ok(true);
        }
        if ctx.exists(&selector).await? {
            return Ok(false);
        }
        if swipe == max_swipes {
            break;
        }

        ctx.swipe(SwipeDirection::Up, SWIPE_SCALE).await?;
        ctx.pause(ctx.timings().swipe_settle).await?;
        let current = ctx.signature().await?;
        if current.is_some() && current == last {
            break;
        }
        last = current;
    }

    debug!(label, "row not found while checking completion");
    Ok(false)
}
