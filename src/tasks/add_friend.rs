// src/tasks/add_friend.rs

//! Friend-add task.
//!
//! For each configured account id: reset the app, search for the id and
//! open its profile. An existing friend is deleted first and then added
//! again. One id failing is logged and does not stop the others.

use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::bot::app::reset_app;
use crate::bot::context::BotContext;
use crate::device::Selector;
use crate::errors::{BotError, Result};
use crate::tasks::{Task, TaskOutcome};

const MAX_IDS: usize = 3;

const SEND_ID: &str = "com.tencent.mobileqq:id/ivTitleBtnRightText";
const ADD_BUTTON_ID: &str = "com.tencent.mobileqq:id/6mq";
const CHAT_SETTINGS_ID: &str = "com.tencent.mobileqq:id/5p9";

fn missing(what: &str) -> BotError {
    BotError::Other(anyhow!("{what} not found"))
}

/// Click the first selector that matches something on screen.
async fn click_any(ctx: &BotContext, selectors: &[Selector]) -> Result<bool> {
    for sel in selectors {
        if ctx.click(sel).await? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn friend_markers() -> [Selector; 3] {
    [
        Selector::resource_id(CHAT_SETTINGS_ID),
        Selector::desc("聊天设置"),
        Selector::desc("更多功能"),
    ]
}

fn send_buttons() -> [Selector; 2] {
    [Selector::text("发送"), Selector::resource_id(SEND_ID)]
}

#[derive(Debug, Clone)]
pub struct AddFriendTask {
    friend_ids: Vec<String>,
}

impl AddFriendTask {
    pub fn new(friend_ids: Vec<String>) -> Self {
        let friend_ids = friend_ids.into_iter().take(MAX_IDS).collect();
        Self { friend_ids }
    }

    pub fn friend_ids(&self) -> &[String] {
        &self.friend_ids
    }

    async fn search(&self, ctx: &BotContext, id: &str) -> Result<()> {
        if !ctx.click_image("搜索.png", 0.8).await?
            && !click_any(
                ctx,
                &[
                    Selector::desc("搜索"),
                    Selector::resource_id("com.tencent.mobileqq:id/et_search_keyword"),
                ],
            )
            .await?
        {
            return Err(missing("search entry"));
        }
        ctx.pause(Duration::from_secs(2)).await?;

        let focused = click_any(
            ctx,
            &[
                Selector::class_name("android.widget.EditText"),
                Selector::resource_id("com.tencent.mobileqq:id/3en"),
            ],
        )
        .await?;
        if focused {
            ctx.pause(Duration::from_secs(1)).await?;
        } else {
            warn!("search box not found; typing blind");
        }

        // The search box drops characters when the whole id arrives at once.
        for ch in id.chars() {
            ctx.shell(&format!("input text {ch}")).await?;
            ctx.pause(Duration::from_millis(200)).await?;
        }
        ctx.pause(Duration::from_secs(6)).await?;

        let hit = click_any(
            ctx,
            &[
                Selector::text_contains(id),
                Selector::resource_id("com.tencent.mobileqq:id/j64").and_text_contains(id),
            ],
        )
        .await?;
        if !hit {
            return Err(missing("search result"));
        }
        ctx.pause(Duration::from_secs(3)).await
    }

    async fn add(&self, ctx: &BotContext) -> Result<()> {
        if ctx.click(&Selector::resource_id(ADD_BUTTON_ID)).await? {
            ctx.pause(Duration::from_secs(3)).await?;
            if !ctx.any_exists(&send_buttons()).await?
                && ctx.click(&Selector::text("加好友")).await?
            {
                ctx.pause(Duration::from_secs(2)).await?;
            }
        }

        if !click_any(ctx, &send_buttons()).await? {
            return Err(missing("send button"));
        }
        info!("friend request sent");
        ctx.pause(Duration::from_secs(2)).await
    }

    async fn delete(&self, ctx: &BotContext) -> Result<()> {
        if !click_any(ctx, &friend_markers()).await? {
            return Err(missing("chat settings button"));
        }
        ctx.pause(Duration::from_secs(2)).await?;

        click_any(
            ctx,
            &[
                Selector::resource_id("com.tencent.mobileqq.profilecard_feature_impl:id/p42"),
                Selector::desc("设置"),
            ],
        )
        .await?;
        ctx.pause(Duration::from_secs(2)).await?;

        for _ in 0..2 {
            let (w, h) = ctx.window_size().await?;
            let x = w as i32 / 2;
            ctx.swipe_between(
                (x, (h as f32 * 0.8) as i32),
                (x, (h as f32 * 0.2) as i32),
                Duration::from_millis(500),
            )
            .await?;
            ctx.pause(Duration::from_secs(1)).await?;
        }

        if !click_any(ctx, &[Selector::text("删除好友"), Selector::text("删除")]).await? {
            return Err(missing("delete option"));
        }
        ctx.pause(Duration::from_secs(2)).await?;

        let confirmed = click_any(
            ctx,
            &[
                Selector::text("确定"),
                Selector::resource_id("com.tencent.mobileqq:id/dialogRightBtn"),
                Selector::text("删除好友").and_class_name("android.widget.TextView"),
            ],
        )
        .await?;
        if !confirmed {
            return Err(missing("delete confirmation"));
        }
        info!("friend deleted");
        ctx.pause(Duration::from_secs(3)).await
    }

    async fn process(&self, ctx: &BotContext, id: &str) -> Result<()> {
        reset_app(ctx).await?;
        self.search(ctx, id).await?;

        if ctx.any_exists(&friend_markers()).await? {
            info!(id, "already a friend; deleting and re-adding");
            self.delete(ctx).await?;
            reset_app(ctx).await?;
            self.search(ctx, id).await?;
        }
        self.add(ctx).await
    }
}

#[async_trait]
impl Task for AddFriendTask {
    async fn execute(&self, ctx: &BotContext) -> Result<TaskOutcome> {
        if self.friend_ids.is_empty() {
            info!("no friend ids configured; nothing to do");
            return Ok(TaskOutcome::Completed);
        }

        for id in &self.friend_ids {
            ctx.ensure_alive().await?;
            info!(id = %id, "processing friend id");
            match self.process(ctx, id).await {
                Ok(()) => info!(id = %id, "friend id done"),
                Err(e) if e.is_abort() => return Err(e),
                Err(e) => error!(id = %id, error = %e, "friend id failed; moving on"),
            }
        }
        Ok(TaskOutcome::Completed)
    }
}
