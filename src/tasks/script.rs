// src/tasks/script.rs

//! Data-driven task scripts.
//!
//! Most daily tasks share one shape: find their row on the shared surface,
//! bail out if it is already marked complete, tap the entry, then walk a
//! short list of UI steps. [`ScriptedTask`] runs that shape; each task in
//! the catalog only supplies its [`Step`]s.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::bot::completion::is_completed;
use crate::bot::context::BotContext;
use crate::bot::scroll::scroll_and_find;
use crate::device::{Selector, SwipeDirection};
use crate::errors::Result;
use crate::tasks::{Task, TaskOutcome};

const DEFAULT_CLICK_TIMEOUT: Duration = Duration::from_secs(5);

pub type StepFuture<'a> = Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>>;

/// One UI action inside a script. Every step reports whether it hit.
#[derive(Debug, Clone)]
pub enum Step {
    Pause(Duration),
    /// Wait for any selector variant and click it.
    Click {
        selectors: Vec<Selector>,
        timeout: Duration,
    },
    /// Click a template if it is on screen right now.
    ClickImage { template: String, threshold: f32 },
    /// Retry a template click until the timeout.
    WaitClickImage {
        template: String,
        timeout: Duration,
        threshold: f32,
    },
    /// Try alternatives in order; hits on the first one that does.
    FirstOf(Vec<Step>),
    TapRatio(f32, f32),
    WaitActiveButton {
        text: String,
        timeout: Duration,
        interval: Duration,
    },
    Publish(String),
    /// Repeated fast drags between two screen fractions.
    SwipeFor {
        duration: Duration,
        interval: Duration,
        from: (f32, f32),
        to: (f32, f32),
        stroke: Duration,
    },
    /// Browse up and down for a while, clicking `template` whenever it shows.
    BrowseFor {
        duration: Duration,
        template: String,
    },
    /// Click up to `count` copies of a template, scrolling when none is
    /// visible.
    LikeImages {
        template: String,
        threshold: f32,
        count: u32,
        timeout: Duration,
    },
    /// Wait for a loading template to disappear.
    WaitImageGone { template: String, timeout: Duration },
    /// Tap `offset` px below a template, or at a screen fraction if the
    /// template is missing.
    TapBelowImage {
        template: String,
        threshold: f32,
        offset: i32,
        fallback: (f32, f32),
    },
    /// Dismiss an agreement sheet identified by `marker`, pressing
    /// `button` (the bottom-most match when several exist).
    AcceptAgreement { marker: String, button: String },
    /// Rounds over a list of templates, clicking the first one visible.
    /// Stops on `terminal`, after `max_rounds`, or after `max_misses`
    /// consecutive empty rounds.
    ImageCycle {
        images: Vec<(String, f32)>,
        terminal: String,
        max_rounds: u32,
        max_misses: u32,
        settle: Duration,
    },
    /// Click whichever template shows up first within the timeout.
    RaceImages {
        templates: Vec<String>,
        timeout: Duration,
    },
}

impl Step {
    pub fn click(selector: Selector) -> Self {
        Step::Click {
            selectors: vec![selector],
            timeout: DEFAULT_CLICK_TIMEOUT,
        }
    }

    pub fn click_within(selectors: Vec<Selector>, timeout: Duration) -> Self {
        Step::Click { selectors, timeout }
    }

    pub fn click_image(template: &str, threshold: f32) -> Self {
        Step::ClickImage {
            template: template.to_string(),
            threshold,
        }
    }

    pub fn wait_click_image(template: &str, secs: u64) -> Self {
        Step::WaitClickImage {
            template: template.to_string(),
            timeout: Duration::from_secs(secs),
            threshold: 0.8,
        }
    }

    pub fn pause_secs(secs: u64) -> Self {
        Step::Pause(Duration::from_secs(secs))
    }

    fn kind(&self) -> &'static str {
        match self {
            Step::Pause(_) => "pause",
            Step::Click { .. } => "click",
            Step::ClickImage { .. } => "click_image",
            Step::WaitClickImage { .. } => "wait_click_image",
            Step::FirstOf(_) => "first_of",
            Step::TapRatio(..) => "tap_ratio",
            Step::WaitActiveButton { .. } => "wait_active_button",
            Step::Publish(_) => "publish",
            Step::SwipeFor { .. } => "swipe_for",
            Step::BrowseFor { .. } => "browse_for",
            Step::LikeImages { .. } => "like_images",
            Step::WaitImageGone { .. } => "wait_image_gone",
            Step::TapBelowImage { .. } => "tap_below_image",
            Step::AcceptAgreement { .. } => "accept_agreement",
            Step::ImageCycle { .. } => "image_cycle",
            Step::RaceImages { .. } => "race_images",
        }
    }

    pub fn run<'a>(&'a self, ctx: &'a BotContext) -> StepFuture<'a> {
        Box::pin(self.run_inner(ctx))
    }

    async fn run_inner(&self, ctx: &BotContext) -> Result<bool> {
        ctx.ensure_alive().await?;
        match self {
            Step::Pause(d) => {
                ctx.pause(*d).await?;
                Ok(true)
            }
            Step::Click { selectors, timeout } => ctx.click_element(selectors, *timeout).await,
            Step::ClickImage {
                template,
                threshold,
            } => ctx.click_image(template, *threshold).await,
            Step::WaitClickImage {
                template,
                timeout,
                threshold,
            } => ctx.wait_and_click_image(template, *timeout, *threshold).await,
            Step::FirstOf(alternatives) => {
                for alt in alternatives {
                    if alt.run(ctx).await? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Step::TapRatio(fx, fy) => {
                ctx.tap_ratio(*fx, *fy).await?;
                Ok(true)
            }
            Step::WaitActiveButton {
                text,
                timeout,
                interval,
            } => ctx.wait_for_active_button(text, *timeout, *interval).await,
            Step::Publish(content) => ctx.publish_comment(content).await,
            Step::SwipeFor {
                duration,
                interval,
                from,
                to,
                stroke,
            } => swipe_for(ctx, *duration, *interval, *from, *to, *stroke).await,
            Step::BrowseFor { duration, template } => browse_for(ctx, *duration, template).await,
            Step::LikeImages {
                template,
                threshold,
                count,
                timeout,
            } => like_images(ctx, template, *threshold, *count, *timeout).await,
            Step::WaitImageGone { template, timeout } => {
                ctx.poll(Duration::from_secs(1), *timeout, || async {
                    Ok(!ctx.image_visible(template, 0.8).await?)
                })
                .await?;
                // Still loading after the timeout is not a failure.
                Ok(true)
            }
            Step::TapBelowImage {
                template,
                threshold,
                offset,
                fallback,
            } => tap_below_image(ctx, template, *threshold, *offset, *fallback).await,
            Step::AcceptAgreement { marker, button } => accept_agreement(ctx, marker, button).await,
            Step::ImageCycle {
                images,
                terminal,
                max_rounds,
                max_misses,
                settle,
            } => image_cycle(ctx, images, terminal, *max_rounds, *max_misses, *settle).await,
            Step::RaceImages { templates, timeout } => {
                ctx.poll(Duration::from_secs(1), *timeout, || async {
                    for t in templates {
                        if ctx.click_image(t, 0.8).await? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                })
                .await
            }
        }
    }
}

async fn swipe_for(
    ctx: &BotContext,
    duration: Duration,
    interval: Duration,
    from: (f32, f32),
    to: (f32, f32),
    stroke: Duration,
) -> Result<bool> {
    let (w, h) = ctx.window_size().await?;
    let at = |(fx, fy): (f32, f32)| ((w as f32 * fx) as i32, (h as f32 * fy) as i32);
    let (from, to) = (at(from), at(to));

    // The probe never succeeds; the poll just paces the swipes until the
    // duration runs out.
    ctx.poll(interval, duration, || async {
        ctx.ensure_alive().await?;
        ctx.swipe_between(from, to, stroke).await?;
        Ok(false)
    })
    .await?;
    Ok(true)
}

async fn browse_for(ctx: &BotContext, duration: Duration, template: &str) -> Result<bool> {
    let mut round = 0u32;
    ctx.poll(Duration::from_secs(2), duration, || {
        round += 1;
        let direction = if round % 3 == 0 {
            SwipeDirection::Down
        } else {
            SwipeDirection::Up
        };
        async move {
            ctx.ensure_alive().await?;
            if ctx.click_image(template, 0.8).await? {
                info!(template, "clicked while browsing");
            }
            ctx.swipe(direction, 0.5).await?;
            Ok(false)
        }
    })
    .await?;
    Ok(true)
}

async fn like_images(
    ctx: &BotContext,
    template: &str,
    threshold: f32,
    count: u32,
    timeout: Duration,
) -> Result<bool> {
    let liked = AtomicU32::new(0);
    ctx.poll(Duration::ZERO, timeout, || async {
        ctx.ensure_alive().await?;
        if ctx.click_image(template, threshold).await? {
            liked.fetch_add(1, Ordering::Relaxed);
            ctx.pause(Duration::from_secs(1)).await?;
        } else {
            ctx.swipe(SwipeDirection::Up, 0.9).await?;
            ctx.pause(Duration::from_millis(1500)).await?;
        }
        Ok(liked.load(Ordering::Relaxed) >= count)
    })
    .await?;
    info!(liked = liked.load(Ordering::Relaxed), wanted = count, "likes done");
    // Partial progress is accepted; the surface re-check decides later.
    Ok(true)
}

async fn tap_below_image(
    ctx: &BotContext,
    template: &str,
    threshold: f32,
    offset: i32,
    fallback: (f32, f32),
) -> Result<bool> {
    let rect = ctx
        .find_image(template, threshold, false)
        .await?
        .and_then(|m| m.rect);
    match rect {
        Some(r) => {
            let (w, _) = ctx.window_size().await?;
            ctx.tap(w as i32 / 2, r.bottom + offset).await?;
        }
        None => {
            debug!(template, "anchor image missing; tapping fallback point");
            ctx.tap_ratio(fallback.0, fallback.1).await?;
        }
    }
    ctx.pause(Duration::from_secs(5)).await?;
    Ok(true)
}

async fn accept_agreement(ctx: &BotContext, marker: &str, button: &str) -> Result<bool> {
    if !ctx.exists(&Selector::text_contains(marker)).await? {
        return Ok(true);
    }
    info!(marker, "agreement sheet shown");

    if !ctx.click(&Selector::text(button)).await? {
        let candidates = ctx.find_all(&Selector::text_contains(button)).await?;
        match candidates.iter().max_by_key(|e| e.bounds.bottom) {
            Some(lowest) => {
                let (x, y) = lowest.bounds.center();
                ctx.tap(x, y).await?;
            }
            None => warn!(button, "agreement button not found"),
        }
    }
    ctx.pause(Duration::from_secs(1)).await?;
    Ok(true)
}

async fn image_cycle(
    ctx: &BotContext,
    images: &[(String, f32)],
    terminal: &str,
    max_rounds: u32,
    max_misses: u32,
    settle: Duration,
) -> Result<bool> {
    let mut misses = 0u32;

    for round in 1..=max_rounds {
        ctx.ensure_alive().await?;
        let mut hit: Option<&str> = None;
        for (template, threshold) in images {
            ctx.pause(Duration::from_secs(1)).await?;
            if ctx.click_image(template, *threshold).await? {
                hit = Some(template.as_str());
                break;
            }
        }

        match hit {
            Some(t) if t == terminal => {
                info!(round, template = t, "reached final screen");
                ctx.pause(Duration::from_secs(10)).await?;
                ctx.click_image("打开.png", 0.8).await?;
                return Ok(true);
            }
            Some(t) => {
                debug!(round, template = t, "cycle step");
                misses = 0;
            }
            None => {
                misses += 1;
                if misses >= max_misses {
                    debug!(round, misses, "nothing recognised; leaving cycle");
                    break;
                }
            }
        }
        ctx.pause(settle).await?;
    }
    Ok(true)
}

#[derive(Debug, Clone)]
struct ScriptLine {
    step: Step,
    required: bool,
}

/// A task living on the shared surface, driven by a step list.
#[derive(Debug, Clone)]
pub struct ScriptedTask {
    name: String,
    label: String,
    find: Selector,
    entry: Selector,
    fallback_label: Option<String>,
    lines: Vec<ScriptLine>,
}

impl ScriptedTask {
    /// Row found by `label` substring; the same row is the entry.
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            name: name.into(),
            find: Selector::text_contains(label.as_str()),
            entry: Selector::text_contains(label.as_str()),
            label,
            fallback_label: None,
            lines: Vec::new(),
        }
    }

    /// Match the row by exact text instead of substring.
    pub fn exact(mut self) -> Self {
        self.find = Selector::text(self.label.as_str());
        self.entry = Selector::text(self.label.as_str());
        self
    }

    /// A different element to tap once the row is found.
    pub fn entry(mut self, entry: Selector) -> Self {
        self.entry = entry;
        self
    }

    /// Shorter label tried when the full one is not on the surface.
    pub fn fallback_label(mut self, label: impl Into<String>) -> Self {
        self.fallback_label = Some(label.into());
        self
    }

    /// Append a step whose miss fails the task.
    pub fn require(mut self, step: Step) -> Self {
        self.lines.push(ScriptLine {
            step,
            required: true,
        });
        self
    }

    /// Append a best-effort step.
    pub fn then(mut self, step: Step) -> Self {
        self.lines.push(ScriptLine {
            step,
            required: false,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Find the row, check completion, tap in.
    ///
    /// `None` means the task should stop with the given outcome.
    async fn enter(&self, ctx: &BotContext) -> Result<Option<TaskOutcome>> {
        let max = ctx.timings().max_swipes;

        if scroll_and_find(ctx, &self.find, max).await? {
            if is_completed(ctx, &self.label).await? {
                info!(task = %self.name, "already completed");
                return Ok(Some(TaskOutcome::AlreadyDone));
            }
            ctx.click_element(std::slice::from_ref(&self.entry), DEFAULT_CLICK_TIMEOUT)
                .await?;
            return Ok(None);
        }

        if let Some(short) = &self.fallback_label {
            let sel = Selector::text_contains(short.as_str());
            if scroll_and_find(ctx, &sel, max).await? {
                if is_completed(ctx, short).await? {
                    info!(task = %self.name, "already completed");
                    return Ok(Some(TaskOutcome::AlreadyDone));
                }
                ctx.click_element(std::slice::from_ref(&sel), DEFAULT_CLICK_TIMEOUT)
                    .await?;
                return Ok(None);
            }
        }

        warn!(task = %self.name, label = %self.label, "task row not found");
        Ok(Some(TaskOutcome::Failed))
    }
}

#[async_trait]
impl Task for ScriptedTask {
    async fn execute(&self, ctx: &BotContext) -> Result<TaskOutcome> {
        if let Some(outcome) = self.enter(ctx).await? {
            return Ok(outcome);
        }

        for (i, line) in self.lines.iter().enumerate() {
            let hit = line.step.run(ctx).await?;
            debug!(task = %self.name, step = i, kind = line.step.kind(), hit, "step done");
            if !hit && line.required {
                warn!(task = %self.name, step = i, kind = line.step.kind(), "required step missed");
                return Ok(TaskOutcome::Failed);
            }
        }

        info!(task = %self.name, "script finished");
        Ok(TaskOutcome::Completed)
    }
}
