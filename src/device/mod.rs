// src/device/mod.rs

//! Device capability layer.
//!
//! Everything above this module talks to a phone through the [`Driver`]
//! trait: element lookup by [`Selector`], taps, swipes, key presses,
//! screenshots, text entry and app process control.
//!
//! - [`selector`] describes how UI elements are matched.
//! - [`hierarchy`] parses `uiautomator` dumps and computes page signatures.
//! - [`adb`] is the production driver that shells out to the `adb` binary.

pub mod adb;
pub mod hierarchy;
pub mod selector;

use std::time::Duration;

use async_trait::async_trait;
use image::RgbImage;

use crate::errors::Result;

pub use adb::AdbDriver;
pub use hierarchy::{parse_hierarchy, PageSignature};
pub use selector::Selector;

/// Screen rectangle in device pixels, as reported by `uiautomator`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Bounds {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn center(&self) -> (i32, i32) {
        ((self.left + self.right) / 2, (self.top + self.bottom) / 2)
    }

    pub fn center_y(&self) -> f64 {
        f64::from(self.top + self.bottom) / 2.0
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }
}

/// One node of the UI hierarchy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    pub text: String,
    pub content_desc: String,
    pub resource_id: String,
    pub class_name: String,
    pub bounds: Bounds,
    pub clickable: bool,
}

impl Element {
    /// Convenience constructor for a text node.
    pub fn with_text(text: impl Into<String>, bounds: Bounds) -> Self {
        Self {
            text: text.into(),
            bounds,
            ..Default::default()
        }
    }
}

/// Direction the finger moves. `Up` reveals content further down the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeDirection {
    Up,
    Down,
    Left,
    Right,
}

/// Hardware keys the automation needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Back,
    Home,
    Wakeup,
}

impl Key {
    pub fn keycode(self) -> u32 {
        match self {
            Key::Back => 4,
            Key::Home => 3,
            Key::Wakeup => 224,
        }
    }
}

/// Start and end points of a swipe centred on the screen covering `scale`
/// of the relevant axis.
pub fn swipe_points(
    width: u32,
    height: u32,
    direction: SwipeDirection,
    scale: f32,
) -> ((i32, i32), (i32, i32)) {
    let scale = scale.clamp(0.05, 1.0);
    let (w, h) = (width as f32, height as f32);
    let (cx, cy) = (w / 2.0, h / 2.0);
    let half_y = h * scale / 2.0;
    let half_x = w * scale / 2.0;

    let (from, to) = match direction {
        SwipeDirection::Up => ((cx, cy + half_y), (cx, cy - half_y)),
        SwipeDirection::Down => ((cx, cy - half_y), (cx, cy + half_y)),
        SwipeDirection::Left => ((cx + half_x, cy), (cx - half_x, cy)),
        SwipeDirection::Right => ((cx - half_x, cy), (cx + half_x, cy)),
    };

    let clamp = |v: f32, max: f32| v.clamp(1.0, max - 1.0).round() as i32;
    (
        (clamp(from.0, w), clamp(from.1, h)),
        (clamp(to.0, w), clamp(to.1, h)),
    )
}

/// Raw device actions.
///
/// Lookups take a [`Selector`] and inspect a fresh hierarchy dump. All
/// methods are fallible; callers above this layer decide which failures are
/// misses and which mean the device is gone (see [`Driver::is_connected`]).
#[async_trait]
pub trait Driver: Send + Sync {
    /// Current UI hierarchy, flattened in document order.
    async fn dump(&self) -> Result<Vec<Element>>;

    async fn find_all(&self, selector: &Selector) -> Result<Vec<Element>> {
        let elements = self.dump().await?;
        Ok(elements
            .into_iter()
            .filter(|e| selector.matches(e))
            .collect())
    }

    async fn find_first(&self, selector: &Selector) -> Result<Option<Element>> {
        Ok(self.find_all(selector).await?.into_iter().next())
    }

    async fn exists(&self, selector: &Selector) -> Result<bool> {
        Ok(!self.find_all(selector).await?.is_empty())
    }

    /// Tap the centre of the first match. Returns `false` when nothing matched.
    async fn click(&self, selector: &Selector) -> Result<bool> {
        match self.find_first(selector).await? {
            Some(element) => {
                let (x, y) = element.bounds.center();
                self.tap(x, y).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn tap(&self, x: i32, y: i32) -> Result<()>;

    async fn swipe(&self, direction: SwipeDirection, scale: f32) -> Result<()> {
        let (w, h) = self.window_size().await?;
        let (from, to) = swipe_points(w, h, direction, scale);
        self.swipe_between(from, to, Duration::from_millis(300))
            .await
    }

    async fn swipe_between(
        &self,
        from: (i32, i32),
        to: (i32, i32),
        duration: Duration,
    ) -> Result<()>;

    async fn press(&self, key: Key) -> Result<()>;

    async fn screenshot(&self) -> Result<RgbImage>;

    async fn window_size(&self) -> Result<(u32, u32)>;

    async fn shell(&self, command: &str) -> Result<String>;

    /// Type into the focused input field.
    async fn send_keys(&self, text: &str) -> Result<()>;

    async fn app_start(&self, package: &str) -> Result<()>;

    async fn app_stop(&self, package: &str) -> Result<()>;

    /// Package owning the focused window, if any.
    async fn current_package(&self) -> Result<Option<String>>;

    /// Identity of the currently visible page, used to detect scroll ends.
    async fn hierarchy_signature(&self) -> Result<PageSignature> {
        let elements = self.dump().await?;
        Ok(PageSignature::of_elements(&elements))
    }

    /// Cheap liveness probe. Never errors; an unreachable device is `false`.
    async fn is_connected(&self) -> bool;

    async fn screen_on(&self) -> Result<()> {
        self.press(Key::Wakeup).await
    }
}
