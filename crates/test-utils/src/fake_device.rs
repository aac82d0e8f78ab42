//! In-memory phone for driving `BotContext` in tests.
//!
//! The device shows one "page" of elements at a time. Swiping up moves to
//! the next page, swiping down to the previous one; swiping past either end
//! leaves the page unchanged, so the page signature stops changing exactly
//! like a real list that hit its boundary.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use image::RgbImage;

use dailybot::device::{Bounds, Driver, Element, Key, Selector, SwipeDirection};
use dailybot::errors::{BotError, Result};
use dailybot::vision::{ImageMatcher, TemplateMatch};

pub const SCREEN: (u32, u32) = (504, 955);

#[derive(Debug, Default)]
struct DeviceState {
    pages: Vec<Vec<Element>>,
    page: usize,
    /// Elements added to every dump after the first `n` dumps.
    late: Option<(u32, Vec<Element>)>,
    /// Swipes taken before each presence probe.
    probes: Vec<usize>,
    swipes: Vec<SwipeDirection>,
    taps: Vec<(i32, i32)>,
    keys: Vec<Key>,
    typed: Vec<String>,
    started: Vec<String>,
    stopped: Vec<String>,
    foreground: Option<String>,
}

#[derive(Debug)]
pub struct FakeDevice {
    state: Mutex<DeviceState>,
    connected: AtomicBool,
    dumps: AtomicU32,
}

impl FakeDevice {
    /// A device showing a single page.
    pub fn new(elements: Vec<Element>) -> Self {
        Self::with_pages(vec![elements])
    }

    /// A scrollable list; `pages[0]` is visible first.
    pub fn with_pages(pages: Vec<Vec<Element>>) -> Self {
        let pages = if pages.is_empty() { vec![Vec::new()] } else { pages };
        Self {
            state: Mutex::new(DeviceState {
                pages,
                ..Default::default()
            }),
            connected: AtomicBool::new(true),
            dumps: AtomicU32::new(0),
        }
    }

    /// Replace the pages and go back to the first one.
    pub fn set_pages(&self, pages: Vec<Vec<Element>>) {
        let mut st = self.state.lock().unwrap();
        st.pages = pages;
        st.page = 0;
    }

    /// Show page `page` without recording a swipe.
    pub fn jump_to(&self, page: usize) {
        let mut st = self.state.lock().unwrap();
        st.page = page.min(st.pages.len().saturating_sub(1));
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Make `elements` show up on whatever page is visible, starting with
    /// dump number `after + 1`.
    pub fn reveal_after(&self, after: u32, elements: Vec<Element>) {
        self.state.lock().unwrap().late = Some((after, elements));
    }

    /// For each `exists` lookup so far, how many swipes preceded it.
    pub fn probe_log(&self) -> Vec<usize> {
        self.state.lock().unwrap().probes.clone()
    }

    pub fn swipes(&self) -> Vec<SwipeDirection> {
        self.state.lock().unwrap().swipes.clone()
    }

    pub fn swipe_count(&self) -> usize {
        self.state.lock().unwrap().swipes.len()
    }

    pub fn taps(&self) -> Vec<(i32, i32)> {
        self.state.lock().unwrap().taps.clone()
    }

    pub fn keys(&self) -> Vec<Key> {
        self.state.lock().unwrap().keys.clone()
    }

    pub fn typed(&self) -> Vec<String> {
        self.state.lock().unwrap().typed.clone()
    }

    pub fn started(&self) -> Vec<String> {
        self.state.lock().unwrap().started.clone()
    }

    pub fn stopped(&self) -> Vec<String> {
        self.state.lock().unwrap().stopped.clone()
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BotError::Disconnected("fake device unplugged".to_string()))
        }
    }
}

/// Text element with a 200x40 box whose top-left corner is `(x, y)`.
pub fn text_at(text: &str, x: i32, y: i32) -> Element {
    Element::with_text(text, Bounds::new(x, y, x + 200, y + 40))
}

/// A task row: label on the left, optionally the completion marker on the
/// right of the same line.
pub fn row(label: &str, y: i32, done: bool) -> Vec<Element> {
    let mut out = vec![text_at(label, 40, y)];
    if done {
        out.push(text_at("已完成", 300, y));
    }
    out
}

#[async_trait]
impl Driver for FakeDevice {
    async fn dump(&self) -> Result<Vec<Element>> {
        self.ensure_connected()?;
        let n = self.dumps.fetch_add(1, Ordering::SeqCst) + 1;
        let st = self.state.lock().unwrap();
        let mut elements = st.pages.get(st.page).cloned().unwrap_or_default();
        match &st.late {
            Some((after, extra)) if n > *after => elements.extend(extra.iter().cloned()),
            _ => {}
        }
        Ok(elements)
    }

    async fn exists(&self, selector: &Selector) -> Result<bool> {
        let found = !self.find_all(selector).await?.is_empty();
        let mut st = self.state.lock().unwrap();
        let swiped = st.swipes.len();
        st.probes.push(swiped);
        Ok(found)
    }

    async fn tap(&self, x: i32, y: i32) -> Result<()> {
        self.ensure_connected()?;
        self.state.lock().unwrap().taps.push((x, y));
        Ok(())
    }

    async fn swipe(&self, direction: SwipeDirection, _scale: f32) -> Result<()> {
        self.ensure_connected()?;
        let mut st = self.state.lock().unwrap();
        st.swipes.push(direction);
        let last = st.pages.len().saturating_sub(1);
        match direction {
            SwipeDirection::Up => st.page = (st.page + 1).min(last),
            SwipeDirection::Down => st.page = st.page.saturating_sub(1),
            SwipeDirection::Left | SwipeDirection::Right => {}
        }
        Ok(())
    }

    async fn swipe_between(
        &self,
        _from: (i32, i32),
        _to: (i32, i32),
        _duration: Duration,
    ) -> Result<()> {
        self.ensure_connected()
    }

    async fn press(&self, key: Key) -> Result<()> {
        self.ensure_connected()?;
        self.state.lock().unwrap().keys.push(key);
        Ok(())
    }

    async fn screenshot(&self) -> Result<RgbImage> {
        self.ensure_connected()?;
        Ok(RgbImage::new(SCREEN.0, SCREEN.1))
    }

    async fn window_size(&self) -> Result<(u32, u32)> {
        self.ensure_connected()?;
        Ok(SCREEN)
    }

    async fn shell(&self, _command: &str) -> Result<String> {
        self.ensure_connected()?;
        Ok(String::new())
    }

    async fn send_keys(&self, text: &str) -> Result<()> {
        self.ensure_connected()?;
        self.state.lock().unwrap().typed.push(text.to_string());
        Ok(())
    }

    async fn app_start(&self, package: &str) -> Result<()> {
        self.ensure_connected()?;
        let mut st = self.state.lock().unwrap();
        st.started.push(package.to_string());
        st.foreground = Some(package.to_string());
        Ok(())
    }

    async fn app_stop(&self, package: &str) -> Result<()> {
        self.ensure_connected()?;
        let mut st = self.state.lock().unwrap();
        st.stopped.push(package.to_string());
        if st.foreground.as_deref() == Some(package) {
            st.foreground = None;
        }
        Ok(())
    }

    async fn current_package(&self) -> Result<Option<String>> {
        self.ensure_connected()?;
        Ok(self.state.lock().unwrap().foreground.clone())
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Matcher that "sees" a fixed set of templates, regardless of the pixels.
#[derive(Debug, Default)]
pub struct FakeMatcher {
    visible: Mutex<HashMap<String, Bounds>>,
}

impl FakeMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&self, template: &str, rect: Bounds) {
        self.visible
            .lock()
            .unwrap()
            .insert(template.to_string(), rect);
    }

    pub fn hide(&self, template: &str) {
        self.visible.lock().unwrap().remove(template);
    }
}

impl ImageMatcher for FakeMatcher {
    fn match_template(
        &self,
        _screen: &RgbImage,
        template: &str,
        threshold: f32,
        _ignore_color: bool,
    ) -> Result<TemplateMatch> {
        match self.visible.lock().unwrap().get(template) {
            Some(rect) => Ok(TemplateMatch {
                found: true,
                score: threshold.max(0.99),
                rect: Some(*rect),
            }),
            None => Ok(TemplateMatch::miss(0.1)),
        }
    }
}
