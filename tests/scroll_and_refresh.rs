// tests/scroll_and_refresh.rs

mod common;
use crate::common::builders::ContextBuilder;
use crate::common::{init_tracing, row, text_at, FakeDevice, RecordingSink};

use std::error::Error;
use std::sync::Arc;

use dailybot::bot::completion::is_completed;
use dailybot::bot::scroll::{scroll_and_check_completed, scroll_and_find};
use dailybot::device::{Selector, SwipeDirection};
use dailybot::sched::scan_progress;
use dailybot::types::TaskStatus;

type TestResult = Result<(), Box<dyn Error>>;

fn filler(page: usize) -> Vec<dailybot::device::Element> {
    vec![text_at(&format!("filler {page}"), 40, 50)]
}

#[tokio::test]
async fn finds_target_after_three_forward_swipes() -> TestResult {
    init_tracing();

    let mut pages: Vec<_> = (0..3).map(filler).collect();
    let mut last = filler(3);
    last.push(text_at("目标", 40, 400));
    pages.push(last);
    pages.push(filler(4));

    let device = Arc::new(FakeDevice::with_pages(pages));
    let ctx = ContextBuilder::new(Arc::clone(&device)).build();

    assert!(scroll_and_find(&ctx, &Selector::text("目标"), 10).await?);
    assert_eq!(device.swipes(), vec![SwipeDirection::Up; 3]);
    Ok(())
}

#[tokio::test]
async fn frozen_page_ends_each_pass_early() -> TestResult {
    init_tracing();

    // Signature stops changing after two swipes.
    let pages: Vec<_> = (0..3).map(filler).collect();
    let device = Arc::new(FakeDevice::with_pages(pages));
    let ctx = ContextBuilder::new(Arc::clone(&device)).build();

    assert!(!scroll_and_find(&ctx, &Selector::text("目标"), 10).await?);

    let swipes = device.swipes();
    let up = swipes.iter().filter(|d| **d == SwipeDirection::Up).count();
    let down = swipes.iter().filter(|d| **d == SwipeDirection::Down).count();
    assert_eq!(up, 3, "two moving swipes and one repeat");
    assert_eq!(down, 3, "reverse pass walks back to the top and stops");

    // Lookups made before the reverse pass began.
    let forward: Vec<usize> = device
        .probe_log()
        .into_iter()
        .filter(|swiped| *swiped <= up)
        .collect();
    assert_eq!(forward, vec![0, 1, 2]);
    assert!(forward.len() <= 4);
    Ok(())
}

#[tokio::test]
async fn target_above_origin_is_found_by_reverse_pass() -> TestResult {
    init_tracing();

    let mut first = filler(0);
    first.push(text_at("目标", 40, 400));
    let device = Arc::new(FakeDevice::with_pages(vec![first, filler(1), filler(2)]));
    device.jump_to(2);
    let ctx = ContextBuilder::new(Arc::clone(&device)).build();

    assert!(scroll_and_find(&ctx, &Selector::text("目标"), 2).await?);
    assert_eq!(
        device.swipes(),
        vec![SwipeDirection::Up, SwipeDirection::Down, SwipeDirection::Down]
    );
    Ok(())
}

#[tokio::test]
async fn check_completed_stops_at_first_sighting() -> TestResult {
    init_tracing();

    let mut page1 = filler(1);
    page1.extend(row("浏览空间", 300, false));
    let pages = vec![filler(0), page1, row("浏览空间", 300, true)];
    let device = Arc::new(FakeDevice::with_pages(pages));
    let ctx = ContextBuilder::new(Arc::clone(&device)).build();

    assert!(!scroll_and_check_completed(&ctx, "浏览空间", 10).await?);
    assert_eq!(device.swipe_count(), 1);
    Ok(())
}

#[tokio::test]
async fn check_completed_spends_at_most_max_swipes() -> TestResult {
    init_tracing();

    let pages: Vec<_> = (0..30).map(filler).collect();
    let device = Arc::new(FakeDevice::with_pages(pages));
    let ctx = ContextBuilder::new(Arc::clone(&device)).build();

    assert!(!scroll_and_check_completed(&ctx, "浏览空间", 10).await?);
    assert_eq!(device.swipe_count(), 10);
    // The page reached by the last swipe is still checked.
    assert_eq!(device.probe_log().last(), Some(&10));
    Ok(())
}

#[tokio::test]
async fn completion_requires_marker_on_the_same_row() -> TestResult {
    init_tracing();

    let mut page = row("发布说说", 300, false);
    page.push(text_at("已完成", 300, 400));
    let device = Arc::new(FakeDevice::new(page));
    let ctx = ContextBuilder::new(Arc::clone(&device)).build();
    assert!(!is_completed(&ctx, "发布说说").await?);

    device.set_pages(vec![row("发布说说", 300, true)]);
    assert!(is_completed(&ctx, "发布说说").await?);

    device.set_pages(vec![Vec::new()]);
    assert!(!is_completed(&ctx, "发布说说").await?);
    Ok(())
}

#[tokio::test]
async fn refresh_scan_resolves_twelve_rows_over_two_pages() -> TestResult {
    init_tracing();

    let entries: Vec<(String, String)> = (0..12)
        .map(|i| (format!("task{i}"), format!("label{i:02}")))
        .collect();

    let page = |range: std::ops::Range<usize>| {
        let mut out = Vec::new();
        for (slot, i) in range.enumerate() {
            out.extend(row(&format!("label{i:02}"), 100 + slot as i32 * 100, i % 2 == 0));
        }
        out
    };
    let device = Arc::new(FakeDevice::with_pages(vec![page(0..5), page(5..12)]));
    let ctx = ContextBuilder::new(Arc::clone(&device)).build();
    let sink = RecordingSink::new();

    let missing = scan_progress(&ctx, &entries, 15, sink.as_ref()).await?;

    assert!(missing.is_empty());
    assert!(device.swipe_count() <= 2);
    for (i, (task, _)) in entries.iter().enumerate() {
        let expected = if i % 2 == 0 {
            TaskStatus::Success
        } else {
            TaskStatus::Pending
        };
        assert_eq!(sink.last_status(task), Some(expected), "{task}");
    }
    Ok(())
}

#[tokio::test]
async fn refresh_scan_leaves_unseen_rows_pending_at_bottom() -> TestResult {
    init_tracing();

    let entries = vec![
        ("seen".to_string(), "label seen".to_string()),
        ("gone".to_string(), "label gone".to_string()),
    ];
    let device = Arc::new(FakeDevice::with_pages(vec![
        filler(0),
        row("label seen", 200, true),
    ]));
    let ctx = ContextBuilder::new(Arc::clone(&device)).build();
    let sink = RecordingSink::new();

    let missing = scan_progress(&ctx, &entries, 15, sink.as_ref()).await?;

    assert_eq!(missing, vec!["gone".to_string()]);
    assert_eq!(sink.last_status("seen"), Some(TaskStatus::Success));
    assert_eq!(sink.last_status("gone"), None);
    assert!(device.swipe_count() < 15);
    Ok(())
}
