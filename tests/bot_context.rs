// tests/bot_context.rs

mod common;
use crate::common::builders::ContextBuilder;
use crate::common::{init_tracing, row, text_at, FakeDevice, FakeMatcher};

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use dailybot::bot::navigator::navigate_to_shared_surface;
use dailybot::device::{Bounds, Element, Key, Selector};
use dailybot::errors::BotError;
use dailybot::tasks::{ScriptedTask, Step, Task, TaskOutcome};

type TestResult = Result<(), Box<dyn Error>>;

fn editor() -> Element {
    Element {
        class_name: "android.widget.EditText".to_string(),
        bounds: Bounds::new(20, 200, 480, 400),
        ..Default::default()
    }
}

#[tokio::test]
async fn completed_row_short_circuits_script() -> TestResult {
    init_tracing();

    let device = Arc::new(FakeDevice::new(row("浏览空间", 300, true)));
    let ctx = ContextBuilder::new(Arc::clone(&device)).build();
    let task = ScriptedTask::new("浏览空间", "浏览空间").then(Step::pause_secs(3));

    assert_eq!(task.execute(&ctx).await?, TaskOutcome::AlreadyDone);
    assert!(device.taps().is_empty());
    Ok(())
}

#[tokio::test]
async fn open_row_is_tapped_and_script_runs() -> TestResult {
    init_tracing();

    let device = Arc::new(FakeDevice::new(row("浏览空间", 300, false)));
    let ctx = ContextBuilder::new(Arc::clone(&device)).build();
    let task = ScriptedTask::new("浏览空间", "浏览空间").then(Step::pause_secs(3));

    assert_eq!(task.execute(&ctx).await?, TaskOutcome::Completed);
    assert_eq!(device.taps(), vec![(140, 320)]);
    Ok(())
}

#[tokio::test]
async fn missing_required_step_fails_the_task() -> TestResult {
    init_tracing();

    let device = Arc::new(FakeDevice::new(row("日签打卡", 300, false)));
    let ctx = ContextBuilder::new(device).build();
    let task = ScriptedTask::new("日签打卡", "日签打卡").require(Step::click(Selector::text("领取")));

    assert_eq!(task.execute(&ctx).await?, TaskOutcome::Failed);
    Ok(())
}

#[tokio::test]
async fn absent_row_fails_without_error() -> TestResult {
    init_tracing();

    let device = Arc::new(FakeDevice::new(Vec::new()));
    let ctx = ContextBuilder::new(device).max_swipes(3).build();
    let task = ScriptedTask::new("金币加速", "金币加速");

    assert_eq!(task.execute(&ctx).await?, TaskOutcome::Failed);
    Ok(())
}

#[tokio::test]
async fn stop_signal_surfaces_as_error() {
    init_tracing();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let device = Arc::new(FakeDevice::new(row("金币加速", 300, false)));
    let ctx = ContextBuilder::new(device).cancel(cancel).build();
    let task = ScriptedTask::new("金币加速", "金币加速");

    let err = task.execute(&ctx).await.unwrap_err();
    assert!(matches!(err, BotError::Stopped));
}

#[tokio::test]
async fn click_element_waits_for_any_variant() -> TestResult {
    init_tracing();

    let device = Arc::new(FakeDevice::new(vec![Element::with_text(
        "去完成",
        Bounds::new(300, 500, 400, 540),
    )]));
    let ctx = ContextBuilder::new(Arc::clone(&device)).build();

    let variants = [Selector::text("领取"), Selector::text("去完成")];
    assert!(ctx.click_element(&variants, Duration::from_secs(5)).await?);
    assert_eq!(device.taps(), vec![(350, 520)]);

    assert!(!ctx
        .click_element(&[Selector::text("不存在")], Duration::from_secs(5))
        .await?);
    assert_eq!(device.taps().len(), 1);
    Ok(())
}

#[tokio::test]
async fn publish_types_content_and_clicks_icon() -> TestResult {
    init_tracing();

    let device = Arc::new(FakeDevice::new(vec![editor()]));
    let matcher = Arc::new(FakeMatcher::new());
    matcher.show("发表.png", Bounds::new(400, 50, 480, 90));
    let ctx = ContextBuilder::new(Arc::clone(&device))
        .matcher(Arc::clone(&matcher))
        .build();

    assert!(ctx.publish_comment("早上好").await?);
    assert_eq!(device.typed(), vec!["早上好".to_string()]);
    assert_eq!(device.taps(), vec![(250, 300), (440, 70)]);
    Ok(())
}

#[tokio::test]
async fn publish_falls_back_to_corner_tap() -> TestResult {
    init_tracing();

    let device = Arc::new(FakeDevice::new(Vec::new()));
    let ctx = ContextBuilder::new(Arc::clone(&device)).build();

    assert!(ctx.publish_comment("x").await?);
    assert!(device.typed().is_empty());
    assert_eq!(device.taps(), vec![(454, 100)]);
    Ok(())
}

#[tokio::test]
async fn navigation_is_a_no_op_on_the_surface() -> TestResult {
    init_tracing();

    let device = Arc::new(FakeDevice::new(row("额外活跃", 80, false)));
    let ctx = ContextBuilder::new(Arc::clone(&device)).build();

    assert!(navigate_to_shared_surface(&ctx, &[]).await?);
    assert!(device.taps().is_empty());
    Ok(())
}

#[tokio::test]
async fn navigation_gives_up_after_three_side_panel_attempts() -> TestResult {
    init_tracing();

    let device = Arc::new(FakeDevice::new(Vec::new()));
    let ctx = ContextBuilder::new(Arc::clone(&device)).build();

    assert!(!navigate_to_shared_surface(&ctx, &["QQ空间".to_string()]).await?);
    assert_eq!(device.taps(), vec![(50, 100); 3]);
    Ok(())
}

#[tokio::test]
async fn surface_title_is_awaited_even_when_template_misses() -> TestResult {
    init_tracing();

    let avatar = Element {
        resource_id: "com.tencent.mobileqq:id/conversation_head".to_string(),
        bounds: Bounds::new(10, 60, 90, 140),
        ..Default::default()
    };
    let device = Arc::new(FakeDevice::new(vec![
        avatar,
        text_at("LV12", 40, 300),
        text_at("更多任务", 40, 600),
    ]));
    // The surface loads in the background once navigation is under way.
    device.reveal_after(1, vec![text_at("额外活跃", 40, 80)]);
    let ctx = ContextBuilder::new(Arc::clone(&device)).build();

    assert!(navigate_to_shared_surface(&ctx, &[]).await?);
    assert!(!device.keys().contains(&Key::Back));
    Ok(())
}

#[tokio::test]
async fn dead_device_aborts_navigation() {
    init_tracing();

    let device = Arc::new(FakeDevice::new(Vec::new()));
    device.disconnect();
    let ctx = ContextBuilder::new(device).build();

    let err = navigate_to_shared_surface(&ctx, &[]).await.unwrap_err();
    assert!(matches!(err, BotError::Disconnected(_)));
}
