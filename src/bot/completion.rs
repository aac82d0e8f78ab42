// src/bot/completion.rs

//! Per-row "already done" detection on the shared task surface.
//!
//! A task row shows its label on the left and, once the day's reward has
//! been collected, a completion marker on the right of the same row.

use tracing::debug;

use crate::bot::context::BotContext;
use crate::device::{Bounds, Selector};
use crate::errors::Result;

pub const COMPLETION_MARKER: &str = "已完成";

/// Max vertical distance between label and marker centres.
const ROW_TOLERANCE: f64 = 60.0;
/// The marker may start slightly left of the label's right edge.
const LEFT_SLACK: i32 = 50;

/// Does a marker at `marker` belong to the row whose label sits at `label`?
pub fn marker_in_row(label: Bounds, marker: Bounds) -> bool {
    let dy = (label.center_y() - marker.center_y()).abs();
    dy < ROW_TOLERANCE && marker.left >= label.right - LEFT_SLACK
}

/// Check whether the visible row for `label` carries the completion marker.
///
/// Returns `false` when the label is not on screen.
pub async fn is_completed(ctx: &BotContext, label: &str) -> Result<bool> {
    let Some(row) = ctx.find_first(&Selector::text_contains(label)).await? else {
        return Ok(false);
    };

    let markers = ctx.find_all(&Selector::text(COMPLETION_MARKER)).await?;
    let done = markers.iter().any(|m| marker_in_row(row.bounds, m.bounds));
    debug!(label, done, markers = markers.len(), "completion check");
    Ok(done)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label() -> Bounds {
        Bounds::new(40, 500, 240, 540)
    }

    #[test]
    fn marker_on_same_row_counts() {
        // centre y 520 vs 579 -> dy 59
        let marker = Bounds::new(230, 559, 330, 599);
        assert!(marker_in_row(label(), marker));
    }

    #[test]
    fn marker_on_next_row_is_ignored() {
        // dy 61
        let marker = Bounds::new(230, 561, 330, 601);
        assert!(!marker_in_row(label(), marker));
    }

    #[test]
    fn marker_left_of_label_is_ignored() {
        let marker = Bounds::new(180, 500, 280, 540);
        assert!(!marker_in_row(label(), marker));
    }

    #[test]
    fn marker_within_slack_counts() {
        let marker = Bounds::new(190, 500, 290, 540);
        assert!(marker_in_row(label(), marker));
    }
}
