// src/vision/mod.rs

//! Screenshot analysis.
//!
//! - [`template`] finds PNG templates in screenshots (multi-scale NCC with a
//!   colour confirmation).
//! - [`color`] has the mean-colour helpers used for button state checks.

pub mod color;
pub mod template;

use image::RgbImage;

use crate::device::Bounds;
use crate::errors::Result;

pub use template::TemplateMatcher;

/// Outcome of one template search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemplateMatch {
    /// Score passed the threshold and the colour check (when enabled).
    pub found: bool,
    /// Best normalised correlation seen, even when not `found`.
    pub score: f32,
    /// Location of the best candidate in screenshot pixels.
    pub rect: Option<Bounds>,
}

impl TemplateMatch {
    pub fn miss(score: f32) -> Self {
        Self {
            found: false,
            score,
            rect: None,
        }
    }
}

/// Locates named templates inside a screenshot.
pub trait ImageMatcher: Send + Sync {
    fn match_template(
        &self,
        screen: &RgbImage,
        template: &str,
        threshold: f32,
        ignore_color: bool,
    ) -> Result<TemplateMatch>;
}
