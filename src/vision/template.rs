// src/vision/template.rs

//! Multi-scale template matching.
//!
//! Grayscale normalised cross-correlation (zero-mean, like OpenCV's
//! `TM_CCOEFF_NORMED`) over a range of template scales. Each scale is searched
//! coarse-to-fine: a box-downsampled pass over the whole screen, then a
//! full-resolution pass around the best coarse hit.
//!
//! A correlation hit is confirmed by comparing mean colours, so a grey
//! "disabled" rendering of a button does not match its coloured template.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use image::imageops::FilterType;
use image::RgbImage;
use tracing::{debug, trace};

use crate::device::Bounds;
use crate::errors::{BotError, Result};
use crate::vision::color::{color_distance, mean_rgb, mean_rgb_all};
use crate::vision::{ImageMatcher, TemplateMatch};

/// Mean colour distance above which a correlation hit is rejected.
pub const MAX_COLOR_DISTANCE: f32 = 65.0;

const MIN_SCALE: f32 = 0.6;
const MAX_SCALE: f32 = 1.4;
const SCALE_STEPS: usize = 20;
const MIN_TEMPLATE_SIDE: u32 = 4;

/// Template matcher reading `<assets_dir>/<name>` PNG files.
#[derive(Debug)]
pub struct TemplateMatcher {
    assets_dir: PathBuf,
    cache: Mutex<HashMap<String, Arc<RgbImage>>>,
}

impl TemplateMatcher {
    pub fn new(assets_dir: impl Into<PathBuf>) -> Self {
        Self {
            assets_dir: assets_dir.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Register an in-memory template under `name`.
    pub fn insert(&self, name: impl Into<String>, template: RgbImage) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(name.into(), Arc::new(template));
        }
    }

    fn load(&self, name: &str) -> Result<Arc<RgbImage>> {
        if let Some(hit) = self
            .cache
            .lock()
            .ok()
            .and_then(|c| c.get(name).cloned())
        {
            return Ok(hit);
        }

        let path = self.assets_dir.join(name);
        let img = image::open(&path)
            .map_err(|e| {
                BotError::ConfigError(format!("template '{}' unreadable: {e}", path.display()))
            })?
            .to_rgb8();
        let img = Arc::new(img);
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(name.to_string(), Arc::clone(&img));
        }
        Ok(img)
    }
}

impl ImageMatcher for TemplateMatcher {
    fn match_template(
        &self,
        screen: &RgbImage,
        template: &str,
        threshold: f32,
        ignore_color: bool,
    ) -> Result<TemplateMatch> {
        let tmpl = self.load(template)?;
        let result = locate(screen, &tmpl, threshold, ignore_color);
        debug!(
            template,
            score = result.score,
            found = result.found,
            "template match"
        );
        Ok(result)
    }
}

/// Template scales to try. Always contains `1.0`.
pub fn scales() -> Vec<f32> {
    let step = (MAX_SCALE - MIN_SCALE) / (SCALE_STEPS - 1) as f32;
    let mut out: Vec<f32> = (0..SCALE_STEPS)
        .map(|i| MIN_SCALE + step * i as f32)
        .collect();
    out.push(1.0);
    out.sort_by(|a, b| a.total_cmp(b));
    out.dedup_by(|a, b| (*a - *b).abs() < 1e-4);
    out
}

/// Find `template` in `screen`.
pub fn locate(
    screen: &RgbImage,
    template: &RgbImage,
    threshold: f32,
    ignore_color: bool,
) -> TemplateMatch {
    let screen_gray = Gray::from_rgb(screen);
    let pyramid = Pyramid::new(screen_gray);

    let mut best: Option<(f32, u32, u32, RgbImage)> = None;

    for scale in scales() {
        let tw = (template.width() as f32 * scale).round() as u32;
        let th = (template.height() as f32 * scale).round() as u32;
        if tw < MIN_TEMPLATE_SIDE
            || th < MIN_TEMPLATE_SIDE
            || tw > screen.width()
            || th > screen.height()
        {
            continue;
        }

        let scaled = if tw == template.width() && th == template.height() {
            template.clone()
        } else {
            image::imageops::resize(template, tw, th, FilterType::Triangle)
        };
        let tgray = Gray::from_rgb(&scaled);

        if let Some((score, x, y)) = pyramid.search(&tgray) {
            trace!(scale, score, x, y, "scale candidate");
            if best.as_ref().map_or(true, |b| score > b.0) {
                best = Some((score, x, y, scaled));
            }
        }
    }

    let Some((score, x, y, scaled)) = best else {
        return TemplateMatch::miss(0.0);
    };

    let rect = Bounds::new(
        x as i32,
        y as i32,
        (x + scaled.width()) as i32,
        (y + scaled.height()) as i32,
    );

    let mut found = score >= threshold;
    if found && !ignore_color {
        if let (Some(a), Some(b)) = (mean_rgb_all(&scaled), mean_rgb(screen, rect)) {
            let dist = color_distance(a, b);
            if dist > MAX_COLOR_DISTANCE {
                debug!(score, color_distance = dist, "shape matched but colour differs");
                found = false;
            }
        }
    }

    TemplateMatch {
        found,
        score,
        rect: Some(rect),
    }
}

/// Single-channel float image with summed-area tables.
#[derive(Debug, Clone)]
struct Gray {
    width: u32,
    height: u32,
    data: Vec<f32>,
    sum: Vec<f64>,
    sq_sum: Vec<f64>,
}

impl Gray {
    fn from_rgb(img: &RgbImage) -> Self {
        let data = img
            .pixels()
            .map(|p| {
                let [r, g, b] = p.0;
                0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b)
            })
            .collect();
        Self::from_data(img.width(), img.height(), data)
    }

    fn from_data(width: u32, height: u32, data: Vec<f32>) -> Self {
        let (w, h) = (width as usize, height as usize);
        let stride = w + 1;
        let mut sum = vec![0f64; stride * (h + 1)];
        let mut sq_sum = vec![0f64; stride * (h + 1)];
        for y in 0..h {
            let mut row = 0f64;
            let mut row_sq = 0f64;
            for x in 0..w {
                let v = f64::from(data[y * w + x]);
                row += v;
                row_sq += v * v;
                sum[(y + 1) * stride + x + 1] = sum[y * stride + x + 1] + row;
                sq_sum[(y + 1) * stride + x + 1] = sq_sum[y * stride + x + 1] + row_sq;
            }
        }
        Self {
            width,
            height,
            data,
            sum,
            sq_sum,
        }
    }

    /// Box-average by an integer factor.
    fn downsample(&self, k: u32) -> Self {
        let w = (self.width / k).max(1);
        let h = (self.height / k).max(1);
        let mut data = Vec::with_capacity((w * h) as usize);
        let area = (k * k) as f32;
        for y in 0..h {
            for x in 0..w {
                let mut acc = 0f32;
                for dy in 0..k {
                    for dx in 0..k {
                        let sx = (x * k + dx).min(self.width - 1);
                        let sy = (y * k + dy).min(self.height - 1);
                        acc += self.at(sx, sy);
                    }
                }
                data.push(acc / area);
            }
        }
        Self::from_data(w, h, data)
    }

    fn at(&self, x: u32, y: u32) -> f32 {
        self.data[(y * self.width + x) as usize]
    }

    fn window_sums(&self, x: u32, y: u32, w: u32, h: u32) -> (f64, f64) {
        let stride = (self.width + 1) as usize;
        let (x0, y0) = (x as usize, y as usize);
        let (x1, y1) = ((x + w) as usize, (y + h) as usize);
        let rect = |t: &[f64]| t[y1 * stride + x1] - t[y0 * stride + x1] - t[y1 * stride + x0] + t[y0 * stride + x0];
        (rect(&self.sum), rect(&self.sq_sum))
    }
}

/// Zero-mean template plus its energy.
struct PreparedTemplate<'a> {
    gray: &'a Gray,
    centered: Vec<f32>,
    energy: f64,
}

impl<'a> PreparedTemplate<'a> {
    fn new(gray: &'a Gray) -> Self {
        let n = gray.data.len() as f32;
        let mean = gray.data.iter().sum::<f32>() / n;
        let centered: Vec<f32> = gray.data.iter().map(|v| v - mean).collect();
        let energy = centered.iter().map(|v| f64::from(v * v)).sum();
        Self {
            gray,
            centered,
            energy,
        }
    }

    fn ncc_at(&self, screen: &Gray, x: u32, y: u32) -> f32 {
        let (tw, th) = (self.gray.width, self.gray.height);
        let n = f64::from(tw * th);
        let (s, sq) = screen.window_sums(x, y, tw, th);
        let variance = sq - s * s / n;
        if self.energy <= f64::EPSILON || variance <= 1e-6 {
            return 0.0;
        }

        let mut cross = 0f64;
        for ty in 0..th {
            let srow = ((y + ty) * screen.width + x) as usize;
            let trow = (ty * tw) as usize;
            for tx in 0..tw as usize {
                cross += f64::from(screen.data[srow + tx] * self.centered[trow + tx]);
            }
        }
        (cross / (self.energy * variance).sqrt()) as f32
    }

    /// Best position over `xs` × `ys`.
    fn best_in(
        &self,
        screen: &Gray,
        xs: std::ops::RangeInclusive<u32>,
        ys: std::ops::RangeInclusive<u32>,
    ) -> Option<(f32, u32, u32)> {
        let mut best: Option<(f32, u32, u32)> = None;
        for y in ys {
            for x in xs.clone() {
                let score = self.ncc_at(screen, x, y);
                if best.map_or(true, |b| score > b.0) {
                    best = Some((score, x, y));
                }
            }
        }
        best
    }
}

/// Screen at full resolution plus box-downsampled copies.
struct Pyramid {
    levels: Vec<(u32, Gray)>,
}

impl Pyramid {
    fn new(full: Gray) -> Self {
        let half = full.downsample(2);
        let quarter = full.downsample(4);
        Self {
            levels: vec![(1, full), (2, half), (4, quarter)],
        }
    }

    fn level(&self, k: u32) -> &Gray {
        self.levels
            .iter()
            .find(|(f, _)| *f == k)
            .map(|(_, g)| g)
            .unwrap_or(&self.levels[0].1)
    }

    /// Coarse factor that keeps the reduced template at least 8 px per side.
    fn factor_for(template: &Gray) -> u32 {
        let side = template.width.min(template.height);
        [4, 2]
            .into_iter()
            .find(|k| side / k >= 8)
            .unwrap_or(1)
    }

    fn search(&self, template: &Gray) -> Option<(f32, u32, u32)> {
        let full = self.level(1);
        if template.width > full.width || template.height > full.height {
            return None;
        }
        let max_x = full.width - template.width;
        let max_y = full.height - template.height;

        let k = Self::factor_for(template);
        if k == 1 {
            return PreparedTemplate::new(template).best_in(full, 0..=max_x, 0..=max_y);
        }

        let coarse_screen = self.level(k);
        let coarse_tmpl = template.downsample(k);
        if coarse_tmpl.width > coarse_screen.width || coarse_tmpl.height > coarse_screen.height {
            return None;
        }
        let (_, cx, cy) = PreparedTemplate::new(&coarse_tmpl).best_in(
            coarse_screen,
            0..=coarse_screen.width - coarse_tmpl.width,
            0..=coarse_screen.height - coarse_tmpl.height,
        )?;

        let radius = 2 * k;
        let (fx, fy) = (cx * k, cy * k);
        let xs = fx.saturating_sub(radius)..=(fx + radius).min(max_x);
        let ys = fy.saturating_sub(radius)..=(fy + radius).min(max_y);
        PreparedTemplate::new(template).best_in(full, xs, ys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// 8x8 blocks of pseudo-random colours: survives small rescaling.
    fn blocky(width: u32, height: u32, seed: u32) -> RgbImage {
        let mut state = seed.wrapping_mul(2_654_435_761).max(1);
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state % 150) as u8
        };
        let bw = width.div_ceil(8);
        let bh = height.div_ceil(8);
        let colors: Vec<[u8; 3]> = (0..bw * bh).map(|_| [next(), next(), next()]).collect();
        RgbImage::from_fn(width, height, |x, y| Rgb(colors[((y / 8) * bw + x / 8) as usize]))
    }

    fn paste(screen: &mut RgbImage, tmpl: &RgbImage, ox: u32, oy: u32) {
        for (x, y, p) in tmpl.enumerate_pixels() {
            screen.put_pixel(ox + x, oy + y, *p);
        }
    }

    #[test]
    fn scales_cover_range_and_include_identity() {
        let s = scales();
        assert_eq!(s.len(), SCALE_STEPS + 1);
        assert!((s[0] - 0.6).abs() < 1e-6);
        assert!((s[s.len() - 1] - 1.4).abs() < 1e-5);
        assert!(s.iter().any(|v| (*v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn finds_pasted_template() {
        let tmpl = blocky(48, 32, 7);
        let mut screen = blocky(200, 160, 99);
        paste(&mut screen, &tmpl, 64, 96);

        let m = locate(&screen, &tmpl, 0.8, false);
        assert!(m.found, "score {}", m.score);
        assert!(m.score > 0.95);
        let rect = m.rect.unwrap();
        assert_eq!((rect.left, rect.top), (64, 96));
    }

    #[test]
    fn absent_template_is_not_found() {
        let tmpl = blocky(48, 32, 7);
        let screen = blocky(200, 160, 1234);
        let m = locate(&screen, &tmpl, 0.9, false);
        assert!(!m.found);
    }

    #[test]
    fn colour_shift_is_rejected_unless_ignored() {
        let tmpl = blocky(48, 32, 7);
        let shifted = RgbImage::from_fn(48, 32, |x, y| {
            let [r, g, b] = tmpl.get_pixel(x, y).0;
            Rgb([r, g, b.saturating_add(100)])
        });
        let mut screen = RgbImage::from_pixel(160, 120, Rgb([0, 0, 0]));
        paste(&mut screen, &shifted, 40, 40);

        let strict = locate(&screen, &tmpl, 0.6, false);
        assert!(!strict.found);

        let loose = locate(&screen, &tmpl, 0.6, true);
        assert!(loose.found, "score {}", loose.score);
    }

    #[test]
    fn oversized_template_is_a_miss() {
        let tmpl = blocky(300, 300, 3);
        let screen = blocky(100, 100, 4);
        let m = locate(&screen, &tmpl, 0.5, true);
        assert!(!m.found);
    }

    #[test]
    fn matcher_uses_registered_templates() {
        let matcher = TemplateMatcher::new("does-not-exist");
        let tmpl = blocky(40, 40, 11);
        let mut screen = blocky(160, 160, 12);
        paste(&mut screen, &tmpl, 16, 24);
        matcher.insert("button.png", tmpl);

        let m = matcher
            .match_template(&screen, "button.png", 0.8, false)
            .unwrap();
        assert!(m.found);

        assert!(matcher.match_template(&screen, "missing.png", 0.8, false).is_err());
    }
}
