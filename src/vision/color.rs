// src/vision/color.rs

use image::RgbImage;

use crate::device::Bounds;

/// Mean `[r, g, b]` of the part of `bounds` that lies inside `img`.
pub fn mean_rgb(img: &RgbImage, bounds: Bounds) -> Option<[f32; 3]> {
    let left = bounds.left.max(0) as u32;
    let top = bounds.top.max(0) as u32;
    let right = (bounds.right.max(0) as u32).min(img.width());
    let bottom = (bounds.bottom.max(0) as u32).min(img.height());
    if right <= left || bottom <= top {
        return None;
    }

    let mut sum = [0f64; 3];
    for y in top..bottom {
        for x in left..right {
            let p = img.get_pixel(x, y).0;
            sum[0] += f64::from(p[0]);
            sum[1] += f64::from(p[1]);
            sum[2] += f64::from(p[2]);
        }
    }
    let n = f64::from((right - left) * (bottom - top));
    Some([
        (sum[0] / n) as f32,
        (sum[1] / n) as f32,
        (sum[2] / n) as f32,
    ])
}

/// Mean colour of a whole image.
pub fn mean_rgb_all(img: &RgbImage) -> Option<[f32; 3]> {
    mean_rgb(
        img,
        Bounds::new(0, 0, img.width() as i32, img.height() as i32),
    )
}

pub fn color_distance(a: [f32; 3], b: [f32; 3]) -> f32 {
    let d: f32 = a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum();
    d.sqrt()
}

/// A saturated, bright blue: the enabled state of primary buttons.
///
/// Disabled buttons are dark blue (low B), waiting buttons are pale blue
/// (high G).
pub fn is_active_blue([r, g, b]: [f32; 3]) -> bool {
    b > 150.0 && b - r > 60.0 && b - g > 60.0
}
