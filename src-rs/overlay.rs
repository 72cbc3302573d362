//! Tap markers drawn onto checkpoint screenshots so the operator can see where
//! a calibrated point landed.

use std::path::Path;

use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{Rgba, RgbaImage};

use crate::error::MirrorResult;
use crate::geometry::RelPoint;
use crate::util::ensure_parent_dir;

const MARKER: Rgba<u8> = Rgba([255, 59, 48, 235]);
const LABEL_BG: Rgba<u8> = Rgba([0, 0, 0, 170]);
const LABEL_FG: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Marks `point` (fractions of the captured region) with a ring, a crosshair
/// and `label`, writing the result to `out`. `src` and `out` may be the same.
pub fn annotate_tap(src: &Path, out: &Path, point: RelPoint, label: &str) -> MirrorResult<()> {
    let mut img = image::open(src)?.to_rgba8();
    draw_tap_marker(&mut img, point, label);
    ensure_parent_dir(out)?;
    img.save(out)?;
    Ok(())
}

pub fn draw_tap_marker(img: &mut RgbaImage, point: RelPoint, label: &str) {
    let (w, h) = (img.width() as f64, img.height() as f64);
    if w < 1.0 || h < 1.0 {
        return;
    }
    let cx = point.x.clamp(0.0, 1.0) * (w - 1.0);
    let cy = point.y.clamp(0.0, 1.0) * (h - 1.0);
    let scale = (w.min(h) / 320.0).max(1.0);
    let radius = 14.0 * scale;
    let stroke = 2.0 * scale;

    draw_ring(img, cx, cy, radius, stroke, MARKER);
    let arm = radius * 1.6;
    draw_thick_line(img, cx - arm, cy, cx - radius * 0.4, cy, MARKER, stroke);
    draw_thick_line(img, cx + radius * 0.4, cy, cx + arm, cy, MARKER, stroke);
    draw_thick_line(img, cx, cy - arm, cx, cy - radius * 0.4, MARKER, stroke);
    draw_thick_line(img, cx, cy + radius * 0.4, cx, cy + arm, MARKER, stroke);
    draw_disc(img, cx, cy, stroke, MARKER);

    let text_scale = scale.round() as u32;
    let (tw, th) = text_size(label, text_scale);
    let pad = 3 * text_scale as i32;
    let mut tx = (cx + arm) as i32 + pad;
    let mut ty = (cy - arm) as i32 - th;
    if tx + tw + pad >= img.width() as i32 {
        tx = (cx - arm) as i32 - tw - pad;
    }
    if ty - pad < 0 {
        ty = (cy + arm) as i32 + pad;
    }
    tx = tx.max(pad);
    fill_rect_alpha(img, tx - pad, ty - pad, tx + tw + pad, ty + th + pad, LABEL_BG);
    draw_bitmap_text(img, tx, ty, label, LABEL_FG, text_scale);
}

fn blend_pixel(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let a = f64::from(src[3]) / 255.0;
    if a <= 0.0 {
        return dst;
    }
    let inv = 1.0 - a;
    let mix = |d: u8, s: u8| (f64::from(d) * inv + f64::from(s) * a).round().clamp(0.0, 255.0) as u8;
    let out_a = (f64::from(dst[3]) + f64::from(src[3]) * inv)
        .round()
        .clamp(0.0, 255.0) as u8;
    Rgba([mix(dst[0], src[0]), mix(dst[1], src[1]), mix(dst[2], src[2]), out_a])
}

fn put_blended(img: &mut RgbaImage, x: i32, y: i32, color: Rgba<u8>) {
    if x >= 0 && y >= 0 && x < img.width() as i32 && y < img.height() as i32 {
        let dst = *img.get_pixel(x as u32, y as u32);
        img.put_pixel(x as u32, y as u32, blend_pixel(dst, color));
    }
}

fn draw_disc(img: &mut RgbaImage, cx: f64, cy: f64, radius: f64, color: Rgba<u8>) {
    let r2 = radius * radius;
    for y in (cy - radius).floor() as i32..=(cy + radius).ceil() as i32 {
        for x in (cx - radius).floor() as i32..=(cx + radius).ceil() as i32 {
            let dx = f64::from(x) - cx;
            let dy = f64::from(y) - cy;
            if dx * dx + dy * dy <= r2 {
                put_blended(img, x, y, color);
            }
        }
    }
}

fn draw_ring(img: &mut RgbaImage, cx: f64, cy: f64, radius: f64, stroke: f64, color: Rgba<u8>) {
    let outer = radius + stroke / 2.0;
    let inner = (radius - stroke / 2.0).max(0.0);
    let (o2, i2) = (outer * outer, inner * inner);
    for y in (cy - outer).floor() as i32..=(cy + outer).ceil() as i32 {
        for x in (cx - outer).floor() as i32..=(cx + outer).ceil() as i32 {
            let dx = f64::from(x) - cx;
            let dy = f64::from(y) - cy;
            let d2 = dx * dx + dy * dy;
            if d2 <= o2 && d2 >= i2 {
                put_blended(img, x, y, color);
            }
        }
    }
}

fn draw_thick_line(img: &mut RgbaImage, x1: f64, y1: f64, x2: f64, y2: f64, color: Rgba<u8>, width: f64) {
    let dx = x2 - x1;
    let dy = y2 - y1;
    let steps = (dx * dx + dy * dy).sqrt().max(1.0).ceil() as i32;
    let radius = (width.max(1.0) / 2.0).max(0.6);
    for step in 0..=steps {
        let t = f64::from(step) / f64::from(steps);
        draw_disc(img, x1 + dx * t, y1 + dy * t, radius, color);
    }
}

fn text_size(text: &str, scale: u32) -> (i32, i32) {
    let scale = scale.max(1) as i32;
    (text.chars().count() as i32 * 8 * scale, 8 * scale)
}

fn fill_rect_alpha(img: &mut RgbaImage, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgba<u8>) {
    for y in y0.min(y1)..=y0.max(y1) {
        for x in x0.min(x1)..=x0.max(x1) {
            put_blended(img, x, y, color);
        }
    }
}

fn draw_bitmap_text(img: &mut RgbaImage, x: i32, y: i32, text: &str, color: Rgba<u8>, scale: u32) {
    let scale = scale.max(1) as i32;
    let mut cursor_x = x;
    for ch in text.chars() {
        let Some(glyph) = BASIC_FONTS.get(ch).or_else(|| BASIC_FONTS.get('?')) else {
            cursor_x += 8 * scale;
            continue;
        };
        for (row_idx, row) in glyph.iter().enumerate() {
            for col_idx in 0..8 {
                if (row >> col_idx) & 1 == 0 {
                    continue;
                }
                let px = cursor_x + col_idx * scale;
                let py = y + row_idx as i32 * scale;
                for sy in 0..scale {
                    for sx in 0..scale {
                        put_blended(img, px + sx, py + sy, color);
                    }
                }
            }
        }
        cursor_x += 8 * scale;
    }
}
