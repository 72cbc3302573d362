//! Window-relative coordinate math.
//!
//! Interaction points are stored as fractions of the content region because the
//! mirror window moves between runs (and sometimes during one). Absolute pixels
//! are derived on demand and never persisted as the source of truth.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{MirrorError, MirrorResult};

static SIGNED_DECIMAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)$").expect("static regex"));

/// Screen rectangle of the mirror host window, as reported by the window manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowBounds {
    pub x1: i64,
    pub y1: i64,
    pub x2: i64,
    pub y2: i64,
}

impl WindowBounds {
    pub fn from_origin_size(x: i64, y: i64, w: i64, h: i64) -> Self {
        Self {
            x1: x,
            y1: y,
            x2: x.saturating_add(w),
            y2: y.saturating_add(h),
        }
    }

    pub fn validate(&self) -> MirrorResult<()> {
        if self.x2 <= self.x1 || self.y2 <= self.y1 {
            return Err(MirrorError::InvalidBounds {
                bounds: *self,
                reason: "x2/y2 must be greater than x1/y1".to_string(),
            });
        }
        Ok(())
    }
}

/// Fixed chrome around the device pixels; the top inset covers the title bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insets {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl Default for Insets {
    fn default() -> Self {
        Self {
            left: 10,
            top: 48,
            right: 10,
            bottom: 10,
        }
    }
}

/// Content rectangle: the part of the mirror window that shows device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl Region {
    pub fn validate(&self) -> MirrorResult<()> {
        if self.width <= 0 || self.height <= 0 {
            return Err(MirrorError::DegenerateRegion(*self));
        }
        Ok(())
    }
}

/// A point as fractions of a region. Values outside 0..1 are representable so
/// that callers can report them; `is_within_unit` decides acceptability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelPoint {
    pub x: f64,
    pub y: f64,
}

impl RelPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_within_unit(&self) -> bool {
        (0.0..=1.0).contains(&self.x) && (0.0..=1.0).contains(&self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbsPoint {
    pub x: i64,
    pub y: i64,
}

impl AbsPoint {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

/// Shrinks window bounds by the insets and applies the integer display scale.
pub fn content_region_from(bounds: WindowBounds, insets: Insets, scale: u32) -> MirrorResult<Region> {
    bounds.validate()?;
    if scale == 0 {
        return Err(MirrorError::InvalidBounds {
            bounds,
            reason: "display scale must be at least 1".to_string(),
        });
    }
    let scale = i64::from(scale);
    let width = (bounds.x2 - bounds.x1 - insets.left - insets.right) * scale;
    let height = (bounds.y2 - bounds.y1 - insets.top - insets.bottom) * scale;
    if width <= 0 || height <= 0 {
        return Err(MirrorError::InvalidBounds {
            bounds,
            reason: format!("insets {insets:?} leave no content area ({width}x{height})"),
        });
    }
    Ok(Region {
        x: (bounds.x1 + insets.left) * scale,
        y: (bounds.y1 + insets.top) * scale,
        width,
        height,
    })
}

pub fn to_absolute(rel: RelPoint, region: &Region) -> MirrorResult<AbsPoint> {
    let x = (region.x as f64 + region.width as f64 * rel.x).round();
    let y = (region.y as f64 + region.height as f64 * rel.y).round();
    if !x.is_finite() || !y.is_finite() || x.abs() > i64::MAX as f64 || y.abs() > i64::MAX as f64 {
        return Err(MirrorError::NonIntegerConversion { x, y });
    }
    Ok(AbsPoint::new(x as i64, y as i64))
}

/// Inverse of [`to_absolute`]. Does not clamp: out-of-region points yield
/// fractions outside 0..1 and the caller decides what that means.
pub fn to_relative(abs: AbsPoint, region: &Region) -> MirrorResult<RelPoint> {
    if region.width == 0 || region.height == 0 {
        return Err(MirrorError::DegenerateRegion(*region));
    }
    Ok(RelPoint::new(
        (abs.x - region.x) as f64 / region.width as f64,
        (abs.y - region.y) as f64 / region.height as f64,
    ))
}

/// Parses `"x,y;x,y;..."` into fractional points. Empty segments (a trailing
/// `;`) are skipped, but the overall list must not be empty.
pub fn parse_tap_sequence(raw: &str) -> MirrorResult<Vec<RelPoint>> {
    let invalid = |token: &str| MirrorError::InvalidTapSequence {
        token: token.to_string(),
        raw: raw.to_string(),
    };

    let mut points = Vec::new();
    for segment in raw.split(';') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let parts: Vec<&str> = segment.split(',').map(str::trim).collect();
        if parts.len() != 2 {
            return Err(invalid(segment));
        }
        let mut coords = [0.0f64; 2];
        for (slot, token) in coords.iter_mut().zip(&parts) {
            if !SIGNED_DECIMAL.is_match(token) {
                return Err(invalid(token));
            }
            *slot = token.parse::<f64>().map_err(|_| invalid(token))?;
        }
        points.push(RelPoint::new(coords[0], coords[1]));
    }

    if points.is_empty() {
        return Err(invalid(raw.trim()));
    }
    Ok(points)
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

/// Inverse of [`parse_tap_sequence`], rounded to four decimals.
pub fn format_tap_sequence(points: &[RelPoint]) -> String {
    points
        .iter()
        .map(|p| format!("{},{}", round4(p.x), round4(p.y)))
        .collect::<Vec<_>>()
        .join(";")
}
