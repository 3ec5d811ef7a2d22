//! Crop rectangle in source-image pixel coordinates.
//!
//! Every gesture goes through [`CropRegion::clamped`], so a region produced
//! by `dragged`/`resized` always has a positive size and lies fully inside
//! the image. The rasterizer still re-checks with [`CropRegion::validate`].

use crate::domain::error::DomainError;
use serde::{Deserialize, Serialize};

/// Smallest edge a region can be shrunk to by a gesture.
pub const MIN_EDGE: f64 = 1.0;

// 浮動小数点の誤差を許容する
const BOUNDS_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageBounds {
    pub width: u32,
    pub height: u32,
}

impl ImageBounds {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    fn extent(&self) -> (f64, f64) {
        (
            (self.width as f64).max(MIN_EDGE),
            (self.height as f64).max(MIN_EDGE),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropRegion {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Fixed `width / height` ratio honoured by resize gestures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect: Option<f64>,
}

/// Integer pixel rectangle addressed by a validated region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResizeHandle {
    TopLeft,
    Top,
    TopRight,
    Right,
    BottomRight,
    Bottom,
    BottomLeft,
    Left,
}

impl ResizeHandle {
    fn moves_left(self) -> bool {
        matches!(self, Self::TopLeft | Self::Left | Self::BottomLeft)
    }

    fn moves_right(self) -> bool {
        matches!(self, Self::TopRight | Self::Right | Self::BottomRight)
    }

    fn moves_top(self) -> bool {
        matches!(self, Self::TopLeft | Self::Top | Self::TopRight)
    }

    fn moves_bottom(self) -> bool {
        matches!(self, Self::BottomLeft | Self::Bottom | Self::BottomRight)
    }
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

impl CropRegion {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            aspect: None,
        }
    }

    pub fn with_aspect(mut self, aspect: Option<f64>) -> Self {
        self.aspect = aspect;
        self
    }

    /// The whole image, with the aspect ratio locked to
    /// `min(width, height) / max(width, height)`.
    pub fn full_image(bounds: ImageBounds) -> Self {
        let (w, h) = (bounds.width as f64, bounds.height as f64);
        let aspect = if w > 0.0 && h > 0.0 {
            Some(w.min(h) / w.max(h))
        } else {
            None
        };
        Self::new(0.0, 0.0, w, h).with_aspect(aspect)
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    fn valid_aspect(&self) -> Option<f64> {
        self.aspect.filter(|a| a.is_finite() && *a > 0.0)
    }

    pub fn is_within(&self, bounds: ImageBounds) -> bool {
        self.validate(bounds).is_ok()
    }

    /// Checks the region against `bounds` and returns the pixel rectangle
    /// it addresses: origin `floor(x), floor(y)`, size `floor(w) x floor(h)`.
    pub fn validate(&self, bounds: ImageBounds) -> Result<PixelRect, DomainError> {
        let Self { x, y, width, height, .. } = *self;
        if ![x, y, width, height].iter().all(|v| v.is_finite()) {
            return Err(DomainError::InvalidRegion(format!(
                "non-finite coordinates {:?}",
                self
            )));
        }
        if width <= 0.0 || height <= 0.0 {
            return Err(DomainError::InvalidRegion(format!(
                "non-positive size {}x{}",
                width, height
            )));
        }
        let (bw, bh) = (bounds.width as f64, bounds.height as f64);
        if x < 0.0 || y < 0.0 || x + width > bw + BOUNDS_EPSILON || y + height > bh + BOUNDS_EPSILON {
            return Err(DomainError::InvalidRegion(format!(
                "{}x{} at ({}, {}) lies outside a {}x{} image",
                width, height, x, y, bounds.width, bounds.height
            )));
        }

        let px_x = (x.floor() as u32).min(bounds.width);
        let px_y = (y.floor() as u32).min(bounds.height);
        let px_width = (width.floor() as u32).min(bounds.width - px_x);
        let px_height = (height.floor() as u32).min(bounds.height - px_y);
        if px_width == 0 || px_height == 0 {
            return Err(DomainError::InvalidRegion(format!(
                "{}x{} is smaller than one pixel",
                width, height
            )));
        }

        Ok(PixelRect {
            x: px_x,
            y: px_y,
            width: px_width,
            height: px_height,
        })
    }

    /// Shrinks and shifts the region until it fits inside `bounds`.
    /// The aspect ratio is left alone here; only resize gestures enforce it.
    pub fn clamped(&self, bounds: ImageBounds) -> Self {
        let (bw, bh) = bounds.extent();
        let width = finite_or(self.width, bw).clamp(MIN_EDGE, bw);
        let height = finite_or(self.height, bh).clamp(MIN_EDGE, bh);
        let x = finite_or(self.x, 0.0).clamp(0.0, bw - width);
        let y = finite_or(self.y, 0.0).clamp(0.0, bh - height);
        Self {
            x,
            y,
            width,
            height,
            aspect: self.aspect,
        }
    }

    pub fn dragged(&self, dx: f64, dy: f64, bounds: ImageBounds) -> Self {
        let base = self.clamped(bounds);
        Self {
            x: base.x + finite_or(dx, 0.0),
            y: base.y + finite_or(dy, 0.0),
            ..base
        }
        .clamped(bounds)
    }

    /// Moves the edges grabbed by `handle` by `(dx, dy)`. The opposite edges
    /// stay anchored.
    pub fn resized(&self, handle: ResizeHandle, dx: f64, dy: f64, bounds: ImageBounds) -> Self {
        let base = self.clamped(bounds);
        let (bw, bh) = bounds.extent();
        let (dx, dy) = (finite_or(dx, 0.0), finite_or(dy, 0.0));

        let mut left = base.x;
        let mut top = base.y;
        let mut right = base.right();
        let mut bottom = base.bottom();

        if handle.moves_left() {
            left = (left + dx).clamp(0.0, right - MIN_EDGE);
        }
        if handle.moves_right() {
            right = (right + dx).clamp(left + MIN_EDGE, bw);
        }
        if handle.moves_top() {
            top = (top + dy).clamp(0.0, bottom - MIN_EDGE);
        }
        if handle.moves_bottom() {
            bottom = (bottom + dy).clamp(top + MIN_EDGE, bh);
        }

        let mut width = right - left;
        let mut height = bottom - top;

        if let Some(aspect) = base.valid_aspect() {
            let max_width = if handle.moves_left() { right } else { bw - left };
            let max_height = if handle.moves_top() { bottom } else { bh - top };
            // 上下だけのハンドルは高さを基準に幅を決める
            let height_driven = matches!(handle, ResizeHandle::Top | ResizeHandle::Bottom);
            let (w, h) = if height_driven {
                let mut h = height;
                let mut w = h * aspect;
                if w > max_width {
                    w = max_width;
                    h = w / aspect;
                }
                (w, h)
            } else {
                let mut w = width;
                let mut h = w / aspect;
                if h > max_height {
                    h = max_height;
                    w = h * aspect;
                }
                (w, h)
            };
            width = w.clamp(MIN_EDGE, max_width.max(MIN_EDGE));
            height = h.clamp(MIN_EDGE, max_height.max(MIN_EDGE));

            if handle.moves_left() {
                left = right - width;
            }
            if handle.moves_top() {
                top = bottom - height;
            }
        }

        Self {
            x: left,
            y: top,
            width,
            height,
            aspect: base.aspect,
        }
        .clamped(bounds)
    }
}
