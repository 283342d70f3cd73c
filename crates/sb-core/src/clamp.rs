//! Bounding of positions to a container.
//!
//! The same discipline serves two callers: a dragged card (moving rectangle,
//! zero margin) and the context menu / newly added card (fixed rectangle,
//! small margin from every edge).

use crate::model::{Point, Size};

/// Clamp a candidate top-left so the element stays inside the container:
/// `0 ≤ x ≤ container.width − element.width`, same for `y`.
///
/// An element larger than its container pins to 0 on that axis.
pub fn clamp_position(candidate: Point, element: Size, container: Size) -> Point {
    Point {
        x: clamp_axis(candidate.x, element.width, container.width, 0.0),
        y: clamp_axis(candidate.y, element.height, container.height, 0.0),
    }
}

/// Clamp an anchor so the element keeps `margin` pixels from every edge of
/// the container. Pins to `margin` when the element doesn't fit.
pub fn clamp_with_margin(anchor: Point, element: Size, container: Size, margin: f32) -> Point {
    Point {
        x: clamp_axis(anchor.x, element.width, container.width, margin),
        y: clamp_axis(anchor.y, element.height, container.height, margin),
    }
}

fn clamp_axis(value: f32, extent: f32, available: f32, margin: f32) -> f32 {
    let low = margin;
    let high = available - extent - margin;
    if !value.is_finite() || high < low {
        return low;
    }
    value.clamp(low, high)
}
