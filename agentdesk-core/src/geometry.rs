//! Screen-space geometry shared by windows, elements and the annotator.
//!
//! All coordinates are absolute virtual-screen pixels.  On multi-monitor
//! setups the virtual-screen origin can be negative; the annotator
//! subtracts it before drawing into an image.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

/// An axis-aligned bounding rectangle in absolute screen coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoundingBox {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

// Wire shape carries the derived width/height alongside the edges so
// consumers never recompute them.
impl Serialize for BoundingBox {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("BoundingBox", 6)?;
        state.serialize_field("left", &self.left)?;
        state.serialize_field("top", &self.top)?;
        state.serialize_field("right", &self.right)?;
        state.serialize_field("bottom", &self.bottom)?;
        state.serialize_field("width", &self.width())?;
        state.serialize_field("height", &self.height())?;
        state.end()
    }
}

impl BoundingBox {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// A box is empty when it encloses no pixels.
    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    pub fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.width() as i64 * self.height() as i64
        }
    }

    /// Center point, used as the click target for labelled elements.
    pub fn center(&self) -> (i32, i32) {
        (
            self.left + self.width() / 2,
            self.top + self.height() / 2,
        )
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.left < other.right
            && other.left < self.right
            && self.top < other.bottom
            && other.top < self.bottom
    }

    /// Translate by `(-dx, -dy)`, mapping screen coordinates into a space
    /// whose origin is `(dx, dy)`.
    pub fn offset_by(&self, dx: i32, dy: i32) -> BoundingBox {
        BoundingBox {
            left: self.left - dx,
            top: self.top - dy,
            right: self.right - dx,
            bottom: self.bottom - dy,
        }
    }

    /// Grow (or shrink, for negative `amount`) uniformly on every side.
    pub fn inflate(&self, amount: i32) -> BoundingBox {
        BoundingBox {
            left: self.left - amount,
            top: self.top - amount,
            right: self.right + amount,
            bottom: self.bottom + amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_box() {
        assert!(BoundingBox::default().is_empty());
        assert!(BoundingBox::new(10, 10, 10, 40).is_empty());
        assert!(BoundingBox::new(10, 10, 5, 40).is_empty());
        assert!(!BoundingBox::new(0, 0, 1, 1).is_empty());
    }

    #[test]
    fn test_center() {
        let b = BoundingBox::new(10, 20, 110, 60);
        assert_eq!(b.center(), (60, 40));
    }

    #[test]
    fn test_intersects() {
        let a = BoundingBox::new(0, 0, 100, 100);
        let b = BoundingBox::new(50, 50, 150, 150);
        let c = BoundingBox::new(100, 100, 200, 200);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c)); // touching edges do not overlap
        assert!(!a.intersects(&BoundingBox::default()));
    }

    #[test]
    fn test_inflate() {
        let b = BoundingBox::new(10, 10, 20, 20);
        assert_eq!(b.inflate(5), BoundingBox::new(5, 5, 25, 25));
        assert_eq!(b.inflate(-4), BoundingBox::new(14, 14, 16, 16));
    }

    #[test]
    fn test_serializes_with_width_and_height() {
        let b = BoundingBox::new(10, 20, 110, 60);
        let json = serde_json::to_value(b).unwrap();
        assert_eq!(json["left"], 10);
        assert_eq!(json["bottom"], 60);
        assert_eq!(json["width"], 100);
        assert_eq!(json["height"], 40);
    }

    #[test]
    fn test_offset_by_negative_origin() {
        // A monitor left of the primary puts the virtual origin at -1920.
        let b = BoundingBox::new(-1920, 0, -1820, 50);
        let local = b.offset_by(-1920, 0);
        assert_eq!(local, BoundingBox::new(0, 0, 100, 50));
    }
}
