//! Basic geometric types for PDF page space and displayed-page space

use crate::parser::{PdfArray, PdfObject};

/// A point in 2D space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
}

impl Point {
    /// Create a new point
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A rectangle defined by two points, always normalised so that
/// `lower_left` holds the minimum coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rectangle {
    /// Lower-left corner
    pub lower_left: Point,
    /// Upper-right corner
    pub upper_right: Point,
}

impl Rectangle {
    /// Create a rectangle from any two opposite corners
    pub fn new(a: Point, b: Point) -> Self {
        Self {
            lower_left: Point::new(a.x.min(b.x), a.y.min(b.y)),
            upper_right: Point::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    /// Read a `[llx lly urx ury]` array. Entries may be integers or reals
    /// and the corners may be in any order.
    pub fn from_array(array: &PdfArray) -> Option<Self> {
        if array.len() != 4 {
            return None;
        }
        let values: Vec<f64> = array.iter().map(PdfObject::as_real).collect::<Option<_>>()?;
        if values.iter().any(|v| !v.is_finite()) {
            return None;
        }
        Some(Self::new(
            Point::new(values[0], values[1]),
            Point::new(values[2], values[3]),
        ))
    }

    /// Get the width
    pub fn width(&self) -> f64 {
        self.upper_right.x - self.lower_left.x
    }

    /// Get the height
    pub fn height(&self) -> f64 {
        self.upper_right.y - self.lower_left.y
    }

    /// Overlap with `other`, or `None` when they do not intersect
    pub fn intersect(&self, other: &Rectangle) -> Option<Rectangle> {
        let llx = self.lower_left.x.max(other.lower_left.x);
        let lly = self.lower_left.y.max(other.lower_left.y);
        let urx = self.upper_right.x.min(other.upper_right.x);
        let ury = self.upper_right.y.min(other.upper_right.y);
        (llx <= urx && lly <= ury).then(|| Rectangle::new(Point::new(llx, lly), Point::new(urx, ury)))
    }

    /// Smallest rectangle containing both
    pub fn union(&self, other: &Rectangle) -> Rectangle {
        Rectangle::new(
            Point::new(
                self.lower_left.x.min(other.lower_left.x),
                self.lower_left.y.min(other.lower_left.y),
            ),
            Point::new(
                self.upper_right.x.max(other.upper_right.x),
                self.upper_right.y.max(other.upper_right.y),
            ),
        )
    }

    /// Move by `(-dx, -dy)`
    pub fn offset_by(&self, dx: f64, dy: f64) -> Rectangle {
        Rectangle {
            lower_left: Point::new(self.lower_left.x - dx, self.lower_left.y - dy),
            upper_right: Point::new(self.upper_right.x - dx, self.upper_right.y - dy),
        }
    }
}

/// Page rotation, clockwise, as the page is displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    None,
    Clockwise90,
    Clockwise180,
    Clockwise270,
}

impl Rotation {
    /// Normalise a `/Rotate` value. Multiples of 90 wrap (negatives included);
    /// anything else is not a valid rotation.
    pub fn from_degrees(degrees: i64) -> Option<Self> {
        if degrees % 90 != 0 {
            return None;
        }
        Some(match degrees.rem_euclid(360) {
            90 => Rotation::Clockwise90,
            180 => Rotation::Clockwise180,
            270 => Rotation::Clockwise270,
            _ => Rotation::None,
        })
    }

    pub fn degrees(&self) -> u16 {
        match self {
            Rotation::None => 0,
            Rotation::Clockwise90 => 90,
            Rotation::Clockwise180 => 180,
            Rotation::Clockwise270 => 270,
        }
    }

    /// Map a point relative to the visible box origin (width `w`, height `h`)
    /// to top-left-origin coordinates of the displayed page
    pub fn to_top_left(&self, p: Point, w: f64, h: f64) -> Point {
        match self {
            Rotation::None => Point::new(p.x, h - p.y),
            Rotation::Clockwise90 => Point::new(p.y, p.x),
            Rotation::Clockwise180 => Point::new(w - p.x, p.y),
            Rotation::Clockwise270 => Point::new(h - p.y, w - p.x),
        }
    }

    /// Map a whole rectangle; the result is the axis-aligned box of the
    /// two mapped corners
    pub fn rect_to_top_left(&self, rect: &Rectangle, w: f64, h: f64) -> Rectangle {
        Rectangle::new(
            self.to_top_left(rect.lower_left, w, h),
            self.to_top_left(rect.upper_right, w, h),
        )
    }
}
