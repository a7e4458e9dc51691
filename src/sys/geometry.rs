//! Screen geometry shared by the tree and the OS boundary.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self { Point { x, y } }
}

/// Rectangle in physical screen pixels. `x`/`y` is the top-left corner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self { Rect { x, y, width, height } }

    pub fn from_ltrb(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Rect::new(left, top, right - left, bottom - top)
    }

    pub fn left(&self) -> i32 { self.x }

    pub fn top(&self) -> i32 { self.y }

    pub fn right(&self) -> i32 { self.x + self.width }

    pub fn bottom(&self) -> i32 { self.y + self.height }

    pub fn center(&self) -> Point { Point::new(self.x + self.width / 2, self.y + self.height / 2) }

    pub fn contains(&self, point: Point) -> bool {
        (self.left()..self.right()).contains(&point.x)
            && (self.top()..self.bottom()).contains(&point.y)
    }

    pub fn area(&self) -> i64 { i64::from(self.width.max(0)) * i64::from(self.height.max(0)) }

    pub fn intersection(&self, other: &Rect) -> Rect {
        let left = self.left().max(other.left());
        let top = self.top().max(other.top());
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        Rect::from_ltrb(left, top, right.max(left), bottom.max(top))
    }

    /// Shrinks the rectangle by `delta` on each edge. Negative deltas grow it.
    pub fn inset(&self, delta: &RectDelta) -> Rect {
        Rect::from_ltrb(
            self.left() + delta.left,
            self.top() + delta.top,
            self.right() - delta.right,
            self.bottom() - delta.bottom,
        )
    }

    /// Grows the rectangle by `delta` on each edge.
    pub fn outset(&self, delta: &RectDelta) -> Rect {
        Rect::from_ltrb(
            self.left() - delta.left,
            self.top() - delta.top,
            self.right() + delta.right,
            self.bottom() + delta.bottom,
        )
    }

    /// Returns a rectangle of the same size centered within `outer`.
    pub fn centered_in(&self, outer: &Rect) -> Rect {
        Rect::new(
            outer.x + (outer.width - self.width) / 2,
            outer.y + (outer.height - self.height) / 2,
            self.width,
            self.height,
        )
    }

    pub fn translate_to(&self, origin: Point) -> Rect {
        Rect::new(origin.x, origin.y, self.width, self.height)
    }
}

/// Per-edge pixel correction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RectDelta {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl RectDelta {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        RectDelta { left, top, right, bottom }
    }

    pub fn uniform(amount: i32) -> Self { RectDelta::new(amount, amount, amount, amount) }
}

pub trait IsWithin {
    fn is_within(&self, how_much: f64, other: Self) -> bool;
}

impl IsWithin for f64 {
    fn is_within(&self, how_much: f64, other: Self) -> bool { (self - other).abs() < how_much }
}

pub trait SameAs: IsWithin + Sized {
    fn same_as(&self, other: Self) -> bool { self.is_within(1e-9, other) }
}

impl SameAs for f64 {}
