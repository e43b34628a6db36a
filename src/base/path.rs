//! Vector paths
//!
//! The outline representation handed to rendering backends. Glyph decoding
//! produces quadratic contours; cubic elements exist for collaborators that
//! convert or compose paths.

use crate::base::geometry::{Point, Rect};

/// Path element types
#[derive(Debug, Clone, PartialEq)]
pub enum PathElement {
    /// Move to a point (starts a new subpath)
    MoveTo(Point),
    /// Line to a point
    LineTo(Point),
    /// Quadratic Bezier curve (control, endpoint)
    QuadTo(Point, Point),
    /// Cubic Bezier curve (control 1, control 2, endpoint)
    CurveTo(Point, Point, Point),
    /// Close the current subpath
    Close,
}

/// Vector path
#[derive(Debug, Clone, Default)]
pub struct Path {
    elements: Vec<PathElement>,
}

impl Path {
    /// Create a new empty path
    pub fn new() -> Self {
        Self {
            elements: Vec::new(),
        }
    }

    /// Create a path with a specific capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            elements: Vec::with_capacity(capacity),
        }
    }

    pub fn move_to(&mut self, p: Point) {
        self.elements.push(PathElement::MoveTo(p));
    }

    pub fn line_to(&mut self, p: Point) {
        self.elements.push(PathElement::LineTo(p));
    }

    pub fn quad_to(&mut self, c: Point, p: Point) {
        self.elements.push(PathElement::QuadTo(c, p));
    }

    pub fn curve_to(&mut self, c1: Point, c2: Point, p: Point) {
        self.elements.push(PathElement::CurveTo(c1, c2, p));
    }

    pub fn close(&mut self) {
        self.elements.push(PathElement::Close);
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn elements(&self) -> &[PathElement] {
        &self.elements
    }

    /// Walk the path, invoking the callback for each element
    pub fn walk<F>(&self, mut walker: F)
    where
        F: FnMut(&PathElement),
    {
        for element in &self.elements {
            walker(element);
        }
    }

    /// Bounding box over all control points.
    ///
    /// Curve extrema are not solved for; control points bound the curve, so
    /// the result is conservative.
    pub fn bounds(&self) -> Rect {
        let mut rect = Rect::EMPTY;
        self.walk(|element| match element {
            PathElement::MoveTo(p) | PathElement::LineTo(p) => rect.include(*p),
            PathElement::QuadTo(c, p) => {
                rect.include(*c);
                rect.include(*p);
            }
            PathElement::CurveTo(c1, c2, p) => {
                rect.include(*c1);
                rect.include(*c2);
                rect.include(*p);
            }
            PathElement::Close => {}
        });
        rect
    }
}
