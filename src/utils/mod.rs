//! Geometry primitives shared by the resolver and the commit state machine.

/// An axis-aligned rectangle in source or destination pixel space.
///
/// Edges are stored as floating point because destination clipping produces
/// fractional source crops. Source rectangles handed to the resolver must
/// nevertheless be integral, see [`Rect::is_integral`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    /// Creates a rectangle from its four edges.
    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Rect {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Creates a zero-origin rectangle of the given size.
    pub const fn from_size(width: f32, height: f32) -> Self {
        Rect {
            left: 0.0,
            top: 0.0,
            right: width,
            bottom: height,
        }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// `true` if `left <= right` and `top <= bottom`.
    pub fn is_ordered(&self) -> bool {
        self.left <= self.right && self.top <= self.bottom
    }

    /// `true` if all four edges lie on whole pixels.
    pub fn is_integral(&self) -> bool {
        self.left.fract() == 0.0
            && self.top.fract() == 0.0
            && self.right.fract() == 0.0
            && self.bottom.fract() == 0.0
    }

    /// `true` if the rectangle covers at least one full pixel column,
    /// comparing truncated edges the way the hardware does.
    pub fn has_width(&self) -> bool {
        (self.right as u32) > (self.left as u32)
    }
}

/// Rotation applied to a layer, in the clockwise direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    Rot0,
    Rot90,
}

/// Per-layer transform: a clockwise rotation plus independent flips.
///
/// A 90° rotation swaps the semantic width/height axes of the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Transform {
    pub rotation: Rotation,
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        rotation: Rotation::Rot0,
        flip_horizontal: false,
        flip_vertical: false,
    };

    pub fn rotated90(&self) -> bool {
        self.rotation == Rotation::Rot90
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn integral_rects() {
        assert!(Rect::new(0.0, 0.0, 100.0, 50.0).is_integral());
        assert!(!Rect::new(0.5, 0.0, 100.0, 50.0).is_integral());
        assert!(!Rect::new(0.0, 0.0, 99.25, 50.0).is_integral());
    }

    #[test]
    fn ordering() {
        assert!(Rect::new(10.0, 10.0, 10.0, 10.0).is_ordered());
        assert!(!Rect::new(11.0, 0.0, 10.0, 10.0).is_ordered());
        assert!(!Rect::new(0.0, 11.0, 10.0, 10.0).is_ordered());
    }

    #[test]
    fn sub_pixel_width() {
        // edges truncate to the same pixel column
        assert!(!Rect::new(10.2, 0.0, 10.8, 10.0).has_width());
        assert!(Rect::new(10.2, 0.0, 11.1, 10.0).has_width());
    }
}
