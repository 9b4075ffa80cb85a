//! 2-D Points

#![allow(dead_code)]

use crate::common::*;
use num_traits::{Num, Zero};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

/// A 2-D point containing numeric values.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Point2<T> {
    /// X-coordinate.
    pub x: T,

    /// Y-coordinate.
    pub y: T,
}

/// 2-D point containing `Float` values.
pub type Point2f = Point2<Float>;

/// 2-D point containing `Int` values.
pub type Point2i = Point2<Int>;

impl<T: Num> Point2<T> {
    /// Creates a new 2-D point.
    ///
    /// * `x` - X-coordinate.
    /// * `y` - Y-coordinate.
    pub fn new(x: T, y: T) -> Self {
        Self { x, y }
    }

    /// Creates a new 2-D zero point.
    pub fn zero() -> Self
    where
        T: Zero,
    {
        Self::new(T::zero(), T::zero())
    }

    /// Returns the product of the coordinates; for integer points this is the
    /// number of cells in a grid of these dimensions.
    pub fn area(&self) -> T
    where
        T: Copy,
    {
        self.x * self.y
    }
}

impl<T: Num> Add for Point2<T> {
    type Output = Self;

    /// Adds the given point and returns the result.
    ///
    /// * `other` - The point to add.
    fn add(self, other: Self) -> Self::Output {
        Self::Output::new(self.x + other.x, self.y + other.y)
    }
}

impl<T: Num + Copy> AddAssign for Point2<T> {
    /// Adds the given point.
    ///
    /// * `other` - The point to add.
    fn add_assign(&mut self, other: Self) {
        *self = Self::new(self.x + other.x, self.y + other.y);
    }
}

impl<T: Num> Sub for Point2<T> {
    type Output = Self;

    /// Subtracts the given point and returns the result.
    ///
    /// * `other` - The point to subtract.
    fn sub(self, other: Self) -> Self::Output {
        Self::Output::new(self.x - other.x, self.y - other.y)
    }
}

impl<T: Num + Copy> SubAssign for Point2<T> {
    /// Subtracts the given point.
    ///
    /// * `other` - The point to subtract.
    fn sub_assign(&mut self, other: Self) {
        *self = Self::new(self.x - other.x, self.y - other.y);
    }
}

impl<T: Num + Copy> Mul<T> for Point2<T> {
    type Output = Self;

    /// Scales the point coordinates and returns the result.
    ///
    /// * `f` - The scaling factor.
    fn mul(self, f: T) -> Self::Output {
        Self::Output::new(self.x * f, self.y * f)
    }
}

impl From<Point2i> for Point2f {
    /// Convert an integer point to a floating point one.
    ///
    /// * `p` - The integer point.
    fn from(p: Point2i) -> Self {
        Self::new(p.x as Float, p.y as Float)
    }
}

impl<T: fmt::Display> fmt::Display for Point2<T> {
    /// Formats the point as `[x, y]`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.y)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn zero_point() {
        assert!(Point2::new(0, 0) == Point2::zero());
        assert!(Point2::new(0.0, 0.0) == Point2::zero());
    }

    #[test]
    fn area_of_grid() {
        assert_eq!(Point2::new(640, 360).area(), 640 * 360);
    }

    proptest! {
        #[test]
        fn add_sub_i32(
            (ax, ay) in (-1000..1000i32, -1000..1000i32),
            (bx, by) in (-1000..1000i32, -1000..1000i32),
        ) {
            let a = Point2::new(ax, ay);
            let b = Point2::new(bx, by);
            prop_assert_eq!(a + b - b, a);
        }
    }
}
