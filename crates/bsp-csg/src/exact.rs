//! Extended-precision arithmetic for plane distances and split ratios.
//!
//! Values are unevaluated sums of two `f64`s (`hi + lo`, `|lo| <= ulp(hi)/2`),
//! built from the error-free transformations `TwoSum` and `TwoProduct`.
//! This gives roughly 106 bits of mantissa, enough that a split vertex
//! computed from a distance ratio is correctly rounded to `f64` in all but
//! pathological cases, so error does not compound across repeated splits.

use std::ops::{Add, Div, Mul, Neg, Sub};

use nalgebra::{Point3, Vector3};

#[inline]
fn two_sum(a: f64, b: f64) -> (f64, f64) {
    let s = a + b;
    let bb = s - a;
    let err = (a - (s - bb)) + (b - bb);
    (s, err)
}

#[inline]
fn quick_two_sum(a: f64, b: f64) -> (f64, f64) {
    let s = a + b;
    let err = b - (s - a);
    (s, err)
}

#[inline]
fn two_prod(a: f64, b: f64) -> (f64, f64) {
    let p = a * b;
    let err = a.mul_add(b, -p);
    (p, err)
}

/// A double-double number.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DoubleDouble {
    hi: f64,
    lo: f64,
}

impl DoubleDouble {
    pub const ZERO: Self = Self { hi: 0.0, lo: 0.0 };

    #[inline]
    pub const fn from_parts(hi: f64, lo: f64) -> Self {
        Self { hi, lo }
    }

    #[inline]
    pub fn hi(self) -> f64 {
        self.hi
    }

    #[inline]
    pub fn lo(self) -> f64 {
        self.lo
    }

    /// Exact product of two `f64`s.
    #[inline]
    pub fn product(a: f64, b: f64) -> Self {
        let (hi, lo) = two_prod(a, b);
        Self { hi, lo }
    }

    /// Exact difference of two `f64`s.
    #[inline]
    pub fn difference(a: f64, b: f64) -> Self {
        let (hi, lo) = two_sum(a, -b);
        Self { hi, lo }
    }

    #[inline]
    pub fn to_f64(self) -> f64 {
        self.hi + self.lo
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.hi == 0.0 && self.lo == 0.0
    }
}

impl From<f64> for DoubleDouble {
    #[inline]
    fn from(hi: f64) -> Self {
        Self { hi, lo: 0.0 }
    }
}

impl Neg for DoubleDouble {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self {
            hi: -self.hi,
            lo: -self.lo,
        }
    }
}

impl Add for DoubleDouble {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        let (s, e) = two_sum(self.hi, rhs.hi);
        let (t, f) = two_sum(self.lo, rhs.lo);
        let (s, e) = quick_two_sum(s, e + t);
        let (hi, lo) = quick_two_sum(s, e + f);
        Self { hi, lo }
    }
}

impl Sub for DoubleDouble {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        self + (-rhs)
    }
}

impl Mul for DoubleDouble {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self {
        let (p, e) = two_prod(self.hi, rhs.hi);
        let e = e + (self.hi * rhs.lo + self.lo * rhs.hi);
        let (hi, lo) = quick_two_sum(p, e);
        Self { hi, lo }
    }
}

impl Div for DoubleDouble {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        let q1 = self.hi / rhs.hi;
        let r = self - rhs * DoubleDouble::from(q1);
        let q2 = r.hi / rhs.hi;
        let r = r - rhs * DoubleDouble::from(q2);
        let q3 = r.hi / rhs.hi;
        let (hi, lo) = quick_two_sum(q1, q2);
        Self { hi, lo } + DoubleDouble::from(q3)
    }
}

/// `normal · point - offset`, accumulated without intermediate rounding
/// beyond the double-double representation.
pub fn plane_distance(normal: &Vector3<f64>, offset: f64, point: &Point3<f64>) -> DoubleDouble {
    DoubleDouble::product(normal.x, point.x)
        + DoubleDouble::product(normal.y, point.y)
        + DoubleDouble::product(normal.z, point.z)
        - DoubleDouble::from(offset)
}

/// Position of a plane crossing along an edge, kept as an unevaluated
/// fraction of signed distances: `t = num / den` with `num = d(start)` and
/// `den = d(start) - d(end)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ratio {
    pub num: DoubleDouble,
    pub den: DoubleDouble,
}

impl Ratio {
    pub fn new(start_distance: DoubleDouble, end_distance: DoubleDouble) -> Self {
        Self {
            num: start_distance,
            den: start_distance - end_distance,
        }
    }

    /// The ratio as a double-double parameter in `[0, 1]`.
    pub fn parameter(&self) -> DoubleDouble {
        self.num / self.den
    }

    /// Materializes the crossing point on the segment `start → end`,
    /// rounding to `f64` only once per coordinate.
    pub fn interpolate(&self, start: &Point3<f64>, end: &Point3<f64>) -> Point3<f64> {
        let t = self.parameter();
        let lerp = |a: f64, b: f64| {
            (DoubleDouble::from(a) + DoubleDouble::difference(b, a) * t).to_f64()
        };
        Point3::new(
            lerp(start.x, end.x),
            lerp(start.y, end.y),
            lerp(start.z, end.z),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn product_is_exact() {
        let a = 1.0 + f64::EPSILON;
        let p = DoubleDouble::product(a, a);
        // (1 + e)^2 = 1 + 2e + e^2, the e^2 term lands in `lo`.
        assert_eq!(p.hi(), 1.0 + 2.0 * f64::EPSILON);
        assert_eq!(p.lo(), f64::EPSILON * f64::EPSILON);
    }

    #[test]
    fn sum_keeps_cancelled_bits() {
        let big = DoubleDouble::from(1e16);
        let small = DoubleDouble::from(1.0);
        let r = (big + small) - big;
        assert_eq!(r.to_f64(), 1.0);
    }

    #[test]
    fn division_recovers_quotient() {
        let q = DoubleDouble::from(1.0) / DoubleDouble::from(3.0);
        let back = q * DoubleDouble::from(3.0);
        assert!((back - DoubleDouble::from(1.0)).to_f64().abs() < 1e-30);
    }

    #[test]
    fn plane_distance_of_point_on_plane_is_zero() {
        let n = Vector3::new(0.0, 0.0, 1.0);
        let d = plane_distance(&n, 0.5, &Point3::new(3.0, -7.0, 0.5));
        assert!(d.is_zero());
    }

    #[test]
    fn ratio_midpoint() {
        let r = Ratio::new(DoubleDouble::from(1.0), DoubleDouble::from(-1.0));
        let p = r.interpolate(&Point3::new(0.0, 0.0, 0.0), &Point3::new(2.0, 4.0, -6.0));
        assert_eq!(p, Point3::new(1.0, 2.0, -3.0));
    }

    proptest! {
        #[test]
        fn interpolated_point_lies_between_endpoints(
            a in -100.0f64..100.0,
            b in -100.0f64..100.0,
            da in 0.001f64..10.0,
            db in -10.0f64..-0.001,
        ) {
            let r = Ratio::new(DoubleDouble::from(da), DoubleDouble::from(db));
            let t = r.parameter().to_f64();
            prop_assert!((0.0..=1.0).contains(&t));
            let p = r.interpolate(&Point3::new(a, 0.0, 0.0), &Point3::new(b, 0.0, 0.0));
            prop_assert!(p.x >= a.min(b) - 1e-12 && p.x <= a.max(b) + 1e-12);
        }

        #[test]
        fn addition_rounds_like_f64(a in -1e6f64..1e6, b in -1e6f64..1e6) {
            let s = DoubleDouble::from(a) + DoubleDouble::from(b);
            prop_assert_eq!(s.to_f64(), a + b);
        }
    }
}
