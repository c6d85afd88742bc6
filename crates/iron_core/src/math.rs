//! Fixed-point math utilities for deterministic simulation.
//!
//! All simulation state uses fixed-point arithmetic so that a match is a
//! pure function of its configuration, seed and issued commands.
//! Floating-point values only appear as literals converted at the edges.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
/// Map coordinates (at most a few thousand units) and their squares fit
/// comfortably in the integer range.
pub type Fixed = I32F32;

/// Fixed-point 2D vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2Fixed {
    /// X coordinate.
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// Y coordinate.
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
}

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

/// Serde support for `Option<Fixed>`.
///
/// Serializes optional fixed-point numbers via their raw bit representation,
/// preserving `None` as a serialized `None` value.
pub mod option_fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize an optional fixed-point number.
    pub fn serialize<S>(value: &Option<Fixed>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(v) => v.to_bits().serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize an optional fixed-point number.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Fixed>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt = Option::<i64>::deserialize(deserializer)?;
        Ok(opt.map(Fixed::from_bits))
    }
}

impl Vec2Fixed {
    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Create a vector from whole-number coordinates.
    #[must_use]
    pub fn from_ints(x: i32, y: i32) -> Self {
        Self::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    /// Zero vector.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    /// Calculate squared distance (avoids sqrt for comparisons).
    #[must_use]
    pub fn distance_squared(self, other: Self) -> Fixed {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.saturating_mul(dx).saturating_add(dy.saturating_mul(dy))
    }

    /// Euclidean distance to `other`.
    #[must_use]
    pub fn distance(self, other: Self) -> Fixed {
        fixed_sqrt(self.distance_squared(other))
    }

    /// Length of the vector.
    #[must_use]
    pub fn length(self) -> Fixed {
        fixed_sqrt(self.dot(self))
    }

    /// Dot product of two vectors.
    #[must_use]
    pub fn dot(self, other: Self) -> Fixed {
        self.x * other.x + self.y * other.y
    }

    /// Multiply both components by `factor`.
    #[must_use]
    pub fn scale(self, factor: Fixed) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    /// Normalize vector using fixed-point math.
    #[must_use]
    pub fn normalize(self) -> Self {
        let len = self.length();
        if len == Fixed::ZERO {
            return Self::ZERO;
        }

        Self::new(self.x / len, self.y / len)
    }

    /// Step of length `step` from `self` toward `target`.
    ///
    /// Returns the displacement, not the new point. A zero-length
    /// displacement is returned when the two points coincide.
    #[must_use]
    pub fn step_toward(self, target: Self, step: Fixed) -> Self {
        let delta = target - self;
        let dist = delta.length();
        if dist == Fixed::ZERO {
            return Self::ZERO;
        }
        Self::new(delta.x * step / dist, delta.y * step / dist)
    }
}

/// Computes the square root of a fixed-point number using binary search.
#[must_use]
pub fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }

    let mut low = Fixed::ZERO;
    let mut high = if value > Fixed::ONE { value } else { Fixed::ONE };

    // 64 halvings cover the full I32F32 bit width.
    for _ in 0..64 {
        let mid = low + (high - low) / 2;
        if mid == low {
            break;
        }
        if mid.saturating_mul(mid) <= value {
            low = mid;
        } else {
            high = mid;
        }
    }

    low
}

impl std::ops::Add for Vec2Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::AddAssign for Vec2Fixed {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl std::ops::Sub for Vec2Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl std::ops::SubAssign for Vec2Fixed {
    fn sub_assign(&mut self, rhs: Self) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

// ============================================================================
// Axis-aligned boxes
// ============================================================================

/// Axis-aligned bounding box given by its top-left corner and size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// Top edge.
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
    /// Width.
    #[serde(with = "fixed_serde")]
    pub w: Fixed,
    /// Height.
    #[serde(with = "fixed_serde")]
    pub h: Fixed,
}

impl Rect {
    /// Create a box from its top-left corner and size.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed, w: Fixed, h: Fixed) -> Self {
        Self { x, y, w, h }
    }

    /// Create a box of `size` centred on `center`.
    #[must_use]
    pub fn from_center(center: Vec2Fixed, size: Vec2Fixed) -> Self {
        Self::new(
            center.x - size.x / 2,
            center.y - size.y / 2,
            size.x,
            size.y,
        )
    }

    /// Create a box of `size` whose top-left corner is `top_left`.
    #[must_use]
    pub fn from_top_left(top_left: Vec2Fixed, size: Vec2Fixed) -> Self {
        Self::new(top_left.x, top_left.y, size.x, size.y)
    }

    /// Right edge (exclusive).
    #[must_use]
    pub fn right(&self) -> Fixed {
        self.x + self.w
    }

    /// Bottom edge (exclusive).
    #[must_use]
    pub fn bottom(&self) -> Fixed {
        self.y + self.h
    }

    /// Centre point.
    #[must_use]
    pub fn center(&self) -> Vec2Fixed {
        Vec2Fixed::new(self.x + self.w / 2, self.y + self.h / 2)
    }

    /// Whether two boxes overlap with a non-empty intersection.
    ///
    /// Touching edges do not count as overlap.
    #[must_use]
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Whether `other` lies entirely inside this box.
    #[must_use]
    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Whether `point` lies inside this box.
    #[must_use]
    pub fn contains_point(&self, point: Vec2Fixed) -> bool {
        point.x >= self.x && point.y >= self.y && point.x < self.right() && point.y < self.bottom()
    }

    /// Clamp a centre point so a box of `size` around it stays inside `self`.
    ///
    /// A box larger than the bounds is centred on that axis.
    #[must_use]
    pub fn clamp_center(&self, center: Vec2Fixed, size: Vec2Fixed) -> Vec2Fixed {
        let clamp_axis = |value: Fixed, lo: Fixed, extent: Fixed, half: Fixed| {
            if extent < half * 2 {
                lo + extent / 2
            } else {
                value.clamp(lo + half, lo + extent - half)
            }
        };
        Vec2Fixed::new(
            clamp_axis(center.x, self.x, self.w, size.x / 2),
            clamp_axis(center.y, self.y, self.h, size.y / 2),
        )
    }
}

// ============================================================================
// Directions
// ============================================================================

/// Unit vectors at 20 degree steps, starting east and turning clockwise in
/// screen space (positive y points down).
const DIRECTIONS_20_DEG: [(f64, f64); 18] = [
    (1.0, 0.0),
    (0.939_692_620_785_908_4, 0.342_020_143_325_668_7),
    (0.766_044_443_118_978, 0.642_787_609_686_539_3),
    (0.5, 0.866_025_403_784_438_6),
    (0.173_648_177_666_930_4, 0.984_807_753_012_208),
    (-0.173_648_177_666_930_4, 0.984_807_753_012_208),
    (-0.5, 0.866_025_403_784_438_6),
    (-0.766_044_443_118_978, 0.642_787_609_686_539_3),
    (-0.939_692_620_785_908_4, 0.342_020_143_325_668_7),
    (-1.0, 0.0),
    (-0.939_692_620_785_908_4, -0.342_020_143_325_668_7),
    (-0.766_044_443_118_978, -0.642_787_609_686_539_3),
    (-0.5, -0.866_025_403_784_438_6),
    (-0.173_648_177_666_930_4, -0.984_807_753_012_208),
    (0.173_648_177_666_930_4, -0.984_807_753_012_208),
    (0.5, -0.866_025_403_784_438_6),
    (0.766_044_443_118_978, -0.642_787_609_686_539_3),
    (0.939_692_620_785_908_4, -0.342_020_143_325_668_7),
];

/// Iterate the 18 compass directions spaced 20 degrees apart.
pub fn directions_20_deg() -> impl Iterator<Item = Vec2Fixed> {
    DIRECTIONS_20_DEG
        .iter()
        .map(|&(x, y)| Vec2Fixed::new(Fixed::from_num(x), Fixed::from_num(y)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::from_ints(x, y)
    }

    #[test]
    fn test_vec2_distance_squared() {
        let dist_sq = v(3, 0).distance_squared(v(0, 4));
        // 3² + 4² = 25
        assert_eq!(dist_sq, Fixed::from_num(25));
    }

    #[test]
    fn test_vec2_distance_exact_for_perfect_squares() {
        assert_eq!(v(0, 0).distance(v(3, 4)), Fixed::from_num(5));
        assert_eq!(v(100, 100).distance(v(100, 250)), Fixed::from_num(150));
    }

    #[test]
    fn test_fixed_determinism() {
        let a = Fixed::from_num(1) / Fixed::from_num(3);
        let b = Fixed::from_num(1) / Fixed::from_num(3);
        assert_eq!(a, b);
        assert_eq!(a * Fixed::from_num(7), b * Fixed::from_num(7));
    }

    #[test]
    fn test_vec2_normalize() {
        let norm = v(3, 4).normalize();
        let epsilon = Fixed::from_num(1) / Fixed::from_num(10000);
        assert!((norm.x - Fixed::from_num(0.6)).abs() < epsilon);
        assert!((norm.y - Fixed::from_num(0.8)).abs() < epsilon);
    }

    #[test]
    fn test_normalize_zero_is_zero() {
        assert_eq!(Vec2Fixed::ZERO.normalize(), Vec2Fixed::ZERO);
    }

    #[test]
    fn test_step_toward() {
        let step = v(0, 0).step_toward(v(30, 40), Fixed::from_num(5));
        assert_eq!(step, v(3, 4));
        assert_eq!(v(7, 7).step_toward(v(7, 7), Fixed::ONE), Vec2Fixed::ZERO);
    }

    #[test]
    fn test_fixed_sqrt_small_values() {
        let quarter = Fixed::from_num(0.25);
        let epsilon = Fixed::from_num(1) / Fixed::from_num(100_000);
        assert!((fixed_sqrt(quarter) - Fixed::from_num(0.5)).abs() < epsilon);
        assert_eq!(fixed_sqrt(Fixed::ZERO), Fixed::ZERO);
        assert_eq!(fixed_sqrt(Fixed::from_num(-4)), Fixed::ZERO);
    }

    #[test]
    fn test_rect_intersects_ignores_touching_edges() {
        let a = Rect::from_top_left(v(0, 0), v(10, 10));
        let touching = Rect::from_top_left(v(10, 0), v(10, 10));
        let overlapping = Rect::from_top_left(v(9, 9), v(10, 10));
        assert!(!a.intersects(&touching));
        assert!(a.intersects(&overlapping));
        assert!(overlapping.intersects(&a));
    }

    #[test]
    fn test_rect_contains_rect() {
        let map = Rect::from_top_left(v(0, 0), v(100, 100));
        assert!(map.contains_rect(&Rect::from_top_left(v(40, 40), v(60, 60))));
        assert!(!map.contains_rect(&Rect::from_top_left(v(41, 40), v(60, 60))));
    }

    #[test]
    fn test_rect_center_roundtrip() {
        let r = Rect::from_center(v(50, 50), v(20, 10));
        assert_eq!(r.x, Fixed::from_num(40));
        assert_eq!(r.y, Fixed::from_num(45));
        assert_eq!(r.center(), v(50, 50));
    }

    #[test]
    fn test_clamp_center_keeps_box_inside() {
        let map = Rect::from_top_left(v(0, 0), v(100, 50));
        let clamped = map.clamp_center(v(-5, 60), v(10, 10));
        assert_eq!(clamped, v(5, 45));
        let untouched = map.clamp_center(v(30, 20), v(10, 10));
        assert_eq!(untouched, v(30, 20));
    }

    #[test]
    fn test_directions_are_unit_length() {
        let epsilon = Fixed::from_num(1) / Fixed::from_num(1000);
        let dirs: Vec<_> = directions_20_deg().collect();
        assert_eq!(dirs.len(), 18);
        for dir in dirs {
            assert!((dir.length() - Fixed::ONE).abs() < epsilon);
        }
    }
}
