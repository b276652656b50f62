/// Small 2D vector math for world-space positions and velocities.
///
/// World units: one tile is `TILE_SIZE` units wide, y grows downward.

use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

use serde::Serialize;

pub const TILE_SIZE: f32 = 32.0;

#[derive(Clone, Copy, PartialEq, Debug, Default, Serialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Vec2 { x, y }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn dot(self, o: Vec2) -> f32 {
        self.x * o.x + self.y * o.y
    }

    pub fn distance(self, o: Vec2) -> f32 {
        (self - o).length()
    }

    /// Unit vector, or zero for a zero-length input.
    pub fn normalize(self) -> Vec2 {
        let len = self.length();
        if len == 0.0 {
            return Vec2::ZERO;
        }
        Vec2::new(self.x / len, self.y / len)
    }

    pub fn mix(self, o: Vec2, t: f32) -> Vec2 {
        self + (o - self) * t
    }

    /// Tile column/row containing this point.
    pub fn cell(self) -> (i32, i32) {
        (
            (self.x / TILE_SIZE).floor() as i32,
            (self.y / TILE_SIZE).floor() as i32,
        )
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, o: Vec2) -> Vec2 { Vec2::new(self.x + o.x, self.y + o.y) }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, o: Vec2) -> Vec2 { Vec2::new(self.x - o.x, self.y - o.y) }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;
    fn mul(self, s: f32) -> Vec2 { Vec2::new(self.x * s, self.y * s) }
}

impl Div<f32> for Vec2 {
    type Output = Vec2;
    fn div(self, s: f32) -> Vec2 { Vec2::new(self.x / s, self.y / s) }
}

impl Neg for Vec2 {
    type Output = Vec2;
    fn neg(self) -> Vec2 { Vec2::new(-self.x, -self.y) }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, o: Vec2) { self.x += o.x; self.y += o.y; }
}

impl SubAssign for Vec2 {
    fn sub_assign(&mut self, o: Vec2) { self.x -= o.x; self.y -= o.y; }
}

/// Round half away from zero, matching the network layer's integer encoding.
pub fn round_to_int(v: f32) -> i32 {
    v.round() as i32
}

/// Unit direction for an angle in radians (screen space: positive y is down).
pub fn direction(angle: f32) -> Vec2 {
    Vec2::new(angle.cos(), angle.sin())
}

/// Closest point to `p` on the segment `a..b`.
pub fn closest_point_on_segment(a: Vec2, b: Vec2, p: Vec2) -> Vec2 {
    let ab = b - a;
    let len_sq = ab.dot(ab);
    if len_sq == 0.0 {
        return a;
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

/// Add `b` to `a` without pushing the result past `max` in the direction of `b`.
/// Values already beyond `max` are left where they are.
pub fn saturated_add(min: f32, max: f32, a: f32, b: f32) -> f32 {
    if b > 0.0 {
        if a < max { (a + b).min(max) } else { a }
    } else if a > min {
        (a + b).max(min)
    } else {
        a
    }
}
