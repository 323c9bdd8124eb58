//! Planar vector helpers on `[f64; 2]`.

/// A 2D position or displacement.
pub type Vec2 = [f64; 2];

pub(crate) const EPS: f64 = 1e-12;

#[inline]
pub fn add(a: Vec2, b: Vec2) -> Vec2 {
    [a[0] + b[0], a[1] + b[1]]
}

#[inline]
pub fn sub(a: Vec2, b: Vec2) -> Vec2 {
    [a[0] - b[0], a[1] - b[1]]
}

#[inline]
pub fn scale(a: Vec2, s: f64) -> Vec2 {
    [a[0] * s, a[1] * s]
}

#[inline]
pub fn dot(a: Vec2, b: Vec2) -> f64 {
    a[0] * b[0] + a[1] * b[1]
}

#[inline]
pub fn cross(a: Vec2, b: Vec2) -> f64 {
    a[0] * b[1] - a[1] * b[0]
}

#[inline]
pub fn norm(a: Vec2) -> f64 {
    dot(a, a).sqrt()
}

#[inline]
pub fn distance(a: Vec2, b: Vec2) -> f64 {
    norm(sub(a, b))
}

/// Direction of `a` in radians, `atan2(y, x)`.
#[inline]
pub fn angle(a: Vec2) -> f64 {
    a[1].atan2(a[0])
}

/// Signed angle in radians that rotates `from` onto `to`, in `(-pi, pi]`.
#[inline]
pub fn signed_angle(from: Vec2, to: Vec2) -> f64 {
    cross(from, to).atan2(dot(from, to))
}

/// Rotate `a` counter-clockwise by `theta` radians.
#[inline]
pub fn rotate(a: Vec2, theta: f64) -> Vec2 {
    let (s, c) = theta.sin_cos();
    [a[0] * c - a[1] * s, a[0] * s + a[1] * c]
}

/// Unit vector at `theta` radians scaled to `len`.
#[inline]
pub fn polar(len: f64, theta: f64) -> Vec2 {
    let (s, c) = theta.sin_cos();
    [len * c, len * s]
}

/// `a` rescaled to length `len`. A zero vector stays zero.
pub fn with_length(a: Vec2, len: f64) -> Vec2 {
    let n = norm(a);
    if n < EPS { a } else { scale(a, len / n) }
}

/// `a` shortened to at most `max_len`.
pub fn clamp_length(a: Vec2, max_len: f64) -> Vec2 {
    if norm(a) > max_len {
        with_length(a, max_len)
    } else {
        a
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn close(a: Vec2, b: Vec2) -> bool {
        distance(a, b) < 1e-9
    }

    #[test]
    fn rotate_quarter_turn() {
        assert!(close(rotate([1.0, 0.0], FRAC_PI_2), [0.0, 1.0]));
        assert!(close(rotate([0.0, 2.0], -FRAC_PI_2), [2.0, 0.0]));
    }

    #[test]
    fn signed_angle_direction() {
        assert!((signed_angle([1.0, 0.0], [0.0, 1.0]) - FRAC_PI_2).abs() < 1e-12);
        assert!((signed_angle([0.0, 1.0], [1.0, 0.0]) + FRAC_PI_2).abs() < 1e-12);
        assert!((signed_angle([1.0, 0.0], [-1.0, 0.0]) - PI).abs() < 1e-12);
    }

    #[test]
    fn length_helpers() {
        assert!(close(with_length([3.0, 4.0], 10.0), [6.0, 8.0]));
        assert!(close(with_length([0.0, 0.0], 10.0), [0.0, 0.0]));
        assert!(close(clamp_length([3.0, 4.0], 2.5), [1.5, 2.0]));
        assert!(close(clamp_length([3.0, 4.0], 6.0), [3.0, 4.0]));
    }
}
