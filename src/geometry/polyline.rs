//! Sampled 2D paths: length, pointwise distance, resampling.

use super::vector::{Vec2, add, cross, distance, scale, sub};
use crate::mech_error::MechError;
use itertools::Itertools;

/// Sum of segment lengths.
pub fn path_length(points: &[Vec2]) -> f64 {
    points
        .iter()
        .tuple_windows()
        .map(|(a, b)| distance(*a, *b))
        .sum()
}

/// `sqrt(sum |a_i - b_i|^2)` over two equally sampled paths.
pub fn pointwise_distance(a: &[Vec2], b: &[Vec2]) -> Result<f64, MechError> {
    if a.len() != b.len() {
        return Err(MechError::PathLengthMismatch {
            expected: b.len(),
            found: a.len(),
        });
    }
    let sq: f64 = a
        .iter()
        .zip(b)
        .map(|(p, q)| {
            let d = sub(*p, *q);
            d[0] * d[0] + d[1] * d[1]
        })
        .sum();
    Ok(sq.sqrt())
}

/// Point at arc-length fraction `t` in `[0, 1]` along the path.
pub fn point_at(points: &[Vec2], t: f64) -> Option<Vec2> {
    let first = *points.first()?;
    let total = path_length(points);
    if total <= 0.0 {
        return Some(first);
    }
    let mut remaining = t.clamp(0.0, 1.0) * total;
    for (a, b) in points.iter().tuple_windows() {
        let seg = distance(*a, *b);
        if remaining <= seg && seg > 0.0 {
            return Some(add(*a, scale(sub(*b, *a), remaining / seg)));
        }
        remaining -= seg;
    }
    points.last().copied()
}

/// Resample `points` to `n` samples spaced uniformly by arc length.
///
/// The first and last samples coincide with the path's endpoints.
pub fn resample(points: &[Vec2], n: usize) -> Vec<Vec2> {
    match (points.len(), n) {
        (0, _) | (_, 0) => Vec::new(),
        (_, 1) => vec![points[0]],
        _ => (0..n)
            .filter_map(|i| point_at(points, i as f64 / (n - 1) as f64))
            .collect(),
    }
}

/// Number of sign changes of the turning direction along the path.
///
/// Collinear corners (|cross| below `eps`) do not count.
pub fn inflection_points(points: &[Vec2], eps: f64) -> usize {
    points
        .iter()
        .tuple_windows()
        .map(|(a, b, c)| cross(sub(*b, *a), sub(*c, *b)))
        .filter(|t| t.abs() > eps)
        .map(f64::signum)
        .tuple_windows()
        .filter(|(s, t)| s != t)
        .count()
}
