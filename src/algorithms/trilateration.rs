//! Tag position from filtered anchor ranges
//!
//! Runs on the host receiving link frames. Two anchors give a position on one
//! side of their baseline by the law of cosines; three or more are solved as a
//! nonlinear least-squares problem in 3-D, starting from the anchor centroid,
//! and reported in the horizontal plane.

use std::collections::BTreeMap;

use nalgebra::{Matrix3, Vector2, Vector3};
use serde::Serialize;
use thiserror::Error;
use tracing::trace;

use crate::core::ShortAddress;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocateError {
    #[error("Insufficient anchors: {available} usable, {required} required")]
    InsufficientAnchors { available: usize, required: usize },

    #[error("Degenerate anchor geometry: {reason}")]
    DegenerateGeometry { reason: String },

    #[error("Position solve failed to converge after {iterations} iterations")]
    NoConvergence { iterations: u32 },
}

/// Horizontal tag position in the anchor layout frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagFix {
    pub x_m: f64,
    pub y_m: f64,
    /// Anchors that contributed, in ascending address order
    pub anchors: Vec<ShortAddress>,
    /// RMS range residual of the solution (meters)
    pub residual_m: f64,
}

pub struct TagLocator {
    anchors: BTreeMap<ShortAddress, Vector3<f64>>,
    min_anchors: usize,
    max_accepted_range_m: f64,
    max_iterations: u32,
    convergence_tolerance: f64,
    regularization_lambda: f64,
}

impl Default for TagLocator {
    fn default() -> Self {
        Self {
            anchors: BTreeMap::new(),
            min_anchors: 3,
            max_accepted_range_m: 15.0,
            max_iterations: 50,
            convergence_tolerance: 1e-7,
            regularization_lambda: 1e-9,
        }
    }
}

impl TagLocator {
    pub fn new(min_anchors: usize, max_accepted_range_m: f64) -> Self {
        Self {
            min_anchors: min_anchors.max(2),
            max_accepted_range_m,
            ..Default::default()
        }
    }

    pub fn add_anchor(&mut self, address: ShortAddress, position: [f64; 3]) {
        self.anchors.insert(address, Vector3::from(position));
    }

    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }

    pub fn min_anchors(&self) -> usize {
        self.min_anchors
    }

    /// Ranges for surveyed anchors inside `(0, max_accepted_range_m)`; a later
    /// entry for the same anchor replaces an earlier one.
    pub fn accepted_ranges<I>(&self, ranges: I) -> BTreeMap<ShortAddress, f64>
    where
        I: IntoIterator<Item = (ShortAddress, f32)>,
    {
        ranges
            .into_iter()
            .filter(|(address, _)| self.anchors.contains_key(address))
            .map(|(address, range)| (address, f64::from(range)))
            .filter(|&(_, range)| range > 0.0 && range < self.max_accepted_range_m)
            .collect()
    }

    pub fn locate<I>(&self, ranges: I) -> Result<TagFix, LocateError>
    where
        I: IntoIterator<Item = (ShortAddress, f32)>,
    {
        let accepted = self.accepted_ranges(ranges);
        if accepted.len() < self.min_anchors {
            return Err(LocateError::InsufficientAnchors {
                available: accepted.len(),
                required: self.min_anchors,
            });
        }

        let addresses: Vec<ShortAddress> = accepted.keys().copied().collect();
        let positions: Vec<Vector3<f64>> = addresses.iter().map(|a| self.anchors[a]).collect();
        let distances: Vec<f64> = accepted.values().copied().collect();

        let (xy, residual_m) = if positions.len() == 2 {
            two_anchor_fix(&positions, &distances)?
        } else {
            self.least_squares_fix(&positions, &distances)?
        };

        Ok(TagFix {
            x_m: round_mm(xy.x),
            y_m: round_mm(xy.y),
            anchors: addresses,
            residual_m,
        })
    }

    /// Gauss-Newton on `sum (|p - a_i| - r_i)^2` from the anchor centroid
    fn least_squares_fix(
        &self,
        positions: &[Vector3<f64>],
        distances: &[f64],
    ) -> Result<(Vector2<f64>, f64), LocateError> {
        let n = positions.len() as f64;
        let mut estimate = positions.iter().fold(Vector3::zeros(), |acc, p| acc + p) / n;

        for iteration in 0..self.max_iterations {
            let mut jt_j = Matrix3::<f64>::zeros();
            let mut jt_r = Vector3::<f64>::zeros();

            for (anchor, &range) in positions.iter().zip(distances) {
                let delta = estimate - anchor;
                let predicted = delta.norm();
                if predicted < 1e-9 {
                    continue;
                }
                let row = delta / predicted;
                let residual = predicted - range;
                jt_j += row * row.transpose();
                jt_r += row * residual;
            }

            for i in 0..3 {
                jt_j[(i, i)] += self.regularization_lambda;
            }

            let step = jt_j
                .svd(true, true)
                .solve(&(-jt_r), 1e-12)
                .map_err(|e| LocateError::DegenerateGeometry { reason: e.to_string() })?;
            estimate += step;

            if step.norm() < self.convergence_tolerance {
                trace!(iteration, "position solve converged");
                let residual = rms_residual(positions, distances, &estimate);
                return Ok((estimate.xy(), residual));
            }
        }

        Err(LocateError::NoConvergence {
            iterations: self.max_iterations,
        })
    }
}

/// Position on the positive side of the baseline from the left-most anchor
/// to the right-most one, by the law of cosines.
fn two_anchor_fix(positions: &[Vector3<f64>], distances: &[f64]) -> Result<(Vector2<f64>, f64), LocateError> {
    let (left, right) = if positions[0].x <= positions[1].x { (0, 1) } else { (1, 0) };
    let (left_pos, right_pos) = (positions[left], positions[right]);
    let b = distances[left];
    let a = distances[right];
    let c = (right_pos - left_pos).norm();

    let baseline = (right_pos - left_pos).xy();
    let baseline_len = baseline.norm();
    if c < 1e-9 || baseline_len < 1e-9 {
        return Err(LocateError::DegenerateGeometry {
            reason: "anchors share the same horizontal position".to_string(),
        });
    }

    let cos_a = (b * b + c * c - a * a) / (2.0 * b * c);
    if cos_a * cos_a > 1.0 {
        return Err(LocateError::DegenerateGeometry {
            reason: format!("ranges {a:.3} and {b:.3} do not close a triangle over {c:.3}"),
        });
    }
    let sin_a = (1.0 - cos_a * cos_a).sqrt();

    let along = baseline / baseline_len;
    let across = Vector2::new(-along.y, along.x);
    let xy = left_pos.xy() + along * (b * cos_a) + across * (b * sin_a);
    Ok((xy, 0.0))
}

fn rms_residual(positions: &[Vector3<f64>], distances: &[f64], estimate: &Vector3<f64>) -> f64 {
    let sum: f64 = positions
        .iter()
        .zip(distances)
        .map(|(p, &r)| ((estimate - p).norm() - r).powi(2))
        .sum();
    (sum / positions.len() as f64).sqrt()
}

fn round_mm(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const A1: ShortAddress = ShortAddress(0xAAA1);
    const A2: ShortAddress = ShortAddress(0xAAA2);
    const A3: ShortAddress = ShortAddress(0xAAA3);
    const A4: ShortAddress = ShortAddress(0xAAA4);

    fn room_locator() -> TagLocator {
        let mut locator = TagLocator::new(3, 15.0);
        locator.add_anchor(A1, [0.0, 0.0, 1.651]);
        locator.add_anchor(A2, [0.7874, 2.667, 1.6764]);
        locator.add_anchor(A3, [3.2766, 1.3716, 0.7366]);
        locator.add_anchor(A4, [3.2766, 0.1524, 0.7366]);
        locator
    }

    fn exact_range(locator: &TagLocator, address: ShortAddress, tag: Vector3<f64>) -> f32 {
        (locator.anchors[&address] - tag).norm() as f32
    }

    #[test]
    fn test_four_anchor_fix() {
        let locator = room_locator();
        let tag = Vector3::new(1.06, 1.30, 1.2);
        let ranges: Vec<_> = [A1, A2, A3, A4]
            .into_iter()
            .map(|a| (a, exact_range(&locator, a, tag)))
            .collect();

        let fix = locator.locate(ranges).unwrap();
        assert!((fix.x_m - 1.06).abs() < 0.01, "x = {}", fix.x_m);
        assert!((fix.y_m - 1.30).abs() < 0.01, "y = {}", fix.y_m);
        assert_eq!(fix.anchors, vec![A1, A2, A3, A4]);
        assert!(fix.residual_m < 1e-3);
    }

    #[test]
    fn test_planar_three_anchor_fix() {
        let mut locator = TagLocator::new(3, 15.0);
        locator.add_anchor(A1, [0.0, 0.0, 0.0]);
        locator.add_anchor(A2, [4.0, 0.0, 0.0]);
        locator.add_anchor(A3, [0.0, 3.0, 0.0]);
        let tag = Vector3::new(1.5, 1.0, 0.0);
        let ranges: Vec<_> = [A1, A2, A3]
            .into_iter()
            .map(|a| (a, exact_range(&locator, a, tag)))
            .collect();

        let fix = locator.locate(ranges).unwrap();
        assert!((fix.x_m - 1.5).abs() < 1e-3);
        assert!((fix.y_m - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_two_anchor_fix() {
        let mut locator = TagLocator::new(2, 15.0);
        locator.add_anchor(A2, [3.0, 0.0, 0.0]);
        locator.add_anchor(A1, [0.0, 0.0, 0.0]);

        // 3-4-5 triangle over the baseline
        let fix = locator.locate([(A1, 4.0), (A2, 5.0)]).unwrap();
        assert!((fix.x_m - 0.0).abs() < 1e-3);
        assert!((fix.y_m - 4.0).abs() < 1e-3);
    }

    #[test]
    fn test_two_anchor_inconsistent_ranges() {
        let mut locator = TagLocator::new(2, 15.0);
        locator.add_anchor(A1, [0.0, 0.0, 0.0]);
        locator.add_anchor(A2, [1.0, 0.0, 0.0]);
        assert!(matches!(
            locator.locate([(A1, 5.0), (A2, 1.0)]),
            Err(LocateError::DegenerateGeometry { .. })
        ));
    }

    #[test]
    fn test_rejects_unknown_and_out_of_range() {
        let locator = room_locator();
        let ranges = [
            (A1, 2.0),
            (A2, 0.0),
            (A3, 16.0),
            (ShortAddress(0xBEEF), 2.0),
        ];
        let accepted = locator.accepted_ranges(ranges);
        assert_eq!(accepted.len(), 1);
        assert_eq!(
            locator.locate(ranges),
            Err(LocateError::InsufficientAnchors { available: 1, required: 3 })
        );
    }

    #[test]
    fn test_min_anchors_floor() {
        assert_eq!(TagLocator::new(0, 15.0).min_anchors(), 2);
    }

    #[test]
    fn test_rounding() {
        assert_eq!(round_mm(1.23456), 1.235);
        assert_eq!(round_mm(-0.0004), -0.0);
    }
}
