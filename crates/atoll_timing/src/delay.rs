//! Wirelength-based interconnect delay model.
//!
//! Edge delay is a function of Manhattan pin distance, evaluated through a
//! per-device calibration table, plus a fixed penalty for every crossed
//! clock-region column. The table is device-specific so recalibration
//! never touches the propagation code.

use atoll_device::Device;
use serde::{Deserialize, Serialize};

/// Delay charged per crossed clock-region column, in ns.
pub const CLOCK_REGION_CROSSING_PENALTY: f64 = 0.5;

/// A piecewise-linear Manhattan-distance to delay table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelayModel {
    /// `(distance, ns)` calibration points, sorted by distance, starting
    /// at `(0, 0)`. Delay is interpolated between points and extrapolated
    /// from the last segment beyond the table.
    points: Vec<(f64, f64)>,
    /// Vertical vs. horizontal distance weighting.
    y2x_ratio: f64,
}

impl DelayModel {
    /// Default calibration points for the supported fabric family.
    const DEFAULT_POINTS: [(f64, f64); 7] = [
        (0.0, 0.0),
        (1.0, 0.2),
        (5.0, 0.7),
        (10.0, 1.2),
        (20.0, 2.1),
        (40.0, 3.8),
        (80.0, 7.0),
    ];

    /// Builds the calibration table for the target device.
    ///
    /// All currently supported devices share one fabric family, so the
    /// same table is returned; the constructor keeps the calibration
    /// per-device so family-specific tables slot in without API changes.
    pub fn for_device(_device: &Device, y2x_ratio: f64) -> Self {
        Self {
            points: Self::DEFAULT_POINTS.to_vec(),
            y2x_ratio,
        }
    }

    /// Builds a model from explicit calibration points.
    pub fn from_points(points: Vec<(f64, f64)>, y2x_ratio: f64) -> Self {
        debug_assert!(points.windows(2).all(|w| w[0].0 < w[1].0));
        Self { points, y2x_ratio }
    }

    /// Evaluates the delay for a displacement of `(dx, dy)`, in ns.
    pub fn delay(&self, dx: f64, dy: f64) -> f64 {
        let distance = dx.abs() + self.y2x_ratio * dy.abs();
        self.delay_for_distance(distance)
    }

    fn delay_for_distance(&self, distance: f64) -> f64 {
        let points = &self.points;
        if points.is_empty() {
            return 0.0;
        }
        if distance <= points[0].0 {
            return points[0].1;
        }
        for w in points.windows(2) {
            let (d0, t0) = w[0];
            let (d1, t1) = w[1];
            if distance <= d1 {
                return t0 + (t1 - t0) * (distance - d0) / (d1 - d0);
            }
        }
        // Extrapolate from the last segment.
        let (d0, t0) = points[points.len() - 2];
        let (d1, t1) = points[points.len() - 1];
        t1 + (t1 - t0) * (distance - d1) / (d1 - d0)
    }
}
