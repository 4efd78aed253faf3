//! Snapshot sequence with per-snapshot weights.
//!
//! A snapshot is one discretized time step of the modeled horizon; its weight
//! is the number of hours it represents. The weighted sum over the sequence
//! equals the modeled period's total hours, which is what annualized energy
//! sums and capital/marginal cost comparisons rely on.

use serde::{Deserialize, Serialize};

use crate::error::{CfeError, CfeResult};

/// Ordered, finite sequence of time indices with per-snapshot weights.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshots {
    weights: Vec<f64>,
}

impl Snapshots {
    /// `n` snapshots, each representing one hour.
    pub fn hourly(n: usize) -> Self {
        Self {
            weights: vec![1.0; n],
        }
    }

    /// Snapshots with explicit weights (hours represented per sample).
    /// All weights must be strictly positive.
    pub fn with_weights(weights: Vec<f64>) -> CfeResult<Self> {
        if weights.iter().any(|w| !w.is_finite() || *w <= 0.0) {
            return Err(CfeError::Validation(
                "snapshot weights must be finite and strictly positive".into(),
            ));
        }
        Ok(Self { weights })
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Weight (hours) of snapshot `t`.
    pub fn weight(&self, t: usize) -> f64 {
        self.weights[t]
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Total hours represented by the sequence.
    pub fn total_hours(&self) -> f64 {
        self.weights.iter().sum()
    }

    /// Iterate over snapshot indices.
    pub fn indices(&self) -> std::ops::Range<usize> {
        0..self.weights.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hourly_weights() {
        let snaps = Snapshots::hourly(24);
        assert_eq!(snaps.len(), 24);
        assert!((snaps.total_hours() - 24.0).abs() < 1e-12);
        assert!((snaps.weight(5) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_weighted_total_hours() {
        // 4 representative samples covering a 8760-hour year
        let snaps = Snapshots::with_weights(vec![2190.0, 2190.0, 2190.0, 2190.0]).unwrap();
        assert_eq!(snaps.len(), 4);
        assert!((snaps.total_hours() - 8760.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_nonpositive_weights() {
        assert!(Snapshots::with_weights(vec![1.0, 0.0]).is_err());
        assert!(Snapshots::with_weights(vec![1.0, -2.0]).is_err());
        assert!(Snapshots::with_weights(vec![f64::NAN]).is_err());
    }
}
