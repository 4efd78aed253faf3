//! Grid supply CFE estimator
//!
//! Computes, from a solved network's realized dispatch, the fraction of
//! grid (non-consumer) generation that comes from zero-carbon carriers,
//! per snapshot. Consumer-owned assets are excluded through their typed
//! role, so a C&I portfolio never inflates the grid's own score.

use std::collections::HashSet;

use cfe_core::{AssetRole, Network};

/// Per-snapshot clean fraction of grid supply, rounded to two decimals.
///
/// Snapshots where the grid dispatches nothing at all are reported as 0.0
/// (no clean supply), never as a NaN.
pub fn grid_supply_cfe(network: &Network) -> Vec<f64> {
    let clean: HashSet<&str> = network.clean_carrier_names().into_iter().collect();
    let nt = network.snapshots.len();
    let mut clean_mw = vec![0.0; nt];
    let mut total_mw = vec![0.0; nt];

    for gen in network
        .generators()
        .into_iter()
        .filter(|g| g.role == AssetRole::Grid)
    {
        let is_clean = clean.contains(gen.carrier.as_str());
        for t in 0..nt {
            let p = gen.p.get(t).copied().unwrap_or(0.0);
            total_mw[t] += p;
            if is_clean {
                clean_mw[t] += p;
            }
        }
    }

    (0..nt)
        .map(|t| {
            if total_mw[t] <= 1e-9 {
                0.0
            } else {
                round2(clean_mw[t] / total_mw[t])
            }
        })
        .collect()
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
