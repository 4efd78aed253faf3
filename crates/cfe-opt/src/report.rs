//! Post-solve reporting
//!
//! Realized (ex-post) metrics over a solved network: the hourly CFE score
//! actually achieved, total system emissions, and the consumer's
//! procurement mix.

use cfe_core::{BusId, LinkRole, Network};
use serde::Serialize;

/// Realized per-snapshot CFE score of the consumer systems:
/// `(ppa - export + import * grid_cfe + discharge - charge) / demand`.
///
/// Snapshots with zero consumer demand report 0.0.
pub fn cfe_score_series(
    network: &Network,
    consumer_buses: &[BusId],
    grid_cfe: &[f64],
) -> Vec<f64> {
    let nt = network.snapshots.len();
    let mut score = vec![0.0; nt];

    for t in 0..nt {
        let mut supply = 0.0;
        let mut demand = 0.0;
        for &ci_bus in consumer_buses {
            for gen in network.generators_at_bus(ci_bus) {
                supply += gen.p.get(t).copied().unwrap_or(0.0);
            }
            for link in network.links() {
                let flow = link.p0.get(t).copied().unwrap_or(0.0);
                match link.role {
                    LinkRole::Export(bus) if bus == ci_bus => supply -= flow,
                    LinkRole::Import(bus) if bus == ci_bus => {
                        supply += flow * grid_cfe.get(t).copied().unwrap_or(0.0)
                    }
                    LinkRole::StorageDischarge(bus) if bus == ci_bus => supply += flow,
                    LinkRole::StorageCharge(bus) if bus == ci_bus => supply -= flow,
                    _ => {}
                }
            }
            demand += network
                .demand_at_bus(ci_bus)
                .get(t)
                .copied()
                .unwrap_or(0.0);
        }
        score[t] = if demand.abs() < 1e-9 {
            0.0
        } else {
            supply / demand
        };
    }
    score
}

/// Total emissions over the horizon in tonnes CO2-eq, attributing fuel
/// input through generator efficiency.
pub fn total_emissions(network: &Network) -> f64 {
    let weights = network.snapshots.weights();
    let mut tonnes = 0.0;
    for gen in network.generators() {
        let intensity = network
            .carrier(&gen.carrier)
            .map(|c| c.co2_emissions)
            .unwrap_or(0.0);
        if intensity <= 0.0 || gen.efficiency <= 0.0 {
            continue;
        }
        for (t, w) in weights.iter().enumerate() {
            tonnes += gen.p.get(t).copied().unwrap_or(0.0) / gen.efficiency * intensity * w;
        }
    }
    tonnes
}

/// Fractional procurement mix of the consumer systems, relative to their
/// total demand over the horizon.
#[derive(Debug, Clone, Serialize)]
pub struct ProcurementSummary {
    /// Energy imported from the grid / total demand
    pub grid_supply: f64,
    /// Energy exported back to the grid / total demand
    pub excess: f64,
    /// Consumer-owned (PPA) generation / total demand
    pub ppa: f64,
}

impl ProcurementSummary {
    /// Format a human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "Procurement: PPA {:.1}% | grid supply {:.1}% | excess {:.1}%",
            self.ppa * 100.0,
            self.grid_supply * 100.0,
            self.excess * 100.0
        )
    }
}

pub fn procurement_summary(network: &Network, consumer_buses: &[BusId]) -> ProcurementSummary {
    let weights = network.snapshots.weights();
    let mut imports = 0.0;
    let mut exports = 0.0;
    let mut ppa = 0.0;
    let mut demand = 0.0;

    for &ci_bus in consumer_buses {
        for gen in network.generators_at_bus(ci_bus) {
            ppa += gen
                .p
                .iter()
                .zip(weights)
                .map(|(p, w)| p * w)
                .sum::<f64>();
        }
        for link in network.links() {
            let energy: f64 = link.p0.iter().zip(weights).map(|(p, w)| p * w).sum();
            match link.role {
                LinkRole::Import(bus) if bus == ci_bus => imports += energy,
                LinkRole::Export(bus) if bus == ci_bus => exports += energy,
                _ => {}
            }
        }
        demand += network
            .demand_at_bus(ci_bus)
            .iter()
            .zip(weights)
            .map(|(d, w)| d * w)
            .sum::<f64>();
    }

    if demand.abs() < 1e-9 {
        return ProcurementSummary {
            grid_supply: 0.0,
            excess: 0.0,
            ppa: 0.0,
        };
    }
    ProcurementSummary {
        grid_supply: imports / demand,
        excess: exports / demand,
        ppa: ppa / demand,
    }
}
