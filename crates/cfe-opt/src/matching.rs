//! Iterative 24/7 CFE matching — the fixed-point core
//!
//! The carbon-matching constraint prices grid imports with the grid's own
//! clean fraction. That fraction depends on the optimized dispatch, and the
//! dispatch depends on the fraction: modeling both as decision variables
//! would put their product in the constraint and make the problem
//! non-convex. Instead the loop alternates between solving the LP with the
//! grid CFE fixed as a coefficient vector and re-estimating the vector from
//! the resulting dispatch, until the estimate stabilizes.
//!
//! This is a Gauss-Seidel-style relaxation: convergence is not guaranteed
//! for arbitrary topologies or targets, and the iteration cap is a safety
//! valve, not a proof. Hitting the cap is reported as a normal outcome, not
//! an error, so callers can inspect the trace and decide whether the last
//! iterate is acceptable.

use cfe_core::{BusId, GenId, LinkId, LinkRole, Network};
use serde::{Deserialize, Serialize};

use crate::estimator::grid_supply_cfe;
use crate::model::{
    Coefficient, ConstraintSpec, DispatchModel, DispatchSolution, LinearTerm, OptError, Sense,
    SolverConfig, VarRef,
};

/// Tag carried by every constraint the Constrain state adds; stripping this
/// tag removes exactly the previous iteration's constraint set.
pub const CFE_CONSTRAINT_TAG: &str = "cfe";

/// Parameters of one hourly-matching run.
#[derive(Debug, Clone)]
pub struct MatchingConfig {
    /// Target CFE score in [0, 1]
    pub cfe_target: f64,
    /// Maximum export-to-demand energy ratio
    pub max_excess_ratio: f64,
    /// Absolute tolerance on the change of sum(GridCFE) between iterations
    pub tolerance: f64,
    /// Hard cap on fixed-point iterations
    pub max_iterations: usize,
    pub solver: SolverConfig,
}

impl MatchingConfig {
    pub fn new(cfe_target: f64, max_excess_ratio: f64) -> Self {
        Self {
            cfe_target,
            max_excess_ratio,
            tolerance: 0.01,
            max_iterations: 100,
            solver: SolverConfig::default(),
        }
    }

    fn validate(&self) -> Result<(), OptError> {
        if !(0.0..=1.0).contains(&self.cfe_target) {
            return Err(OptError::Config(format!(
                "CFE target {} is outside [0, 1]",
                self.cfe_target
            )));
        }
        if self.max_excess_ratio < 0.0 {
            return Err(OptError::Config("max excess ratio must be >= 0".into()));
        }
        if self.tolerance <= 0.0 {
            return Err(OptError::Config("tolerance must be positive".into()));
        }
        if self.max_iterations < 2 {
            return Err(OptError::Config("at least 2 iterations are required".into()));
        }
        Ok(())
    }
}

/// Append-only record of the per-snapshot grid CFE vector of every
/// fixed-point iteration. Column `k` (1-based) is the vector the LP of
/// iteration `k` was constrained with; the first column is the all-zero
/// seed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GridCfeTrace {
    iterations: Vec<Vec<f64>>,
}

impl GridCfeTrace {
    pub fn push(&mut self, vector: Vec<f64>) {
        self.iterations.push(vector);
    }

    /// Number of recorded iterations (columns).
    pub fn len(&self) -> usize {
        self.iterations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.iterations.is_empty()
    }

    /// Iteration vectors in order, one per column.
    pub fn iterations(&self) -> &[Vec<f64>] {
        &self.iterations
    }

    pub fn latest(&self) -> Option<&[f64]> {
        self.iterations.last().map(|v| v.as_slice())
    }

    /// Snapshot count (row count) of the trace.
    pub fn num_snapshots(&self) -> usize {
        self.iterations.first().map(|v| v.len()).unwrap_or(0)
    }
}

/// Terminal state of a matching run.
#[derive(Debug, Clone)]
pub struct MatchingOutcome {
    /// Solution of the last solved iteration; its dispatch is already
    /// written into the network
    pub solution: DispatchSolution,
    pub trace: GridCfeTrace,
    /// Completed iterations (equals the trace's column count)
    pub iterations: usize,
    /// Whether the grid CFE estimate stabilized within the tolerance
    pub converged: bool,
}

/// Per-consumer-bus variable references resolved once per Constrain pass.
struct ConsumerAssets {
    generators: Vec<GenId>,
    imports: Vec<LinkId>,
    exports: Vec<LinkId>,
    charges: Vec<LinkId>,
    discharges: Vec<LinkId>,
    demand: Vec<f64>,
}

fn resolve_consumer_assets(network: &Network, ci_bus: BusId) -> Result<ConsumerAssets, OptError> {
    let generators: Vec<GenId> = network
        .generators_at_bus(ci_bus)
        .into_iter()
        .map(|g| g.id)
        .collect();
    let mut imports = Vec::new();
    let mut exports = Vec::new();
    let mut charges = Vec::new();
    let mut discharges = Vec::new();
    for link in network.links() {
        match link.role {
            LinkRole::Import(bus) if bus == ci_bus => imports.push(link.id),
            LinkRole::Export(bus) if bus == ci_bus => exports.push(link.id),
            LinkRole::StorageCharge(bus) if bus == ci_bus => charges.push(link.id),
            LinkRole::StorageDischarge(bus) if bus == ci_bus => discharges.push(link.id),
            _ => {}
        }
    }
    if imports.is_empty() || exports.is_empty() {
        return Err(OptError::Config(format!(
            "bus id {} has no import/export conduits; was the consumer subsystem constructed?",
            ci_bus.value()
        )));
    }
    let demand = network.demand_at_bus(ci_bus);
    Ok(ConsumerAssets {
        generators,
        imports,
        exports,
        charges,
        discharges,
        demand,
    })
}

/// The Constrain state: strip any previously added CFE constraints, then add
/// the four matching constraints per consumer bus with `grid_cfe` as a fixed
/// coefficient vector. Idempotent — applying it twice in a row leaves
/// exactly one constraint set.
pub fn apply_cfe_constraints(
    network: &Network,
    model: &mut DispatchModel,
    consumer_buses: &[BusId],
    grid_cfe: &[f64],
    cfe_target: f64,
    max_excess_ratio: f64,
) -> Result<(), OptError> {
    model.retain_untagged(CFE_CONSTRAINT_TAG);
    let weights = network.snapshots.weights();

    for &ci_bus in consumer_buses {
        let assets = resolve_consumer_assets(network, ci_bus)?;
        let weighted_demand: f64 = assets
            .demand
            .iter()
            .zip(weights)
            .map(|(d, w)| d * w)
            .sum();

        // 1. Demand balance (equality, per snapshot):
        //    demand = generation - export + import + discharge - charge
        let mut balance = Vec::new();
        balance.extend(
            assets
                .generators
                .iter()
                .map(|&g| LinearTerm::unit(VarRef::GeneratorDispatch(g))),
        );
        balance.extend(
            assets
                .exports
                .iter()
                .map(|&l| LinearTerm::scaled(VarRef::LinkFlow(l), -1.0)),
        );
        balance.extend(
            assets
                .imports
                .iter()
                .map(|&l| LinearTerm::unit(VarRef::LinkFlow(l))),
        );
        balance.extend(
            assets
                .discharges
                .iter()
                .map(|&l| LinearTerm::unit(VarRef::LinkFlow(l))),
        );
        balance.extend(
            assets
                .charges
                .iter()
                .map(|&l| LinearTerm::scaled(VarRef::LinkFlow(l), -1.0)),
        );
        model.add_spec(ConstraintSpec::per_snapshot(
            CFE_CONSTRAINT_TAG,
            balance,
            Sense::Eq,
            Coefficient::PerSnapshot(assets.demand.clone()),
        ));

        // 2. CFE target (inequality over the horizon): carbon-weighted
        //    procurement reaches the target share of total consumption,
        //    with imports credited at the grid's clean fraction
        let mut target_terms = Vec::new();
        target_terms.extend(
            assets
                .generators
                .iter()
                .map(|&g| LinearTerm::unit(VarRef::GeneratorDispatch(g))),
        );
        target_terms.extend(
            assets
                .exports
                .iter()
                .map(|&l| LinearTerm::scaled(VarRef::LinkFlow(l), -1.0)),
        );
        target_terms.extend(
            assets
                .imports
                .iter()
                .map(|&l| LinearTerm::per_snapshot(VarRef::LinkFlow(l), grid_cfe.to_vec())),
        );
        target_terms.extend(
            assets
                .charges
                .iter()
                .map(|&l| LinearTerm::scaled(VarRef::LinkFlow(l), -cfe_target)),
        );
        target_terms.extend(
            assets
                .discharges
                .iter()
                .map(|&l| LinearTerm::scaled(VarRef::LinkFlow(l), cfe_target)),
        );
        model.add_spec(ConstraintSpec::snapshot_sum(
            CFE_CONSTRAINT_TAG,
            target_terms,
            Sense::Geq,
            cfe_target * weighted_demand,
        ));

        // 3. Excess cap: exported energy bounded by a share of demand
        let excess_terms = assets
            .exports
            .iter()
            .map(|&l| LinearTerm::unit(VarRef::LinkFlow(l)))
            .collect();
        model.add_spec(ConstraintSpec::snapshot_sum(
            CFE_CONSTRAINT_TAG,
            excess_terms,
            Sense::Leq,
            max_excess_ratio * weighted_demand,
        ));

        // 4. Clean charging: storage may only charge from the consumer's own
        //    portfolio, never net-metered from grid import
        let mut charge_terms: Vec<LinearTerm> = assets
            .generators
            .iter()
            .map(|&g| LinearTerm::unit(VarRef::GeneratorDispatch(g)))
            .collect();
        charge_terms.extend(
            assets
                .charges
                .iter()
                .map(|&l| LinearTerm::scaled(VarRef::LinkFlow(l), -1.0)),
        );
        model.add_spec(ConstraintSpec::per_snapshot(
            CFE_CONSTRAINT_TAG,
            charge_terms,
            Sense::Geq,
            Coefficient::Scalar(0.0),
        ));
    }
    Ok(())
}

/// Run hourly CFE matching to a fixed point of the grid supply CFE.
///
/// `model` carries any persistent (brownfield/policy) constraint specs;
/// they are kept across iterations while the CFE-tagged set is replaced.
/// The last solved dispatch is left in the network. On infeasibility the
/// error names the failing iteration and `model` still holds the exact
/// constraint set that was active, so callers can inspect it.
pub fn run_cfe_matching(
    network: &mut Network,
    model: &mut DispatchModel,
    consumer_buses: &[BusId],
    config: &MatchingConfig,
) -> Result<MatchingOutcome, OptError> {
    config.validate()?;
    let nt = network.snapshots.len();
    if consumer_buses.is_empty() {
        return Err(OptError::Config("no consumer buses given".into()));
    }

    let mut trace = GridCfeTrace::default();
    // First pass assumes the grid supplies no clean energy at all
    let mut grid_cfe = vec![0.0; nt];
    trace.push(grid_cfe.clone());
    let mut k = 1usize;

    loop {
        apply_cfe_constraints(
            network,
            model,
            consumer_buses,
            &grid_cfe,
            config.cfe_target,
            config.max_excess_ratio,
        )?;
        let solution = model
            .solve(network, &config.solver)
            .map_err(|e| e.with_iteration(k))?;

        let next = grid_supply_cfe(network);
        let prev_sum: f64 = grid_cfe.iter().sum();
        let next_sum: f64 = next.iter().sum();
        let delta = (next_sum - prev_sum).abs();
        trace.push(next.clone());
        grid_cfe = next;
        k += 1;

        tracing::info!(
            iteration = k,
            delta,
            grid_cfe_sum = next_sum,
            "grid supply CFE iteration"
        );

        if delta <= config.tolerance {
            return Ok(MatchingOutcome {
                solution,
                iterations: trace.len(),
                trace,
                converged: true,
            });
        }
        if k >= config.max_iterations {
            tracing::warn!(
                iterations = k,
                delta,
                tolerance = config.tolerance,
                "grid supply CFE did not converge within the iteration cap"
            );
            return Ok(MatchingOutcome {
                solution,
                iterations: trace.len(),
                trace,
                converged: false,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystem::{attach_consumer_systems, SubsystemSpec};
    use cfe_core::{Carrier, Generator, Load, Profile, Snapshots};

    fn prepared_network() -> (Network, Vec<BusId>) {
        let mut network = Network::new();
        network.set_snapshots(Snapshots::hourly(4));
        network.add_carrier(Carrier::new("solar", 0.0)).unwrap();
        network.add_carrier(Carrier::new("gas", 0.2)).unwrap();
        let bus = network.add_bus("R1", 0.0, 0.0).unwrap();
        network
            .add_generator(
                Generator::new("R1 solar", bus)
                    .with_technology("solar", "solar")
                    .with_nameplate(20.0, false)
                    .with_profile(Profile::Series(vec![1.0, 1.0, 0.0, 0.0])),
            )
            .unwrap();
        network
            .add_generator(
                Generator::new("R1 gas", bus)
                    .with_technology("gas", "gas")
                    .with_nameplate(50.0, false)
                    .with_costs(40.0, 0.0),
            )
            .unwrap();
        network
            .add_load(Load::new("R1 load", bus, vec![4.0, 10.0, 6.0, 2.0]))
            .unwrap();
        let ci = attach_consumer_systems(
            &mut network,
            &[bus],
            &SubsystemSpec {
                load_fraction: 0.5,
                palette: vec!["solar".into()],
                extendable: true,
            },
        )
        .unwrap();
        (network, ci)
    }

    #[test]
    fn test_constrain_is_idempotent() {
        let (network, ci) = prepared_network();
        let mut model = DispatchModel::new();
        let grid_cfe = vec![0.0; 4];
        apply_cfe_constraints(&network, &mut model, &ci, &grid_cfe, 0.9, 0.2).unwrap();
        let first = model.count_tagged(CFE_CONSTRAINT_TAG);
        assert_eq!(first, 4);
        apply_cfe_constraints(&network, &mut model, &ci, &grid_cfe, 0.9, 0.2).unwrap();
        assert_eq!(model.count_tagged(CFE_CONSTRAINT_TAG), first);
    }

    #[test]
    fn test_constrain_preserves_other_tags() {
        let (network, ci) = prepared_network();
        let mut model = DispatchModel::new();
        model.add_spec(ConstraintSpec::snapshot_sum(
            "policy",
            vec![],
            Sense::Geq,
            0.0,
        ));
        apply_cfe_constraints(&network, &mut model, &ci, &[0.0; 4], 0.9, 0.2).unwrap();
        assert_eq!(model.count_tagged("policy"), 1);
    }

    #[test]
    fn test_missing_subsystem_rejected() {
        let (network, _) = prepared_network();
        let mut model = DispatchModel::new();
        // A grid bus without conduits is not a consumer bus
        let grid_bus = network.bus_by_name("R1").unwrap().id;
        let err =
            apply_cfe_constraints(&network, &mut model, &[grid_bus], &[0.0; 4], 0.9, 0.2)
                .unwrap_err();
        assert!(matches!(err, OptError::Config(_)));
    }

    #[test]
    fn test_config_validation() {
        let mut config = MatchingConfig::new(1.5, 0.2);
        assert!(config.validate().is_err());
        config.cfe_target = 0.9;
        assert!(config.validate().is_ok());
        config.tolerance = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_trace_accessors() {
        let mut trace = GridCfeTrace::default();
        assert!(trace.is_empty());
        trace.push(vec![0.0, 0.0]);
        trace.push(vec![0.5, 0.25]);
        assert_eq!(trace.len(), 2);
        assert_eq!(trace.num_snapshots(), 2);
        assert_eq!(trace.latest(), Some(&[0.5, 0.25][..]));
    }
}
