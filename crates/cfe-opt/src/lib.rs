//! # cfe-opt: Matching Optimization for Clean-Energy Procurement
//!
//! Capacity-expansion LP and the iterative 24/7 CFE matching loop on top of
//! the [`cfe_core`] network model.
//!
//! ## Pipeline
//!
//! | Stage | Entry point | What it does |
//! |-------|-------------|--------------|
//! | Subsystem construction | [`attach_consumer_systems`] | Carves a consumer sub-graph off each parent bus |
//! | Brownfield solve | [`DispatchModel::solve`] | Least-cost dispatch/expansion of the existing system |
//! | Capacity freeze | [`freeze_to_optimal`] | Locks grid capacities, keeps consumer assets extendable |
//! | Annual matching | [`apply_annual_matching`] | Volumetric target, single solve |
//! | Hourly matching | [`run_cfe_matching`] | Fixed-point loop over the grid supply CFE |
//!
//! ## The fixed point
//!
//! The hourly-matching constraint credits grid imports with the grid's own
//! clean fraction. Both the fraction and the import flows depend on the
//! dispatch, so their product would be bilinear; the loop in [`matching`]
//! keeps the fraction fixed per solve and re-estimates it from the result
//! ([`grid_supply_cfe`]) until the estimate stabilizes.
//!
//! ## Example
//!
//! ```ignore
//! use cfe_opt::{attach_consumer_systems, run_cfe_matching, DispatchModel, MatchingConfig, SubsystemSpec};
//!
//! let ci_buses = attach_consumer_systems(&mut network, &[bus], &spec)?;
//! let mut model = DispatchModel::new();
//! let outcome = run_cfe_matching(&mut network, &mut model, &ci_buses, &MatchingConfig::new(0.9, 0.2))?;
//! println!("converged: {} after {} iterations", outcome.converged, outcome.iterations);
//! ```

pub mod brownfield;
pub mod constraints;
pub mod estimator;
pub mod matching;
pub mod model;
pub mod report;
pub mod subsystem;

pub use brownfield::{
    allow_expansion, apply_annual_matching, freeze_to_optimal, ANNUAL_CONSTRAINT_TAG,
};
pub use constraints::{
    asset_utilization, bus_self_sufficiency, cofiring_linkage, policy_clean_share, AssetSelector,
    Cofiring, GeneratorSelector, LinkSelector, PolicyTarget, RoleFilter, SelfSufficiency,
    UtilizationBound, UtilizationRule,
};
pub use estimator::grid_supply_cfe;
pub use matching::{
    apply_cfe_constraints, run_cfe_matching, GridCfeTrace, MatchingConfig, MatchingOutcome,
    CFE_CONSTRAINT_TAG,
};
pub use model::{
    Aggregation, Coefficient, ConstraintSpec, DispatchModel, DispatchSolution, LinearTerm,
    OptError, Sense, SolverConfig, VarRef,
};
pub use report::{cfe_score_series, procurement_summary, total_emissions, ProcurementSummary};
pub use subsystem::{attach_consumer_systems, SubsystemSpec, LINK_COST_EPSILON};
