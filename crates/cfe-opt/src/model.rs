//! LP dispatch and capacity-expansion model
//!
//! Builds one linear program over the current network: one dispatch variable
//! per asset per snapshot, one capacity variable per extendable asset, nodal
//! balance and storage dynamics as structural constraints, and any number of
//! caller-supplied [`ConstraintSpec`]s on top.
//!
//! Extra constraints are carried as *tagged specifications* rather than
//! solver-side rows: the LP is materialized fresh on every
//! [`DispatchModel::solve`] call, so removing a prior iteration's
//! constraints is a retain over the spec list instead of a name-substring
//! scan of solver internals.
//!
//! This is an LP relaxation throughout: unit-commitment flags on generators
//! are carried as data but not enforced as binaries.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use cfe_core::{BusId, GenId, LinkId, Network, Profile, StorageId};
use good_lp::solvers::clarabel::clarabel;
use good_lp::{
    constraint, variable, variables, Expression, ResolutionError, Solution, SolverModel, Variable,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fallback capacity bound for assets without a finite limit.
pub const MAX_CAPACITY_MW: f64 = 1e6;

/// Optimization errors
#[derive(Debug, Clone, Error)]
pub enum OptError {
    /// Network cannot be turned into a well-posed LP
    #[error("Network validation error: {0}")]
    NetworkValidation(String),
    /// Bad constraint configuration (unknown asset reference, empty selector)
    #[error("Configuration error: {0}")]
    Config(String),
    /// The solver reported no feasible point for the active constraint set
    #[error("Problem infeasible{}", fmt_iteration(.iteration))]
    Infeasible { iteration: Option<usize> },
    /// Solver failed for another reason (unbounded, numerical error)
    #[error("Solver failed: {0}")]
    SolverFailed(String),
}

fn fmt_iteration(iteration: &Option<usize>) -> String {
    match iteration {
        Some(k) => format!(" at iteration {}", k),
        None => String::new(),
    }
}

impl OptError {
    /// Attach the fixed-point iteration number to an infeasibility.
    pub fn with_iteration(self, k: usize) -> Self {
        match self {
            OptError::Infeasible { .. } => OptError::Infeasible { iteration: Some(k) },
            other => other,
        }
    }
}

/// Reference to one family of per-snapshot decision variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VarRef {
    GeneratorDispatch(GenId),
    LinkFlow(LinkId),
    StorageDispatch(StorageId),
    StorageStore(StorageId),
}

/// A scalar coefficient, or one coefficient per snapshot (e.g. the grid CFE
/// vector applied to import flows).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Coefficient {
    Scalar(f64),
    PerSnapshot(Vec<f64>),
}

impl Coefficient {
    pub fn at(&self, t: usize) -> f64 {
        match self {
            Coefficient::Scalar(v) => *v,
            Coefficient::PerSnapshot(v) => v.get(t).copied().unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sense {
    Leq,
    Geq,
    Eq,
}

/// Whether a spec produces one constraint per snapshot or a single
/// constraint over the snapshot(-weighted) sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Aggregation {
    PerSnapshot,
    SnapshotSum,
}

/// One linear term: `coeff * var[t]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearTerm {
    pub var: VarRef,
    pub coeff: Coefficient,
}

impl LinearTerm {
    pub fn unit(var: VarRef) -> Self {
        Self {
            var,
            coeff: Coefficient::Scalar(1.0),
        }
    }

    pub fn scaled(var: VarRef, coeff: f64) -> Self {
        Self {
            var,
            coeff: Coefficient::Scalar(coeff),
        }
    }

    pub fn per_snapshot(var: VarRef, coeff: Vec<f64>) -> Self {
        Self {
            var,
            coeff: Coefficient::PerSnapshot(coeff),
        }
    }
}

/// A tagged linear constraint over dispatch variables, materialized at solve
/// time. The tag groups constraints for wholesale replacement (e.g. all CFE
/// constraints of the previous fixed-point iteration).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintSpec {
    pub tag: String,
    pub terms: Vec<LinearTerm>,
    pub sense: Sense,
    pub rhs: Coefficient,
    pub aggregation: Aggregation,
    /// Multiply each snapshot's contribution by the snapshot weight when
    /// aggregating (energy sums); ignored for per-snapshot constraints.
    pub weighted: bool,
}

impl ConstraintSpec {
    /// One constraint per snapshot: `sum(terms[t]) <sense> rhs[t]`.
    pub fn per_snapshot(
        tag: impl Into<String>,
        terms: Vec<LinearTerm>,
        sense: Sense,
        rhs: Coefficient,
    ) -> Self {
        Self {
            tag: tag.into(),
            terms,
            sense,
            rhs,
            aggregation: Aggregation::PerSnapshot,
            weighted: false,
        }
    }

    /// One snapshot-weighted energy constraint: `sum_t w_t * terms[t] <sense> rhs`.
    pub fn snapshot_sum(
        tag: impl Into<String>,
        terms: Vec<LinearTerm>,
        sense: Sense,
        rhs: f64,
    ) -> Self {
        Self {
            tag: tag.into(),
            terms,
            sense,
            rhs: Coefficient::Scalar(rhs),
            aggregation: Aggregation::SnapshotSum,
            weighted: true,
        }
    }
}

/// Solver configuration
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Whether to log the materialized problem size
    pub verbose: bool,
    /// Upper bound substituted for unbounded capacities
    pub capacity_bound_mw: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            capacity_bound_mw: MAX_CAPACITY_MW,
        }
    }
}

/// Result of one LP solve. Dispatch and optimized capacities are written
/// back into the network; this struct carries the scalar outcome.
#[derive(Debug, Clone)]
pub struct DispatchSolution {
    pub optimal: bool,
    /// Variable cost captured by the LP objective: capital cost of
    /// extendable capacity plus snapshot-weighted marginal cost
    pub objective: f64,
    pub solve_time: Duration,
    pub status_message: String,
}

impl DispatchSolution {
    /// Format a human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "Dispatch solution: {} | objective {:.2} | {:.2?}",
            if self.optimal { "optimal" } else { "failed" },
            self.objective,
            self.solve_time
        )
    }
}

/// The optimization model: a network plus a list of tagged constraint specs.
///
/// The model itself is cheap to clone and holds no solver state; `solve`
/// materializes and solves the LP for whatever network it is given.
#[derive(Debug, Clone, Default)]
pub struct DispatchModel {
    specs: Vec<ConstraintSpec>,
}

impl DispatchModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one tagged constraint spec.
    pub fn add_spec(&mut self, spec: ConstraintSpec) {
        self.specs.push(spec);
    }

    pub fn specs(&self) -> &[ConstraintSpec] {
        &self.specs
    }

    /// Drop every spec carrying `tag`, keeping the rest. Used to strip the
    /// previous fixed-point iteration's constraints before re-adding them.
    pub fn retain_untagged(&mut self, tag: &str) {
        self.specs.retain(|s| s.tag != tag);
    }

    pub fn count_tagged(&self, tag: &str) -> usize {
        self.specs.iter().filter(|s| s.tag == tag).count()
    }

    /// Materialize the LP for `network`, solve it, and write dispatch and
    /// optimized capacities back into the network.
    pub fn solve(
        &self,
        network: &mut Network,
        config: &SolverConfig,
    ) -> Result<DispatchSolution, OptError> {
        let start = Instant::now();
        let nt = network.snapshots.len();
        if nt == 0 {
            return Err(OptError::NetworkValidation(
                "network has no snapshots".into(),
            ));
        }
        if network.buses().is_empty() {
            return Err(OptError::NetworkValidation("network has no buses".into()));
        }
        let weights: Vec<f64> = network.snapshots.weights().to_vec();
        let cap_bound = config.capacity_bound_mw;

        // Extract plain data first so the good_lp build does not hold
        // borrows of the network.
        let gens: Vec<GenData> = network.generators().iter().map(|g| GenData::from(*g)).collect();
        let links: Vec<LinkData> = network.links().iter().map(|l| LinkData::from(*l)).collect();
        let storages: Vec<StorageData> = network
            .storage_units()
            .iter()
            .map(|s| StorageData::from(*s))
            .collect();
        let bus_ids: Vec<BusId> = network.buses().iter().map(|b| b.id).collect();
        let demand: HashMap<BusId, Vec<f64>> = bus_ids
            .iter()
            .map(|&b| (b, network.demand_at_bus(b)))
            .collect();

        // === Variables and objective ===
        let mut vars = variables!();
        let mut objective = Expression::from(0.0);

        let mut gen_vars: HashMap<GenId, AssetVars> = HashMap::new();
        for gen in &gens {
            let p_nom = if gen.extendable {
                let v = vars.add(variable().min(gen.p_nom_min.max(0.0)).max(cap_bound));
                objective += gen.capital_cost * v;
                Some(v)
            } else {
                None
            };
            let mut p = Vec::with_capacity(nt);
            for t in 0..nt {
                let var = if gen.extendable {
                    vars.add(variable().min(0.0).max(cap_bound))
                } else {
                    let hi = gen.p_max_pu.at(t) * gen.p_nom;
                    let lo = (gen.p_min_pu * gen.p_nom).min(hi);
                    vars.add(variable().min(lo).max(hi))
                };
                objective += weights[t] * gen.marginal_cost * var;
                p.push(var);
            }
            gen_vars.insert(gen.id, AssetVars { p, p_nom });
        }

        let mut link_vars: HashMap<LinkId, AssetVars> = HashMap::new();
        for link in &links {
            let p_nom = if link.extendable {
                let v = vars.add(variable().min(link.p_nom_min.max(0.0)).max(cap_bound));
                objective += link.capital_cost * v;
                Some(v)
            } else {
                None
            };
            let mut p = Vec::with_capacity(nt);
            for t in 0..nt {
                let hi = if link.extendable { cap_bound } else { link.p_nom };
                let var = vars.add(variable().min(0.0).max(hi));
                objective += weights[t] * link.marginal_cost * var;
                p.push(var);
            }
            link_vars.insert(link.id, AssetVars { p, p_nom });
        }

        let mut storage_vars: HashMap<StorageId, StorageVars> = HashMap::new();
        for sto in &storages {
            let p_nom = if sto.extendable {
                let v = vars.add(variable().min(sto.p_nom_min.max(0.0)).max(cap_bound));
                objective += sto.capital_cost * v;
                Some(v)
            } else {
                None
            };
            let power_cap = if sto.extendable { cap_bound } else { sto.p_nom };
            let energy_cap = if sto.extendable {
                cap_bound * sto.max_hours
            } else {
                sto.p_nom * sto.max_hours
            };
            let mut dispatch = Vec::with_capacity(nt);
            let mut store = Vec::with_capacity(nt);
            let mut soc = Vec::with_capacity(nt);
            for t in 0..nt {
                let d = vars.add(variable().min(0.0).max(power_cap));
                objective += weights[t] * sto.marginal_cost * d;
                dispatch.push(d);
                store.push(vars.add(variable().min(0.0).max(power_cap)));
                soc.push(vars.add(variable().min(0.0).max(energy_cap)));
            }
            storage_vars.insert(
                sto.id,
                StorageVars {
                    dispatch,
                    store,
                    soc,
                    p_nom,
                },
            );
        }

        let mut model = vars.minimise(objective.clone()).using(clarabel);

        // === Capacity coupling for extendable assets ===
        for gen in &gens {
            let av = &gen_vars[&gen.id];
            if let Some(p_nom) = av.p_nom {
                for t in 0..nt {
                    model = model.with(constraint!(av.p[t] - gen.p_max_pu.at(t) * p_nom <= 0.0));
                    if gen.p_min_pu > 0.0 {
                        model = model.with(constraint!(av.p[t] - gen.p_min_pu * p_nom >= 0.0));
                    }
                }
            }
        }
        for link in &links {
            let av = &link_vars[&link.id];
            if let Some(p_nom) = av.p_nom {
                for t in 0..nt {
                    model = model.with(constraint!(av.p[t] - p_nom <= 0.0));
                }
            }
        }
        for sto in &storages {
            let sv = &storage_vars[&sto.id];
            if let Some(p_nom) = sv.p_nom {
                for t in 0..nt {
                    model = model.with(constraint!(sv.dispatch[t] - p_nom <= 0.0));
                    model = model.with(constraint!(sv.store[t] - p_nom <= 0.0));
                    model = model.with(constraint!(sv.soc[t] - sto.max_hours * p_nom <= 0.0));
                }
            }
        }

        // === Ramp limits between consecutive snapshots ===
        for gen in &gens {
            let av = &gen_vars[&gen.id];
            for t in 1..nt {
                if let Some(ru) = gen.ramp_limit_up {
                    let cap: Expression = match av.p_nom {
                        Some(v) => ru * v,
                        None => (ru * gen.p_nom).into(),
                    };
                    model = model.with(constraint!(av.p[t] - av.p[t - 1] <= cap));
                }
                if let Some(rd) = gen.ramp_limit_down {
                    let cap: Expression = match av.p_nom {
                        Some(v) => rd * v,
                        None => (rd * gen.p_nom).into(),
                    };
                    model = model.with(constraint!(av.p[t - 1] - av.p[t] <= cap));
                }
            }
        }

        // === Storage state-of-charge dynamics ===
        for sto in &storages {
            let sv = &storage_vars[&sto.id];
            for t in 0..nt {
                let delta: Expression = weights[t]
                    * (sto.efficiency_store * sv.store[t]
                        - (1.0 / sto.efficiency_dispatch) * sv.dispatch[t]);
                if t > 0 {
                    model = model.with(constraint!(sv.soc[t] - sv.soc[t - 1] == delta));
                } else if sto.cyclic {
                    // Ending state equals starting state over the horizon
                    model = model.with(constraint!(sv.soc[0] - sv.soc[nt - 1] == delta));
                } else {
                    // Starts empty
                    model = model.with(constraint!(sv.soc[0] == delta));
                }
            }
        }

        // === Nodal balance per bus, per snapshot ===
        for &bus in &bus_ids {
            for t in 0..nt {
                let mut expr = Expression::from(0.0);
                for gen in gens.iter().filter(|g| g.bus == bus) {
                    expr += gen_vars[&gen.id].p[t];
                }
                for sto in storages.iter().filter(|s| s.bus == bus) {
                    let sv = &storage_vars[&sto.id];
                    expr += sv.dispatch[t];
                    expr -= sv.store[t];
                }
                for link in &links {
                    let av = &link_vars[&link.id];
                    if link.bus1 == bus {
                        expr += link.efficiency * av.p[t];
                    }
                    if link.bus0 == bus {
                        expr -= av.p[t];
                    }
                }
                let d = demand[&bus].get(t).copied().unwrap_or(0.0);
                model = model.with(constraint!(expr == d));
            }
        }

        // === Caller-supplied constraint specs ===
        for spec in &self.specs {
            match spec.aggregation {
                Aggregation::PerSnapshot => {
                    for t in 0..nt {
                        let mut expr = Expression::from(0.0);
                        for term in &spec.terms {
                            let vars_t =
                                resolve(&term.var, &gen_vars, &link_vars, &storage_vars)?;
                            expr += term.coeff.at(t) * vars_t[t];
                        }
                        let rhs = spec.rhs.at(t);
                        model = add_with_sense(model, expr, spec.sense, rhs);
                    }
                }
                Aggregation::SnapshotSum => {
                    let mut expr = Expression::from(0.0);
                    for term in &spec.terms {
                        let vars_t = resolve(&term.var, &gen_vars, &link_vars, &storage_vars)?;
                        for t in 0..nt {
                            let w = if spec.weighted { weights[t] } else { 1.0 };
                            expr += w * term.coeff.at(t) * vars_t[t];
                        }
                    }
                    let rhs = spec.rhs.at(0);
                    model = add_with_sense(model, expr, spec.sense, rhs);
                }
            }
        }

        if config.verbose {
            tracing::debug!(
                generators = gens.len(),
                links = links.len(),
                storage_units = storages.len(),
                snapshots = nt,
                specs = self.specs.len(),
                "materialized dispatch LP"
            );
        }

        // === Solve ===
        let solution = model.solve().map_err(|e| match e {
            ResolutionError::Infeasible => OptError::Infeasible { iteration: None },
            other => OptError::SolverFailed(format!("{:?}", other)),
        })?;

        // === Extract results and write back ===
        let mut objective_value = 0.0;

        let mut gen_results: HashMap<GenId, (Vec<f64>, f64)> = HashMap::new();
        for gen in &gens {
            let av = &gen_vars[&gen.id];
            let p: Vec<f64> = av.p.iter().map(|v| solution.value(*v)).collect();
            let p_nom_opt = av.p_nom.map(|v| solution.value(v)).unwrap_or(gen.p_nom);
            if av.p_nom.is_some() {
                objective_value += gen.capital_cost * p_nom_opt;
            }
            objective_value += p
                .iter()
                .zip(&weights)
                .map(|(p, w)| w * gen.marginal_cost * p)
                .sum::<f64>();
            gen_results.insert(gen.id, (p, p_nom_opt));
        }
        let mut link_results: HashMap<LinkId, (Vec<f64>, f64)> = HashMap::new();
        for link in &links {
            let av = &link_vars[&link.id];
            let p: Vec<f64> = av.p.iter().map(|v| solution.value(*v)).collect();
            let p_nom_opt = av.p_nom.map(|v| solution.value(v)).unwrap_or(link.p_nom);
            if av.p_nom.is_some() {
                objective_value += link.capital_cost * p_nom_opt;
            }
            objective_value += p
                .iter()
                .zip(&weights)
                .map(|(p, w)| w * link.marginal_cost * p)
                .sum::<f64>();
            link_results.insert(link.id, (p, p_nom_opt));
        }
        let mut storage_results: HashMap<StorageId, StorageResult> = HashMap::new();
        for sto in &storages {
            let sv = &storage_vars[&sto.id];
            let dispatch: Vec<f64> = sv.dispatch.iter().map(|v| solution.value(*v)).collect();
            let store: Vec<f64> = sv.store.iter().map(|v| solution.value(*v)).collect();
            let soc: Vec<f64> = sv.soc.iter().map(|v| solution.value(*v)).collect();
            let p_nom_opt = sv.p_nom.map(|v| solution.value(v)).unwrap_or(sto.p_nom);
            if sv.p_nom.is_some() {
                objective_value += sto.capital_cost * p_nom_opt;
            }
            objective_value += dispatch
                .iter()
                .zip(&weights)
                .map(|(p, w)| w * sto.marginal_cost * p)
                .sum::<f64>();
            storage_results.insert(
                sto.id,
                StorageResult {
                    dispatch,
                    store,
                    soc,
                    p_nom_opt,
                },
            );
        }

        for gen in network.generators_mut() {
            if let Some((p, p_nom_opt)) = gen_results.remove(&gen.id) {
                gen.p = p;
                gen.p_nom_opt = p_nom_opt;
            }
        }
        for link in network.links_mut() {
            if let Some((p, p_nom_opt)) = link_results.remove(&link.id) {
                link.p0 = p;
                link.p_nom_opt = p_nom_opt;
            }
        }
        for sto in network.storage_units_mut() {
            if let Some(r) = storage_results.remove(&sto.id) {
                sto.p_dispatch = r.dispatch;
                sto.p_store = r.store;
                sto.state_of_charge = r.soc;
                sto.p_nom_opt = r.p_nom_opt;
            }
        }

        Ok(DispatchSolution {
            optimal: true,
            objective: objective_value,
            solve_time: start.elapsed(),
            status_message: "Optimal".to_string(),
        })
    }
}

fn resolve<'a>(
    var: &VarRef,
    gen_vars: &'a HashMap<GenId, AssetVars>,
    link_vars: &'a HashMap<LinkId, AssetVars>,
    storage_vars: &'a HashMap<StorageId, StorageVars>,
) -> Result<&'a [Variable], OptError> {
    match var {
        VarRef::GeneratorDispatch(id) => gen_vars
            .get(id)
            .map(|v| v.p.as_slice())
            .ok_or_else(|| OptError::Config(format!("unknown generator id {}", id.value()))),
        VarRef::LinkFlow(id) => link_vars
            .get(id)
            .map(|v| v.p.as_slice())
            .ok_or_else(|| OptError::Config(format!("unknown link id {}", id.value()))),
        VarRef::StorageDispatch(id) => storage_vars
            .get(id)
            .map(|v| v.dispatch.as_slice())
            .ok_or_else(|| OptError::Config(format!("unknown storage id {}", id.value()))),
        VarRef::StorageStore(id) => storage_vars
            .get(id)
            .map(|v| v.store.as_slice())
            .ok_or_else(|| OptError::Config(format!("unknown storage id {}", id.value()))),
    }
}

fn add_with_sense<M: SolverModel>(model: M, expr: Expression, sense: Sense, rhs: f64) -> M {
    match sense {
        Sense::Leq => model.with(constraint!(expr <= rhs)),
        Sense::Geq => model.with(constraint!(expr >= rhs)),
        Sense::Eq => model.with(constraint!(expr == rhs)),
    }
}

/// Internal per-asset variable bundle (dispatch series + optional capacity)
struct AssetVars {
    p: Vec<Variable>,
    p_nom: Option<Variable>,
}

struct StorageVars {
    dispatch: Vec<Variable>,
    store: Vec<Variable>,
    soc: Vec<Variable>,
    p_nom: Option<Variable>,
}

struct StorageResult {
    dispatch: Vec<f64>,
    store: Vec<f64>,
    soc: Vec<f64>,
    p_nom_opt: f64,
}

/// Internal generator data for the solver
struct GenData {
    id: GenId,
    bus: BusId,
    p_nom: f64,
    p_nom_min: f64,
    extendable: bool,
    p_max_pu: Profile,
    p_min_pu: f64,
    marginal_cost: f64,
    capital_cost: f64,
    ramp_limit_up: Option<f64>,
    ramp_limit_down: Option<f64>,
}

impl From<&cfe_core::Generator> for GenData {
    fn from(g: &cfe_core::Generator) -> Self {
        Self {
            id: g.id,
            bus: g.bus,
            p_nom: g.p_nom,
            p_nom_min: g.p_nom_min,
            extendable: g.p_nom_extendable,
            p_max_pu: g.p_max_pu.clone(),
            p_min_pu: g.p_min_pu,
            marginal_cost: g.marginal_cost,
            capital_cost: g.capital_cost,
            ramp_limit_up: g.ramp_limit_up,
            ramp_limit_down: g.ramp_limit_down,
        }
    }
}

struct LinkData {
    id: LinkId,
    bus0: BusId,
    bus1: BusId,
    p_nom: f64,
    p_nom_min: f64,
    extendable: bool,
    efficiency: f64,
    marginal_cost: f64,
    capital_cost: f64,
}

impl From<&cfe_core::Link> for LinkData {
    fn from(l: &cfe_core::Link) -> Self {
        Self {
            id: l.id,
            bus0: l.bus0,
            bus1: l.bus1,
            p_nom: l.p_nom,
            p_nom_min: l.p_nom_min,
            extendable: l.p_nom_extendable,
            efficiency: l.efficiency,
            marginal_cost: l.marginal_cost,
            capital_cost: l.capital_cost,
        }
    }
}

struct StorageData {
    id: StorageId,
    bus: BusId,
    p_nom: f64,
    p_nom_min: f64,
    extendable: bool,
    max_hours: f64,
    efficiency_store: f64,
    efficiency_dispatch: f64,
    cyclic: bool,
    marginal_cost: f64,
    capital_cost: f64,
}

impl From<&cfe_core::StorageUnit> for StorageData {
    fn from(s: &cfe_core::StorageUnit) -> Self {
        Self {
            id: s.id,
            bus: s.bus,
            p_nom: s.p_nom,
            p_nom_min: s.p_nom_min,
            extendable: s.p_nom_extendable,
            max_hours: s.max_hours,
            efficiency_store: s.efficiency_store,
            efficiency_dispatch: s.efficiency_dispatch,
            cyclic: s.cyclic_state_of_charge,
            marginal_cost: s.marginal_cost,
            capital_cost: s.capital_cost,
        }
    }
}
