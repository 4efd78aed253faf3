//! Brownfield stage preparation and annual matching
//!
//! The brownfield network is the existing system solved once without any
//! matching constraint. Before the matching stages run, its optimized
//! capacities are frozen in place and only the consumer-owned assets stay
//! extendable — the "additionality" of the PPA: the consumer builds new
//! capacity instead of claiming what the grid would have built anyway.

use cfe_core::{BusId, Network};

use crate::model::{ConstraintSpec, DispatchModel, LinearTerm, OptError, Sense, VarRef};

/// Tag carried by annual-matching constraints.
pub const ANNUAL_CONSTRAINT_TAG: &str = "annual-matching";

/// Fix every asset's nameplate to its optimized value and strip
/// extendability, then re-enable it for consumer-owned assets. Consumer
/// assets keep their built capacity as a floor so a later stage cannot
/// decommission what an earlier stage built.
pub fn freeze_to_optimal(network: &mut Network) {
    for gen in network.generators_mut() {
        gen.p_nom = gen.p_nom_opt;
        gen.p_nom_extendable = gen.role.is_consumer();
        if gen.p_nom_extendable {
            gen.p_nom_min = gen.p_nom;
        }
    }
    for link in network.links_mut() {
        link.p_nom = link.p_nom_opt;
        link.p_nom_extendable = link.role.is_consumer();
        if link.p_nom_extendable {
            link.p_nom_min = link.p_nom;
        }
    }
    for sto in network.storage_units_mut() {
        sto.p_nom = sto.p_nom_opt;
        sto.p_nom_extendable = sto.role.is_consumer();
        if sto.p_nom_extendable {
            sto.p_nom_min = sto.p_nom;
        }
    }
}

/// Open capacity expansion on grid-side asset classes, keeping current
/// nameplates as the floor to prevent early decommissioning.
pub fn allow_expansion(network: &mut Network, generators: bool, storage: bool, links: bool) {
    if generators {
        for gen in network.generators_mut() {
            gen.p_nom_extendable = true;
            gen.p_nom_min = gen.p_nom;
        }
    }
    if storage {
        for sto in network.storage_units_mut() {
            sto.p_nom_extendable = true;
            sto.p_nom_min = sto.p_nom;
        }
    }
    if links {
        for link in network.links_mut() {
            link.p_nom_extendable = true;
            link.p_nom_min = link.p_nom;
        }
    }
}

/// Annual (volumetric) matching: per consumer bus, the consumer's own
/// generation plus storage discharge over the whole horizon equals the
/// target share of its annual demand, with the usual excess-export cap.
/// One solve, no fixed-point iteration — the temporal profile is free.
pub fn apply_annual_matching(
    network: &Network,
    model: &mut DispatchModel,
    consumer_buses: &[BusId],
    score: f64,
    max_excess_ratio: f64,
) -> Result<(), OptError> {
    if !(0.0..=1.0).contains(&score) {
        return Err(OptError::Config(format!(
            "annual matching score {} is outside [0, 1]",
            score
        )));
    }
    model.retain_untagged(ANNUAL_CONSTRAINT_TAG);
    let weights = network.snapshots.weights();

    for &ci_bus in consumer_buses {
        let generators: Vec<_> = network
            .generators_at_bus(ci_bus)
            .into_iter()
            .map(|g| g.id)
            .collect();
        let storages: Vec<_> = network
            .storage_units()
            .into_iter()
            .filter(|s| s.role.consumer_bus() == Some(ci_bus))
            .map(|s| s.id)
            .collect();
        let exports: Vec<_> = network
            .links()
            .into_iter()
            .filter(|l| matches!(l.role, cfe_core::LinkRole::Export(bus) if bus == ci_bus))
            .map(|l| l.id)
            .collect();
        if generators.is_empty() && storages.is_empty() {
            return Err(OptError::Config(format!(
                "bus id {} has no consumer generators or storage to match with",
                ci_bus.value()
            )));
        }
        if exports.is_empty() {
            return Err(OptError::Config(format!(
                "bus id {} has no export conduit; was the consumer subsystem constructed?",
                ci_bus.value()
            )));
        }
        let weighted_demand: f64 = network
            .demand_at_bus(ci_bus)
            .iter()
            .zip(weights)
            .map(|(d, w)| d * w)
            .sum();

        let mut terms: Vec<LinearTerm> = generators
            .iter()
            .map(|&g| LinearTerm::unit(VarRef::GeneratorDispatch(g)))
            .collect();
        terms.extend(
            storages
                .iter()
                .map(|&s| LinearTerm::unit(VarRef::StorageDispatch(s))),
        );
        model.add_spec(ConstraintSpec::snapshot_sum(
            ANNUAL_CONSTRAINT_TAG,
            terms,
            Sense::Eq,
            score * weighted_demand,
        ));

        let excess_terms = exports
            .iter()
            .map(|&l| LinearTerm::unit(VarRef::LinkFlow(l)))
            .collect();
        model.add_spec(ConstraintSpec::snapshot_sum(
            ANNUAL_CONSTRAINT_TAG,
            excess_terms,
            Sense::Leq,
            max_excess_ratio * weighted_demand,
        ));
    }
    Ok(())
}
