//! C&I subsystem constructor
//!
//! Rewires a fraction of a parent bus's load onto a dedicated consumer
//! sub-graph: a C&I grid bus, a C&I storage bus, four virtual links
//! (imports, exports, storage charge, storage discharge), and a palette of
//! consumer-owned generators and storage sized to zero nameplate.
//!
//! The construction is intentionally not idempotent: calling it twice on
//! the same bus duplicates nothing silently — the name collisions on the
//! new buses make the second call fail. Callers run it exactly once per
//! scenario.

use cfe_core::{
    AssetRole, BusId, BusKind, CfeError, CfeResult, Generator, Link, LinkRole, Load, Network,
    StorageUnit,
};

/// Small capital and marginal cost on the virtual links, keeping the relaxed
/// program non-degenerate without distorting the dispatch.
pub const LINK_COST_EPSILON: f64 = 0.01;

/// Configuration of one consumer system.
#[derive(Debug, Clone)]
pub struct SubsystemSpec {
    /// Fraction of the parent load carved out onto the C&I bus (0..=1)
    pub load_fraction: f64,
    /// Technology names, matched against generator `technology` tags first,
    /// then storage `carrier` tags
    pub palette: Vec<String>,
    /// Whether consumer-side capacity may be expanded by the optimizer
    pub extendable: bool,
}

/// Attach a consumer sub-system to each of `parent_buses`, mutating the
/// network in place. Returns the new C&I grid bus ids, in input order.
///
/// Total load at parent-plus-child equals the original parent load at every
/// snapshot; no energy is created or destroyed by the split.
pub fn attach_consumer_systems(
    network: &mut Network,
    parent_buses: &[BusId],
    spec: &SubsystemSpec,
) -> CfeResult<Vec<BusId>> {
    if !(0.0..=1.0).contains(&spec.load_fraction) {
        return Err(CfeError::Config(format!(
            "load fraction {} is outside [0, 1]",
            spec.load_fraction
        )));
    }
    if spec.palette.is_empty() {
        return Err(CfeError::Config("technology palette is empty".into()));
    }

    let mut ci_buses = Vec::with_capacity(parent_buses.len());
    for &parent in parent_buses {
        ci_buses.push(attach_one(network, parent, spec)?);
    }
    Ok(ci_buses)
}

fn attach_one(network: &mut Network, parent: BusId, spec: &SubsystemSpec) -> CfeResult<BusId> {
    let parent_bus = network
        .bus(parent)
        .ok_or_else(|| CfeError::Network(format!("unknown parent bus id {}", parent.value())))?;
    let parent_name = parent_bus.name.clone();
    let (x, y) = (parent_bus.x, parent_bus.y);

    if network.loads_at_bus(parent).is_empty() {
        return Err(CfeError::Network(format!(
            "parent bus '{}' has no load to split",
            parent_name
        )));
    }

    let ci_bus_name = format!("{} C&I Grid", parent_name);
    let ci_storage_bus_name = format!("{} C&I Storage", parent_name);

    // Coordinate jitter keeps the new buses from overlapping the parent on a map
    let ci_bus = network.add_bus_with_kind(
        ci_bus_name.clone(),
        x + 1.0,
        y + 1.0,
        BusKind::ConsumerGrid { parent },
    )?;
    let ci_storage_bus = network.add_bus_with_kind(
        ci_storage_bus_name,
        x - 1.0,
        y - 1.0,
        BusKind::ConsumerStorage { parent },
    )?;

    // Carve the consumer load out of the parent load, snapshot by snapshot
    let nt = network.snapshots.len();
    let mut ci_series = vec![0.0; nt];
    for load in network.loads_mut() {
        if load.bus != parent {
            continue;
        }
        for (t, value) in load.p_set.iter_mut().enumerate() {
            let share = *value * spec.load_fraction;
            if let Some(s) = ci_series.get_mut(t) {
                *s += share;
            }
            *value -= share;
        }
    }
    network.add_load(
        Load::new(format!("{} C&I Load", parent_name), ci_bus, ci_series)
            .with_role(AssetRole::ConsumerOwned(ci_bus)),
    )?;

    // Virtual conduits between the parent grid, the C&I bus, and its storage
    network.add_link(
        Link::new(format!("{} C&I Grid Imports", parent_name), parent, ci_bus)
            .with_role(LinkRole::Import(ci_bus))
            // imports stay extendable regardless of the consumer flag,
            // otherwise a zero-capacity conduit starves the carved-out load
            .with_nameplate(0.0, true)
            .with_costs(LINK_COST_EPSILON, LINK_COST_EPSILON),
    )?;
    network.add_link(
        Link::new(format!("{} C&I Grid Exports", parent_name), ci_bus, parent)
            .with_role(LinkRole::Export(ci_bus))
            .with_nameplate(0.0, spec.extendable)
            .with_costs(LINK_COST_EPSILON, LINK_COST_EPSILON),
    )?;
    network.add_link(
        Link::new(
            format!("{} C&I Storage Charge", parent_name),
            ci_bus,
            ci_storage_bus,
        )
        .with_role(LinkRole::StorageCharge(ci_bus))
        .with_nameplate(0.0, spec.extendable)
        .with_costs(LINK_COST_EPSILON, LINK_COST_EPSILON),
    )?;
    network.add_link(
        Link::new(
            format!("{} C&I Storage Discharge", parent_name),
            ci_storage_bus,
            ci_bus,
        )
        .with_role(LinkRole::StorageDischarge(ci_bus))
        .with_nameplate(0.0, spec.extendable)
        .with_costs(LINK_COST_EPSILON, LINK_COST_EPSILON),
    )?;

    // Palette: clone per-unit parameters from existing assets onto the
    // consumer buses. Exactly one storage technology is allowed per bus so
    // the charge/discharge links pair with a single unit.
    let mut storage_added = false;
    for technology in &spec.palette {
        if let Some(template) = find_generator_template(network, technology, parent) {
            let gen = Generator::new(format!("{}-{}-PPA", ci_bus_name, technology), ci_bus)
                .with_technology(template.technology.clone(), template.carrier.clone())
                .with_nameplate(0.0, spec.extendable)
                .with_profile(template.p_max_pu.clone())
                .with_costs(template.marginal_cost, template.capital_cost)
                .with_role(AssetRole::ConsumerOwned(ci_bus));
            let gen = Generator {
                p_min_pu: template.p_min_pu,
                efficiency: template.efficiency,
                ramp_limit_up: template.ramp_limit_up,
                ramp_limit_down: template.ramp_limit_down,
                build_year: template.build_year,
                lifetime: template.lifetime,
                committable: template.committable,
                ..gen
            };
            network.add_generator(gen)?;
        } else if let Some(template) = find_storage_template(network, technology) {
            if storage_added {
                return Err(CfeError::Config(format!(
                    "palette defines more than one storage technology for bus '{}'",
                    parent_name
                )));
            }
            storage_added = true;
            let sto = StorageUnit::new(
                format!("{}-{}", ci_bus_name, template.carrier),
                ci_storage_bus,
            )
            .with_carrier(template.carrier.clone())
            .with_nameplate(0.0, spec.extendable)
            .with_energy(template.max_hours)
            .with_efficiencies(template.efficiency_store, template.efficiency_dispatch)
            .with_costs(template.marginal_cost, template.capital_cost)
            .with_role(AssetRole::ConsumerOwned(ci_bus));
            let sto = StorageUnit {
                cyclic_state_of_charge: true,
                build_year: template.build_year,
                ..sto
            };
            network.add_storage_unit(sto)?;
        } else {
            return Err(CfeError::Config(format!(
                "invalid technology in palette: '{}' matches no generator type and no storage carrier",
                technology
            )));
        }
    }

    Ok(ci_bus)
}

/// Prefer a template at the parent bus (bus-specific capacity factors),
/// falling back to any generator of the technology.
fn find_generator_template(
    network: &Network,
    technology: &str,
    parent: BusId,
) -> Option<Generator> {
    let gens = network.generators();
    gens.iter()
        .find(|g| g.technology == technology && g.bus == parent)
        .or_else(|| gens.iter().find(|g| g.technology == technology))
        .map(|g| (*g).clone())
}

fn find_storage_template(network: &Network, carrier: &str) -> Option<StorageUnit> {
    network
        .storage_units()
        .iter()
        .find(|s| s.carrier == carrier)
        .map(|s| (*s).clone())
}
