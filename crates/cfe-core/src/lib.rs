//! # cfe-core: Procurement Network Modeling Core
//!
//! Data structures for modeling corporate clean-energy procurement against a
//! regional electricity grid: buses, carriers, generators, storage units,
//! directed links, loads, and a weighted snapshot sequence.
//!
//! ## Design Philosophy
//!
//! Networks are modeled as **directed multigraphs** where:
//! - **Nodes**: Buses, Generators, Storage units, Loads
//! - **Edges**: Links (directed, bounded, lossy connectors)
//!
//! Every element has a newtype ID and a unique name within its kind, and
//! every element that participates in consumer procurement carries a typed
//! role ([`AssetRole`], [`LinkRole`], [`BusKind`]) instead of an identifier
//! substring convention. Selectors over the network are predicates over
//! these fields, which rules out accidental cross-matches between, say, a
//! bus whose name is a prefix of another bus's name.
//!
//! Per-snapshot series (load set-points, capacity factors, realized
//! dispatch) live on the components themselves as `Vec<f64>` aligned with
//! the network's [`Snapshots`].
//!
//! ## Quick Start
//!
//! ```rust
//! use cfe_core::{Carrier, Generator, Load, Network, Profile, Snapshots};
//!
//! let mut network = Network::new();
//! network.set_snapshots(Snapshots::hourly(4));
//! network.add_carrier(Carrier::new("solar", 0.0)).unwrap();
//!
//! let bus = network.add_bus("DE0", 0.0, 0.0).unwrap();
//! network
//!     .add_generator(
//!         Generator::new("DE0 solar", bus)
//!             .with_technology("solar", "solar")
//!             .with_nameplate(100.0, false)
//!             .with_profile(Profile::Series(vec![0.0, 0.6, 0.9, 0.2])),
//!     )
//!     .unwrap();
//! network
//!     .add_load(Load::new("DE0 load", bus, vec![50.0; 4]))
//!     .unwrap();
//!
//! assert_eq!(network.stats().num_generators, 1);
//! ```
//!
//! ## Modules
//!
//! - [`diagnostics`] - Validation and diagnostic reporting
//! - [`error`] - Unified error type and result alias
//! - [`snapshots`] - Weighted snapshot sequence

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

pub mod diagnostics;
pub mod error;
pub mod snapshots;

pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use error::{CfeError, CfeResult};
pub use snapshots::Snapshots;

// Newtype wrappers for IDs for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoadId(usize);

impl BusId {
    #[inline]
    pub fn new(value: usize) -> Self {
        BusId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl GenId {
    #[inline]
    pub fn new(value: usize) -> Self {
        GenId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl StorageId {
    #[inline]
    pub fn new(value: usize) -> Self {
        StorageId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl LinkId {
    #[inline]
    pub fn new(value: usize) -> Self {
        LinkId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl LoadId {
    #[inline]
    pub fn new(value: usize) -> Self {
        LoadId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

/// Commodity/technology tag with a carbon-emission intensity.
///
/// A carrier is "clean" when its emission intensity is non-positive;
/// generators are classified through their carrier, never by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Carrier {
    pub name: String,
    /// Emission intensity in tonnes CO2-eq per MWh of fuel input
    pub co2_emissions: f64,
}

impl Carrier {
    pub fn new(name: impl Into<String>, co2_emissions: f64) -> Self {
        Self {
            name: name.into(),
            co2_emissions,
        }
    }

    /// Zero-carbon test used throughout the matching constraints.
    pub fn is_clean(&self) -> bool {
        self.co2_emissions <= 0.0
    }
}

/// Who owns an asset: the regional grid, or a consumer system keyed by its
/// C&I grid bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetRole {
    /// Regular grid-side asset; counts toward the grid supply CFE.
    Grid,
    /// Consumer-owned (PPA) asset attached to the given C&I grid bus;
    /// excluded from the grid supply CFE and extendable across the
    /// brownfield freeze.
    ConsumerOwned(BusId),
}

impl AssetRole {
    pub fn is_consumer(&self) -> bool {
        matches!(self, AssetRole::ConsumerOwned(_))
    }

    /// The C&I grid bus this asset belongs to, if consumer-owned.
    pub fn consumer_bus(&self) -> Option<BusId> {
        match self {
            AssetRole::ConsumerOwned(bus) => Some(*bus),
            AssetRole::Grid => None,
        }
    }
}

/// What a link is for. The four virtual conduits of a consumer system carry
/// the C&I grid bus they serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkRole {
    /// Physical transmission between grid buses.
    Transmission,
    /// Parent grid -> C&I grid bus.
    Import(BusId),
    /// C&I grid bus -> parent grid.
    Export(BusId),
    /// C&I grid bus -> C&I storage bus.
    StorageCharge(BusId),
    /// C&I storage bus -> C&I grid bus.
    StorageDischarge(BusId),
}

impl LinkRole {
    pub fn is_consumer(&self) -> bool {
        !matches!(self, LinkRole::Transmission)
    }

    /// The C&I grid bus this link serves, if any.
    pub fn consumer_bus(&self) -> Option<BusId> {
        match self {
            LinkRole::Transmission => None,
            LinkRole::Import(bus)
            | LinkRole::Export(bus)
            | LinkRole::StorageCharge(bus)
            | LinkRole::StorageDischarge(bus) => Some(*bus),
        }
    }
}

/// Kind of bus: a regional grid node, or one of the two private buses of a
/// consumer system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BusKind {
    Grid,
    /// The C&I grid bus, attached to `parent` through import/export links.
    ConsumerGrid { parent: BusId },
    /// The C&I storage bus, attached to the C&I grid bus through
    /// charge/discharge links.
    ConsumerStorage { parent: BusId },
}

/// Per-snapshot maximum output fraction: either a constant or a full series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Profile {
    Static(f64),
    Series(Vec<f64>),
}

impl Profile {
    /// Value at snapshot `t`. Series shorter than the horizon read as 0.
    pub fn at(&self, t: usize) -> f64 {
        match self {
            Profile::Static(v) => *v,
            Profile::Series(s) => s.get(t).copied().unwrap_or(0.0),
        }
    }

    pub fn len(&self) -> Option<usize> {
        match self {
            Profile::Static(_) => None,
            Profile::Series(s) => Some(s.len()),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Profile::Series(s) if s.is_empty())
    }
}

impl Default for Profile {
    fn default() -> Self {
        Profile::Static(1.0)
    }
}

/// A node in the electrical graph; identity plus location metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bus {
    pub id: BusId,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub kind: BusKind,
}

/// Generating asset attached to exactly one bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generator {
    pub id: GenId,
    pub name: String,
    pub bus: BusId,
    /// Technology tag used for palette matching (e.g. "solar", "gas-ccgt")
    pub technology: String,
    pub carrier: String,
    pub role: AssetRole,
    /// Nameplate capacity (MW)
    pub p_nom: f64,
    /// Lower bound on optimized nameplate (prevents decommissioning)
    pub p_nom_min: f64,
    /// Whether the optimizer may build additional capacity
    pub p_nom_extendable: bool,
    /// Per-snapshot maximum output fraction (capacity factor)
    pub p_max_pu: Profile,
    /// Minimum output fraction (must-run level)
    pub p_min_pu: f64,
    pub efficiency: f64,
    /// currency/MWh
    pub marginal_cost: f64,
    /// currency/MW (annualized)
    pub capital_cost: f64,
    /// Per-unit-of-nameplate ramp limits between consecutive snapshots
    pub ramp_limit_up: Option<f64>,
    pub ramp_limit_down: Option<f64>,
    pub build_year: i32,
    pub lifetime: f64,
    pub committable: bool,
    /// Realized dispatch per snapshot (written back after a solve)
    #[serde(default)]
    pub p: Vec<f64>,
    /// Optimized nameplate (written back after a solve)
    #[serde(default)]
    pub p_nom_opt: f64,
}

impl Generator {
    pub fn new(name: impl Into<String>, bus: BusId) -> Self {
        Self {
            id: GenId(0),
            name: name.into(),
            bus,
            technology: String::new(),
            carrier: String::new(),
            role: AssetRole::Grid,
            p_nom: 0.0,
            p_nom_min: 0.0,
            p_nom_extendable: false,
            p_max_pu: Profile::default(),
            p_min_pu: 0.0,
            efficiency: 1.0,
            marginal_cost: 0.0,
            capital_cost: 0.0,
            ramp_limit_up: None,
            ramp_limit_down: None,
            build_year: 0,
            lifetime: f64::INFINITY,
            committable: false,
            p: Vec::new(),
            p_nom_opt: 0.0,
        }
    }

    pub fn with_technology(mut self, technology: impl Into<String>, carrier: impl Into<String>) -> Self {
        self.technology = technology.into();
        self.carrier = carrier.into();
        self
    }

    pub fn with_nameplate(mut self, p_nom: f64, extendable: bool) -> Self {
        self.p_nom = p_nom;
        self.p_nom_extendable = extendable;
        self
    }

    pub fn with_profile(mut self, p_max_pu: Profile) -> Self {
        self.p_max_pu = p_max_pu;
        self
    }

    pub fn with_costs(mut self, marginal_cost: f64, capital_cost: f64) -> Self {
        self.marginal_cost = marginal_cost;
        self.capital_cost = capital_cost;
        self
    }

    pub fn with_role(mut self, role: AssetRole) -> Self {
        self.role = role;
        self
    }
}

/// Storage asset attached to one bus, with a cyclic state-of-charge
/// invariant over the horizon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageUnit {
    pub id: StorageId,
    pub name: String,
    pub bus: BusId,
    pub carrier: String,
    pub role: AssetRole,
    /// Nameplate power capacity (MW)
    pub p_nom: f64,
    pub p_nom_min: f64,
    pub p_nom_extendable: bool,
    /// Energy-to-power ratio (hours at full power)
    pub max_hours: f64,
    pub efficiency_store: f64,
    pub efficiency_dispatch: f64,
    /// Ending state of charge equals starting state over the horizon
    pub cyclic_state_of_charge: bool,
    pub marginal_cost: f64,
    pub capital_cost: f64,
    pub build_year: i32,
    /// Realized discharge per snapshot (MW)
    #[serde(default)]
    pub p_dispatch: Vec<f64>,
    /// Realized charge per snapshot (MW)
    #[serde(default)]
    pub p_store: Vec<f64>,
    /// Realized state of charge per snapshot (MWh)
    #[serde(default)]
    pub state_of_charge: Vec<f64>,
    #[serde(default)]
    pub p_nom_opt: f64,
}

impl StorageUnit {
    pub fn new(name: impl Into<String>, bus: BusId) -> Self {
        Self {
            id: StorageId(0),
            name: name.into(),
            bus,
            carrier: String::new(),
            role: AssetRole::Grid,
            p_nom: 0.0,
            p_nom_min: 0.0,
            p_nom_extendable: false,
            max_hours: 1.0,
            efficiency_store: 1.0,
            efficiency_dispatch: 1.0,
            cyclic_state_of_charge: true,
            marginal_cost: 0.0,
            capital_cost: 0.0,
            build_year: 0,
            p_dispatch: Vec::new(),
            p_store: Vec::new(),
            state_of_charge: Vec::new(),
            p_nom_opt: 0.0,
        }
    }

    pub fn with_carrier(mut self, carrier: impl Into<String>) -> Self {
        self.carrier = carrier.into();
        self
    }

    pub fn with_nameplate(mut self, p_nom: f64, extendable: bool) -> Self {
        self.p_nom = p_nom;
        self.p_nom_extendable = extendable;
        self
    }

    pub fn with_energy(mut self, max_hours: f64) -> Self {
        self.max_hours = max_hours;
        self
    }

    pub fn with_efficiencies(mut self, store: f64, dispatch: f64) -> Self {
        self.efficiency_store = store;
        self.efficiency_dispatch = dispatch;
        self
    }

    pub fn with_costs(mut self, marginal_cost: f64, capital_cost: f64) -> Self {
        self.marginal_cost = marginal_cost;
        self.capital_cost = capital_cost;
        self
    }

    pub fn with_role(mut self, role: AssetRole) -> Self {
        self.role = role;
        self
    }
}

/// Directed two-bus connector with bounded flow and an efficiency. Used for
/// physical transmission and as the virtual conduits of a consumer system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub id: LinkId,
    pub name: String,
    pub bus0: BusId,
    pub bus1: BusId,
    pub role: LinkRole,
    /// Nameplate flow capacity (MW, measured at bus0)
    pub p_nom: f64,
    pub p_nom_min: f64,
    pub p_nom_extendable: bool,
    /// Fraction of the bus0 withdrawal delivered at bus1
    pub efficiency: f64,
    pub marginal_cost: f64,
    pub capital_cost: f64,
    /// Realized flow per snapshot, measured at bus0 (MW)
    #[serde(default)]
    pub p0: Vec<f64>,
    #[serde(default)]
    pub p_nom_opt: f64,
}

impl Link {
    pub fn new(name: impl Into<String>, bus0: BusId, bus1: BusId) -> Self {
        Self {
            id: LinkId(0),
            name: name.into(),
            bus0,
            bus1,
            role: LinkRole::Transmission,
            p_nom: 0.0,
            p_nom_min: 0.0,
            p_nom_extendable: false,
            efficiency: 1.0,
            marginal_cost: 0.0,
            capital_cost: 0.0,
            p0: Vec::new(),
            p_nom_opt: 0.0,
        }
    }

    pub fn with_role(mut self, role: LinkRole) -> Self {
        self.role = role;
        self
    }

    pub fn with_nameplate(mut self, p_nom: f64, extendable: bool) -> Self {
        self.p_nom = p_nom;
        self.p_nom_extendable = extendable;
        self
    }

    pub fn with_costs(mut self, marginal_cost: f64, capital_cost: f64) -> Self {
        self.marginal_cost = marginal_cost;
        self.capital_cost = capital_cost;
        self
    }

    pub fn with_efficiency(mut self, efficiency: f64) -> Self {
        self.efficiency = efficiency;
        self
    }
}

/// Fixed per-snapshot demand attached to one bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Load {
    pub id: LoadId,
    pub name: String,
    pub bus: BusId,
    pub role: AssetRole,
    /// Demand set-point per snapshot (MW)
    pub p_set: Vec<f64>,
}

impl Load {
    pub fn new(name: impl Into<String>, bus: BusId, p_set: Vec<f64>) -> Self {
        Self {
            id: LoadId(0),
            name: name.into(),
            bus,
            role: AssetRole::Grid,
            p_set,
        }
    }

    pub fn with_role(mut self, role: AssetRole) -> Self {
        self.role = role;
        self
    }
}

// Enum to represent different types of nodes in the graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Node {
    Bus(Bus),
    Generator(Generator),
    StorageUnit(StorageUnit),
    Load(Load),
}

impl Node {
    /// Returns a human-readable label for the node.
    pub fn label(&self) -> &str {
        match self {
            Node::Bus(bus) => &bus.name,
            Node::Generator(gen) => &gen.name,
            Node::StorageUnit(sto) => &sto.name,
            Node::Load(load) => &load.name,
        }
    }
}

// Enum to represent different types of edges in the graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Edge {
    Link(Link),
}

impl Edge {
    pub fn label(&self) -> &str {
        match self {
            Edge::Link(link) => &link.name,
        }
    }
}

/// The procurement network: a directed component graph plus the carrier
/// registry and the snapshot sequence all series are aligned with.
///
/// Topology is added through the `add_*` methods, which allocate IDs and
/// reject name collisions within a component kind; direct graph mutation
/// bypasses those checks.
#[derive(Debug, Clone, Default)]
pub struct Network {
    pub graph: DiGraph<Node, Edge>,
    pub snapshots: Snapshots,
    carriers: Vec<Carrier>,
    bus_nodes: HashMap<BusId, NodeIndex>,
    next_bus: usize,
    next_gen: usize,
    next_storage: usize,
    next_link: usize,
    next_load: usize,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_snapshots(&mut self, snapshots: Snapshots) {
        self.snapshots = snapshots;
    }

    // --- carriers -----------------------------------------------------

    pub fn add_carrier(&mut self, carrier: Carrier) -> CfeResult<()> {
        if self.carriers.iter().any(|c| c.name == carrier.name) {
            return Err(CfeError::Network(format!(
                "carrier '{}' already exists",
                carrier.name
            )));
        }
        self.carriers.push(carrier);
        Ok(())
    }

    pub fn carriers(&self) -> &[Carrier] {
        &self.carriers
    }

    pub fn carrier(&self, name: &str) -> Option<&Carrier> {
        self.carriers.iter().find(|c| c.name == name)
    }

    /// Names of all zero-carbon carriers.
    pub fn clean_carrier_names(&self) -> Vec<&str> {
        self.carriers
            .iter()
            .filter(|c| c.is_clean())
            .map(|c| c.name.as_str())
            .collect()
    }

    // --- topology -----------------------------------------------------

    pub fn add_bus(&mut self, name: impl Into<String>, x: f64, y: f64) -> CfeResult<BusId> {
        self.add_bus_with_kind(name, x, y, BusKind::Grid)
    }

    pub fn add_bus_with_kind(
        &mut self,
        name: impl Into<String>,
        x: f64,
        y: f64,
        kind: BusKind,
    ) -> CfeResult<BusId> {
        let name = name.into();
        if self.buses().iter().any(|b| b.name == name) {
            return Err(CfeError::Network(format!("bus '{}' already exists", name)));
        }
        let id = BusId(self.next_bus);
        self.next_bus += 1;
        let idx = self.graph.add_node(Node::Bus(Bus {
            id,
            name,
            x,
            y,
            kind,
        }));
        self.bus_nodes.insert(id, idx);
        Ok(id)
    }

    pub fn add_generator(&mut self, mut gen: Generator) -> CfeResult<GenId> {
        if self.generators().iter().any(|g| g.name == gen.name) {
            return Err(CfeError::Network(format!(
                "generator '{}' already exists",
                gen.name
            )));
        }
        self.require_bus(gen.bus)?;
        let id = GenId(self.next_gen);
        self.next_gen += 1;
        gen.id = id;
        self.graph.add_node(Node::Generator(gen));
        Ok(id)
    }

    pub fn add_storage_unit(&mut self, mut sto: StorageUnit) -> CfeResult<StorageId> {
        if self.storage_units().iter().any(|s| s.name == sto.name) {
            return Err(CfeError::Network(format!(
                "storage unit '{}' already exists",
                sto.name
            )));
        }
        self.require_bus(sto.bus)?;
        let id = StorageId(self.next_storage);
        self.next_storage += 1;
        sto.id = id;
        self.graph.add_node(Node::StorageUnit(sto));
        Ok(id)
    }

    pub fn add_link(&mut self, mut link: Link) -> CfeResult<LinkId> {
        if self.links().iter().any(|l| l.name == link.name) {
            return Err(CfeError::Network(format!(
                "link '{}' already exists",
                link.name
            )));
        }
        let from = *self
            .bus_nodes
            .get(&link.bus0)
            .ok_or_else(|| CfeError::Network(format!("link '{}': unknown bus0", link.name)))?;
        let to = *self
            .bus_nodes
            .get(&link.bus1)
            .ok_or_else(|| CfeError::Network(format!("link '{}': unknown bus1", link.name)))?;
        let id = LinkId(self.next_link);
        self.next_link += 1;
        link.id = id;
        self.graph.add_edge(from, to, Edge::Link(link));
        Ok(id)
    }

    pub fn add_load(&mut self, mut load: Load) -> CfeResult<LoadId> {
        if self.loads().iter().any(|l| l.name == load.name) {
            return Err(CfeError::Network(format!(
                "load '{}' already exists",
                load.name
            )));
        }
        self.require_bus(load.bus)?;
        let id = LoadId(self.next_load);
        self.next_load += 1;
        load.id = id;
        self.graph.add_node(Node::Load(load));
        Ok(id)
    }

    fn require_bus(&self, bus: BusId) -> CfeResult<()> {
        if self.bus_nodes.contains_key(&bus) {
            Ok(())
        } else {
            Err(CfeError::Network(format!("unknown bus id {}", bus.value())))
        }
    }

    // --- accessors ----------------------------------------------------

    pub fn buses(&self) -> Vec<&Bus> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Bus(b) => Some(b),
                _ => None,
            })
            .collect()
    }

    pub fn generators(&self) -> Vec<&Generator> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Generator(g) => Some(g),
                _ => None,
            })
            .collect()
    }

    pub fn storage_units(&self) -> Vec<&StorageUnit> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::StorageUnit(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn loads(&self) -> Vec<&Load> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Load(l) => Some(l),
                _ => None,
            })
            .collect()
    }

    pub fn links(&self) -> Vec<&Link> {
        self.graph
            .edge_weights()
            .map(|e| match e {
                Edge::Link(l) => l,
            })
            .collect()
    }

    pub fn generators_mut(&mut self) -> impl Iterator<Item = &mut Generator> {
        self.graph.node_weights_mut().filter_map(|n| match n {
            Node::Generator(g) => Some(g),
            _ => None,
        })
    }

    pub fn storage_units_mut(&mut self) -> impl Iterator<Item = &mut StorageUnit> {
        self.graph.node_weights_mut().filter_map(|n| match n {
            Node::StorageUnit(s) => Some(s),
            _ => None,
        })
    }

    pub fn loads_mut(&mut self) -> impl Iterator<Item = &mut Load> {
        self.graph.node_weights_mut().filter_map(|n| match n {
            Node::Load(l) => Some(l),
            _ => None,
        })
    }

    pub fn links_mut(&mut self) -> impl Iterator<Item = &mut Link> {
        self.graph.edge_weights_mut().map(|e| match e {
            Edge::Link(l) => l,
        })
    }

    pub fn bus(&self, id: BusId) -> Option<&Bus> {
        let idx = *self.bus_nodes.get(&id)?;
        match &self.graph[idx] {
            Node::Bus(b) => Some(b),
            _ => None,
        }
    }

    pub fn bus_by_name(&self, name: &str) -> Option<&Bus> {
        self.buses().into_iter().find(|b| b.name == name)
    }

    pub fn generator(&self, id: GenId) -> Option<&Generator> {
        self.generators().into_iter().find(|g| g.id == id)
    }

    pub fn storage_unit(&self, id: StorageId) -> Option<&StorageUnit> {
        self.storage_units().into_iter().find(|s| s.id == id)
    }

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links().into_iter().find(|l| l.id == id)
    }

    pub fn generators_at_bus(&self, bus: BusId) -> Vec<&Generator> {
        self.generators().into_iter().filter(|g| g.bus == bus).collect()
    }

    pub fn storage_units_at_bus(&self, bus: BusId) -> Vec<&StorageUnit> {
        self.storage_units()
            .into_iter()
            .filter(|s| s.bus == bus)
            .collect()
    }

    pub fn loads_at_bus(&self, bus: BusId) -> Vec<&Load> {
        self.loads().into_iter().filter(|l| l.bus == bus).collect()
    }

    /// Summed demand series of all loads at `bus`.
    pub fn demand_at_bus(&self, bus: BusId) -> Vec<f64> {
        let nt = self.snapshots.len();
        let mut demand = vec![0.0; nt];
        for load in self.loads_at_bus(bus) {
            for (t, d) in demand.iter_mut().enumerate() {
                *d += load.p_set.get(t).copied().unwrap_or(0.0);
            }
        }
        demand
    }

    // --- stats & validation -------------------------------------------

    /// Compute basic statistics about the network
    pub fn stats(&self) -> NetworkStats {
        let mut stats = NetworkStats::default();
        for node in self.graph.node_weights() {
            match node {
                Node::Bus(_) => stats.num_buses += 1,
                Node::Generator(g) => {
                    stats.num_generators += 1;
                    stats.total_gen_capacity_mw += g.p_nom;
                }
                Node::StorageUnit(s) => {
                    stats.num_storage_units += 1;
                    stats.total_storage_power_mw += s.p_nom;
                }
                Node::Load(l) => {
                    stats.num_loads += 1;
                    for t in 0..self.snapshots.len() {
                        stats.total_load_mwh +=
                            l.p_set.get(t).copied().unwrap_or(0.0) * self.snapshots.weight(t);
                    }
                }
            }
        }
        for t in 0..self.snapshots.len() {
            let total: f64 = self
                .loads()
                .iter()
                .map(|l| l.p_set.get(t).copied().unwrap_or(0.0))
                .sum();
            stats.peak_load_mw = stats.peak_load_mw.max(total);
        }
        stats.num_links = self.graph.edge_count();
        stats
    }

    /// Validate network data for common issues that cause solver failures.
    ///
    /// Populates the provided `Diagnostics` with any warnings/errors found.
    pub fn validate_into(&self, diag: &mut Diagnostics) {
        let stats = self.stats();
        let nt = self.snapshots.len();

        if stats.num_buses == 0 {
            diag.add_error("structure", "Network has no buses");
            return;
        }
        if nt == 0 {
            diag.add_error("structure", "Network has no snapshots");
            return;
        }
        if stats.num_generators == 0 {
            diag.add_error("structure", "Network has no generators");
        }
        if stats.num_loads == 0 {
            diag.add_warning("structure", "Network has no loads");
        }

        for load in self.loads() {
            if load.p_set.len() != nt {
                diag.add_error_with_entity(
                    "series",
                    format!(
                        "load series has {} entries but network has {} snapshots",
                        load.p_set.len(),
                        nt
                    ),
                    format!("Load {}", load.name),
                );
            }
        }

        for gen in self.generators() {
            if let Some(len) = gen.p_max_pu.len() {
                if len != nt {
                    diag.add_error_with_entity(
                        "series",
                        format!(
                            "capacity factor series has {} entries but network has {} snapshots",
                            len, nt
                        ),
                        format!("Generator {}", gen.name),
                    );
                }
            }
            if !gen.carrier.is_empty() && self.carrier(&gen.carrier).is_none() {
                diag.add_error_with_entity(
                    "reference",
                    format!("carrier '{}' is not registered", gen.carrier),
                    format!("Generator {}", gen.name),
                );
            }
        }

        let extendable = self.generators().iter().any(|g| g.p_nom_extendable)
            || self.links().iter().any(|l| l.p_nom_extendable)
            || self.storage_units().iter().any(|s| s.p_nom_extendable);
        if !extendable && stats.total_gen_capacity_mw < stats.peak_load_mw {
            diag.add_warning(
                "capacity",
                format!(
                    "Installed capacity ({:.1} MW) is below peak load ({:.1} MW) and nothing is extendable",
                    stats.total_gen_capacity_mw, stats.peak_load_mw
                ),
            );
        }
    }

    // --- persistence --------------------------------------------------

    /// Flatten into serializable component tables.
    pub fn to_parts(&self) -> NetworkParts {
        NetworkParts {
            snapshots: self.snapshots.clone(),
            carriers: self.carriers.clone(),
            buses: self.buses().into_iter().cloned().collect(),
            generators: self.generators().into_iter().cloned().collect(),
            storage_units: self.storage_units().into_iter().cloned().collect(),
            links: self.links().into_iter().cloned().collect(),
            loads: self.loads().into_iter().cloned().collect(),
        }
    }

    /// Rebuild a network from component tables, re-validating references and
    /// name uniqueness.
    pub fn from_parts(parts: NetworkParts) -> CfeResult<Network> {
        let mut network = Network::new();
        network.set_snapshots(parts.snapshots);
        for carrier in parts.carriers {
            network.add_carrier(carrier)?;
        }
        // Buses keep their persisted ids so that component references and
        // role tags stay valid.
        for bus in parts.buses {
            if network.buses().iter().any(|b| b.name == bus.name) {
                return Err(CfeError::Network(format!("bus '{}' already exists", bus.name)));
            }
            let idx = network.graph.add_node(Node::Bus(bus.clone()));
            network.bus_nodes.insert(bus.id, idx);
            network.next_bus = network.next_bus.max(bus.id.value() + 1);
        }
        for gen in parts.generators {
            let persisted = gen.id;
            network.next_gen = persisted.value();
            let assigned = network.add_generator(gen)?;
            debug_assert_eq!(assigned, persisted);
            network.next_gen = network.next_gen.max(persisted.value() + 1);
        }
        for sto in parts.storage_units {
            let persisted = sto.id;
            network.next_storage = persisted.value();
            let assigned = network.add_storage_unit(sto)?;
            debug_assert_eq!(assigned, persisted);
            network.next_storage = network.next_storage.max(persisted.value() + 1);
        }
        for link in parts.links {
            let persisted = link.id;
            network.next_link = persisted.value();
            let assigned = network.add_link(link)?;
            debug_assert_eq!(assigned, persisted);
            network.next_link = network.next_link.max(persisted.value() + 1);
        }
        for load in parts.loads {
            let persisted = load.id;
            network.next_load = persisted.value();
            let assigned = network.add_load(load)?;
            debug_assert_eq!(assigned, persisted);
            network.next_load = network.next_load.max(persisted.value() + 1);
        }
        Ok(network)
    }
}

/// Serializable flat view of a network, used by exporters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkParts {
    pub snapshots: Snapshots,
    pub carriers: Vec<Carrier>,
    pub buses: Vec<Bus>,
    pub generators: Vec<Generator>,
    pub storage_units: Vec<StorageUnit>,
    pub links: Vec<Link>,
    pub loads: Vec<Load>,
}

/// Statistics about a network's size and capacity
#[derive(Debug, Clone, Default)]
pub struct NetworkStats {
    pub num_buses: usize,
    pub num_generators: usize,
    pub num_storage_units: usize,
    pub num_links: usize,
    pub num_loads: usize,
    pub total_load_mwh: f64,
    pub peak_load_mw: f64,
    pub total_gen_capacity_mw: f64,
    pub total_storage_power_mw: f64,
}

impl std::fmt::Display for NetworkStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} buses, {} links, {} gens ({:.0} MW), {} storage units, {} loads ({:.0} MW peak)",
            self.num_buses,
            self.num_links,
            self.num_generators,
            self.total_gen_capacity_mw,
            self.num_storage_units,
            self.num_loads,
            self.peak_load_mw
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_network() -> Network {
        let mut network = Network::new();
        network.set_snapshots(Snapshots::hourly(2));
        network.add_carrier(Carrier::new("solar", 0.0)).unwrap();
        network.add_carrier(Carrier::new("gas", 0.2)).unwrap();
        let bus = network.add_bus("DE0", 10.0, 50.0).unwrap();
        network
            .add_generator(
                Generator::new("DE0 solar", bus)
                    .with_technology("solar", "solar")
                    .with_nameplate(100.0, false),
            )
            .unwrap();
        network
            .add_load(Load::new("DE0 load", bus, vec![40.0, 60.0]))
            .unwrap();
        network
    }

    #[test]
    fn test_network_creation() {
        let network = small_network();
        let stats = network.stats();
        assert_eq!(stats.num_buses, 1);
        assert_eq!(stats.num_generators, 1);
        assert_eq!(stats.num_loads, 1);
        assert!((stats.peak_load_mw - 60.0).abs() < 1e-9);
        assert!((stats.total_load_mwh - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_name_collision_rejected() {
        let mut network = small_network();
        assert!(network.add_bus("DE0", 0.0, 0.0).is_err());
        let bus = network.bus_by_name("DE0").unwrap().id;
        let dup = Generator::new("DE0 solar", bus);
        assert!(matches!(
            network.add_generator(dup),
            Err(CfeError::Network(_))
        ));
    }

    #[test]
    fn test_link_requires_known_buses() {
        let mut network = small_network();
        let bus = network.bus_by_name("DE0").unwrap().id;
        let bad = Link::new("dangling", bus, BusId::new(99));
        assert!(network.add_link(bad).is_err());
    }

    #[test]
    fn test_clean_carrier_names() {
        let network = small_network();
        let clean = network.clean_carrier_names();
        assert_eq!(clean, vec!["solar"]);
    }

    #[test]
    fn test_demand_at_bus() {
        let network = small_network();
        let bus = network.bus_by_name("DE0").unwrap().id;
        let demand = network.demand_at_bus(bus);
        assert_eq!(demand, vec![40.0, 60.0]);
    }

    #[test]
    fn test_validate_series_length_mismatch() {
        let mut network = small_network();
        let bus = network.bus_by_name("DE0").unwrap().id;
        network
            .add_load(Load::new("short series", bus, vec![1.0]))
            .unwrap();
        let mut diag = Diagnostics::new();
        network.validate_into(&mut diag);
        assert!(diag.has_errors());
        assert!(diag.errors().any(|i| i.category == "series"));
    }

    #[test]
    fn test_validate_unknown_carrier() {
        let mut network = small_network();
        let bus = network.bus_by_name("DE0").unwrap().id;
        network
            .add_generator(
                Generator::new("DE0 mystery", bus).with_technology("mystery", "unobtainium"),
            )
            .unwrap();
        let mut diag = Diagnostics::new();
        network.validate_into(&mut diag);
        assert!(diag.errors().any(|i| i.category == "reference"));
    }

    #[test]
    fn test_roles() {
        let consumer = AssetRole::ConsumerOwned(BusId::new(3));
        assert!(consumer.is_consumer());
        assert_eq!(consumer.consumer_bus(), Some(BusId::new(3)));
        assert!(!AssetRole::Grid.is_consumer());

        let role = LinkRole::Import(BusId::new(7));
        assert!(role.is_consumer());
        assert_eq!(role.consumer_bus(), Some(BusId::new(7)));
        assert_eq!(LinkRole::Transmission.consumer_bus(), None);
    }

    #[test]
    fn test_profile_at() {
        let series = Profile::Series(vec![0.1, 0.9]);
        assert!((series.at(1) - 0.9).abs() < 1e-12);
        assert_eq!(series.at(5), 0.0);
        let flat = Profile::Static(0.5);
        assert!((flat.at(100) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_parts_round_trip() {
        let network = small_network();
        let parts = network.to_parts();
        let rebuilt = Network::from_parts(parts).unwrap();
        assert_eq!(rebuilt.stats().num_generators, 1);
        assert_eq!(rebuilt.stats().num_buses, 1);
        assert!(rebuilt.bus_by_name("DE0").is_some());
        // serde round trip through json
        let json = serde_json::to_string(&network.to_parts()).unwrap();
        let parts: NetworkParts = serde_json::from_str(&json).unwrap();
        let again = Network::from_parts(parts).unwrap();
        assert_eq!(again.stats().num_loads, 1);
    }
}
