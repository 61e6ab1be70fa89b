//! # rao-core: grid and security model for remedial action optimisation
//!
//! Holds the data the optimiser reads but never mutates:
//!
//! - [`Network`]: the physical grid as an undirected petgraph multigraph
//!   (buses, generators and loads are nodes; branches are edges). Parallel
//!   circuits between the same two buses are separate edges.
//! - [`crac`]: the security model (instants, contingencies, FlowCNECs,
//!   remedial actions and their usage rules), built once with
//!   [`crac::CracBuilder`] and immutable afterwards.
//! - [`state::NetworkState`]: a cheap overlay of switching and PST set-points
//!   on top of a shared network, forked per search-tree node.
//!
//! ## Quick start
//!
//! ```rust
//! use rao_core::*;
//!
//! let mut network = Network::new();
//! network.add_bus(Bus::new(BusId::new(1), "B1", Kilovolts(400.0)));
//! network.add_bus(Bus::new(BusId::new(2), "B2", Kilovolts(400.0)));
//! network.add_gen(Gen::new(GenId::new(1), "G1", BusId::new(1), Megawatts(100.0)));
//! network.add_load(Load::new(LoadId::new(1), "D2", BusId::new(2), Megawatts(100.0)));
//! network
//!     .add_branch(Branch::new(BranchId::new(1), "L12", BusId::new(1), BusId::new(2), 0.1))
//!     .unwrap();
//!
//! let mut diag = Diagnostics::new();
//! network.validate_into(&mut diag);
//! assert!(!diag.has_errors());
//! ```
//!
//! Branches are addressed by name: the name is the network element id used
//! throughout the security model.

use petgraph::{prelude::*, Undirected};
use serde::{Deserialize, Serialize};

pub mod crac;
pub mod diagnostics;
pub mod error;
pub mod graph_utils;
pub mod solver;
pub mod state;
pub mod units;

pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use error::{RaoError, RaoResult};
pub use graph_utils::{bus_islands, count_islands};
pub use petgraph::graph::NodeIndex;
pub use solver::*;
pub use state::{NetworkState, PstSetting};
pub use units::{Amperes, Degrees, Kilovolts, Megawatts, Radians};

/// Default system base for per-unit conversion.
pub const DEFAULT_BASE_MVA: f64 = 100.0;

// Newtype wrappers for IDs for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
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

impl BranchId {
    #[inline]
    pub fn new(value: usize) -> Self {
        BranchId(value)
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

#[derive(Debug, Clone, PartialEq)]
pub struct Bus {
    pub id: BusId,
    pub name: String,
    /// Nominal voltage, used for ampere/megawatt conversion on CNECs
    pub base_kv: Kilovolts,
}

impl Default for Bus {
    fn default() -> Self {
        Self {
            id: BusId(0),
            name: String::new(),
            base_kv: Kilovolts(0.0),
        }
    }
}

impl Bus {
    pub fn new(id: BusId, name: impl Into<String>, base_kv: Kilovolts) -> Self {
        Self {
            id,
            name: name.into(),
            base_kv,
        }
    }
}

/// Physical kind of a branch; contingency elements carry it too.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchKind {
    #[default]
    Line,
    Transformer,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub id: BranchId,
    /// Network element id (e.g. "BBE2AA1  BBE3AA1  1")
    pub name: String,
    pub from_bus: BusId,
    pub to_bus: BusId,
    /// Series reactance (per-unit on the network base)
    pub reactance: f64,
    /// Phase shift applied from from_bus to to_bus when no PST set-point overrides it
    pub phase_shift: Radians,
    /// Connection status in the initial network
    pub status: bool,
    pub kind: BranchKind,
    /// Phase-shifting transformer flag (tap-controllable angle)
    pub is_phase_shifter: bool,
}

impl Default for Branch {
    fn default() -> Self {
        Self {
            id: BranchId(0),
            name: String::new(),
            from_bus: BusId(0),
            to_bus: BusId(0),
            reactance: 0.0,
            phase_shift: Radians::ZERO,
            status: true,
            kind: BranchKind::Line,
            is_phase_shifter: false,
        }
    }
}

impl Branch {
    pub fn new(
        id: BranchId,
        name: impl Into<String>,
        from_bus: BusId,
        to_bus: BusId,
        reactance: f64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            from_bus,
            to_bus,
            reactance,
            ..Self::default()
        }
    }

    /// Mark branch as a phase-shifting transformer.
    pub fn as_phase_shifter(mut self) -> Self {
        self.is_phase_shifter = true;
        self.kind = BranchKind::Transformer;
        self
    }

    /// Start out of service (an open circuit a topological action may close).
    pub fn opened(mut self) -> Self {
        self.status = false;
        self
    }

    /// DC susceptance 1/x in per-unit.
    pub fn susceptance(&self) -> f64 {
        1.0 / self.reactance
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Gen {
    pub id: GenId,
    pub name: String,
    pub bus: BusId,
    /// Active power output (MW)
    pub active_power: Megawatts,
    pub status: bool,
}

impl Gen {
    pub fn new(id: GenId, name: impl Into<String>, bus: BusId, active_power: Megawatts) -> Self {
        Self {
            id,
            name: name.into(),
            bus,
            active_power,
            status: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Load {
    pub id: LoadId,
    pub name: String,
    pub bus: BusId,
    /// Active power demand (MW)
    pub active_power: Megawatts,
}

impl Load {
    pub fn new(id: LoadId, name: impl Into<String>, bus: BusId, active_power: Megawatts) -> Self {
        Self {
            id,
            name: name.into(),
            bus,
            active_power,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Bus(Bus),
    Gen(Gen),
    Load(Load),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Edge {
    Branch(Branch),
}

/// The physical grid.
#[derive(Debug)]
pub struct Network {
    pub graph: Graph<Node, Edge, Undirected>,
    /// System base (MVA) for per-unit conversion
    pub base_mva: f64,
}

impl Default for Network {
    fn default() -> Self {
        Self::new()
    }
}

impl Network {
    pub fn new() -> Self {
        Self {
            graph: Graph::new_undirected(),
            base_mva: DEFAULT_BASE_MVA,
        }
    }

    pub fn with_base_mva(mut self, base_mva: f64) -> Self {
        self.base_mva = base_mva;
        self
    }

    pub fn add_bus(&mut self, bus: Bus) -> NodeIndex {
        self.graph.add_node(Node::Bus(bus))
    }

    /// Generators and loads hang off the graph as their own nodes, linked
    /// to their bus by id only.
    pub fn add_gen(&mut self, gen: Gen) -> NodeIndex {
        self.graph.add_node(Node::Gen(gen))
    }

    pub fn add_load(&mut self, load: Load) -> NodeIndex {
        self.graph.add_node(Node::Load(load))
    }

    /// Add a branch between two existing buses.
    pub fn add_branch(&mut self, branch: Branch) -> RaoResult<EdgeIndex> {
        let from = self.bus_node(branch.from_bus).ok_or_else(|| {
            RaoError::Network(format!(
                "branch '{}' references unknown bus {}",
                branch.name,
                branch.from_bus.value()
            ))
        })?;
        let to = self.bus_node(branch.to_bus).ok_or_else(|| {
            RaoError::Network(format!(
                "branch '{}' references unknown bus {}",
                branch.name,
                branch.to_bus.value()
            ))
        })?;
        Ok(self.graph.add_edge(from, to, Edge::Branch(branch)))
    }

    fn bus_node(&self, id: BusId) -> Option<NodeIndex> {
        self.graph
            .node_indices()
            .find(|&idx| matches!(&self.graph[idx], Node::Bus(b) if b.id == id))
    }

    pub fn bus(&self, id: BusId) -> Option<&Bus> {
        self.graph.node_weights().find_map(|n| match n {
            Node::Bus(b) if b.id == id => Some(b),
            _ => None,
        })
    }

    /// All buses, sorted by id.
    pub fn buses(&self) -> Vec<&Bus> {
        let mut buses: Vec<&Bus> = self
            .graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Bus(b) => Some(b),
                _ => None,
            })
            .collect();
        buses.sort_by_key(|b| b.id);
        buses
    }

    pub fn generators(&self) -> impl Iterator<Item = &Gen> {
        self.graph.node_weights().filter_map(|n| match n {
            Node::Gen(g) => Some(g),
            _ => None,
        })
    }

    pub fn loads(&self) -> impl Iterator<Item = &Load> {
        self.graph.node_weights().filter_map(|n| match n {
            Node::Load(l) => Some(l),
            _ => None,
        })
    }

    /// All branches in insertion order, regardless of status.
    pub fn branches(&self) -> impl Iterator<Item = &Branch> {
        self.graph.edge_weights().map(|e| match e {
            Edge::Branch(b) => b,
        })
    }

    pub fn branch_by_name(&self, name: &str) -> Option<&Branch> {
        self.branches().find(|b| b.name == name)
    }

    /// Nominal voltage at the (from, to) ends of a branch.
    pub fn branch_nominal_kv(&self, branch: &Branch) -> (Kilovolts, Kilovolts) {
        let kv = |id| self.bus(id).map(|b| b.base_kv).unwrap_or_default();
        (kv(branch.from_bus), kv(branch.to_bus))
    }

    /// Net scheduled injection (generation minus load) at a bus, in MW.
    pub fn net_injection(&self, bus: BusId) -> Megawatts {
        let gen: Megawatts = self
            .generators()
            .filter(|g| g.status && g.bus == bus)
            .map(|g| g.active_power)
            .sum();
        let load: Megawatts = self
            .loads()
            .filter(|l| l.bus == bus)
            .map(|l| l.active_power)
            .sum();
        gen - load
    }

    pub fn stats(&self) -> NetworkStats {
        let mut stats = NetworkStats::default();

        for node in self.graph.node_weights() {
            match node {
                Node::Bus(_) => stats.num_buses += 1,
                Node::Gen(g) => {
                    stats.num_gens += 1;
                    if g.status {
                        stats.total_gen_mw += g.active_power.value();
                    }
                }
                Node::Load(l) => {
                    stats.num_loads += 1;
                    stats.total_load_mw += l.active_power.value();
                }
            }
        }
        for branch in self.branches() {
            stats.num_branches += 1;
            if !branch.status {
                stats.num_open_branches += 1;
            }
            if branch.is_phase_shifter {
                stats.num_phase_shifters += 1;
            }
        }
        stats
    }

    /// Validate the network before any optimisation starts.
    ///
    /// Errors: no buses, no branches, duplicate branch names, unknown bus
    /// references, unusable reactance, islands in the initial topology.
    /// Warnings: generation/load imbalance (the slack bus absorbs it).
    pub fn validate_into(&self, diag: &mut Diagnostics) {
        let stats = self.stats();

        if stats.num_buses == 0 {
            diag.add_error("structure", "Network has no buses");
            return;
        }
        if stats.num_branches == 0 && stats.num_buses > 1 {
            diag.add_error("structure", "Network has multiple buses but no branches");
        }
        if !(self.base_mva.is_finite() && self.base_mva > 0.0) {
            diag.add_error(
                "physical",
                &format!("Base MVA must be positive, got {}", self.base_mva),
            );
        }

        let mut names = std::collections::BTreeSet::new();
        for branch in self.branches() {
            if !names.insert(branch.name.as_str()) {
                diag.add_error_with_entity("reference", "Duplicate branch name", &branch.name);
            }
            for bus in [branch.from_bus, branch.to_bus] {
                if self.bus(bus).is_none() {
                    diag.add_error_with_entity(
                        "reference",
                        &format!("Branch references unknown bus {}", bus.value()),
                        &branch.name,
                    );
                }
            }
            let bad_reactance = if branch.is_phase_shifter {
                !branch.reactance.is_finite() || branch.reactance.abs() < 1e-12
            } else {
                !branch.reactance.is_finite() || branch.reactance <= 0.0
            };
            if bad_reactance {
                diag.add_error_with_entity(
                    "physical",
                    &format!("Unusable reactance {}", branch.reactance),
                    &branch.name,
                );
            }
        }

        for gen in self.generators() {
            if self.bus(gen.bus).is_none() {
                diag.add_error_with_entity(
                    "reference",
                    &format!("Generator references unknown bus {}", gen.bus.value()),
                    &gen.name,
                );
            }
        }
        for load in self.loads() {
            if self.bus(load.bus).is_none() {
                diag.add_error_with_entity(
                    "reference",
                    &format!("Load references unknown bus {}", load.bus.value()),
                    &load.name,
                );
            }
        }

        let islands = count_islands(self, |b| b.status);
        if islands > 1 {
            diag.add_error(
                "topology",
                &format!("Initial topology is split into {} islands", islands),
            );
        }

        let imbalance = stats.total_gen_mw - stats.total_load_mw;
        if imbalance.abs() > 1e-6 {
            diag.add_warning(
                "balance",
                &format!(
                    "Generation exceeds load by {:.1} MW; the slack bus absorbs the difference",
                    imbalance
                ),
            );
        }
    }
}

/// Statistics about a network's size
#[derive(Debug, Clone, Default)]
pub struct NetworkStats {
    pub num_buses: usize,
    pub num_gens: usize,
    pub num_loads: usize,
    pub num_branches: usize,
    pub num_open_branches: usize,
    pub num_phase_shifters: usize,
    pub total_gen_mw: f64,
    pub total_load_mw: f64,
}

impl std::fmt::Display for NetworkStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} buses, {} branches ({} open, {} PST), {} gens ({:.0} MW), {} loads ({:.0} MW)",
            self.num_buses,
            self.num_branches,
            self.num_open_branches,
            self.num_phase_shifters,
            self.num_gens,
            self.total_gen_mw,
            self.num_loads,
            self.total_load_mw
        )
    }
}

impl Node {
    pub fn label(&self) -> &str {
        match self {
            Node::Bus(bus) => &bus.name,
            Node::Gen(gen) => &gen.name,
            Node::Load(load) => &load.name,
        }
    }
}

impl Edge {
    pub fn label(&self) -> &str {
        match self {
            Edge::Branch(branch) => &branch.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_bus() -> Network {
        let mut network = Network::new();
        network.add_bus(Bus::new(BusId::new(1), "B1", Kilovolts(400.0)));
        network.add_bus(Bus::new(BusId::new(2), "B2", Kilovolts(225.0)));
        network.add_gen(Gen::new(GenId::new(1), "G1", BusId::new(1), Megawatts(100.0)));
        network.add_load(Load::new(LoadId::new(1), "D2", BusId::new(2), Megawatts(100.0)));
        network
            .add_branch(Branch::new(
                BranchId::new(1),
                "L12",
                BusId::new(1),
                BusId::new(2),
                0.1,
            ))
            .unwrap();
        network
    }

    #[test]
    fn test_network_creation() {
        let network = two_bus();
        assert_eq!(network.graph.edge_count(), 1);
        assert_eq!(network.buses().len(), 2);
        assert_eq!(network.branch_by_name("L12").unwrap().id, BranchId::new(1));
        assert!(network.branch_by_name("L13").is_none());
        assert_eq!(network.base_mva, DEFAULT_BASE_MVA);
    }

    #[test]
    fn test_branch_to_unknown_bus_is_rejected() {
        let mut network = two_bus();
        let err = network
            .add_branch(Branch::new(
                BranchId::new(2),
                "L19",
                BusId::new(1),
                BusId::new(9),
                0.1,
            ))
            .unwrap_err();
        assert!(matches!(err, RaoError::Network(_)));
    }

    #[test]
    fn test_nominal_kv_and_injection() {
        let network = two_bus();
        let branch = network.branch_by_name("L12").unwrap();
        let (from, to) = network.branch_nominal_kv(branch);
        assert_eq!(from, Kilovolts(400.0));
        assert_eq!(to, Kilovolts(225.0));
        assert_eq!(network.net_injection(BusId::new(1)), Megawatts(100.0));
        assert_eq!(network.net_injection(BusId::new(2)), Megawatts(-100.0));
    }

    #[test]
    fn test_network_validation_empty() {
        let network = Network::new();
        let mut diag = Diagnostics::new();
        network.validate_into(&mut diag);
        assert!(diag.errors().any(|i| i.message.contains("no buses")));
    }

    #[test]
    fn test_valid_network_has_no_errors() {
        let network = two_bus();
        let mut diag = Diagnostics::new();
        network.validate_into(&mut diag);
        assert!(!diag.has_errors(), "{}", diag);
        assert_eq!(diag.warning_count(), 0);
    }

    #[test]
    fn test_validation_catches_bad_reactance_and_islands() {
        let mut network = two_bus();
        network.add_bus(Bus::new(BusId::new(3), "B3", Kilovolts(400.0)));
        network
            .add_branch(
                Branch::new(BranchId::new(2), "L23", BusId::new(2), BusId::new(3), 0.0).opened(),
            )
            .unwrap();

        let mut diag = Diagnostics::new();
        network.validate_into(&mut diag);
        assert!(diag
            .errors()
            .any(|i| i.category == "physical" && i.entity.as_deref() == Some("L23")));
        assert!(diag.errors().any(|i| i.message.contains("2 islands")));
    }

    #[test]
    fn test_phase_shifter_may_have_negative_reactance() {
        let mut network = two_bus();
        network
            .add_branch(
                Branch::new(BranchId::new(2), "PST", BusId::new(1), BusId::new(2), -0.05)
                    .as_phase_shifter(),
            )
            .unwrap();
        let mut diag = Diagnostics::new();
        network.validate_into(&mut diag);
        assert!(!diag.has_errors(), "{}", diag);
    }

    #[test]
    fn test_network_stats() {
        let mut network = two_bus();
        network
            .add_branch(
                Branch::new(BranchId::new(2), "L12b", BusId::new(1), BusId::new(2), 0.1).opened(),
            )
            .unwrap();
        let stats = network.stats();
        assert_eq!(stats.num_buses, 2);
        assert_eq!(stats.num_branches, 2);
        assert_eq!(stats.num_open_branches, 1);
        assert!((stats.total_load_mw - 100.0).abs() < 1e-9);
        assert!(stats.to_string().starts_with("2 buses, 2 branches (1 open"));
    }
}
