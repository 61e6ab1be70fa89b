//! Built-in twelve-node demonstration case.
//!
//! Four zones (BBE, DDE, FFR, NNL) of three 400 kV buses each, tied in a
//! ring. The line `NNL2AA1  BBE3AA1  1` starts 55 MW over its 410 MW
//! preventive limit; the PST inside BBE can fix that. Losing the
//! DDE-NNL tie makes NNL radial: the monitored line then carries the whole
//! 950 MW NNL deficit, which closing its two parallel circuits at the
//! curative instant spreads over three lines.

use rao_core::crac::{
    ActionType, BranchThreshold, Contingency, Crac, CracBuilder, FlowCnec, InstantKind,
    NetworkAction, PstRangeAction, TapRange, UsageMethod, UsageRule,
};
use rao_core::{
    Branch, BranchId, BranchKind, Bus, BusId, Gen, GenId, Kilovolts, Load, LoadId, Megawatts,
    Network, RaoError, RaoResult,
};

pub const CONTINGENCY_ID: &str = "contingency";
pub const PST_RANGE_ACTION_ID: &str = "pst-range-action";
pub const TOPOLOGICAL_ACTION_ID: &str = "terminals-connection-action";

const LINE_REACTANCE: f64 = 0.01;
const DEGREES_PER_TAP: f64 = 0.39;

/// (node, generation MW, load MW)
const NODES: [(&str, f64, f64); 12] = [
    ("BBE1AA1", 2500.0, 650.0),
    ("BBE2AA1", 3000.0, 2500.0),
    ("BBE3AA1", 1500.0, 2950.0),
    ("DDE1AA1", 2750.0, 2000.0),
    ("DDE2AA1", 2350.0, 3000.0),
    ("DDE3AA1", 1850.0, 1500.0),
    ("FFR1AA1", 2000.0, 1500.0),
    ("FFR2AA1", 2000.0, 1500.0),
    ("FFR3AA1", 1000.0, 2400.0),
    ("NNL1AA1", 1000.0, 1550.0),
    ("NNL2AA1", 500.0, 900.0),
    ("NNL3AA1", 1500.0, 1500.0),
];

/// (from, to, order code, initially closed)
const LINES: [(&str, &str, char, bool); 17] = [
    ("BBE1AA1", "BBE2AA1", '1', true),
    ("BBE1AA1", "BBE3AA1", '1', true),
    ("FFR1AA1", "FFR2AA1", '1', true),
    ("FFR1AA1", "FFR3AA1", '1', true),
    ("FFR2AA1", "FFR3AA1", '1', true),
    ("DDE1AA1", "DDE2AA1", '1', true),
    ("DDE1AA1", "DDE3AA1", '1', true),
    ("DDE2AA1", "DDE3AA1", '1', true),
    ("NNL1AA1", "NNL2AA1", '1', true),
    ("NNL1AA1", "NNL3AA1", '1', true),
    ("NNL2AA1", "NNL3AA1", '1', true),
    ("FFR2AA1", "DDE3AA1", '1', true),
    ("DDE2AA1", "NNL3AA1", '1', true),
    ("NNL2AA1", "BBE3AA1", '1', true),
    ("BBE2AA1", "FFR3AA1", '1', true),
    ("NNL2AA1", "BBE3AA1", '2', false),
    ("NNL2AA1", "BBE3AA1", '3', false),
];

const PST: (&str, &str, char) = ("BBE2AA1", "BBE3AA1", '1');

/// UCTE-style element id: two 8-character node codes and the order code.
pub fn element_id(from: &str, to: &str, order: char) -> String {
    format!("{:<8} {:<8} {}", from, to, order)
}

pub fn monitored_line() -> String {
    element_id("NNL2AA1", "BBE3AA1", '1')
}

fn bus_id(code: &str) -> RaoResult<BusId> {
    NODES
        .iter()
        .position(|(node, _, _)| *node == code)
        .map(|position| BusId::new(position + 1))
        .ok_or_else(|| RaoError::Network(format!("unknown node '{}'", code)))
}

pub fn twelve_node_network() -> RaoResult<Network> {
    let mut network = Network::new();
    for (idx, (code, generation, load)) in NODES.iter().enumerate() {
        let bus = BusId::new(idx + 1);
        network.add_bus(Bus::new(bus, *code, Kilovolts(400.0)));
        network.add_gen(Gen::new(
            GenId::new(idx + 1),
            format!("{}_generator", code),
            bus,
            Megawatts(*generation),
        ));
        network.add_load(Load::new(
            LoadId::new(idx + 1),
            format!("{}_load", code),
            bus,
            Megawatts(*load),
        ));
    }

    for (idx, (from, to, order, closed)) in LINES.iter().enumerate() {
        let branch = Branch::new(
            BranchId::new(idx + 1),
            element_id(from, to, *order),
            bus_id(from)?,
            bus_id(to)?,
            LINE_REACTANCE,
        );
        network.add_branch(if *closed { branch } else { branch.opened() })?;
    }

    let (from, to, order) = PST;
    network.add_branch(
        Branch::new(
            BranchId::new(LINES.len() + 1),
            element_id(from, to, order),
            bus_id(from)?,
            bus_id(to)?,
            LINE_REACTANCE,
        )
        .as_phase_shifter(),
    )?;

    Ok(network)
}

pub fn twelve_node_crac(network: &Network) -> RaoResult<Crac> {
    let monitored = monitored_line();
    let limit = |mw: f64| BranchThreshold::megawatts(-mw, mw);
    let (pst_from, pst_to, pst_order) = PST;

    CracBuilder::new("crac")
        .add_instant("preventive", InstantKind::Preventive)
        .add_instant("outage", InstantKind::Outage)
        .add_instant("curative", InstantKind::Curative)
        .add_contingency(
            Contingency::new(CONTINGENCY_ID)
                .with_element(element_id("DDE2AA1", "NNL3AA1", '1'), BranchKind::Line),
        )
        .add_flow_cnec(
            FlowCnec::new(format!("{} - preventive", monitored), monitored.as_str(), "preventive")
                .with_threshold(limit(410.0)),
        )
        .add_flow_cnec(
            FlowCnec::new(format!("{} - outage", monitored), monitored.as_str(), "outage")
                .after(CONTINGENCY_ID)
                .with_threshold(limit(1000.0)),
        )
        .add_flow_cnec(
            FlowCnec::new(format!("{} - curative", monitored), monitored.as_str(), "curative")
                .after(CONTINGENCY_ID)
                .with_threshold(limit(410.0)),
        )
        .add_pst_range_action(
            PstRangeAction::new(PST_RANGE_ACTION_ID, element_id(pst_from, pst_to, pst_order))
                .with_initial_tap(0)
                .with_uniform_taps(-16, 16, DEGREES_PER_TAP)
                .with_range(TapRange::absolute(-16, 16))
                .with_usage_rule(UsageRule::on_instant("preventive", UsageMethod::Available)),
        )
        .add_network_action(
            NetworkAction::new(TOPOLOGICAL_ACTION_ID)
                .with_terminals_connection(element_id("NNL2AA1", "BBE3AA1", '2'), ActionType::Close)
                .with_terminals_connection(element_id("NNL2AA1", "BBE3AA1", '3'), ActionType::Close)
                .with_usage_rule(UsageRule::on_contingency_state(
                    "curative",
                    CONTINGENCY_ID,
                    UsageMethod::Available,
                )),
        )
        .build(network)
}
