//! Small networks and CRACs shared by unit and integration tests.

use rao_core::crac::{
    ActionType, BranchThreshold, Contingency, Crac, CracBuilder, FlowCnec, InstantKind,
    NetworkAction, PstRangeAction, TapRange, UsageMethod, UsageRule,
};
use rao_core::{Branch, BranchId, Bus, BusId, Gen, GenId, Kilovolts, Load, LoadId, Megawatts, Network};
use std::sync::Arc;

fn bus(network: &mut Network, id: usize, name: &str) {
    network.add_bus(Bus::new(BusId::new(id), name, Kilovolts(400.0)));
}

fn line(network: &mut Network, branch: Branch) {
    if let Err(e) = network.add_branch(branch) {
        panic!("test network: {}", e);
    }
}

/// Three buses in a ring with a PST on L13:
///
/// ```text
///   B1 (300 MW gen) ── L12 ── B2
///     \                      /
///      L13 (PST)         L23
///        \              /
///          B3 (300 MW load)
/// ```
///
/// All reactances are 0.1 p.u., so the base case carries 200 MW on L13 and
/// 100 MW on L12/L23.
pub fn pst_triangle_network() -> Arc<Network> {
    let mut network = Network::new();
    bus(&mut network, 1, "B1");
    bus(&mut network, 2, "B2");
    bus(&mut network, 3, "B3");
    network.add_gen(Gen::new(GenId::new(1), "G1", BusId::new(1), Megawatts(300.0)));
    network.add_load(Load::new(LoadId::new(1), "D3", BusId::new(3), Megawatts(300.0)));
    line(&mut network, Branch::new(BranchId::new(1), "L12", BusId::new(1), BusId::new(2), 0.1));
    line(&mut network, Branch::new(BranchId::new(2), "L23", BusId::new(2), BusId::new(3), 0.1));
    line(
        &mut network,
        Branch::new(BranchId::new(3), "L13", BusId::new(1), BusId::new(3), 0.1).as_phase_shifter(),
    );
    Arc::new(network)
}

/// PST range action on L13 (0.5°/tap, taps −16..16) and ±160 MW preventive
/// limits on L13 and L12. The best tap is −16.
pub fn pst_triangle_builder() -> CracBuilder {
    CracBuilder::new("triangle")
        .add_instant("preventive", InstantKind::Preventive)
        .add_flow_cnec(
            FlowCnec::new("cnec-l13", "L13", "preventive")
                .with_threshold(BranchThreshold::megawatts(-160.0, 160.0)),
        )
        .add_flow_cnec(
            FlowCnec::new("cnec-l12", "L12", "preventive")
                .with_threshold(BranchThreshold::megawatts(-160.0, 160.0)),
        )
        .add_pst_range_action(
            PstRangeAction::new("pst", "L13")
                .with_uniform_taps(-16, 16, 0.5)
                .with_range(TapRange::absolute(-16, 16))
                .with_usage_rule(UsageRule::on_instant("preventive", UsageMethod::Available)),
        )
}

pub fn pst_triangle_crac(network: &Network) -> Crac {
    match pst_triangle_builder().build(network) {
        Ok(crac) => crac,
        Err(e) => panic!("triangle crac: {}", e),
    }
}

/// Two buses joined by La and Lb (closed) and Lc and Ld (open), 400 MW
/// from B1 to B2, all reactances 0.1 p.u.
pub fn two_bus_network() -> Arc<Network> {
    let mut network = Network::new();
    bus(&mut network, 1, "B1");
    bus(&mut network, 2, "B2");
    network.add_gen(Gen::new(GenId::new(1), "G1", BusId::new(1), Megawatts(400.0)));
    network.add_load(Load::new(LoadId::new(1), "D2", BusId::new(2), Megawatts(400.0)));
    line(&mut network, Branch::new(BranchId::new(1), "La", BusId::new(1), BusId::new(2), 0.1));
    line(&mut network, Branch::new(BranchId::new(2), "Lb", BusId::new(1), BusId::new(2), 0.1));
    line(
        &mut network,
        Branch::new(BranchId::new(3), "Lc", BusId::new(1), BusId::new(2), 0.1).opened(),
    );
    line(
        &mut network,
        Branch::new(BranchId::new(4), "Ld", BusId::new(1), BusId::new(2), 0.1).opened(),
    );
    Arc::new(network)
}

/// Contingencies co-a (trips La) and co-b (trips Lb). After either one the
/// remaining line carries 400 MW against a ±300 MW curative limit:
/// - `close-c` is granted on co-a only and restores a 100 MW margin
/// - `close-d` is granted on co-b only
/// - `open-b` on co-a islands the network
pub fn two_bus_builder() -> CracBuilder {
    let limit = || BranchThreshold::megawatts(-300.0, 300.0);
    CracBuilder::new("two-bus")
        .add_instant("preventive", InstantKind::Preventive)
        .add_instant("outage", InstantKind::Outage)
        .add_instant("curative", InstantKind::Curative)
        .add_contingency(Contingency::new("co-a").with_branch("La"))
        .add_contingency(Contingency::new("co-b").with_branch("Lb"))
        .add_flow_cnec(FlowCnec::new("prev-la", "La", "preventive").with_threshold(limit()))
        .add_flow_cnec(
            FlowCnec::new("out-lb", "Lb", "outage")
                .after("co-a")
                .with_threshold(BranchThreshold::megawatts(-500.0, 500.0)),
        )
        .add_flow_cnec(
            FlowCnec::new("cur-lb", "Lb", "curative")
                .after("co-a")
                .with_threshold(limit()),
        )
        .add_flow_cnec(
            FlowCnec::new("cur-la", "La", "curative")
                .after("co-b")
                .with_threshold(limit()),
        )
        .add_network_action(
            NetworkAction::new("open-b")
                .with_terminals_connection("Lb", ActionType::Open)
                .with_usage_rule(UsageRule::on_contingency_state(
                    "curative",
                    "co-a",
                    UsageMethod::Available,
                )),
        )
        .add_network_action(
            NetworkAction::new("close-c")
                .with_terminals_connection("Lc", ActionType::Close)
                .with_usage_rule(UsageRule::on_contingency_state(
                    "curative",
                    "co-a",
                    UsageMethod::Available,
                )),
        )
        .add_network_action(
            NetworkAction::new("close-d")
                .with_terminals_connection("Ld", ActionType::Close)
                .with_usage_rule(UsageRule::on_contingency_state(
                    "curative",
                    "co-b",
                    UsageMethod::Available,
                )),
        )
}

pub fn two_bus_crac(network: &Network) -> Crac {
    match two_bus_builder().build(network) {
        Ok(crac) => crac,
        Err(e) => panic!("two-bus crac: {}", e),
    }
}
