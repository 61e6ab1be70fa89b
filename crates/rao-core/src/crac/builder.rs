use super::{
    Crac, Contingency, ElementaryAction, FlowCnec, Instant, InstantKind, NetworkAction,
    PstRangeAction, RemedialAction, Side, Unit, UsageMethod, UsageRule,
};
use crate::{Network, RaoError, RaoResult};
use std::collections::{BTreeMap, BTreeSet};

/// Fluent declaration of a [`Crac`].
///
/// Declarations are only recorded; [`build`](CracBuilder::build) checks them
/// all against the network and reports every problem at once. Building the
/// same declarations twice yields equal models.
///
/// ```
/// use rao_core::crac::*;
/// # use rao_core::*;
/// # let mut network = Network::new();
/// # network.add_bus(Bus::new(BusId::new(1), "B1", Kilovolts(400.0)));
/// # network.add_bus(Bus::new(BusId::new(2), "B2", Kilovolts(400.0)));
/// # network.add_branch(Branch::new(BranchId::new(1), "L1", BusId::new(1), BusId::new(2), 0.1)).unwrap();
/// # network.add_branch(Branch::new(BranchId::new(2), "L2", BusId::new(1), BusId::new(2), 0.1)).unwrap();
/// let crac = CracBuilder::new("crac")
///     .add_instant("preventive", InstantKind::Preventive)
///     .add_instant("outage", InstantKind::Outage)
///     .add_contingency(Contingency::new("co-1").with_branch("L1"))
///     .add_flow_cnec(
///         FlowCnec::new("cnec-out", "L2", "outage")
///             .after("co-1")
///             .with_threshold(BranchThreshold::megawatts(-500.0, 500.0)),
///     )
///     .build(&network)
///     .unwrap();
/// assert_eq!(crac.cnecs_at("outage", Some("co-1")).len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CracBuilder {
    id: String,
    instants: Vec<(String, InstantKind)>,
    contingencies: Vec<Contingency>,
    flow_cnecs: Vec<FlowCnec>,
    remedial_actions: Vec<RemedialAction>,
}

impl CracBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Instants are ordered by declaration.
    pub fn add_instant(mut self, id: impl Into<String>, kind: InstantKind) -> Self {
        self.instants.push((id.into(), kind));
        self
    }

    pub fn add_contingency(mut self, contingency: Contingency) -> Self {
        self.contingencies.push(contingency);
        self
    }

    pub fn add_flow_cnec(mut self, cnec: FlowCnec) -> Self {
        self.flow_cnecs.push(cnec);
        self
    }

    pub fn add_pst_range_action(mut self, pst: PstRangeAction) -> Self {
        self.remedial_actions.push(RemedialAction::Pst(pst));
        self
    }

    pub fn add_network_action(mut self, action: NetworkAction) -> Self {
        self.remedial_actions.push(RemedialAction::Network(action));
        self
    }

    pub fn build(&self, network: &Network) -> RaoResult<Crac> {
        let mut problems = Vec::new();

        let instants = self.check_instants(&mut problems);
        self.check_contingencies(network, &mut problems);
        let flow_cnecs = self.check_cnecs(network, &instants, &mut problems);
        let remedial_actions = self.check_remedial_actions(network, &instants, &mut problems);

        if !problems.is_empty() {
            return Err(RaoError::validation(&problems));
        }
        Ok(Crac {
            id: self.id.clone(),
            instants,
            contingencies: self.contingencies.clone(),
            flow_cnecs,
            remedial_actions,
        })
    }

    fn check_instants(&self, problems: &mut Vec<String>) -> Vec<Instant> {
        let mut seen = BTreeSet::new();
        let mut instants = Vec::with_capacity(self.instants.len());

        if self.instants.is_empty() {
            problems.push("no instant declared".to_string());
        }
        for (order, (id, kind)) in self.instants.iter().enumerate() {
            if !seen.insert(id.as_str()) {
                problems.push(format!("instant '{}' declared twice", id));
            }
            if order == 0 && *kind != InstantKind::Preventive {
                problems.push(format!("first instant '{}' must be PREVENTIVE", id));
            }
            if let Some(previous) = instants.last().map(|i: &Instant| i.kind) {
                if *kind < previous {
                    problems.push(format!(
                        "instant '{}' ({}) declared after a {} instant",
                        id, kind, previous
                    ));
                }
                if *kind == previous && matches!(kind, InstantKind::Preventive | InstantKind::Outage)
                {
                    problems.push(format!("only one {} instant is allowed", kind));
                }
            }
            instants.push(Instant {
                id: id.clone(),
                kind: *kind,
                order,
            });
        }

        let has_outage = instants.iter().any(Instant::is_outage);
        if !has_outage {
            for instant in instants.iter().filter(|i| i.is_auto() || i.is_curative()) {
                problems.push(format!(
                    "instant '{}' ({}) requires an OUTAGE instant",
                    instant.id, instant.kind
                ));
            }
        }
        instants
    }

    fn check_contingencies(&self, network: &Network, problems: &mut Vec<String>) {
        let mut seen = BTreeSet::new();
        for co in &self.contingencies {
            if !seen.insert(co.id.as_str()) {
                problems.push(format!("contingency '{}' declared twice", co.id));
            }
            if co.elements.is_empty() {
                problems.push(format!("contingency '{}' has no element", co.id));
            }
            for element in &co.elements {
                match network.branch_by_name(&element.id) {
                    None => problems.push(format!(
                        "contingency '{}': unknown network element '{}'",
                        co.id, element.id
                    )),
                    Some(branch) if branch.kind != element.element_type => problems.push(format!(
                        "contingency '{}': element '{}' is not a {:?}",
                        co.id, element.id, element.element_type
                    )),
                    Some(_) => {}
                }
            }
        }
    }

    fn check_cnecs(
        &self,
        network: &Network,
        instants: &[Instant],
        problems: &mut Vec<String>,
    ) -> Vec<FlowCnec> {
        let mut seen = BTreeSet::new();
        let mut cnecs = Vec::with_capacity(self.flow_cnecs.len());

        for cnec in &self.flow_cnecs {
            let mut cnec = cnec.clone();
            let who = format!("cnec '{}'", cnec.id);
            if !seen.insert(cnec.id.clone()) {
                problems.push(format!("{} declared twice", who));
            }

            match instants.iter().find(|i| i.id == cnec.instant_id) {
                None => problems.push(format!("{}: unknown instant '{}'", who, cnec.instant_id)),
                Some(instant) => match (&cnec.contingency_id, instant.is_preventive()) {
                    (Some(co), true) => problems.push(format!(
                        "{}: preventive CNEC cannot reference contingency '{}'",
                        who, co
                    )),
                    (None, false) => problems.push(format!(
                        "{}: {} CNEC needs a contingency",
                        who, instant.kind
                    )),
                    (Some(co), false) if !self.has_contingency(co) => {
                        problems.push(format!("{}: unknown contingency '{}'", who, co))
                    }
                    _ => {}
                },
            }

            match network.branch_by_name(&cnec.network_element_id) {
                None => problems.push(format!(
                    "{}: unknown network element '{}'",
                    who, cnec.network_element_id
                )),
                Some(branch) => {
                    let (from, to) = network.branch_nominal_kv(branch);
                    cnec.nominal_kv = [from, to];
                }
            }

            if cnec.thresholds.is_empty() {
                problems.push(format!("{}: no threshold", who));
            }
            for threshold in &cnec.thresholds {
                match (threshold.min, threshold.max) {
                    (None, None) => problems.push(format!("{}: threshold without bounds", who)),
                    (Some(min), Some(max)) if min > max => {
                        problems.push(format!("{}: threshold min {} > max {}", who, min, max))
                    }
                    _ => {}
                }
                if threshold.unit == Unit::Ampere
                    && cnec.nominal_voltage(threshold.side).value() <= 0.0
                {
                    let side = match threshold.side {
                        Side::One => "ONE",
                        Side::Two => "TWO",
                    };
                    problems.push(format!(
                        "{}: ampere threshold on side {} needs a nominal voltage",
                        who, side
                    ));
                }
            }
            if !(cnec.reliability_margin.is_finite() && cnec.reliability_margin >= 0.0) {
                problems.push(format!(
                    "{}: reliability margin must be a non-negative number",
                    who
                ));
            }
            cnecs.push(cnec);
        }
        cnecs
    }

    fn check_remedial_actions(
        &self,
        network: &Network,
        instants: &[Instant],
        problems: &mut Vec<String>,
    ) -> Vec<RemedialAction> {
        let mut seen = BTreeSet::new();
        let mut pst_elements = BTreeSet::new();
        let tap_tables: BTreeMap<&str, &PstRangeAction> = self
            .remedial_actions
            .iter()
            .filter_map(RemedialAction::as_pst)
            .map(|pst| (pst.network_element_id.as_str(), pst))
            .collect();

        let mut actions = Vec::with_capacity(self.remedial_actions.len());
        for ra in &self.remedial_actions {
            let who = format!("remedial action '{}'", ra.id());
            if !seen.insert(ra.id().to_string()) {
                problems.push(format!("{} declared twice", who));
            }
            self.check_usage_rules(&who, ra, instants, problems);

            match ra {
                RemedialAction::Pst(pst) => {
                    if !pst_elements.insert(pst.network_element_id.as_str()) {
                        problems.push(format!(
                            "{}: PST '{}' already has a range action",
                            who, pst.network_element_id
                        ));
                    }
                    check_pst(&who, pst, network, problems);
                    actions.push(ra.clone());
                }
                RemedialAction::Network(na) => {
                    let resolved = resolve_network_action(&who, na, network, &tap_tables, problems);
                    actions.push(RemedialAction::Network(resolved));
                }
            }
        }
        actions
    }

    fn check_usage_rules(
        &self,
        who: &str,
        ra: &RemedialAction,
        instants: &[Instant],
        problems: &mut Vec<String>,
    ) {
        if ra.usage_rules().is_empty() {
            problems.push(format!("{}: no usage rule", who));
        }
        for rule in ra.usage_rules() {
            let Some(instant) = instants.iter().find(|i| i.id == rule.instant_id()) else {
                problems.push(format!(
                    "{}: usage rule on unknown instant '{}'",
                    who,
                    rule.instant_id()
                ));
                continue;
            };
            if let UsageRule::OnContingencyState { contingency_id, .. } = rule {
                if instant.is_preventive() {
                    problems.push(format!(
                        "{}: contingency usage rule on the preventive instant",
                        who
                    ));
                }
                if !self.has_contingency(contingency_id) {
                    problems.push(format!(
                        "{}: usage rule on unknown contingency '{}'",
                        who, contingency_id
                    ));
                }
            }
            if instant.is_auto() && rule.usage_method() != UsageMethod::Forced {
                problems.push(format!(
                    "{}: AUTO instant '{}' only accepts FORCED usage rules",
                    who, instant.id
                ));
            }
            if matches!(ra, RemedialAction::Pst(_)) && rule.usage_method() == UsageMethod::Forced {
                problems.push(format!(
                    "{}: range actions cannot be FORCED (no set-point to force)",
                    who
                ));
            }
        }
    }

    fn has_contingency(&self, id: &str) -> bool {
        self.contingencies.iter().any(|c| c.id == id)
    }
}

fn check_pst(who: &str, pst: &PstRangeAction, network: &Network, problems: &mut Vec<String>) {
    match network.branch_by_name(&pst.network_element_id) {
        None => problems.push(format!(
            "{}: unknown network element '{}'",
            who, pst.network_element_id
        )),
        Some(branch) if !branch.is_phase_shifter => problems.push(format!(
            "{}: '{}' is not a phase-shifting transformer",
            who, pst.network_element_id
        )),
        Some(_) => {}
    }
    if pst.tap_to_angle.is_empty() {
        problems.push(format!("{}: empty tap table", who));
    } else if !pst.tap_to_angle.contains_key(&pst.initial_tap) {
        problems.push(format!(
            "{}: initial tap {} not in tap table",
            who, pst.initial_tap
        ));
    }
    if pst.tap_to_angle.values().any(|a| !a.is_finite()) {
        problems.push(format!("{}: non-finite angle in tap table", who));
    }
    for range in &pst.ranges {
        if range.min_tap > range.max_tap {
            problems.push(format!(
                "{}: min tap {} > max tap {}",
                who, range.min_tap, range.max_tap
            ));
        }
    }
}

fn resolve_network_action(
    who: &str,
    na: &NetworkAction,
    network: &Network,
    tap_tables: &BTreeMap<&str, &PstRangeAction>,
    problems: &mut Vec<String>,
) -> NetworkAction {
    let mut resolved = na.clone();
    if na.elementary_actions.is_empty() {
        problems.push(format!("{}: no elementary action", who));
    }
    for action in &mut resolved.elementary_actions {
        let element = action.network_element_id().to_string();
        let Some(branch) = network.branch_by_name(&element) else {
            problems.push(format!("{}: unknown network element '{}'", who, element));
            continue;
        };
        if let ElementaryAction::PstSetpoint { tap, angle, .. } = action {
            if !branch.is_phase_shifter {
                problems.push(format!(
                    "{}: '{}' is not a phase-shifting transformer",
                    who, element
                ));
                continue;
            }
            match tap_tables.get(element.as_str()).map(|pst| pst.angle(*tap)) {
                Some(Some(a)) => *angle = a,
                Some(None) => problems.push(format!(
                    "{}: tap {} not in the tap table of '{}'",
                    who, tap, element
                )),
                None => problems.push(format!(
                    "{}: no tap table known for PST '{}'",
                    who, element
                )),
            }
        }
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::{Branch, BranchId, Bus, BusId, Kilovolts, Network, RaoError};

    fn network() -> Network {
        let mut network = Network::new();
        network.add_bus(Bus::new(BusId::new(1), "B1", Kilovolts(400.0)));
        network.add_bus(Bus::new(BusId::new(2), "B2", Kilovolts(400.0)));
        network
            .add_branch(Branch::new(BranchId::new(1), "L1", BusId::new(1), BusId::new(2), 0.1))
            .unwrap();
        network
            .add_branch(Branch::new(BranchId::new(2), "L2", BusId::new(1), BusId::new(2), 0.1))
            .unwrap();
        network
            .add_branch(
                Branch::new(BranchId::new(3), "PST", BusId::new(1), BusId::new(2), 0.1)
                    .as_phase_shifter(),
            )
            .unwrap();
        network
    }

    fn declarations() -> CracBuilder {
        CracBuilder::new("crac")
            .add_instant("preventive", InstantKind::Preventive)
            .add_instant("outage", InstantKind::Outage)
            .add_instant("curative", InstantKind::Curative)
            .add_contingency(Contingency::new("co").with_branch("L1"))
            .add_flow_cnec(
                FlowCnec::new("prev", "L2", "preventive")
                    .with_threshold(BranchThreshold::megawatts(-410.0, 410.0)),
            )
            .add_flow_cnec(
                FlowCnec::new("cur", "L2", "curative")
                    .after("co")
                    .with_threshold(BranchThreshold::megawatts(-410.0, 410.0)),
            )
            .add_pst_range_action(
                PstRangeAction::new("pst", "PST")
                    .with_uniform_taps(-16, 16, 0.5)
                    .with_range(TapRange::absolute(-16, 16))
                    .with_usage_rule(UsageRule::on_instant("preventive", UsageMethod::Available)),
            )
            .add_network_action(
                NetworkAction::new("pst-to-4")
                    .with_pst_setpoint("PST", 4)
                    .with_usage_rule(UsageRule::on_contingency_state(
                        "curative",
                        "co",
                        UsageMethod::Available,
                    )),
            )
    }

    #[test]
    fn valid_declarations_build() {
        let crac = declarations().build(&network()).unwrap();
        assert_eq!(crac.instants().len(), 3);
        assert_eq!(crac.cnecs_at("curative", Some("co")).len(), 1);
        assert!(crac.cnecs_at("curative", None).is_empty());
        assert_eq!(crac.flow_cnec("prev").unwrap().nominal_kv[0], Kilovolts(400.0));
        assert_eq!(crac.remedial_actions_at("preventive", None).len(), 1);
        assert_eq!(crac.remedial_actions_at("curative", Some("co")).len(), 1);
        assert!(crac.pst_range_action_on("PST").is_some());
    }

    #[test]
    fn pst_setpoint_angle_is_resolved() {
        let crac = declarations().build(&network()).unwrap();
        let na = crac.network_actions().next().unwrap();
        assert_eq!(
            na.elementary_actions[0],
            ElementaryAction::PstSetpoint {
                network_element_id: "PST".into(),
                tap: 4,
                angle: crate::Degrees(2.0),
            }
        );
    }

    #[test]
    fn building_twice_gives_equal_models() {
        let network = network();
        let builder = declarations();
        assert_eq!(builder.build(&network).unwrap(), builder.build(&network).unwrap());
        assert_eq!(
            declarations().build(&network).unwrap(),
            declarations().build(&network).unwrap()
        );
    }

    #[test]
    fn inverted_tap_range_is_rejected() {
        let err = declarations()
            .add_pst_range_action(
                PstRangeAction::new("bad-pst", "PST")
                    .with_uniform_taps(-16, 16, 0.5)
                    .with_range(TapRange::absolute(5, -5))
                    .with_usage_rule(UsageRule::on_instant("preventive", UsageMethod::Available)),
            )
            .build(&network())
            .unwrap_err();
        let text = err.to_string();
        assert!(matches!(err, RaoError::Validation(_)));
        assert!(text.contains("min tap 5 > max tap -5"), "{}", text);
        assert!(text.contains("already has a range action"), "{}", text);
    }

    #[test]
    fn dangling_references_are_all_reported() {
        let err = declarations()
            .add_flow_cnec(
                FlowCnec::new("ghost", "L9", "later")
                    .with_threshold(BranchThreshold::megawatts(-1.0, 1.0)),
            )
            .add_flow_cnec(
                FlowCnec::new("no-co", "L2", "curative")
                    .after("co-x")
                    .with_threshold(BranchThreshold::megawatts(-1.0, 1.0)),
            )
            .add_network_action(
                NetworkAction::new("open-1")
                    .with_terminals_connection("L1", ActionType::Open)
                    .with_usage_rule(UsageRule::on_contingency_state(
                        "curative",
                        "co-y",
                        UsageMethod::Available,
                    )),
            )
            .build(&network())
            .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("unknown instant 'later'"), "{}", text);
        assert!(text.contains("unknown network element 'L9'"), "{}", text);
        assert!(text.contains("unknown contingency 'co-x'"), "{}", text);
        assert!(text.contains("usage rule on unknown contingency 'co-y'"), "{}", text);
    }

    #[test]
    fn instant_sequence_rules() {
        let err = CracBuilder::new("crac")
            .add_instant("outage", InstantKind::Outage)
            .add_instant("preventive", InstantKind::Preventive)
            .build(&network())
            .unwrap_err();
        assert!(err.to_string().contains("must be PREVENTIVE"));

        let err = CracBuilder::new("crac")
            .add_instant("preventive", InstantKind::Preventive)
            .add_instant("curative", InstantKind::Curative)
            .build(&network())
            .unwrap_err();
        assert!(err.to_string().contains("requires an OUTAGE instant"));
    }

    #[test]
    fn auto_instant_only_accepts_forced_rules() {
        let err = declarations()
            .add_instant("auto", InstantKind::Auto)
            .build(&network())
            .unwrap_err();
        // auto declared after curative
        assert!(err.to_string().contains("declared after a CURATIVE instant"));

        let builder = CracBuilder::new("crac")
            .add_instant("preventive", InstantKind::Preventive)
            .add_instant("outage", InstantKind::Outage)
            .add_instant("auto", InstantKind::Auto)
            .add_contingency(Contingency::new("co").with_branch("L1"))
            .add_network_action(
                NetworkAction::new("open-2")
                    .with_terminals_connection("L2", ActionType::Open)
                    .with_usage_rule(UsageRule::on_instant("auto", UsageMethod::Available)),
            );
        let err = builder.build(&network()).unwrap_err();
        assert!(err.to_string().contains("only accepts FORCED"));
    }

    #[test]
    fn preventive_cnec_with_contingency_is_rejected() {
        let err = declarations()
            .add_flow_cnec(
                FlowCnec::new("p2", "L2", "preventive")
                    .after("co")
                    .with_threshold(BranchThreshold::megawatts(-1.0, 1.0)),
            )
            .build(&network())
            .unwrap_err();
        assert!(err.to_string().contains("preventive CNEC cannot reference"));
    }

    #[test]
    fn model_serializes_to_json() {
        let crac = declarations().build(&network()).unwrap();
        let json = serde_json::to_string(&crac).unwrap();
        assert!(json.contains("\"kind\":\"pst\""));
        assert!(json.contains("\"PREVENTIVE\""));
    }
}
