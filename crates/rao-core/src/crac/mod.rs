//! Grid security model: Contingencies, Remedial Actions and Constraints.
//!
//! A [`Crac`] is produced by [`CracBuilder::build`], which checks every
//! reference against the network and the declared instants/contingencies.
//! Once built it only answers read-only queries.

mod builder;
mod cnec;
mod contingency;
mod instant;
mod network_action;
mod range_action;
mod remedial_action;
mod usage_rule;

pub use builder::CracBuilder;
pub use cnec::{BranchThreshold, FlowCnec, Side, Unit};
pub use contingency::{Contingency, ContingencyElement};
pub use instant::{Instant, InstantKind};
pub use network_action::{ActionType, ElementaryAction, NetworkAction};
pub use range_action::{PstRangeAction, RangeType, TapRange};
pub use remedial_action::RemedialAction;
pub use usage_rule::{usage_method_at, UsageMethod, UsageRule};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crac {
    id: String,
    instants: Vec<Instant>,
    contingencies: Vec<Contingency>,
    flow_cnecs: Vec<FlowCnec>,
    remedial_actions: Vec<RemedialAction>,
}

impl Crac {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Instants in causal order.
    pub fn instants(&self) -> &[Instant] {
        &self.instants
    }

    pub fn instant(&self, id: &str) -> Option<&Instant> {
        self.instants.iter().find(|i| i.id == id)
    }

    pub fn preventive_instant(&self) -> Option<&Instant> {
        self.instants.iter().find(|i| i.is_preventive())
    }

    pub fn outage_instant(&self) -> Option<&Instant> {
        self.instants.iter().find(|i| i.is_outage())
    }

    /// Auto and curative instants, in causal order.
    pub fn post_outage_instants(&self) -> impl Iterator<Item = &Instant> {
        self.instants
            .iter()
            .filter(|i| i.is_auto() || i.is_curative())
    }

    pub fn contingencies(&self) -> &[Contingency] {
        &self.contingencies
    }

    pub fn contingency(&self, id: &str) -> Option<&Contingency> {
        self.contingencies.iter().find(|c| c.id == id)
    }

    pub fn flow_cnecs(&self) -> &[FlowCnec] {
        &self.flow_cnecs
    }

    pub fn flow_cnec(&self, id: &str) -> Option<&FlowCnec> {
        self.flow_cnecs.iter().find(|c| c.id == id)
    }

    /// CNECs of one perimeter state, in declaration order.
    pub fn cnecs_at(&self, instant_id: &str, contingency_id: Option<&str>) -> Vec<&FlowCnec> {
        self.flow_cnecs
            .iter()
            .filter(|c| c.instant_id == instant_id && c.contingency_id.as_deref() == contingency_id)
            .collect()
    }

    pub fn remedial_actions(&self) -> &[RemedialAction] {
        &self.remedial_actions
    }

    pub fn remedial_action(&self, id: &str) -> Option<&RemedialAction> {
        self.remedial_actions.iter().find(|ra| ra.id() == id)
    }

    /// Remedial actions granted at (instant, contingency) with their
    /// strongest usage method, in declaration order.
    pub fn remedial_actions_at(
        &self,
        instant_id: &str,
        contingency_id: Option<&str>,
    ) -> Vec<(&RemedialAction, UsageMethod)> {
        self.remedial_actions
            .iter()
            .filter_map(|ra| {
                ra.usage_method(instant_id, contingency_id)
                    .map(|method| (ra, method))
            })
            .collect()
    }

    pub fn pst_range_actions(&self) -> impl Iterator<Item = &PstRangeAction> {
        self.remedial_actions.iter().filter_map(RemedialAction::as_pst)
    }

    pub fn network_actions(&self) -> impl Iterator<Item = &NetworkAction> {
        self.remedial_actions
            .iter()
            .filter_map(RemedialAction::as_network)
    }

    /// The range action controlling a PST branch, if any.
    pub fn pst_range_action_on(&self, network_element_id: &str) -> Option<&PstRangeAction> {
        self.pst_range_actions()
            .find(|pst| pst.network_element_id == network_element_id)
    }
}
