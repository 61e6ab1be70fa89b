use super::network_action::NetworkAction;
use super::range_action::PstRangeAction;
use super::usage_rule::{usage_method_at, UsageMethod, UsageRule};
use serde::{Deserialize, Serialize};

/// Closed set of remedial action kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RemedialAction {
    Pst(PstRangeAction),
    Network(NetworkAction),
}

impl RemedialAction {
    pub fn id(&self) -> &str {
        match self {
            RemedialAction::Pst(pst) => &pst.id,
            RemedialAction::Network(na) => &na.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            RemedialAction::Pst(pst) => pst.name.as_deref().unwrap_or(&pst.id),
            RemedialAction::Network(na) => na.name.as_deref().unwrap_or(&na.id),
        }
    }

    pub fn usage_rules(&self) -> &[UsageRule] {
        match self {
            RemedialAction::Pst(pst) => &pst.usage_rules,
            RemedialAction::Network(na) => &na.usage_rules,
        }
    }

    /// Strongest usage method granted at (instant, contingency), if any.
    pub fn usage_method(&self, instant_id: &str, contingency_id: Option<&str>) -> Option<UsageMethod> {
        usage_method_at(self.usage_rules(), instant_id, contingency_id)
    }

    pub fn is_available(&self, instant_id: &str, contingency_id: Option<&str>) -> bool {
        self.usage_method(instant_id, contingency_id).is_some()
    }

    pub fn as_pst(&self) -> Option<&PstRangeAction> {
        match self {
            RemedialAction::Pst(pst) => Some(pst),
            RemedialAction::Network(_) => None,
        }
    }

    pub fn as_network(&self) -> Option<&NetworkAction> {
        match self {
            RemedialAction::Network(na) => Some(na),
            RemedialAction::Pst(_) => None,
        }
    }
}

impl From<PstRangeAction> for RemedialAction {
    fn from(pst: PstRangeAction) -> Self {
        RemedialAction::Pst(pst)
    }
}

impl From<NetworkAction> for RemedialAction {
    fn from(na: NetworkAction) -> Self {
        RemedialAction::Network(na)
    }
}
