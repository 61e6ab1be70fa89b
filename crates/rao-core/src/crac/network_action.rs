use super::usage_rule::UsageRule;
use crate::state::NetworkState;
use crate::{Degrees, RaoResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Open,
    Close,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ElementaryAction {
    TerminalsConnection {
        network_element_id: String,
        action_type: ActionType,
    },
    /// Angle is resolved from the PST's tap table when the model is built.
    PstSetpoint {
        network_element_id: String,
        tap: i32,
        angle: Degrees,
    },
}

impl ElementaryAction {
    pub fn network_element_id(&self) -> &str {
        match self {
            ElementaryAction::TerminalsConnection {
                network_element_id, ..
            }
            | ElementaryAction::PstSetpoint {
                network_element_id, ..
            } => network_element_id,
        }
    }

    /// Already satisfied in `state`.
    pub fn is_effective(&self, state: &NetworkState) -> bool {
        match self {
            ElementaryAction::TerminalsConnection {
                network_element_id,
                action_type,
            } => state
                .is_element_connected(network_element_id)
                .map(|connected| connected == (*action_type == ActionType::Close))
                .unwrap_or(false),
            ElementaryAction::PstSetpoint {
                network_element_id,
                tap,
                ..
            } => state
                .pst_setting(network_element_id)
                .is_some_and(|s| s.tap == *tap),
        }
    }

    fn apply(&self, state: &mut NetworkState) -> RaoResult<()> {
        match self {
            ElementaryAction::TerminalsConnection {
                network_element_id,
                action_type,
            } => state.set_connected(network_element_id, *action_type == ActionType::Close),
            ElementaryAction::PstSetpoint {
                network_element_id,
                tap,
                angle,
            } => state.set_pst(network_element_id, *tap, *angle),
        }
    }
}

/// Group of elementary actions applied atomically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkAction {
    pub id: String,
    pub name: Option<String>,
    pub elementary_actions: Vec<ElementaryAction>,
    pub usage_rules: Vec<UsageRule>,
    pub activation_cost: f64,
}

impl NetworkAction {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            elementary_actions: Vec::new(),
            usage_rules: Vec::new(),
            activation_cost: 0.0,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_terminals_connection(
        mut self,
        network_element_id: impl Into<String>,
        action_type: ActionType,
    ) -> Self {
        self.elementary_actions
            .push(ElementaryAction::TerminalsConnection {
                network_element_id: network_element_id.into(),
                action_type,
            });
        self
    }

    pub fn with_pst_setpoint(mut self, network_element_id: impl Into<String>, tap: i32) -> Self {
        self.elementary_actions.push(ElementaryAction::PstSetpoint {
            network_element_id: network_element_id.into(),
            tap,
            angle: Degrees::ZERO,
        });
        self
    }

    pub fn with_usage_rule(mut self, rule: UsageRule) -> Self {
        self.usage_rules.push(rule);
        self
    }

    pub fn with_activation_cost(mut self, cost: f64) -> Self {
        self.activation_cost = cost;
        self
    }

    /// Every elementary action already holds in `state`; applying it would
    /// change nothing.
    pub fn is_effective(&self, state: &NetworkState) -> bool {
        self.elementary_actions.iter().all(|a| a.is_effective(state))
    }

    pub fn apply(&self, state: &mut NetworkState) -> RaoResult<()> {
        for action in &self.elementary_actions {
            action.apply(state)?;
        }
        state.mark_activated(&self.id);
        Ok(())
    }
}
