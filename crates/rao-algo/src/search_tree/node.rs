//! Search-tree nodes and the arena that owns their network states.
//!
//! Nodes refer to their state by index. A state is written once, when its
//! node is promoted, and only read afterwards, so parallel candidate
//! evaluation can borrow the arena immutably.

use crate::objective::ObjectiveValue;
use crate::oracle::FlowResult;
use rao_core::NetworkState;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// What the search decided for one remedial action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionChoice {
    Activated,
    Tap(i32),
}

/// Remedial action id to choice; ordered, so equal sets compare and
/// serialize identically.
pub type ActionSet = BTreeMap<String, ActionChoice>;

/// Canonical key of an action set, e.g. `close-c;pst=-16`.
pub fn action_key(actions: &ActionSet) -> String {
    let mut key = String::new();
    for (idx, (id, choice)) in actions.iter().enumerate() {
        if idx > 0 {
            key.push(';');
        }
        key.push_str(id);
        if let ActionChoice::Tap(tap) = choice {
            let _ = write!(key, "={}", tap);
        }
    }
    key
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct StateId(usize);

#[derive(Debug, Default)]
pub struct StateArena {
    states: Vec<NetworkState>,
}

impl StateArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, state: NetworkState) -> StateId {
        self.states.push(state);
        StateId(self.states.len() - 1)
    }

    pub fn get(&self, id: StateId) -> &NetworkState {
        &self.states[id.0]
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct SearchNode {
    pub state: StateId,
    pub actions: ActionSet,
    pub key: String,
    pub flows: FlowResult,
    pub value: ObjectiveValue,
    pub depth: usize,
}

impl SearchNode {
    pub fn has_action(&self, remedial_action_id: &str) -> bool {
        self.actions.contains_key(remedial_action_id)
    }
}
