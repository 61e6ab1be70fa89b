//! Working copy of the grid: switching and PST set-points layered over a
//! shared, immutable [`Network`].
//!
//! Cloning a state clones three small maps, never the graph, so the search
//! tree can fork one per node.

use crate::crac::Contingency;
use crate::{Branch, Degrees, Network, RaoError, RaoResult, Radians};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Tap position of a PST and the angle it produces.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PstSetting {
    pub tap: i32,
    pub angle: Degrees,
}

#[derive(Debug, Clone)]
pub struct NetworkState {
    network: Arc<Network>,
    /// Connection overrides; only entries differing from the initial status are kept
    connection: BTreeMap<String, bool>,
    pst: BTreeMap<String, PstSetting>,
    activated: BTreeSet<String>,
}

impl PartialEq for NetworkState {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.network, &other.network)
            && self.connection == other.connection
            && self.pst == other.pst
            && self.activated == other.activated
    }
}

impl NetworkState {
    pub fn new(network: Arc<Network>) -> Self {
        Self {
            network,
            connection: BTreeMap::new(),
            pst: BTreeMap::new(),
            activated: BTreeSet::new(),
        }
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn shared_network(&self) -> Arc<Network> {
        Arc::clone(&self.network)
    }

    fn branch(&self, element_id: &str) -> RaoResult<&Branch> {
        self.network.branch_by_name(element_id).ok_or_else(|| {
            RaoError::Network(format!("unknown network element '{}'", element_id))
        })
    }

    pub fn is_connected(&self, branch: &Branch) -> bool {
        self.connection
            .get(&branch.name)
            .copied()
            .unwrap_or(branch.status)
    }

    pub fn is_element_connected(&self, element_id: &str) -> RaoResult<bool> {
        Ok(self.is_connected(self.branch(element_id)?))
    }

    pub fn set_connected(&mut self, element_id: &str, connected: bool) -> RaoResult<()> {
        let initial = self.branch(element_id)?.status;
        if connected == initial {
            self.connection.remove(element_id);
        } else {
            self.connection.insert(element_id.to_string(), connected);
        }
        Ok(())
    }

    pub fn pst_setting(&self, element_id: &str) -> Option<PstSetting> {
        self.pst.get(element_id).copied()
    }

    pub fn set_pst(&mut self, element_id: &str, tap: i32, angle: Degrees) -> RaoResult<()> {
        if !self.branch(element_id)?.is_phase_shifter {
            return Err(RaoError::Network(format!(
                "'{}' is not a phase-shifting transformer",
                element_id
            )));
        }
        self.pst
            .insert(element_id.to_string(), PstSetting { tap, angle });
        Ok(())
    }

    /// Angle the DC equations see on `branch`.
    pub fn phase_shift(&self, branch: &Branch) -> Radians {
        self.pst
            .get(&branch.name)
            .map(|s| s.angle.to_radians())
            .unwrap_or(branch.phase_shift)
    }

    /// Copy of this state with every contingency element disconnected.
    pub fn with_contingency(&self, contingency: &Contingency) -> RaoResult<Self> {
        let mut state = self.clone();
        for element in &contingency.elements {
            state.set_connected(&element.id, false)?;
        }
        Ok(state)
    }

    pub fn mark_activated(&mut self, remedial_action_id: &str) {
        self.activated.insert(remedial_action_id.to_string());
    }

    pub fn is_activated(&self, remedial_action_id: &str) -> bool {
        self.activated.contains(remedial_action_id)
    }

    /// Remedial actions applied so far, across all instants, sorted by id.
    pub fn activated(&self) -> impl Iterator<Item = &str> {
        self.activated.iter().map(String::as_str)
    }

    /// Elements whose connection differs from the initial network.
    pub fn switched_elements(&self) -> impl Iterator<Item = (&str, bool)> {
        self.connection.iter().map(|(k, &v)| (k.as_str(), v))
    }
}
