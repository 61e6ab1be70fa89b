//! Sparse susceptance matrix (B') of one network state.
//!
//! ```text
//! P = B' × θ
//!
//!   B'[i,j] = -b_ij        for i ≠ j
//!   B'[i,i] = Σ_k b_ik
//! ```
//!
//! Only branches connected in the state contribute. Buses are ordered by id
//! and the first one is the angle reference (slack).

use rao_core::{BusId, NetworkState};
use sprs::{CsMat, TriMat};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SusceptanceError {
    #[error("No buses found in network")]
    NoBuses,

    #[error("Branch {0} has zero or near-zero reactance")]
    ZeroReactance(String),

    #[error("Unknown bus ID: {0}")]
    UnknownBus(usize),
}

/// DC terms of one in-service branch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchTerms {
    pub from_idx: usize,
    pub to_idx: usize,
    /// Series susceptance, 1/x (p.u.)
    pub susceptance: f64,
    /// Phase shift in radians (zero for plain lines)
    pub phase_shift: f64,
}

impl BranchTerms {
    /// `b·(θ_from − θ_to + α)` in p.u.
    pub fn flow_pu(&self, theta: &[f64]) -> f64 {
        self.susceptance * (theta[self.from_idx] - theta[self.to_idx] + self.phase_shift)
    }
}

#[derive(Debug, Clone)]
pub struct SparseSusceptance {
    matrix: CsMat<f64>,
    bus_order: Vec<BusId>,
    bus_to_idx: BTreeMap<BusId, usize>,
    /// Keyed by branch name
    branch_data: BTreeMap<String, BranchTerms>,
    slack_idx: usize,
}

impl SparseSusceptance {
    pub fn from_state(state: &NetworkState) -> Result<Self, SusceptanceError> {
        let network = state.network();
        let bus_order: Vec<BusId> = network.buses().iter().map(|b| b.id).collect();
        let n = bus_order.len();
        if n == 0 {
            return Err(SusceptanceError::NoBuses);
        }
        let bus_to_idx: BTreeMap<BusId, usize> = bus_order
            .iter()
            .enumerate()
            .map(|(idx, id)| (*id, idx))
            .collect();

        let mut triplets = TriMat::new((n, n));
        let mut branch_data = BTreeMap::new();

        for branch in network.branches() {
            if !state.is_connected(branch) {
                continue;
            }
            if branch.reactance.abs() < 1e-12 {
                return Err(SusceptanceError::ZeroReactance(branch.name.clone()));
            }

            let b = 1.0 / branch.reactance;
            let i = *bus_to_idx
                .get(&branch.from_bus)
                .ok_or(SusceptanceError::UnknownBus(branch.from_bus.value()))?;
            let j = *bus_to_idx
                .get(&branch.to_bus)
                .ok_or(SusceptanceError::UnknownBus(branch.to_bus.value()))?;

            triplets.add_triplet(i, j, -b);
            triplets.add_triplet(j, i, -b);
            triplets.add_triplet(i, i, b);
            triplets.add_triplet(j, j, b);

            branch_data.insert(
                branch.name.clone(),
                BranchTerms {
                    from_idx: i,
                    to_idx: j,
                    susceptance: b,
                    phase_shift: state.phase_shift(branch).value(),
                },
            );
        }

        Ok(Self {
            matrix: triplets.to_csr(),
            bus_order,
            bus_to_idx,
            branch_data,
            slack_idx: 0,
        })
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.matrix.get(i, j).copied().unwrap_or(0.0)
    }

    pub fn n_bus(&self) -> usize {
        self.bus_order.len()
    }

    pub fn nnz(&self) -> usize {
        self.matrix.nnz()
    }

    pub fn bus_order(&self) -> &[BusId] {
        &self.bus_order
    }

    pub fn bus_index(&self, bus_id: BusId) -> Option<usize> {
        self.bus_to_idx.get(&bus_id).copied()
    }

    pub fn slack_idx(&self) -> usize {
        self.slack_idx
    }

    /// Terms of an in-service branch; `None` when open or unknown.
    pub fn branch(&self, name: &str) -> Option<&BranchTerms> {
        self.branch_data.get(name)
    }

    pub fn branches(&self) -> impl Iterator<Item = (&str, &BranchTerms)> {
        self.branch_data.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Dense B' with the slack row and column removed.
    pub fn reduced_dense(&self) -> Vec<Vec<f64>> {
        let m = self.n_bus() - 1;
        let mut dense = vec![vec![0.0; m]; m];
        for (row, vec) in self.matrix.outer_iterator().enumerate() {
            let Some(r) = self.reduced_index(row) else {
                continue;
            };
            for (col, &value) in vec.iter() {
                if let Some(c) = self.reduced_index(col) {
                    dense[r][c] = value;
                }
            }
        }
        dense
    }

    fn reduced_index(&self, idx: usize) -> Option<usize> {
        match idx.cmp(&self.slack_idx) {
            std::cmp::Ordering::Less => Some(idx),
            std::cmp::Ordering::Equal => None,
            std::cmp::Ordering::Greater => Some(idx - 1),
        }
    }

    /// Drop the slack entry of a full bus vector.
    pub fn reduce(&self, full: &[f64]) -> Vec<f64> {
        full.iter()
            .enumerate()
            .filter(|(idx, _)| *idx != self.slack_idx)
            .map(|(_, v)| *v)
            .collect()
    }

    /// Re-insert a zero slack angle into a reduced vector.
    pub fn expand(&self, reduced: &[f64]) -> Vec<f64> {
        let mut full = Vec::with_capacity(reduced.len() + 1);
        full.extend_from_slice(&reduced[..self.slack_idx]);
        full.push(0.0);
        full.extend_from_slice(&reduced[self.slack_idx..]);
        full
    }
}
