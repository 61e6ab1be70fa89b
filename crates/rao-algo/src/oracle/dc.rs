//! Linear (DC) flow and PST sensitivity engine.
//!
//! Flow on a branch is `base_mva · b · (θ_from − θ_to + α)`. A phase shift
//! `α` enters the nodal balance as `−bα` at the from bus and `+bα` at the to
//! bus, so the sensitivity of every flow to a PST angle comes from one extra
//! right-hand side per control on the same reduced B'.

use super::susceptance::SparseSusceptance;
use super::{FlowResult, OracleError, SensitivityMatrix, SensitivityOracle};
use rao_core::crac::Contingency;
use rao_core::{count_islands, LinearSystemBackend, NetworkState, SolverKind};
use std::borrow::Cow;
use std::f64::consts::PI;
use std::sync::Arc;
use tracing::trace;

pub const DC_PROVIDER: &str = "dc-sensitivity";

pub struct DcSensitivityOracle {
    backend: Arc<dyn LinearSystemBackend>,
    max_concurrency: usize,
}

impl DcSensitivityOracle {
    pub fn new(kind: SolverKind) -> Self {
        Self::with_backend(kind.build_solver())
    }

    pub fn with_backend(backend: Arc<dyn LinearSystemBackend>) -> Self {
        Self {
            backend,
            max_concurrency: usize::MAX,
        }
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    fn post_contingency<'s>(
        state: &'s NetworkState,
        contingency: Option<&Contingency>,
    ) -> Result<Cow<'s, NetworkState>, OracleError> {
        match contingency {
            None => Ok(Cow::Borrowed(state)),
            Some(co) => {
                for element in &co.elements {
                    if state.network().branch_by_name(&element.id).is_none() {
                        return Err(OracleError::UnknownElement(element.id.clone()));
                    }
                }
                state
                    .with_contingency(co)
                    .map(Cow::Owned)
                    .map_err(|e| OracleError::UnknownElement(e.to_string()))
            }
        }
    }

    /// Factorise B' once and solve for each right-hand side. Returns full
    /// angle vectors with the slack angle fixed at zero.
    fn solve_angles(
        &self,
        sus: &SparseSusceptance,
        rhs: &[Vec<f64>],
    ) -> Result<Vec<Vec<f64>>, OracleError> {
        if sus.n_bus() == 1 {
            return Ok(rhs.iter().map(|_| vec![0.0]).collect());
        }
        let matrix = sus.reduced_dense();
        let reduced: Vec<Vec<f64>> = rhs.iter().map(|r| sus.reduce(r)).collect();
        let solutions = self
            .backend
            .solve_many(&matrix, &reduced)
            .map_err(|e| OracleError::NumericalDivergence(format!("{}: {}", self.backend.name(), e)))?;
        Ok(solutions.iter().map(|theta| sus.expand(theta)).collect())
    }

    fn prepare<'s>(
        &self,
        state: &'s NetworkState,
        contingency: Option<&Contingency>,
    ) -> Result<(Cow<'s, NetworkState>, SparseSusceptance), OracleError> {
        let post = Self::post_contingency(state, contingency)?;
        let islands = count_islands(post.network(), |b| post.is_connected(b));
        if islands > 1 {
            return Err(OracleError::NumericalDivergence(format!(
                "network split into {} islands",
                islands
            )));
        }
        let sus = SparseSusceptance::from_state(&post)?;
        Ok((post, sus))
    }
}

impl SensitivityOracle for DcSensitivityOracle {
    fn id(&self) -> &str {
        DC_PROVIDER
    }

    fn evaluate(
        &self,
        state: &NetworkState,
        contingency: Option<&Contingency>,
    ) -> Result<FlowResult, OracleError> {
        let (post, sus) = self.prepare(state, contingency)?;
        let network = post.network();
        let base = network.base_mva;

        let mut injection: Vec<f64> = sus
            .bus_order()
            .iter()
            .map(|bus| network.net_injection(*bus).value() / base)
            .collect();
        for (_, terms) in sus.branches() {
            if terms.phase_shift != 0.0 {
                let shift = terms.susceptance * terms.phase_shift;
                injection[terms.from_idx] -= shift;
                injection[terms.to_idx] += shift;
            }
        }

        let theta = self
            .solve_angles(&sus, &[injection])?
            .pop()
            .unwrap_or_default();

        let mut flows = FlowResult::new();
        for branch in network.branches() {
            let flow = sus
                .branch(&branch.name)
                .map(|terms| base * terms.flow_pu(&theta))
                .unwrap_or(0.0);
            if !flow.is_finite() {
                return Err(OracleError::NumericalDivergence(format!(
                    "non-finite flow on '{}'",
                    branch.name
                )));
            }
            flows.insert(branch.name.clone(), flow);
        }
        trace!(branches = flows.len(), "dc flows computed");
        Ok(flows)
    }

    fn sensitivities(
        &self,
        state: &NetworkState,
        contingency: Option<&Contingency>,
        controls: &[String],
    ) -> Result<SensitivityMatrix, OracleError> {
        let (post, sus) = self.prepare(state, contingency)?;
        let network = post.network();
        let base = network.base_mva;

        for control in controls {
            if network.branch_by_name(control).is_none() {
                return Err(OracleError::UnknownElement(control.clone()));
            }
        }

        // Unit angle on each connected control; open controls keep a zero column.
        let active: Vec<(&String, _)> = controls
            .iter()
            .filter_map(|c| sus.branch(c).map(|terms| (c, *terms)))
            .collect();
        let rhs: Vec<Vec<f64>> = active
            .iter()
            .map(|(_, terms)| {
                let mut e = vec![0.0; sus.n_bus()];
                e[terms.from_idx] -= terms.susceptance;
                e[terms.to_idx] += terms.susceptance;
                e
            })
            .collect();
        let thetas = if rhs.is_empty() {
            Vec::new()
        } else {
            self.solve_angles(&sus, &rhs)?
        };

        let elements: Vec<String> = network.branches().map(|b| b.name.clone()).collect();
        let mut matrix = SensitivityMatrix::new(elements, controls.to_vec());
        let per_degree = PI / 180.0;
        for ((control, control_terms), theta) in active.iter().zip(&thetas) {
            for (element, terms) in sus.branches() {
                let mut d = terms.susceptance * (theta[terms.from_idx] - theta[terms.to_idx]);
                if element == control.as_str() {
                    d += control_terms.susceptance;
                }
                let value = base * d * per_degree;
                if !value.is_finite() {
                    return Err(OracleError::NumericalDivergence(format!(
                        "non-finite sensitivity of '{}' to '{}'",
                        element, control
                    )));
                }
                matrix.set(element, control, value);
            }
        }
        Ok(matrix)
    }

    fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }
}
