//! Flow and sensitivity computation behind a swappable interface.
//!
//! The optimizer only talks to [`SensitivityOracle`]; the built-in
//! implementation is the DC engine in [`dc`]. Oracle calls dominate the run
//! time, so the search tree counts them against its budget.

pub mod dc;
pub mod susceptance;

pub use dc::{DcSensitivityOracle, DC_PROVIDER};
pub use susceptance::{BranchTerms, SparseSusceptance, SusceptanceError};

use crate::parameters::{LoadFlowMode, LoadFlowParameters};
use rao_core::crac::Contingency;
use rao_core::{NetworkState, RaoError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("flow computation diverged: {0}")]
    NumericalDivergence(String),

    #[error("unknown network element '{0}'")]
    UnknownElement(String),

    #[error("unsupported load-flow configuration: {0}")]
    UnsupportedMode(String),

    #[error(transparent)]
    Susceptance(#[from] SusceptanceError),
}

impl OracleError {
    /// The network state could not be solved. Candidates failing this way
    /// are discarded; a failing root fails its perimeter.
    pub fn is_divergence(&self) -> bool {
        matches!(self, OracleError::NumericalDivergence(_))
    }
}

impl From<OracleError> for RaoError {
    fn from(err: OracleError) -> Self {
        match err {
            OracleError::NumericalDivergence(msg) => RaoError::NumericalDivergence(msg),
            OracleError::UnsupportedMode(msg) => RaoError::Config(msg),
            other => RaoError::Network(other.to_string()),
        }
    }
}

/// Side-ONE active flow per branch name, in MW. Open branches carry zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowResult {
    flows: BTreeMap<String, f64>,
}

impl FlowResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, element_id: impl Into<String>, flow_mw: f64) {
        self.flows.insert(element_id.into(), flow_mw);
    }

    pub fn flow(&self, element_id: &str) -> Option<f64> {
        self.flows.get(element_id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.flows.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }
}

impl FromIterator<(String, f64)> for FlowResult {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            flows: iter.into_iter().collect(),
        }
    }
}

/// ∂flow/∂angle for every branch against a set of PST controls, MW/degree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensitivityMatrix {
    elements: BTreeMap<String, usize>,
    controls: Vec<String>,
    /// Row-major: `values[row * controls.len() + col]`
    values: Vec<f64>,
}

impl SensitivityMatrix {
    pub fn new(elements: Vec<String>, controls: Vec<String>) -> Self {
        let values = vec![0.0; elements.len() * controls.len()];
        Self {
            elements: elements
                .into_iter()
                .enumerate()
                .map(|(row, id)| (id, row))
                .collect(),
            controls,
            values,
        }
    }

    pub fn controls(&self) -> &[String] {
        &self.controls
    }

    fn column(&self, control: &str) -> Option<usize> {
        self.controls.iter().position(|c| c == control)
    }

    pub fn set(&mut self, element_id: &str, control: &str, value: f64) {
        if let (Some(&row), Some(col)) = (self.elements.get(element_id), self.column(control)) {
            self.values[row * self.controls.len() + col] = value;
        }
    }

    pub fn get(&self, element_id: &str, control: &str) -> Option<f64> {
        let row = *self.elements.get(element_id)?;
        let col = self.column(control)?;
        self.values.get(row * self.controls.len() + col).copied()
    }
}

/// Flow and sensitivity engine.
///
/// Implementations must be pure with respect to their inputs: the same
/// state and contingency always yield the same flows.
pub trait SensitivityOracle: Send + Sync {
    fn id(&self) -> &str;

    /// Flows in `state`, after disconnecting the contingency elements.
    fn evaluate(
        &self,
        state: &NetworkState,
        contingency: Option<&Contingency>,
    ) -> Result<FlowResult, OracleError>;

    /// Sensitivity of every branch flow to the angle of each control PST.
    fn sensitivities(
        &self,
        state: &NetworkState,
        contingency: Option<&Contingency>,
        controls: &[String],
    ) -> Result<SensitivityMatrix, OracleError>;

    /// Maximum number of concurrent calls this oracle accepts.
    fn max_concurrency(&self) -> usize {
        1
    }
}

/// Build the oracle configured in `load_flow`.
pub fn build_oracle(params: &LoadFlowParameters) -> Result<Arc<dyn SensitivityOracle>, OracleError> {
    if params.mode == LoadFlowMode::Ac {
        return Err(OracleError::UnsupportedMode(
            "AC load flow is not available; use mode = \"dc\"".to_string(),
        ));
    }
    match params.provider.as_str() {
        DC_PROVIDER => Ok(Arc::new(DcSensitivityOracle::new(params.linear_solver))),
        other => Err(OracleError::UnsupportedMode(format!(
            "unknown sensitivity provider '{}'; available: {}",
            other, DC_PROVIDER
        ))),
    }
}
