//! Optimizer parameters, loadable from TOML.
//!
//! Every section and field has a default, so a partial file (or an empty
//! one) is valid:
//!
//! ```toml
//! [objective_function]
//! type = "MAX_MIN_MARGIN"
//!
//! [search_tree]
//! max_depth = 3
//! leaves_in_parallel = 2
//!
//! [ra_usage_limits.curative]
//! max_ra = 1
//! ```

use rao_core::crac::Unit;
use rao_core::{RaoError, SolverKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RaoParametersError {
    #[error("failed to read parameters: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid parameters file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to serialize parameters: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid parameter value: {0}")]
    Invalid(String),
}

impl From<RaoParametersError> for RaoError {
    fn from(err: RaoParametersError) -> Self {
        match err {
            RaoParametersError::Io(e) => RaoError::Io(e),
            RaoParametersError::Toml(e) => RaoError::Parse(e.to_string()),
            RaoParametersError::Serialize(e) => RaoError::Other(e.to_string()),
            RaoParametersError::Invalid(msg) => RaoError::Config(msg),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectiveType {
    /// Maximise the minimum margin, stop as soon as every CNEC is secure
    #[default]
    SecureFlow,
    /// Maximise the minimum margin until no action improves it
    MaxMinMargin,
    /// Minimise activation cost plus a penalty per MW of overload
    MinCost,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecondaryCriterion {
    #[default]
    SumOfMargins,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectiveFunctionParameters {
    #[serde(rename = "type")]
    pub objective_type: ObjectiveType,
    pub unit: Unit,
    pub secondary_criterion: SecondaryCriterion,
    /// Cost per unit of negative margin (MIN_COST only)
    pub overload_penalty: f64,
}

impl Default for ObjectiveFunctionParameters {
    fn default() -> Self {
        Self {
            objective_type: ObjectiveType::SecureFlow,
            unit: Unit::Megawatt,
            secondary_criterion: SecondaryCriterion::SumOfMargins,
            overload_penalty: 1000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PstModel {
    /// Optimise the angle continuously, then round to the nearest legal tap
    #[default]
    Continuous,
    /// Search the legal taps directly
    ApproximatedIntegers,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeActionsParameters {
    pub pst_model: PstModel,
    /// Tap moves tried around the current tap, in both directions
    pub tap_deltas: Vec<i32>,
    /// Also try the tap the linear estimate finds best
    pub include_linear_optimum: bool,
}

impl Default for RangeActionsParameters {
    fn default() -> Self {
        Self {
            pst_model: PstModel::Continuous,
            tap_deltas: vec![1, 2, 4, 8, 16],
            include_linear_optimum: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchTreeParameters {
    pub max_depth: usize,
    /// Improving children kept per depth
    pub leaves_in_parallel: usize,
    /// Minimum functional gain for a child to count as improving
    pub min_absolute_gain: f64,
    /// Minimum gain relative to the parent's functional
    pub min_relative_gain: f64,
}

impl Default for SearchTreeParameters {
    fn default() -> Self {
        Self {
            max_depth: 4,
            leaves_in_parallel: 1,
            min_absolute_gain: 1e-3,
            min_relative_gain: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetParameters {
    /// Oracle calls allowed per perimeter (root, sensitivities and candidates)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_oracle_calls: Option<usize>,
    /// Soft wall-clock limit for the whole run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_limit_seconds: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadFlowMode {
    #[default]
    Dc,
    Ac,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadFlowParameters {
    pub mode: LoadFlowMode,
    pub provider: String,
    pub linear_solver: SolverKind,
}

impl Default for LoadFlowParameters {
    fn default() -> Self {
        Self {
            mode: LoadFlowMode::Dc,
            provider: crate::oracle::DC_PROVIDER.to_string(),
            linear_solver: SolverKind::Gauss,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultithreadingParameters {
    /// Contingency chains optimised concurrently
    pub contingency_workers: usize,
    /// Candidate evaluations in flight per search-tree depth
    pub candidate_workers: usize,
}

impl Default for MultithreadingParameters {
    fn default() -> Self {
        let cpus = num_cpus::get().max(1);
        Self {
            contingency_workers: cpus,
            candidate_workers: cpus,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaUsageLimits {
    /// Remedial actions the search may activate in one perimeter of this instant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_ra: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaoParameters {
    pub objective_function: ObjectiveFunctionParameters,
    pub range_actions: RangeActionsParameters,
    pub search_tree: SearchTreeParameters,
    pub budget: BudgetParameters,
    pub load_flow: LoadFlowParameters,
    pub multithreading: MultithreadingParameters,
    /// Keyed by instant id
    pub ra_usage_limits: BTreeMap<String, RaUsageLimits>,
}

impl RaoParameters {
    pub fn from_toml_str(content: &str) -> Result<Self, RaoParametersError> {
        let params: Self = toml::from_str(content)?;
        params.validate()?;
        Ok(params)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, RaoParametersError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String, RaoParametersError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject values the optimizer cannot work with.
    pub fn validate(&self) -> Result<(), RaoParametersError> {
        let mut problems = Vec::new();
        let search = &self.search_tree;
        if search.leaves_in_parallel == 0 {
            problems.push("search_tree.leaves_in_parallel must be at least 1".to_string());
        }
        for (name, value) in [
            ("search_tree.min_absolute_gain", search.min_absolute_gain),
            ("search_tree.min_relative_gain", search.min_relative_gain),
            (
                "objective_function.overload_penalty",
                self.objective_function.overload_penalty,
            ),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                problems.push(format!("{} must be a non-negative number, got {}", name, value));
            }
        }
        if self.multithreading.contingency_workers == 0 || self.multithreading.candidate_workers == 0
        {
            problems.push("multithreading workers must be at least 1".to_string());
        }
        if let Some(limit) = self.budget.time_limit_seconds {
            if !(limit.is_finite() && limit >= 0.0) {
                problems.push(format!("budget.time_limit_seconds must be non-negative, got {}", limit));
            }
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(RaoParametersError::Invalid(problems.join("; ")))
        }
    }

    /// Tap deltas as distinct positive steps, ascending.
    pub fn tap_steps(&self) -> Vec<i32> {
        let mut steps: Vec<i32> = self
            .range_actions
            .tap_deltas
            .iter()
            .map(|d| d.saturating_abs())
            .filter(|d| *d > 0)
            .collect();
        steps.sort_unstable();
        steps.dedup();
        steps
    }

    pub fn max_ra(&self, instant_id: &str) -> Option<usize> {
        self.ra_usage_limits.get(instant_id).and_then(|l| l.max_ra)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_gives_defaults() {
        let params = RaoParameters::from_toml_str("").unwrap();
        assert_eq!(params.objective_function.objective_type, ObjectiveType::SecureFlow);
        assert_eq!(params.range_actions.tap_deltas, vec![1, 2, 4, 8, 16]);
        assert_eq!(params.load_flow.provider, "dc-sensitivity");
        assert!(params.budget.max_oracle_calls.is_none());
    }

    #[test]
    fn partial_sections_override_fields() {
        let params = RaoParameters::from_toml_str(
            r#"
            [objective_function]
            type = "MIN_COST"
            unit = "AMPERE"

            [range_actions]
            pst_model = "APPROXIMATED_INTEGERS"
            tap_deltas = [-3, 1, 1, 0]

            [load_flow]
            linear_solver = "faer"

            [ra_usage_limits.curative]
            max_ra = 1
            "#,
        )
        .unwrap();
        assert_eq!(params.objective_function.objective_type, ObjectiveType::MinCost);
        assert_eq!(params.objective_function.unit, Unit::Ampere);
        assert_eq!(params.range_actions.pst_model, PstModel::ApproximatedIntegers);
        assert_eq!(params.tap_steps(), vec![1, 3]);
        assert_eq!(params.load_flow.linear_solver, SolverKind::Faer);
        assert_eq!(params.max_ra("curative"), Some(1));
        assert_eq!(params.max_ra("preventive"), None);
        assert_eq!(params.search_tree.max_depth, 4);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = RaoParameters::from_toml_str("[search_tree]\nleaves_in_parallel = 0").unwrap_err();
        assert!(matches!(err, RaoParametersError::Invalid(_)));
        let err = RaoParameters::from_toml_str("[objective_function]\ntype = \"FASTEST\"").unwrap_err();
        assert!(matches!(err, RaoParametersError::Toml(_)));
        assert!(matches!(RaoError::from(err), RaoError::Parse(_)));
    }

    #[test]
    fn toml_round_trip_through_file() {
        let mut params = RaoParameters::default();
        params.budget.max_oracle_calls = Some(50);
        params.ra_usage_limits.insert(
            "curative".to_string(),
            RaUsageLimits { max_ra: Some(2) },
        );

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(params.to_toml_string().unwrap().as_bytes())
            .unwrap();
        let loaded = RaoParameters::from_toml_file(file.path()).unwrap();
        assert_eq!(loaded, params);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = RaoParameters::from_toml_file("/nonexistent/rao.toml").unwrap_err();
        assert!(matches!(RaoError::from(err), RaoError::Io(_)));
    }
}
