//! Optimization results, per perimeter and for the whole run.

use crate::objective::ObjectiveValue;
use rao_core::crac::{InstantKind, Unit};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComputationStatus {
    #[default]
    Default,
    /// At least one contingency chain could not be computed
    PartialFailure,
    /// The preventive perimeter could not be computed
    Failure,
}

impl ComputationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComputationStatus::Default => "DEFAULT",
            ComputationStatus::PartialFailure => "PARTIAL_FAILURE",
            ComputationStatus::Failure => "FAILURE",
        }
    }
}

impl fmt::Display for ComputationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CnecResult {
    pub cnec_id: String,
    pub network_element_id: String,
    /// Side-ONE flow in `unit`
    pub flow: f64,
    pub margin: f64,
    pub unit: Unit,
    pub optimized: bool,
}

impl CnecResult {
    pub fn is_secure(&self) -> bool {
        self.margin >= 0.0
    }
}

/// Counters of one search-tree run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchStats {
    /// Deepest depth whose candidates were evaluated
    pub depth: usize,
    pub oracle_calls: usize,
    pub candidates_evaluated: usize,
    /// Candidates skipped because their linear estimate did not improve
    pub candidates_pruned: usize,
    pub candidates_diverged: usize,
    /// Stopped on the call budget or the deadline
    pub budget_exhausted: bool,
}

/// Outcome of optimising one (instant, contingency) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerimeterResult {
    pub instant_id: String,
    pub instant_kind: InstantKind,
    pub contingency_id: Option<String>,
    /// FORCED network actions applied before the search
    pub forced_network_actions: Vec<String>,
    /// Network actions chosen by the search, sorted by id
    pub activated_network_actions: Vec<String>,
    /// Range action id to the tap chosen in this perimeter
    pub pst_taps: BTreeMap<String, i32>,
    pub initial_objective: Option<ObjectiveValue>,
    pub final_objective: Option<ObjectiveValue>,
    pub cnec_results: Vec<CnecResult>,
    pub stats: SearchStats,
    pub failure: Option<String>,
}

impl PerimeterResult {
    pub fn failed(&self) -> bool {
        self.failure.is_some()
    }

    /// Every reported CNEC has a non-negative margin.
    pub fn is_secure(&self) -> bool {
        !self.failed() && self.cnec_results.iter().all(CnecResult::is_secure)
    }

    pub fn min_margin(&self) -> Option<f64> {
        self.final_objective.as_ref().map(|o| o.min_margin)
    }

    pub fn action_count(&self) -> usize {
        self.forced_network_actions.len() + self.activated_network_actions.len() + self.pst_taps.len()
    }

    /// Human-readable perimeter label, e.g. `curative/co-a`.
    pub fn label(&self) -> String {
        match &self.contingency_id {
            Some(co) => format!("{}/{}", self.instant_id, co),
            None => self.instant_id.clone(),
        }
    }
}

/// The chain of post-contingency perimeters for one contingency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContingencyResult {
    pub contingency_id: String,
    pub perimeters: Vec<PerimeterResult>,
    pub failure: Option<String>,
}

impl ContingencyResult {
    pub fn failed(&self) -> bool {
        self.failure.is_some()
    }

    pub fn perimeter(&self, instant_id: &str) -> Option<&PerimeterResult> {
        self.perimeters.iter().find(|p| p.instant_id == instant_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub status: ComputationStatus,
    pub preventive: PerimeterResult,
    /// In CRAC declaration order
    pub contingencies: Vec<ContingencyResult>,
    pub oracle_calls: usize,
    pub elapsed_seconds: f64,
}

impl OptimizationResult {
    pub fn contingency(&self, id: &str) -> Option<&ContingencyResult> {
        self.contingencies.iter().find(|c| c.contingency_id == id)
    }

    pub fn perimeters(&self) -> impl Iterator<Item = &PerimeterResult> {
        std::iter::once(&self.preventive).chain(self.contingencies.iter().flat_map(|c| c.perimeters.iter()))
    }

    /// Every computed perimeter is secure and nothing failed.
    pub fn is_secure(&self) -> bool {
        self.status == ComputationStatus::Default && self.perimeters().all(PerimeterResult::is_secure)
    }

    pub fn budget_exhausted(&self) -> bool {
        self.perimeters().any(|p| p.stats.budget_exhausted)
    }

    pub fn summary(&self) -> OptimizationSummary {
        let mut summary = OptimizationSummary {
            status: self.status,
            secure: self.is_secure(),
            perimeters: 0,
            failed_contingencies: self.contingencies.iter().filter(|c| c.failed()).count(),
            activated_actions: 0,
            worst_margin: f64::INFINITY,
            oracle_calls: self.oracle_calls,
            budget_exhausted: self.budget_exhausted(),
        };
        for perimeter in self.perimeters() {
            summary.perimeters += 1;
            summary.activated_actions += perimeter.action_count();
            for cnec in &perimeter.cnec_results {
                summary.worst_margin = summary.worst_margin.min(cnec.margin);
            }
        }
        summary
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationSummary {
    pub status: ComputationStatus,
    pub secure: bool,
    pub perimeters: usize,
    pub failed_contingencies: usize,
    pub activated_actions: usize,
    pub worst_margin: f64,
    pub oracle_calls: usize,
    pub budget_exhausted: bool,
}

impl fmt::Display for OptimizationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}): {} perimeters, {} actions, worst margin {:.2}, {} oracle calls",
            self.status,
            if self.secure { "secure" } else { "unsecure" },
            self.perimeters,
            self.activated_actions,
            self.worst_margin,
            self.oracle_calls
        )?;
        if self.failed_contingencies > 0 {
            write!(f, ", {} failed contingencies", self.failed_contingencies)?;
        }
        if self.budget_exhausted {
            write!(f, ", budget exhausted")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perimeter(instant: &str, co: Option<&str>, margin: f64) -> PerimeterResult {
        PerimeterResult {
            instant_id: instant.to_string(),
            instant_kind: if co.is_some() {
                InstantKind::Curative
            } else {
                InstantKind::Preventive
            },
            contingency_id: co.map(str::to_string),
            forced_network_actions: Vec::new(),
            activated_network_actions: vec!["close-c".to_string()],
            pst_taps: BTreeMap::new(),
            initial_objective: None,
            final_objective: None,
            cnec_results: vec![CnecResult {
                cnec_id: format!("{}-cnec", instant),
                network_element_id: "L".to_string(),
                flow: 100.0,
                margin,
                unit: Unit::Megawatt,
                optimized: true,
            }],
            stats: SearchStats::default(),
            failure: None,
        }
    }

    #[test]
    fn summary_tracks_worst_margin_and_security() {
        let result = OptimizationResult {
            status: ComputationStatus::Default,
            preventive: perimeter("preventive", None, 12.0),
            contingencies: vec![ContingencyResult {
                contingency_id: "co-a".to_string(),
                perimeters: vec![perimeter("curative", Some("co-a"), -3.5)],
                failure: None,
            }],
            oracle_calls: 7,
            elapsed_seconds: 0.0,
        };
        let summary = result.summary();
        assert!(!summary.secure);
        assert_eq!(summary.perimeters, 2);
        assert_eq!(summary.activated_actions, 2);
        assert!((summary.worst_margin + 3.5).abs() < 1e-12);
        assert_eq!(
            summary.to_string(),
            "DEFAULT (unsecure): 2 perimeters, 2 actions, worst margin -3.50, 7 oracle calls"
        );
        assert_eq!(result.contingency("co-a").unwrap().perimeters[0].label(), "curative/co-a");
    }

    #[test]
    fn status_serializes_screaming() {
        let json = serde_json::to_string(&ComputationStatus::PartialFailure).unwrap();
        assert_eq!(json, "\"PARTIAL_FAILURE\"");
    }
}
