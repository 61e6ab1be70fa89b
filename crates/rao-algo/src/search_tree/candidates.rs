//! Child generation for one leaf: topological actions and PST tap moves,
//! with linear flow estimates for the latter.

use super::node::{action_key, ActionChoice, ActionSet, SearchNode};
use crate::objective::{ObjectiveFunction, ObjectiveValue};
use crate::oracle::SensitivityMatrix;
use crate::parameters::{PstModel, RaoParameters};
use rao_core::crac::{FlowCnec, NetworkAction, PstRangeAction, RemedialAction};
use rao_core::{NetworkState, RaoResult};
use std::cmp::Ordering;
use std::collections::BTreeSet;

const TERNARY_ITERATIONS: usize = 100;

#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    /// Index of the parent among the current leaves
    pub parent: usize,
    pub action: &'a RemedialAction,
    pub choice: ActionChoice,
    /// Parent's actions plus this one
    pub actions: ActionSet,
    pub key: String,
    pub activation_cost: f64,
    /// Linear estimate of the child; `None` for topological actions
    pub estimate: Option<ObjectiveValue>,
}

impl Candidate<'_> {
    pub fn apply(&self, state: &mut NetworkState) -> RaoResult<()> {
        match (self.action, self.choice) {
            (RemedialAction::Pst(pst), ActionChoice::Tap(tap)) => pst.apply(state, tap),
            (RemedialAction::Network(na), _) => na.apply(state),
            (RemedialAction::Pst(pst), ActionChoice::Activated) => {
                let tap = pst.current_tap(state);
                pst.apply(state, tap)
            }
        }
    }

    /// Confirmation order: topological actions first, then by estimate.
    pub fn priority(&self, other: &Self, objective: &ObjectiveFunction) -> Ordering {
        match (&self.estimate, &other.estimate) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a), Some(b)) => objective.compare(b, a).then_with(|| self.key.cmp(&other.key)),
        }
    }
}

pub struct CandidateGenerator<'a> {
    objective: &'a ObjectiveFunction,
    cnecs: &'a [&'a FlowCnec],
    tap_steps: Vec<i32>,
    pst_model: PstModel,
    include_linear_optimum: bool,
}

impl<'a> CandidateGenerator<'a> {
    pub fn new(
        objective: &'a ObjectiveFunction,
        cnecs: &'a [&'a FlowCnec],
        params: &RaoParameters,
    ) -> Self {
        Self {
            objective,
            cnecs,
            tap_steps: params.tap_steps(),
            pst_model: params.range_actions.pst_model,
            include_linear_optimum: params.range_actions.include_linear_optimum,
        }
    }

    fn child(
        &self,
        parent_idx: usize,
        parent: &SearchNode,
        action: &'a RemedialAction,
        choice: ActionChoice,
        cost: f64,
        estimate: Option<ObjectiveValue>,
    ) -> Candidate<'a> {
        let mut actions = parent.actions.clone();
        actions.insert(action.id().to_string(), choice);
        Candidate {
            parent: parent_idx,
            action,
            choice,
            key: action_key(&actions),
            actions,
            activation_cost: parent.value.activation_cost + cost,
            estimate,
        }
    }

    /// Activating a network action that would change the state.
    pub fn network_candidate(
        &self,
        parent_idx: usize,
        parent: &SearchNode,
        state: &NetworkState,
        action: &'a RemedialAction,
        network_action: &NetworkAction,
    ) -> Option<Candidate<'a>> {
        if parent.has_action(&network_action.id) || network_action.is_effective(state) {
            return None;
        }
        Some(self.child(
            parent_idx,
            parent,
            action,
            ActionChoice::Activated,
            network_action.activation_cost,
            None,
        ))
    }

    /// Tap moves around the current tap, plus the tap the linear estimate
    /// favours, each with its estimated value.
    pub fn pst_candidates(
        &self,
        parent_idx: usize,
        parent: &SearchNode,
        state: &NetworkState,
        action: &'a RemedialAction,
        pst: &PstRangeAction,
        sensitivities: &SensitivityMatrix,
    ) -> Vec<Candidate<'a>> {
        if parent.has_action(&pst.id) {
            return Vec::new();
        }
        let current = pst.current_tap(state);
        let legal = pst.legal_taps(current);
        if legal.is_empty() {
            return Vec::new();
        }
        let estimator = TapEstimator {
            generator: self,
            parent,
            pst,
            sensitivities,
            current_tap: current,
            current_angle: state
                .network()
                .branch_by_name(&pst.network_element_id)
                .map(|branch| state.phase_shift(branch).to_degrees().value())
                .unwrap_or(0.0),
        };

        let mut taps = BTreeSet::new();
        for step in &self.tap_steps {
            for tap in [current.saturating_sub(*step), current.saturating_add(*step)] {
                if pst.is_legal(tap, current) {
                    taps.insert(tap);
                }
            }
        }
        if self.include_linear_optimum {
            let optimum = match self.pst_model {
                PstModel::ApproximatedIntegers => estimator.best_integer_tap(&legal),
                PstModel::Continuous => estimator.rounded_continuous_optimum(&legal),
            };
            if let Some(tap) = optimum {
                taps.insert(tap);
            }
        }
        taps.remove(&current);

        taps.into_iter()
            .filter_map(|tap| {
                let estimate = estimator.estimate(tap)?;
                Some(self.child(
                    parent_idx,
                    parent,
                    action,
                    ActionChoice::Tap(tap),
                    pst.cost(current, tap),
                    Some(estimate),
                ))
            })
            .collect()
    }
}

struct TapEstimator<'g, 'a> {
    generator: &'g CandidateGenerator<'a>,
    parent: &'g SearchNode,
    pst: &'g PstRangeAction,
    sensitivities: &'g SensitivityMatrix,
    current_tap: i32,
    /// Angle the parent's flows were computed with, in degrees
    current_angle: f64,
}

impl TapEstimator<'_, '_> {
    fn value_at_angle(&self, angle: f64, cost: f64) -> ObjectiveValue {
        let delta = angle - self.current_angle;
        let control = &self.pst.network_element_id;
        self.generator.objective.evaluate_with(
            self.generator.cnecs,
            |cnec| {
                let flow = self.parent.flows.flow(&cnec.network_element_id)?;
                let sensitivity = self
                    .sensitivities
                    .get(&cnec.network_element_id, control)
                    .unwrap_or(0.0);
                Some(flow + sensitivity * delta)
            },
            self.parent.actions.len() + 1,
            self.parent.value.activation_cost + cost,
        )
    }

    fn estimate(&self, tap: i32) -> Option<ObjectiveValue> {
        let angle = self.pst.angle(tap)?.value();
        Some(self.value_at_angle(angle, self.pst.cost(self.current_tap, tap)))
    }

    /// Best legal tap by estimate; ties go to the tap closest to the current one.
    fn best_integer_tap(&self, legal: &[i32]) -> Option<i32> {
        let objective = self.generator.objective;
        let current = self.current_tap;
        legal
            .iter()
            .filter_map(|&tap| self.estimate(tap).map(|v| (tap, v)))
            .max_by(|(ta, a), (tb, b)| {
                objective
                    .compare(a, b)
                    .then_with(|| (tb - current).abs().cmp(&(ta - current).abs()))
                    .then_with(|| tb.cmp(ta))
            })
            .map(|(tap, _)| tap)
    }

    /// Maximise the estimated minimum margin over the continuous angle
    /// range, then snap to the legal tap with the nearest angle.
    fn rounded_continuous_optimum(&self, legal: &[i32]) -> Option<i32> {
        let current = self.current_tap;
        let angles: Vec<(i32, f64)> = legal
            .iter()
            .filter_map(|&tap| self.pst.angle(tap).map(|a| (tap, a.value())))
            .collect();
        let (mut low, mut high) = angles.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY),
            |(lo, hi), (_, a)| (lo.min(*a), hi.max(*a)),
        );
        if !(low.is_finite() && high.is_finite()) {
            return None;
        }

        // Minimum margin is concave in the angle.
        let margin = |angle: f64| self.value_at_angle(angle, 0.0).min_margin;
        for _ in 0..TERNARY_ITERATIONS {
            let m1 = low + (high - low) / 3.0;
            let m2 = high - (high - low) / 3.0;
            if margin(m1) < margin(m2) {
                low = m1;
            } else {
                high = m2;
            }
        }
        let optimum = 0.5 * (low + high);

        angles
            .into_iter()
            .min_by(|(ta, a), (tb, b)| {
                (a - optimum)
                    .abs()
                    .total_cmp(&(b - optimum).abs())
                    .then_with(|| (ta - current).abs().cmp(&(tb - current).abs()))
                    .then_with(|| ta.cmp(tb))
            })
            .map(|(tap, _)| tap)
    }
}
