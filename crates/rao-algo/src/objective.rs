//! Objective evaluation: margins, functional cost and the total order the
//! search tree ranks nodes by.
//!
//! The functional is "higher is better" for every objective type:
//! - SECURE_FLOW / MAX_MIN_MARGIN: minimum margin over optimized CNECs
//! - MIN_COST: `−(activation cost + penalty · max(0, −min margin))`
//!
//! A perimeter without optimized CNECs has a minimum margin of `+∞`; a
//! state the oracle could not solve scores `−∞`.

use crate::oracle::FlowResult;
use crate::parameters::{ObjectiveFunctionParameters, ObjectiveType, SecondaryCriterion};
use rao_core::crac::{FlowCnec, Unit};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveValue {
    pub functional: f64,
    pub min_margin: f64,
    /// Sum of finite margins over optimized CNECs
    pub sum_margins: f64,
    pub action_count: usize,
    pub activation_cost: f64,
}

impl ObjectiveValue {
    pub fn is_secure(&self) -> bool {
        self.min_margin >= 0.0
    }
}

/// Margin of one CNEC against a flow result.
#[derive(Debug, Clone, PartialEq)]
pub struct CnecMargin<'a> {
    pub cnec: &'a FlowCnec,
    /// Side-ONE flow in the objective unit
    pub flow: f64,
    pub margin: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectiveFunction {
    objective_type: ObjectiveType,
    unit: Unit,
    secondary: SecondaryCriterion,
    overload_penalty: f64,
}

impl ObjectiveFunction {
    pub fn new(params: &ObjectiveFunctionParameters) -> Self {
        Self {
            objective_type: params.objective_type,
            unit: params.unit,
            secondary: params.secondary_criterion,
            overload_penalty: params.overload_penalty,
        }
    }

    pub fn objective_type(&self) -> ObjectiveType {
        self.objective_type
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    /// `min(max − flow, flow − min)` in the objective unit; a flow missing
    /// from the result scores `−∞`.
    pub fn margin(&self, cnec: &FlowCnec, flow_mw: Option<f64>) -> f64 {
        match flow_mw {
            Some(flow) => {
                let margin = cnec.margin(flow, self.unit);
                if margin.is_nan() {
                    f64::NEG_INFINITY
                } else {
                    margin
                }
            }
            None => f64::NEG_INFINITY,
        }
    }

    /// Per-CNEC margins, in the order given.
    pub fn cnec_margins<'a>(&self, cnecs: &[&'a FlowCnec], flows: &FlowResult) -> Vec<CnecMargin<'a>> {
        cnecs
            .iter()
            .map(|cnec| {
                let flow_mw = flows.flow(&cnec.network_element_id);
                CnecMargin {
                    cnec,
                    flow: flow_mw
                        .map(|f| cnec.flow_in(f, self.unit))
                        .unwrap_or(f64::NAN),
                    margin: self.margin(cnec, flow_mw),
                }
            })
            .collect()
    }

    /// Minimum margin over the optimized CNECs.
    pub fn score(&self, cnecs: &[&FlowCnec], flows: &FlowResult) -> f64 {
        cnecs
            .iter()
            .filter(|c| c.optimized)
            .map(|c| self.margin(c, flows.flow(&c.network_element_id)))
            .fold(f64::INFINITY, f64::min)
    }

    pub fn evaluate(
        &self,
        cnecs: &[&FlowCnec],
        flows: &FlowResult,
        action_count: usize,
        activation_cost: f64,
    ) -> ObjectiveValue {
        self.evaluate_with(
            cnecs,
            |cnec| flows.flow(&cnec.network_element_id),
            action_count,
            activation_cost,
        )
    }

    /// Evaluate with flows supplied by `flow_of`, e.g. a linear estimate.
    pub fn evaluate_with<F>(
        &self,
        cnecs: &[&FlowCnec],
        flow_of: F,
        action_count: usize,
        activation_cost: f64,
    ) -> ObjectiveValue
    where
        F: Fn(&FlowCnec) -> Option<f64>,
    {
        let mut min_margin = f64::INFINITY;
        let mut sum_margins = 0.0;
        for cnec in cnecs.iter().filter(|c| c.optimized) {
            let margin = self.margin(cnec, flow_of(cnec));
            min_margin = min_margin.min(margin);
            if margin.is_finite() {
                sum_margins += margin;
            }
        }
        ObjectiveValue {
            functional: self.functional(min_margin, activation_cost),
            min_margin,
            sum_margins,
            action_count,
            activation_cost,
        }
    }

    /// Value of a state the oracle failed on.
    pub fn diverged(&self, action_count: usize, activation_cost: f64) -> ObjectiveValue {
        ObjectiveValue {
            functional: f64::NEG_INFINITY,
            min_margin: f64::NEG_INFINITY,
            sum_margins: 0.0,
            action_count,
            activation_cost,
        }
    }

    fn functional(&self, min_margin: f64, activation_cost: f64) -> f64 {
        match self.objective_type {
            ObjectiveType::SecureFlow | ObjectiveType::MaxMinMargin => min_margin,
            ObjectiveType::MinCost => {
                let overload = if min_margin < 0.0 { -min_margin } else { 0.0 };
                -(activation_cost + self.overload_penalty * overload)
            }
        }
    }

    /// Total order on values, `Greater` meaning `a` is better: functional,
    /// then the secondary criterion, then fewer actions, then lower cost.
    pub fn compare(&self, a: &ObjectiveValue, b: &ObjectiveValue) -> Ordering {
        let secondary = match self.secondary {
            SecondaryCriterion::SumOfMargins => a.sum_margins.total_cmp(&b.sum_margins),
            SecondaryCriterion::None => Ordering::Equal,
        };
        a.functional
            .total_cmp(&b.functional)
            .then(secondary)
            .then_with(|| b.action_count.cmp(&a.action_count))
            .then_with(|| b.activation_cost.total_cmp(&a.activation_cost))
    }

    /// `child` beats `parent` by more than the configured minimum gain.
    pub fn improves(
        &self,
        child: &ObjectiveValue,
        parent: &ObjectiveValue,
        min_absolute_gain: f64,
        min_relative_gain: f64,
    ) -> bool {
        if !child.functional.is_finite() {
            return child.functional == f64::INFINITY && parent.functional < f64::INFINITY;
        }
        if parent.functional == f64::NEG_INFINITY {
            return true;
        }
        let gain = child.functional - parent.functional;
        gain > min_absolute_gain.max(min_relative_gain * parent.functional.abs())
    }

    /// The search can stop: nothing left to gain from this value.
    pub fn is_satisfied(&self, value: &ObjectiveValue) -> bool {
        if value.functional == f64::INFINITY {
            return true;
        }
        match self.objective_type {
            ObjectiveType::SecureFlow | ObjectiveType::MinCost => value.is_secure(),
            ObjectiveType::MaxMinMargin => false,
        }
    }
}
