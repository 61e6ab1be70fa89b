use super::usage_rule::UsageRule;
use crate::state::NetworkState;
use crate::{Degrees, RaoError, RaoResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RangeType {
    /// Bounds are tap positions
    Absolute,
    /// Bounds are offsets from the initial network tap
    RelativeToInitialNetwork,
    /// Bounds are offsets from the tap at the start of the instant
    RelativeToPreviousInstant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapRange {
    pub min_tap: i32,
    pub max_tap: i32,
    pub range_type: RangeType,
}

impl TapRange {
    pub fn absolute(min_tap: i32, max_tap: i32) -> Self {
        Self {
            min_tap,
            max_tap,
            range_type: RangeType::Absolute,
        }
    }

    pub fn relative_to_initial(min_tap: i32, max_tap: i32) -> Self {
        Self {
            min_tap,
            max_tap,
            range_type: RangeType::RelativeToInitialNetwork,
        }
    }

    pub fn relative_to_previous(min_tap: i32, max_tap: i32) -> Self {
        Self {
            min_tap,
            max_tap,
            range_type: RangeType::RelativeToPreviousInstant,
        }
    }

    /// Absolute tap bounds for this range.
    fn bounds(&self, initial_tap: i32, previous_tap: i32) -> (i32, i32) {
        let offset = match self.range_type {
            RangeType::Absolute => 0,
            RangeType::RelativeToInitialNetwork => initial_tap,
            RangeType::RelativeToPreviousInstant => previous_tap,
        };
        (
            self.min_tap.saturating_add(offset),
            self.max_tap.saturating_add(offset),
        )
    }
}

/// Tap-changing phase-shifting transformer control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PstRangeAction {
    pub id: String,
    pub name: Option<String>,
    /// PST branch name
    pub network_element_id: String,
    pub initial_tap: i32,
    /// Tap position to phase shift, in degrees
    pub tap_to_angle: BTreeMap<i32, f64>,
    pub ranges: Vec<TapRange>,
    pub usage_rules: Vec<UsageRule>,
    /// Cost paid once when the tap moves
    pub activation_cost: f64,
    /// Cost per tap moved
    pub variation_cost: f64,
}

impl PstRangeAction {
    pub fn new(id: impl Into<String>, network_element_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            network_element_id: network_element_id.into(),
            initial_tap: 0,
            tap_to_angle: BTreeMap::new(),
            ranges: Vec::new(),
            usage_rules: Vec::new(),
            activation_cost: 0.0,
            variation_cost: 0.0,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_initial_tap(mut self, tap: i32) -> Self {
        self.initial_tap = tap;
        self
    }

    pub fn with_tap_to_angle(mut self, table: BTreeMap<i32, f64>) -> Self {
        self.tap_to_angle = table;
        self
    }

    /// Linear tap table: `angle = tap × degrees_per_tap` for taps in `[low, high]`.
    pub fn with_uniform_taps(mut self, low: i32, high: i32, degrees_per_tap: f64) -> Self {
        self.tap_to_angle = (low..=high)
            .map(|tap| (tap, f64::from(tap) * degrees_per_tap))
            .collect();
        self
    }

    pub fn with_range(mut self, range: TapRange) -> Self {
        self.ranges.push(range);
        self
    }

    pub fn with_usage_rule(mut self, rule: UsageRule) -> Self {
        self.usage_rules.push(rule);
        self
    }

    pub fn with_costs(mut self, activation_cost: f64, variation_cost: f64) -> Self {
        self.activation_cost = activation_cost;
        self.variation_cost = variation_cost;
        self
    }

    pub fn angle(&self, tap: i32) -> Option<Degrees> {
        self.tap_to_angle.get(&tap).copied().map(Degrees)
    }

    /// Intersection of the tap table domain with every declared range, or
    /// `None` when empty. `previous_tap` anchors relative-to-previous ranges.
    pub fn tap_bounds(&self, previous_tap: i32) -> Option<(i32, i32)> {
        let (mut low, mut high) = match (
            self.tap_to_angle.keys().next(),
            self.tap_to_angle.keys().next_back(),
        ) {
            (Some(&low), Some(&high)) => (low, high),
            _ => return None,
        };
        for range in &self.ranges {
            let (min, max) = range.bounds(self.initial_tap, previous_tap);
            low = low.max(min);
            high = high.min(max);
        }
        (low <= high).then_some((low, high))
    }

    /// Every legal tap, ascending.
    pub fn legal_taps(&self, previous_tap: i32) -> Vec<i32> {
        match self.tap_bounds(previous_tap) {
            Some((low, high)) => self
                .tap_to_angle
                .range(low..=high)
                .map(|(&tap, _)| tap)
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn is_legal(&self, tap: i32, previous_tap: i32) -> bool {
        self.tap_to_angle.contains_key(&tap)
            && self
                .tap_bounds(previous_tap)
                .is_some_and(|(low, high)| (low..=high).contains(&tap))
    }

    /// Tap currently applied in `state` (initial tap when never touched).
    pub fn current_tap(&self, state: &NetworkState) -> i32 {
        state
            .pst_setting(&self.network_element_id)
            .map(|s| s.tap)
            .unwrap_or(self.initial_tap)
    }

    /// Cost of moving from `from_tap` to `to_tap`; zero when unchanged.
    pub fn cost(&self, from_tap: i32, to_tap: i32) -> f64 {
        if from_tap == to_tap {
            0.0
        } else {
            self.activation_cost + self.variation_cost * f64::from((to_tap - from_tap).abs())
        }
    }

    /// Set the PST to `tap` in `state`. Legality against the ranges is the
    /// caller's job; an unknown tap is an error.
    pub fn apply(&self, state: &mut NetworkState, tap: i32) -> RaoResult<()> {
        let angle = self.angle(tap).ok_or_else(|| {
            RaoError::Validation(format!(
                "pst range action '{}': tap {} not in tap table",
                self.id, tap
            ))
        })?;
        state.set_pst(&self.network_element_id, tap, angle)?;
        state.mark_activated(&self.id);
        Ok(())
    }
}
