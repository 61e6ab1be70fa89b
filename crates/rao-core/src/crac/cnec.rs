//! Monitored branch flow constraints (FlowCNECs).
//!
//! Flows are carried as signed side-ONE active power in MW. In the lossless
//! DC model the side-TWO flow is its negation, so a side-TWO threshold
//! `[min, max]` constrains the side-ONE flow to `[-max, -min]`.
//!
//! Thresholds in amperes are converted with the nominal voltage of the side
//! they are expressed on, `P = I·√3·U/1000`. The reliability margin (MW) is
//! removed from both bounds before the margin is computed.

use crate::units::{Amperes, Kilovolts, Megawatts};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Unit {
    #[default]
    Megawatt,
    Ampere,
}

impl Unit {
    pub fn symbol(&self) -> &'static str {
        match self {
            Unit::Megawatt => "MW",
            Unit::Ampere => "A",
        }
    }
}

/// Branch end the threshold is measured on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    #[default]
    One,
    Two,
}

/// One admissible interval, possibly one-sided.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchThreshold {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub unit: Unit,
    pub side: Side,
}

impl BranchThreshold {
    pub fn new(unit: Unit, side: Side) -> Self {
        Self {
            min: None,
            max: None,
            unit,
            side,
        }
    }

    /// Two-sided megawatt threshold on side ONE.
    pub fn megawatts(min: f64, max: f64) -> Self {
        Self::new(Unit::Megawatt, Side::One).with_min(min).with_max(max)
    }

    pub fn with_min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn with_max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowCnec {
    pub id: String,
    pub name: Option<String>,
    /// Monitored branch name
    pub network_element_id: String,
    pub instant_id: String,
    /// `None` only at the preventive instant
    pub contingency_id: Option<String>,
    pub thresholds: Vec<BranchThreshold>,
    /// MW removed from both bounds
    pub reliability_margin: f64,
    /// Counts in the objective
    pub optimized: bool,
    /// Reported in results
    pub monitored: bool,
    /// Nominal voltage at side ONE and side TWO, resolved from the network at build
    pub nominal_kv: [Kilovolts; 2],
}

impl FlowCnec {
    pub fn new(
        id: impl Into<String>,
        network_element_id: impl Into<String>,
        instant_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: None,
            network_element_id: network_element_id.into(),
            instant_id: instant_id.into(),
            contingency_id: None,
            thresholds: Vec::new(),
            reliability_margin: 0.0,
            optimized: true,
            monitored: false,
            nominal_kv: [Kilovolts(0.0); 2],
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn after(mut self, contingency_id: impl Into<String>) -> Self {
        self.contingency_id = Some(contingency_id.into());
        self
    }

    pub fn with_threshold(mut self, threshold: BranchThreshold) -> Self {
        self.thresholds.push(threshold);
        self
    }

    pub fn with_reliability_margin(mut self, margin_mw: f64) -> Self {
        self.reliability_margin = margin_mw;
        self
    }

    /// Reported but excluded from the objective.
    pub fn monitored_only(mut self) -> Self {
        self.optimized = false;
        self.monitored = true;
        self
    }

    pub fn nominal_voltage(&self, side: Side) -> Kilovolts {
        match side {
            Side::One => self.nominal_kv[0],
            Side::Two => self.nominal_kv[1],
        }
    }

    /// Signed margin of a side-ONE flow (MW) against every threshold,
    /// expressed in `unit`. Positive means secure.
    ///
    /// With several thresholds the tightest one wins; a threshold without
    /// bounds contributes `+inf`.
    pub fn margin(&self, flow_mw: f64, unit: Unit) -> f64 {
        self.thresholds
            .iter()
            .map(|t| self.threshold_margin(t, flow_mw, unit))
            .fold(f64::INFINITY, f64::min)
    }

    fn threshold_margin(&self, threshold: &BranchThreshold, flow_mw: f64, unit: Unit) -> f64 {
        let kv = self.nominal_voltage(threshold.side);
        let to_mw = |value: f64| match threshold.unit {
            Unit::Megawatt => value,
            Unit::Ampere => Amperes(value).to_megawatts(kv).value(),
        };
        let flow = match threshold.side {
            Side::One => flow_mw,
            Side::Two => -flow_mw,
        };

        let mut margin = f64::INFINITY;
        if let Some(max) = threshold.max {
            margin = margin.min(to_mw(max) - flow);
        }
        if let Some(min) = threshold.min {
            margin = margin.min(flow - to_mw(min));
        }
        if margin.is_finite() {
            margin -= self.reliability_margin;
        }

        match unit {
            Unit::Megawatt => margin,
            Unit::Ampere if margin.is_finite() => Megawatts(margin).to_amperes(kv).value(),
            Unit::Ampere => margin,
        }
    }

    /// Side-ONE flow expressed in `unit`.
    pub fn flow_in(&self, flow_mw: f64, unit: Unit) -> f64 {
        match unit {
            Unit::Megawatt => flow_mw,
            Unit::Ampere => Megawatts(flow_mw)
                .to_amperes(self.nominal_voltage(Side::One))
                .value(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cnec(threshold: BranchThreshold) -> FlowCnec {
        let mut cnec = FlowCnec::new("c", "L1", "preventive").with_threshold(threshold);
        cnec.nominal_kv = [Kilovolts(400.0), Kilovolts(400.0)];
        cnec
    }

    #[test]
    fn symmetric_megawatt_threshold() {
        let c = cnec(BranchThreshold::megawatts(-410.0, 410.0));
        assert!((c.margin(450.0, Unit::Megawatt) + 40.0).abs() < 1e-9);
        assert!((c.margin(300.0, Unit::Megawatt) - 110.0).abs() < 1e-9);
        assert!((c.margin(-400.0, Unit::Megawatt) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn one_sided_threshold_ignores_missing_bound() {
        let c = cnec(BranchThreshold::new(Unit::Megawatt, Side::One).with_max(100.0));
        assert!((c.margin(-5000.0, Unit::Megawatt) - 5100.0).abs() < 1e-9);
    }

    #[test]
    fn side_two_sees_negated_flow() {
        let c = cnec(BranchThreshold::new(Unit::Megawatt, Side::Two).with_max(100.0));
        // side-one flow of -150 is +150 seen from side two
        assert!((c.margin(-150.0, Unit::Megawatt) + 50.0).abs() < 1e-9);
        assert!((c.margin(150.0, Unit::Megawatt) - 250.0).abs() < 1e-9);
    }

    #[test]
    fn ampere_threshold_is_converted_with_nominal_voltage() {
        let c = cnec(
            BranchThreshold::new(Unit::Ampere, Side::One)
                .with_min(-1000.0)
                .with_max(1000.0),
        );
        let limit_mw = 692.820323;
        assert!((c.margin(600.0, Unit::Megawatt) - (limit_mw - 600.0)).abs() < 1e-5);
        let margin_a = c.margin(600.0, Unit::Ampere);
        let expected_a = 1000.0 - Megawatts(600.0).to_amperes(Kilovolts(400.0)).value();
        assert!((margin_a - expected_a).abs() < 1e-6);
    }

    #[test]
    fn tightest_threshold_and_reliability_margin() {
        let c = cnec(BranchThreshold::megawatts(-410.0, 410.0))
            .with_threshold(BranchThreshold::megawatts(-1000.0, 350.0))
            .with_reliability_margin(20.0);
        assert!((c.margin(300.0, Unit::Megawatt) - 30.0).abs() < 1e-9);
    }

    #[test]
    fn no_threshold_is_unbounded() {
        let c = FlowCnec::new("c", "L1", "preventive");
        assert_eq!(c.margin(1e6, Unit::Megawatt), f64::INFINITY);
    }
}
