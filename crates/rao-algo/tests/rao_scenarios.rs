//! End-to-end optimisation scenarios on the small test grids.

use rao_algo::parameters::RaUsageLimits;
use rao_algo::test_utils::{
    pst_triangle_builder, pst_triangle_network, two_bus_crac, two_bus_network,
};
use rao_algo::{
    ComputationStatus, DcSensitivityOracle, FlowResult, ObjectiveType, OptimizationResult,
    OracleError, Rao, RaoParameters, SensitivityMatrix, SensitivityOracle,
};
use rao_core::crac::{
    ActionType, BranchThreshold, Contingency, CracBuilder, FlowCnec, InstantKind, NetworkAction,
    UsageMethod, UsageRule,
};
use rao_core::{NetworkState, SolverKind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

type FailWhen = Box<dyn Fn(&NetworkState, Option<&Contingency>) -> bool + Send + Sync>;

/// DC oracle that fails on chosen states and counts every call.
struct ScriptedOracle {
    inner: DcSensitivityOracle,
    calls: AtomicUsize,
    fail_when: FailWhen,
}

impl ScriptedOracle {
    fn new(fail_when: FailWhen) -> Self {
        Self {
            inner: DcSensitivityOracle::new(SolverKind::Gauss),
            calls: AtomicUsize::new(0),
            fail_when,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SensitivityOracle for ScriptedOracle {
    fn id(&self) -> &str {
        "scripted"
    }

    fn evaluate(
        &self,
        state: &NetworkState,
        contingency: Option<&Contingency>,
    ) -> Result<FlowResult, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if (self.fail_when)(state, contingency) {
            return Err(OracleError::NumericalDivergence("scripted failure".to_string()));
        }
        self.inner.evaluate(state, contingency)
    }

    fn sensitivities(
        &self,
        state: &NetworkState,
        contingency: Option<&Contingency>,
        controls: &[String],
    ) -> Result<SensitivityMatrix, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.sensitivities(state, contingency, controls)
    }

    fn max_concurrency(&self) -> usize {
        2
    }
}

fn params(workers: usize) -> RaoParameters {
    let mut params = RaoParameters::default();
    params.multithreading.contingency_workers = workers;
    params.multithreading.candidate_workers = workers;
    params
}

fn without_timing(mut result: OptimizationResult) -> OptimizationResult {
    result.elapsed_seconds = 0.0;
    result
}

#[test]
fn results_do_not_depend_on_worker_count() {
    let network = two_bus_network();
    let crac = two_bus_crac(&network);

    let serial = Rao::new(params(1)).unwrap().run(Arc::clone(&network), &crac).unwrap();
    let parallel = Rao::new(params(4)).unwrap().run(Arc::clone(&network), &crac).unwrap();
    let again = Rao::new(params(4)).unwrap().run(network, &crac).unwrap();

    let serial = without_timing(serial);
    assert_eq!(serial, without_timing(parallel));
    assert_eq!(serial, without_timing(again));
}

#[test]
fn candidate_failures_are_discarded_and_counted() {
    let network = two_bus_network();
    let crac = two_bus_crac(&network);
    let oracle = Arc::new(ScriptedOracle::new(Box::new(|state, _| {
        state.is_activated("close-c")
    })));

    let result = Rao::with_oracle(params(2), oracle.clone())
        .unwrap()
        .run(network, &crac)
        .unwrap();

    assert_eq!(result.status, ComputationStatus::Default);
    let curative = result
        .contingency("co-a")
        .and_then(|c| c.perimeter("curative"))
        .unwrap();
    assert!(curative.activated_network_actions.is_empty());
    assert_eq!(curative.stats.candidates_diverged, 2);
    assert!((curative.min_margin().unwrap() + 100.0).abs() < 1e-6);
    assert!(!result.is_secure());

    // co-b is unaffected by the failures on co-a
    let co_b = result.contingency("co-b").and_then(|c| c.perimeter("curative")).unwrap();
    assert_eq!(co_b.activated_network_actions, vec!["close-d".to_string()]);

    assert_eq!(result.oracle_calls, oracle.calls());
}

#[test]
fn preventive_divergence_fails_the_run() {
    let network = two_bus_network();
    let crac = two_bus_crac(&network);
    let oracle = Arc::new(ScriptedOracle::new(Box::new(|_, contingency| {
        contingency.is_none()
    })));

    let result = Rao::with_oracle(params(1), oracle).unwrap().run(network, &crac).unwrap();
    assert_eq!(result.status, ComputationStatus::Failure);
    assert!(result.preventive.failed());
    assert!(result.contingencies.is_empty());
}

#[test]
fn auto_instant_applies_forced_actions() {
    let network = two_bus_network();
    let crac = CracBuilder::new("auto")
        .add_instant("preventive", InstantKind::Preventive)
        .add_instant("outage", InstantKind::Outage)
        .add_instant("auto", InstantKind::Auto)
        .add_instant("curative", InstantKind::Curative)
        .add_contingency(Contingency::new("co-a").with_branch("La"))
        .add_flow_cnec(
            FlowCnec::new("auto-lb", "Lb", "auto")
                .after("co-a")
                .with_threshold(BranchThreshold::megawatts(-300.0, 300.0)),
        )
        .add_flow_cnec(
            FlowCnec::new("cur-lb", "Lb", "curative")
                .after("co-a")
                .with_threshold(BranchThreshold::megawatts(-300.0, 300.0)),
        )
        .add_network_action(
            NetworkAction::new("auto-close-c")
                .with_terminals_connection("Lc", ActionType::Close)
                .with_usage_rule(UsageRule::on_contingency_state("auto", "co-a", UsageMethod::Forced)),
        )
        .add_network_action(
            NetworkAction::new("close-d")
                .with_terminals_connection("Ld", ActionType::Close)
                .with_usage_rule(UsageRule::on_instant("curative", UsageMethod::Available)),
        )
        .build(&network)
        .unwrap();

    let result = Rao::new(params(2)).unwrap().run(network, &crac).unwrap();
    let chain = result.contingency("co-a").unwrap();
    assert_eq!(
        chain.perimeters.iter().map(|p| p.instant_id.as_str()).collect::<Vec<_>>(),
        vec!["outage", "auto", "curative"]
    );

    let auto = chain.perimeter("auto").unwrap();
    assert_eq!(auto.forced_network_actions, vec!["auto-close-c".to_string()]);
    assert!((auto.min_margin().unwrap() - 100.0).abs() < 1e-6);

    // already secure after the automaton, nothing left to do
    let curative = chain.perimeter("curative").unwrap();
    assert!(curative.forced_network_actions.is_empty());
    assert!(curative.activated_network_actions.is_empty());
    assert!(result.is_secure());
}

#[test]
fn usage_limit_blocks_curative_actions() {
    let network = two_bus_network();
    let crac = two_bus_crac(&network);
    let mut params = params(2);
    params.ra_usage_limits.insert(
        "curative".to_string(),
        RaUsageLimits { max_ra: Some(0) },
    );

    let result = Rao::new(params).unwrap().run(network, &crac).unwrap();
    for chain in &result.contingencies {
        let curative = chain.perimeter("curative").unwrap();
        assert_eq!(curative.action_count(), 0);
        assert!((curative.min_margin().unwrap() + 100.0).abs() < 1e-6);
    }
    assert_eq!(result.status, ComputationStatus::Default);
    assert!(!result.is_secure());
}

#[test]
fn min_cost_picks_the_cheapest_sufficient_action() {
    let network = two_bus_network();
    let with_costs = |cost_c: f64, cost_d: f64| {
        CracBuilder::new("costs")
            .add_instant("preventive", InstantKind::Preventive)
            .add_instant("outage", InstantKind::Outage)
            .add_instant("curative", InstantKind::Curative)
            .add_contingency(Contingency::new("co-a").with_branch("La"))
            .add_flow_cnec(
                FlowCnec::new("cur-lb", "Lb", "curative")
                    .after("co-a")
                    .with_threshold(BranchThreshold::megawatts(-300.0, 300.0)),
            )
            .add_network_action(
                NetworkAction::new("close-c")
                    .with_terminals_connection("Lc", ActionType::Close)
                    .with_activation_cost(cost_c)
                    .with_usage_rule(UsageRule::on_instant("curative", UsageMethod::Available)),
            )
            .add_network_action(
                NetworkAction::new("close-d")
                    .with_terminals_connection("Ld", ActionType::Close)
                    .with_activation_cost(cost_d)
                    .with_usage_rule(UsageRule::on_instant("curative", UsageMethod::Available)),
            )
            .build(&network)
            .unwrap()
    };
    let mut params = params(2);
    params.objective_function.objective_type = ObjectiveType::MinCost;
    let rao = Rao::new(params).unwrap();

    for (cost_c, cost_d, expected) in [(10.0, 5.0, "close-d"), (5.0, 10.0, "close-c")] {
        let result = rao.run(Arc::clone(&network), &with_costs(cost_c, cost_d)).unwrap();
        let curative = result
            .contingency("co-a")
            .and_then(|c| c.perimeter("curative"))
            .unwrap();
        assert_eq!(curative.activated_network_actions, vec![expected.to_string()]);
        assert!(curative.is_secure());
    }
}

#[test]
fn preventive_pst_is_kept_in_post_contingency_states() {
    let network = pst_triangle_network();
    let crac = pst_triangle_builder()
        .add_instant("outage", InstantKind::Outage)
        .add_contingency(Contingency::new("co-l23").with_branch("L23"))
        .add_flow_cnec(
            FlowCnec::new("out-l13", "L13", "outage")
                .after("co-l23")
                .with_threshold(BranchThreshold::megawatts(-400.0, 400.0))
                .monitored_only(),
        )
        .build(&network)
        .unwrap();

    let result = Rao::new(params(2)).unwrap().run(network, &crac).unwrap();
    assert_eq!(result.preventive.pst_taps.get("pst"), Some(&-16));

    // radial after losing L23: the whole 300 MW goes through L13
    let outage = result
        .contingency("co-l23")
        .and_then(|c| c.perimeter("outage"))
        .unwrap();
    assert_eq!(outage.cnec_results.len(), 1);
    assert!((outage.cnec_results[0].flow - 300.0).abs() < 1e-6);
    assert!(!outage.cnec_results[0].optimized);
}
