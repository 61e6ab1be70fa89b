//! Run orchestration: preventive perimeter first, then one chain of
//! post-contingency perimeters per contingency.
//!
//! Every chain starts from the optimized preventive state and walks the
//! OUTAGE, AUTO and CURATIVE instants in order, each starting from the
//! state the previous one settled on. Chains are independent of each other
//! and run in parallel on the contingency pool; results are collected in
//! CRAC order.

use crate::objective::ObjectiveFunction;
use crate::oracle::{build_oracle, FlowResult, SensitivityOracle};
use crate::parameters::RaoParameters;
use crate::result::{
    CnecResult, ComputationStatus, ContingencyResult, OptimizationResult, PerimeterResult,
    SearchStats,
};
use crate::search_tree::{ActionChoice, Perimeter, PerimeterOutcome, SearchContext, SearchTree};
use rao_core::crac::{Contingency, Crac, FlowCnec, Instant, RemedialAction, UsageMethod};
use rao_core::{Diagnostics, Network, NetworkState, RaoError, RaoResult};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub struct Rao {
    params: RaoParameters,
    oracle: Arc<dyn SensitivityOracle>,
}

impl Rao {
    /// Optimizer with the oracle configured in `params.load_flow`.
    pub fn new(params: RaoParameters) -> RaoResult<Self> {
        let oracle = build_oracle(&params.load_flow)?;
        Self::with_oracle(params, oracle)
    }

    pub fn with_oracle(params: RaoParameters, oracle: Arc<dyn SensitivityOracle>) -> RaoResult<Self> {
        params.validate()?;
        Ok(Self { params, oracle })
    }

    pub fn parameters(&self) -> &RaoParameters {
        &self.params
    }

    fn pool(threads: usize, name: &'static str) -> RaoResult<ThreadPool> {
        ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(move |i| format!("rao-{}-{}", name, i))
            .build()
            .map_err(|e| RaoError::Config(format!("failed to build {} pool: {}", name, e)))
    }

    pub fn run(&self, network: Arc<Network>, crac: &Crac) -> RaoResult<OptimizationResult> {
        let started = web_time::Instant::now();
        let deadline = self
            .params
            .budget
            .time_limit_seconds
            .map(|limit| started + Duration::from_secs_f64(limit));

        let mut diag = Diagnostics::new();
        network.validate_into(&mut diag);
        for issue in diag.warnings() {
            warn!("{}", issue);
        }
        if diag.has_errors() {
            let problems: Vec<String> = diag.errors().map(|issue| issue.to_string()).collect();
            return Err(RaoError::Network(problems.join("; ")));
        }
        let preventive = crac
            .preventive_instant()
            .ok_or_else(|| RaoError::Validation("CRAC declares no preventive instant".to_string()))?;

        let workers = &self.params.multithreading;
        let candidate_pool = Self::pool(
            workers.candidate_workers.min(self.oracle.max_concurrency()),
            "candidate",
        )?;
        let contingency_pool = Self::pool(workers.contingency_workers, "contingency")?;

        let objective = ObjectiveFunction::new(&self.params.objective_function);
        let ctx = SearchContext {
            objective: &objective,
            params: &self.params,
            oracle: self.oracle.as_ref(),
            pool: &candidate_pool,
            deadline,
        };

        info!(
            crac = crac.id(),
            oracle = self.oracle.id(),
            contingencies = crac.contingencies().len(),
            remedial_actions = crac.remedial_actions().len(),
            "starting remedial action optimisation"
        );

        let initial = NetworkState::new(network);
        let (preventive_result, outcome) =
            self.optimize_perimeter(&ctx, crac, preventive, None, initial, None);
        let Some(preventive_outcome) = outcome else {
            error!(
                reason = preventive_result.failure.as_deref().unwrap_or_default(),
                "preventive perimeter failed"
            );
            return Ok(OptimizationResult {
                status: ComputationStatus::Failure,
                oracle_calls: preventive_result.stats.oracle_calls,
                preventive: preventive_result,
                contingencies: Vec::new(),
                elapsed_seconds: started.elapsed().as_secs_f64(),
            });
        };

        let preventive_state = preventive_outcome.state;
        let contingencies: Vec<ContingencyResult> = contingency_pool.install(|| {
            crac.contingencies()
                .par_iter()
                .map(|co| self.optimize_contingency(&ctx, crac, co, &preventive_state))
                .collect()
        });

        let status = if contingencies.iter().any(ContingencyResult::failed) {
            ComputationStatus::PartialFailure
        } else {
            ComputationStatus::Default
        };
        let oracle_calls = preventive_result.stats.oracle_calls
            + contingencies
                .iter()
                .flat_map(|c| c.perimeters.iter())
                .map(|p| p.stats.oracle_calls)
                .sum::<usize>();

        let result = OptimizationResult {
            status,
            preventive: preventive_result,
            contingencies,
            oracle_calls,
            elapsed_seconds: started.elapsed().as_secs_f64(),
        };
        info!(summary = %result.summary(), "remedial action optimisation finished");
        Ok(result)
    }

    /// OUTAGE, AUTO and CURATIVE perimeters of one contingency, in order.
    fn optimize_contingency(
        &self,
        ctx: &SearchContext<'_>,
        crac: &Crac,
        contingency: &Contingency,
        preventive_state: &NetworkState,
    ) -> ContingencyResult {
        let mut state = preventive_state.clone();
        let mut flows = None;
        let mut perimeters = Vec::new();

        for instant in crac.instants().iter().filter(|i| !i.is_preventive()) {
            let (result, outcome) =
                self.optimize_perimeter(ctx, crac, instant, Some(contingency), state.clone(), flows.take());
            let failure = result.failure.clone();
            perimeters.push(result);
            match outcome {
                Some(outcome) => {
                    state = outcome.state;
                    flows = Some(outcome.flows);
                }
                None => {
                    warn!(
                        contingency = %contingency.id,
                        instant = %instant.id,
                        "contingency chain failed, later instants skipped"
                    );
                    return ContingencyResult {
                        contingency_id: contingency.id.clone(),
                        perimeters,
                        failure,
                    };
                }
            }
        }

        ContingencyResult {
            contingency_id: contingency.id.clone(),
            perimeters,
            failure: None,
        }
    }

    /// Apply FORCED actions, then search over the AVAILABLE ones.
    fn optimize_perimeter(
        &self,
        ctx: &SearchContext<'_>,
        crac: &Crac,
        instant: &Instant,
        contingency: Option<&Contingency>,
        mut state: NetworkState,
        flows: Option<FlowResult>,
    ) -> (PerimeterResult, Option<PerimeterOutcome>) {
        let co_id = contingency.map(|c| c.id.as_str());
        let granted = crac.remedial_actions_at(&instant.id, co_id);

        let mut result = PerimeterResult {
            instant_id: instant.id.clone(),
            instant_kind: instant.kind,
            contingency_id: co_id.map(str::to_string),
            forced_network_actions: Vec::new(),
            activated_network_actions: Vec::new(),
            pst_taps: BTreeMap::new(),
            initial_objective: None,
            final_objective: None,
            cnec_results: Vec::new(),
            stats: SearchStats::default(),
            failure: None,
        };

        for (action, method) in &granted {
            let Some(na) = action.as_network() else {
                continue;
            };
            if *method != UsageMethod::Forced || na.is_effective(&state) {
                continue;
            }
            if let Err(e) = na.apply(&mut state) {
                result.failure = Some(format!("forced action '{}' failed: {}", na.id, e));
                return (result, None);
            }
            result.forced_network_actions.push(na.id.clone());
        }
        if !result.forced_network_actions.is_empty() {
            info!(
                instant = %instant.id,
                contingency = co_id.unwrap_or("-"),
                actions = ?result.forced_network_actions,
                "forced actions applied"
            );
        }
        let root_flows = if result.forced_network_actions.is_empty() {
            flows
        } else {
            None
        };

        let actions: Vec<&RemedialAction> = if instant.is_auto() {
            Vec::new()
        } else {
            granted
                .iter()
                .filter(|(_, method)| *method == UsageMethod::Available)
                .map(|(action, _)| *action)
                .collect()
        };
        let perimeter = Perimeter {
            instant,
            contingency,
            cnecs: crac.cnecs_at(&instant.id, co_id),
            actions,
            max_ra: self.params.max_ra(&instant.id),
        };

        match SearchTree::new(ctx, &perimeter).run(state, root_flows) {
            Ok(outcome) => {
                for (id, choice) in &outcome.actions {
                    match choice {
                        ActionChoice::Activated => result.activated_network_actions.push(id.clone()),
                        ActionChoice::Tap(tap) => {
                            result.pst_taps.insert(id.clone(), *tap);
                        }
                    }
                }
                result.cnec_results = cnec_results(ctx.objective, &perimeter.cnecs, &outcome.flows);
                result.initial_objective = Some(outcome.initial.clone());
                result.final_objective = Some(outcome.best.clone());
                result.stats = outcome.stats.clone();
                (result, Some(outcome))
            }
            Err(failure) => {
                result.failure = Some(failure.error.to_string());
                result.stats = failure.stats;
                (result, None)
            }
        }
    }
}

fn cnec_results(objective: &ObjectiveFunction, cnecs: &[&FlowCnec], flows: &FlowResult) -> Vec<CnecResult> {
    objective
        .cnec_margins(cnecs, flows)
        .into_iter()
        .filter(|m| m.cnec.optimized || m.cnec.monitored)
        .map(|m| CnecResult {
            cnec_id: m.cnec.id.clone(),
            network_element_id: m.cnec.network_element_id.clone(),
            flow: m.flow,
            margin: m.margin,
            unit: objective.unit(),
            optimized: m.cnec.optimized,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{two_bus_builder, two_bus_crac, two_bus_network};
    use rao_core::crac::{CracBuilder, InstantKind};
    use rao_core::{Bus, BusId, Kilovolts};

    fn params() -> RaoParameters {
        let mut params = RaoParameters::default();
        params.multithreading.contingency_workers = 2;
        params.multithreading.candidate_workers = 2;
        params
    }

    #[test]
    fn curative_chains_are_independent() {
        let network = two_bus_network();
        let crac = two_bus_crac(&network);
        let result = Rao::new(params()).unwrap().run(network, &crac).unwrap();

        assert_eq!(result.status, ComputationStatus::Default);
        assert!(result.preventive.activated_network_actions.is_empty());

        let co_a = result.contingency("co-a").unwrap();
        let curative = co_a.perimeter("curative").unwrap();
        assert_eq!(curative.activated_network_actions, vec!["close-c".to_string()]);
        assert!((curative.min_margin().unwrap() - 100.0).abs() < 1e-6);
        // open-b islands the network and is discarded
        assert!(curative.stats.candidates_diverged >= 1);

        let co_b = result.contingency("co-b").unwrap();
        let curative = co_b.perimeter("curative").unwrap();
        assert_eq!(curative.activated_network_actions, vec!["close-d".to_string()]);
        assert!(result.is_secure());
    }

    #[test]
    fn diverging_contingency_is_a_partial_failure() {
        let network = two_bus_network();
        let crac = two_bus_builder()
            .add_contingency(Contingency::new("co-ab").with_branch("La").with_branch("Lb"))
            .build(&network)
            .unwrap();
        let result = Rao::new(params()).unwrap().run(network, &crac).unwrap();

        assert_eq!(result.status, ComputationStatus::PartialFailure);
        let failed = result.contingency("co-ab").unwrap();
        assert!(failed.failed());
        assert_eq!(failed.perimeters.len(), 1);
        assert!(result.contingency("co-a").unwrap().failure.is_none());
        assert_eq!(result.contingencies.len(), 3);
    }

    #[test]
    fn invalid_network_is_rejected_before_search() {
        let bus = |id: usize| Bus::new(BusId::new(id), format!("B{}", id), Kilovolts(400.0));
        let mut single = Network::new();
        single.add_bus(bus(1));
        let crac = CracBuilder::new("empty")
            .add_instant("preventive", InstantKind::Preventive)
            .build(&single)
            .unwrap();
        // one bus and no branch is a trivial but valid network
        let trivial = Rao::new(params()).unwrap().run(Arc::new(single), &crac).unwrap();
        assert_eq!(trivial.status, ComputationStatus::Default);

        let mut broken = Network::new();
        broken.add_bus(bus(1));
        broken.add_bus(bus(2));
        let result = Rao::new(params()).unwrap().run(Arc::new(broken), &crac);
        assert!(matches!(result, Err(RaoError::Network(_))));
    }
}
