//! Discrete search over remedial-action combinations for one perimeter.
//!
//! Each depth expands every kept leaf by one action. PST tap moves are
//! ranked with a linear estimate built from one sensitivity call per leaf;
//! topological actions and every PST move whose estimate beats its parent
//! are confirmed with a full oracle evaluation. Confirmations of one depth
//! run in parallel and the depth ends when all of them are back, so the
//! kept leaves never depend on scheduling.
//!
//! The search stops when the objective is satisfied, when no child
//! improves its parent by the minimum gain, at `max_depth`, at the
//! per-instant action limit, or when the call budget or deadline is spent.
//! In the last case the best node found so far is returned and flagged.

mod candidates;
mod node;

pub use candidates::{Candidate, CandidateGenerator};
pub use node::{action_key, ActionChoice, ActionSet, SearchNode, StateArena, StateId};

use crate::objective::{ObjectiveFunction, ObjectiveValue};
use crate::oracle::{FlowResult, OracleError, SensitivityOracle};
use crate::parameters::RaoParameters;
use crate::result::SearchStats;
use rao_core::crac::{Contingency, FlowCnec, Instant, RemedialAction};
use rao_core::{NetworkState, RaoResult};
use rayon::prelude::*;
use rayon::ThreadPool;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// One (instant, contingency) optimisation problem.
#[derive(Debug, Clone)]
pub struct Perimeter<'a> {
    pub instant: &'a Instant,
    pub contingency: Option<&'a Contingency>,
    pub cnecs: Vec<&'a FlowCnec>,
    /// Actions the search may choose from
    pub actions: Vec<&'a RemedialAction>,
    pub max_ra: Option<usize>,
}

impl Perimeter<'_> {
    pub fn label(&self) -> String {
        match self.contingency {
            Some(co) => format!("{}/{}", self.instant.id, co.id),
            None => self.instant.id.clone(),
        }
    }
}

/// Shared, read-only inputs of every search in a run.
pub struct SearchContext<'a> {
    pub objective: &'a ObjectiveFunction,
    pub params: &'a RaoParameters,
    pub oracle: &'a dyn SensitivityOracle,
    /// Pool for candidate confirmations
    pub pool: &'a ThreadPool,
    pub deadline: Option<web_time::Instant>,
}

#[derive(Debug, Clone)]
pub struct PerimeterOutcome {
    /// State of the best node, actions applied
    pub state: NetworkState,
    pub flows: FlowResult,
    pub initial: ObjectiveValue,
    pub best: ObjectiveValue,
    pub actions: ActionSet,
    pub stats: SearchStats,
}

/// The root state of a perimeter could not be evaluated.
#[derive(Debug)]
pub struct PerimeterFailure {
    pub error: OracleError,
    pub stats: SearchStats,
}

struct Budget {
    max_calls: Option<usize>,
    used: usize,
    deadline: Option<web_time::Instant>,
}

impl Budget {
    fn remaining(&self) -> usize {
        self.max_calls
            .map(|max| max.saturating_sub(self.used))
            .unwrap_or(usize::MAX)
    }

    fn spend(&mut self, calls: usize) {
        self.used += calls;
    }

    fn expired(&self) -> bool {
        self.deadline
            .is_some_and(|deadline| web_time::Instant::now() >= deadline)
    }
}

type Confirmation = RaoResult<(NetworkState, FlowResult)>;

pub struct SearchTree<'a> {
    ctx: &'a SearchContext<'a>,
    perimeter: &'a Perimeter<'a>,
}

impl<'a> SearchTree<'a> {
    pub fn new(ctx: &'a SearchContext<'a>, perimeter: &'a Perimeter<'a>) -> Self {
        Self { ctx, perimeter }
    }

    /// Order nodes; `Greater` means `a` is better. Equal objectives fall
    /// back to the lexicographically smaller action key.
    fn rank(&self, a: &SearchNode, b: &SearchNode) -> Ordering {
        self.ctx
            .objective
            .compare(&a.value, &b.value)
            .then_with(|| b.key.cmp(&a.key))
    }

    /// Optimise from `initial`. `root_flows` skips the root evaluation when
    /// the caller already holds flows for exactly this state.
    pub fn run(
        &self,
        initial: NetworkState,
        root_flows: Option<FlowResult>,
    ) -> Result<PerimeterOutcome, PerimeterFailure> {
        let label = self.perimeter.label();
        let params = &self.ctx.params.search_tree;
        let objective = self.ctx.objective;
        let contingency = self.perimeter.contingency;

        let mut stats = SearchStats::default();
        let mut budget = Budget {
            max_calls: self.ctx.params.budget.max_oracle_calls,
            used: 0,
            deadline: self.ctx.deadline,
        };

        let flows = match root_flows {
            Some(flows) => flows,
            None => {
                budget.spend(1);
                stats.oracle_calls += 1;
                match self.ctx.oracle.evaluate(&initial, contingency) {
                    Ok(flows) => flows,
                    Err(error) => {
                        warn!(perimeter = %label, error = %error, "root evaluation failed");
                        return Err(PerimeterFailure { error, stats });
                    }
                }
            }
        };

        let mut arena = StateArena::new();
        let root = SearchNode {
            state: arena.insert(initial),
            actions: ActionSet::new(),
            key: String::new(),
            value: objective.evaluate(&self.perimeter.cnecs, &flows, 0, 0.0),
            flows,
            depth: 0,
        };
        let initial_value = root.value.clone();
        info!(
            perimeter = %label,
            min_margin = root.value.min_margin,
            actions = self.perimeter.actions.len(),
            "search tree root evaluated"
        );

        let generator = CandidateGenerator::new(objective, &self.perimeter.cnecs, self.ctx.params);
        let mut seen = BTreeSet::from([String::new()]);
        let mut best = root.clone();
        let mut leaves = vec![root];

        for depth in 1..=params.max_depth {
            if objective.is_satisfied(&best.value) {
                debug!(perimeter = %label, depth, "objective satisfied");
                break;
            }
            if budget.expired() {
                warn!(perimeter = %label, depth, "deadline reached, keeping best node so far");
                stats.budget_exhausted = true;
                break;
            }

            let mut candidates =
                self.expand(&leaves, &arena, &generator, &mut budget, &mut stats, &mut seen);
            if candidates.is_empty() {
                debug!(perimeter = %label, depth, "no candidate left to confirm");
                break;
            }
            candidates.sort_by(|a, b| a.priority(b, objective));
            let remaining = budget.remaining();
            if candidates.len() > remaining {
                warn!(
                    perimeter = %label,
                    depth,
                    dropped = candidates.len() - remaining,
                    "oracle call budget exhausted"
                );
                candidates.truncate(remaining);
                stats.budget_exhausted = true;
            }
            if candidates.is_empty() {
                break;
            }

            budget.spend(candidates.len());
            stats.oracle_calls += candidates.len();
            stats.depth = depth;
            let confirmations = self.confirm(&candidates, &leaves, &arena);

            let mut children = Vec::new();
            for (candidate, confirmation) in candidates.iter().zip(confirmations) {
                let (state, flows) = match confirmation {
                    Ok(done) => done,
                    Err(e) => {
                        stats.candidates_diverged += 1;
                        debug!(perimeter = %label, candidate = %candidate.key, error = %e, "candidate discarded");
                        continue;
                    }
                };
                stats.candidates_evaluated += 1;
                let parent = &leaves[candidate.parent];
                let value = objective.evaluate(
                    &self.perimeter.cnecs,
                    &flows,
                    candidate.actions.len(),
                    candidate.activation_cost,
                );
                if objective.improves(&value, &parent.value, params.min_absolute_gain, params.min_relative_gain) {
                    children.push((candidate, state, flows, value));
                }
            }

            if children.is_empty() {
                debug!(perimeter = %label, depth, "no improving child, local optimum reached");
                break;
            }

            let mut nodes: Vec<SearchNode> = children
                .into_iter()
                .map(|(candidate, state, flows, value)| SearchNode {
                    state: arena.insert(state),
                    actions: candidate.actions.clone(),
                    key: candidate.key.clone(),
                    flows,
                    value,
                    depth,
                })
                .collect();
            nodes.sort_by(|a, b| self.rank(b, a));
            nodes.truncate(params.leaves_in_parallel);

            if self.rank(&nodes[0], &best) == Ordering::Greater {
                best = nodes[0].clone();
            }
            debug!(
                perimeter = %label,
                depth,
                best = %best.key,
                min_margin = best.value.min_margin,
                "depth complete"
            );
            leaves = nodes;

            if budget.remaining() == 0 {
                stats.budget_exhausted = true;
                break;
            }
        }

        info!(
            perimeter = %label,
            actions = %best.key,
            min_margin = best.value.min_margin,
            oracle_calls = stats.oracle_calls,
            "search tree finished"
        );

        Ok(PerimeterOutcome {
            state: arena.get(best.state).clone(),
            flows: best.flows,
            initial: initial_value,
            best: best.value,
            actions: best.actions,
            stats,
        })
    }

    /// Candidates of every leaf, deduplicated against all action sets seen
    /// in this perimeter and pruned on their linear estimate.
    fn expand<'g>(
        &self,
        leaves: &[SearchNode],
        arena: &StateArena,
        generator: &CandidateGenerator<'g>,
        budget: &mut Budget,
        stats: &mut SearchStats,
        seen: &mut BTreeSet<String>,
    ) -> Vec<Candidate<'g>>
    where
        'a: 'g,
    {
        let mut out = Vec::new();
        for (idx, leaf) in leaves.iter().enumerate() {
            if self
                .perimeter
                .max_ra
                .is_some_and(|max| leaf.actions.len() >= max)
            {
                continue;
            }
            let state = arena.get(leaf.state);
            let mut generated = Vec::new();

            for action in &self.perimeter.actions {
                if let Some(na) = action.as_network() {
                    generated.extend(generator.network_candidate(idx, leaf, state, *action, na));
                }
            }

            let psts: Vec<_> = self
                .perimeter
                .actions
                .iter()
                .filter_map(|action| action.as_pst().map(|pst| (*action, pst)))
                .filter(|(_, pst)| !leaf.has_action(&pst.id))
                .collect();
            if !psts.is_empty() {
                if budget.remaining() == 0 {
                    stats.budget_exhausted = true;
                } else {
                    budget.spend(1);
                    stats.oracle_calls += 1;
                    let controls: Vec<String> =
                        psts.iter().map(|(_, pst)| pst.network_element_id.clone()).collect();
                    match self
                        .ctx
                        .oracle
                        .sensitivities(state, self.perimeter.contingency, &controls)
                    {
                        Ok(sensitivities) => {
                            for (action, pst) in psts {
                                generated.extend(generator.pst_candidates(
                                    idx,
                                    leaf,
                                    state,
                                    action,
                                    pst,
                                    &sensitivities,
                                ));
                            }
                        }
                        Err(e) => {
                            warn!(leaf = %leaf.key, error = %e, "sensitivity computation failed, skipping range actions");
                        }
                    }
                }
            }

            for candidate in generated {
                if !seen.insert(candidate.key.clone()) {
                    continue;
                }
                if let Some(estimate) = &candidate.estimate {
                    if estimate.functional <= leaf.value.functional {
                        stats.candidates_pruned += 1;
                        continue;
                    }
                }
                out.push(candidate);
            }
        }
        out
    }

    /// Apply and evaluate candidates on the candidate pool. Results come
    /// back in candidate order.
    fn confirm(
        &self,
        candidates: &[Candidate<'_>],
        leaves: &[SearchNode],
        arena: &StateArena,
    ) -> Vec<Confirmation> {
        let oracle = self.ctx.oracle;
        let contingency = self.perimeter.contingency;
        self.ctx.pool.install(|| {
            candidates
                .par_iter()
                .map(|candidate| -> Confirmation {
                    let mut state = arena.get(leaves[candidate.parent].state).clone();
                    candidate.apply(&mut state)?;
                    let flows = oracle.evaluate(&state, contingency)?;
                    Ok((state, flows))
                })
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::DcSensitivityOracle;
    use crate::parameters::{ObjectiveType, PstModel};
    use crate::test_utils::{pst_triangle_crac, pst_triangle_network};
    use rao_core::SolverKind;
    use std::sync::Arc;

    fn run_triangle(params: RaoParameters) -> PerimeterOutcome {
        let network = pst_triangle_network();
        let crac = pst_triangle_crac(&network);
        let objective = ObjectiveFunction::new(&params.objective_function);
        let oracle = DcSensitivityOracle::new(SolverKind::Gauss);
        let pool = rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap();
        let ctx = SearchContext {
            objective: &objective,
            params: &params,
            oracle: &oracle,
            pool: &pool,
            deadline: None,
        };
        let instant = crac.preventive_instant().unwrap();
        let perimeter = Perimeter {
            instant,
            contingency: None,
            cnecs: crac.cnecs_at(&instant.id, None),
            actions: crac
                .remedial_actions_at(&instant.id, None)
                .into_iter()
                .map(|(ra, _)| ra)
                .collect(),
            max_ra: None,
        };
        SearchTree::new(&ctx, &perimeter)
            .run(NetworkState::new(Arc::clone(&network)), None)
            .unwrap()
    }

    #[test]
    fn pst_moves_to_bound_and_secures() {
        for pst_model in [PstModel::Continuous, PstModel::ApproximatedIntegers] {
            let mut params = RaoParameters::default();
            params.range_actions.pst_model = pst_model;
            let outcome = run_triangle(params);

            assert_eq!(outcome.actions.get("pst"), Some(&ActionChoice::Tap(-16)));
            assert!((outcome.initial.min_margin + 40.0).abs() < 1e-6);
            assert!((outcome.best.min_margin - 6.5418).abs() < 1e-3);
            assert_eq!(outcome.state.pst_setting("L13").unwrap().tap, -16);
            assert!(!outcome.stats.budget_exhausted);
            // root, sensitivities, then confirmations
            assert!(outcome.stats.oracle_calls >= 3);
        }
    }

    #[test]
    fn max_min_margin_stops_when_nothing_is_left() {
        let mut params = RaoParameters::default();
        params.objective_function.objective_type = ObjectiveType::MaxMinMargin;
        let outcome = run_triangle(params);
        assert_eq!(outcome.actions.len(), 1);
        assert_eq!(outcome.stats.depth, 1);
    }

    #[test]
    fn budget_cuts_search_and_flags_it() {
        let mut params = RaoParameters::default();
        params.budget.max_oracle_calls = Some(3);
        let outcome = run_triangle(params);
        assert_eq!(outcome.stats.oracle_calls, 3);
        assert!(outcome.stats.budget_exhausted);
        // the single confirmation goes to the best estimate
        assert_eq!(outcome.actions.get("pst"), Some(&ActionChoice::Tap(-16)));

        let mut params = RaoParameters::default();
        params.budget.max_oracle_calls = Some(2);
        let outcome = run_triangle(params);
        assert!(outcome.stats.budget_exhausted);
        assert!(outcome.actions.is_empty());
        assert!((outcome.best.min_margin + 40.0).abs() < 1e-6);
    }

    #[test]
    fn expired_deadline_returns_root() {
        let network = pst_triangle_network();
        let crac = pst_triangle_crac(&network);
        let params = RaoParameters::default();
        let objective = ObjectiveFunction::new(&params.objective_function);
        let oracle = DcSensitivityOracle::new(SolverKind::Gauss);
        let pool = rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap();
        let ctx = SearchContext {
            objective: &objective,
            params: &params,
            oracle: &oracle,
            pool: &pool,
            deadline: Some(web_time::Instant::now()),
        };
        let instant = crac.preventive_instant().unwrap();
        let perimeter = Perimeter {
            instant,
            contingency: None,
            cnecs: crac.cnecs_at(&instant.id, None),
            actions: crac.remedial_actions().iter().collect(),
            max_ra: None,
        };
        let outcome = SearchTree::new(&ctx, &perimeter)
            .run(NetworkState::new(network), None)
            .unwrap();
        assert!(outcome.stats.budget_exhausted);
        assert!(outcome.actions.is_empty());
        assert_eq!(outcome.stats.oracle_calls, 1);
    }
}
