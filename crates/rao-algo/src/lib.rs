//! # rao-algo: Remedial Action Optimisation
//!
//! Given a [`Network`](rao_core::Network) and a validated
//! [`Crac`](rao_core::crac::Crac), find the preventive and post-contingency
//! remedial actions that maximise the security of monitored branches.
//!
//! ## Components
//!
//! | Module | Role |
//! |--------|------|
//! | [`oracle`] | Flows and PST sensitivities behind [`SensitivityOracle`] |
//! | [`objective`] | Margins, functional cost and node ranking |
//! | [`search_tree`] | Depth-wise search over action combinations for one perimeter |
//! | [`rao`] | Preventive then per-contingency orchestration |
//! | [`parameters`] | TOML-loadable [`RaoParameters`] |
//!
//! ### Architecture
//!
//! - **Oracle**: the DC engine ([`DcSensitivityOracle`]) is the built-in
//!   provider; any engine implementing the trait can be injected with
//!   [`Rao::with_oracle`].
//! - **Search tree**: one sensitivity call per leaf ranks PST moves by a
//!   linear estimate, then the promising children are confirmed in
//!   parallel with real flow evaluations.
//! - **Orchestrator**: contingency chains are independent and run on their
//!   own thread pool; a chain whose root diverges fails alone.
//!
//! ## Example
//!
//! ```ignore
//! use rao_algo::{Rao, RaoParameters};
//!
//! let params = RaoParameters::from_toml_file("rao.toml")?;
//! let result = Rao::new(params)?.run(network, &crac)?;
//! println!("{}", result.summary());
//! ```

pub mod objective;
pub mod oracle;
pub mod parameters;
pub mod rao;
pub mod result;
pub mod search_tree;
pub mod test_utils;

pub use objective::{ObjectiveFunction, ObjectiveValue};
pub use oracle::{
    build_oracle, DcSensitivityOracle, FlowResult, OracleError, SensitivityMatrix,
    SensitivityOracle,
};
pub use parameters::{
    LoadFlowMode, ObjectiveType, PstModel, RaoParameters, RaoParametersError, SecondaryCriterion,
};
pub use rao::Rao;
pub use result::{
    CnecResult, ComputationStatus, ContingencyResult, OptimizationResult, OptimizationSummary,
    PerimeterResult, SearchStats,
};
