//! Query descriptors and parameter value setting
//!
//! A [`QueryDescriptor`] is an ordered list of [`QueryClause`]s over one
//! schema and a set of index spaces. Clauses carry parameters that are either
//! fixed at declaration time or left as named placeholders.
//!
//! [`QueryParamValueSetter`] fills placeholders in two passes:
//!
//! ```text
//!  caller params ──validate──▶ override pass ──▶ NLQ evaluator ──▶ fill-unset pass ──▶ + mandatory clauses
//! ```
//!
//! Explicit caller values always win over values inferred from a natural
//! language query.

pub mod clause;
pub mod descriptor;
pub mod error;
pub mod nlq;
pub mod param;
pub mod setter;

pub use clause::{ClauseKind, FilterOp, NlqClientConfig, QueryClause};
pub use descriptor::{
    QueryDescriptor, DEFAULT_LIMIT, DEFAULT_NOT_AFFECTING_WEIGHT, DEFAULT_WEIGHT,
};
pub use error::{QueryError, Result};
pub use nlq::{DisabledNlqEvaluator, NlqParamEvaluator};
pub use param::{AlterMode, ClauseParam, Param, ParamGroup, ParamInfo, ParamInput, ParamValues};
pub use setter::QueryParamValueSetter;
