//! Natural language query evaluation seam
//!
//! The evaluator itself (an LLM client) lives outside this crate. It receives
//! the declared parameters and returns values for the ones it can infer.

use crate::clause::NlqClientConfig;
use crate::error::{QueryError, Result};
use crate::param::{ParamInfo, ParamValues};

/// Derives parameter values from a free-text query.
pub trait NlqParamEvaluator {
    fn evaluate_param_infos(
        &self,
        param_infos: &[ParamInfo],
        natural_query: &str,
        client_config: &NlqClientConfig,
        system_prompt: Option<&str>,
    ) -> Result<ParamValues>;
}

/// Evaluator for deployments without a natural language backend.
///
/// Queries that carry no natural query text never reach it; queries that do
/// fail with [`QueryError::Nlq`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledNlqEvaluator;

impl NlqParamEvaluator for DisabledNlqEvaluator {
    fn evaluate_param_infos(
        &self,
        _param_infos: &[ParamInfo],
        _natural_query: &str,
        client_config: &NlqClientConfig,
        _system_prompt: Option<&str>,
    ) -> Result<ParamValues> {
        Err(QueryError::Nlq(format!(
            "no evaluator configured for model '{}'",
            client_config.model
        )))
    }
}
