//! Parameter value setting
//!
//! Values are applied in two passes. The caller's values go first and
//! replace whatever a slot holds. Values inferred from the natural language
//! query go second, only for names the caller did not supply and only into
//! slots that are still empty.

use crate::descriptor::QueryDescriptor;
use crate::error::{QueryError, Result};
use crate::nlq::NlqParamEvaluator;
use crate::param::{AlterMode, ParamValues};
use std::collections::BTreeSet;
use tracing::debug;

pub struct QueryParamValueSetter;

impl QueryParamValueSetter {
    /// Apply `params`, then natural language derived values, then append the
    /// mandatory clauses the query is missing.
    pub fn set_values(
        query_descriptor: &QueryDescriptor,
        params: &ParamValues,
        evaluator: &dyn NlqParamEvaluator,
    ) -> Result<QueryDescriptor> {
        Self::validate_params(query_descriptor, params)?;
        let altered = Self::alter_query_descriptor(query_descriptor, params, AlterMode::Override)?;

        let inferred: ParamValues = Self::calculate_nlq_params(&altered, evaluator)?
            .into_iter()
            .filter(|(name, _)| !params.contains_key(name))
            .collect();
        let nlq_altered = Self::alter_query_descriptor(&altered, &inferred, AlterMode::FillUnset)?;

        nlq_altered.append_missing_mandatory_clauses()
    }

    /// Reject parameter names no clause declares. Nothing is applied when
    /// any name is unknown.
    pub fn validate_params(query_descriptor: &QueryDescriptor, params: &ParamValues) -> Result<()> {
        let declared: BTreeSet<&str> = query_descriptor
            .clauses()
            .iter()
            .flat_map(|clause| clause.param_names())
            .collect();

        let unknown: Vec<String> = params
            .keys()
            .filter(|name| !declared.contains(name.as_str()))
            .cloned()
            .collect();

        if unknown.is_empty() {
            Ok(())
        } else {
            Err(QueryError::UnknownParameters(unknown))
        }
    }

    fn alter_query_descriptor(
        query_descriptor: &QueryDescriptor,
        params: &ParamValues,
        mode: AlterMode,
    ) -> Result<QueryDescriptor> {
        let mut clauses = query_descriptor.clauses().to_vec();
        let changed: usize = clauses
            .iter_mut()
            .map(|clause| clause.alter(params, mode))
            .sum();
        debug!(?mode, supplied = params.len(), changed, "Altered query parameters");
        query_descriptor.replace_clauses(clauses)
    }

    fn calculate_nlq_params(
        query_descriptor: &QueryDescriptor,
        evaluator: &dyn NlqParamEvaluator,
    ) -> Result<ParamValues> {
        let Some((natural_query, client_config)) = query_descriptor.natural_query()? else {
            return Ok(ParamValues::new());
        };
        let system_prompt = query_descriptor.system_prompt()?;
        let param_infos = query_descriptor.calculate_param_infos();
        evaluator.evaluate_param_infos(&param_infos, natural_query, client_config, system_prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clause::{ClauseKind, FilterOp, NlqClientConfig};
    use crate::nlq::DisabledNlqEvaluator;
    use crate::param::{Param, ParamInfo};
    use embedflow_schema::{FieldKind, SchemaObject};
    use serde_json::{json, Value};
    use std::cell::RefCell;

    /// Returns fixed values and remembers what it was asked.
    struct FakeEvaluator {
        values: ParamValues,
        calls: RefCell<Vec<(String, Option<String>, Vec<String>)>>,
    }

    impl FakeEvaluator {
        fn new(pairs: &[(&str, Value)]) -> Self {
            Self {
                values: params(pairs),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl NlqParamEvaluator for FakeEvaluator {
        fn evaluate_param_infos(
            &self,
            param_infos: &[ParamInfo],
            natural_query: &str,
            _client_config: &NlqClientConfig,
            system_prompt: Option<&str>,
        ) -> Result<ParamValues> {
            self.calls.borrow_mut().push((
                natural_query.to_string(),
                system_prompt.map(str::to_string),
                param_infos.iter().map(|i| i.name.clone()).collect(),
            ));
            Ok(self.values.clone())
        }
    }

    fn params(pairs: &[(&str, Value)]) -> ParamValues {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    fn value_of(descriptor: &QueryDescriptor, name: &str) -> Option<Value> {
        descriptor
            .calculate_value_by_param_name()
            .get(name)
            .cloned()
            .flatten()
    }

    fn query() -> QueryDescriptor {
        let schema = SchemaObject::builder("Product")
            .field("description", FieldKind::String)
            .field("category", FieldKind::String)
            .build()
            .unwrap();
        let description = schema.field("description").unwrap().clone();
        let category = schema.field("category").unwrap().clone();
        QueryDescriptor::new(schema, vec!["text".to_string()])
            .similar("text", &description, Param::new("x"), Param::new("text_weight"))
            .unwrap()
            .filter(
                &category,
                FilterOp::Eq,
                Param::new("category").with_description("one of: shoes, shirts"),
            )
            .unwrap()
    }

    fn nlq_query(text: impl Into<crate::param::ParamInput>) -> QueryDescriptor {
        query()
            .with_natural_query(
                text,
                NlqClientConfig::new("model", "key"),
                Some("answer in json".into()),
            )
            .unwrap()
    }

    #[test]
    fn test_validate_params_names_unknown_keys() {
        let err = QueryParamValueSetter::validate_params(
            &query(),
            &params(&[("x", json!("q")), ("colour", json!("red")), ("brand", json!(1))]),
        )
        .unwrap_err();

        assert_eq!(
            err,
            QueryError::UnknownParameters(vec!["brand".to_string(), "colour".to_string()])
        );
        let message = err.to_string();
        assert!(message.contains("colour"));
        assert!(message.contains("brand"));
    }

    #[test]
    fn test_validate_params_accepts_weight_names() {
        assert!(QueryParamValueSetter::validate_params(
            &query(),
            &params(&[("text_weight", json!(0.5)), ("category", json!("shoes"))])
        )
        .is_ok());
    }

    #[test]
    fn test_unknown_params_abort_before_applying() {
        let original = query();
        let result = QueryParamValueSetter::set_values(
            &original,
            &params(&[("x", json!("q")), ("nope", json!(1))]),
            &DisabledNlqEvaluator,
        );
        assert!(matches!(result, Err(QueryError::UnknownParameters(_))));
        assert_eq!(value_of(&original, "x"), None);
    }

    #[test]
    fn test_set_values_applies_overrides_and_mandatory_clauses() {
        let result = QueryParamValueSetter::set_values(
            &query(),
            &params(&[("x", json!("red shoes")), ("text_weight", json!(0.3))]),
            &DisabledNlqEvaluator,
        )
        .unwrap();

        assert_eq!(value_of(&result, "x"), Some(json!("red shoes")));
        assert_eq!(value_of(&result, "text_weight"), Some(json!(0.3)));
        assert_eq!(value_of(&result, "category"), None);
        assert_eq!(result.get_limit().unwrap(), crate::DEFAULT_LIMIT);
        assert!(result.get_clause_by_kind(ClauseKind::Radius).unwrap().is_some());
    }

    #[test]
    fn test_explicit_value_wins_over_inferred() {
        let evaluator = FakeEvaluator::new(&[("x", json!("inferred")), ("category", json!("shoes"))]);
        let result = QueryParamValueSetter::set_values(
            &nlq_query("something cheap"),
            &params(&[("x", json!("explicit"))]),
            &evaluator,
        )
        .unwrap();

        assert_eq!(value_of(&result, "x"), Some(json!("explicit")));
        assert_eq!(value_of(&result, "category"), Some(json!("shoes")));
    }

    #[test]
    fn test_inferred_values_only_fill_params_the_caller_left_out() {
        let evaluator = FakeEvaluator::new(&[("text_weight", json!(0.1))]);
        let schema = SchemaObject::builder("Product")
            .field("description", FieldKind::String)
            .build()
            .unwrap();
        let description = schema.field("description").unwrap().clone();
        let descriptor = QueryDescriptor::new(schema, vec!["text".to_string()])
            .similar("text", &description, "fixed", Param::new("text_weight"))
            .unwrap()
            .with_natural_query("anything", NlqClientConfig::new("m", "k"), None)
            .unwrap();

        let first = QueryParamValueSetter::set_values(
            &descriptor,
            &params(&[("text_weight", json!(0.9))]),
            &evaluator,
        )
        .unwrap();
        assert_eq!(value_of(&first, "text_weight"), Some(json!(0.9)));

        let second =
            QueryParamValueSetter::set_values(&descriptor, &ParamValues::new(), &evaluator).unwrap();
        assert_eq!(value_of(&second, "text_weight"), Some(json!(0.1)));
    }

    #[test]
    fn test_evaluator_receives_query_prompt_and_params() {
        let evaluator = FakeEvaluator::new(&[]);
        QueryParamValueSetter::set_values(&nlq_query("blue shirts"), &ParamValues::new(), &evaluator)
            .unwrap();

        let calls = evaluator.calls.borrow();
        assert_eq!(calls.len(), 1);
        let (text, prompt, names) = &calls[0];
        assert_eq!(text, "blue shirts");
        assert_eq!(prompt.as_deref(), Some("answer in json"));
        assert_eq!(names, &vec!["category".to_string(), "x".to_string(), "text_weight".to_string()]);
    }

    #[test]
    fn test_natural_query_from_param() {
        let evaluator = FakeEvaluator::new(&[("category", json!("shirts"))]);
        let descriptor = nlq_query(Param::new("natural_query"));

        let without_text =
            QueryParamValueSetter::set_values(&descriptor, &ParamValues::new(), &evaluator).unwrap();
        assert!(evaluator.calls.borrow().is_empty());
        assert_eq!(value_of(&without_text, "category"), None);

        let with_text = QueryParamValueSetter::set_values(
            &descriptor,
            &params(&[("natural_query", json!("shirts please"))]),
            &evaluator,
        )
        .unwrap();
        assert_eq!(evaluator.calls.borrow().len(), 1);
        assert_eq!(value_of(&with_text, "category"), Some(json!("shirts")));
    }

    #[test]
    fn test_disabled_evaluator_fails_when_text_present() {
        let err = QueryParamValueSetter::set_values(
            &nlq_query("anything"),
            &ParamValues::new(),
            &DisabledNlqEvaluator,
        )
        .unwrap_err();
        assert!(matches!(err, QueryError::Nlq(_)));
    }

    #[test]
    fn test_invalid_override_rejected_by_validation() {
        let descriptor = query().radius(Some(Param::new("radius").into())).unwrap();
        let err = QueryParamValueSetter::set_values(
            &descriptor,
            &params(&[("radius", json!(3.0))]),
            &DisabledNlqEvaluator,
        )
        .unwrap_err();
        assert_eq!(err, QueryError::InvalidRadius(3.0));
    }
}
