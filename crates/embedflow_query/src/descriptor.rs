//! Query descriptor
//!
//! Builders append clauses and return a new, validated descriptor. The
//! descriptor itself never changes after construction.

use crate::clause::{ClauseKind, FilterOp, NlqClientConfig, QueryClause};
use crate::error::{QueryError, Result};
use crate::param::{ClauseParam, Param, ParamGroup, ParamInfo, ParamInput};
use embedflow_schema::{FieldKind, SchemaField, SchemaObject};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// Limit used when a query does not set one; -1 means "no limit".
pub const DEFAULT_LIMIT: i64 = -1;
/// Weight of a space that takes part in the query
pub const DEFAULT_WEIGHT: f64 = 1.0;
/// Weight of a space that should not affect the result
pub const DEFAULT_NOT_AFFECTING_WEIGHT: f64 = 0.0;

/// An ordered set of clauses over one schema and an index's spaces.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDescriptor {
    schema: SchemaObject,
    spaces: Vec<String>,
    clauses: Vec<QueryClause>,
}

impl QueryDescriptor {
    pub fn new(schema: SchemaObject, spaces: Vec<String>) -> Self {
        Self {
            schema,
            spaces,
            clauses: Vec::new(),
        }
    }

    pub fn schema(&self) -> &SchemaObject {
        &self.schema
    }

    /// Spaces of the index this query runs against
    pub fn spaces(&self) -> &[String] {
        &self.spaces
    }

    pub fn clauses(&self) -> &[QueryClause] {
        &self.clauses
    }

    // ------------------------------------------------------------------
    // Builders
    // ------------------------------------------------------------------

    /// Compare the query input embedded by `space` against `field`.
    pub fn similar(
        self,
        space: impl Into<String>,
        field: &SchemaField,
        value: impl Into<ParamInput>,
        weight: impl Into<ParamInput>,
    ) -> Result<Self> {
        self.append_clause(QueryClause::Similar {
            space: space.into(),
            field: field.clone(),
            value: ClauseParam::from_input(value.into()),
            weight: ClauseParam::from_input(weight.into()),
        })
    }

    /// Search by the stored vector of the object with the given id.
    pub fn looks_like(
        self,
        id: impl Into<ParamInput>,
        weight: impl Into<ParamInput>,
    ) -> Result<Self> {
        let field = self
            .schema
            .id_field()
            .cloned()
            .ok_or(QueryError::MissingIdField(self.schema.name().to_string()))?;
        self.append_clause(QueryClause::LooksLike {
            field,
            value: ClauseParam::from_input(id.into()),
            weight: ClauseParam::from_input(weight.into()),
        })
    }

    pub fn space_weights<I, S, W>(self, weights: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, W)>,
        S: Into<String>,
        W: Into<ParamInput>,
    {
        let clauses = weights
            .into_iter()
            .map(|(space, weight)| QueryClause::SpaceWeight {
                space: space.into(),
                weight: ClauseParam::from_input(weight.into()),
            })
            .collect();
        self.append_clauses(clauses)
    }

    pub fn filter(
        self,
        field: &SchemaField,
        op: FilterOp,
        value: impl Into<ParamInput>,
    ) -> Result<Self> {
        self.append_clause(QueryClause::HardFilter {
            field: field.clone(),
            op,
            value: ClauseParam::from_input(value.into()),
        })
    }

    /// Cap the number of results; `None` keeps [`DEFAULT_LIMIT`] as default.
    pub fn limit(self, limit: Option<ParamInput>) -> Result<Self> {
        let value = match limit {
            Some(input) => ClauseParam::from_input(input),
            None => ClauseParam::placeholder(Param::auto().with_default(DEFAULT_LIMIT)),
        };
        self.append_clause(QueryClause::Limit { value })
    }

    /// Maximum distance from the query vector, between 0 and 1.
    pub fn radius(self, radius: Option<ParamInput>) -> Result<Self> {
        let value = match radius {
            Some(input) => ClauseParam::from_input(input),
            None => ClauseParam::evaluated(Value::Null),
        };
        self.append_clause(QueryClause::Radius { value })
    }

    pub fn override_now(self, now: impl Into<ParamInput>) -> Result<Self> {
        self.append_clause(QueryClause::OverriddenNow {
            value: ClauseParam::from_input(now.into()),
        })
    }

    /// Let a natural language query fill parameters left without a value.
    pub fn with_natural_query(
        self,
        natural_query: impl Into<ParamInput>,
        client_config: NlqClientConfig,
        system_prompt: Option<ParamInput>,
    ) -> Result<Self> {
        let mut clauses = vec![QueryClause::Nlq {
            value: ClauseParam::from_input(natural_query.into()),
            client_config,
        }];
        if let Some(prompt) = system_prompt {
            clauses.push(QueryClause::NlqSystemPrompt {
                value: ClauseParam::from_input(prompt),
            });
        }
        let descriptor = self.append_clauses(clauses)?;
        descriptor.warn_if_filter_params_lack_description();
        Ok(descriptor)
    }

    /// Same schema and spaces, new clause list.
    pub fn replace_clauses(&self, clauses: Vec<QueryClause>) -> Result<Self> {
        let descriptor = Self {
            schema: self.schema.clone(),
            spaces: self.spaces.clone(),
            clauses,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    fn append_clause(self, clause: QueryClause) -> Result<Self> {
        self.append_clauses(vec![clause])
    }

    fn append_clauses(mut self, clauses: Vec<QueryClause>) -> Result<Self> {
        self.clauses.extend(clauses);
        self.validate()?;
        Ok(self)
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    pub fn get_clauses_by_kind(&self, kind: ClauseKind) -> Vec<&QueryClause> {
        self.clauses.iter().filter(|c| c.kind() == kind).collect()
    }

    /// The single clause of `kind`; more than one is an error.
    pub fn get_clause_by_kind(&self, kind: ClauseKind) -> Result<Option<&QueryClause>> {
        let clauses = self.get_clauses_by_kind(kind);
        match clauses.len() {
            0 => Ok(None),
            1 => Ok(clauses.into_iter().next()),
            count => Err(QueryError::DuplicateClause { kind, count }),
        }
    }

    pub fn get_mandatory_clause_by_kind(&self, kind: ClauseKind) -> Result<&QueryClause> {
        self.get_clause_by_kind(kind)?
            .ok_or(QueryError::MissingClause(kind))
    }

    pub fn get_weighted_clauses(&self) -> Vec<&QueryClause> {
        self.clauses.iter().filter(|c| c.is_weighted()).collect()
    }

    pub fn get_limit(&self) -> Result<i64> {
        let slot = self.get_mandatory_clause_by_kind(ClauseKind::Limit)?.value_param();
        match slot.evaluate() {
            None | Some(Value::Null) => Ok(DEFAULT_LIMIT),
            Some(value) => as_i64(slot.name(), value),
        }
    }

    pub fn get_radius(&self) -> Result<Option<f64>> {
        let slot = self.get_mandatory_clause_by_kind(ClauseKind::Radius)?.value_param();
        optional_f64(slot)
    }

    /// The overridden "now", or `default` when the query does not fix one.
    pub fn get_context_time(&self, default: i64) -> Result<i64> {
        match self.get_clause_by_kind(ClauseKind::OverriddenNow)? {
            Some(clause) => {
                let slot = clause.value_param();
                match slot.evaluate() {
                    Some(value) => as_i64(slot.name(), value),
                    None => Err(QueryError::InvalidParamValue {
                        name: slot.name().to_string(),
                        expected: "int",
                        got: "nothing".to_string(),
                    }),
                }
            }
            None => Ok(default),
        }
    }

    pub fn get_weights_by_space(&self) -> Result<BTreeMap<String, f64>> {
        let mut weights = BTreeMap::new();
        for clause in self.get_clauses_by_kind(ClauseKind::SpaceWeight) {
            if let (Some(space), Some(weight)) = (clause.space(), optional_f64(clause.value_param())?) {
                weights.insert(space.to_string(), weight);
            }
        }
        Ok(weights)
    }

    /// The natural language query text, if a non-empty one is set.
    pub fn natural_query(&self) -> Result<Option<(&str, &NlqClientConfig)>> {
        let Some(QueryClause::Nlq { value, client_config }) = self.get_clause_by_kind(ClauseKind::Nlq)? else {
            return Ok(None);
        };
        Ok(match value.evaluate() {
            Some(Value::String(text)) if !text.trim().is_empty() => Some((text.as_str(), client_config)),
            _ => None,
        })
    }

    pub fn system_prompt(&self) -> Result<Option<&str>> {
        Ok(self
            .get_clause_by_kind(ClauseKind::NlqSystemPrompt)?
            .and_then(|clause| clause.value_param().evaluate())
            .and_then(Value::as_str))
    }

    /// Parameters the natural language evaluator may fill, grouped as it
    /// expects them. Similar filters over Blob fields are left out.
    pub fn calculate_param_infos(&self) -> Vec<ParamInfo> {
        let mut space_weights = Vec::new();
        let mut hard_filters = Vec::new();
        let mut similar_values = Vec::new();
        let mut similar_weights = Vec::new();
        let mut looks_like = Vec::new();

        for clause in &self.clauses {
            match clause {
                QueryClause::SpaceWeight { space, weight } => space_weights
                    .push(ParamInfo::from_slot(weight, ParamGroup::SpaceWeight).with_space(space)),
                QueryClause::HardFilter { field, op, value } => hard_filters.push(
                    ParamInfo::from_slot(value, ParamGroup::HardFilter)
                        .with_field(field)
                        .with_op(*op),
                ),
                QueryClause::Similar {
                    space,
                    field,
                    value,
                    weight,
                } if field.kind() != FieldKind::Blob => {
                    similar_values.push(
                        ParamInfo::from_slot(value, ParamGroup::SimilarFilterValue)
                            .with_field(field)
                            .with_space(space),
                    );
                    similar_weights.push(
                        ParamInfo::from_slot(weight, ParamGroup::SimilarFilterWeight)
                            .with_field(field)
                            .with_space(space),
                    );
                }
                QueryClause::LooksLike {
                    field,
                    value,
                    weight,
                } => {
                    looks_like.push(
                        ParamInfo::from_slot(value, ParamGroup::LooksLikeFilterValue)
                            .with_field(field),
                    );
                    looks_like.push(
                        ParamInfo::from_slot(weight, ParamGroup::LooksLikeFilterWeight)
                            .with_field(field),
                    );
                }
                _ => {}
            }
        }

        [space_weights, hard_filters, similar_values, similar_weights, looks_like]
            .into_iter()
            .flatten()
            .collect()
    }

    /// Current value (or default) of every declared parameter by name.
    pub fn calculate_value_by_param_name(&self) -> BTreeMap<String, Option<Value>> {
        let mut values = BTreeMap::new();
        for clause in &self.clauses {
            let value = clause.value_param();
            values.insert(value.name().to_string(), value.evaluate().cloned());
        }
        for clause in self.get_weighted_clauses() {
            if let Some(weight) = clause.weight_param() {
                values.insert(weight.name().to_string(), weight.evaluate().cloned());
            }
        }
        values
    }

    /// Append a limit, a radius and a weight for every space that lacks one.
    pub fn append_missing_mandatory_clauses(self) -> Result<Self> {
        let mut clauses = Vec::new();
        if self.get_clause_by_kind(ClauseKind::Limit)?.is_none() {
            clauses.push(QueryClause::Limit {
                value: ClauseParam::evaluated(DEFAULT_LIMIT),
            });
        }
        if self.get_clause_by_kind(ClauseKind::Radius)?.is_none() {
            clauses.push(QueryClause::Radius {
                value: ClauseParam::evaluated(Value::Null),
            });
        }
        for (space, weight) in self.calculate_weight_by_missing_space()? {
            clauses.push(QueryClause::SpaceWeight {
                space,
                weight: ClauseParam::evaluated(weight),
            });
        }
        self.append_clauses(clauses)
    }

    fn calculate_weight_by_missing_space(&self) -> Result<Vec<(String, f64)>> {
        let weighted: BTreeSet<&str> = self
            .get_clauses_by_kind(ClauseKind::SpaceWeight)
            .into_iter()
            .filter_map(QueryClause::space)
            .collect();
        let missing = self
            .spaces
            .iter()
            .filter(|space| !weighted.contains(space.as_str()));

        let has_looks_like = self
            .get_clause_by_kind(ClauseKind::LooksLike)?
            .is_some_and(|clause| has_value(clause.value_param()));
        let similar_spaces: BTreeSet<&str> = self
            .get_clauses_by_kind(ClauseKind::Similar)
            .into_iter()
            .filter(|clause| has_value(clause.value_param()))
            .filter_map(QueryClause::space)
            .collect();

        Ok(missing
            .map(|space| {
                let weight = if has_looks_like || similar_spaces.contains(space.as_str()) {
                    DEFAULT_WEIGHT
                } else {
                    DEFAULT_NOT_AFFECTING_WEIGHT
                };
                (space.clone(), weight)
            })
            .collect())
    }

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------

    pub fn validate(&self) -> Result<()> {
        for kind in ClauseKind::SINGLETONS {
            self.get_clause_by_kind(kind)?;
        }

        let mut weighted_spaces = BTreeSet::new();
        for clause in &self.clauses {
            if let Some(space) = clause.space() {
                if !self.spaces.iter().any(|s| s == space) {
                    return Err(QueryError::UnknownSpace(space.to_string()));
                }
                if clause.kind() == ClauseKind::SpaceWeight && !weighted_spaces.insert(space) {
                    return Err(QueryError::DuplicateSpaceWeight(space.to_string()));
                }
            }
            if let Some(field) = clause.field() {
                if !self.schema.owns(field) {
                    return Err(QueryError::ForeignField {
                        field: field.name().to_string(),
                        schema: self.schema.name().to_string(),
                    });
                }
            }
            if let Some(weight) = clause.weight_param() {
                optional_f64(weight)?;
            }
            if clause.kind() == ClauseKind::SpaceWeight {
                optional_f64(clause.value_param())?;
            }
        }

        if let Some(clause) = self.get_clause_by_kind(ClauseKind::Radius)? {
            if let Some(radius) = optional_f64(clause.value_param())? {
                if !(0.0..=1.0).contains(&radius) {
                    return Err(QueryError::InvalidRadius(radius));
                }
            }
        }

        if let Some(clause) = self.get_clause_by_kind(ClauseKind::Limit)? {
            let slot = clause.value_param();
            if let Some(value) = slot.evaluate().filter(|v| !v.is_null()) {
                let limit = as_i64(slot.name(), value)?;
                if limit < DEFAULT_LIMIT {
                    return Err(QueryError::InvalidLimit(limit));
                }
            }
        }

        Ok(())
    }

    fn warn_if_filter_params_lack_description(&self) {
        let affected: Vec<&str> = self
            .get_clauses_by_kind(ClauseKind::HardFilter)
            .into_iter()
            .filter_map(|clause| {
                let field = clause.field()?;
                let slot = clause.value_param();
                let textual = matches!(field.kind(), FieldKind::String | FieldKind::StringList);
                (textual && !slot.is_set() && slot.param().description.is_none())
                    .then(|| slot.name())
            })
            .collect();
        if !affected.is_empty() {
            warn!(
                params = %affected.join(", "),
                "Natural query is used with text filter params that have no description; describe the possible values so they can be inferred"
            );
        }
    }
}

fn has_value(slot: &ClauseParam) -> bool {
    slot.evaluate().is_some_and(|v| !v.is_null())
}

fn as_i64(name: &str, value: &Value) -> Result<i64> {
    value.as_i64().ok_or_else(|| QueryError::InvalidParamValue {
        name: name.to_string(),
        expected: "int",
        got: value.to_string(),
    })
}

fn optional_f64(slot: &ClauseParam) -> Result<Option<f64>> {
    match slot.evaluate() {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_f64()
            .map(Some)
            .ok_or_else(|| QueryError::InvalidParamValue {
                name: slot.name().to_string(),
                expected: "number",
                got: value.to_string(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> SchemaObject {
        SchemaObject::builder("Product")
            .id_field("id")
            .field("description", FieldKind::String)
            .field("image", FieldKind::Blob)
            .field("category", FieldKind::String)
            .field("price", FieldKind::Float)
            .build()
            .unwrap()
    }

    fn descriptor() -> QueryDescriptor {
        QueryDescriptor::new(schema(), vec!["text".to_string(), "image".to_string()])
    }

    #[test]
    fn test_builders_append_in_order() {
        let base = descriptor();
        let description = base.schema().field("description").unwrap().clone();
        let query = base
            .similar("text", &description, Param::new("query_text"), 1.0)
            .unwrap()
            .limit(Some(10.into()))
            .unwrap();

        let kinds: Vec<_> = query.clauses().iter().map(QueryClause::kind).collect();
        assert_eq!(kinds, vec![ClauseKind::Similar, ClauseKind::Limit]);
        assert_eq!(query.get_limit().unwrap(), 10);
    }

    #[test]
    fn test_duplicate_limit_rejected() {
        let err = descriptor()
            .limit(Some(5.into()))
            .unwrap()
            .limit(Some(6.into()))
            .unwrap_err();
        assert_eq!(
            err,
            QueryError::DuplicateClause {
                kind: ClauseKind::Limit,
                count: 2
            }
        );
        assert_eq!(
            err.to_string(),
            "Query cannot have more than one LimitClause, got 2."
        );
    }

    #[test]
    fn test_radius_range() {
        assert_eq!(
            descriptor().radius(Some(1.5.into())).unwrap_err(),
            QueryError::InvalidRadius(1.5)
        );
        let query = descriptor().radius(Some(0.05.into())).unwrap();
        assert_eq!(query.get_radius().unwrap(), Some(0.05));
    }

    #[test]
    fn test_unknown_space_rejected() {
        let base = descriptor();
        let description = base.schema().field("description").unwrap().clone();
        let err = base.similar("audio", &description, "hi", 1.0).unwrap_err();
        assert_eq!(err, QueryError::UnknownSpace("audio".to_string()));
    }

    #[test]
    fn test_foreign_field_rejected() {
        let other = schema();
        let err = descriptor()
            .filter(other.field("category").unwrap(), FilterOp::Eq, "shoes")
            .unwrap_err();
        assert!(matches!(err, QueryError::ForeignField { .. }));
    }

    #[test]
    fn test_looks_like_requires_id_field() {
        let no_id = SchemaObject::builder("Plain")
            .field("body", FieldKind::String)
            .build()
            .unwrap();
        let err = QueryDescriptor::new(no_id, vec![])
            .looks_like("obj-1", 1.0)
            .unwrap_err();
        assert_eq!(err, QueryError::MissingIdField("Plain".to_string()));
    }

    #[test]
    fn test_mandatory_clauses_appended() {
        let base = descriptor();
        let description = base.schema().field("description").unwrap().clone();
        let query = base
            .similar("text", &description, "red shoes", 1.0)
            .unwrap()
            .append_missing_mandatory_clauses()
            .unwrap();

        assert_eq!(query.get_limit().unwrap(), DEFAULT_LIMIT);
        assert_eq!(query.get_radius().unwrap(), None);
        let weights = query.get_weights_by_space().unwrap();
        assert_eq!(weights.get("text"), Some(&DEFAULT_WEIGHT));
        assert_eq!(weights.get("image"), Some(&DEFAULT_NOT_AFFECTING_WEIGHT));
    }

    #[test]
    fn test_mandatory_clauses_keep_existing() {
        let query = descriptor()
            .limit(Some(3.into()))
            .unwrap()
            .space_weights([("image", 0.4)])
            .unwrap()
            .append_missing_mandatory_clauses()
            .unwrap();

        assert_eq!(query.get_clauses_by_kind(ClauseKind::Limit).len(), 1);
        assert_eq!(query.get_limit().unwrap(), 3);
        let weights = query.get_weights_by_space().unwrap();
        assert_eq!(weights.get("image"), Some(&0.4));
        assert_eq!(weights.get("text"), Some(&DEFAULT_NOT_AFFECTING_WEIGHT));
    }

    #[test]
    fn test_looks_like_gives_every_space_full_weight() {
        let query = descriptor()
            .looks_like("product-1", 1.0)
            .unwrap()
            .append_missing_mandatory_clauses()
            .unwrap();
        let weights = query.get_weights_by_space().unwrap();
        assert_eq!(weights.get("text"), Some(&DEFAULT_WEIGHT));
        assert_eq!(weights.get("image"), Some(&DEFAULT_WEIGHT));
    }

    #[test]
    fn test_param_infos_skip_blob_similar() {
        let base = descriptor();
        let image = base.schema().field("image").unwrap().clone();
        let description = base.schema().field("description").unwrap().clone();
        let category = base.schema().field("category").unwrap().clone();
        let query = base
            .similar("image", &image, Param::new("image_query"), 1.0)
            .unwrap()
            .similar("text", &description, Param::new("text_query"), Param::new("text_weight"))
            .unwrap()
            .filter(&category, FilterOp::Eq, Param::new("category"))
            .unwrap()
            .space_weights([("text", Param::new("text_space_weight"))])
            .unwrap();

        let infos = query.calculate_param_infos();
        let names: Vec<_> = infos.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["text_space_weight", "category", "text_query", "text_weight"]
        );
        assert!(infos[0].is_weight);
        assert_eq!(infos[1].op, Some(FilterOp::Eq));
        assert_eq!(infos[2].group, ParamGroup::SimilarFilterValue);
        assert_eq!(infos[3].space.as_deref(), Some("text"));
    }

    #[test]
    fn test_value_by_param_name() {
        let base = descriptor();
        let description = base.schema().field("description").unwrap().clone();
        let query = base
            .similar(
                "text",
                &description,
                Param::new("text_query"),
                Param::new("text_weight").with_default(0.5),
            )
            .unwrap();
        let values = query.calculate_value_by_param_name();
        assert_eq!(values.get("text_query"), Some(&None));
        assert_eq!(values.get("text_weight"), Some(&Some(json!(0.5))));
    }

    #[test]
    fn test_context_time() {
        assert_eq!(descriptor().get_context_time(42).unwrap(), 42);
        let query = descriptor().override_now(1_700_000_000i64).unwrap();
        assert_eq!(query.get_context_time(42).unwrap(), 1_700_000_000);
    }

    #[test]
    fn test_natural_query_requires_text() {
        let config = NlqClientConfig::new("model", "key");
        let empty = descriptor()
            .with_natural_query("  ", config.clone(), None)
            .unwrap();
        assert_eq!(empty.natural_query().unwrap(), None);

        let query = descriptor()
            .with_natural_query("cheap shoes", config, Some("be terse".into()))
            .unwrap();
        let (text, _) = query.natural_query().unwrap().unwrap();
        assert_eq!(text, "cheap shoes");
        assert_eq!(query.system_prompt().unwrap(), Some("be terse"));
    }

    #[test]
    fn test_non_numeric_weight_rejected() {
        let base = descriptor();
        let description = base.schema().field("description").unwrap().clone();
        let err = base.similar("text", &description, "q", "heavy").unwrap_err();
        assert!(matches!(
            err,
            QueryError::InvalidParamValue { expected: "number", .. }
        ));
    }
}
