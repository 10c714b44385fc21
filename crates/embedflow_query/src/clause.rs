//! Query clauses
//!
//! Every clause holds one value parameter. Weighted clauses (similar and
//! looks-like filters) also hold a weight parameter.

use crate::param::{AlterMode, ClauseParam, ParamValues};
use embedflow_schema::SchemaField;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison used by a hard filter clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    NotEq,
    Gt,
    Ge,
    Lt,
    Le,
    In,
    NotIn,
    Contains,
    NotContains,
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            FilterOp::Eq => "==",
            FilterOp::NotEq => "!=",
            FilterOp::Gt => ">",
            FilterOp::Ge => ">=",
            FilterOp::Lt => "<",
            FilterOp::Le => "<=",
            FilterOp::In => "in",
            FilterOp::NotIn => "not in",
            FilterOp::Contains => "contains",
            FilterOp::NotContains => "not contains",
        };
        f.write_str(op)
    }
}

/// Client settings handed to the natural language evaluator.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NlqClientConfig {
    pub model: String,
    pub api_key: String,
}

impl NlqClientConfig {
    pub fn new(model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_key: api_key.into(),
        }
    }
}

impl fmt::Debug for NlqClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NlqClientConfig")
            .field("model", &self.model)
            .field("api_key", &"***")
            .finish()
    }
}

/// Discriminant of [`QueryClause`], used for lookups by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClauseKind {
    Similar,
    LooksLike,
    SpaceWeight,
    HardFilter,
    Limit,
    Radius,
    OverriddenNow,
    Nlq,
    NlqSystemPrompt,
}

impl ClauseKind {
    /// Kinds a query may hold at most once
    pub const SINGLETONS: [ClauseKind; 6] = [
        ClauseKind::LooksLike,
        ClauseKind::Limit,
        ClauseKind::Radius,
        ClauseKind::OverriddenNow,
        ClauseKind::Nlq,
        ClauseKind::NlqSystemPrompt,
    ];
}

impl fmt::Display for ClauseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClauseKind::Similar => "SimilarFilterClause",
            ClauseKind::LooksLike => "LooksLikeFilterClause",
            ClauseKind::SpaceWeight => "SpaceWeightClause",
            ClauseKind::HardFilter => "HardFilterClause",
            ClauseKind::Limit => "LimitClause",
            ClauseKind::Radius => "RadiusClause",
            ClauseKind::OverriddenNow => "OverriddenNowClause",
            ClauseKind::Nlq => "NLQClause",
            ClauseKind::NlqSystemPrompt => "NLQSystemPromptClause",
        };
        f.write_str(name)
    }
}

/// One configurable unit of a query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryClause {
    /// Query input embedded in `space` through `field`
    Similar {
        space: String,
        field: SchemaField,
        value: ClauseParam,
        weight: ClauseParam,
    },
    /// Search by the stored vector of an object id
    LooksLike {
        field: SchemaField,
        value: ClauseParam,
        weight: ClauseParam,
    },
    SpaceWeight {
        space: String,
        weight: ClauseParam,
    },
    HardFilter {
        field: SchemaField,
        op: FilterOp,
        value: ClauseParam,
    },
    Limit {
        value: ClauseParam,
    },
    Radius {
        value: ClauseParam,
    },
    /// Fixes "now" for recency calculations
    OverriddenNow {
        value: ClauseParam,
    },
    Nlq {
        value: ClauseParam,
        client_config: NlqClientConfig,
    },
    NlqSystemPrompt {
        value: ClauseParam,
    },
}

impl QueryClause {
    pub fn kind(&self) -> ClauseKind {
        match self {
            QueryClause::Similar { .. } => ClauseKind::Similar,
            QueryClause::LooksLike { .. } => ClauseKind::LooksLike,
            QueryClause::SpaceWeight { .. } => ClauseKind::SpaceWeight,
            QueryClause::HardFilter { .. } => ClauseKind::HardFilter,
            QueryClause::Limit { .. } => ClauseKind::Limit,
            QueryClause::Radius { .. } => ClauseKind::Radius,
            QueryClause::OverriddenNow { .. } => ClauseKind::OverriddenNow,
            QueryClause::Nlq { .. } => ClauseKind::Nlq,
            QueryClause::NlqSystemPrompt { .. } => ClauseKind::NlqSystemPrompt,
        }
    }

    pub fn is_weighted(&self) -> bool {
        self.weight_param().is_some()
    }

    /// The value slot. For a space weight clause this is the weight itself.
    pub fn value_param(&self) -> &ClauseParam {
        match self {
            QueryClause::Similar { value, .. }
            | QueryClause::LooksLike { value, .. }
            | QueryClause::HardFilter { value, .. }
            | QueryClause::Limit { value }
            | QueryClause::Radius { value }
            | QueryClause::OverriddenNow { value }
            | QueryClause::Nlq { value, .. }
            | QueryClause::NlqSystemPrompt { value } => value,
            QueryClause::SpaceWeight { weight, .. } => weight,
        }
    }

    fn value_param_mut(&mut self) -> &mut ClauseParam {
        match self {
            QueryClause::Similar { value, .. }
            | QueryClause::LooksLike { value, .. }
            | QueryClause::HardFilter { value, .. }
            | QueryClause::Limit { value }
            | QueryClause::Radius { value }
            | QueryClause::OverriddenNow { value }
            | QueryClause::Nlq { value, .. }
            | QueryClause::NlqSystemPrompt { value } => value,
            QueryClause::SpaceWeight { weight, .. } => weight,
        }
    }

    /// The weight slot of weighted clauses
    pub fn weight_param(&self) -> Option<&ClauseParam> {
        match self {
            QueryClause::Similar { weight, .. } | QueryClause::LooksLike { weight, .. } => {
                Some(weight)
            }
            _ => None,
        }
    }

    fn weight_param_mut(&mut self) -> Option<&mut ClauseParam> {
        match self {
            QueryClause::Similar { weight, .. } | QueryClause::LooksLike { weight, .. } => {
                Some(weight)
            }
            _ => None,
        }
    }

    /// Names of every parameter this clause declares
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.value_param().name())
            .chain(self.weight_param().map(ClauseParam::name))
    }

    /// Apply `params` to the value slot, then to the weight slot.
    /// Returns how many slots changed.
    pub fn alter(&mut self, params: &ParamValues, mode: AlterMode) -> usize {
        let mut changed = usize::from(self.value_param_mut().alter(params, mode));
        if let Some(weight) = self.weight_param_mut() {
            changed += usize::from(weight.alter(params, mode));
        }
        changed
    }

    /// The schema field the clause refers to, if any
    pub fn field(&self) -> Option<&SchemaField> {
        match self {
            QueryClause::Similar { field, .. }
            | QueryClause::LooksLike { field, .. }
            | QueryClause::HardFilter { field, .. } => Some(field),
            _ => None,
        }
    }

    /// The index space the clause refers to, if any
    pub fn space(&self) -> Option<&str> {
        match self {
            QueryClause::Similar { space, .. } | QueryClause::SpaceWeight { space, .. } => {
                Some(space)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::Param;
    use embedflow_schema::{FieldKind, SchemaObject};
    use serde_json::json;

    fn similar_clause() -> QueryClause {
        let schema = SchemaObject::builder("Paragraph")
            .field("body", FieldKind::String)
            .build()
            .unwrap();
        QueryClause::Similar {
            space: "text".to_string(),
            field: schema.field("body").unwrap().clone(),
            value: ClauseParam::placeholder(Param::new("query_text")),
            weight: ClauseParam::placeholder(Param::new("text_weight")),
        }
    }

    #[test]
    fn test_weighted_clauses() {
        assert!(similar_clause().is_weighted());
        let limit = QueryClause::Limit {
            value: ClauseParam::evaluated(5),
        };
        assert!(!limit.is_weighted());
        assert_eq!(limit.kind(), ClauseKind::Limit);
    }

    #[test]
    fn test_param_names() {
        let clause = similar_clause();
        let names: Vec<_> = clause.param_names().collect();
        assert_eq!(names, vec!["query_text", "text_weight"]);
    }

    #[test]
    fn test_alter_value_and_weight() {
        let mut clause = similar_clause();
        let params: ParamValues = [
            ("query_text".to_string(), json!("red shoes")),
            ("text_weight".to_string(), json!(0.7)),
        ]
        .into_iter()
        .collect();

        assert_eq!(clause.alter(&params, AlterMode::Override), 2);
        assert_eq!(clause.value_param().value(), Some(&json!("red shoes")));
        assert_eq!(clause.weight_param().unwrap().value(), Some(&json!(0.7)));
    }

    #[test]
    fn test_space_weight_value_is_weight() {
        let clause = QueryClause::SpaceWeight {
            space: "text".to_string(),
            weight: ClauseParam::placeholder(Param::new("w")),
        };
        assert_eq!(clause.value_param().name(), "w");
        assert!(clause.weight_param().is_none());
        assert_eq!(clause.space(), Some("text"));
    }

    #[test]
    fn test_client_config_debug_hides_key() {
        let config = NlqClientConfig::new("gpt-4o", "sk-secret");
        let debug = format!("{config:?}");
        assert!(debug.contains("gpt-4o"));
        assert!(!debug.contains("sk-secret"));
    }
}
