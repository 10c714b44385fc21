//! Query parameters
//!
//! A [`Param`] is a named placeholder. A [`ClauseParam`] is the slot a
//! clause holds: the placeholder plus the value assigned to it, if any.

use crate::clause::FilterOp;
use embedflow_schema::SchemaField;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Parameter name → value mapping supplied to or derived for a query.
pub type ParamValues = BTreeMap<String, Value>;

/// A named query parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    /// Shown to the natural language evaluator
    #[serde(default)]
    pub description: Option<String>,
    /// Used when no value was assigned
    #[serde(default)]
    pub default: Option<Value>,
}

impl Param {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            default: None,
        }
    }

    /// A parameter with a generated name, for values fixed at declaration time
    pub fn auto() -> Self {
        Self::new(format!("__auto_param_{}__", Uuid::new_v4().simple()))
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// What a builder accepts for a parameter: a placeholder or a fixed value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamInput {
    Param(Param),
    Value(Value),
}

impl From<Param> for ParamInput {
    fn from(param: Param) -> Self {
        ParamInput::Param(param)
    }
}

impl From<Value> for ParamInput {
    fn from(value: Value) -> Self {
        ParamInput::Value(value)
    }
}

impl From<f64> for ParamInput {
    fn from(value: f64) -> Self {
        ParamInput::Value(Value::from(value))
    }
}

impl From<i32> for ParamInput {
    fn from(value: i32) -> Self {
        ParamInput::Value(Value::from(value))
    }
}

impl From<i64> for ParamInput {
    fn from(value: i64) -> Self {
        ParamInput::Value(Value::from(value))
    }
}

impl From<&str> for ParamInput {
    fn from(value: &str) -> Self {
        ParamInput::Value(Value::from(value))
    }
}

impl From<String> for ParamInput {
    fn from(value: String) -> Self {
        ParamInput::Value(Value::from(value))
    }
}

/// How [`ClauseParam::alter`] treats a slot that already holds a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlterMode {
    /// Caller supplied values replace whatever is there
    Override,
    /// Only slots without a value are filled
    FillUnset,
}

/// A parameter slot held by a clause.
#[derive(Debug, Clone, PartialEq)]
pub struct ClauseParam {
    param: Param,
    value: Option<Value>,
}

impl ClauseParam {
    /// A placeholder waiting for a value
    pub fn placeholder(param: Param) -> Self {
        Self { param, value: None }
    }

    /// An auto-named slot that already holds `value`
    pub fn evaluated(value: impl Into<Value>) -> Self {
        Self {
            param: Param::auto(),
            value: Some(value.into()),
        }
    }

    pub fn from_input(input: ParamInput) -> Self {
        match input {
            ParamInput::Param(param) => Self::placeholder(param),
            ParamInput::Value(value) => Self::evaluated(value),
        }
    }

    pub fn name(&self) -> &str {
        &self.param.name
    }

    pub fn param(&self) -> &Param {
        &self.param
    }

    /// The assigned value, if any
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }

    /// The assigned value, falling back to the default
    pub fn evaluate(&self) -> Option<&Value> {
        self.value.as_ref().or(self.param.default.as_ref())
    }

    /// Assign the value `params` holds for this slot's name, if any.
    pub fn alter(&mut self, params: &ParamValues, mode: AlterMode) -> bool {
        let Some(value) = params.get(&self.param.name) else {
            return false;
        };
        if mode == AlterMode::FillUnset && self.value.is_some() {
            return false;
        }
        self.value = Some(value.clone());
        true
    }
}

/// Group a parameter belongs to, as presented to the natural language evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamGroup {
    SpaceWeight,
    HardFilter,
    SimilarFilterValue,
    SimilarFilterWeight,
    LooksLikeFilterValue,
    LooksLikeFilterWeight,
}

/// Description of one query parameter for the natural language evaluator.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamInfo {
    pub name: String,
    pub description: Option<String>,
    pub group: ParamGroup,
    pub value: Option<Value>,
    pub is_weight: bool,
    pub field: Option<SchemaField>,
    pub space: Option<String>,
    pub op: Option<FilterOp>,
}

impl ParamInfo {
    pub(crate) fn from_slot(slot: &ClauseParam, group: ParamGroup) -> Self {
        Self {
            name: slot.name().to_string(),
            description: slot.param().description.clone(),
            group,
            value: slot.evaluate().cloned(),
            is_weight: matches!(
                group,
                ParamGroup::SpaceWeight
                    | ParamGroup::SimilarFilterWeight
                    | ParamGroup::LooksLikeFilterWeight
            ),
            field: None,
            space: None,
            op: None,
        }
    }

    pub(crate) fn with_field(mut self, field: &SchemaField) -> Self {
        self.field = Some(field.clone());
        self
    }

    pub(crate) fn with_space(mut self, space: &str) -> Self {
        self.space = Some(space.to_string());
        self
    }

    pub(crate) fn with_op(mut self, op: FilterOp) -> Self {
        self.op = Some(op);
        self
    }
}
