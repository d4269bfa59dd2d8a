//! Recursive condition expressions.
//!
//! A condition is a named node whose `additional` payload is tagged by
//! `type`. Leaf kinds compare one document field; `boolean` combines an
//! ordered list of children and `not` negates one nested condition.
//!
//! Trees are built and walked with an explicit stack, so a pathological
//! `not(not(not(..)))` input fails with [`ConditionError::TooDeep`] instead
//! of growing the call stack.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Default limit on condition nesting; the root is depth 0.
pub const MAX_CONDITION_DEPTH: usize = 64;

static NO_PAYLOAD: Value = Value::Null;

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

macro_rules! operator_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        /// Case-insensitive, so `STARTS_WITH` and `starts_with` both parse.
        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $(
                    if s.eq_ignore_ascii_case($text) {
                        return Ok(Self::$variant);
                    }
                )+
                Err(format!("unknown operator '{s}'"))
            }
        }
    };
}

operator_enum!(
    /// Comparison applied by a `string` condition.
    StringOperator {
        Is => "is",
        StartsWith => "starts_with",
        EndsWith => "ends_with",
        Contains => "contains",
    }
);

operator_enum!(
    /// Comparison applied by a `number` condition.
    NumberOperator { Gt => "gt", Lt => "lt", Eq => "eq" }
);

operator_enum!(
    /// Comparison applied by a `date` condition.
    DateOperator { Before => "before", After => "after", On => "on" }
);

operator_enum!(
    /// How a `boolean` condition combines its children.
    BooleanOperator { And => "and", Or => "or" }
);

// ---------------------------------------------------------------------------
// Tree
// ---------------------------------------------------------------------------

/// A named condition node. `name` identifies the node when definitions are
/// merged; it is not unique in storage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Condition {
    pub name: String,
    pub additional: ConditionAdditional,
}

/// The `additional` payload: the kind-specific fields plus the ones every
/// kind shares.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionAdditional {
    #[serde(flatten)]
    pub kind: ConditionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ConditionKind {
    String {
        field: String,
        operator: StringOperator,
        value: String,
    },
    Number {
        field: String,
        operator: NumberOperator,
        value: i64,
    },
    Regex {
        field: String,
        value: String,
    },
    Date {
        field: String,
        operator: DateOperator,
        value: String,
    },
    Exists {
        field: String,
    },
    Boolean {
        operator: BooleanOperator,
        children: Vec<Condition>,
    },
    Not {
        condition: Box<Condition>,
    },
}

impl ConditionKind {
    /// The `type` tag this kind serializes with.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String { .. } => "string",
            Self::Number { .. } => "number",
            Self::Regex { .. } => "regex",
            Self::Date { .. } => "date",
            Self::Exists { .. } => "exists",
            Self::Boolean { .. } => "boolean",
            Self::Not { .. } => "not",
        }
    }
}

impl Condition {
    pub fn new(name: impl Into<String>, kind: ConditionKind) -> Self {
        Self {
            name: name.into(),
            additional: ConditionAdditional {
                kind,
                order: None,
                notes: None,
            },
        }
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.additional.order = Some(order);
        self
    }

    pub fn kind(&self) -> &ConditionKind {
        &self.additional.kind
    }

    /// Direct children: the ordered list of a `boolean`, the negated
    /// condition of a `not`, nothing for a leaf.
    pub fn children(&self) -> &[Condition] {
        match &self.additional.kind {
            ConditionKind::Boolean { children, .. } => children,
            ConditionKind::Not { condition } => std::slice::from_ref(&**condition),
            _ => &[],
        }
    }

    /// Pre-order traversal yielding `(depth, node)`, the root at depth 0.
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            stack: vec![(0, self)],
        }
    }

    /// Depth of the deepest node.
    pub fn depth(&self) -> usize {
        self.walk().map(|(depth, _)| depth).max().unwrap_or(0)
    }

    /// Fails with [`ConditionError::TooDeep`] naming the first node found
    /// below `max_depth`.
    pub fn check_depth(&self, max_depth: usize) -> Result<(), ConditionError> {
        match self.walk().find(|(depth, _)| *depth > max_depth) {
            Some((_, node)) => Err(ConditionError::TooDeep {
                name: node.name.clone(),
                max_depth,
            }),
            None => Ok(()),
        }
    }
}

pub struct Walk<'a> {
    stack: Vec<(usize, &'a Condition)>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = (usize, &'a Condition);

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, node) = self.stack.pop()?;
        self.stack
            .extend(node.children().iter().rev().map(|child| (depth + 1, child)));
        Some((depth, node))
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct RawCondition {
            #[serde(default)]
            name: String,
            #[serde(default)]
            additional: Value,
        }

        let raw = RawCondition::deserialize(deserializer)?;
        build_condition(&raw.name, &raw.additional).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    #[error("condition '{name}' has no 'type' in its additional payload")]
    MissingType { name: String },

    #[error("condition '{name}' has unknown type '{kind}'")]
    UnknownType { name: String, kind: String },

    #[error("{kind} condition '{name}' requires '{field}'")]
    MissingField {
        name: String,
        kind: &'static str,
        field: &'static str,
    },

    #[error("condition '{name}' has an invalid '{field}': {message}")]
    InvalidField {
        name: String,
        field: &'static str,
        message: String,
    },

    #[error("condition '{name}' is nested deeper than {max_depth} levels")]
    TooDeep { name: String, max_depth: usize },
}

/// Build a condition from its name and raw `additional` payload, accepting
/// up to [`MAX_CONDITION_DEPTH`] levels of nesting.
pub fn build_condition(name: &str, additional: &Value) -> Result<Condition, ConditionError> {
    build_condition_with_depth(name, additional, MAX_CONDITION_DEPTH)
}

/// Build a condition tree, rejecting any node deeper than `max_depth`.
///
/// Nested conditions inside `children` and `condition` use the same
/// `{ "name": .., "additional": { "type": .. } }` shape as the root.
pub fn build_condition_with_depth(
    name: &str,
    additional: &Value,
    max_depth: usize,
) -> Result<Condition, ConditionError> {
    enum Frame<'a> {
        Visit {
            name: String,
            additional: &'a Value,
            depth: usize,
        },
        Boolean {
            name: String,
            order: Option<i32>,
            notes: Option<String>,
            operator: BooleanOperator,
            arity: usize,
        },
        Not {
            name: String,
            order: Option<i32>,
            notes: Option<String>,
        },
    }

    let mut stack = vec![Frame::Visit {
        name: name.to_string(),
        additional,
        depth: 0,
    }];
    // Finished subtrees, in the order their parents expect them.
    let mut built: Vec<Condition> = Vec::new();

    while let Some(frame) = stack.pop() {
        match frame {
            Frame::Visit {
                name,
                additional,
                depth,
            } => {
                if depth > max_depth {
                    return Err(ConditionError::TooDeep { name, max_depth });
                }
                let payload = Payload::parse(&name, additional)?;
                let order = payload.order(&name)?;
                let notes = payload.notes(&name)?;

                let kind = match payload.kind {
                    "string" => ConditionKind::String {
                        field: payload.string(&name, "field")?,
                        operator: payload.operator(&name)?,
                        value: payload.string(&name, "value")?,
                    },
                    "number" => ConditionKind::Number {
                        field: payload.string(&name, "field")?,
                        operator: payload.operator(&name)?,
                        value: payload.number(&name)?,
                    },
                    "regex" => ConditionKind::Regex {
                        field: payload.string(&name, "field")?,
                        value: payload.string(&name, "value")?,
                    },
                    "date" => ConditionKind::Date {
                        field: payload.string(&name, "field")?,
                        operator: payload.operator(&name)?,
                        value: payload.string(&name, "value")?,
                    },
                    "exists" => ConditionKind::Exists {
                        field: payload.string(&name, "field")?,
                    },
                    "boolean" => {
                        let operator = payload.operator(&name)?;
                        let children = payload.children(&name)?;
                        let mut visits = Vec::with_capacity(children.len());
                        for child in children {
                            let (child_name, child_additional) =
                                payload.nested(&name, child, "children")?;
                            visits.push(Frame::Visit {
                                name: child_name,
                                additional: child_additional,
                                depth: depth + 1,
                            });
                        }
                        stack.push(Frame::Boolean {
                            name,
                            order,
                            notes,
                            operator,
                            arity: visits.len(),
                        });
                        // Reversed so the first child is finished first.
                        stack.extend(visits.into_iter().rev());
                        continue;
                    }
                    "not" => {
                        let nested = payload.required(&name, "condition")?;
                        let (child_name, child_additional) =
                            payload.nested(&name, nested, "condition")?;
                        stack.push(Frame::Not { name, order, notes });
                        stack.push(Frame::Visit {
                            name: child_name,
                            additional: child_additional,
                            depth: depth + 1,
                        });
                        continue;
                    }
                    other => {
                        return Err(ConditionError::UnknownType {
                            name,
                            kind: other.to_string(),
                        })
                    }
                };
                built.push(Condition {
                    name,
                    additional: ConditionAdditional { kind, order, notes },
                });
            }
            Frame::Boolean {
                name,
                order,
                notes,
                operator,
                arity,
            } => {
                let children = built.split_off(built.len().saturating_sub(arity));
                built.push(Condition {
                    name,
                    additional: ConditionAdditional {
                        kind: ConditionKind::Boolean { operator, children },
                        order,
                        notes,
                    },
                });
            }
            Frame::Not { name, order, notes } => {
                let Some(condition) = built.pop() else {
                    return Err(ConditionError::MissingField {
                        name,
                        kind: "not",
                        field: "condition",
                    });
                };
                built.push(Condition {
                    name,
                    additional: ConditionAdditional {
                        kind: ConditionKind::Not {
                            condition: Box::new(condition),
                        },
                        order,
                        notes,
                    },
                });
            }
        }
    }

    built.pop().ok_or_else(|| ConditionError::MissingType {
        name: name.to_string(),
    })
}

/// One `additional` object with its `type` tag already checked.
struct Payload<'a> {
    fields: &'a Map<String, Value>,
    kind: &'static str,
}

impl<'a> Payload<'a> {
    fn parse(name: &str, additional: &'a Value) -> Result<Self, ConditionError> {
        let missing = || ConditionError::MissingType {
            name: name.to_string(),
        };
        let fields = additional.as_object().ok_or_else(missing)?;
        let tag = fields.get("type").and_then(Value::as_str).ok_or_else(missing)?;
        let kind = match tag.to_ascii_lowercase().as_str() {
            "string" => "string",
            "number" => "number",
            "regex" => "regex",
            "date" => "date",
            "exists" => "exists",
            "boolean" => "boolean",
            "not" => "not",
            "" => return Err(missing()),
            _ => {
                return Err(ConditionError::UnknownType {
                    name: name.to_string(),
                    kind: tag.to_string(),
                })
            }
        };
        Ok(Self { fields, kind })
    }

    fn present(&self, field: &str) -> Option<&'a Value> {
        self.fields.get(field).filter(|value| !value.is_null())
    }

    fn required(&self, name: &str, field: &'static str) -> Result<&'a Value, ConditionError> {
        self.present(field).ok_or_else(|| ConditionError::MissingField {
            name: name.to_string(),
            kind: self.kind,
            field,
        })
    }

    fn invalid(&self, name: &str, field: &'static str, message: impl Into<String>) -> ConditionError {
        ConditionError::InvalidField {
            name: name.to_string(),
            field,
            message: message.into(),
        }
    }

    fn string(&self, name: &str, field: &'static str) -> Result<String, ConditionError> {
        match self.required(name, field)? {
            Value::String(value) => Ok(value.clone()),
            other => Err(self.invalid(name, field, format!("expected a string, found {other}"))),
        }
    }

    fn operator<O: FromStr<Err = String>>(&self, name: &str) -> Result<O, ConditionError> {
        self.string(name, "operator")?
            .parse()
            .map_err(|message: String| self.invalid(name, "operator", message))
    }

    /// `number` values keep full 64-bit precision; a decimal string is
    /// accepted as well, a float is not.
    fn number(&self, name: &str) -> Result<i64, ConditionError> {
        match self.required(name, "value")? {
            Value::Number(number) => number
                .as_i64()
                .ok_or_else(|| self.invalid(name, "value", format!("{number} is not a 64-bit integer"))),
            Value::String(text) => text
                .trim()
                .parse()
                .map_err(|_| self.invalid(name, "value", format!("'{text}' is not a 64-bit integer"))),
            other => Err(self.invalid(name, "value", format!("expected an integer, found {other}"))),
        }
    }

    fn order(&self, name: &str) -> Result<Option<i32>, ConditionError> {
        let Some(value) = self.present("order") else {
            return Ok(None);
        };
        value
            .as_i64()
            .and_then(|order| i32::try_from(order).ok())
            .map(Some)
            .ok_or_else(|| self.invalid(name, "order", format!("expected a 32-bit integer, found {value}")))
    }

    fn notes(&self, name: &str) -> Result<Option<String>, ConditionError> {
        match self.present("notes") {
            None => Ok(None),
            Some(Value::String(notes)) => Ok(Some(notes.clone())),
            Some(other) => Err(self.invalid(name, "notes", format!("expected a string, found {other}"))),
        }
    }

    fn children(&self, name: &str) -> Result<&'a Vec<Value>, ConditionError> {
        self.required(name, "children")?
            .as_array()
            .ok_or_else(|| self.invalid(name, "children", "expected an array of conditions"))
    }

    /// Split a nested `{ name, additional }` object.
    fn nested(
        &self,
        name: &str,
        nested: &'a Value,
        field: &'static str,
    ) -> Result<(String, &'a Value), ConditionError> {
        let object = nested
            .as_object()
            .ok_or_else(|| self.invalid(name, field, "expected a condition object"))?;
        let child_name = object
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let child_additional = object.get("additional").unwrap_or(&NO_PAYLOAD);
        Ok((child_name, child_additional))
    }
}
