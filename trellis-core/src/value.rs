//! Plug Values
//!
//! Plugs hold values from a closed set of types. Leaf types store a value
//! directly; compound types (`V2i`, `V3f`, `Color3f`, `Compound`) are made
//! of child plugs and their value is assembled from those children.

use std::fmt;
use std::mem::size_of;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::error::{Error, Result};
use crate::hash::{HashAppend, Hasher};

/// The type of a plug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Bool,
    Int,
    Float,
    String,
    IntVector,
    FloatVector,
    StringVector,
    V2i,
    V3f,
    Color3f,
    Compound,
}

impl ValueType {
    pub const ALL: [ValueType; 11] = [
        ValueType::Bool,
        ValueType::Int,
        ValueType::Float,
        ValueType::String,
        ValueType::IntVector,
        ValueType::FloatVector,
        ValueType::StringVector,
        ValueType::V2i,
        ValueType::V3f,
        ValueType::Color3f,
        ValueType::Compound,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ValueType::Bool => "Bool",
            ValueType::Int => "Int",
            ValueType::Float => "Float",
            ValueType::String => "String",
            ValueType::IntVector => "IntVector",
            ValueType::FloatVector => "FloatVector",
            ValueType::StringVector => "StringVector",
            ValueType::V2i => "V2i",
            ValueType::V3f => "V3f",
            ValueType::Color3f => "Color3f",
            ValueType::Compound => "Compound",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.name() == name)
    }

    /// Compound types have child plugs instead of a stored value.
    pub fn is_compound(&self) -> bool {
        matches!(
            self,
            ValueType::V2i | ValueType::V3f | ValueType::Color3f | ValueType::Compound
        )
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ValueType::Bool | ValueType::Int | ValueType::Float)
    }

    /// The fixed children created along with a typed compound.
    pub fn component_layout(&self) -> &'static [(&'static str, ValueType)] {
        match self {
            ValueType::V2i => &[("x", ValueType::Int), ("y", ValueType::Int)],
            ValueType::V3f => &[
                ("x", ValueType::Float),
                ("y", ValueType::Float),
                ("z", ValueType::Float),
            ],
            ValueType::Color3f => &[
                ("r", ValueType::Float),
                ("g", ValueType::Float),
                ("b", ValueType::Float),
            ],
            _ => &[],
        }
    }

    /// Whether a plug of this type may take an input of type `input`.
    pub fn accepts(&self, input: ValueType) -> bool {
        *self == input || (self.is_numeric() && input.is_numeric())
    }

    /// The zero value for leaf types.
    pub fn zero(&self) -> Option<Value> {
        Some(match self {
            ValueType::Bool => Value::Bool(false),
            ValueType::Int => Value::Int(0),
            ValueType::Float => Value::Float(0.0),
            ValueType::String => Value::String(String::new()),
            ValueType::IntVector => Value::IntVector(Vec::new()),
            ValueType::FloatVector => Value::FloatVector(Vec::new()),
            ValueType::StringVector => Value::StringVector(Vec::new()),
            _ => return None,
        })
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A plug value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    IntVector(Vec<i64>),
    FloatVector(Vec<f64>),
    StringVector(Vec<String>),
    V2i([i64; 2]),
    V3f([f64; 3]),
    Color3f([f64; 3]),
    Compound(Vec<Value>),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::String(_) => ValueType::String,
            Value::IntVector(_) => ValueType::IntVector,
            Value::FloatVector(_) => ValueType::FloatVector,
            Value::StringVector(_) => ValueType::StringVector,
            Value::V2i(_) => ValueType::V2i,
            Value::V3f(_) => ValueType::V3f,
            Value::Color3f(_) => ValueType::Color3f,
            Value::Compound(_) => ValueType::Compound,
        }
    }

    /// Approximate heap plus inline footprint, used as the cache cost.
    pub fn memory_usage(&self) -> usize {
        let heap = match self {
            Value::String(s) => s.capacity(),
            Value::IntVector(v) => v.capacity() * size_of::<i64>(),
            Value::FloatVector(v) => v.capacity() * size_of::<f64>(),
            Value::StringVector(v) => v
                .iter()
                .map(|s| s.capacity() + size_of::<String>())
                .sum(),
            Value::Compound(v) => v.iter().map(Value::memory_usage).sum(),
            _ => 0,
        };
        size_of::<Value>() + heap
    }

    /// Convert to `target`, allowing numeric coercion.
    pub fn convert(&self, target: ValueType) -> Option<Value> {
        if self.value_type() == target {
            return Some(self.clone());
        }
        let f = match self {
            Value::Bool(b) => *b as i64 as f64,
            Value::Int(i) => *i as f64,
            Value::Float(f) => *f,
            _ => return None,
        };
        match target {
            ValueType::Bool => Some(Value::Bool(f != 0.0)),
            ValueType::Int => Some(Value::Int(match self {
                Value::Int(i) => *i,
                _ => f as i64,
            })),
            ValueType::Float => Some(Value::Float(f)),
            _ => None,
        }
    }

    /// Split a compound value into per-child values.
    pub fn components(&self) -> Option<Vec<Value>> {
        match self {
            Value::V2i(v) => Some(v.iter().map(|c| Value::Int(*c)).collect()),
            Value::V3f(v) | Value::Color3f(v) => {
                Some(v.iter().map(|c| Value::Float(*c)).collect())
            }
            Value::Compound(v) => Some(v.clone()),
            _ => None,
        }
    }

    /// Assemble a compound value from per-child values.
    pub fn from_components(value_type: ValueType, parts: Vec<Value>) -> Result<Value> {
        let count = parts.len();
        let mismatch = move || Error::TypeMismatch {
            target: value_type.name().to_string(),
            expected: format!("{} components", value_type.component_layout().len()),
            actual: format!("{count} components"),
        };
        match value_type {
            ValueType::V2i => {
                let v: Vec<i64> = parts.iter().filter_map(Value::as_int).collect();
                if v.len() != 2 || parts.len() != 2 {
                    return Err(mismatch());
                }
                Ok(Value::V2i([v[0], v[1]]))
            }
            ValueType::V3f | ValueType::Color3f => {
                let v: Vec<f64> = parts.iter().filter_map(Value::as_float).collect();
                if v.len() != 3 || parts.len() != 3 {
                    return Err(mismatch());
                }
                let arr = [v[0], v[1], v[2]];
                Ok(if value_type == ValueType::V3f {
                    Value::V3f(arr)
                } else {
                    Value::Color3f(arr)
                })
            }
            ValueType::Compound => Ok(Value::Compound(parts)),
            other => Err(Error::TypeMismatch {
                target: other.name().to_string(),
                expected: "compound type".to_string(),
                actual: other.name().to_string(),
            }),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// JSON literal form used by serialised scripts.
    pub fn to_json(&self) -> Json {
        match self {
            Value::Bool(b) => Json::from(*b),
            Value::Int(i) => Json::from(*i),
            Value::Float(f) => float_to_json(*f),
            Value::String(s) => Json::from(s.clone()),
            Value::IntVector(v) => Json::from(v.clone()),
            Value::FloatVector(v) => Json::Array(v.iter().copied().map(float_to_json).collect()),
            Value::StringVector(v) => Json::from(v.clone()),
            Value::V2i(v) => Json::from(v.to_vec()),
            Value::V3f(v) | Value::Color3f(v) => {
                Json::Array(v.iter().copied().map(float_to_json).collect())
            }
            Value::Compound(v) => Json::Array(v.iter().map(Value::to_json).collect()),
        }
    }

    /// Parse a JSON literal as a value of `value_type`.
    pub fn from_json(value_type: ValueType, json: &Json) -> Result<Value> {
        let bad = || {
            Error::Json(format!(
                "cannot read {} from {}",
                value_type.name(),
                json
            ))
        };
        let ints = |j: &Json| -> Option<Vec<i64>> {
            j.as_array()?.iter().map(Json::as_i64).collect()
        };
        let floats = |j: &Json| -> Option<Vec<f64>> {
            j.as_array()?.iter().map(float_from_json).collect()
        };
        Ok(match value_type {
            ValueType::Bool => Value::Bool(json.as_bool().ok_or_else(bad)?),
            ValueType::Int => Value::Int(json.as_i64().ok_or_else(bad)?),
            ValueType::Float => Value::Float(float_from_json(json).ok_or_else(bad)?),
            ValueType::String => Value::String(json.as_str().ok_or_else(bad)?.to_string()),
            ValueType::IntVector => Value::IntVector(ints(json).ok_or_else(bad)?),
            ValueType::FloatVector => Value::FloatVector(floats(json).ok_or_else(bad)?),
            ValueType::StringVector => Value::StringVector(
                json.as_array()
                    .and_then(|a| {
                        a.iter()
                            .map(|s| s.as_str().map(str::to_string))
                            .collect::<Option<Vec<_>>>()
                    })
                    .ok_or_else(bad)?,
            ),
            ValueType::V2i => {
                let v = ints(json).filter(|v| v.len() == 2).ok_or_else(bad)?;
                Value::V2i([v[0], v[1]])
            }
            ValueType::V3f | ValueType::Color3f => {
                let v = floats(json).filter(|v| v.len() == 3).ok_or_else(bad)?;
                let arr = [v[0], v[1], v[2]];
                if value_type == ValueType::V3f {
                    Value::V3f(arr)
                } else {
                    Value::Color3f(arr)
                }
            }
            ValueType::Compound => return Err(bad()),
        })
    }
}

impl HashAppend for Value {
    fn append_to(&self, h: &mut Hasher) {
        h.append_str(self.value_type().name());
        match self {
            Value::Bool(b) => {
                h.append_bool(*b);
            }
            Value::Int(i) => {
                h.append_i64(*i);
            }
            Value::Float(f) => {
                h.append_f64(*f);
            }
            Value::String(s) => {
                h.append_str(s);
            }
            Value::IntVector(v) => {
                h.append_u64(v.len() as u64);
                v.iter().for_each(|i| {
                    h.append_i64(*i);
                });
            }
            Value::FloatVector(v) => {
                h.append_u64(v.len() as u64);
                v.iter().for_each(|f| {
                    h.append_f64(*f);
                });
            }
            Value::StringVector(v) => {
                h.append_u64(v.len() as u64);
                v.iter().for_each(|s| {
                    h.append_str(s);
                });
            }
            Value::V2i(v) => {
                h.append_i64(v[0]).append_i64(v[1]);
            }
            Value::V3f(v) | Value::Color3f(v) => {
                h.append_f64(v[0]).append_f64(v[1]).append_f64(v[2]);
            }
            Value::Compound(v) => {
                h.append_u64(v.len() as u64);
                v.iter().for_each(|c| c.append_to(h));
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

/// Extraction of native Rust values, used by typed getters.
pub trait FromValue: Sized {
    const TYPE: ValueType;
    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! value_conversions {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant(v)
                }
            }

            impl FromValue for $t {
                const TYPE: ValueType = ValueType::$variant;
                fn from_value(value: &Value) -> Option<Self> {
                    match value.convert(ValueType::$variant)? {
                        Value::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            }
        )*
    };
}

value_conversions! {
    bool => Bool,
    i64 => Int,
    f64 => Float,
    String => String,
    Vec<i64> => IntVector,
    Vec<f64> => FloatVector,
    Vec<String> => StringVector,
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

/// JSON has no literals for NaN or the infinities, so those are written as
/// strings.
fn float_to_json(f: f64) -> Json {
    if f.is_nan() {
        Json::from("nan")
    } else if f == f64::INFINITY {
        Json::from("inf")
    } else if f == f64::NEG_INFINITY {
        Json::from("-inf")
    } else {
        Json::from(f)
    }
}

fn float_from_json(json: &Json) -> Option<f64> {
    match json.as_str() {
        Some("nan") => Some(f64::NAN),
        Some("inf") => Some(f64::INFINITY),
        Some("-inf") => Some(f64::NEG_INFINITY),
        Some(_) => None,
        None => json.as_f64(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_conversion() {
        assert_eq!(Value::Int(3).convert(ValueType::Float), Some(Value::Float(3.0)));
        assert_eq!(Value::Float(2.7).convert(ValueType::Int), Some(Value::Int(2)));
        assert_eq!(Value::Int(0).convert(ValueType::Bool), Some(Value::Bool(false)));
        assert_eq!(Value::from("a").convert(ValueType::Int), None);
    }

    #[test]
    fn compound_components() {
        let v = Value::V3f([1.0, 2.0, 3.0]);
        let parts = v.components().unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(Value::from_components(ValueType::V3f, parts).unwrap(), v);
        assert!(Value::from_components(ValueType::V2i, vec![Value::Int(1)]).is_err());
    }

    #[test]
    fn json_literals() {
        let v = Value::StringVector(vec!["a".into(), "b".into()]);
        assert_eq!(Value::from_json(ValueType::StringVector, &v.to_json()).unwrap(), v);
        let c = Value::Color3f([0.5, 0.25, 1.0]);
        assert_eq!(Value::from_json(ValueType::Color3f, &c.to_json()).unwrap(), c);
        assert!(Value::from_json(ValueType::Int, &Json::from("x")).is_err());
    }

    #[test]
    fn non_finite_floats_survive_json() {
        assert_eq!(Value::Float(f64::INFINITY).to_json(), Json::from("inf"));
        let back = Value::from_json(ValueType::Float, &Value::Float(f64::NAN).to_json()).unwrap();
        assert!(back.as_float().is_some_and(f64::is_nan));

        let v = Value::V3f([f64::NEG_INFINITY, 1.0, f64::INFINITY]);
        assert_eq!(v.to_json().to_string(), r#"["-inf",1.0,"inf"]"#);
        assert_eq!(Value::from_json(ValueType::V3f, &v.to_json()).unwrap(), v);
        assert!(Value::from_json(ValueType::Float, &Json::from("infinity")).is_err());
    }

    #[test]
    fn hash_distinguishes_types() {
        let mut a = Hasher::new();
        a.append(&Value::Int(1));
        let mut b = Hasher::new();
        b.append(&Value::Float(1.0));
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn typed_extraction() {
        assert_eq!(i64::from_value(&Value::Int(4)), Some(4));
        assert_eq!(f64::from_value(&Value::Int(4)), Some(4.0));
        assert_eq!(String::from_value(&Value::Int(4)), None);
    }
}
