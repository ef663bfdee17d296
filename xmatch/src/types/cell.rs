use serde_json::{Number, Value};

use crate::types::ObjectId;

/// A single typed value of a catalog record.
///
/// Scalars cover identifiers, flags and photometry columns; [`Cell::F64Array`] carries
/// per-object vectors such as spectra or light curves, and [`Cell::Json`] holds anything
/// nested that has no dedicated variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
    F64Array(Vec<f64>),
    Json(Value),
}

impl Cell {
    /// Returns the value as a float, widening integers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::F64(value) => Some(*value),
            Cell::I64(value) => Some(*value as f64),
            _ => None,
        }
    }

    /// Returns the value as an integer.
    ///
    /// Floats are accepted only when they hold an exact integral value.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Cell::I64(value) => Some(*value),
            Cell::F64(value) if value.fract() == 0.0 && value.is_finite() => Some(*value as i64),
            _ => None,
        }
    }

    /// Returns the value as an object identifier, if it can serve as one.
    pub fn as_object_id(&self) -> Option<ObjectId> {
        match self {
            Cell::I64(value) => Some(ObjectId::from(*value)),
            Cell::String(value) => Some(ObjectId::from(value.as_str())),
            Cell::Bytes(value) => Some(ObjectId::from(String::from_utf8_lossy(value).as_ref())),
            _ => None,
        }
    }

    /// Renders the value as JSON.
    pub fn to_json(&self) -> Value {
        match self {
            Cell::Null => Value::Null,
            Cell::Bool(value) => Value::Bool(*value),
            Cell::I64(value) => Value::Number((*value).into()),
            Cell::F64(value) => Number::from_f64(*value)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Cell::String(value) => Value::String(value.clone()),
            Cell::Bytes(value) => Value::Array(
                value
                    .iter()
                    .map(|byte| Value::Number((*byte).into()))
                    .collect(),
            ),
            Cell::F64Array(values) => Value::Array(
                values
                    .iter()
                    .map(|value| {
                        Number::from_f64(*value)
                            .map(Value::Number)
                            .unwrap_or(Value::Null)
                    })
                    .collect(),
            ),
            Cell::Json(value) => value.clone(),
        }
    }
}

impl From<Value> for Cell {
    /// Converts a JSON value into the narrowest matching cell.
    ///
    /// Arrays made only of numbers become [`Cell::F64Array`].
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Cell::Null,
            Value::Bool(value) => Cell::Bool(value),
            Value::Number(number) => match number.as_i64() {
                Some(value) => Cell::I64(value),
                None => number.as_f64().map(Cell::F64).unwrap_or(Cell::Null),
            },
            Value::String(value) => Cell::String(value),
            Value::Array(values) if values.iter().all(Value::is_number) => {
                Cell::F64Array(values.iter().filter_map(Value::as_f64).collect())
            }
            other => Cell::Json(other),
        }
    }
}
