use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType { Int, Int64, Float64, String, DateTime }

impl ColumnType {
    pub fn is_float(self) -> bool { self == ColumnType::Float64 }
    pub fn is_numeric(self) -> bool { matches!(self, ColumnType::Int | ColumnType::Int64 | ColumnType::Float64) }
    pub fn name(self) -> &'static str {
        match self { ColumnType::Int => "int", ColumnType::Int64 => "int64", ColumnType::Float64 => "float64", ColumnType::String => "string", ColumnType::DateTime => "datetime" }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Int64(i64),
    Float64(f64),
    Str(String),
    DateTime(DateTime<Local>),
}

impl Value {
    pub fn column_type(&self) -> ColumnType {
        match self { Value::Int(_) => ColumnType::Int, Value::Int64(_) => ColumnType::Int64, Value::Float64(_) => ColumnType::Float64, Value::Str(_) => ColumnType::String, Value::DateTime(_) => ColumnType::DateTime }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self { Value::Int(i) | Value::Int64(i) => Some(*i as f64), Value::Float64(f) => Some(*f), _ => None }
    }

    /// Total order within a variant; NaN sorts above every other float.
    /// Values of different variants compare equal.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) | (Value::Int64(a), Value::Int64(b)) => a.cmp(b),
            (Value::Float64(a), Value::Float64(b)) => a.total_cmp(b),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) | Value::Int64(i) => write!(f, "{}", i),
            Value::Float64(v) => write!(f, "{}", v),
            Value::Str(s) => f.write_str(s),
            Value::DateTime(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S%.f %z")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compare_orders_same_variants() {
        assert_eq!(Value::Int(3).compare(&Value::Int(5)), Ordering::Less);
        assert_eq!(Value::Float64(2.5).compare(&Value::Float64(1.0)), Ordering::Greater);
        assert_eq!(Value::Str("b".into()).compare(&Value::Str("a".into())), Ordering::Greater);
    }

    #[test]
    fn compare_mixed_variants_is_equal() {
        assert_eq!(Value::Int(3).compare(&Value::Float64(5.0)), Ordering::Equal);
    }

    #[test]
    fn nan_sorts_above_every_float() {
        let nan = Value::Float64(f64::NAN);
        assert_eq!(nan.compare(&Value::Float64(f64::INFINITY)), Ordering::Greater);
        assert_eq!(Value::Float64(1.0).compare(&nan), Ordering::Less);
        assert_eq!(nan.compare(&nan), Ordering::Equal);
    }

    #[test]
    fn numeric_types() {
        assert!(ColumnType::Int64.is_numeric());
        assert!(!ColumnType::DateTime.is_numeric());
        assert!(ColumnType::Float64.is_float());
        assert_eq!(Value::Int64(7).as_f64(), Some(7.0));
        assert_eq!(Value::Str("7".into()).as_f64(), None);
    }
}
