use crate::error::{Error, Result};
use crate::extract::{column_index, Column};
use crate::group::Row;
use crate::value::{ColumnType, Value};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Function { Count, Sum, Mean, Stddev, Min, Max, P50, P90, P95, P99, #[default] Any }

impl Function {
    pub const ALL: [Function; 11] = [Function::Count, Function::Sum, Function::Mean, Function::Stddev, Function::Min, Function::Max, Function::P50, Function::P90, Function::P95, Function::P99, Function::Any];

    pub fn name(self) -> &'static str {
        match self {
            Function::Count => "count", Function::Sum => "sum", Function::Mean => "mean", Function::Stddev => "stddev",
            Function::Min => "min", Function::Max => "max", Function::P50 => "p50", Function::P90 => "p90",
            Function::P95 => "p95", Function::P99 => "p99", Function::Any => "any",
        }
    }

    fn percentile(self) -> Option<usize> {
        match self { Function::P50 => Some(50), Function::P90 => Some(90), Function::P95 => Some(95), Function::P99 => Some(99), _ => None }
    }

    pub fn supports(self, ty: ColumnType) -> bool {
        match ty {
            ColumnType::Int | ColumnType::Int64 | ColumnType::Float64 => true,
            ColumnType::String => matches!(self, Function::Count | Function::Any),
            ColumnType::DateTime => matches!(self, Function::Count | Function::Any | Function::Min | Function::Max),
        }
    }

    pub fn result_type(self, source: ColumnType) -> ColumnType {
        if self == Function::Count { ColumnType::Int } else { source }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

impl FromStr for Function {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        Function::ALL.into_iter().find(|f| f.name() == s).ok_or_else(|| Error::UnknownFunction(s.to_string()))
    }
}

impl TryFrom<String> for Function {
    type Error = Error;
    fn try_from(s: String) -> Result<Self> { s.parse() }
}

impl From<Function> for String {
    fn from(f: Function) -> Self { f.name().to_string() }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Filter {
    Between { start: f64, end: f64 },
}

impl Filter {
    pub fn accepts(&self, v: f64) -> bool {
        match *self { Filter::Between { start, end } => start <= v && v <= end }
    }
}

/// One output column of the summary: `function(from)` over a group's rows,
/// optionally restricted by `filter`.
#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    pub name: String,
    pub from: String,
    pub function: Function,
    pub filter: Option<Filter>,
}

impl Query {
    fn source<'c>(&self, columns: &'c [Column]) -> Result<(usize, &'c Column)> {
        let idx = column_index(columns, &self.from)
            .ok_or_else(|| Error::UnknownColumn { column: self.from.clone(), context: format!("query '{}'", self.name) })?;
        Ok((idx, &columns[idx]))
    }

    pub fn check(&self, columns: &[Column]) -> Result<ColumnType> {
        let (_, col) = self.source(columns)?;
        if !self.function.supports(col.column_type) {
            return Err(Error::UnsupportedFunction { query: self.name.clone(), function: self.function.to_string(), column: col.name.clone(), column_type: col.column_type });
        }
        if self.filter.is_some() && !col.column_type.is_numeric() {
            return Err(Error::FilterOnNonNumeric { query: self.name.clone(), column: col.name.clone(), column_type: col.column_type });
        }
        Ok(self.function.result_type(col.column_type))
    }

    /// `None` means the function has no value for this group (for example
    /// `mean` of an empty filtered set).
    pub fn apply(&self, columns: &[Column], rows: &[Row]) -> Result<Option<Value>> {
        self.check(columns)?;
        let (idx, col) = self.source(columns)?;
        let values = rows.iter().map(|r| &r[idx]);
        match col.column_type {
            ColumnType::Int => self.numeric::<i64>(col, values),
            ColumnType::Int64 | ColumnType::Float64 => self.numeric::<f64>(col, values),
            ColumnType::String | ColumnType::DateTime => self.opaque(col, values),
        }
    }

    fn mismatch(&self, col: &Column, found: &Value) -> Error {
        Error::TypeMismatch { query: self.name.clone(), column: col.name.clone(), expected: col.column_type, found: found.column_type() }
    }

    fn numeric<'v, T: Numeric>(&self, col: &Column, values: impl Iterator<Item = &'v Value>) -> Result<Option<Value>> {
        let mut xs: Vec<T> = Vec::new();
        for v in values {
            let x = T::read(v).ok_or_else(|| self.mismatch(col, v))?;
            if self.filter.is_none_or(|f| f.accepts(x.to_f64())) { xs.push(x); }
        }
        if self.function == Function::Count { return Ok(Some(Value::Int(xs.len() as i64))); }
        Ok(evaluate(self.function, &mut xs).map(|x| x.into_value(col.column_type)))
    }

    fn opaque<'v>(&self, col: &Column, values: impl Iterator<Item = &'v Value>) -> Result<Option<Value>> {
        let mut out: Option<&Value> = None;
        let mut n = 0i64;
        for v in values {
            if v.column_type() != col.column_type { return Err(self.mismatch(col, v)); }
            n += 1;
            out = match (out, self.function) {
                (None, _) => Some(v),
                (Some(cur), Function::Min) if v.compare(cur) == Ordering::Less => Some(v),
                (Some(cur), Function::Max) if v.compare(cur) == Ordering::Greater => Some(v),
                (cur, _) => cur,
            };
        }
        if self.function == Function::Count { return Ok(Some(Value::Int(n))); }
        Ok(out.cloned())
    }
}

trait Numeric: Copy {
    fn read(v: &Value) -> Option<Self>;
    fn order(&self, other: &Self) -> Ordering;
    fn to_f64(self) -> f64;
    fn from_f64(f: f64) -> Self;
    fn into_value(self, ty: ColumnType) -> Value;
}

impl Numeric for i64 {
    fn read(v: &Value) -> Option<Self> { if let Value::Int(i) = v { Some(*i) } else { None } }
    fn order(&self, other: &Self) -> Ordering { self.cmp(other) }
    fn to_f64(self) -> f64 { self as f64 }
    fn from_f64(f: f64) -> Self { f as i64 }
    fn into_value(self, _: ColumnType) -> Value { Value::Int(self) }
}

impl Numeric for f64 {
    fn read(v: &Value) -> Option<Self> {
        match v { Value::Int64(_) | Value::Float64(_) => v.as_f64(), _ => None }
    }
    fn order(&self, other: &Self) -> Ordering { self.total_cmp(other) }
    fn to_f64(self) -> f64 { self }
    fn from_f64(f: f64) -> Self { f }
    fn into_value(self, ty: ColumnType) -> Value {
        if ty == ColumnType::Int64 { Value::Int64(self as i64) } else { Value::Float64(self) }
    }
}

/// Sums and means accumulate in f64 and are cast back to the column type.
/// `Stddev` yields the population variance; no square root is taken.
fn evaluate<T: Numeric>(function: Function, xs: &mut [T]) -> Option<T> {
    if function == Function::Sum { return Some(T::from_f64(xs.iter().map(|x| x.to_f64()).sum())); }
    if xs.is_empty() { return None; }
    let n = xs.len() as f64;
    let mean = xs.iter().map(|x| x.to_f64()).sum::<f64>() / n;
    match function {
        Function::Mean => Some(T::from_f64(mean)),
        Function::Stddev => Some(T::from_f64(xs.iter().map(|x| (x.to_f64() - mean).powi(2)).sum::<f64>() / n)),
        Function::Min => xs.iter().copied().min_by(T::order),
        Function::Max => xs.iter().copied().max_by(T::order),
        Function::Any => xs.first().copied(),
        f => {
            let p = f.percentile()?;
            xs.sort_by(T::order);
            Some(xs[(p * xs.len() / 100).min(xs.len() - 1)])
        }
    }
}
