use crate::error::{ConversionError, Error, Result};
use crate::value::{ColumnType, Value};
use chrono::{DateTime, Local, Utc};
use regex::Regex;
use serde::Deserialize;

const ULID_LIKE: &str = "[0-9a-zA-Z]{26}";
const UUID_LIKE: &str = "[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}";
// One or more `(?, ?, ...)` placeholder groups separated by commas.
const BULK_PLACEHOLDERS: &str = r"\(\s*\?(?:\s*,\s*\?)*\s*\)(?:\s*,\s*\(\s*\?(?:\s*,\s*\?)*\s*\))*";

fn default_ulid_tag() -> String { "(ulid)".to_string() }
fn default_uuid_tag() -> String { "(uuid)".to_string() }
fn default_replacer() -> String { "*".to_string() }
fn default_bulk_token() -> String { "(...)".to_string() }

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ConverterSpec {
    ParseInt,
    ParseInt64,
    ParseFloat64,
    Unix,
    UnixMilli,
    UnixNano,
    Div { divisor: f64 },
    MaskIds {
        #[serde(default = "default_ulid_tag")]
        ulid: String,
        #[serde(default = "default_uuid_tag")]
        uuid: String,
    },
    QueryParams {
        #[serde(default = "default_replacer")]
        replacer: String,
    },
    Regexp {
        pattern: String,
        #[serde(default)]
        replacer: String,
    },
    Bulk {
        #[serde(default = "default_bulk_token")]
        token: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EpochUnit { Seconds, Millis, Nanos }

#[derive(Clone, Debug)]
pub enum Converter {
    ParseInt,
    ParseInt64,
    ParseFloat64,
    Epoch(EpochUnit),
    Div(f64),
    MaskIds { ulid: Regex, ulid_tag: String, uuid: Regex, uuid_tag: String },
    QueryParams(String),
    Replace { re: Regex, replacer: String },
    Bulk { re: Regex, token: String },
}

fn compile(pattern: &str, context: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| Error::InvalidPattern { context: context.to_string(), source })
}

impl ConverterSpec {
    pub fn load(&self) -> Result<Converter> {
        Ok(match self {
            ConverterSpec::ParseInt => Converter::ParseInt,
            ConverterSpec::ParseInt64 => Converter::ParseInt64,
            ConverterSpec::ParseFloat64 => Converter::ParseFloat64,
            ConverterSpec::Unix => Converter::Epoch(EpochUnit::Seconds),
            ConverterSpec::UnixMilli => Converter::Epoch(EpochUnit::Millis),
            ConverterSpec::UnixNano => Converter::Epoch(EpochUnit::Nanos),
            ConverterSpec::Div { divisor } => Converter::Div(*divisor),
            ConverterSpec::MaskIds { ulid, uuid } => Converter::MaskIds {
                ulid: compile(ULID_LIKE, "maskIds converter")?,
                ulid_tag: ulid.clone(),
                uuid: compile(UUID_LIKE, "maskIds converter")?,
                uuid_tag: uuid.clone(),
            },
            ConverterSpec::QueryParams { replacer } => Converter::QueryParams(replacer.clone()),
            ConverterSpec::Regexp { pattern, replacer } => Converter::Replace { re: compile(pattern, "regexp converter")?, replacer: replacer.clone() },
            ConverterSpec::Bulk { token } => Converter::Bulk { re: compile(BULK_PLACEHOLDERS, "bulk converter")?, token: token.clone() },
        })
    }
}

impl Converter {
    pub fn result_type(&self) -> ColumnType {
        match self {
            Converter::ParseInt => ColumnType::Int,
            Converter::ParseInt64 => ColumnType::Int64,
            Converter::ParseFloat64 | Converter::Div(_) => ColumnType::Float64,
            Converter::Epoch(_) => ColumnType::DateTime,
            Converter::MaskIds { .. } | Converter::QueryParams(_) | Converter::Replace { .. } | Converter::Bulk { .. } => ColumnType::String,
        }
    }

    pub fn convert(&self, value: Value) -> std::result::Result<Value, ConversionError> {
        let target = self.result_type();
        match self {
            Converter::ParseInt => {
                let s = expect_str(value, target)?;
                s.parse::<i64>().map(Value::Int).map_err(|e| ConversionError::new(s, target, e))
            }
            Converter::ParseInt64 => {
                let s = expect_str(value, target)?;
                s.parse::<i64>().map(Value::Int64).map_err(|e| ConversionError::new(s, target, e))
            }
            Converter::ParseFloat64 => {
                let s = expect_str(value, target)?;
                s.parse::<f64>().map(Value::Float64).map_err(|e| ConversionError::new(s, target, e))
            }
            Converter::Epoch(unit) => {
                let n = match value {
                    Value::Int(n) | Value::Int64(n) => n,
                    Value::Str(s) => s.parse::<i64>().map_err(|e| ConversionError::new(s.clone(), target, e))?,
                    other => return Err(ConversionError::new(other.to_string(), target, "expected an integer epoch")),
                };
                from_epoch(n, *unit).map(Value::DateTime).ok_or_else(|| ConversionError::new(n.to_string(), target, "timestamp out of range"))
            }
            Converter::Div(divisor) => match value.as_f64() {
                Some(v) => Ok(Value::Float64(v / divisor)),
                None => Err(ConversionError::new(value.to_string(), target, "expected a numeric value")),
            },
            Converter::MaskIds { ulid, ulid_tag, uuid, uuid_tag } => {
                let s = expect_str(value, target)?;
                let s = ulid.replace_all(&s, regex::NoExpand(ulid_tag));
                Ok(Value::Str(uuid.replace_all(&s, regex::NoExpand(uuid_tag)).into_owned()))
            }
            Converter::QueryParams(replacer) => Ok(Value::Str(mask_query_params(&expect_str(value, target)?, replacer))),
            Converter::Replace { re, replacer } => Ok(Value::Str(re.replace_all(&expect_str(value, target)?, replacer.as_str()).into_owned())),
            Converter::Bulk { re, token } => Ok(Value::Str(re.replace_all(&expect_str(value, target)?, regex::NoExpand(token)).into_owned())),
        }
    }
}

fn expect_str(value: Value, target: ColumnType) -> std::result::Result<String, ConversionError> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(ConversionError::new(other.to_string(), target, format!("expected a string, got {}", other.column_type()))),
    }
}

fn from_epoch(n: i64, unit: EpochUnit) -> Option<DateTime<Local>> {
    let utc: DateTime<Utc> = match unit {
        EpochUnit::Seconds => DateTime::from_timestamp(n, 0)?,
        EpochUnit::Millis => DateTime::from_timestamp_millis(n)?,
        EpochUnit::Nanos => DateTime::from_timestamp_nanos(n),
    };
    Some(utc.with_timezone(&Local))
}

/// `/p?a=1&b=2` becomes `/p?a=*&b=*`. Keys and their order are kept.
pub fn mask_query_params(url: &str, replacer: &str) -> String {
    let Some((path, query)) = url.split_once('?') else { return url.to_string() };
    let masked: Vec<String> = query.split('&').map(|kv| format!("{}={}", kv.split('=').next().unwrap_or(""), replacer)).collect();
    format!("{}?{}", path, masked.join("&"))
}

pub fn chain_type(converters: &[Converter]) -> ColumnType {
    converters.last().map(Converter::result_type).unwrap_or(ColumnType::String)
}
