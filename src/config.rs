use crate::analyzer::{Analyzers, Pipeline};
use crate::converter::ConverterSpec;
use crate::error::{Error, Result};
use crate::extract::{Capture, Column, ColumnSpec, ParseOptions};
use crate::format::{Alignment, ColumnFormat};
use crate::query::{Filter, Function, Query};
use crate::sort::resolve_keys;
use crate::summarize::SummaryRecords;
use regex::Regex;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

pub const DEFAULT_CONFIG: &str = "tallylog.toml";

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analyzers: Vec<AnalyzerConfig>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AnalyzerConfig {
    pub name: String,
    pub pattern: String,
    pub columns: Vec<ColumnConfig>,
    #[serde(default)]
    pub grouping_keys: Vec<String>,
    #[serde(default)]
    pub queries: Vec<QueryConfig>,
    #[serde(default)]
    pub sort_keys: Vec<String>,
    #[serde(default)]
    pub limit: usize,
    #[serde(default)]
    pub diffs: Vec<String>,
    #[serde(default)]
    pub show_rank: bool,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum CaptureConfig { Name(String), Index(usize) }

#[derive(Clone, Debug, Deserialize)]
pub struct ColumnConfig {
    pub name: String,
    /// Defaults to the named group matching `name`.
    pub capture: Option<CaptureConfig>,
    #[serde(default)]
    pub converters: Vec<ConverterSpec>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct FormatConfig {
    pub format: Option<String>,
    pub alignment: Option<Alignment>,
    #[serde(default)]
    pub humanize_bytes: bool,
}

impl From<&FormatConfig> for ColumnFormat {
    fn from(f: &FormatConfig) -> Self { ColumnFormat { format: f.format.clone(), alignment: f.alignment, humanize_bytes: f.humanize_bytes } }
}

/// One report column, or with `columns` a family of columns that inherit
/// whatever they leave unset from this entry and share its format.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct QueryConfig {
    pub name: Option<String>,
    pub from: Option<String>,
    pub function: Option<Function>,
    pub filter: Option<Filter>,
    #[serde(default)]
    pub format: FormatConfig,
    #[serde(default)]
    pub columns: Vec<QueryConfig>,
}

impl QueryConfig {
    fn inherit(&self, parent: &QueryConfig) -> Result<Query> {
        let from = self.from.clone().or_else(|| parent.from.clone())
            .ok_or_else(|| Error::MissingSource(self.name.clone().or_else(|| parent.name.clone()).unwrap_or_default()))?;
        Ok(Query {
            name: self.name.clone().or_else(|| self.from.clone()).or_else(|| parent.name.clone()).unwrap_or_else(|| from.clone()),
            from,
            function: self.function.or(parent.function).unwrap_or_default(),
            filter: self.filter.or(parent.filter),
        })
    }

    pub fn expand(&self) -> Result<Vec<(Query, ColumnFormat)>> {
        let format = ColumnFormat::from(&self.format);
        if self.columns.is_empty() { return Ok(vec![(self.inherit(&QueryConfig::default())?, format)]); }
        self.columns.iter().map(|c| Ok((c.inherit(self)?, format.clone()))).collect()
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self> { Ok(toml::from_str(s)?) }

    pub fn load(path: &Path) -> Result<Self> { Self::from_toml_str(&std::fs::read_to_string(path)?) }

    pub fn resolve(&self) -> Result<Analyzers> {
        let pipelines = self.analyzers.iter().map(|a| a.resolve().map(Arc::new)).collect::<Result<Vec<_>>>()?;
        Ok(Analyzers::new(pipelines))
    }
}

impl AnalyzerConfig {
    pub fn resolve(&self) -> Result<Pipeline> {
        let pattern = Regex::new(&self.pattern).map_err(|source| Error::InvalidPattern { context: format!("analyzer '{}'", self.name), source })?;
        let mut columns = Vec::with_capacity(self.columns.len());
        for c in &self.columns {
            let capture = match &c.capture {
                Some(CaptureConfig::Name(n)) => Capture::Name(n.clone()),
                Some(CaptureConfig::Index(i)) => Capture::Index(*i),
                None => Capture::Name(c.name.clone()),
            };
            let converters = c.converters.iter().map(ConverterSpec::load).collect::<Result<Vec<_>>>()?;
            columns.push(ColumnSpec { name: c.name.clone(), capture, converters });
        }
        let parse = ParseOptions { pattern, columns, keys: self.grouping_keys.clone() };
        parse.capture_indexes()?;
        parse.key_indexes()?;

        let mut queries = Vec::new();
        let mut formats = Vec::new();
        for q in &self.queries {
            for (query, format) in q.expand()? {
                queries.push(query);
                formats.push(format);
            }
        }
        let source = parse.columns();
        let summary_columns = queries.iter()
            .map(|q| Ok(Column { name: q.name.clone(), column_type: q.check(&source)? }))
            .collect::<Result<Vec<_>>>()?;
        let shape = SummaryRecords { columns: summary_columns, rows: Vec::new() };
        let sort_keys = resolve_keys(&shape, &self.sort_keys)?;
        if let Some(d) = self.diffs.iter().find(|d| shape.index_of(d).is_none()) {
            return Err(Error::UnknownColumn { column: d.clone(), context: "diffs".to_string() });
        }
        log::debug!("resolved analyzer '{}': {} columns, {} queries", self.name, parse.columns.len(), queries.len());
        Ok(Pipeline {
            name: self.name.clone(),
            parse,
            queries,
            formats,
            sort_keys,
            limit: self.limit,
            show_rank: self.show_rank,
            diffs: self.diffs.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ColumnType;

    const SAMPLE: &str = r#"
[[analyzers]]
name = "nginx"
pattern = '^(?P<Method>\S+) (?P<Url>\S+) (?P<Status>\d+) (\d+) (?P<ResponseTime>\S+)$'
grouping_keys = ["Method", "Url"]
sort_keys = ["Total"]
diffs = ["Total"]
show_rank = true
limit = 20

[[analyzers.columns]]
name = "Method"

[[analyzers.columns]]
name = "Url"
converters = [{ type = "queryParams" }]

[[analyzers.columns]]
name = "Status"
converters = [{ type = "parseInt" }]

[[analyzers.columns]]
name = "Bytes"
capture = { index = 4 }
converters = [{ type = "parseInt" }]

[[analyzers.columns]]
name = "ResponseTime"
converters = [{ type = "parseFloat64" }]

[[analyzers.queries]]
name = "Count"
from = "ResponseTime"
function = "count"

[[analyzers.queries]]
name = "Total"
from = "ResponseTime"
function = "sum"

[[analyzers.queries]]
from = "ResponseTime"
format = { format = "%.2f" }
columns = [{ name = "Mean", function = "mean" }, { name = "P99", function = "p99" }]

[[analyzers.queries]]
name = "5xx"
from = "Status"
function = "count"
filter = { type = "between", start = 500, end = 599 }

[[analyzers.queries]]
from = "Method"

[[analyzers.queries]]
name = "Bytes"
from = "Bytes"
function = "sum"
format = { humanize_bytes = true, alignment = "left" }
"#;

    #[test]
    fn resolves_sample() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        let p = config.analyzers[0].resolve().unwrap();
        let names: Vec<&str> = p.queries.iter().map(|q| q.name.as_str()).collect();
        assert_eq!(names, vec!["Count", "Total", "Mean", "P99", "5xx", "Method", "Bytes"]);
        assert_eq!(p.queries[2].from, "ResponseTime");
        assert_eq!(p.queries[3].function, Function::P99);
        assert_eq!(p.formats[3].format.as_deref(), Some("%.2f"));
        assert_eq!(p.queries[4].filter, Some(Filter::Between { start: 500.0, end: 599.0 }));
        assert_eq!(p.queries[5].function, Function::Any);
        assert!(p.formats[6].humanize_bytes);
        assert_eq!(p.formats[6].alignment, Some(Alignment::Left));
        assert_eq!(p.sort_keys, vec![1]);
        assert_eq!(p.parse.columns()[4].column_type, ColumnType::Float64);
    }

    #[test]
    fn nested_columns_inherit_filter_and_override_from() {
        let q = QueryConfig {
            name: Some("Status".into()),
            from: Some("Status".into()),
            function: Some(Function::Count),
            filter: Some(Filter::Between { start: 200.0, end: 299.0 }),
            columns: vec![
                QueryConfig { name: Some("2xx".into()), ..Default::default() },
                QueryConfig { from: Some("Bytes".into()), function: Some(Function::Sum), ..Default::default() },
            ],
            ..Default::default()
        };
        let expanded = q.expand().unwrap();
        assert_eq!(expanded[0].0, Query { name: "2xx".into(), from: "Status".into(), function: Function::Count, filter: Some(Filter::Between { start: 200.0, end: 299.0 }) });
        assert_eq!(expanded[1].0.name, "Bytes");
        assert_eq!(expanded[1].0.function, Function::Sum);
    }

    #[test]
    fn parent_without_source_defers_to_columns() {
        let q = QueryConfig {
            function: Some(Function::Max),
            columns: vec![
                QueryConfig { from: Some("Status".into()), ..Default::default() },
                QueryConfig { name: Some("Slowest".into()), from: Some("ResponseTime".into()), ..Default::default() },
            ],
            ..Default::default()
        };
        let expanded = q.expand().unwrap();
        assert_eq!(expanded[0].0, Query { name: "Status".into(), from: "Status".into(), function: Function::Max, filter: None });
        assert_eq!(expanded[1].0.name, "Slowest");
        assert_eq!(expanded[1].0.from, "ResponseTime");

        let orphan = QueryConfig { name: Some("Lost".into()), columns: vec![QueryConfig::default()], ..Default::default() };
        assert!(matches!(orphan.expand(), Err(Error::MissingSource(n)) if n == "Lost"));
        assert!(matches!(QueryConfig::default().expand(), Err(Error::MissingSource(_))));
    }

    fn broken(from: &str, to: &str) -> Error {
        let config = Config::from_toml_str(&SAMPLE.replacen(from, to, 1)).unwrap();
        config.analyzers[0].resolve().unwrap_err()
    }

    #[test]
    fn malformed_configs_fail_upfront() {
        assert!(matches!(broken("function = \"sum\"", "function = \"sum\"\n[[analyzers.queries]]\nfrom = \"Url\"\nfunction = \"sum\""), Error::UnsupportedFunction { .. }));
        assert!(matches!(broken("sort_keys = [\"Total\"]", "sort_keys = [\"Nope\"]"), Error::UnknownSortKey(_)));
        assert!(matches!(broken("grouping_keys = [\"Method\", \"Url\"]", "grouping_keys = [\"Host\"]"), Error::UnknownColumn { .. }));
        assert!(matches!(broken("capture = { index = 4 }", "capture = { index = 9 }"), Error::CaptureOutOfRange { .. }));
        assert!(matches!(broken("(?P<Method>\\S+)", "(?P<Method>\\S+"), Error::InvalidPattern { .. }));
        assert!(matches!(broken("diffs = [\"Total\"]", "diffs = [\"Missing\"]"), Error::UnknownColumn { .. }));
        assert!(matches!(broken("name = \"5xx\"\nfrom = \"Status\"", "name = \"5xx\"\nfrom = \"Url\""), Error::FilterOnNonNumeric { .. }));
    }

    #[test]
    fn unknown_function_and_converter_are_parse_errors() {
        assert!(matches!(Config::from_toml_str(&SAMPLE.replacen("\"count\"", "\"median\"", 1)), Err(Error::ConfigParse(_))));
        assert!(matches!(Config::from_toml_str(&SAMPLE.replacen("parseInt\" }", "parseHex\" }", 1)), Err(Error::ConfigParse(_))));
    }
}
