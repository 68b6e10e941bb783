//! Regex-driven log summarizer: parse lines into typed columns, group them,
//! aggregate each group, diff against a previous run and render a ranked
//! table as text, HTML, JSON or CSV.

pub mod analyzer;
pub mod config;
pub mod converter;
pub mod drilldown;
pub mod error;
pub mod extract;
pub mod files;
pub mod format;
pub mod group;
pub mod html;
pub mod query;
pub mod sort;
pub mod summarize;
pub mod table;
pub mod value;

pub use analyzer::{Analyzers, Pipeline};
pub use config::Config;
pub use error::{Error, Result};
pub use format::Report;
pub use group::{GroupKey, Grouper};
pub use value::{ColumnType, Value};
