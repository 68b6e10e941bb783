use crate::value::ColumnType;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    // Configuration
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("invalid pattern for {context}: {source}")]
    InvalidPattern {
        context: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid glob '{glob}': {source}")]
    InvalidGlob {
        glob: String,
        #[source]
        source: globset::Error,
    },

    #[error("unknown analyzer '{0}'")]
    UnknownAnalyzer(String),

    #[error("no analyzer matches the first line of the input")]
    NoAnalyzerMatched,

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("unknown column '{column}' referenced by {context}")]
    UnknownColumn { column: String, context: String },

    #[error("column '{column}': capture group '{capture}' is not defined in the pattern")]
    UnknownCapture { column: String, capture: String },

    #[error("column '{column}': capture index {index} is out of range (pattern has {groups} groups)")]
    CaptureOutOfRange { column: String, index: usize, groups: usize },

    #[error("query '{query}': function '{function}' is not supported on {column_type} column '{column}'")]
    UnsupportedFunction { query: String, function: String, column: String, column_type: ColumnType },

    #[error("query '{query}': filters only apply to numeric columns, '{column}' is {column_type}")]
    FilterOnNonNumeric { query: String, column: String, column_type: ColumnType },

    #[error("query '{0}' has no source column (`from`)")]
    MissingSource(String),

    #[error("no group with key {0}")]
    UnknownGroup(String),

    #[error("unknown sort key '{0}'")]
    UnknownSortKey(String),

    // Input
    #[error("line {line} does not match the configured pattern: {text}")]
    NoMatch { line: usize, text: String },

    #[error("line {line}, column '{column}': {source}")]
    Conversion {
        line: usize,
        column: String,
        #[source]
        source: ConversionError,
    },

    #[error("query '{query}': column '{column}' holds {found} values, expected {expected}")]
    TypeMismatch { query: String, column: String, expected: ColumnType, found: ColumnType },

    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("cannot convert '{raw}' to {target}: {reason}")]
pub struct ConversionError {
    pub raw: String,
    pub target: ColumnType,
    pub reason: String,
}

impl ConversionError {
    pub fn new(raw: impl Into<String>, target: ColumnType, reason: impl ToString) -> Self {
        Self { raw: raw.into(), target, reason: reason.to_string() }
    }
}
