use crate::converter::{chain_type, Converter};
use crate::error::{Error, Result};
use crate::group::{Grouper, Groups, Row};
use crate::value::{ColumnType, Value};
use regex::Regex;
use serde::Serialize;
use std::io::BufRead;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Capture {
    Name(String),
    /// Positional group, 1-based; 0 is the whole match.
    Index(usize),
}

#[derive(Clone, Debug)]
pub struct ColumnSpec {
    pub name: String,
    pub capture: Capture,
    pub converters: Vec<Converter>,
}

#[derive(Clone, Debug)]
pub struct ParseOptions {
    pub pattern: Regex,
    pub columns: Vec<ColumnSpec>,
    pub keys: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
}

pub fn column_index(columns: &[Column], name: &str) -> Option<usize> { columns.iter().position(|c| c.name == name) }

#[derive(Clone, Debug)]
pub struct LogRecords {
    pub columns: Vec<Column>,
    pub groups: Groups,
    pub lines: usize,
}

impl LogRecords {
    pub fn index_of(&self, name: &str) -> Option<usize> { column_index(&self.columns, name) }
}

impl ParseOptions {
    pub fn columns(&self) -> Vec<Column> {
        self.columns.iter().map(|c| Column { name: c.name.clone(), column_type: chain_type(&c.converters) }).collect()
    }

    pub fn capture_indexes(&self) -> Result<Vec<usize>> {
        let groups = self.pattern.captures_len();
        self.columns.iter().map(|c| match &c.capture {
            Capture::Name(n) => self.pattern.capture_names().position(|cn| cn == Some(n.as_str()))
                .ok_or_else(|| Error::UnknownCapture { column: c.name.clone(), capture: n.clone() }),
            Capture::Index(i) if *i < groups => Ok(*i),
            Capture::Index(i) => Err(Error::CaptureOutOfRange { column: c.name.clone(), index: *i, groups: groups - 1 }),
        }).collect()
    }

    pub fn key_indexes(&self) -> Result<Vec<usize>> {
        self.keys.iter().map(|k| self.columns.iter().position(|c| &c.name == k)
            .ok_or_else(|| Error::UnknownColumn { column: k.clone(), context: "grouping keys".to_string() })).collect()
    }
}

/// Reads `reader` line by line, converts every configured column and buckets
/// the rows by their group key. Blank lines are skipped; a line the pattern
/// does not match, or a field that fails conversion, aborts the whole parse.
pub fn extract<R: BufRead>(options: &ParseOptions, grouper: &Grouper, mut reader: R) -> Result<LogRecords> {
    let captures = options.capture_indexes()?;
    let keys = options.key_indexes()?;
    let mut groups = Groups::default();
    let mut buf: Vec<u8> = Vec::new();
    let mut line_no = 0usize;
    let mut lines = 0usize;
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 { break; }
        line_no += 1;
        let text = String::from_utf8_lossy(&buf);
        let line = text.trim_end_matches(['\n', '\r']);
        if line.trim().is_empty() { continue; }
        let caps = options.pattern.captures(line).ok_or_else(|| Error::NoMatch { line: line_no, text: line.to_string() })?;
        let mut row: Row = Vec::with_capacity(options.columns.len());
        for (spec, &idx) in options.columns.iter().zip(&captures) {
            let mut value = Value::Str(caps.get(idx).map(|m| m.as_str()).unwrap_or("").to_string());
            for conv in &spec.converters {
                value = conv.convert(value).map_err(|source| Error::Conversion { line: line_no, column: spec.name.clone(), source })?;
            }
            row.push(value);
        }
        let key = grouper.key(keys.iter().map(|&i| &row[i]));
        log::trace!("line {} -> group {}", line_no, key);
        groups.push(key, row);
        lines += 1;
    }
    log::debug!("extracted {} rows into {} groups", lines, groups.len());
    Ok(LogRecords { columns: options.columns(), groups, lines })
}
