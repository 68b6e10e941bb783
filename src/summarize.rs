use crate::error::Result;
use crate::extract::{column_index, Column, LogRecords};
use crate::group::GroupKey;
use crate::query::Query;
use crate::value::Value;
use serde::Serialize;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SummaryCell {
    pub value: Option<Value>,
    pub prev: Option<Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SummaryRow {
    pub key: GroupKey,
    pub cells: Vec<SummaryCell>,
    pub has_prev: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct SummaryRecords {
    pub columns: Vec<Column>,
    pub rows: Vec<SummaryRow>,
}

impl SummaryRecords {
    pub fn index_of(&self, name: &str) -> Option<usize> { column_index(&self.columns, name) }
}

/// Evaluates every query against every current group, then fills `prev` for
/// keys the previous run also has. Groups only present in `prev` are dropped.
pub fn summarize(current: &LogRecords, queries: &[Query], prev: Option<&LogRecords>) -> Result<SummaryRecords> {
    let columns = queries.iter()
        .map(|q| Ok(Column { name: q.name.clone(), column_type: q.check(&current.columns)? }))
        .collect::<Result<Vec<_>>>()?;
    let mut rows = Vec::with_capacity(current.groups.len());
    for group in current.groups.iter() {
        let cells = queries.iter()
            .map(|q| Ok(SummaryCell { value: q.apply(&current.columns, &group.rows)?, prev: None }))
            .collect::<Result<Vec<_>>>()?;
        rows.push(SummaryRow { key: group.key, cells, has_prev: false });
    }
    if let Some(prev) = prev {
        let mut matched = 0usize;
        for row in rows.iter_mut() {
            let Some(old) = prev.groups.get(&row.key) else { continue };
            for (cell, q) in row.cells.iter_mut().zip(queries) {
                cell.prev = q.apply(&prev.columns, &old.rows)?;
            }
            row.has_prev = true;
            matched += 1;
        }
        log::debug!("matched {} of {} groups against previous run", matched, rows.len());
    }
    Ok(SummaryRecords { columns, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{extract, Capture, ColumnSpec, ParseOptions};
    use crate::group::Grouper;
    use crate::converter::Converter;
    use crate::query::Function;
    use regex::Regex;

    fn parse(input: &str, grouper: &Grouper) -> LogRecords {
        let opts = ParseOptions {
            pattern: Regex::new(r"^(\S+) (\S+)$").unwrap(),
            columns: vec![
                ColumnSpec { name: "Url".into(), capture: Capture::Index(1), converters: vec![] },
                ColumnSpec { name: "Time".into(), capture: Capture::Index(2), converters: vec![Converter::ParseFloat64] },
            ],
            keys: vec!["Url".into()],
        };
        extract(&opts, grouper, input.as_bytes()).unwrap()
    }

    fn queries() -> Vec<Query> {
        vec![
            Query { name: "Count".into(), from: "Time".into(), function: Function::Count, filter: None },
            Query { name: "Total".into(), from: "Time".into(), function: Function::Sum, filter: None },
        ]
    }

    #[test]
    fn columns_follow_query_order_and_types() {
        let g = Grouper::with_seed(1);
        let s = summarize(&parse("/a 1.0\n", &g), &queries(), None).unwrap();
        let names: Vec<&str> = s.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Count", "Total"]);
        assert_eq!(s.rows[0].cells[0].value, Some(Value::Int(1)));
        assert!(!s.rows[0].has_prev);
    }

    #[test]
    fn prev_values_only_for_shared_keys() {
        let g = Grouper::with_seed(1);
        let cur = parse("/a 1.0\n/a 2.0\n/new 5.0\n", &g);
        let old = parse("/a 4.0\n/gone 9.0\n", &g);
        let s = summarize(&cur, &queries(), Some(&old)).unwrap();
        assert_eq!(s.rows.len(), 2);
        assert_eq!(s.rows[0].cells[1].value, Some(Value::Float64(3.0)));
        assert_eq!(s.rows[0].cells[1].prev, Some(Value::Float64(4.0)));
        assert!(s.rows[0].has_prev);
        assert_eq!(s.rows[1].cells[1].prev, None);
        assert!(!s.rows[1].has_prev);
    }

    #[test]
    fn identical_runs_have_matching_prev() {
        let g = Grouper::with_seed(5);
        let input = "/a 1.0\n/b 2.0\n/a 3.0\n";
        let (cur, old) = (parse(input, &g), parse(input, &g));
        let s = summarize(&cur, &queries(), Some(&old)).unwrap();
        for row in &s.rows {
            for cell in &row.cells { assert_eq!(cell.value, cell.prev); }
        }
    }
}
