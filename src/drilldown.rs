use crate::error::{Error, Result};
use crate::extract::LogRecords;
use crate::format::{Alignment, Report, ReportCell, ReportColumn, ReportRow};
use crate::group::{GroupKey, Row};
use crate::html::HtmlOptions;
use crate::value::Value;
use std::collections::BTreeMap;

pub const COUNT_HEADER: &str = "Count";

#[derive(Clone, Debug, PartialEq)]
pub struct Bucket {
    pub label: String,
    pub count: usize,
    pub first: Row,
}

/// Splits one group's rows by the rendered value of `column`, in ascending
/// label order.
pub fn buckets(records: &LogRecords, key: GroupKey, column: &str) -> Result<Vec<Bucket>> {
    let idx = records.index_of(column).ok_or_else(|| Error::UnknownColumn { column: column.to_string(), context: "drill-down".to_string() })?;
    let group = records.groups.get(&key).ok_or_else(|| Error::UnknownGroup(key.to_string()))?;
    let mut by_label: BTreeMap<String, Bucket> = BTreeMap::new();
    for row in &group.rows {
        let label = row[idx].to_string();
        by_label.entry(label.clone())
            .and_modify(|b| b.count += 1)
            .or_insert_with(|| Bucket { label, count: 1, first: row.clone() });
    }
    log::debug!("group {} split into {} buckets by {}", key, by_label.len(), column);
    Ok(by_label.into_values().collect())
}

pub fn to_report(records: &LogRecords, key: GroupKey, buckets: &[Bucket]) -> Report {
    let mut columns = vec![ReportColumn { name: COUNT_HEADER.to_string(), alignment: Alignment::Right }];
    columns.extend(records.columns.iter().map(|c| ReportColumn { name: c.name.clone(), alignment: Alignment::for_type(c.column_type) }));
    let rows = buckets.iter().map(|b| {
        let mut cells = vec![ReportCell { text: b.count.to_string(), raw: Some(Value::Int(b.count as i64)), prev_raw: None, alignment: Alignment::Right }];
        cells.extend(b.first.iter().zip(&records.columns).map(|(v, c)| ReportCell {
            text: v.to_string(),
            raw: Some(v.clone()),
            prev_raw: None,
            alignment: Alignment::for_type(c.column_type),
        }));
        ReportRow { key, cells }
    }).collect();
    Report { columns, rows }
}

pub fn html_options(buckets: &[Bucket]) -> HtmlOptions {
    let max = buckets.iter().map(|b| b.count).max().unwrap_or(0);
    HtmlOptions { colorize: BTreeMap::from([(COUNT_HEADER.to_string(), max as f64)]), ..Default::default() }
}
