use crate::error::{Error, Result};
use crate::group::GroupKey;
use crate::summarize::{SummaryCell, SummaryRecords, SummaryRow};
use crate::value::Value;
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortBy { Value, Prev }

impl SortBy {
    fn pick(self, cell: &SummaryCell) -> Option<&Value> {
        match self { SortBy::Value => cell.value.as_ref(), SortBy::Prev => cell.prev.as_ref() }
    }
}

pub fn resolve_keys(records: &SummaryRecords, names: &[String]) -> Result<Vec<usize>> {
    names.iter().map(|n| records.index_of(n).ok_or_else(|| Error::UnknownSortKey(n.clone()))).collect()
}

/// Higher first; an absent value sorts after any present one.
fn descending(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.compare(a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn compare(a: &SummaryRow, b: &SummaryRow, keys: &[usize], by: SortBy) -> Ordering {
    keys.iter()
        .map(|&k| descending(by.pick(&a.cells[k]), by.pick(&b.cells[k])))
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal)
}

pub fn sort_rows(rows: &mut [SummaryRow], keys: &[usize], by: SortBy) {
    rows.sort_by(|a, b| compare(a, b, keys, by));
}

/// 1-based rank each group held under the previous run's own ordering.
/// Only groups present in both runs are ranked; the rows are not reordered.
pub fn prev_ranks(rows: &[SummaryRow], keys: &[usize]) -> HashMap<GroupKey, usize> {
    let mut prev: Vec<&SummaryRow> = rows.iter().filter(|r| r.has_prev).collect();
    prev.sort_by(|a, b| compare(a, b, keys, SortBy::Prev));
    prev.into_iter().enumerate().map(|(i, r)| (r.key, i + 1)).collect()
}
