use crate::error::{Error, Result};
use crate::extract::{extract, LogRecords, ParseOptions};
use crate::format::{format_rows, ColumnFormat, FormatOptions, Report};
use crate::group::Grouper;
use crate::html::HtmlOptions;
use crate::query::Query;
use crate::sort::{prev_ranks, sort_rows, SortBy};
use crate::summarize::{summarize, SummaryRecords};
use std::io::BufRead;
use std::sync::Arc;
use std::time::Instant;

pub struct Lap {
    last: Instant,
}

impl Lap {
    pub fn start() -> Self { Self { last: Instant::now() } }

    pub fn lap(&mut self, stage: &str) {
        log::debug!("{} ({} ms)", stage, self.last.elapsed().as_millis());
        self.last = Instant::now();
    }
}

/// A fully resolved analyzer. Immutable once built; runs share it through `Arc`.
#[derive(Clone, Debug)]
pub struct Pipeline {
    pub name: String,
    pub parse: ParseOptions,
    pub queries: Vec<Query>,
    pub formats: Vec<ColumnFormat>,
    pub sort_keys: Vec<usize>,
    pub limit: usize,
    pub show_rank: bool,
    pub diffs: Vec<String>,
}

impl Pipeline {
    pub fn matches(&self, line: &str) -> bool { self.parse.pattern.is_match(line) }

    pub fn html_options(&self) -> HtmlOptions {
        HtmlOptions { show_rank: self.show_rank, diff_headers: self.diffs.clone(), ..Default::default() }
    }

    pub fn parse<R: BufRead>(&self, reader: R, grouper: &Grouper) -> Result<LogRecords> { extract(&self.parse, grouper, reader) }

    /// Summarize, rank, sort and format already parsed records. `limit`
    /// overrides the configured row limit.
    pub fn analyze(&self, current: &LogRecords, prev: Option<&LogRecords>, limit: Option<usize>) -> Result<Report> {
        let mut lap = Lap::start();
        let SummaryRecords { columns, mut rows } = summarize(current, &self.queries, prev)?;
        lap.lap("summarized");
        let ranks = (self.show_rank && prev.is_some()).then(|| prev_ranks(&rows, &self.sort_keys));
        sort_rows(&mut rows, &self.sort_keys, SortBy::Value);
        lap.lap("sorted");
        let options = FormatOptions { columns: self.formats.clone(), limit: limit.unwrap_or(self.limit), add_rank: self.show_rank, prev_ranks: ranks };
        let report = format_rows(&columns, &rows, &options);
        lap.lap("formatted");
        Ok(report)
    }

    pub fn run(&self, current: &mut dyn BufRead, prev: Option<&mut dyn BufRead>, grouper: &Grouper, limit: Option<usize>) -> Result<Report> {
        let mut lap = Lap::start();
        let cur = self.parse(current, grouper)?;
        lap.lap("parsed current");
        let old = match prev {
            Some(r) => {
                let p = self.parse(r, grouper)?;
                lap.lap("parsed previous");
                Some(p)
            }
            None => None,
        };
        self.analyze(&cur, old.as_ref(), limit)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Analyzers {
    pipelines: Vec<Arc<Pipeline>>,
}

impl Analyzers {
    pub fn new(pipelines: Vec<Arc<Pipeline>>) -> Self { Self { pipelines } }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Pipeline>> { self.pipelines.iter() }

    pub fn by_name(&self, name: &str) -> Result<Arc<Pipeline>> {
        self.pipelines.iter().find(|p| p.name == name).cloned().ok_or_else(|| Error::UnknownAnalyzer(name.to_string()))
    }

    pub fn detect(&self, line: &str) -> Option<Arc<Pipeline>> {
        let found = self.pipelines.iter().find(|p| p.matches(line)).cloned();
        match &found {
            Some(p) => log::debug!("matched analyzer '{}'", p.name),
            None => log::debug!("no analyzer matches {:?}", line),
        }
        found
    }

    pub fn select(&self, name: Option<&str>, first_line: Option<&str>) -> Result<Arc<Pipeline>> {
        match name {
            Some(n) => self.by_name(n),
            None => first_line.and_then(|l| self.detect(l)).ok_or(Error::NoAnalyzerMatched),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::value::Value;

    const CONFIG: &str = r#"
[[analyzers]]
name = "kv"
pattern = '^key=(?P<Key>\w+) n=(?P<N>\d+)$'
grouping_keys = ["Key"]
sort_keys = ["Total"]
show_rank = true
diffs = ["Total"]

[[analyzers.columns]]
name = "Key"

[[analyzers.columns]]
name = "N"
converters = [{ type = "parseInt" }]

[[analyzers.queries]]
from = "Key"

[[analyzers.queries]]
name = "Total"
from = "N"
function = "sum"

[[analyzers]]
name = "words"
pattern = '^(?P<Word>\w+)$'
grouping_keys = ["Word"]

[[analyzers.columns]]
name = "Word"

[[analyzers.queries]]
name = "Count"
from = "Word"
function = "count"
"#;

    fn analyzers() -> Analyzers { Config::from_toml_str(CONFIG).unwrap().resolve().unwrap() }

    #[test]
    fn detects_by_first_line() {
        let a = analyzers();
        assert_eq!(a.detect("key=a n=1").unwrap().name, "kv");
        assert_eq!(a.detect("hello").unwrap().name, "words");
        assert!(a.detect("two words").is_none());
        assert!(matches!(a.select(None, Some("two words")), Err(Error::NoAnalyzerMatched)));
        assert!(matches!(a.select(Some("nope"), None), Err(Error::UnknownAnalyzer(_))));
    }

    #[test]
    fn ranks_against_previous_run() {
        let p = analyzers().by_name("kv").unwrap();
        let grouper = Grouper::with_seed(11);
        let mut cur = "key=a n=1\nkey=b n=5\nkey=c n=3\n".as_bytes();
        let mut old = "key=a n=9\nkey=b n=1\n".as_bytes();
        let report = p.run(&mut cur, Some(&mut old), &grouper, None).unwrap();
        let keys: Vec<&str> = report.rows.iter().map(|r| r.cells[1].text.as_str()).collect();
        assert_eq!(keys, vec!["b", "c", "a"]);
        // b was second last time, a was first
        assert_eq!(report.rows[0].cells[0].prev_raw, Some(Value::Int(2)));
        assert_eq!(report.rows[1].cells[0].prev_raw, None);
        assert_eq!(report.rows[2].cells[0].prev_raw, Some(Value::Int(1)));
        assert_eq!(report.rows[0].cells[2].prev_raw, Some(Value::Int(1)));
    }

    #[test]
    fn identical_rerun_has_no_diff() {
        let p = analyzers().by_name("kv").unwrap();
        let grouper = Grouper::with_seed(4);
        let input = "key=a n=1\nkey=b n=5\nkey=c n=3\nkey=a n=2\n";
        let (mut cur, mut old) = (input.as_bytes(), input.as_bytes());
        let report = p.run(&mut cur, Some(&mut old), &grouper, None).unwrap();
        assert_eq!(report.rows.len(), 3);
        for row in &report.rows {
            for cell in &row.cells {
                assert_eq!(cell.diff(), 0.0);
                assert_eq!(cell.prev_raw, cell.raw);
            }
        }
        let table = report.to_html(&p.html_options());
        let diff_columns: Vec<usize> = table.headers.iter().enumerate().filter(|(_, h)| h.attributes.contains_key("data-diff")).map(|(i, _)| i).collect();
        assert_eq!(diff_columns.len(), 2);
        for row in &table.rows {
            for &i in &diff_columns { assert_eq!(row.cells[i].text, ""); }
        }
    }

    #[test]
    fn limit_override() {
        let p = analyzers().by_name("words").unwrap();
        let mut cur = "a\nb\nc\n".as_bytes();
        let report = p.run(&mut cur, None, &Grouper::with_seed(0), Some(2)).unwrap();
        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.columns.len(), 1);
    }
}
