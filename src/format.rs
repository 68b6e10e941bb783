use crate::group::GroupKey;
use crate::extract::Column;
use crate::summarize::SummaryRow;
use crate::value::{ColumnType, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::iter::Peekable;
use std::str::Chars;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment { Left, Right }

impl Alignment {
    pub fn for_type(ty: ColumnType) -> Self { if ty.is_numeric() { Alignment::Right } else { Alignment::Left } }
    pub fn as_str(self) -> &'static str { match self { Alignment::Left => "left", Alignment::Right => "right" } }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ColumnFormat {
    pub format: Option<String>,
    pub alignment: Option<Alignment>,
    pub humanize_bytes: bool,
}

#[derive(Clone, Debug, Default)]
pub struct FormatOptions {
    pub columns: Vec<ColumnFormat>,
    /// 0 keeps every row.
    pub limit: usize,
    pub add_rank: bool,
    pub prev_ranks: Option<HashMap<GroupKey, usize>>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReportColumn {
    pub name: String,
    pub alignment: Alignment,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReportCell {
    pub text: String,
    pub raw: Option<Value>,
    pub prev_raw: Option<Value>,
    #[serde(skip)]
    pub alignment: Alignment,
}

impl ReportCell {
    /// Relative change against the previous raw value. Integer baselines of
    /// zero and float baselines under 0.1 count as no change.
    pub fn diff(&self) -> f64 {
        match (&self.raw, &self.prev_raw) {
            (Some(Value::Int(v)), Some(Value::Int(p))) | (Some(Value::Int64(v)), Some(Value::Int64(p))) => {
                if *p == 0 { 0.0 } else { (*v as f64 - *p as f64) / *p as f64 }
            }
            (Some(Value::Float64(v)), Some(Value::Float64(p))) => if *p < 0.1 { 0.0 } else { (v - p) / p },
            _ => 0.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReportRow {
    pub key: GroupKey,
    pub cells: Vec<ReportCell>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Report {
    pub columns: Vec<ReportColumn>,
    pub rows: Vec<ReportRow>,
}

pub const RANK_HEADER: &str = "#";
const ABSENT: &str = "-";

pub fn format_rows(summary_columns: &[Column], rows: &[SummaryRow], options: &FormatOptions) -> Report {
    let default = ColumnFormat::default();
    let fmt_of = |i: usize| options.columns.get(i).unwrap_or(&default);
    let align_of = |i: usize| fmt_of(i).alignment.unwrap_or_else(|| Alignment::for_type(summary_columns[i].column_type));

    let mut columns = Vec::with_capacity(summary_columns.len() + 1);
    if options.add_rank { columns.push(ReportColumn { name: RANK_HEADER.to_string(), alignment: Alignment::Right }); }
    columns.extend(summary_columns.iter().enumerate().map(|(i, c)| ReportColumn { name: c.name.clone(), alignment: align_of(i) }));

    let take = if options.limit == 0 { rows.len() } else { options.limit.min(rows.len()) };
    let rows = rows[..take].iter().enumerate().map(|(j, row)| {
        let mut cells = Vec::with_capacity(columns.len());
        if options.add_rank {
            let prev = options.prev_ranks.as_ref().and_then(|m| m.get(&row.key)).map(|&r| Value::Int(r as i64));
            cells.push(ReportCell { text: (j + 1).to_string(), raw: Some(Value::Int(j as i64 + 1)), prev_raw: prev, alignment: Alignment::Right });
        }
        for (i, cell) in row.cells.iter().enumerate() {
            let f = fmt_of(i);
            let text = match (&cell.value, cell.value.as_ref().and_then(Value::as_f64)) {
                (None, _) => ABSENT.to_string(),
                (Some(_), Some(n)) if f.humanize_bytes => sprintf(f.format.as_deref().unwrap_or("%v"), &Value::Str(humanize_bytes(n))),
                (Some(v), _) => {
                    let default = if summary_columns[i].column_type.is_float() { "%.3f" } else { "%v" };
                    sprintf(f.format.as_deref().unwrap_or(default), v)
                }
            };
            cells.push(ReportCell { text, raw: cell.value.clone(), prev_raw: cell.prev.clone(), alignment: align_of(i) });
        }
        ReportRow { key: row.key, cells }
    }).collect();
    Report { columns, rows }
}

/// 1024-based, one decimal: `1536` renders as `1.5 KB`.
pub fn humanize_bytes(n: f64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut v = n;
    let mut unit = 0;
    while v.abs() >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", v, UNITS[unit])
}

#[derive(Default)]
struct Verb {
    minus: bool,
    plus: bool,
    zero: bool,
    space: bool,
    width: Option<usize>,
    precision: Option<usize>,
}

fn digits(chars: &mut Peekable<Chars<'_>>) -> Option<usize> {
    let mut n: Option<usize> = None;
    while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
        n = Some(n.unwrap_or(0) * 10 + d as usize);
        chars.next();
    }
    n
}

/// printf-style rendering of one value: flags `-+0 `, width, precision and
/// the verbs `v s d f F e E g x X %`. Misuse renders an inline marker
/// (`%!d(string=..)`, `%!v(MISSING)`) instead of failing.
pub fn sprintf(format: &str, value: &Value) -> String {
    let mut out = String::with_capacity(format.len() + 8);
    let mut chars = format.chars().peekable();
    let mut arg = Some(value);
    while let Some(c) = chars.next() {
        if c != '%' { out.push(c); continue; }
        let mut spec = Verb::default();
        while let Some(&f) = chars.peek() {
            match f { '-' => spec.minus = true, '+' => spec.plus = true, '0' => spec.zero = true, ' ' => spec.space = true, '#' => {}, _ => break }
            chars.next();
        }
        spec.width = digits(&mut chars);
        if chars.peek() == Some(&'.') {
            chars.next();
            spec.precision = Some(digits(&mut chars).unwrap_or(0));
        }
        let Some(verb) = chars.next() else { out.push_str("%!(NOVERB)"); break };
        if verb == '%' { out.push('%'); continue; }
        match arg.take() {
            Some(v) => out.push_str(&spec.render(v, verb)),
            None => out.push_str(&format!("%!{}(MISSING)", verb)),
        }
    }
    if let Some(v) = arg { out.push_str(&format!("%!(EXTRA {}={})", v.column_type(), v)); }
    out
}

impl Verb {
    fn render(&self, v: &Value, verb: char) -> String {
        let numeric = v.column_type().is_numeric();
        let body = match (verb, v) {
            ('d', Value::Int(i) | Value::Int64(i)) => self.sign(i.to_string()),
            ('x', Value::Int(i) | Value::Int64(i)) => self.sign(if *i < 0 { format!("-{:x}", i.unsigned_abs()) } else { format!("{:x}", i) }),
            ('X', Value::Int(i) | Value::Int64(i)) => self.sign(if *i < 0 { format!("-{:X}", i.unsigned_abs()) } else { format!("{:X}", i) }),
            ('x', Value::Str(s)) => s.bytes().map(|b| format!("{:02x}", b)).collect(),
            ('X', Value::Str(s)) => s.bytes().map(|b| format!("{:02X}", b)).collect(),
            ('f' | 'F' | 'e' | 'E', _) if numeric => match v.as_f64() {
                Some(f) if !f.is_finite() => self.sign(if f.is_nan() { "NaN".into() } else if f > 0.0 { "+Inf".into() } else { "-Inf".into() }),
                Some(f) if verb == 'e' || verb == 'E' => self.sign(exponent(f, self.precision.unwrap_or(6), verb == 'E')),
                Some(f) => self.sign(format!("{:.*}", self.precision.unwrap_or(6), f)),
                None => bad(verb, v),
            },
            ('g' | 'v', _) if numeric => self.sign(v.to_string()),
            ('s' | 'v', Value::Str(s)) => match self.precision { Some(p) => s.chars().take(p).collect(), None => s.clone() },
            ('s' | 'v', Value::DateTime(_)) => v.to_string(),
            _ => bad(verb, v),
        };
        self.pad(body, numeric)
    }

    fn sign(&self, s: String) -> String {
        if s.starts_with(['-', '+']) { return s; }
        if self.plus { format!("+{}", s) } else if self.space { format!(" {}", s) } else { s }
    }

    fn pad(&self, body: String, numeric: bool) -> String {
        let len = body.chars().count();
        let Some(width) = self.width.filter(|&w| w > len) else { return body };
        let fill = width - len;
        if self.minus { return format!("{}{}", body, " ".repeat(fill)); }
        if self.zero && numeric {
            let split = if body.starts_with(['-', '+', ' ']) { 1 } else { 0 };
            return format!("{}{}{}", &body[..split], "0".repeat(fill), &body[split..]);
        }
        format!("{}{}", " ".repeat(fill), body)
    }
}

fn bad(verb: char, v: &Value) -> String { format!("%!{}({}={})", verb, v.column_type(), v) }

fn exponent(f: f64, precision: usize, upper: bool) -> String {
    let s = format!("{:.*e}", precision, f);
    let (mantissa, exp) = s.split_once('e').unwrap_or((s.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let e = if upper { 'E' } else { 'e' };
    format!("{}{}{}{:02}", mantissa, e, if exp < 0 { '-' } else { '+' }, exp.abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::Grouper;
    use crate::summarize::SummaryCell;

    #[test]
    fn printf_subset() {
        assert_eq!(sprintf("%.3f", &Value::Float64(0.0156)), "0.016");
        assert_eq!(sprintf("%v", &Value::Int(42)), "42");
        assert_eq!(sprintf("%5d|", &Value::Int(42)), "   42|");
        assert_eq!(sprintf("%-5d|", &Value::Int(42)), "42   |");
        assert_eq!(sprintf("%05.1f", &Value::Float64(-2.5)), "-02.5");
        assert_eq!(sprintf("%+d", &Value::Int(3)), "+3");
        assert_eq!(sprintf("%.2f%%", &Value::Float64(12.5)), "12.50%");
        assert_eq!(sprintf("%x", &Value::Int(255)), "ff");
        assert_eq!(sprintf("%.2s", &Value::Str("abc".into())), "ab");
        assert_eq!(sprintf("%e", &Value::Float64(1500.0)), "1.500000e+03");
        assert_eq!(sprintf("%.1f", &Value::Int(3)), "3.0");
    }

    #[test]
    fn printf_misuse_is_rendered_inline() {
        assert_eq!(sprintf("%d", &Value::Str("x".into())), "%!d(string=x)");
        assert_eq!(sprintf("%v %v", &Value::Int(1)), "1 %!v(MISSING)");
        assert_eq!(sprintf("total", &Value::Int(1)), "total%!(EXTRA int=1)");
    }

    #[test]
    fn humanizes_bytes() {
        assert_eq!(humanize_bytes(1536.0), "1.5 KB");
        assert_eq!(humanize_bytes(0.0), "0.0 B");
        assert_eq!(humanize_bytes(1020.0), "1020.0 B");
        assert_eq!(humanize_bytes(3.0 * 1024.0 * 1024.0 * 1024.0), "3.0 GB");
    }

    #[test]
    fn diff_guards_small_baselines() {
        let cell = |raw: Value, prev: Value| ReportCell { text: String::new(), raw: Some(raw), prev_raw: Some(prev), alignment: Alignment::Right };
        assert_eq!(cell(Value::Int(15), Value::Int(10)).diff(), 0.5);
        assert_eq!(cell(Value::Int(15), Value::Int(0)).diff(), 0.0);
        assert_eq!(cell(Value::Float64(1.0), Value::Float64(0.05)).diff(), 0.0);
        assert_eq!(cell(Value::Float64(1.0), Value::Float64(2.0)).diff(), -0.5);
        let extreme = cell(Value::Int64(i64::MAX), Value::Int64(-1)).diff();
        assert!(extreme.is_finite() && extreme < -9.0e18);
        let fresh = ReportCell { text: String::new(), raw: Some(Value::Int(1)), prev_raw: None, alignment: Alignment::Right };
        assert_eq!(fresh.diff(), 0.0);
    }

    fn records(totals: &[Option<f64>]) -> (Vec<Column>, Vec<SummaryRow>) {
        let g = Grouper::with_seed(0);
        let rows: Vec<SummaryRow> = totals.iter().enumerate().map(|(i, t)| SummaryRow {
            key: g.key(&[Value::Int(i as i64)]),
            cells: vec![
                SummaryCell { value: Some(Value::Str(format!("/{}", i))), prev: None },
                SummaryCell { value: t.map(Value::Float64), prev: None },
                SummaryCell { value: Some(Value::Int(1536)), prev: None },
            ],
            has_prev: false,
        }).collect();
        let columns = vec![
            Column { name: "Url".into(), column_type: ColumnType::String },
            Column { name: "Total".into(), column_type: ColumnType::Float64 },
            Column { name: "Bytes".into(), column_type: ColumnType::Int },
        ];
        (columns, rows)
    }

    #[test]
    fn ranks_defaults_and_absent_values() {
        let (rec, rows) = records(&[Some(5.0), Some(1.0), None]);
        let options = FormatOptions { columns: vec![], limit: 0, add_rank: true, prev_ranks: None };
        let report = format_rows(&rec, &rows, &options);
        let names: Vec<&str> = report.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["#", "Url", "Total", "Bytes"]);
        assert_eq!(report.columns[1].alignment, Alignment::Left);
        assert_eq!(report.columns[2].alignment, Alignment::Right);
        let ranks: Vec<&str> = report.rows.iter().map(|r| r.cells[0].text.as_str()).collect();
        assert_eq!(ranks, vec!["1", "2", "3"]);
        assert_eq!(report.rows[0].cells[2].text, "5.000");
        assert_eq!(report.rows[2].cells[2].text, "-");
        assert_eq!(report.rows[2].cells[2].raw, None);
    }

    #[test]
    fn limit_keeps_first_n() {
        let (rec, rows) = records(&[Some(3.0), Some(2.0), Some(1.0)]);
        let report = format_rows(&rec, &rows, &FormatOptions { limit: 2, ..Default::default() });
        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.rows[1].cells[0].text, "/1");
    }

    #[test]
    fn humanize_only_touches_text() {
        let (rec, rows) = records(&[Some(1.0)]);
        let columns = vec![ColumnFormat::default(), ColumnFormat::default(), ColumnFormat { humanize_bytes: true, ..Default::default() }];
        let report = format_rows(&rec, &rows, &FormatOptions { columns, ..Default::default() });
        assert_eq!(report.rows[0].cells[2].text, "1.5 KB");
        assert_eq!(report.rows[0].cells[2].raw, Some(Value::Int(1536)));
    }

    #[test]
    fn prev_rank_attached_only_when_known() {
        let (rec, rows) = records(&[Some(2.0), Some(1.0)]);
        let prev_ranks = HashMap::from([(rows[1].key, 1usize)]);
        let report = format_rows(&rec, &rows, &FormatOptions { add_rank: true, prev_ranks: Some(prev_ranks), ..Default::default() });
        assert_eq!(report.rows[0].cells[0].prev_raw, None);
        assert_eq!(report.rows[1].cells[0].prev_raw, Some(Value::Int(1)));
    }
}
