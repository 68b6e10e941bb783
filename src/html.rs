use crate::format::Report;
use crate::group::GroupKey;
use crate::value::Value;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default)]
pub struct HtmlOptions {
    pub show_rank: bool,
    /// Columns followed by a synthetic `(diff)` column.
    pub diff_headers: Vec<String>,
    /// Column name to the value that maps to full heatmap intensity.
    pub colorize: BTreeMap<String, f64>,
}

impl HtmlOptions {
    pub fn is_diff_header(&self, name: &str) -> bool { self.diff_headers.iter().any(|h| h == name) }
}

type Attrs = BTreeMap<String, String>;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct HtmlHeader {
    pub text: String,
    pub attributes: Attrs,
    pub style: Attrs,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct HtmlCell {
    pub text: String,
    pub attributes: Attrs,
    pub style: Attrs,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HtmlRow {
    pub key: GroupKey,
    pub cells: Vec<HtmlCell>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HtmlTable {
    pub headers: Vec<HtmlHeader>,
    pub rows: Vec<HtmlRow>,
}

fn attrs<const N: usize>(pairs: [(&str, String); N]) -> Attrs { pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect() }

fn diff_marker() -> Attrs { attrs([("data-diff", "true".to_string())]) }

impl Report {
    /// Cell matrix with `data-value`/`data-prev-value` on every cell, a
    /// `(diff)` column after each diff header and, when ranked, a rank
    /// movement column right after the rank.
    pub fn to_html(&self, options: &HtmlOptions) -> HtmlTable {
        let mut headers = Vec::with_capacity(self.columns.len() * 2);
        for (i, column) in self.columns.iter().enumerate() {
            let style = attrs([("text-align", column.alignment.as_str().to_string())]);
            let mut attributes = Attrs::new();
            if let Some(max) = options.colorize.get(&column.name) { attributes.insert("data-colorize".into(), max.to_string()); }
            headers.push(HtmlHeader { text: column.name.clone(), attributes, style: style.clone() });
            if options.is_diff_header(&column.name) {
                headers.push(HtmlHeader { text: "(diff)".into(), attributes: diff_marker(), style: Attrs::new() });
            }
            if options.show_rank && i == 0 {
                headers.push(HtmlHeader { text: String::new(), attributes: diff_marker(), style });
            }
        }

        let divisor = (self.rows.len() / 6).max(1) as f64;
        let rows = self.rows.iter().map(|row| {
            let mut cells = Vec::with_capacity(headers.len());
            for (i, cell) in row.cells.iter().enumerate() {
                let mut attributes = Attrs::new();
                if let Some(raw) = &cell.raw { attributes.insert("data-value".into(), raw.to_string()); }
                if let Some(prev) = &cell.prev_raw { attributes.insert("data-prev-value".into(), prev.to_string()); }
                cells.push(HtmlCell {
                    text: html_escape(&cell.text).replace(' ', "&nbsp;"),
                    attributes,
                    style: attrs([("text-align", cell.alignment.as_str().to_string())]),
                });
                if self.columns.get(i).is_some_and(|c| options.is_diff_header(&c.name)) {
                    let diff = cell.diff();
                    cells.push(if diff.abs() < 0.01 { HtmlCell::default() } else {
                        HtmlCell { text: format!("({:+}%)", (diff * 100.0) as i64), attributes: attrs([("data-value", diff.to_string())]), style: Attrs::new() }
                    });
                }
                if options.show_rank && i == 0 { cells.push(rank_movement(&cell.raw, &cell.prev_raw, divisor)); }
            }
            HtmlRow { key: row.key, cells }
        }).collect();
        HtmlTable { headers, rows }
    }
}

fn rank_movement(raw: &Option<Value>, prev: &Option<Value>, divisor: f64) -> HtmlCell {
    let (Some(Value::Int(now)), Some(Value::Int(before))) = (raw, prev) else { return HtmlCell::default() };
    if *before == 0 { return HtmlCell::default(); }
    let text = match now.cmp(before) {
        std::cmp::Ordering::Greater => format!("(↘︎{})", now - before),
        std::cmp::Ordering::Less => format!("(↗︎{})", before - now),
        std::cmp::Ordering::Equal => String::new(),
    };
    HtmlCell { text, attributes: attrs([("data-value", ((before - now) as f64 / divisor).to_string())]), style: Attrs::new() }
}

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

fn render_attrs(attributes: &Attrs, style: &Attrs) -> String {
    let mut s = String::new();
    for (k, v) in attributes { s.push_str(&format!(" {}=\"{}\"", k, html_escape(v))); }
    if !style.is_empty() {
        let css: Vec<String> = style.iter().map(|(k, v)| format!("{}:{}", k, v)).collect();
        s.push_str(&format!(" style=\"{}\"", html_escape(&css.join(";"))));
    }
    s
}

const HEATMAP_JS: &str = "(function(){function clamp(v,a,b){return Math.min(Math.max(v,a),b);}function heat(v){v=clamp(v,-1,1);return 'color-mix(in srgb, '+(v>0?'#84cc16':'#fb7185')+' '+(Math.abs(v)*100)+'%, transparent)';}window.addEventListener('load',function(){var diff=[],colorize=[];document.querySelectorAll('thead th').forEach(function(th,i){if(th.dataset.diff){diff.push(i);}if(th.dataset.colorize){colorize.push({index:i,max:parseFloat(th.dataset.colorize)});}});var body=document.querySelector('tbody');if(!body)return;Array.from(body.children).forEach(function(tr){var cells=Array.from(tr.children);diff.forEach(function(i){var c=cells[i];if(c&&c.dataset.value!==undefined){c.style.backgroundColor=heat(parseFloat(c.dataset.value));if(cells[i-1]){cells[i-1].style.backgroundColor=heat(parseFloat(c.dataset.value));}}});colorize.forEach(function(item){var c=cells[item.index];if(c&&c.dataset.value!==undefined&&item.max>0){c.style.backgroundColor=heat(parseFloat(c.dataset.value)/item.max);}});});});})();";

pub fn render_page(title: &str, subtitle: &[String], table: &HtmlTable) -> String {
    let mut s = String::new();
    s.push_str("<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\"><meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">");
    s.push_str(&format!("<title>{}</title><style>", html_escape(title)));
    s.push_str(":root{--bg:#f7fafc;--fg:#111827;--muted:#6b7280;--card:#ffffff;--border:#e5e7eb} body{margin:0;background:var(--bg);color:var(--fg);font-family:system-ui,-apple-system,Arial,sans-serif} .container{max-width:1400px;margin:0 auto;padding:24px} .title{font-size:20px;font-weight:600;margin-bottom:4px} .sub{color:var(--muted);font-size:13px} .table{border-collapse:separate;border-spacing:0;background:var(--card);border:1px solid var(--border);border-radius:10px;overflow:hidden;margin-top:16px;font-family:Consolas,Monaco,monospace;font-size:13px} .table th{position:sticky;top:0;background:#f3f4f6;font-weight:600;padding:6px 10px;border-bottom:1px solid var(--border);white-space:nowrap} .table td{padding:4px 10px;border-bottom:1px solid var(--border);white-space:nowrap} .footer{margin-top:22px;color:var(--muted);font-size:12px}");
    s.push_str("</style><script>");
    s.push_str(HEATMAP_JS);
    s.push_str("</script></head><body><div class=\"container\">");
    s.push_str(&format!("<div class=\"title\">{}</div>", html_escape(title)));
    for line in subtitle { s.push_str(&format!("<div class=\"sub\">{}</div>", html_escape(line))); }
    s.push_str("<table class=\"table\"><thead><tr>");
    for h in &table.headers { s.push_str(&format!("<th{}>{}</th>", render_attrs(&h.attributes, &h.style), html_escape(&h.text))); }
    s.push_str("</tr></thead><tbody>");
    for row in &table.rows {
        s.push_str(&format!("<tr data-key=\"{}\">", row.key));
        for c in &row.cells { s.push_str(&format!("<td{}>{}</td>", render_attrs(&c.attributes, &c.style), c.text)); }
        s.push_str("</tr>");
    }
    s.push_str("</tbody></table>");
    s.push_str(&format!("<div class=\"footer\">Generated by tallylog {}</div></div></body></html>", env!("CARGO_PKG_VERSION")));
    s
}
