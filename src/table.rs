use crate::format::{Alignment, Report};
use comfy_table::{CellAlignment, ContentArrangement, Table};
use std::io::{self, Write};

impl Report {
    fn widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.name.chars().count()).collect();
        for row in &self.rows {
            for (w, cell) in widths.iter_mut().zip(&row.cells) { *w = (*w).max(cell.text.chars().count()); }
        }
        widths
    }

    pub fn write_text<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let widths = self.widths();
        let header = self.columns.iter().map(|c| c.name.as_str());
        write_line(w, header, &widths, &self.alignments())?;
        for row in &self.rows {
            write_line(w, row.cells.iter().map(|c| c.text.as_str()), &widths, &self.alignments())?;
        }
        Ok(())
    }

    fn alignments(&self) -> Vec<Alignment> { self.columns.iter().map(|c| c.alignment).collect() }

    pub fn to_text(&self) -> String {
        let mut buf = Vec::new();
        // writing into a Vec cannot fail
        let _ = self.write_text(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }

    pub fn to_comfy_table(&self) -> Table {
        let mut table = Table::new();
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(self.columns.iter().map(|c| c.name.clone()));
        for row in &self.rows { table.add_row(row.cells.iter().map(|c| c.text.clone())); }
        for (i, c) in self.columns.iter().enumerate() {
            if c.alignment == Alignment::Right && let Some(col) = table.column_mut(i) { col.set_cell_alignment(CellAlignment::Right); }
        }
        table
    }

    pub fn write_csv<W: Write>(&self, w: W) -> csv::Result<()> {
        let mut wtr = csv::Writer::from_writer(w);
        wtr.write_record(self.columns.iter().map(|c| c.name.as_str()))?;
        for row in &self.rows { wtr.write_record(row.cells.iter().map(|c| c.text.as_str()))?; }
        wtr.flush()?;
        Ok(())
    }
}

fn write_line<'a, W: Write>(w: &mut W, cells: impl Iterator<Item = &'a str>, widths: &[usize], align: &[Alignment]) -> io::Result<()> {
    for (i, cell) in cells.enumerate() {
        if i > 0 { w.write_all(b"  ")?; }
        match align[i] {
            Alignment::Right => write!(w, "{:>width$}", cell, width = widths[i])?,
            Alignment::Left => write!(w, "{:<width$}", cell, width = widths[i])?,
        }
    }
    writeln!(w)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{ReportCell, ReportColumn, ReportRow};
    use crate::group::Grouper;
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    fn report() -> Report {
        let g = Grouper::with_seed(0);
        let cell = |t: &str, a| ReportCell { text: t.into(), raw: Some(Value::Str(t.into())), prev_raw: None, alignment: a };
        Report {
            columns: vec![
                ReportColumn { name: "#".into(), alignment: Alignment::Right },
                ReportColumn { name: "Url".into(), alignment: Alignment::Left },
                ReportColumn { name: "Total".into(), alignment: Alignment::Right },
            ],
            rows: vec![
                ReportRow { key: g.key(&[Value::Int(1)]), cells: vec![cell("1", Alignment::Right), cell("/api/users", Alignment::Left), cell("12.500", Alignment::Right)] },
                ReportRow { key: g.key(&[Value::Int(2)]), cells: vec![cell("2", Alignment::Right), cell("/", Alignment::Left), cell("0.010", Alignment::Right)] },
            ],
        }
    }

    #[test]
    fn fixed_width_text() {
        let expected = concat!(
            "#  Url          Total\n",
            "1  /api/users  12.500\n",
            "2  /            0.010\n",
        );
        assert_eq!(report().to_text(), expected);
    }

    #[test]
    fn widths_count_characters() {
        let mut r = report();
        r.rows[1].cells[1].text = "/café".into();
        let text = r.to_text();
        let lines: Vec<usize> = text.lines().map(|l| l.chars().count()).collect();
        assert!(lines.iter().all(|&n| n == lines[0]));
    }

    #[test]
    fn csv_has_header_and_rendered_cells() {
        let mut out = Vec::new();
        report().write_csv(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "#,Url,Total\n1,/api/users,12.500\n2,/,0.010\n");
    }

    #[test]
    fn comfy_table_contains_cells() {
        let rendered = report().to_comfy_table().to_string();
        assert!(rendered.contains("/api/users"));
        assert!(rendered.contains("12.500"));
    }
}
