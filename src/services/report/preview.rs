use std::fmt::Write as _;

use crate::services::dataset::Dataset;

pub const PREVIEW_ROWS: usize = 10;
const TABLE_CLASSES: &str = "dataframe table table-striped table-sm";

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// HTML table of the first [`PREVIEW_ROWS`] rows, with a leading row-index column.
pub fn preview_table(dataset: &Dataset) -> String {
    let rows = dataset.height().min(PREVIEW_ROWS);
    let mut html = String::with_capacity(256 + rows * dataset.width() * 24);

    let _ = writeln!(html, "<table border=\"1\" class=\"{}\">", TABLE_CLASSES);
    let _ = writeln!(html, "  <thead>");
    let _ = write!(html, "    <tr style=\"text-align: right;\">\n      <th></th>\n");
    for column in dataset.columns() {
        let _ = writeln!(html, "      <th>{}</th>", escape_html(&column.name));
    }
    let _ = writeln!(html, "    </tr>\n  </thead>");

    let _ = writeln!(html, "  <tbody>");
    for row in 0..rows {
        let _ = writeln!(html, "    <tr>\n      <th>{}</th>", row);
        for column in dataset.columns() {
            let _ = writeln!(html, "      <td>{}</td>", escape_html(&column.display(row)));
        }
        let _ = writeln!(html, "    </tr>");
    }
    let _ = writeln!(html, "  </tbody>");
    html.push_str("</table>");
    html
}
