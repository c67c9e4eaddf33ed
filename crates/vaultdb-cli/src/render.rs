use anyhow::Result;
use clap::ValueEnum;
use vaultdb_core::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

pub fn render(rows: &[Row], columns: &[String], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Table => Ok(render_table(rows, columns)),
        OutputFormat::Json => render_json(rows),
        OutputFormat::Csv => Ok(render_csv(rows, columns)),
    }
}

fn header(columns: &[String]) -> Vec<String> {
    std::iter::once("id".to_string())
        .chain(columns.iter().cloned())
        .collect()
}

fn cells(row: &Row) -> Vec<String> {
    std::iter::once(row.id().to_string())
        .chain(row.fields().iter().map(|(_, value)| value.to_string()))
        .collect()
}

fn render_table(rows: &[Row], columns: &[String]) -> String {
    if rows.is_empty() {
        return "(no rows)\n".to_string();
    }
    let header = header(columns);
    let body: Vec<Vec<String>> = rows.iter().map(cells).collect();
    let widths: Vec<usize> = (0..header.len())
        .map(|i| {
            body.iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(header[i].chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<w$}", cell, w = *width))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };
    let separator = widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>()
        .join("-+-");

    let mut out = String::new();
    out.push_str(&line(&header));
    out.push('\n');
    out.push_str(&separator);
    out.push('\n');
    for row in &body {
        out.push_str(&line(row));
        out.push('\n');
    }
    out
}

fn render_json(rows: &[Row]) -> Result<String> {
    let records: Vec<serde_json::Value> = rows
        .iter()
        .map(|row| {
            let mut object = serde_json::Map::new();
            object.insert("id".to_string(), serde_json::Value::from(row.id()));
            for (name, value) in row.fields() {
                object.insert(name.clone(), serde_json::Value::from(value));
            }
            serde_json::Value::Object(object)
        })
        .collect();
    Ok(serde_json::to_string_pretty(&records)? + "\n")
}

fn render_csv(rows: &[Row], columns: &[String]) -> String {
    let mut out = String::new();
    for record in std::iter::once(header(columns)).chain(rows.iter().map(cells)) {
        let escaped: Vec<String> = record.iter().map(|c| csv_escape(c)).collect();
        out.push_str(&escaped.join(","));
        out.push('\n');
    }
    out
}

fn csv_escape(cell: &str) -> String {
    if cell.contains(&[',', '"', '\n', '\r'][..]) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}
