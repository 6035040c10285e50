//! Output formatting: table, JSON, plain.
//!
//! Signed calls return dynamic JSON, so the table view renders a
//! key/value listing of the payload's top level instead of a typed table.

use std::io::{self, IsTerminal, Write};

use tabled::{Table, Tabled, settings::Style};

use crate::cli::{ColorMode, OutputFormat};

// ── Color helpers ───────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: &ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

// ── Render dispatchers ──────────────────────────────────────────────

/// Render a JSON payload in the chosen format.
pub fn render_value(format: &OutputFormat, value: &serde_json::Value) -> String {
    match format {
        OutputFormat::Table => render_value_table(value),
        OutputFormat::Json => render_json_pretty(value),
        OutputFormat::JsonCompact => render_json_compact(value),
        OutputFormat::Plain => render_value_plain(value),
    }
}

/// Render pre-built key/value pairs (status views) in the chosen format.
pub fn render_pairs(format: &OutputFormat, pairs: &[(String, String)]) -> String {
    match format {
        OutputFormat::Table => render_kv_table(pairs),
        OutputFormat::Json | OutputFormat::JsonCompact => {
            let map: serde_json::Map<String, serde_json::Value> = pairs
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect();
            let value = serde_json::Value::Object(map);
            if matches!(format, OutputFormat::Json) {
                render_json_pretty(&value)
            } else {
                render_json_compact(&value)
            }
        }
        OutputFormat::Plain => pairs
            .iter()
            .map(|(k, v)| format!("{k}\t{v}"))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Format-specific renderers ───────────────────────────────────────

#[derive(Tabled)]
struct KvRow {
    #[tabled(rename = "KEY")]
    key: String,
    #[tabled(rename = "VALUE")]
    value: String,
}

fn render_kv_table(pairs: &[(String, String)]) -> String {
    let rows: Vec<KvRow> = pairs
        .iter()
        .map(|(k, v)| KvRow {
            key: k.clone(),
            value: v.clone(),
        })
        .collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_value_table(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => {
            let pairs: Vec<(String, String)> = map
                .iter()
                .map(|(k, v)| (k.clone(), scalar_repr(v)))
                .collect();
            render_kv_table(&pairs)
        }
        // Arrays and scalars fall back to pretty JSON
        other => render_json_pretty(other),
    }
}

fn render_value_plain(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{k}\t{}", scalar_repr(v)))
            .collect::<Vec<_>>()
            .join("\n"),
        serde_json::Value::Array(items) => items
            .iter()
            .map(scalar_repr)
            .collect::<Vec<_>>()
            .join("\n"),
        other => scalar_repr(other),
    }
}

/// One-line representation of a JSON value for table and plain cells.
fn scalar_repr(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => "-".into(),
        nested @ (serde_json::Value::Object(_) | serde_json::Value::Array(_)) => {
            render_json_compact(nested)
        }
        other => other.to_string(),
    }
}

/// Pretty-printed JSON.
fn render_json_pretty<T: serde::Serialize + ?Sized>(data: &T) -> String {
    serde_json::to_string_pretty(data).expect("serialization should not fail")
}

/// Compact single-line JSON.
fn render_json_compact<T: serde::Serialize + ?Sized>(data: &T) -> String {
    serde_json::to_string(data).expect("serialization should not fail")
}
