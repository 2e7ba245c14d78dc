//! Output formatting: table or JSON.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use sv241_core::{ConnectionState, LogLine, LogLineKind, Severity};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

pub fn paint_state(state: ConnectionState, color: bool) -> String {
    let text = state.to_string();
    if !color {
        return text;
    }
    match state {
        ConnectionState::Connected => text.green().to_string(),
        ConnectionState::Connecting | ConnectionState::AutoDetecting => {
            text.yellow().to_string()
        }
        ConnectionState::Paused => text.magenta().to_string(),
        ConnectionState::Offline => text.red().to_string(),
    }
}

/// One log line as the terminal shows it: local time, then the text,
/// colored by severity. Markers stand out in bold.
pub fn format_log_line(line: &LogLine, color: bool) -> String {
    let stamp = line
        .received_at
        .with_timezone(&chrono::Local)
        .format("%H:%M:%S");
    let text = format!("{stamp}  {}", line.message);
    if !color {
        return text;
    }
    if line.kind != LogLineKind::Message {
        return text.bold().to_string();
    }
    match line.severity {
        Severity::Error => text.red().to_string(),
        Severity::Warn => text.yellow().to_string(),
        Severity::Info => text,
        Severity::Debug => text.dimmed().to_string(),
    }
}

pub fn on_off(value: Option<bool>) -> &'static str {
    match value {
        Some(true) => "on",
        Some(false) => "off",
        None => "-",
    }
}

pub fn number(value: Option<f64>, unit: &str) -> String {
    value.map_or_else(|| "-".into(), |v| format!("{v:.2}{unit}"))
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serde-serializable + tabled items in the chosen format.
pub fn render_list<T, R>(
    format: OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
) -> Result<String, CliError>
where
    T: serde::Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            Ok(render_table(&rows))
        }
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
    }
}

/// Render a single serde-serializable item in the chosen format.
///
/// Table rendering uses `detail_fn`, since detail views don't use the
/// `Tabled` derive.
pub fn render_single<T>(
    format: OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize + ?Sized,
{
    match format {
        OutputFormat::Table => Ok(detail_fn(data)),
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
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

// ── Format-specific renderers ────────────────────────────────────────

pub fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_json<T: serde::Serialize + ?Sized>(data: &T, compact: bool) -> Result<String, CliError> {
    let out = if compact {
        serde_json::to_string(data)?
    } else {
        serde_json::to_string_pretty(data)?
    };
    Ok(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(serde::Serialize)]
    struct Reading {
        name: &'static str,
        value: f64,
    }

    #[derive(Tabled)]
    struct ReadingRow {
        #[tabled(rename = "Name")]
        name: String,
    }

    #[test]
    fn json_output_is_the_serde_form() {
        let data = [Reading {
            name: "voltage",
            value: 12.5,
        }];
        let out = render_list(OutputFormat::JsonCompact, &data, |r| ReadingRow {
            name: r.name.into(),
        })
        .unwrap();
        assert_eq!(out, r#"[{"name":"voltage","value":12.5}]"#);

        let table = render_list(OutputFormat::Table, &data, |r| ReadingRow {
            name: r.name.into(),
        })
        .unwrap();
        assert!(table.contains("Name"));
        assert!(table.contains("voltage"));
    }

    #[test]
    fn plain_log_lines_keep_the_message() {
        let line = LogLine::message("[WARN] heater 1 sensor missing");
        let out = format_log_line(&line, false);
        assert!(out.ends_with("[WARN] heater 1 sensor missing"));
    }

    #[test]
    fn missing_readings_render_as_dash() {
        assert_eq!(number(None, " V"), "-");
        assert_eq!(number(Some(12.0), " V"), "12.00 V");
        assert_eq!(on_off(Some(true)), "on");
    }
}
