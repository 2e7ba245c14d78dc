//! Status and watch handlers.

use std::fmt::Write as _;
use std::sync::Arc;

use serde::Serialize;
use tabled::Tabled;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::{BroadcastStream, WatchStream};

use sv241_core::{ConnectionState, DashboardSession, LiveStatus, PowerStatus};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

// ── Views ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct StatusView {
    state: ConnectionState,
    port: String,
    firmware_version: Option<String>,
    proxy_version: Option<String>,
    live: Option<Arc<LiveStatus>>,
    power: Option<Arc<PowerStatus>>,
}

impl StatusView {
    fn capture(session: &DashboardSession) -> Self {
        Self {
            state: session.current_state(),
            port: session.port_label(),
            firmware_version: session.firmware_version().borrow().clone(),
            proxy_version: session.proxy_version().borrow().clone(),
            live: session.live_status().borrow().clone(),
            power: session.power_status().borrow().clone(),
        }
    }
}

#[derive(Tabled)]
struct OutputRow {
    #[tabled(rename = "Output")]
    key: String,
    #[tabled(rename = "State")]
    state: String,
}

fn detail(view: &StatusView, color: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "State:     {}",
        output::paint_state(view.state, color)
    );
    let _ = writeln!(out, "Port:      {}", view.port);
    let _ = writeln!(
        out,
        "Firmware:  {}",
        view.firmware_version.as_deref().unwrap_or("-")
    );
    let _ = writeln!(
        out,
        "Proxy:     {}",
        view.proxy_version.as_deref().unwrap_or("-")
    );

    if let Some(live) = view.live.as_deref().filter(|l| l.is_populated()) {
        let _ = writeln!(out);
        let _ = writeln!(out, "Voltage:   {}", output::number(live.voltage, " V"));
        let _ = writeln!(out, "Current:   {}", output::number(live.current_amps(), " A"));
        let _ = writeln!(out, "Power:     {}", output::number(live.power, " W"));
        let _ = writeln!(out, "Ambient:   {}", output::number(live.ambient_temp, " °C"));
        let _ = writeln!(out, "Humidity:  {}", output::number(live.humidity, " %"));
        let _ = writeln!(out, "Dew point: {}", output::number(live.dew_point, " °C"));
        let _ = writeln!(out, "Lens:      {}", output::number(live.lens_temp, " °C"));
        let _ = writeln!(out, "PWM 1:     {}", output::number(live.pwm1, " %"));
        let _ = writeln!(out, "PWM 2:     {}", output::number(live.pwm2, " %"));
    }

    if let Some(power) = view.power.as_deref().filter(|p| p.iter().next().is_some()) {
        let rows: Vec<OutputRow> = power
            .iter()
            .map(|(key, _)| OutputRow {
                key: key.to_owned(),
                state: output::on_off(power.is_on(key)).to_owned(),
            })
            .collect();
        let _ = writeln!(out);
        out.push_str(&output::render_table(&rows));
    }

    out.trim_end().to_owned()
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn handle(session: &DashboardSession, global: &GlobalOpts) -> Result<(), CliError> {
    session.reload().await;
    let view = StatusView::capture(session);
    let color = output::should_color(global.color_mode());
    let out = output::render_single(global.output_format(), &view, |v| detail(v, color))?;
    output::print_output(&out, global.quiet);
    Ok(())
}

/// One line per change of connection state or live readings, until Ctrl-C.
pub async fn watch(
    session: &DashboardSession,
    args: &WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(global.color_mode());
    let mut log_lines = BroadcastStream::new(session.log().subscribe());
    let mut states = WatchStream::new(session.connection_state());
    let mut readings = WatchStream::new(session.live_status());

    session.start().await?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            biased;
            _ = &mut ctrl_c => break,
            Some(_) = states.next() => print_watch_line(session, global, color)?,
            Some(_) = readings.next() => print_watch_line(session, global, color)?,
            Some(Ok(line)) = log_lines.next(), if args.logs => {
                if !global.quiet {
                    eprintln!("{}", output::format_log_line(&line, color));
                }
            }
            else => break,
        }
    }
    Ok(())
}

fn print_watch_line(
    session: &DashboardSession,
    global: &GlobalOpts,
    color: bool,
) -> Result<(), CliError> {
    let view = StatusView::capture(session);
    let out = match global.output_format() {
        OutputFormat::Table => summary_line(&view, color),
        // One document per line so the stream stays parseable.
        OutputFormat::Json | OutputFormat::JsonCompact => serde_json::to_string(&view)?,
    };
    output::print_output(&out, global.quiet);
    Ok(())
}

fn summary_line(view: &StatusView, color: bool) -> String {
    let stamp = chrono::Local::now().format("%H:%M:%S");
    let mut line = format!(
        "{stamp}  {:<14} {}",
        output::paint_state(view.state, color),
        view.port
    );
    if let Some(live) = view.live.as_deref().filter(|l| l.is_populated()) {
        let _ = write!(
            line,
            "  {}  {}  amb {}  hum {}  lens {}",
            output::number(live.voltage, " V"),
            output::number(live.current_amps(), " A"),
            output::number(live.ambient_temp, " °C"),
            output::number(live.humidity, " %"),
            output::number(live.lens_temp, " °C"),
        );
    }
    line
}
