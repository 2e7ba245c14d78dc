//! Telemetry history.

use tabled::Tabled;

use sv241_core::{DashboardSession, TelemetrySample};

use crate::cli::{GlobalOpts, HistoryCommand};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct DateRow {
    #[tabled(rename = "Night")]
    date: String,
}

#[derive(Tabled)]
struct SampleRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "V")]
    voltage: String,
    #[tabled(rename = "A")]
    current: String,
    #[tabled(rename = "W")]
    power: String,
    #[tabled(rename = "Amb °C")]
    ambient: String,
    #[tabled(rename = "Hum %")]
    humidity: String,
    #[tabled(rename = "Dew °C")]
    dew_point: String,
    #[tabled(rename = "Lens °C")]
    lens: String,
    #[tabled(rename = "PWM1")]
    pwm1: String,
    #[tabled(rename = "PWM2")]
    pwm2: String,
}

impl From<&TelemetrySample> for SampleRow {
    fn from(s: &TelemetrySample) -> Self {
        let fmt = |v: f64| format!("{v:.2}");
        Self {
            time: s
                .timestamp
                .with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M")
                .to_string(),
            voltage: fmt(s.voltage),
            current: fmt(s.current),
            power: fmt(s.power),
            ambient: fmt(s.ambient_temp),
            humidity: fmt(s.humidity),
            dew_point: fmt(s.dew_point),
            lens: fmt(s.lens_temp),
            pwm1: format!("{:.0}", s.pwm1),
            pwm2: format!("{:.0}", s.pwm2),
        }
    }
}

pub async fn handle(
    session: &DashboardSession,
    cmd: HistoryCommand,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        HistoryCommand::Dates => {
            session.select_history_date(None).await;
            let dates = session.available_dates().borrow().clone();
            let out = output::render_list(global.output_format(), dates.as_slice(), |date| {
                DateRow { date: date.clone() }
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        HistoryCommand::Show { date } => {
            session.select_history_date(date).await;
            let series = session.telemetry_series().borrow().clone();
            if series.is_empty() && !global.quiet {
                let query = session.history_query().borrow().clone();
                eprintln!("No telemetry for the {query}");
            }
            let out = output::render_list(global.output_format(), series.as_slice(), |s| {
                SampleRow::from(s)
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        HistoryCommand::Download { date, file } => {
            tracing::debug!(url = %session.telemetry_download_url(&date), "downloading telemetry");
            let csv = session.download_telemetry(&date).await?;
            util::write_document(file.as_deref(), &csv, global.quiet)
        }
    }
}
