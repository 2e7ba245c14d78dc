//! Output switching.

use tabled::Tabled;

use sv241_core::DashboardSession;

use crate::cli::{GlobalOpts, OnOff, SwitchArgs};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct PowerRow {
    #[tabled(rename = "Output")]
    key: String,
    #[tabled(rename = "State")]
    state: &'static str,
}

/// Print the power state the session re-read after switching.
fn print_power(session: &DashboardSession, global: &GlobalOpts) -> Result<(), CliError> {
    let Some(power) = session.power_status().borrow().clone() else {
        return Ok(());
    };
    let out = output::render_single(global.output_format(), &*power, |power| {
        let rows: Vec<PowerRow> = power
            .iter()
            .map(|(key, _)| PowerRow {
                key: key.to_owned(),
                state: output::on_off(power.is_on(key)),
            })
            .collect();
        output::render_table(&rows)
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn switch(
    session: &DashboardSession,
    args: &SwitchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match (args.value, args.state) {
        (Some(value), _) => {
            session.set_switch_value(args.id, value).await?;
            util::notice(&format!("Switch {} set to {value}", args.id), global.quiet);
        }
        (None, Some(state)) => {
            session.set_switch(args.id, state.is_on()).await?;
            util::notice(
                &format!("Switch {} turned {}", args.id, if state.is_on() { "on" } else { "off" }),
                global.quiet,
            );
        }
        (None, None) => {
            return Err(CliError::Validation {
                field: "switch".into(),
                reason: "give a state (on/off) or --value".into(),
            });
        }
    }
    print_power(session, global)
}

pub async fn master(
    session: &DashboardSession,
    state: OnOff,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    session.set_all_power(state.is_on()).await?;
    util::notice(
        &format!("All outputs turned {}", if state.is_on() { "on" } else { "off" }),
        global.quiet,
    );
    print_power(session, global)
}
