//! Device and proxy configuration: show, save, heater options.
//!
//! Values are listed under the same dotted paths `config save --set` takes,
//! so a line of `config show` can be edited and fed straight back.

use serde::Serialize;
use serde_json::{Map, Value, json};
use tabled::Tabled;

use sv241_core::edit_buffer::HeaterField;
use sv241_core::{
    ConfigField, ConfigSection, DashboardSession, HeaterMode, HeaterSlot, HeaterSolution,
    ProxyConfig, RemoteConfig, SaveOutcome,
};

use crate::cli::{Assignment, ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Debug, Tabled)]
struct FieldRow {
    #[tabled(rename = "Field")]
    path: String,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Debug, Tabled, Serialize)]
struct HeaterRow {
    #[tabled(rename = "Heater")]
    slot: usize,
    #[tabled(rename = "Mode")]
    mode: String,
    #[tabled(rename = "Allowed")]
    allowed: String,
    #[tabled(rename = "Startup editable")]
    startup_editable: bool,
}

fn heater_rows(solution: &HeaterSolution) -> Vec<HeaterRow> {
    HeaterSlot::ALL
        .iter()
        .map(|slot| {
            let outcome = solution.slot(*slot);
            HeaterRow {
                slot: slot.index(),
                mode: outcome.mode.token().to_owned(),
                allowed: outcome
                    .allowed()
                    .map(HeaterMode::token)
                    .collect::<Vec<_>>()
                    .join(", "),
                startup_editable: outcome.startup_interactive,
            }
        })
        .collect()
}

// ── Section documents ───────────────────────────────────────────────

/// The part of the device and proxy documents one section covers, keyed
/// by the field paths' leading segment.
fn section_document(
    section: ConfigSection,
    device: Option<&RemoteConfig>,
    proxy: Option<&ProxyConfig>,
) -> Result<Value, CliError> {
    let device = match device {
        Some(config) => serde_json::to_value(config)?,
        None => Value::Null,
    };

    let doc = match section {
        ConfigSection::Sensors => pick_keys(&device, &["so", "ui", "ac"]),
        ConfigSection::DewHeaters => {
            let mut doc = pick_keys(&device, &["dh"]);
            if let (Some(proxy), Some(heaters)) = (
                proxy,
                doc.get_mut("dh").and_then(Value::as_array_mut),
            ) {
                for (index, heater) in heaters.iter_mut().enumerate() {
                    let leader = HeaterSlot::from_index(index).and_then(|slot| {
                        proxy.heater_auto_enable_leader.get(slot.leader_key()).copied()
                    });
                    if let (Some(leader), Some(obj)) = (leader, heater.as_object_mut()) {
                        obj.insert(HeaterField::AutoEnableLeader.key().to_owned(), json!(leader));
                    }
                }
            }
            doc
        }
        ConfigSection::AdjustableVoltage => pick_keys(&device, &["av"]),
        ConfigSection::PowerStartup => pick_keys(&device, &["ps"]),
        ConfigSection::AutoDry => pick_keys(&device, &["ad"]),
        ConfigSection::ProxySettings => {
            let mut value = match proxy {
                Some(proxy) => serde_json::to_value(proxy)?,
                None => Value::Null,
            };
            if let Some(obj) = value.as_object_mut() {
                obj.remove("switchNames");
                obj.remove("heaterAutoEnableLeader");
                obj.remove("firstRunComplete");
            }
            json!({ "proxy": value })
        }
        ConfigSection::SwitchNames => {
            json!({ "names": proxy.map(|p| p.switch_names.clone()).unwrap_or_default() })
        }
    };
    Ok(doc)
}

fn pick_keys(document: &Value, keys: &[&str]) -> Value {
    let mut map = Map::new();
    for key in keys {
        if let Some(value) = document.get(*key) {
            map.insert((*key).to_owned(), value.clone());
        }
    }
    Value::Object(map)
}

/// Flatten a document into `path = value` rows.
fn flatten(prefix: &str, value: &Value, rows: &mut Vec<FieldRow>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                flatten(&join(prefix, key), child, rows);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten(&join(prefix, &index.to_string()), child, rows);
            }
        }
        Value::String(text) => rows.push(FieldRow {
            path: prefix.to_owned(),
            value: text.clone(),
        }),
        Value::Null => {}
        other => rows.push(FieldRow {
            path: prefix.to_owned(),
            value: display_scalar(prefix, other),
        }),
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_owned()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Heater modes travel as numbers; show their names instead.
fn display_scalar(path: &str, value: &Value) -> String {
    let is_mode = matches!(
        path.parse::<ConfigField>(),
        Ok(ConfigField::Heater(_, HeaterField::Mode))
    );
    if is_mode {
        if let Some(mode) = value
            .as_u64()
            .and_then(|code| u8::try_from(code).ok())
            .and_then(|code| HeaterMode::try_from(code).ok())
        {
            return mode.token().to_owned();
        }
    }
    value.to_string()
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    session: &DashboardSession,
    args: ConfigArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    session.reload().await;

    match args.command {
        ConfigCommand::Show { section } => show(session, section, global).await,
        ConfigCommand::Save { section, set } => save(session, section, set, global).await,
        ConfigCommand::Heaters => {
            let solution = *session.allowed_heater_options().borrow();
            let rows = heater_rows(&solution);
            let out = output::render_single(global.output_format(), &rows, |rows| {
                output::render_table(rows)
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}

async fn show(
    session: &DashboardSession,
    section: Option<ConfigSection>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    use strum::IntoEnumIterator;

    let device = session.draft_device().await;
    let proxy = session.draft_proxy().await;
    let sections: Vec<ConfigSection> = match section {
        Some(section) => vec![section],
        None => ConfigSection::iter().collect(),
    };

    let mut document = Map::new();
    let mut rows = Vec::new();
    for section in sections {
        let doc = section_document(section, device.as_ref(), proxy.as_ref())?;
        flatten("", &doc, &mut rows);
        document.insert(section.to_string(), doc);
    }

    let out = output::render_single(global.output_format(), &Value::Object(document), |_| {
        if rows.is_empty() {
            "No configuration loaded (is the device connected?)".to_owned()
        } else {
            output::render_table(&rows)
        }
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}

async fn save(
    session: &DashboardSession,
    section: ConfigSection,
    assignments: Vec<Assignment>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    for Assignment { field, value } in assignments {
        if field.section() != section {
            return Err(CliError::Validation {
                field: field.to_string(),
                reason: format!("belongs to {}, not {section}", field.section()),
            });
        }

        if let ConfigField::Heater(slot, HeaterField::Mode) = field {
            let mode: HeaterMode = value.parse().map_err(|reason| CliError::Validation {
                field: field.to_string(),
                reason,
            })?;
            let solution = session.edit_heater_mode(slot, mode).await;
            if solution.was_reset(slot) {
                util::notice(
                    &format!(
                        "{slot}: {} is not allowed next to the other heater's mode, using {}",
                        mode.token(),
                        solution.slot(slot).mode.token()
                    ),
                    global.quiet,
                );
            }
        } else {
            session.edit(field, value).await?;
        }
    }

    let outcome = session.save_section(section).await?;
    report(&outcome, global);
    Ok(())
}

fn report(outcome: &SaveOutcome, global: &GlobalOpts) {
    util::notice(&format!("Saved {}", outcome.section), global.quiet);
    if let Some(error) = &outcome.leader_flags_error {
        util::notice(
            &format!("Heater settings saved, but the auto-enable flags were not: {error}"),
            global.quiet,
        );
    }
}
