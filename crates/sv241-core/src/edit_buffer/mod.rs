// ── Configuration edit buffer ──
//
// Local edits layered over the last fetched device and proxy documents.
// Dirty state is derived from the pending edits, never stored next to them,
// so a section is dirty exactly while it has an unsaved edit. Remote
// refreshes replace the base documents and leave pending edits on top.

mod apply;
mod fields;
pub mod save;

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};
use sv241_api::models::{HeaterMode, ProxyConfig, RemoteConfig};
use tracing::{debug, warn};

pub use fields::{
    AutoDryField, ConfigField, ConfigSection, FieldValue, HeaterField, IntervalChannel,
    ProxyField, SensorChannel,
};
pub use save::{SaveOutcome, save_section};

use self::apply::{apply_device_edit, apply_proxy_edit, heater_mut};
use crate::error::CoreError;
use crate::heater::{HeaterConstraintSolver, HeaterSlot, HeaterSolution};

#[derive(Debug, Clone)]
struct PendingEdit {
    value: FieldValue,
    revision: u64,
}

/// Everything needed to persist one section, captured under the lock so
/// the network round trip can run without it.
#[derive(Debug, Clone)]
pub struct SaveTicket {
    pub section: ConfigSection,
    /// Edits at or below this revision are covered by the ticket.
    pub revision: u64,
    /// Body for `POST /config/set`, holding only this section's keys.
    pub device_patch: Option<Value>,
    /// Full proxy document for `POST /settings`.
    pub proxy_config: Option<ProxyConfig>,
    /// The section's proxy-bound edits that went into `proxy_config`.
    pub proxy_edits: Vec<(ConfigField, FieldValue)>,
}

/// Which halves of a ticket reached the proxy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Persisted {
    pub device: bool,
    pub proxy: bool,
}

#[derive(Debug, Default)]
pub struct ConfigEditBuffer {
    remote_device: Option<RemoteConfig>,
    remote_proxy: Option<ProxyConfig>,
    edits: BTreeMap<ConfigField, PendingEdit>,
    revision: u64,
}

impl ConfigEditBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Remote documents ─────────────────────────────────────────

    pub fn remote_device(&self) -> Option<&RemoteConfig> {
        self.remote_device.as_ref()
    }

    pub fn remote_proxy(&self) -> Option<&ProxyConfig> {
        self.remote_proxy.as_ref()
    }

    pub fn set_remote_device(&mut self, config: RemoteConfig) {
        self.remote_device = Some(config);
    }

    pub fn set_remote_proxy(&mut self, config: ProxyConfig) {
        self.remote_proxy = Some(config);
    }

    /// Fold the top-level keys of a written patch into the current device
    /// baseline. Keys the patch does not carry keep their current value.
    pub fn merge_remote_device(&mut self, patch: &Value) -> Result<(), CoreError> {
        let encode = |e: serde_json::Error| CoreError::Internal(format!("merging config: {e}"));
        let mut base = match &self.remote_device {
            Some(config) => serde_json::to_value(config).map_err(encode)?,
            None => Value::Object(Map::new()),
        };
        if let (Some(base), Some(patch)) = (base.as_object_mut(), patch.as_object()) {
            for (key, value) in patch {
                base.insert(key.clone(), value.clone());
            }
        }
        self.remote_device = Some(serde_json::from_value(base).map_err(encode)?);
        Ok(())
    }

    /// Apply saved proxy edits to the current proxy baseline.
    pub fn merge_remote_proxy(&mut self, edits: &[(ConfigField, FieldValue)]) {
        let Some(proxy) = self.remote_proxy.as_mut() else {
            return;
        };
        for (field, value) in edits {
            if let Err(reason) = apply_proxy_edit(proxy, field, value) {
                warn!(%field, %reason, "saved proxy edit no longer applies");
            }
        }
    }

    // ── Editing ──────────────────────────────────────────────────

    /// Record a pending value. Text is kept as typed and only parsed when a
    /// save is prepared. Heater mode edits go through the solver.
    pub fn edit(
        &mut self,
        field: ConfigField,
        value: impl Into<FieldValue>,
    ) -> Result<(), CoreError> {
        let value = value.into();

        if let ConfigField::Heater(slot, heater_field) = field {
            match heater_field {
                HeaterField::Mode => {
                    let mode = value.as_mode().map_err(|reason| CoreError::Validation {
                        section: ConfigSection::DewHeaters,
                        field: field.to_string(),
                        reason,
                    })?;
                    self.edit_heater_mode(slot, mode);
                    return Ok(());
                }
                HeaterField::EnabledOnStartup
                    if !self.heater_solution().slot(slot).startup_interactive =>
                {
                    return Err(CoreError::Validation {
                        section: ConfigSection::DewHeaters,
                        field: field.to_string(),
                        reason: "enabled-on-startup is locked off while the heater is disabled"
                            .into(),
                    });
                }
                _ => {}
            }
        }

        self.record(field, value);
        Ok(())
    }

    /// Pick a mode for one heater slot and let the solver settle the pair.
    /// Every slot whose resolved mode differs from the draft is recorded as
    /// an edit, and a slot that ends up `Disabled` gets enabled-on-startup
    /// cleared.
    pub fn edit_heater_mode(&mut self, slot: HeaterSlot, mode: HeaterMode) -> HeaterSolution {
        let draft = self.draft_device_or_default();
        let current = draft.heater_modes();
        let solution = HeaterConstraintSolver::solve_edit(current, slot, mode);

        for target in HeaterSlot::ALL {
            let outcome = solution.slot(target);
            if target == slot || outcome.mode != current[target.index()] {
                self.record(
                    ConfigField::Heater(target, HeaterField::Mode),
                    FieldValue::Mode(outcome.mode),
                );
            }
            let enabled = draft
                .dew_heaters
                .get(target.index())
                .is_some_and(|heater| heater.enabled_on_startup);
            if !outcome.startup_interactive && enabled {
                self.record(
                    ConfigField::Heater(target, HeaterField::EnabledOnStartup),
                    FieldValue::Flag(false),
                );
            }
        }

        if solution.was_reset(slot) {
            debug!(%slot, mode = mode.token(), "heater mode collides with the other slot, reset");
        }
        solution
    }

    fn record(&mut self, field: ConfigField, value: FieldValue) {
        self.revision += 1;
        debug!(%field, %value, revision = self.revision, "edit recorded");
        self.edits.insert(
            field,
            PendingEdit {
                value,
                revision: self.revision,
            },
        );
    }

    /// Pending value for `field`, if any.
    pub fn pending(&self, field: &ConfigField) -> Option<&FieldValue> {
        self.edits.get(field).map(|edit| &edit.value)
    }

    /// All pending edits of one section.
    pub fn pending_in(
        &self,
        section: ConfigSection,
    ) -> impl Iterator<Item = (&ConfigField, &FieldValue)> {
        self.edits
            .iter()
            .filter(move |(field, _)| field.section() == section)
            .map(|(field, edit)| (field, &edit.value))
    }

    /// Drop the pending edits of one section. Returns how many were dropped.
    pub fn discard(&mut self, section: ConfigSection) -> usize {
        let before = self.edits.len();
        self.edits.retain(|field, _| field.section() != section);
        before - self.edits.len()
    }

    pub fn discard_all(&mut self) {
        self.edits.clear();
    }

    // ── Derived state ────────────────────────────────────────────

    pub fn dirty_sections(&self) -> BTreeSet<ConfigSection> {
        self.edits.keys().map(ConfigField::section).collect()
    }

    pub fn is_dirty(&self, section: ConfigSection) -> bool {
        self.edits.keys().any(|field| field.section() == section)
    }

    /// Device document with every pending edit applied. Values that do not
    /// parse yet are skipped. `None` until the device config is loaded.
    pub fn draft_device(&self) -> Option<RemoteConfig> {
        self.remote_device.as_ref().map(|_| self.draft_device_or_default())
    }

    /// Proxy document with every pending edit applied.
    pub fn draft_proxy(&self) -> Option<ProxyConfig> {
        let mut proxy = self.remote_proxy.clone()?;
        for (field, edit) in &self.edits {
            if field.is_proxy_bound() {
                let _ = apply_proxy_edit(&mut proxy, field, &edit.value);
            }
        }
        Some(proxy)
    }

    fn draft_device_or_default(&self) -> RemoteConfig {
        let mut config = self.remote_device.clone().unwrap_or_default();
        for (field, edit) in &self.edits {
            if !field.is_proxy_bound() {
                let _ = apply_device_edit(&mut config, field, &edit.value);
            }
        }
        HeaterConstraintSolver::solve(config.heater_modes()).apply_to(&mut config.dew_heaters);
        config
    }

    /// Allowed options and resolved modes for both heater slots.
    pub fn heater_solution(&self) -> HeaterSolution {
        HeaterConstraintSolver::solve(self.draft_device_or_default().heater_modes())
    }

    // ── Saving ───────────────────────────────────────────────────

    /// Validate the section's edits and build the request bodies.
    ///
    /// Only the section's own edits are applied; edits of other sections
    /// stay local and out of the patch.
    pub fn prepare_save(&self, section: ConfigSection) -> Result<SaveTicket, CoreError> {
        let edits: Vec<(&ConfigField, &PendingEdit)> = self
            .edits
            .iter()
            .filter(|(field, _)| field.section() == section)
            .collect();
        let invalid = |field: &ConfigField, reason: String| CoreError::Validation {
            section,
            field: field.to_string(),
            reason,
        };

        let device_patch = if section.is_device_bound() {
            let mut config = self
                .remote_device
                .clone()
                .ok_or(CoreError::NotLoaded { section })?;
            for (field, edit) in &edits {
                if !field.is_proxy_bound() {
                    apply_device_edit(&mut config, field, &edit.value)
                        .map_err(|reason| invalid(field, reason))?;
                }
            }
            if section == ConfigSection::DewHeaters {
                for slot in HeaterSlot::ALL {
                    heater_mut(&mut config, slot);
                }
                HeaterConstraintSolver::solve(config.heater_modes())
                    .apply_to(&mut config.dew_heaters);
            }
            Some(section_patch(&config, section)?)
        } else {
            None
        };

        let needs_proxy = !section.is_device_bound()
            || (section == ConfigSection::DewHeaters
                && edits.iter().any(|(field, _)| field.is_proxy_bound()));
        let mut proxy_edits = Vec::new();
        let proxy_config = if needs_proxy {
            match &self.remote_proxy {
                Some(remote) => {
                    let mut proxy = remote.clone();
                    for (field, edit) in &edits {
                        if field.is_proxy_bound() {
                            apply_proxy_edit(&mut proxy, field, &edit.value)
                                .map_err(|reason| invalid(field, reason))?;
                            proxy_edits.push(((*field).clone(), edit.value.clone()));
                        }
                    }
                    Some(proxy)
                }
                None if section.is_device_bound() => {
                    warn!(%section, "proxy settings not loaded, auto-enable flags stay pending");
                    None
                }
                None => return Err(CoreError::NotLoaded { section }),
            }
        } else {
            None
        };

        Ok(SaveTicket {
            section,
            revision: self.revision,
            device_patch,
            proxy_config,
            proxy_edits,
        })
    }

    /// Drop the edits a finished save covered. Edits recorded after the
    /// ticket was taken, and edits whose half did not persist, stay dirty.
    pub fn complete_save(&mut self, ticket: &SaveTicket, persisted: Persisted) {
        self.edits.retain(|field, edit| {
            let stored = if field.is_proxy_bound() {
                persisted.proxy
            } else {
                persisted.device
            };
            !(stored && field.section() == ticket.section && edit.revision <= ticket.revision)
        });
    }
}

/// Top-level keys owned by each device-bound section.
fn section_patch(config: &RemoteConfig, section: ConfigSection) -> Result<Value, CoreError> {
    let mut patch = Map::new();
    let mut put = |key: &str, value: Result<Value, serde_json::Error>| -> Result<(), CoreError> {
        let value = value.map_err(|e| CoreError::Internal(format!("encoding {key}: {e}")))?;
        if !value.is_null() {
            patch.insert(key.to_owned(), value);
        }
        Ok(())
    };

    match section {
        ConfigSection::Sensors => {
            put("so", serde_json::to_value(&config.sensor_offsets))?;
            put("ui", serde_json::to_value(&config.update_intervals))?;
            put("ac", serde_json::to_value(&config.averaging_counts))?;
        }
        ConfigSection::DewHeaters => put("dh", serde_json::to_value(&config.dew_heaters))?,
        ConfigSection::AdjustableVoltage => {
            put("av", serde_json::to_value(config.adjustable_voltage))?;
        }
        ConfigSection::PowerStartup => put("ps", serde_json::to_value(&config.power_startup))?,
        ConfigSection::AutoDry => put("ad", serde_json::to_value(&config.auto_dry))?,
        ConfigSection::ProxySettings | ConfigSection::SwitchNames => {}
    }

    Ok(Value::Object(patch))
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use sv241_api::models::HeaterSetting;

    use super::*;

    fn field(path: &str) -> ConfigField {
        path.parse().unwrap()
    }

    fn loaded() -> ConfigEditBuffer {
        let mut buffer = ConfigEditBuffer::new();
        buffer.set_remote_device(
            serde_json::from_value(json!({
                "so": {"st": 0.0, "sh": 0.0, "dt": 0.0, "iv": 0.0, "ic": 0.0},
                "ad": {"en": 1, "ht": 95.0, "td": 300},
                "av": 12.0,
                "dh": [
                    {"n": "Main", "en": true, "m": 1},
                    {"n": "Guide", "en": true, "m": 0}
                ]
            }))
            .unwrap(),
        );
        buffer.set_remote_proxy(ProxyConfig {
            serial_port_name: "COM3".into(),
            ..ProxyConfig::default()
        });
        buffer
    }

    #[test]
    fn edit_marks_only_its_section_dirty() {
        let mut buffer = loaded();
        buffer.edit(field("so.st"), "0,5").unwrap();
        assert!(buffer.is_dirty(ConfigSection::Sensors));
        assert!(!buffer.is_dirty(ConfigSection::AutoDry));

        assert_eq!(buffer.discard(ConfigSection::Sensors), 1);
        assert!(buffer.dirty_sections().is_empty());
    }

    #[test]
    fn patch_carries_only_the_saved_section() {
        let mut buffer = loaded();
        buffer.edit(field("so.st"), "0,5").unwrap();
        buffer.edit(field("ad.ht"), "90").unwrap();

        let ticket = buffer.prepare_save(ConfigSection::AutoDry).unwrap();
        let patch = ticket.device_patch.clone().unwrap();
        assert_eq!(patch, json!({"ad": {"en": true, "ht": 90.0, "td": 300}}));
        assert!(ticket.proxy_config.is_none());

        buffer.complete_save(&ticket, Persisted { device: true, proxy: false });
        assert!(!buffer.is_dirty(ConfigSection::AutoDry));
        assert!(buffer.is_dirty(ConfigSection::Sensors));
    }

    #[test]
    fn comma_decimal_reaches_the_patch() {
        let mut buffer = loaded();
        buffer.edit(field("so.st"), "-1,25").unwrap();
        let ticket = buffer.prepare_save(ConfigSection::Sensors).unwrap();
        assert_eq!(ticket.device_patch.unwrap()["so"]["st"], json!(-1.25));
    }

    #[test]
    fn invalid_value_blocks_the_save() {
        let mut buffer = loaded();
        buffer.edit(field("so.st"), "warm").unwrap();
        let err = buffer.prepare_save(ConfigSection::Sensors).unwrap_err();
        assert!(matches!(err, CoreError::Validation { section: ConfigSection::Sensors, .. }));
        assert!(buffer.is_dirty(ConfigSection::Sensors));
    }

    #[test]
    fn edits_made_during_a_save_stay_dirty() {
        let mut buffer = loaded();
        buffer.edit(field("av"), "9").unwrap();
        let ticket = buffer.prepare_save(ConfigSection::AdjustableVoltage).unwrap();

        buffer.edit(field("av"), "5").unwrap();
        buffer.complete_save(&ticket, Persisted { device: true, proxy: false });

        assert!(buffer.is_dirty(ConfigSection::AdjustableVoltage));
        assert_eq!(buffer.pending(&field("av")), Some(&FieldValue::from("5")));
    }

    #[test]
    fn unpersisted_save_leaves_edits_dirty() {
        let mut buffer = loaded();
        buffer.edit(field("av"), "9").unwrap();
        let ticket = buffer.prepare_save(ConfigSection::AdjustableVoltage).unwrap();
        buffer.complete_save(&ticket, Persisted::default());
        assert!(buffer.is_dirty(ConfigSection::AdjustableVoltage));
    }

    #[test]
    fn device_sections_need_the_device_config() {
        let mut buffer = ConfigEditBuffer::new();
        buffer.edit(field("av"), "9").unwrap();
        let err = buffer.prepare_save(ConfigSection::AdjustableVoltage).unwrap_err();
        assert!(matches!(err, CoreError::NotLoaded { .. }));
    }

    #[test]
    fn proxy_sections_build_a_full_proxy_document() {
        let mut buffer = loaded();
        buffer.edit(field("names.dc1"), "Mount").unwrap();
        let ticket = buffer.prepare_save(ConfigSection::SwitchNames).unwrap();
        assert!(ticket.device_patch.is_none());
        let proxy = ticket.proxy_config.unwrap();
        assert_eq!(proxy.switch_names.get("dc1").map(String::as_str), Some("Mount"));
        assert_eq!(proxy.serial_port_name, "COM3");
    }

    #[test]
    fn leader_only_edit_still_saves_the_heaters_and_the_flags() {
        let mut buffer = loaded();
        buffer.edit(field("dh.0.leader"), true).unwrap();
        let ticket = buffer.prepare_save(ConfigSection::DewHeaters).unwrap();
        assert!(ticket.device_patch.as_ref().unwrap().get("dh").is_some());
        let proxy = ticket.proxy_config.clone().unwrap();
        assert_eq!(proxy.heater_auto_enable_leader.get("pwm1"), Some(&true));

        buffer.complete_save(&ticket, Persisted { device: true, proxy: false });
        assert!(buffer.is_dirty(ConfigSection::DewHeaters));
    }

    #[test]
    fn heater_edit_rejects_a_colliding_pick() {
        // Slot 0 runs PID; asking slot 1 for min-temp collides and resets.
        let mut buffer = loaded();
        let solution = buffer.edit_heater_mode(HeaterSlot::Second, HeaterMode::MinimumTemperature);
        assert!(solution.was_reset(HeaterSlot::Second));
        assert_eq!(
            solution.modes(),
            [HeaterMode::PidLensSensor, HeaterMode::Manual]
        );
        assert!(!solution.slot(HeaterSlot::Second).allows(HeaterMode::MinimumTemperature));
        assert!(solution.slot(HeaterSlot::Second).allows(HeaterMode::SyncFollower));
    }

    #[test]
    fn leader_change_cascades_to_the_follower() {
        let mut buffer = loaded();
        buffer.edit_heater_mode(HeaterSlot::Second, HeaterMode::SyncFollower);
        buffer.edit_heater_mode(HeaterSlot::First, HeaterMode::Off);

        let draft = buffer.draft_device().unwrap();
        assert_eq!(draft.heater_modes(), [HeaterMode::Off, HeaterMode::Manual]);
        assert_eq!(
            buffer.pending(&field("dh.1.m")),
            Some(&FieldValue::Mode(HeaterMode::Manual))
        );
    }

    #[test]
    fn disabling_a_heater_locks_its_startup_flag() {
        let mut buffer = loaded();
        buffer.edit(field("dh.1.m"), "disabled").unwrap();

        let draft = buffer.draft_device().unwrap();
        assert!(!draft.dew_heaters[1].enabled_on_startup);
        assert!(!buffer.heater_solution().slot(HeaterSlot::Second).startup_interactive);

        let err = buffer.edit(field("dh.1.en"), true).unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
    }

    #[test]
    fn merged_patch_keeps_keys_saved_by_others() {
        let mut buffer = loaded();
        buffer.edit(field("ad.ht"), "90").unwrap();
        let ticket = buffer.prepare_save(ConfigSection::AutoDry).unwrap();

        let mut newer = buffer.remote_device().cloned().unwrap();
        newer.sensor_offsets.as_mut().unwrap().sht40_temp = 0.5;
        buffer.set_remote_device(newer);

        buffer.merge_remote_device(ticket.device_patch.as_ref().unwrap()).unwrap();
        let remote = serde_json::to_value(buffer.remote_device().unwrap()).unwrap();
        assert_eq!(remote["so"]["st"], json!(0.5));
        assert_eq!(remote["ad"]["ht"], json!(90.0));
    }

    #[test]
    fn merged_proxy_edits_touch_only_their_fields() {
        let mut buffer = loaded();
        buffer.edit(field("names.dc1"), "Mount").unwrap();
        let ticket = buffer.prepare_save(ConfigSection::SwitchNames).unwrap();

        let mut newer = buffer.remote_proxy().cloned().unwrap();
        newer.serial_port_name = "COM7".into();
        buffer.set_remote_proxy(newer);

        buffer.merge_remote_proxy(&ticket.proxy_edits);
        let proxy = buffer.remote_proxy().unwrap();
        assert_eq!(proxy.serial_port_name, "COM7");
        assert_eq!(proxy.switch_names.get("dc1").map(String::as_str), Some("Mount"));
    }

    #[test]
    fn remote_refresh_keeps_pending_edits_on_top() {
        let mut buffer = loaded();
        buffer.edit(field("dh.1.n"), "Finder").unwrap();

        let mut refreshed = buffer.remote_device().cloned().unwrap();
        refreshed.dew_heaters[0].name = "Primary".into();
        buffer.set_remote_device(refreshed);

        let draft = buffer.draft_device().unwrap();
        assert_eq!(draft.dew_heaters[0].name, "Primary");
        assert_eq!(draft.dew_heaters[1].name, "Finder");
    }

    #[test]
    fn dew_heater_patch_is_normalized() {
        let mut buffer = ConfigEditBuffer::new();
        buffer.set_remote_device(RemoteConfig {
            dew_heaters: vec![
                HeaterSetting {
                    mode: HeaterMode::PidLensSensor,
                    ..HeaterSetting::default()
                },
                HeaterSetting {
                    mode: HeaterMode::MinimumTemperature,
                    ..HeaterSetting::default()
                },
            ],
            ..RemoteConfig::default()
        });
        buffer.edit(field("dh.0.mp"), "20").unwrap();

        let ticket = buffer.prepare_save(ConfigSection::DewHeaters).unwrap();
        let patch = ticket.device_patch.unwrap();
        assert_eq!(patch["dh"][0]["m"], json!(1));
        assert_eq!(patch["dh"][1]["m"], json!(0));
    }
}
