// Writing parsed field values into the wire documents.
//
// Each function touches exactly one field. Validation failures come back as
// plain reasons; the buffer wraps them with the field path and section.

use std::collections::BTreeMap;

use sv241_api::models::{
    AutoDry, AveragingCounts, HeaterSetting, ProxyConfig, RemoteConfig, SensorOffsets,
    UpdateIntervals,
};

use super::fields::{
    AutoDryField, ConfigField, FieldValue, HeaterField, IntervalChannel, ParseResult,
    ProxyField, SensorChannel,
};
use crate::heater::HeaterSlot;

/// Log levels the proxy understands.
const LOG_LEVELS: [&str; 4] = ["ERROR", "WARN", "INFO", "DEBUG"];

/// Longest sensor update interval accepted, in milliseconds.
const MAX_UPDATE_INTERVAL_MS: i64 = 3_600_000;
/// Largest moving-average window accepted.
const MAX_AVERAGING_COUNT: i64 = 1_000;
/// Longest auto-dry trigger accepted locally. The device caps it lower.
const MAX_TRIGGER_DURATION_SECS: i64 = 86_400;

// ── Device document ──────────────────────────────────────────────

/// Apply one device-bound edit. Proxy-bound fields are ignored.
pub(super) fn apply_device_edit(
    config: &mut RemoteConfig,
    field: &ConfigField,
    value: &FieldValue,
) -> ParseResult<()> {
    match field {
        ConfigField::SensorOffset(channel) => {
            let parsed = value.as_f64()?;
            let offsets = config
                .sensor_offsets
                .get_or_insert_with(SensorOffsets::default);
            *offset_mut(offsets, *channel) = parsed;
        }
        ConfigField::UpdateInterval(channel) => {
            let parsed = value.as_int(1, MAX_UPDATE_INTERVAL_MS)?;
            let intervals = config
                .update_intervals
                .get_or_insert_with(UpdateIntervals::default);
            *interval_mut(intervals, *channel) = parsed;
        }
        ConfigField::AveragingCount(channel) => {
            let parsed = value.as_int(1, MAX_AVERAGING_COUNT)?;
            let counts = config
                .averaging_counts
                .get_or_insert_with(AveragingCounts::default);
            *count_mut(counts, *channel) = parsed;
        }
        ConfigField::Heater(_, HeaterField::AutoEnableLeader) => {}
        ConfigField::Heater(slot, field) => {
            apply_heater_edit(heater_mut(config, *slot), *field, value)?;
        }
        ConfigField::StartupState(key) => {
            let state = value.as_startup()?;
            config
                .power_startup
                .get_or_insert_with(BTreeMap::new)
                .insert(key.clone(), state);
        }
        ConfigField::AdjustableVoltage => {
            config.adjustable_voltage = Some(value.as_f64()?);
        }
        ConfigField::AutoDry(field) => {
            let auto_dry = config.auto_dry.get_or_insert_with(AutoDry::default);
            match field {
                AutoDryField::Enabled => auto_dry.enabled = value.as_bool()?,
                AutoDryField::HumidityThreshold => {
                    let threshold = value.as_f64()?;
                    if !(0.0..=100.0).contains(&threshold) {
                        return Err(format!("{threshold} is not a relative humidity"));
                    }
                    auto_dry.humidity_threshold = threshold;
                }
                AutoDryField::TriggerDuration => {
                    auto_dry.trigger_duration_secs = value.as_int(0, MAX_TRIGGER_DURATION_SECS)?;
                }
            }
        }
        ConfigField::Proxy(_) | ConfigField::SwitchName(_) => {}
    }
    Ok(())
}

fn apply_heater_edit(
    heater: &mut HeaterSetting,
    field: HeaterField,
    value: &FieldValue,
) -> ParseResult<()> {
    match field {
        HeaterField::Name => heater.name = value.as_text().trim().to_owned(),
        HeaterField::EnabledOnStartup => heater.enabled_on_startup = value.as_bool()?,
        HeaterField::Mode => heater.mode = value.as_mode()?,
        HeaterField::ManualPower => heater.manual_power = value.as_int(0, 100)?,
        HeaterField::MaxPower => heater.max_power = value.as_int(0, 100)?,
        HeaterField::TargetOffset => heater.target_offset = value.as_f64()?,
        HeaterField::Kp => heater.pid_kp = value.as_f64()?,
        HeaterField::Ki => heater.pid_ki = value.as_f64()?,
        HeaterField::Kd => heater.pid_kd = value.as_f64()?,
        HeaterField::StartDelta => heater.start_delta = value.as_f64()?,
        HeaterField::EndDelta => heater.end_delta = value.as_f64()?,
        HeaterField::PidSyncFactor => heater.pid_sync_factor = value.as_f64()?,
        HeaterField::MinTemp => heater.min_temp = value.as_f64()?,
        HeaterField::AutoEnableLeader => {}
    }
    Ok(())
}

/// Heater entry for `slot`, padding the array if the device sent fewer.
pub(super) fn heater_mut(config: &mut RemoteConfig, slot: HeaterSlot) -> &mut HeaterSetting {
    if config.dew_heaters.len() <= slot.index() {
        config
            .dew_heaters
            .resize_with(slot.index() + 1, HeaterSetting::default);
    }
    &mut config.dew_heaters[slot.index()]
}

fn offset_mut(offsets: &mut SensorOffsets, channel: SensorChannel) -> &mut f64 {
    match channel {
        SensorChannel::Sht40Temp => &mut offsets.sht40_temp,
        SensorChannel::Sht40Humidity => &mut offsets.sht40_humidity,
        SensorChannel::Ds18b20Temp => &mut offsets.ds18b20_temp,
        SensorChannel::Ina219Voltage => &mut offsets.ina219_voltage,
        SensorChannel::Ina219Current => &mut offsets.ina219_current,
    }
}

fn interval_mut(intervals: &mut UpdateIntervals, channel: IntervalChannel) -> &mut u64 {
    match channel {
        IntervalChannel::Ina219 => &mut intervals.ina219,
        IntervalChannel::Sht40 => &mut intervals.sht40,
        IntervalChannel::Ds18b20 => &mut intervals.ds18b20,
    }
}

fn count_mut(counts: &mut AveragingCounts, channel: SensorChannel) -> &mut u32 {
    match channel {
        SensorChannel::Sht40Temp => &mut counts.sht40_temp,
        SensorChannel::Sht40Humidity => &mut counts.sht40_humidity,
        SensorChannel::Ds18b20Temp => &mut counts.ds18b20_temp,
        SensorChannel::Ina219Voltage => &mut counts.ina219_voltage,
        SensorChannel::Ina219Current => &mut counts.ina219_current,
    }
}

// ── Proxy document ───────────────────────────────────────────────

/// Apply one proxy-bound edit. Device-bound fields are ignored.
pub(super) fn apply_proxy_edit(
    proxy: &mut ProxyConfig,
    field: &ConfigField,
    value: &FieldValue,
) -> ParseResult<()> {
    match field {
        ConfigField::Proxy(field) => match field {
            ProxyField::ListenAddress => proxy.listen_address = value.as_ip()?,
            ProxyField::NetworkPort => proxy.network_port = value.as_int(1, 65_535)?,
            ProxyField::SerialPortName => {
                proxy.serial_port_name = value.as_text().trim().to_owned();
            }
            ProxyField::AutoDetectPort => proxy.auto_detect_port = value.as_bool()?,
            ProxyField::LogLevel => {
                let level = value.as_text().trim().to_ascii_uppercase();
                if !LOG_LEVELS.contains(&level.as_str()) {
                    return Err(format!(
                        "'{level}' is not one of {}",
                        LOG_LEVELS.join(", ")
                    ));
                }
                proxy.log_level = level;
            }
            ProxyField::HistoryRetentionNights => {
                proxy.history_retention_nights = value.as_int(0, 3_650)?;
            }
            ProxyField::TelemetryInterval => {
                proxy.telemetry_interval = value.as_int(1, 3_600)?;
            }
            ProxyField::EnableMasterPower => proxy.enable_master_power = value.as_bool()?,
            ProxyField::EnableAlpacaVoltageControl => {
                proxy.enable_alpaca_voltage_control = value.as_bool()?;
            }
            ProxyField::EnableNotifications => proxy.enable_notifications = value.as_bool()?,
        },
        ConfigField::SwitchName(key) => {
            proxy
                .switch_names
                .insert(key.clone(), value.as_text().trim().to_owned());
        }
        ConfigField::Heater(slot, HeaterField::AutoEnableLeader) => {
            proxy
                .heater_auto_enable_leader
                .insert(slot.leader_key().to_owned(), value.as_bool()?);
        }
        _ => {}
    }
    Ok(())
}
