// Proxy API wire types
//
// The proxy forwards the device's short-key JSON untouched, while its own
// settings use camelCase. Both documents grow over firmware/proxy versions,
// so the structured types keep every unknown key in a flattened `extra` map
// and write it back verbatim.

mod device;
mod proxy;
mod status;

pub use device::{
    AutoDry, AveragingCounts, HEATER_SLOT_COUNT, HeaterMode, HeaterSetting, RemoteConfig,
    STARTUP_SWITCH_KEYS, SensorOffsets, StartupState, UpdateIntervals,
};
pub use proxy::{BackupFile, ProxyConfig, SettingsResponse};
pub use status::{DeviceCommand, HistoryQuery, LiveStatus, PowerStatus, TelemetryPoint};
pub(crate) use status::VersionResponse;

use serde::{Deserialize, Deserializer};

/// Treat an explicit JSON `null` the same as a missing field.
///
/// The proxy is written in Go and serialises nil maps and slices as `null`.
pub(crate) fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Booleans on the device side arrive as `0`/`1` or `true`/`false`
/// depending on the firmware build.
pub(crate) mod flex_bool {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Int(i64),
        Float(f64),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(match Option::<Raw>::deserialize(deserializer)? {
            Some(Raw::Bool(b)) => b,
            Some(Raw::Int(i)) => i != 0,
            Some(Raw::Float(f)) => f != 0.0,
            None => false,
        })
    }

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bool(*value)
    }
}
