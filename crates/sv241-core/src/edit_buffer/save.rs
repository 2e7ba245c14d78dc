// Section save: validate, post, re-fetch, clear.
//
// The buffer lock is held only to take the ticket and to apply the result;
// edits made while the request is in flight carry a newer revision and
// survive the save.

use serde_json::{Map, Value};
use sv241_api::ProxyClient;
use sv241_api::models::{RemoteConfig, SettingsResponse};
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::{ConfigEditBuffer, ConfigSection, Persisted};
use crate::connection::ConnectionState;
use crate::error::CoreError;

/// Result of a successful section save.
#[derive(Debug, Clone)]
pub struct SaveOutcome {
    pub section: ConfigSection,
    /// Device configuration after the save, when the section touched it.
    pub device_config: Option<RemoteConfig>,
    /// Proxy settings re-read after the save.
    pub settings: Option<SettingsResponse>,
    /// Set when the heater values were saved but the auto-enable flags
    /// were not. Those flags stay pending.
    pub leader_flags_error: Option<String>,
}

/// Persist the pending edits of `section`.
///
/// Device-bound sections are refused unless the device is connected. A
/// failed device write leaves every edit pending. After the write the
/// configuration is read back so values the device normalized show up; if
/// that read fails only this section's keys are folded into the baseline
/// current at completion, taken from the device's echo or else from the
/// values that were sent. Saves of other sections that finished meanwhile
/// are kept.
///
/// A dew heater save posts the proxy auto-enable flags only when one of
/// them was edited. The web dashboard re-posts the proxy settings on every
/// heater save; here an untouched proxy document is left alone.
pub async fn save_section(
    buffer: &Mutex<ConfigEditBuffer>,
    client: &ProxyClient,
    state: ConnectionState,
    section: ConfigSection,
) -> Result<SaveOutcome, CoreError> {
    if section.is_device_bound() && !state.allows_device_io() {
        return Err(CoreError::DeviceNotConnected { state });
    }

    let ticket = buffer.lock().await.prepare_save(section)?;
    info!(%section, revision = ticket.revision, "saving section");

    let mut persisted = Persisted::default();
    let mut echoed = None;
    if let Some(patch) = &ticket.device_patch {
        echoed = client
            .set_config(patch)
            .await
            .inspect_err(|e| warn!(%section, error = %e, "device save failed"))?;
        persisted.device = true;
    }

    let mut leader_flags_error = None;
    if let Some(proxy) = &ticket.proxy_config {
        match client.save_proxy_config(proxy).await {
            Ok(()) => persisted.proxy = true,
            Err(e) if persisted.device => {
                warn!(error = %e, "saving heater auto-enable flags failed");
                leader_flags_error = Some(e.to_string());
            }
            Err(e) => {
                warn!(%section, error = %e, "proxy settings save failed");
                return Err(e.into());
            }
        }
    }

    let (config_result, settings_result) = tokio::join!(
        async {
            if persisted.device {
                Some(client.get_config().await)
            } else {
                None
            }
        },
        client.get_settings(),
    );

    let settings = settings_result
        .inspect_err(|e| warn!(error = %e, "re-reading proxy settings failed after save"))
        .ok();

    let device_config = {
        let mut buffer = buffer.lock().await;
        match config_result {
            Some(Ok(config)) => buffer.set_remote_device(config),
            Some(Err(e)) => {
                warn!(error = %e, "re-reading the configuration failed after save");
                if let Some(patch) = &ticket.device_patch {
                    let patch = fallback_patch(echoed.as_ref(), patch);
                    if let Err(e) = buffer.merge_remote_device(&patch) {
                        warn!(error = %e, "keeping the previous configuration baseline");
                    }
                }
            }
            None => {}
        }
        match settings.as_ref().and_then(|s| s.proxy_config.clone()) {
            Some(proxy) => buffer.set_remote_proxy(proxy),
            None if persisted.proxy => buffer.merge_remote_proxy(&ticket.proxy_edits),
            None => {}
        }
        buffer.complete_save(&ticket, persisted);
        if persisted.device {
            buffer.remote_device().cloned()
        } else {
            None
        }
    };

    info!(%section, "section saved");
    Ok(SaveOutcome {
        section,
        device_config,
        settings,
        leader_flags_error,
    })
}

/// The section's top-level keys out of the device's echo, falling back to
/// the patch that was sent for any key the echo lacks.
fn fallback_patch(echoed: Option<&RemoteConfig>, patch: &Value) -> Value {
    let echo = echoed.and_then(|config| serde_json::to_value(config).ok());
    let Some(keys) = patch.as_object() else {
        return patch.clone();
    };
    let merged: Map<String, Value> = keys
        .iter()
        .map(|(key, sent)| {
            let value = echo
                .as_ref()
                .and_then(|echo| echo.get(key))
                .unwrap_or(sent);
            (key.clone(), value.clone())
        })
        .collect();
    Value::Object(merged)
}
