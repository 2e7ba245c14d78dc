// Device configuration and live readings
//
// The proxy relays these to the firmware over serial; it wraps a config
// patch as `{"sc": <patch>}` and returns whatever the device answers.

use tracing::debug;

use crate::error::Error;
use crate::models::{LiveStatus, RemoteConfig, VersionResponse};
use crate::proxy::client::{ProxyClient, decode};

impl ProxyClient {
    /// Fetch the full device configuration.
    ///
    /// `GET /api/v1/config`
    pub async fn get_config(&self) -> Result<RemoteConfig, Error> {
        let url = self.api_url("config");
        self.get_json(url).await
    }

    /// Send a partial configuration patch (any subset of the top-level keys).
    ///
    /// `POST /api/v1/config/set`
    ///
    /// Returns the device's echo of its updated configuration when the answer
    /// parses as one; older firmware answers with a bare acknowledgement.
    pub async fn set_config(
        &self,
        patch: &serde_json::Value,
    ) -> Result<Option<RemoteConfig>, Error> {
        let url = self.api_url("config/set");
        let body = self.post_json(url, patch).await?;

        match decode::<RemoteConfig>(&body) {
            Ok(config) if !config.is_empty() => Ok(Some(config)),
            Ok(_) => Ok(None),
            Err(e) => {
                debug!(error = %e, "config/set answer is not a config document");
                Ok(None)
            }
        }
    }

    /// Latest sensor readings cached by the proxy.
    ///
    /// `GET /api/v1/status`
    pub async fn get_live_status(&self) -> Result<LiveStatus, Error> {
        let url = self.api_url("status");
        self.get_json(url).await
    }

    /// Firmware version reported by the device.
    ///
    /// `GET /api/v1/firmware/version`
    pub async fn get_firmware_version(&self) -> Result<String, Error> {
        let url = self.api_url("firmware/version");
        let resp: VersionResponse = self.get_json(url).await?;
        Ok(resp.version)
    }
}
