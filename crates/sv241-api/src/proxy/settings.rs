// Proxy settings endpoints
//
// The settings document doubles as the connection heartbeat: it is the only
// call whose success or failure tells us whether the proxy is reachable.

use tracing::debug;

use crate::error::Error;
use crate::models::{ProxyConfig, SettingsResponse, VersionResponse};
use crate::proxy::client::ProxyClient;

impl ProxyClient {
    /// Fetch proxy settings plus serial-link state.
    ///
    /// `GET /api/v1/settings`
    pub async fn get_settings(&self) -> Result<SettingsResponse, Error> {
        let url = self.api_url("settings");
        self.get_json(url).await
    }

    /// Replace the proxy configuration. The proxy validates the listen
    /// address and port and answers `400` with a text reason otherwise.
    ///
    /// `POST /api/v1/settings`
    pub async fn save_proxy_config(&self, config: &ProxyConfig) -> Result<(), Error> {
        let url = self.api_url("settings");
        debug!(port = %config.serial_port_name, "saving proxy settings");
        self.post_json(url, config).await?;
        Ok(())
    }

    /// Version string of the proxy itself.
    ///
    /// `GET /api/v1/proxy/version`
    pub async fn get_proxy_version(&self) -> Result<String, Error> {
        let url = self.api_url("proxy/version");
        let resp: VersionResponse = self.get_json(url).await?;
        Ok(resp.version)
    }
}
