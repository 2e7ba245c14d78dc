// Device commands and configuration backup.

use tracing::{debug, info};

use crate::error::Error;
use crate::models::{BackupFile, DeviceCommand};
use crate::proxy::client::{ProxyClient, decode};

impl ProxyClient {
    /// Send a one-shot command. Reboot and factory reset are fire-and-forget
    /// on the proxy side; dry sensor waits for the device's answer.
    ///
    /// `POST /api/v1/command`
    pub async fn send_command(&self, command: DeviceCommand) -> Result<String, Error> {
        let url = self.api_url("command");
        info!(%command, "sending device command");
        self.post_json(url, &command).await
    }

    /// Build a combined proxy + firmware backup. Returned as the proxy
    /// formatted it so it can be written to disk unchanged.
    ///
    /// `GET /api/v1/backup/create`
    pub async fn create_backup(&self) -> Result<String, Error> {
        let url = self.api_url("backup/create");
        let body = self.get_text(url).await?;
        // Reject anything that would not restore later.
        decode::<BackupFile>(&body)?;
        Ok(body)
    }

    /// Restore a backup produced by [`create_backup`](Self::create_backup).
    ///
    /// `POST /api/v1/backup/restore`
    ///
    /// The document is checked locally first; an incomplete backup is never
    /// sent. Returns the proxy's plain-text confirmation.
    pub async fn restore_backup(&self, content: &str) -> Result<String, Error> {
        let backup: BackupFile = serde_json::from_str(content)
            .map_err(|e| Error::InvalidRequest(format!("backup is not valid JSON: {e}")))?;
        if !backup.is_restorable() {
            return Err(Error::InvalidRequest(
                "backup must contain both proxyConfig and firmwareConfig".into(),
            ));
        }

        let url = self.api_url("backup/restore");
        debug!(bytes = content.len(), "restoring backup");
        let message = self.post_raw_json(url, content.to_owned()).await?;
        Ok(message.trim().to_owned())
    }
}
