// Output switching
//
// Single outputs go through the ASCOM Alpaca switch device the proxy exposes
// (form-encoded, errors reported in the body); the master switch has its own
// JSON endpoint.

use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::Error;
use crate::models::PowerStatus;
use crate::proxy::client::ProxyClient;

/// Alpaca's error fields. Everything else in the response is ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct AlpacaReply {
    error_number: i64,
    error_message: String,
}

impl ProxyClient {
    /// State of every switchable output.
    ///
    /// `GET /api/v1/power/status`
    pub async fn get_power_status(&self) -> Result<PowerStatus, Error> {
        let url = self.api_url("power/status");
        self.get_json(url).await
    }

    /// Turn one output on or off.
    ///
    /// `POST /api/v1/switch/0/setswitchvalue` with `Id` and `State`
    pub async fn set_switch(&self, id: u32, state: bool) -> Result<(), Error> {
        debug!(id, state, "setting switch state");
        self.set_switch_form(&[("Id", id.to_string()), ("State", state.to_string())])
            .await
    }

    /// Set an output's value (the adjustable converter takes a voltage).
    ///
    /// `POST /api/v1/switch/0/setswitchvalue` with `Id` and `Value`
    pub async fn set_switch_value(&self, id: u32, value: f64) -> Result<(), Error> {
        if !value.is_finite() {
            return Err(Error::InvalidRequest(format!("switch value {value} is not finite")));
        }
        debug!(id, value, "setting switch value");
        self.set_switch_form(&[("Id", id.to_string()), ("Value", value.to_string())])
            .await
    }

    /// Master power: switch every output at once.
    ///
    /// `POST /api/v1/power/all` with `{"state": bool}`
    pub async fn set_all_power(&self, state: bool) -> Result<(), Error> {
        let url = self.api_url("power/all");
        debug!(state, "setting all outputs");
        self.post_json(url, &json!({ "state": state })).await?;
        Ok(())
    }

    async fn set_switch_form(&self, form: &[(&str, String)]) -> Result<(), Error> {
        let url = self.api_url("switch/0/setswitchvalue");
        let body = self.post_form(url, form).await?;

        // A non-JSON body carries no Alpaca error; treat it as success.
        let reply: AlpacaReply = serde_json::from_str(&body).unwrap_or_default();
        if reply.error_number != 0 {
            return Err(Error::Alpaca {
                code: reply.error_number,
                message: reply.error_message,
            });
        }
        Ok(())
    }
}
