// Proxy HTTP client
//
// Wraps `reqwest::Client` with `/api/v1` URL construction and status
// checking. Endpoint groups (settings, device config, power, telemetry,
// system) are implemented as inherent methods in sibling files to keep
// this module focused on transport mechanics.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

const API_PREFIX: &str = "api/v1";

/// Raw HTTP client for the SV241 proxy.
///
/// Cheap to clone: `reqwest::Client` is reference counted internally.
#[derive(Debug, Clone)]
pub struct ProxyClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ProxyClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// `base_url` is the proxy root, e.g. `http://192.168.1.20:8080`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url))
    }

    /// Create a client from a string URL and a pre-built `reqwest::Client`.
    pub fn from_reqwest(base_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        Ok(Self::with_client(http, Url::parse(base_url)?))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The proxy base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build `{base}/api/v1/{path}`. Any path already on the base URL is kept
    /// as a prefix, so the proxy can sit behind a reverse proxy.
    pub fn api_url(&self, path: &str) -> Url {
        self.rooted_url(&format!("{API_PREFIX}/{path}"))
    }

    /// Build the WebSocket URL for `path` (`ws://` or `wss://` matching the base).
    pub fn ws_url(&self, path: &str) -> Result<Url, Error> {
        let mut url = self.rooted_url(path);
        let scheme = if self.base_url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme).map_err(|()| {
            Error::InvalidRequest(format!("cannot derive a WebSocket URL from {}", self.base_url))
        })?;
        Ok(url)
    }

    fn rooted_url(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        let base_path = url.path().trim_end_matches('/').to_owned();
        url.set_path(&format!("{base_path}/{}", path.trim_start_matches('/')));
        url.set_query(None);
        url
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a GET request and decode the JSON body.
    pub(crate) async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        let body = self.get_text(url).await?;
        decode(&body)
    }

    /// Send a GET request and return the body as text.
    pub(crate) async fn get_text(&self, url: Url) -> Result<String, Error> {
        debug!("GET {}", url);

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(Error::Transport)?;

        read_body(resp).await
    }

    /// Send a POST request with a JSON body and return the response text.
    pub(crate) async fn post_json(
        &self,
        url: Url,
        body: &impl Serialize,
    ) -> Result<String, Error> {
        debug!("POST {}", url);

        let resp = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(Error::Transport)?;

        read_body(resp).await
    }

    /// Send a POST request with a raw, already-serialised JSON body.
    pub(crate) async fn post_raw_json(&self, url: Url, body: String) -> Result<String, Error> {
        debug!("POST {}", url);

        let resp = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(Error::Transport)?;

        read_body(resp).await
    }

    /// Send a POST request with a form-encoded body (the Alpaca endpoints).
    pub(crate) async fn post_form(
        &self,
        url: Url,
        form: &[(&str, String)],
    ) -> Result<String, Error> {
        debug!("POST {} (form)", url);

        let resp = self
            .http
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(Error::Transport)?;

        read_body(resp).await
    }
}

/// Read the body, turning any non-success status into `Error::Http`.
async fn read_body(resp: reqwest::Response) -> Result<String, Error> {
    let status = resp.status();
    let body = resp.text().await.map_err(Error::Transport)?;

    if !status.is_success() {
        return Err(Error::Http {
            status: status.as_u16(),
            body: body.trim().to_owned(),
        });
    }

    Ok(body)
}

pub(crate) fn decode<T: DeserializeOwned>(body: &str) -> Result<T, Error> {
    serde_json::from_str(body).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: body.to_owned(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> ProxyClient {
        ProxyClient::from_reqwest(base, reqwest::Client::new()).unwrap()
    }

    #[test]
    fn api_url_appends_prefix() {
        let c = client("http://10.0.0.5:8080");
        assert_eq!(c.api_url("settings").as_str(), "http://10.0.0.5:8080/api/v1/settings");
        assert_eq!(
            c.api_url("switch/0/setswitchvalue").as_str(),
            "http://10.0.0.5:8080/api/v1/switch/0/setswitchvalue"
        );
    }

    #[test]
    fn api_url_keeps_base_path() {
        let c = client("http://host/sv241/");
        assert_eq!(c.api_url("config").as_str(), "http://host/sv241/api/v1/config");
    }

    #[test]
    fn ws_url_follows_scheme() {
        let c = client("http://host:8080");
        assert_eq!(c.ws_url("/ws/logs").unwrap().as_str(), "ws://host:8080/ws/logs");

        let c = client("https://host");
        assert_eq!(c.ws_url("ws/logs").unwrap().as_str(), "wss://host/ws/logs");
    }
}
