// Telemetry history
//
// The proxy logs one CSV file per observing night and serves it either as
// parsed JSON points or as the raw file.

use crate::error::Error;
use crate::models::{HistoryQuery, TelemetryPoint};
use crate::proxy::client::ProxyClient;

impl ProxyClient {
    /// Nights that have a telemetry log, newest first as the proxy sorts them.
    ///
    /// `GET /api/v1/telemetry/dates`
    pub async fn get_telemetry_dates(&self) -> Result<Vec<String>, Error> {
        let url = self.api_url("telemetry/dates");
        let dates: Option<Vec<String>> = self.get_json(url).await?;
        Ok(dates.unwrap_or_default())
    }

    /// History points for one night or a trailing window.
    ///
    /// `GET /api/v1/telemetry/history?date=YYYY-MM-DD` or `?duration=12h`
    pub async fn get_telemetry_history(
        &self,
        query: &HistoryQuery,
    ) -> Result<Vec<TelemetryPoint>, Error> {
        let mut url = self.api_url("telemetry/history");
        let (key, value) = query.query_pair();
        url.query_pairs_mut().append_pair(key, value);
        let points: Option<Vec<TelemetryPoint>> = self.get_json(url).await?;
        Ok(points.unwrap_or_default())
    }

    /// Link to the raw CSV log of one night.
    ///
    /// `GET /api/v1/telemetry/download?date=YYYY-MM-DD`
    pub fn telemetry_download_url(&self, date: &str) -> url::Url {
        let mut url = self.api_url("telemetry/download");
        url.query_pairs_mut().append_pair("date", date);
        url
    }

    /// Fetch the raw CSV log of one night.
    pub async fn download_telemetry(&self, date: &str) -> Result<String, Error> {
        let url = self.telemetry_download_url(date);
        self.get_text(url).await
    }
}
