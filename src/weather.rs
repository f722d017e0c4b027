use reqwest::{header::CACHE_CONTROL, Client};
use serde_json::Value;

use crate::error::WeatherError;

/// Client for the external weather API. Every fetch bypasses caches and
/// carries no deadline of its own.
#[derive(Clone)]
pub struct WeatherClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl WeatherClient {
    pub fn new(http: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http,
            base_url,
            api_key: api_key.into(),
        }
    }

    /// Current weather for `city` in metric units, relayed as the upstream
    /// JSON body. A non-success answer keeps its status and raw body.
    pub async fn fetch(&self, city: &str) -> Result<Value, WeatherError> {
        let url = format!("{}/data/2.5/weather", self.base_url);
        let resp = self
            .http
            .get(url)
            .query(&[
                ("q", city),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
            ])
            .header(CACHE_CONTROL, "no-store")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(WeatherError::Upstream { status, body });
        }
        Ok(resp.json().await?)
    }
}
