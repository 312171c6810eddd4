//! World Bank indicator API provider.
//!
//! Fetches `/v2/country/all/indicator/{code}` as JSON. The API answers with a
//! two-element array: page metadata, then observations (or `null` when there
//! is no data). Errors come back as a one-element array carrying `message`.
//! Retries with exponential backoff on timeouts, 429 and 5xx.

use super::provider::{DataError, SeriesProvider, SeriesRequest};
use crate::domain::Period;
use crate::panel::Panel;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://api.worldbank.org/v2";
const PER_PAGE: u32 = 20_000;

#[derive(Debug, Deserialize)]
struct Observation {
    #[serde(default)]
    countryiso3code: String,
    date: String,
    value: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    id: String,
    #[serde(default)]
    key: String,
    #[serde(default)]
    value: String,
}

/// One parsed response page.
#[derive(Debug)]
pub struct WorldBankPage {
    pub page: u32,
    pub pages: u32,
    pub panel: Panel,
}

pub struct WorldBankProvider {
    client: reqwest::blocking::Client,
    base_url: String,
    max_retries: u32,
    base_delay: Duration,
}

impl WorldBankProvider {
    pub fn new() -> Result<Self, DataError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent(concat!("gtapflow/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    pub fn with_retries(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.base_delay = base_delay;
        self
    }

    /// Build the indicator URL for one page.
    pub fn indicator_url(&self, indicator: &str, request: &SeriesRequest, page: u32) -> String {
        let mut url = format!(
            "{}/country/all/indicator/{indicator}?format=json&per_page={PER_PAGE}&page={page}",
            self.base_url
        );
        if let Some((first, last)) = request.bounds() {
            url.push_str(&format!("&date={first}:{last}"));
        }
        url
    }

    /// Parse one response body into a panel page.
    ///
    /// Rows without an ISO3 code (some aggregates) and rows whose date is not a
    /// plain year are skipped.
    pub fn parse_response(indicator: &str, body: &str) -> Result<WorldBankPage, DataError> {
        let parts: Vec<Value> = serde_json::from_str(body).map_err(|e| {
            DataError::ResponseFormatChanged(format!("{indicator}: body is not a JSON array: {e}"))
        })?;

        let meta = parts
            .first()
            .ok_or_else(|| DataError::ResponseFormatChanged(format!("{indicator}: empty array")))?;

        if let Some(messages) = meta.get("message") {
            let messages: Vec<ApiMessage> =
                serde_json::from_value(messages.clone()).unwrap_or_default();
            let not_found = messages
                .iter()
                .any(|m| m.id == "120" || m.id == "175" || m.key.contains("not found"));
            if not_found {
                return Err(DataError::IndicatorNotFound {
                    indicator: indicator.to_string(),
                });
            }
            let detail = messages
                .iter()
                .map(|m| format!("{} {}: {}", m.id, m.key, m.value))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(DataError::Other(format!("World Bank API: {detail}")));
        }

        let page = meta.get("page").and_then(count).unwrap_or(1);
        let pages = meta.get("pages").and_then(count).unwrap_or(1);

        let mut panel = Panel::new(indicator);
        let observations = match parts.get(1) {
            None | Some(Value::Null) => Vec::new(),
            Some(rows) => serde_json::from_value::<Vec<Observation>>(rows.clone()).map_err(|e| {
                DataError::ResponseFormatChanged(format!("{indicator}: observations: {e}"))
            })?,
        };
        for obs in observations {
            if obs.countryiso3code.trim().len() != 3 {
                continue;
            }
            let Some(period) = Period::parse_header(&obs.date) else {
                continue;
            };
            panel.insert(obs.countryiso3code.as_str(), period, obs.value);
        }

        Ok(WorldBankPage { page, pages, panel })
    }

    fn get_with_retry(&self, url: &str) -> Result<String, DataError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                std::thread::sleep(delay);
            }

            match self.client.get(url).send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(60);
                        warn!(url, retry_after, "rate limited");
                        last_error = Some(DataError::RateLimited {
                            retry_after_secs: retry_after,
                        });
                        continue;
                    }

                    if status.is_server_error() {
                        warn!(url, %status, attempt, "server error, retrying");
                        last_error = Some(DataError::Other(format!("HTTP {status} for {url}")));
                        continue;
                    }

                    if !status.is_success() {
                        return Err(DataError::Other(format!("HTTP {status} for {url}")));
                    }

                    return resp.text().map_err(|e| {
                        DataError::ResponseFormatChanged(format!("failed to read body: {e}"))
                    });
                }
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        warn!(url, attempt, error = %e, "request failed, retrying");
                        last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                        continue;
                    }
                    return Err(DataError::NetworkUnreachable(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

fn count(v: &Value) -> Option<u32> {
    match v {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

impl SeriesProvider for WorldBankProvider {
    fn name(&self) -> &str {
        "world_bank"
    }

    fn fetch_panel(&self, request: &SeriesRequest) -> Result<Panel, DataError> {
        let mut panel = Panel::new(request.indicator.clone());
        let mut page = 1;

        loop {
            let url = self.indicator_url(&request.indicator, request, page);
            let body = self.get_with_retry(&url)?;
            let parsed = Self::parse_response(&request.indicator, &body)?;
            panel.merge(&parsed.panel);
            debug!(
                indicator = %request.indicator,
                page = parsed.page,
                pages = parsed.pages,
                "fetched World Bank page"
            );
            if parsed.page >= parsed.pages {
                break;
            }
            page = parsed.page + 1;
        }

        Ok(panel)
    }
}
