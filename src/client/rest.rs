//! HTTP client for the order book snapshot endpoint.
//!
//! The server exposes a single REST call the replica needs:
//! `GET {prefix}/orderbook?pair=XBTZAR`, answered with the full book and the
//! sequence it was taken at.
//!
//! # Example
//!
//! ```rust,no_run
//! use bookstream::client::RestClient;
//! use bookstream::Config;
//!
//! # async fn example() -> bookstream::Result<()> {
//! let config = Config::new("localhost:8080", "XBTZAR");
//! let rest = RestClient::new(&config)?;
//!
//! let snapshot = rest.get_order_book("XBTZAR").await?;
//! println!("sequence {}", snapshot.sequence);
//! # Ok(())
//! # }
//! ```

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::config::Config;
use crate::error::{ApiError, Error};
use crate::types::messages::OrderBookResponse;
use crate::types::Snapshot;

/// HTTP client for the streamer REST API
#[derive(Debug, Clone)]
pub struct RestClient {
    client: Client,
    orderbook_url: Url,
}

impl RestClient {
    /// Create a new REST client
    ///
    /// # Errors
    ///
    /// Returns an error if the address does not form a URL or the HTTP client
    /// cannot be initialized.
    pub fn new(config: &Config) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            orderbook_url: config.rest_url("orderbook")?,
        })
    }

    /// Fetch the full order book for a pair.
    ///
    /// Orders are taken from the list they appear in; a `type` field that
    /// disagrees with the list is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] for transport failures, [`Error::RateLimited`]
    /// for HTTP 429, [`Error::Api`] for any other non-2xx status and
    /// [`Error::Json`] if the body does not decode.
    pub async fn get_order_book(&self, pair: &str) -> Result<Snapshot, Error> {
        let response: OrderBookResponse = self.get(&self.orderbook_url, &[("pair", pair)]).await?;
        debug!(
            pair,
            sequence = response.sequence,
            bids = response.bids.len(),
            asks = response.asks.len(),
            "Fetched order book"
        );
        Ok(Snapshot::from(response))
    }

    /// Make a GET request and decode the JSON body
    async fn get<T>(&self, url: &Url, query: &[(&str, &str)]) -> Result<T, Error>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self.client.get(url.clone()).query(query).send().await?;
        Self::handle_response(response).await
    }

    /// Handle the HTTP response, checking for errors
    async fn handle_response<T>(response: reqwest::Response) -> Result<T, Error>
    where
        T: serde::de::DeserializeOwned,
    {
        let status = response.status();

        if status.as_u16() == 429 {
            // Retry-After is in seconds
            let retry_after_ms = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(|secs| secs.saturating_mul(1000));

            return Err(Error::RateLimited { retry_after_ms });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api(parse_api_error(status.as_u16(), &body)));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(Error::from)
    }

    /// Get the snapshot endpoint URL
    pub fn orderbook_url(&self) -> &Url {
        &self.orderbook_url
    }
}

/// Build an [`ApiError`] from an error body, JSON or plain text
fn parse_api_error(status: u16, body: &str) -> ApiError {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return ApiError::new(status, body.trim());
    };

    let message = value
        .get("message")
        .or_else(|| value.get("error"))
        .and_then(|v| v.as_str())
        .unwrap_or(body)
        .to_string();

    let code = value
        .get("code")
        .or_else(|| value.get("error_code"))
        .and_then(|v| v.as_str())
        .map(str::to_string);

    ApiError {
        status,
        code,
        message,
    }
}
