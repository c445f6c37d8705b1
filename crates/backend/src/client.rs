use std::future::Future;
use std::time::Duration;

use config_loader::BackendConfig;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_RANGE, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::error::BackendError;
use crate::rest::Query;

const INITIAL_BACKOFF_MS: u64 = 100;

/// Rows requested per page by [`BackendClient::select_all`]. The server may
/// cap a page below this; `Content-Range` tells the reader how far it got.
pub const PAGE_SIZE: u32 = 1000;

/// Connection to the hosted backend: REST tables, auth and functions.
///
/// One instance owns one pooled HTTP client and is shared via `Arc` by
/// everything a binary builds.
#[derive(Clone)]
pub struct BackendClient {
    http: Client,
    base_url: String,
    api_key: String,
    max_retries: u32,
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("base_url", &self.base_url)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        if !config.url.starts_with("http://") && !config.url.starts_with("https://") {
            return Err(BackendError::Config {
                message: format!(
                    "Invalid backend url: {}. Must start with http:// or https://",
                    config.url
                ),
            });
        }
        HeaderValue::from_str(&config.api_key).map_err(|_| BackendError::Config {
            message: "API key contains characters not allowed in a header".to_string(),
        })?;

        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| BackendError::Config {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            max_retries: config.max_retries.max(1),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `apikey` plus a bearer token: the caller's access token when given,
    /// otherwise the API key itself.
    fn build_headers(&self, bearer: Option<&str>) -> Result<HeaderMap, BackendError> {
        let invalid = |what: &str| BackendError::Config {
            message: format!("{} is not a valid header value", what),
        };
        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(&self.api_key).map_err(|_| invalid("API key"))?,
        );
        let token = bearer.unwrap_or(&self.api_key);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| invalid("Bearer token"))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    pub(crate) fn request(
        &self,
        method: Method,
        path: &str,
        bearer: Option<&str>,
    ) -> Result<RequestBuilder, BackendError> {
        Ok(self
            .http
            .request(method, self.url(path))
            .headers(self.build_headers(bearer)?))
    }

    async fn retry_with_backoff<F, Fut, T>(&self, mut operation: F) -> Result<T, BackendError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let mut backoff_ms = INITIAL_BACKOFF_MS;
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    debug!(
                        "Attempt {} failed ({}), retrying in {}ms",
                        attempt, e, backoff_ms
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// GETs `path` and decodes the JSON body, retrying transient failures.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &Query,
        bearer: Option<&str>,
    ) -> Result<T, BackendError> {
        self.retry_with_backoff(move || async move {
            let response = self
                .request(Method::GET, path, bearer)?
                .query(query.params())
                .send()
                .await?;
            decode(response).await
        })
        .await
    }

    /// One page of rows plus the total row count from `Content-Range`, when
    /// the server reports it.
    async fn get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &Query,
    ) -> Result<(Vec<T>, Option<u64>), BackendError> {
        self.retry_with_backoff(move || async move {
            let response = self
                .request(Method::GET, path, None)?
                .header("Prefer", "count=exact")
                .query(query.params())
                .send()
                .await?;
            let total = content_range_total(response.headers());
            let rows = decode(response).await?;
            Ok((rows, total))
        })
        .await
    }

    /// Sends a body once; writes are never retried.
    pub(crate) async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        body: &B,
    ) -> Result<T, BackendError> {
        let response = request.json(body).send().await?;
        decode(response).await
    }

    pub(crate) async fn send_empty(&self, request: RequestBuilder) -> Result<(), BackendError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(BackendError::from_status(status, &body))
    }

    #[instrument(skip(self, query), fields(table = %table))]
    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &Query,
    ) -> Result<Vec<T>, BackendError> {
        self.get_json(&rest_path(table), query, None).await
    }

    /// Every row matching `query`, read page by page. `query` must not carry
    /// a limit and should order on a key that keeps pages stable.
    #[instrument(skip(self, query), fields(table = %table))]
    pub async fn select_all<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &Query,
    ) -> Result<Vec<T>, BackendError> {
        let path = rest_path(table);
        let mut rows: Vec<T> = Vec::new();
        loop {
            let page_query = query.clone().limit(PAGE_SIZE).offset(rows.len());
            let (page, total): (Vec<T>, Option<u64>) = self.get_page(&path, &page_query).await?;
            let fetched = page.len();
            rows.extend(page);

            let more = match total {
                Some(total) => (rows.len() as u64) < total,
                None => fetched >= PAGE_SIZE as usize,
            };
            if !more {
                break;
            }
            if fetched == 0 {
                return Err(BackendError::InvalidResponse {
                    message: format!(
                        "{} reported {:?} rows but returned an empty page at offset {}",
                        table,
                        total,
                        rows.len()
                    ),
                });
            }
            debug!(table, read = rows.len(), ?total, "fetching next page");
        }
        Ok(rows)
    }

    pub async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &Query,
    ) -> Result<Option<T>, BackendError> {
        let rows: Vec<T> = self.select(table, &query.clone().limit(1)).await?;
        Ok(rows.into_iter().next())
    }

    #[instrument(skip(self, row), fields(table = %table))]
    pub async fn insert<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &str,
        row: &B,
    ) -> Result<T, BackendError> {
        let request = self
            .request(Method::POST, &rest_path(table), None)?
            .header("Prefer", "return=representation");
        let rows: Vec<T> = self.send_json(request, row).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| BackendError::InvalidResponse {
                message: format!("insert into {} returned no rows", table),
            })
    }

    #[instrument(skip(self, query, patch), fields(table = %table))]
    pub async fn update<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &str,
        query: &Query,
        patch: &B,
    ) -> Result<Vec<T>, BackendError> {
        let request = self
            .request(Method::PATCH, &rest_path(table), None)?
            .header("Prefer", "return=representation")
            .query(query.params());
        self.send_json(request, patch).await
    }

    #[instrument(skip(self, query), fields(table = %table))]
    pub async fn delete(&self, table: &str, query: &Query) -> Result<(), BackendError> {
        let request = self
            .request(Method::DELETE, &rest_path(table), None)?
            .query(query.params());
        self.send_empty(request).await
    }
}

fn rest_path(table: &str) -> String {
    format!("/rest/v1/{}", table)
}

/// Total from a `Content-Range` header such as `0-999/1500`. `*` (unknown)
/// yields `None`.
fn content_range_total(headers: &HeaderMap) -> Option<u64> {
    let value = headers.get(CONTENT_RANGE)?.to_str().ok()?;
    let (_, total) = value.rsplit_once('/')?;
    total.trim().parse().ok()
}

pub(crate) async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        let err = BackendError::from_status(status, &body);
        if err.is_retryable() {
            warn!("Backend returned {}: {}", status, err);
        }
        return Err(err);
    }
    serde_json::from_str(&body).map_err(|e| BackendError::InvalidResponse {
        message: format!("Failed to parse response: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> BackendConfig {
        BackendConfig {
            url: url.to_string(),
            api_key: "anon".to_string(),
            jwt_secret: None,
            timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(1),
            max_retries: 0,
        }
    }

    #[test]
    fn rejects_non_http_url() {
        assert!(matches!(
            BackendClient::new(&config("ftp://example")),
            Err(BackendError::Config { .. })
        ));
    }

    #[test]
    fn retries_are_at_least_one_attempt() {
        let client = BackendClient::new(&config("http://127.0.0.1:1/")).unwrap();
        assert_eq!(client.max_retries, 1);
        assert_eq!(client.base_url(), "http://127.0.0.1:1");
    }

    #[test]
    fn content_range_totals() {
        let mut headers = HeaderMap::new();
        assert_eq!(content_range_total(&headers), None);
        headers.insert(CONTENT_RANGE, HeaderValue::from_static("0-999/1500"));
        assert_eq!(content_range_total(&headers), Some(1500));
        headers.insert(CONTENT_RANGE, HeaderValue::from_static("*/0"));
        assert_eq!(content_range_total(&headers), Some(0));
        headers.insert(CONTENT_RANGE, HeaderValue::from_static("0-24/*"));
        assert_eq!(content_range_total(&headers), None);
    }

    #[test]
    fn bearer_defaults_to_api_key() {
        let client = BackendClient::new(&config("http://127.0.0.1:1")).unwrap();
        let headers = client.build_headers(None).unwrap();
        assert_eq!(headers["apikey"], "anon");
        assert_eq!(headers[AUTHORIZATION], "Bearer anon");
        let headers = client.build_headers(Some("user-token")).unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer user-token");
    }
}
