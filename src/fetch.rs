use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::db::PageDataRow;
use crate::settings::ScrapeConfig;

const BASE_BACKOFF_MS: u64 = 2000;

/// Plain HTTP client for the static catalog pages.
pub struct Fetcher {
    client: reqwest::Client,
    max_retries: u32,
}

impl Fetcher {
    pub fn new(cfg: &ScrapeConfig) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            reqwest::header::HeaderValue::from_static("en-US,en;q=0.5,my;q=0.3"),
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .user_agent(cfg.user_agent.as_str())
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            max_retries: cfg.max_retries,
        })
    }

    /// Raw HTML of `url`; non-2xx is an error.
    pub async fn fetch_html(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("HTTP request failed for {}", url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("HTTP {} for {}", status, url);
        }

        response
            .text()
            .await
            .context("Failed to read response body")
    }

    /// Fetch with retry on transient statuses. Failures end up in the row, never as `Err`.
    pub async fn fetch_page(&self, page_id: i64, url: &str) -> PageDataRow {
        let mut attempt = 0;
        loop {
            let row = self.fetch_once(page_id, url).await;
            let transient = row.status.is_some_and(is_transient);
            if !transient || attempt >= self.max_retries {
                return row;
            }

            let wait = backoff(attempt);
            attempt += 1;
            warn!(
                "HTTP {} on {} (attempt {}/{}), backing off {:.1}s",
                row.status.unwrap_or_default(),
                url,
                attempt,
                self.max_retries,
                wait.as_secs_f64()
            );
            tokio::time::sleep(wait).await;
        }
    }

    async fn fetch_once(&self, page_id: i64, url: &str) -> PageDataRow {
        let start = Instant::now();
        let result = self.client.get(url).send().await;

        let (html, status, error) = match result {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    match response.text().await {
                        Ok(body) => (Some(body), Some(status.as_u16() as i32), None),
                        Err(e) => (None, Some(status.as_u16() as i32), Some(e.to_string())),
                    }
                } else {
                    (None, Some(status.as_u16() as i32), Some(format!("HTTP {}", status)))
                }
            }
            Err(e) => (None, None, Some(e.to_string())),
        };
        let latency_ms = start.elapsed().as_millis() as i64;
        debug!(url, ?status, latency_ms, "fetched");

        PageDataRow {
            page_id,
            url: url.to_string(),
            html,
            status,
            error,
            latency_ms: Some(latency_ms),
        }
    }
}

/// 429 and 5xx are worth another try.
fn is_transient(status: i32) -> bool {
    status == 429 || (500..600).contains(&status)
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(BASE_BACKOFF_MS.saturating_mul(2u64.saturating_pow(attempt)))
}
