use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::error::PlatformError;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_RETRIES: u32 = 3;
const MAX_BACKOFF: Duration = Duration::from_secs(5);

pub fn new_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .expect("reqwest client configuration is always valid")
}

/// Sends a request built fresh on every attempt (reqwest's `RequestBuilder`
/// isn't reusable across retries), retrying non-404 failures up to
/// `MAX_RETRIES` times with exponential backoff capped at `MAX_BACKOFF`.
/// A 404 is a typed not-found, distinct from other failures, and is never
/// retried.
pub async fn send_with_retry<F>(build: F, platform: &str, operation: &str) -> Result<reqwest::Response, PlatformError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut attempt = 0;
    let mut backoff = Duration::from_millis(250);

    loop {
        let outcome = build().send().await;
        match outcome {
            Ok(response) if response.status().is_success() => return Ok(response),
            Ok(response) if response.status() == reqwest::StatusCode::NOT_FOUND => {
                return Err(PlatformError::not_found(platform, operation));
            }
            Ok(response) => {
                if attempt >= MAX_RETRIES {
                    return Err(PlatformError::new(platform, operation, format!("unexpected status {}", response.status())));
                }
            }
            Err(e) => {
                if attempt >= MAX_RETRIES {
                    return Err(PlatformError::new(platform, operation, "request failed").with_cause(e));
                }
            }
        }
        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(MAX_BACKOFF);
        attempt += 1;
    }
}

pub async fn send_json_with_retry<T, F>(build: F, platform: &str, operation: &str) -> Result<T, PlatformError>
where
    T: DeserializeOwned,
    F: Fn() -> reqwest::RequestBuilder,
{
    let response = send_with_retry(build, platform, operation).await?;
    response
        .json::<T>()
        .await
        .map_err(|e| PlatformError::new(platform, operation, "failed to decode response").with_cause(e))
}
