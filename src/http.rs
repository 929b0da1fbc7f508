//! JSON-over-HTTP with retry, shared by the embedding and language-model
//! clients.
//!
//! Retry strategy:
//! - HTTP 429 (rate limited) and 5xx → retry
//! - other non-success status → fail immediately
//! - network errors and timeouts → retry
//! - backoff: 1s, 2s, 4s, ... capped at 32s

use std::time::Duration;
use thiserror::Error;

/// Final failure of a retried request.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("{service} request failed: {source}")]
    Transport {
        service: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        service: String,
        status: u16,
        body: String,
    },
}

/// Build a client whose every request is bounded by `timeout_secs`.
pub fn client(timeout_secs: u64) -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Delay before retry number `attempt` (1-based).
pub fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(1 << (attempt.saturating_sub(1)).min(5))
}

/// POST `body` to `url` and return the parsed JSON response.
///
/// `service` names the upstream in error messages.
pub async fn post_json(
    client: &reqwest::Client,
    url: &str,
    bearer: Option<&str>,
    body: &serde_json::Value,
    max_retries: u32,
    service: &str,
) -> Result<serde_json::Value, HttpError> {
    let transport = |source: reqwest::Error| HttpError::Transport {
        service: service.to_string(),
        source,
    };
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            tokio::time::sleep(backoff(attempt)).await;
            tracing::debug!(service, attempt, "retrying request");
        }

        let mut request = client.post(url).json(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return response.json().await.map_err(transport);
                }

                let error = HttpError::Status {
                    service: service.to_string(),
                    status: status.as_u16(),
                    body: response.text().await.unwrap_or_default(),
                };
                if status.as_u16() == 429 || status.is_server_error() {
                    tracing::warn!(service, %status, "transient upstream error");
                    last_err = Some(error);
                    continue;
                }
                return Err(error);
            }
            Err(e) => {
                tracing::warn!(service, url, error = %e, "request failed");
                last_err = Some(transport(e));
            }
        }
    }

    // The loop runs at least once, so an error has been recorded.
    Err(last_err.unwrap_or(HttpError::Status {
        service: service.to_string(),
        status: 0,
        body: "no attempt made".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(backoff(1), Duration::from_secs(1));
        assert_eq!(backoff(2), Duration::from_secs(2));
        assert_eq!(backoff(4), Duration::from_secs(8));
        assert_eq!(backoff(6), Duration::from_secs(32));
        assert_eq!(backoff(20), Duration::from_secs(32));
    }
}
