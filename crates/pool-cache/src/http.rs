//! Shared HTTP plumbing for the indexer and node sources

use std::future::Future;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::source::SourceError;

/// Default per-request timeout. The cache applies its own per-source budget on top.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = "xroute";

/// Build the client shared by every source of a process
pub fn build_client() -> Result<reqwest::Client, SourceError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| SourceError::Transport {
            source_name: "http-client".to_string(),
            message: e.to_string(),
        })
}

/// Join a base URL and a path without doubling slashes
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Wrap a request future with a timeout, mapping expiry to [`SourceError::Timeout`]
pub async fn timed_request<T>(
    timeout: Duration,
    source_name: &str,
    fut: impl Future<Output = Result<T, SourceError>>,
) -> Result<T, SourceError> {
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| SourceError::Timeout {
            source_name: source_name.to_string(),
            after_ms: timeout.as_millis() as u64,
        })?
}

/// GET `url` and decode the JSON body
pub async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    source_name: &str,
    url: &str,
    timeout: Duration,
) -> Result<T, SourceError> {
    timed_request(timeout, source_name, async {
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| SourceError::Transport {
                source_name: source_name.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Http {
                source_name: source_name.to_string(),
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response.json::<T>().await.map_err(|e| SourceError::Parse {
            source_name: source_name.to_string(),
            message: format!("{}: {}", url, e),
        })
    })
    .await
}

/// POST `body` as JSON to `url` and decode the JSON response
pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
    client: &reqwest::Client,
    source_name: &str,
    url: &str,
    body: &B,
    timeout: Duration,
) -> Result<T, SourceError> {
    timed_request(timeout, source_name, async {
        let response = client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| SourceError::Transport {
                source_name: source_name.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Http {
                source_name: source_name.to_string(),
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response.json::<T>().await.map_err(|e| SourceError::Parse {
            source_name: source_name.to_string(),
            message: format!("{}: {}", url, e),
        })
    })
    .await
}
