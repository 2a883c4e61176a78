//! HTTP(S) module source fetcher.
//!
//! [`HttpFetcher`] implements the core [`SourceFetcher`] seam on `reqwest`.
//! It is called synchronously from a runtime instance thread and drives the
//! request on the tokio runtime it was created in.

use std::time::{Duration, Instant};

use reqwest::{Client, StatusCode};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use jsmod_common::{FetchConfig, FetchError, RuntimeError};
use jsmod_core::{CancelSignal, Deadline, SourceFetcher};

/// Remote module fetcher.
///
/// # Thread Safety
///
/// `fetch` blocks the calling thread. It must be called from a thread that is
/// not a tokio worker, which is how runtime instance threads call it.
#[derive(Clone)]
pub struct HttpFetcher {
    /// HTTP client (shared, connection pooled).
    client: Client,

    /// Timeout of a single fetch.
    timeout: Duration,

    /// Runtime the requests are driven on.
    handle: Handle,
}

impl HttpFetcher {
    /// Create a fetcher bound to the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::InvalidConfig`] if called outside a tokio
    /// runtime or if the HTTP client cannot be built.
    pub fn new(config: &FetchConfig) -> Result<Self, RuntimeError> {
        let handle = Handle::try_current().map_err(|e| {
            RuntimeError::invalid_config(format!("HTTP fetcher needs a tokio runtime: {e}"))
        })?;

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| {
                RuntimeError::invalid_config(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self::with_client(client, config.timeout(), handle))
    }

    /// Create with a custom HTTP client.
    pub fn with_client(client: Client, timeout: Duration, handle: Handle) -> Self {
        Self {
            client,
            timeout,
            handle,
        }
    }

    /// GET `url` and read the whole body.
    ///
    /// # Errors
    ///
    /// - 404: [`FetchError::NotFound`]
    /// - any other status but 200: [`FetchError::WrongStatus`]
    /// - connection or body read failure: [`FetchError::Transport`]
    pub async fn get(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::transport(url, e.to_string()))?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => {
                return Err(FetchError::NotFound {
                    url: url.to_string(),
                });
            }
            status => {
                return Err(FetchError::WrongStatus {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
            }
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::transport(url, e.to_string()))
    }

    fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

impl SourceFetcher for HttpFetcher {
    fn fetch(&self, url: &str, deadline: Option<&Deadline>) -> Result<String, FetchError> {
        let start = Instant::now();
        let mut signal = deadline.map_or_else(CancelSignal::never, Deadline::signal);

        debug!(url, timeout_ms = self.timeout_ms(), "Fetching remote module");

        let result = self.handle.block_on(async {
            tokio::select! {
                result = tokio::time::timeout(self.timeout, self.get(url)) => {
                    result.unwrap_or_else(|_| Err(FetchError::Timeout {
                        url: url.to_string(),
                        timeout_ms: self.timeout_ms(),
                    }))
                }
                () = signal.cancelled() => Err(FetchError::Cancelled { url: url.to_string() }),
            }
        });

        match &result {
            Ok(body) => info!(
                url,
                body_size = body.len(),
                duration_ms = start.elapsed().as_millis(),
                "Remote module fetched"
            ),
            Err(err) => warn!(url, error = %err, "Remote module fetch failed"),
        }

        result
    }
}

impl std::fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFetcher")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
