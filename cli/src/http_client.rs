use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::GalasaError;
use crate::galasaapi::ApiClient;

const DEFAULT_RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(1);

/// Runs API operations with a ready, authenticated client.
///
/// Implementations own the credential and the rate-limit retry policy; the
/// operation may therefore be invoked more than once and must not mutate
/// anything it reads.
#[allow(async_fn_in_trait)]
pub trait CommsClient {
    fn api_server_url(&self) -> &str;

    async fn run_authenticated_command_with_rate_limit_retries<T, F, Fut>(
        &self,
        op: F,
    ) -> std::result::Result<T, GalasaError>
    where
        F: FnMut(ApiClient) -> Fut,
        Fut: Future<Output = std::result::Result<T, GalasaError>>;
}

#[derive(Debug, Clone)]
pub struct GalasaCommsClient {
    api: ApiClient,
    max_attempts: u32,
    backoff: Duration,
}

impl GalasaCommsClient {
    /// `retries` is the number of extra attempts after a 429 response.
    pub fn new(
        api_server_url: &str,
        bearer_token: Option<String>,
        timeout: Duration,
        retries: u32,
    ) -> Result<Self> {
        Ok(Self {
            api: ApiClient::new(api_server_url, bearer_token, timeout)?,
            max_attempts: retries.saturating_add(1),
            backoff: DEFAULT_RATE_LIMIT_BACKOFF,
        })
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }
}

impl CommsClient for GalasaCommsClient {
    fn api_server_url(&self) -> &str {
        self.api.base_url()
    }

    async fn run_authenticated_command_with_rate_limit_retries<T, F, Fut>(
        &self,
        mut op: F,
    ) -> std::result::Result<T, GalasaError>
    where
        F: FnMut(ApiClient) -> Fut,
        Fut: Future<Output = std::result::Result<T, GalasaError>>,
    {
        if self.api.bearer_token().is_none() {
            return Err(GalasaError::MissingBearerToken);
        }

        let mut attempt = 1;
        loop {
            match op(self.api.clone()).await {
                Err(err) if err.is_rate_limited() && attempt < self.max_attempts => {
                    let delay = self.backoff * attempt;
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        ?delay,
                        "rate limited by the Galasa API server, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                outcome => {
                    debug!(attempt, ok = outcome.is_ok(), "authenticated command finished");
                    return outcome;
                }
            }
        }
    }
}
