use std::sync::Arc;
use std::time::Duration;

use super::ClientConfig;
use super::TreeClient;
use crate::RawConnection;
use crate::Result;

pub struct ClientBuilder {
    config: ClientConfig,
    raw: Arc<dyn RawConnection>,
}

impl ClientBuilder {
    /// Create a new builder with default config around an injected protocol
    /// client.
    pub fn new(raw: Arc<dyn RawConnection>) -> Self {
        Self {
            config: ClientConfig::default(),
            raw,
        }
    }

    /// Set the initial-connection timeout (default: 10s)
    pub fn connect_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Cap the CAS retry loop (default: unbounded)
    pub fn cas_max_attempts(
        mut self,
        attempts: u32,
    ) -> Self {
        self.config.cas_max_attempts = Some(attempts);
        self
    }

    /// Start the dispatch thread, connect and block until the session is up
    /// or the connect timeout elapses.
    ///
    /// # Errors
    /// - [`crate::Error::ConnectTimeout`] when the session does not come up
    ///   in time
    pub fn build(self) -> Result<TreeClient> {
        TreeClient::connect(self.raw, self.config)
    }
}
