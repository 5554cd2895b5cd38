//! Session Configuration

use std::time::Duration;

use hdom_dom::DEFAULT_CAPACITY;
use hdom_js::HostOptions;
use url::Url;

use crate::error::SessionError;

/// Session configuration options
#[derive(Debug, Clone)]
pub struct Config {
    /// How long `exec` waits for the script thread to answer
    pub exec_timeout: Duration,

    /// Quiet period that ends change tracking
    pub idle_timeout: Duration,

    /// Mutation records kept before new ones are dropped
    pub mutation_capacity: usize,

    /// Page URL, base of `location` and relative requests
    pub origin: String,

    /// User agent string
    pub user_agent: String,

    /// QuickJS heap limit (bytes)
    pub memory_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exec_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(1),
            mutation_capacity: DEFAULT_CAPACITY,
            origin: "https://example.com/".to_string(),
            user_agent: HostOptions::DEFAULT_USER_AGENT.to_string(),
            memory_limit: 64 * 1024 * 1024, // 64MB
        }
    }
}

impl Config {
    pub fn origin_url(&self) -> Result<Url, SessionError> {
        Url::parse(&self.origin).map_err(|err| SessionError::Config(format!("origin {:?}: {}", self.origin, err)))
    }

    /// Options for the script host; its own deadline matches `exec_timeout`
    pub(crate) fn host_options(&self) -> Result<HostOptions, SessionError> {
        let mut options = HostOptions::new(self.origin_url()?);
        options.user_agent = self.user_agent.clone();
        options.memory_limit = self.memory_limit;
        options.script_timeout = Some(self.exec_timeout);
        Ok(options)
    }
}
