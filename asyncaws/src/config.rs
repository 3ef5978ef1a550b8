use std::time::Duration;

use log::warn;
use rand::Rng;

use asyncaws_core::Context;

/// Env var holding the default region.
pub const AWS_REGION: &str = "AWS_REGION";
/// Legacy env var holding the default region.
pub const AWS_DEFAULT_REGION: &str = "AWS_DEFAULT_REGION";
/// Env var holding a custom endpoint.
pub const AWS_ENDPOINT_URL: &str = "AWS_ENDPOINT_URL";
/// Env var holding the retry budget.
pub const AWS_MAX_ATTEMPTS: &str = "AWS_MAX_ATTEMPTS";

/// Placeholder in a custom endpoint replaced by the signing region.
pub const REGION_PLACEHOLDER: &str = "%region%";

/// Retry policy of the HTTP client.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of transport invocations, the first one included.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound of a single delay.
    pub max_delay: Duration,
    /// Growth factor between consecutive delays.
    pub multiplier: f64,
    /// Randomize each delay between half and all of its value.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(20),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Create a retry policy with `max_attempts`.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// A policy that sends every request exactly once.
    pub fn no_retry() -> Self {
        Self::new(1)
    }

    /// Set the delay before the first retry.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the upper bound of a single delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the growth factor.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Enable or disable jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay to wait after the failed attempt number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let base = self.initial_delay.as_secs_f64() * self.multiplier.max(1.0).powi(exp);
        let capped = base.min(self.max_delay.as_secs_f64());

        let secs = if self.jitter {
            capped * rand::thread_rng().gen_range(0.5..=1.0)
        } else {
            capped
        };
        Duration::from_secs_f64(secs)
    }
}

/// Client configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Region used when a call does not override it.
    pub region: String,
    /// Custom endpoint, e.g. `http://localhost:9000`.
    ///
    /// May contain `%region%`.
    pub endpoint: Option<String>,
    /// Stream every non-empty `s3v4` body as signed `aws-chunked` frames.
    pub send_chunked_body: bool,
    /// Size of one `aws-chunked` frame.
    pub chunk_size: usize,
    /// Stream `s3v4` bodies larger than this many bytes as `aws-chunked`.
    ///
    /// `None` keeps every body inline unless `send_chunked_body` is set.
    pub chunk_threshold: Option<usize>,
    /// Retry policy.
    pub retry: RetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            endpoint: None,
            send_chunked_body: false,
            chunk_size: asyncaws_aws_v4::DEFAULT_CHUNK_SIZE,
            chunk_threshold: Some(asyncaws_aws_v4::DEFAULT_CHUNK_SIZE),
            retry: RetryConfig::default(),
        }
    }
}

impl Config {
    /// Create the default config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default region.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Set a custom endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Force chunked streaming signatures.
    pub fn with_send_chunked_body(mut self, send_chunked_body: bool) -> Self {
        self.send_chunked_body = send_chunked_body;
        self
    }

    /// Set the `aws-chunked` frame size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set or clear the size above which bodies are chunked.
    pub fn with_chunk_threshold(mut self, threshold: Option<usize>) -> Self {
        self.chunk_threshold = threshold;
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Override fields with the values found in the environment.
    pub fn from_env(mut self, ctx: &Context) -> Self {
        if let Some(region) = ctx
            .env_var(AWS_REGION)
            .or_else(|| ctx.env_var(AWS_DEFAULT_REGION))
            .filter(|v| !v.is_empty())
        {
            self.region = region;
        }
        if let Some(endpoint) = ctx.env_var(AWS_ENDPOINT_URL).filter(|v| !v.is_empty()) {
            self.endpoint = Some(endpoint);
        }
        if let Some(v) = ctx.env_var(AWS_MAX_ATTEMPTS) {
            match v.parse::<u32>() {
                Ok(n) if n > 0 => self.retry.max_attempts = n,
                _ => warn!("ignoring invalid {AWS_MAX_ATTEMPTS} value: {v:?}"),
            }
        }
        self
    }
}
