use std::collections::HashMap;
use std::sync::Arc;

use crate::time::{self, DateTime};

/// Per-call options attached to a request.
///
/// All fields are optional: an empty context means "sign now, no presign,
/// region from config, default retry budget".
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    operation: Option<String>,
    region: Option<String>,
    error_mapping: Arc<HashMap<String, String>>,
    current_date: Option<DateTime>,
    expiration: Option<DateTime>,
    max_attempts: Option<u32>,
}

impl RequestContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the API operation, used in logs.
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Override the configured region for this call.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Map AWS error codes to typed error kinds for this operation.
    pub fn with_error_mapping<K, V>(mut self, mapping: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.error_mapping = Arc::new(
            mapping
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Sign as if the wall clock read `date`.
    pub fn with_current_date(mut self, date: DateTime) -> Self {
        self.current_date = Some(date);
        self
    }

    /// Presign the request: the signature travels in the query string and
    /// stays valid until `expiration`.
    pub fn with_expiration(mut self, expiration: DateTime) -> Self {
        self.expiration = Some(expiration);
        self
    }

    /// Override the retry budget for this call.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Operation name, if any.
    pub fn operation(&self) -> Option<&str> {
        self.operation.as_deref()
    }

    /// Region override, if any.
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Look up the typed kind registered for an AWS error code.
    pub fn mapped_error(&self, code: &str) -> Option<&str> {
        self.error_mapping.get(code).map(String::as_str)
    }

    /// Explicit signing date, if any.
    pub fn current_date(&self) -> Option<DateTime> {
        self.current_date
    }

    /// Signing date: the explicit one, or now.
    pub fn signing_date(&self) -> DateTime {
        self.current_date.unwrap_or_else(time::now)
    }

    /// Presign expiration, if any.
    pub fn expiration(&self) -> Option<DateTime> {
        self.expiration
    }

    /// Retry budget override, if any.
    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }
}
