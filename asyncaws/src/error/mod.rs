//! Errors surfaced when a result is resolved.

mod factory;
pub use factory::{
    AwsError, AwsErrorFactory, ChainAwsErrorFactory, JsonAwsErrorFactory, JsonRpcAwsErrorFactory,
    RestJsonAwsErrorFactory, XmlAwsErrorFactory,
};

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;

/// Result type used by resolved results.
pub type Result<T> = std::result::Result<T, Error>;

/// The error a caller observes when resolving a result.
///
/// Cloning is cheap: a failed result hands out the same error every time it
/// is resolved.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The service answered with a 3xx, 4xx or 5xx status.
    #[error(transparent)]
    Http(Arc<StructuredError>),
    /// No usable response: credentials, signing or transport failed.
    #[error(transparent)]
    Sdk(Arc<asyncaws_core::Error>),
    /// The response body could not be turned into the typed output.
    #[error("failed to parse response: {0}")]
    Parse(String),
    /// The exchange was aborted before it completed.
    #[error("request was cancelled before it completed")]
    Cancelled,
}

impl Error {
    /// The structured HTTP error, if the service answered with a failure status.
    pub fn as_http(&self) -> Option<&StructuredError> {
        match self {
            Error::Http(err) => Some(err),
            _ => None,
        }
    }

    /// The SDK error, if no usable response was received.
    pub fn as_sdk(&self) -> Option<&asyncaws_core::Error> {
        match self {
            Error::Sdk(err) => Some(err),
            _ => None,
        }
    }

    /// AWS error code reported by the service.
    pub fn code(&self) -> Option<&str> {
        self.as_http().and_then(StructuredError::code)
    }

    /// Typed kind selected from the operation error mapping.
    pub fn kind(&self) -> Option<&str> {
        self.as_http().and_then(StructuredError::kind)
    }

    /// HTTP status of the failed response.
    pub fn status(&self) -> Option<StatusCode> {
        self.as_http().map(StructuredError::status)
    }
}

impl From<asyncaws_core::Error> for Error {
    fn from(err: asyncaws_core::Error) -> Self {
        Error::Sdk(Arc::new(err))
    }
}

/// Status class of a failed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// 3xx
    Redirection,
    /// 4xx
    Client,
    /// 5xx
    Server,
}

impl ErrorClass {
    /// Classify a status, `None` when it is not a failure.
    pub fn from_status(status: StatusCode) -> Option<Self> {
        if status.is_redirection() {
            Some(ErrorClass::Redirection)
        } else if status.is_client_error() {
            Some(ErrorClass::Client)
        } else if status.is_server_error() {
            Some(ErrorClass::Server)
        } else {
            None
        }
    }
}

/// A failed HTTP exchange with the error details the service reported.
#[derive(Debug, Clone)]
pub struct StructuredError {
    class: ErrorClass,
    kind: Option<String>,
    status: StatusCode,
    url: String,
    code: Option<String>,
    message: Option<String>,
    error_type: Option<String>,
    detail: Option<String>,
    request_id: Option<String>,
    fields: BTreeMap<String, String>,
    body: Bytes,
}

impl StructuredError {
    /// Build from a failed response and its parsed body.
    pub fn new(
        class: ErrorClass,
        status: StatusCode,
        url: impl Into<String>,
        parsed: AwsError,
        body: Bytes,
    ) -> Self {
        Self {
            class,
            kind: None,
            status,
            url: url.into(),
            code: parsed.code,
            message: parsed.message,
            error_type: parsed.error_type,
            detail: parsed.detail,
            request_id: parsed.request_id,
            fields: parsed.fields,
            body,
        }
    }

    /// Set the typed kind selected for this error code.
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Set the request id, unless the body already carried one.
    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        if self.request_id.is_none() {
            self.request_id = request_id;
        }
        self
    }

    /// Status class.
    pub fn class(&self) -> ErrorClass {
        self.class
    }

    /// Typed kind from the operation error mapping.
    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }

    /// HTTP status.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// URL the request was sent to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// AWS error code.
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// Human readable message.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Error type, e.g. `Sender` or `Receiver`.
    pub fn error_type(&self) -> Option<&str> {
        self.error_type.as_deref()
    }

    /// Extra detail.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Request id reported by the service.
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// A service specific field of the error body.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Every service specific field of the error body.
    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    /// Raw response body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

impl fmt::Display for StructuredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {} returned for \"{}\".", self.status.as_u16(), self.url)?;
        if let Some(code) = &self.code {
            write!(f, "\n\nCode:    {code}")?;
        }
        if let Some(message) = &self.message {
            write!(f, "\nMessage: {message}")?;
        }
        if let Some(error_type) = &self.error_type {
            write!(f, "\nType:    {error_type}")?;
        }
        if let Some(detail) = &self.detail {
            write!(f, "\nDetail:  {detail}")?;
        }
        Ok(())
    }
}

impl std::error::Error for StructuredError {}
