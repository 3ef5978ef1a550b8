use std::fmt::{Debug, Formatter};
use std::mem;

use bytes::{Bytes, BytesMut};
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use http::header::HeaderName;
use http::{HeaderMap, HeaderValue, Method};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::{Error, Result};

/// RFC 3986 query encoding: everything but unreserved characters is escaped.
static QUERY_ENCODE_SET: AsciiSet = NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Encode query pairs in the given order, RFC 3986 style.
///
/// ```shell
/// [(a, b c), (d, "")] => "a=b%20c&d="
/// ```
pub fn encode_query(query: &[(String, String)]) -> String {
    let mut s = String::with_capacity(16);
    for (idx, (k, v)) in query.iter().enumerate() {
        if idx != 0 {
            s.push('&');
        }
        s.extend(utf8_percent_encode(k, &QUERY_ENCODE_SET));
        s.push('=');
        s.extend(utf8_percent_encode(v, &QUERY_ENCODE_SET));
    }
    s
}

/// Body of an unsent request.
///
/// Signing needs the exact bytes, so a streaming body is buffered with
/// [`Request::buffer_body`] before it is signed. Once buffered, the same bytes
/// are replayed verbatim on every retry.
#[derive(Default)]
pub enum Body {
    /// No body at all.
    #[default]
    Empty,
    /// An in-memory buffer.
    Bytes(Bytes),
    /// A lazy byte producer.
    Stream(BoxStream<'static, Result<Bytes>>),
}

impl Body {
    /// Build a body from a stream of chunks.
    pub fn stream(s: impl Stream<Item = Result<Bytes>> + Send + 'static) -> Self {
        Body::Stream(s.boxed())
    }

    /// Length of the body if it is known without reading it.
    pub fn len(&self) -> Option<usize> {
        match self {
            Body::Empty => Some(0),
            Body::Bytes(bs) => Some(bs.len()),
            Body::Stream(_) => None,
        }
    }

    /// Returns true if the body is known to be empty.
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// Returns true if the body is held in memory.
    pub fn is_buffered(&self) -> bool {
        !matches!(self, Body::Stream(_))
    }
}

impl Debug for Body {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Body::Empty => f.write_str("Body::Empty"),
            Body::Bytes(bs) => write!(f, "Body::Bytes({} bytes)", bs.len()),
            Body::Stream(_) => f.write_str("Body::Stream"),
        }
    }
}

impl From<Bytes> for Body {
    fn from(bs: Bytes) -> Self {
        Body::Bytes(bs)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bs: Vec<u8>) -> Self {
        Body::Bytes(bs.into())
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Body::Bytes(s.into())
    }
}

impl From<&'static str> for Body {
    fn from(s: &'static str) -> Self {
        Body::Bytes(Bytes::from_static(s.as_bytes()))
    }
}

/// An unsent HTTP request.
///
/// `uri` is the already percent-encoded operation path (`/bucket/key`).
/// `endpoint` is the fully resolved base URL the request will be sent to; it
/// is set by the client right before signing.
#[derive(Debug)]
pub struct Request {
    method: Method,
    uri: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Body,
    endpoint: String,
}

impl Request {
    /// Create a new request.
    pub fn new(
        method: Method,
        uri: impl Into<String>,
        query: Vec<(String, String)>,
        headers: HeaderMap,
        body: impl Into<Body>,
    ) -> Self {
        Self {
            method,
            uri: uri.into(),
            query,
            headers,
            body: body.into(),
            endpoint: String::new(),
        }
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Operation path, percent-encoded.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Query pairs in insertion order, not encoded.
    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    /// Get the first query value for `key`.
    pub fn query_get(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Push a new query pair into query list.
    #[inline]
    pub fn query_push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.query.push((key.into(), value.into()));
    }

    /// Remove every query pair named `key`.
    pub fn query_remove(&mut self, key: &str) {
        self.query.retain(|(k, _)| k != key);
    }

    /// Headers of this request.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable headers of this request.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Get a header value as string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns true if the header is present, regardless of case.
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains_key(name)
    }

    /// Set a header, replacing any previous value.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<()> {
        let name = HeaderName::from_bytes(name.as_bytes())?;
        self.headers.insert(name, HeaderValue::from_str(value)?);
        Ok(())
    }

    /// Set a header whose value must never show up in logs.
    pub fn set_sensitive_header(&mut self, name: &str, value: &str) -> Result<()> {
        let name = HeaderName::from_bytes(name.as_bytes())?;
        let mut value = HeaderValue::from_str(value)?;
        value.set_sensitive(true);
        self.headers.insert(name, value);
        Ok(())
    }

    /// Remove a header.
    pub fn remove_header(&mut self, name: &str) {
        self.headers.remove(name);
    }

    /// Get the request body.
    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Replace the request body.
    pub fn set_body(&mut self, body: impl Into<Body>) {
        self.body = body.into();
    }

    /// Get the buffered body bytes.
    ///
    /// Returns an error if the body is still a stream.
    pub fn body_bytes(&self) -> Result<Bytes> {
        match &self.body {
            Body::Empty => Ok(Bytes::new()),
            Body::Bytes(bs) => Ok(bs.clone()),
            Body::Stream(_) => Err(Error::request_invalid(
                "streaming body must be buffered before it is signed or sent",
            )),
        }
    }

    /// Drain a streaming body into memory so that it can be hashed and replayed.
    pub async fn buffer_body(&mut self) -> Result<()> {
        if !matches!(self.body, Body::Stream(_)) {
            return Ok(());
        }
        let Body::Stream(mut stream) = mem::take(&mut self.body) else {
            return Ok(());
        };

        let mut buf = BytesMut::new();
        while let Some(chunk) = stream.next().await {
            buf.extend_from_slice(&chunk?);
        }
        self.body = Body::Bytes(buf.freeze());
        Ok(())
    }

    /// Resolved base URL of this request, without the query string.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Set the resolved URL of this request.
    ///
    /// A query string carried by `endpoint` replaces the query pairs of the
    /// request, so that a URL built from `uri` and `query` round-trips.
    pub fn set_endpoint(&mut self, endpoint: &str) {
        match endpoint.split_once('?') {
            Some((base, query)) => {
                self.endpoint = base.to_string();
                self.query = form_urlencoded::parse(query.as_bytes())
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect();
            }
            None => self.endpoint = endpoint.to_string(),
        }
    }

    /// Parsed form of the resolved endpoint.
    pub fn endpoint_uri(&self) -> Result<http::Uri> {
        if self.endpoint.is_empty() {
            return Err(Error::request_invalid("request endpoint is not resolved"));
        }
        Ok(self.endpoint.parse::<http::Uri>()?)
    }

    /// Host header value derived from the endpoint: default ports are dropped.
    pub fn host(&self) -> Result<String> {
        let uri = self.endpoint_uri()?;
        let authority = uri
            .authority()
            .ok_or_else(|| Error::request_invalid("request without authority is invalid"))?;

        let default_port = match uri.scheme_str() {
            Some("https") => Some(443),
            Some("http") => Some(80),
            _ => None,
        };
        match authority.port_u16() {
            Some(port) if Some(port) != default_port => {
                Ok(format!("{}:{}", authority.host(), port))
            }
            _ => Ok(authority.host().to_string()),
        }
    }

    /// Path component of the resolved endpoint, `/` if empty.
    pub fn endpoint_path(&self) -> Result<String> {
        let uri = self.endpoint_uri()?;
        let path = uri.path();
        Ok(if path.is_empty() { "/" } else { path }.to_string())
    }

    /// Full URL: endpoint plus the encoded query string.
    pub fn url(&self) -> String {
        if self.query.is_empty() {
            return self.endpoint.clone();
        }
        format!("{}?{}", self.endpoint, encode_query(&self.query))
    }

    /// Convert into a transport request. The body must have been buffered.
    pub fn to_http(&self) -> Result<http::Request<Bytes>> {
        let mut req = http::Request::builder()
            .method(self.method.clone())
            .uri(self.url())
            .body(self.body_bytes()?)?;
        *req.headers_mut() = self.headers.clone();
        Ok(req)
    }
}
