//! Decoding of AWS error bodies.
//!
//! Services report errors in one of four encodings:
//!
//! - XML: `<Error><Code/><Message/></Error>`, maybe wrapped in `<ErrorResponse>` or `<Response><Errors>`.
//! - flat JSON: `{"message": ...}` with the code in the `x-amzn-errortype` header.
//! - JSON-RPC: `{"__type": "namespace#Code", "message": ...}`.
//! - REST-JSON: the header first, then `code`, `__type` or `Code` in the body.
//!
//! All parsers are lenient: a missing element yields `None`.

use std::collections::BTreeMap;
use std::fmt::Debug;

use bytes::Bytes;
use http::HeaderMap;
use log::debug;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::Value;

use asyncaws_core::{Error, Result};

/// Error details decoded from a failed response body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AwsError {
    /// Normalized AWS error code.
    pub code: Option<String>,
    /// Human readable message.
    pub message: Option<String>,
    /// Error type, e.g. `Sender`.
    pub error_type: Option<String>,
    /// Extra detail.
    pub detail: Option<String>,
    /// Request id carried by the body.
    pub request_id: Option<String>,
    /// Every other scalar field.
    pub fields: BTreeMap<String, String>,
}

/// Turns a failed response into [`AwsError`].
pub trait AwsErrorFactory: Debug + Send + Sync + 'static {
    /// Parse the body. Returns an error only when the payload is malformed.
    fn create_from_content(&self, headers: &HeaderMap, body: &[u8]) -> Result<AwsError>;

    /// Parse the body, falling back to an empty error when it is malformed.
    fn create_from_response(&self, headers: &HeaderMap, body: &Bytes) -> AwsError {
        match self.create_from_content(headers, body) {
            Ok(parsed) => parsed,
            Err(err) => {
                debug!("failed to parse error body, keeping status and raw body only: {err}");
                AwsError::default()
            }
        }
    }
}

/// Strip a `namespace#` prefix and a `:uri` suffix from an error code.
///
/// ```shell
/// aws.protocoltests#InvalidGreeting => InvalidGreeting
/// ResourceNotFoundException:http://internal.amazon.com/ => ResourceNotFoundException
/// ```
pub fn normalize_code(code: &str) -> Option<String> {
    let code = code.rsplit_once('#').map_or(code, |(_, v)| v);
    let code = code.split_once(':').map_or(code, |(v, _)| v);
    let code = code.trim();
    (!code.is_empty()).then(|| code.to_string())
}

fn header_code(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-amzn-errortype")
        .and_then(|v| v.to_str().ok())
        .and_then(normalize_code)
}

fn header_request_id(headers: &HeaderMap) -> Option<String> {
    ["x-amzn-requestid", "x-amz-request-id"]
        .iter()
        .find_map(|name| headers.get(*name))
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Errors wrapped in XML.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlAwsErrorFactory;

impl AwsErrorFactory for XmlAwsErrorFactory {
    fn create_from_content(&self, headers: &HeaderMap, body: &[u8]) -> Result<AwsError> {
        let leaves = parse_xml_error(body)?;
        let mut error = AwsError {
            request_id: header_request_id(headers),
            ..Default::default()
        };

        for (name, value) in leaves {
            match name.as_str() {
                "Code" => error.code = normalize_code(&value),
                "Message" => error.message = Some(value).filter(|v| !v.is_empty()),
                "Type" => error.error_type = Some(value).filter(|v| !v.is_empty()),
                "Detail" => error.detail = Some(value).filter(|v| !v.is_empty()),
                "RequestId" | "RequestID" => error.request_id = Some(value),
                _ => {
                    error.fields.insert(name, value);
                }
            }
        }
        Ok(error)
    }
}

/// Collect the leaf elements describing the error.
///
/// Children of the first `<Error>` element are used; a root element that
/// holds `<Code>` directly works as well. A request id found anywhere in the
/// document is kept.
fn parse_xml_error(body: &[u8]) -> Result<Vec<(String, String)>> {
    let mut reader = Reader::from_reader(body);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    // Depth of the `<Error>` element whose children are collected.
    let mut error_depth: Option<usize> = None;
    let mut found_error = false;

    let mut error_leaves = Vec::new();
    let mut root_leaves = Vec::new();
    let mut request_id = None;
    let mut text = String::new();
    let mut has_children = false;

    loop {
        let event = reader.read_event().map_err(|e| {
            Error::unexpected("failed to parse xml error body").with_source(e)
        })?;
        match event {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if name == "Error" && !found_error {
                    found_error = true;
                    error_depth = Some(stack.len() + 1);
                }
                stack.push(name);
                text.clear();
                has_children = false;
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                let depth = stack.len() + 1;
                if error_depth.is_some_and(|d| depth == d + 1) {
                    error_leaves.push((name, String::new()));
                } else if depth == 2 {
                    root_leaves.push((name, String::new()));
                }
                has_children = true;
            }
            Event::Text(e) => {
                let value = e.unescape().map_err(|e| {
                    Error::unexpected("failed to unescape xml error body").with_source(e)
                })?;
                text.push_str(&value);
            }
            Event::CData(e) => text.push_str(&String::from_utf8_lossy(&e)),
            Event::End(_) => {
                let depth = stack.len();
                let Some(name) = stack.pop() else {
                    return Err(Error::unexpected("unbalanced xml error body"));
                };

                if !has_children {
                    let value = std::mem::take(&mut text);
                    if name == "RequestId" || name == "RequestID" {
                        request_id = Some(value.clone());
                    }
                    if error_depth.is_some_and(|d| depth == d + 1) {
                        error_leaves.push((name, value));
                    } else if depth == 2 {
                        root_leaves.push((name, value));
                    }
                } else if error_depth == Some(depth) {
                    error_depth = None;
                }
                // The parent of this element has at least one child.
                has_children = true;
            }
            Event::Eof if stack.is_empty() => break,
            Event::Eof => return Err(Error::unexpected("truncated xml error body")),
            _ => {}
        }
    }

    let mut leaves = if found_error {
        error_leaves
    } else if root_leaves.iter().any(|(k, _)| k == "Code") {
        root_leaves
    } else {
        return Err(Error::unexpected("xml error body has no error element"));
    };

    if let Some(id) = request_id {
        if !leaves.iter().any(|(k, _)| k == "RequestId" || k == "RequestID") {
            leaves.push(("RequestId".to_string(), id));
        }
    }
    Ok(leaves)
}

/// Where a JSON flavour looks for the error code, in order.
#[derive(Debug, Clone, Copy)]
enum CodeSource {
    Header,
    Field(&'static str),
}

fn parse_json_error(headers: &HeaderMap, body: &[u8], sources: &[CodeSource]) -> Result<AwsError> {
    let object = if body.iter().all(u8::is_ascii_whitespace) {
        serde_json::Map::new()
    } else {
        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(object)) => object,
            Ok(_) => return Err(Error::unexpected("json error body is not an object")),
            Err(e) => {
                return Err(Error::unexpected("failed to parse json error body").with_source(e))
            }
        }
    };

    let mut error = AwsError {
        request_id: header_request_id(headers),
        ..Default::default()
    };

    error.code = sources.iter().find_map(|source| match source {
        CodeSource::Header => header_code(headers),
        CodeSource::Field(name) => object
            .get(*name)
            .and_then(Value::as_str)
            .and_then(normalize_code),
    });

    for (name, value) in object {
        let value = match value {
            Value::String(v) => v,
            Value::Number(v) => v.to_string(),
            Value::Bool(v) => v.to_string(),
            _ => continue,
        };
        match name.as_str() {
            "message" | "Message" | "errorMessage" => error.message = Some(value),
            "type" | "Type" => error.error_type = Some(value),
            "detail" | "Detail" => error.detail = Some(value),
            "__type" | "code" | "Code" => {}
            _ => {
                error.fields.insert(name, value);
            }
        }
    }
    Ok(error)
}

/// Flat JSON errors: code in the `x-amzn-errortype` header.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonAwsErrorFactory;

impl AwsErrorFactory for JsonAwsErrorFactory {
    fn create_from_content(&self, headers: &HeaderMap, body: &[u8]) -> Result<AwsError> {
        parse_json_error(
            headers,
            body,
            &[CodeSource::Header, CodeSource::Field("__type")],
        )
    }
}

/// JSON-RPC errors: code in the `__type` field.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRpcAwsErrorFactory;

impl AwsErrorFactory for JsonRpcAwsErrorFactory {
    fn create_from_content(&self, headers: &HeaderMap, body: &[u8]) -> Result<AwsError> {
        parse_json_error(
            headers,
            body,
            &[CodeSource::Field("__type"), CodeSource::Header],
        )
    }
}

/// REST-JSON errors: header first, then `code`, `__type` or `Code`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RestJsonAwsErrorFactory;

impl AwsErrorFactory for RestJsonAwsErrorFactory {
    fn create_from_content(&self, headers: &HeaderMap, body: &[u8]) -> Result<AwsError> {
        parse_json_error(
            headers,
            body,
            &[
                CodeSource::Header,
                CodeSource::Field("code"),
                CodeSource::Field("__type"),
                CodeSource::Field("Code"),
            ],
        )
    }
}

/// Picks the XML or JSON parser by looking at the body.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChainAwsErrorFactory;

impl AwsErrorFactory for ChainAwsErrorFactory {
    fn create_from_content(&self, headers: &HeaderMap, body: &[u8]) -> Result<AwsError> {
        match body.iter().copied().find(|b| !b.is_ascii_whitespace()) {
            Some(b'<') => XmlAwsErrorFactory.create_from_content(headers, body),
            _ => RestJsonAwsErrorFactory.create_from_content(headers, body),
        }
    }
}
