use std::collections::BTreeMap;
use std::fmt::Write;

use async_trait::async_trait;
use http::header;
use log::debug;
use percent_encoding::{percent_decode_str, utf8_percent_encode};

use asyncaws_core::hash::{base64_md5, hex_hmac_sha256, hex_sha256, hmac_sha256};
use asyncaws_core::time::{format_date, format_iso8601, now, DateTime};
use asyncaws_core::{Context, Error, Request, RequestContext, Result, SignRequest};

use crate::chunked::{self, ChunkSigner};
use crate::constants::{
    ALGORITHM, AWS_CHUNKED, AWS_QUERY_ENCODE_SET, AWS_URI_ENCODE_SET, CONTENT_MD5,
    DEFAULT_CHUNK_SIZE, MAX_PRESIGN_SECONDS, STREAMING_PAYLOAD, UNSIGNABLE_HEADERS,
    UNSIGNED_PAYLOAD, X_AMZ_CONTENT_SHA_256, X_AMZ_DATE, X_AMZ_DECODED_CONTENT_LENGTH,
    X_AMZ_SECURITY_TOKEN,
};
use crate::Credential;

/// RequestSigner that implement AWS SigV4.
///
/// - [Signature Version 4 signing process](https://docs.aws.amazon.com/general/latest/gr/signature-version-4.html)
///
/// Two flavours exist. The generic one URI-encodes the path twice and always
/// hashes the payload. The S3 one signs the path as-is, presigns with
/// `UNSIGNED-PAYLOAD` and can stream the body as signed `aws-chunked` frames.
#[derive(Debug, Clone)]
pub struct RequestSigner {
    service: String,
    region: String,
    s3: bool,

    chunk_size: usize,
    chunk_threshold: Option<usize>,
    send_chunked_body: bool,

    time: Option<DateTime>,
}

impl RequestSigner {
    /// Create a new signer for a generic AWS service (`v4`).
    pub fn new(service: &str, region: &str) -> Self {
        Self {
            service: service.into(),
            region: region.into(),
            s3: false,

            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_threshold: None,
            send_chunked_body: false,

            time: None,
        }
    }

    /// Create a new signer with the S3 rules (`s3v4`).
    pub fn new_s3(service: &str, region: &str) -> Self {
        Self {
            s3: true,
            ..Self::new(service, region)
        }
    }

    /// Service name in the credential scope.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Region name in the credential scope.
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Size of one `aws-chunked` frame.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Stream bodies larger than `threshold` bytes as `aws-chunked`.
    pub fn with_chunk_threshold(mut self, threshold: usize) -> Self {
        self.chunk_threshold = Some(threshold);
        self
    }

    /// Always stream non-empty bodies as `aws-chunked`.
    pub fn with_send_chunked_body(mut self, send_chunked_body: bool) -> Self {
        self.send_chunked_body = send_chunked_body;
        self
    }

    /// Specify the signing time.
    ///
    /// # Note
    ///
    /// We should always take current time to sign requests.
    /// Only use this function for testing.
    pub fn with_time(mut self, time: DateTime) -> Self {
        self.time = Some(time);
        self
    }

    fn should_chunk(&self, len: usize) -> bool {
        if !self.s3 || len == 0 {
            return false;
        }
        self.send_chunked_body || self.chunk_threshold.is_some_and(|t| len > t)
    }

    fn scope(&self, now: DateTime) -> String {
        format!(
            "{}/{}/{}/aws4_request",
            format_date(now),
            self.region,
            self.service
        )
    }

    fn canonical_path(&self, req: &Request) -> Result<String> {
        let path = req.endpoint_path()?;
        if self.s3 {
            let decoded = percent_decode_str(&path).decode_utf8().map_err(|e| {
                Error::request_invalid("request path is not valid utf-8").with_source(e)
            })?;
            Ok(utf8_percent_encode(&decoded, &AWS_URI_ENCODE_SET).to_string())
        } else {
            // The path is already encoded once, encode it again.
            Ok(utf8_percent_encode(&path, &AWS_URI_ENCODE_SET).to_string())
        }
    }

    fn sign_headers(&self, req: &mut Request, cred: &Credential, now: DateTime) -> Result<()> {
        let body = req.body_bytes()?;
        let chunked = self.should_chunk(body.len());

        req.set_header(X_AMZ_DATE, &format_iso8601(now))?;
        if let Some(token) = &cred.session_token {
            req.set_sensitive_header(X_AMZ_SECURITY_TOKEN, token)?;
        }
        if !req.has_header(header::HOST.as_str()) {
            let host = req.host()?;
            req.set_header(header::HOST.as_str(), &host)?;
        }

        let payload_hash = if chunked {
            let encoding = match req.header(header::CONTENT_ENCODING.as_str()) {
                Some(existing) if !existing.is_empty() => format!("{AWS_CHUNKED}, {existing}"),
                _ => AWS_CHUNKED.to_string(),
            };
            req.set_header(header::CONTENT_ENCODING.as_str(), &encoding)?;
            req.set_header(X_AMZ_DECODED_CONTENT_LENGTH, &body.len().to_string())?;
            req.set_header(
                header::CONTENT_LENGTH.as_str(),
                &chunked::encoded_length(body.len(), self.chunk_size).to_string(),
            )?;
            if !req.has_header(CONTENT_MD5) {
                req.set_header(CONTENT_MD5, &base64_md5(&body))?;
            }
            STREAMING_PAYLOAD.to_string()
        } else {
            match req.header(X_AMZ_CONTENT_SHA_256) {
                Some(v) if self.s3 => v.to_string(),
                _ => hex_sha256(&body),
            }
        };
        req.set_header(X_AMZ_CONTENT_SHA_256, &payload_hash)?;

        let signed = canonical_headers(req)?;
        let creq = canonical_request_string(
            req,
            &self.canonical_path(req)?,
            &canonical_query(req.query()),
            &signed,
            &payload_hash,
        )?;

        let scope = self.scope(now);
        let signing_key =
            generate_signing_key(&cred.secret_access_key, now, &self.region, &self.service);
        let signature = sign_string(&signing_key, now, &scope, &creq)?;

        req.set_sensitive_header(
            header::AUTHORIZATION.as_str(),
            &format!(
                "{ALGORITHM} Credential={}/{}, SignedHeaders={}, Signature={}",
                cred.access_key_id,
                scope,
                signed_header_names(&signed),
                signature
            ),
        )?;

        if chunked {
            let datetime = format_iso8601(now);
            let mut chunk_signer = ChunkSigner::new(&signing_key, &datetime, &scope, signature);
            req.set_body(chunked::encode(&body, self.chunk_size, &mut chunk_signer));
        }

        Ok(())
    }

    fn presign(
        &self,
        req: &mut Request,
        cred: &Credential,
        now: DateTime,
        expiration: DateTime,
    ) -> Result<()> {
        let expires_in = (expiration - now).num_seconds();
        if expires_in <= 0 {
            return Err(Error::request_invalid(format!(
                "presign expiration {expiration} is not after signing time {now}"
            )));
        }
        if expires_in > MAX_PRESIGN_SECONDS {
            return Err(Error::request_invalid(
                "presigned url cannot be valid for more than 7 days",
            ));
        }

        if !req.has_header(header::HOST.as_str()) {
            let host = req.host()?;
            req.set_header(header::HOST.as_str(), &host)?;
        }

        let payload_hash = if self.s3 {
            UNSIGNED_PAYLOAD.to_string()
        } else {
            match req.header(X_AMZ_CONTENT_SHA_256) {
                Some(v) => v.to_string(),
                None => hex_sha256(&req.body_bytes()?),
            }
        };

        let scope = self.scope(now);
        let signed = canonical_headers(req)?;

        req.query_push("X-Amz-Algorithm", ALGORITHM);
        req.query_push(
            "X-Amz-Credential",
            format!("{}/{}", cred.access_key_id, scope),
        );
        req.query_push("X-Amz-Date", format_iso8601(now));
        req.query_push("X-Amz-Expires", expires_in.to_string());
        req.query_push("X-Amz-SignedHeaders", signed_header_names(&signed));
        if let Some(token) = &cred.session_token {
            req.query_push("X-Amz-Security-Token", token.as_str());
        }

        let creq = canonical_request_string(
            req,
            &self.canonical_path(req)?,
            &canonical_query(req.query()),
            &signed,
            &payload_hash,
        )?;

        let signing_key =
            generate_signing_key(&cred.secret_access_key, now, &self.region, &self.service);
        let signature = sign_string(&signing_key, now, &scope, &creq)?;
        req.query_push("X-Amz-Signature", signature);

        Ok(())
    }
}

#[async_trait]
impl SignRequest for RequestSigner {
    type Credential = Credential;

    async fn sign_request(
        &self,
        _: &Context,
        req: &mut Request,
        credential: Option<&Self::Credential>,
        request_ctx: &RequestContext,
    ) -> Result<()> {
        let Some(cred) = credential else {
            return Ok(());
        };
        let now = request_ctx
            .current_date()
            .or(self.time)
            .unwrap_or_else(now);

        match request_ctx.expiration() {
            Some(expiration) => self.presign(req, cred, now, expiration),
            None => self.sign_headers(req, cred, now),
        }
    }
}

/// Collect the signable headers: lowercase names, trimmed values, repeated
/// values joined by `,`.
fn canonical_headers(req: &Request) -> Result<BTreeMap<String, String>> {
    let mut signed: BTreeMap<String, String> = BTreeMap::new();

    for (name, value) in req.headers() {
        let name = name.as_str();
        if UNSIGNABLE_HEADERS.contains(&name) {
            continue;
        }
        let value = normalize_header_value(value.to_str()?);
        signed
            .entry(name.to_string())
            .and_modify(|v| {
                v.push(',');
                v.push_str(&value);
            })
            .or_insert(value);
    }

    Ok(signed)
}

/// Trim the value and collapse inner runs of spaces into one.
fn normalize_header_value(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn signed_header_names(signed: &BTreeMap<String, String>) -> String {
    signed.keys().map(String::as_str).collect::<Vec<_>>().join(";")
}

/// Encode every pair then sort by encoded name and value.
fn canonical_query(query: &[(String, String)]) -> String {
    let mut pairs = query
        .iter()
        .map(|(k, v)| {
            (
                utf8_percent_encode(k, &AWS_QUERY_ENCODE_SET).to_string(),
                utf8_percent_encode(v, &AWS_QUERY_ENCODE_SET).to_string(),
            )
        })
        .collect::<Vec<_>>();
    pairs.sort();

    pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn canonical_request_string(
    req: &Request,
    path: &str,
    query: &str,
    signed: &BTreeMap<String, String>,
    payload_hash: &str,
) -> Result<String> {
    // 256 is specially chosen to avoid reallocation for most requests.
    let mut f = String::with_capacity(256);

    writeln!(f, "{}", req.method())?;
    writeln!(f, "{path}")?;
    writeln!(f, "{query}")?;
    for (name, value) in signed {
        writeln!(f, "{name}:{value}")?;
    }
    writeln!(f)?;
    writeln!(f, "{}", signed_header_names(signed))?;
    write!(f, "{payload_hash}")?;

    debug!("calculated canonical request: {f}");
    Ok(f)
}

fn sign_string(signing_key: &[u8], now: DateTime, scope: &str, creq: &str) -> Result<String> {
    // StringToSign:
    //
    // AWS4-HMAC-SHA256
    // 20220313T072004Z
    // 20220313/<region>/<service>/aws4_request
    // <hashed_canonical_request>
    let mut f = String::new();
    writeln!(f, "{ALGORITHM}")?;
    writeln!(f, "{}", format_iso8601(now))?;
    writeln!(f, "{scope}")?;
    write!(f, "{}", hex_sha256(creq.as_bytes()))?;
    debug!("calculated string to sign: {f}");

    Ok(hex_hmac_sha256(signing_key, f.as_bytes()))
}

fn generate_signing_key(secret: &str, time: DateTime, region: &str, service: &str) -> Vec<u8> {
    // Sign secret
    let secret = format!("AWS4{secret}");
    // Sign date
    let sign_date = hmac_sha256(secret.as_bytes(), format_date(time).as_bytes());
    // Sign region
    let sign_region = hmac_sha256(sign_date.as_slice(), region.as_bytes());
    // Sign service
    let sign_service = hmac_sha256(sign_region.as_slice(), service.as_bytes());
    // Sign request
    hmac_sha256(sign_service.as_slice(), "aws4_request".as_bytes())
}
