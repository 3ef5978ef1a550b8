//! aws-chunked framing for streamed S3 uploads.
//!
//! Every chunk is sent as `<hex len>;chunk-signature=<sig>\r\n<data>\r\n` and
//! signed over the signature of the previous chunk, starting from the seed
//! signature of the request headers. A zero length chunk ends the stream.

use bytes::{BufMut, Bytes, BytesMut};
use log::debug;

use asyncaws_core::hash::{hex_hmac_sha256, hex_sha256, EMPTY_STRING_SHA256};

use crate::constants::CHUNK_ALGORITHM;

/// `;chunk-signature=`
const SIGNATURE_PREFIX_LEN: usize = 17;
/// Hex encoded SHA256 signature.
const SIGNATURE_LEN: usize = 64;
/// The two `\r\n` around chunk data.
const CRLF_LEN: usize = 4;

/// Length of the framed body for `len` payload bytes.
///
/// ```shell
/// 65536 bytes in 64 KiB chunks => 65712
/// ```
pub fn encoded_length(len: usize, chunk_size: usize) -> usize {
    let frame = |n: usize| format!("{n:x}").len() + SIGNATURE_PREFIX_LEN + SIGNATURE_LEN + CRLF_LEN;
    let chunk_size = chunk_size.max(1);

    let full_chunks = len / chunk_size;
    let remaining = len % chunk_size;

    let mut total = len + full_chunks * frame(chunk_size);
    if remaining > 0 {
        total += frame(remaining);
    }
    total + frame(0)
}

/// Signs chunks one after the other, chaining signatures.
pub struct ChunkSigner<'a> {
    signing_key: &'a [u8],
    datetime: &'a str,
    scope: &'a str,
    previous: String,
}

impl<'a> ChunkSigner<'a> {
    /// Start a chain from the seed signature of the request.
    pub fn new(signing_key: &'a [u8], datetime: &'a str, scope: &'a str, seed: String) -> Self {
        Self {
            signing_key,
            datetime,
            scope,
            previous: seed,
        }
    }

    /// Sign the next chunk.
    ///
    /// ```shell
    /// AWS4-HMAC-SHA256-PAYLOAD
    /// 20200101T000000Z
    /// 20200101/us-east-1/s3/aws4_request
    /// <previous signature>
    /// <sha256 of empty string>
    /// <sha256 of chunk>
    /// ```
    pub fn sign(&mut self, chunk: &[u8]) -> String {
        let string_to_sign = format!(
            "{CHUNK_ALGORITHM}\n{}\n{}\n{}\n{EMPTY_STRING_SHA256}\n{}",
            self.datetime,
            self.scope,
            self.previous,
            hex_sha256(chunk)
        );
        let signature = hex_hmac_sha256(self.signing_key, string_to_sign.as_bytes());
        self.previous.clone_from(&signature);
        signature
    }
}

/// Frame the whole body, including the terminating chunk.
pub fn encode(body: &[u8], chunk_size: usize, signer: &mut ChunkSigner<'_>) -> Bytes {
    let chunk_size = chunk_size.max(1);
    let mut buf = BytesMut::with_capacity(encoded_length(body.len(), chunk_size));

    for chunk in body.chunks(chunk_size).chain(std::iter::once(&[][..])) {
        let signature = signer.sign(chunk);
        buf.put_slice(format!("{:x};chunk-signature={signature}\r\n", chunk.len()).as_bytes());
        buf.put_slice(chunk);
        buf.put_slice(b"\r\n");
    }

    debug!("framed {} body bytes into {} aws-chunked bytes", body.len(), buf.len());
    buf.freeze()
}
