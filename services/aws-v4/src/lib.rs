//! AWS SigV4 signer for asyncaws.
//!
//! ```no_run
//! use asyncaws_aws_v4::{Credential, RequestSigner};
//! use asyncaws_core::{Context, Request, RequestContext, SignRequest};
//! use http::{HeaderMap, Method};
//!
//! # async fn example() -> asyncaws_core::Result<()> {
//! let signer = RequestSigner::new_s3("s3", "us-east-1");
//! let cred = Credential::new("access_key_id", "secret_access_key");
//!
//! let mut req = Request::new(Method::GET, "/bucket/key", vec![], HeaderMap::new(), "");
//! req.set_endpoint("https://s3.us-east-1.amazonaws.com/bucket/key");
//! signer
//!     .sign_request(&Context::new(), &mut req, Some(&cred), &RequestContext::new())
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod chunked;
pub use chunked::encoded_length as chunked_content_length;

mod constants;
pub use constants::{DEFAULT_CHUNK_SIZE, STREAMING_PAYLOAD, UNSIGNABLE_HEADERS, UNSIGNED_PAYLOAD};

mod credential;
pub use credential::Credential;

mod provide_credential;
pub use provide_credential::StaticCredentialProvider;

mod sign_request;
pub use sign_request::RequestSigner;
