//! Signed, retried and lazily resolved calls to AWS-style HTTP APIs.
//!
//! A [`Client`] turns a [`Request`] into a lazy [`Response`]:
//!
//! 1. the endpoint and signing scope come from the [`Service`] description,
//! 2. credentials are loaded through a cached [`ProvideCredential`],
//! 3. the request is signed with SigV4 and sent by the [`RetryHttpClient`],
//! 4. a failure status is raised as a typed [`Error`] only when resolved.
//!
//! ```no_run
//! use asyncaws::aws::StaticCredentialProvider;
//! use asyncaws::{Bytes, Client, Config, Context, GenericService, Request, RequestContext};
//! use http::{HeaderMap, Method};
//!
//! # async fn example(ctx: Context) -> asyncaws::Result<()> {
//! let service = GenericService::new("s3").with_signature_versions(["s3v4"]);
//! let client = Client::new(ctx.clone(), Config::new().from_env(&ctx), service)
//!     .with_credential_provider(StaticCredentialProvider::new("access_key_id", "secret_access_key"));
//!
//! let req = Request::new(Method::GET, "/bucket/key", vec![], HeaderMap::new(), "");
//! let mut result = client.call::<Bytes>(req, RequestContext::new().with_operation("GetObject"));
//! let body = result.output().await?;
//! println!("{} bytes", body.len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod api;
pub use api::{BoxedSigner, Client, GenericService, Service, SignerFactory};
mod config;
pub use config::{Config, RetryConfig};
mod endpoint;
pub use endpoint::{dns_suffix, EndpointMetadata};
mod error;
pub use error::{
    AwsError, AwsErrorFactory, ChainAwsErrorFactory, Error, ErrorClass, JsonAwsErrorFactory,
    JsonRpcAwsErrorFactory, RestJsonAwsErrorFactory, Result, StructuredError, XmlAwsErrorFactory,
};
mod paginate;
pub use paginate::{PaginatedOutput, Paginator};
mod response;
pub use response::{Response, ResponseInfo};
mod result;
pub use result::{ApiResult, Json, Output, PrefetchId, Xml};
mod retry;
pub use retry::{Delivered, RetryHttpClient};

pub use asyncaws_core::{
    Body, Context, Env, HttpSend, OsEnv, ProvideCredential, Request, RequestContext, SignRequest,
    SigningCredential, StaticEnv,
};
pub use bytes::Bytes;

/// SigV4 signing.
pub mod aws {
    pub use asyncaws_aws_v4::*;
}

/// Context with the reqwest transport and the OS environment.
#[cfg(feature = "default-context")]
pub fn default_context() -> Context {
    Context::new()
        .with_http_send(asyncaws_http_send_reqwest::ReqwestHttpSend::default())
        .with_env(OsEnv)
}
