//! Core components for asyncaws.
//!
//! This crate holds the pieces shared by the signers and the API client:
//!
//! - **Context**: the injected capabilities, an HTTP transport and the environment.
//! - **Request**: an unsent request whose body can be buffered and replayed.
//! - **RequestContext**: per-call options such as the signing date or presign expiration.
//! - **Traits**: `ProvideCredential` loads credentials, `SignRequest` signs a request in place.
//! - **CredentialCache**: keeps a credential until it expires.
//!
//! ## Example
//!
//! ```no_run
//! use asyncaws_core::{Context, ProvideCredential, Request, RequestContext, Result, SignRequest, SigningCredential};
//! use async_trait::async_trait;
//!
//! #[derive(Clone, Debug)]
//! struct MyCredential {
//!     token: String,
//! }
//!
//! impl SigningCredential for MyCredential {
//!     fn is_valid(&self) -> bool {
//!         !self.token.is_empty()
//!     }
//! }
//!
//! #[derive(Debug)]
//! struct BearerSigner;
//!
//! #[async_trait]
//! impl SignRequest for BearerSigner {
//!     type Credential = MyCredential;
//!
//!     async fn sign_request(
//!         &self,
//!         _: &Context,
//!         req: &mut Request,
//!         cred: Option<&Self::Credential>,
//!         _: &RequestContext,
//!     ) -> Result<()> {
//!         if let Some(cred) = cred {
//!             req.set_sensitive_header("authorization", &format!("Bearer {}", cred.token))?;
//!         }
//!         Ok(())
//!     }
//! }
//! ```

#![warn(missing_docs)]

mod api;
pub use api::{ProvideCredential, SignRequest, SigningCredential};
mod context;
pub use context::{Context, Env, HttpSend, OsEnv, StaticEnv};
mod error;
pub use error::{Error, ErrorKind, Result};
pub mod hash;
mod request;
pub use request::{encode_query, Body, Request};
mod request_context;
pub use request_context::RequestContext;
mod signer;
pub use signer::CredentialCache;
pub mod time;
pub mod utils;
