use std::fmt::Debug;

use crate::{Context, Request, RequestContext, Result};

/// SigningCredential is the trait used by signer as the signing credential.
pub trait SigningCredential: Clone + Debug + Send + Sync + Unpin + 'static {
    /// Check if the credential is valid.
    fn is_valid(&self) -> bool;
}

impl<T: SigningCredential> SigningCredential for Option<T> {
    fn is_valid(&self) -> bool {
        let Some(cred) = self else {
            return false;
        };

        cred.is_valid()
    }
}

/// ProvideCredential is the trait used by signer to load the credential from
/// the environment.
///
/// Returning `Ok(None)` means this provider has nothing to offer.
/// [`CredentialCache::get`](crate::CredentialCache::get) reports that as
/// [`ErrorKind::CredentialInvalid`](crate::ErrorKind::CredentialInvalid). A
/// client without any provider sends requests anonymously.
#[async_trait::async_trait]
pub trait ProvideCredential: Debug + Send + Sync + Unpin + 'static {
    /// Credential returned by this provider.
    type Credential: Send + Sync + Unpin + 'static;

    /// Load signing credential from current env.
    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>>;
}

/// SignRequest is the trait used to sign a request in place.
#[async_trait::async_trait]
pub trait SignRequest: Debug + Send + Sync + Unpin + 'static {
    /// Credential used by this signer.
    type Credential: Send + Sync + Unpin + 'static;

    /// Sign the request.
    ///
    /// ## Credential
    ///
    /// With `None` the request must be left untouched.
    ///
    /// ## Request context
    ///
    /// `request_ctx.expiration()` switches to presigning: the signature lands
    /// in the query string instead of the `Authorization` header. The body
    /// must already be buffered.
    async fn sign_request(
        &self,
        ctx: &Context,
        req: &mut Request,
        credential: Option<&Self::Credential>,
        request_ctx: &RequestContext,
    ) -> Result<()>;
}
