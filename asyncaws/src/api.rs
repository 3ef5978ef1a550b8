use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::sync::Arc;

use log::debug;
use tokio::runtime::Handle;

use asyncaws_aws_v4::{Credential, RequestSigner};
use asyncaws_core::{
    encode_query, Context, CredentialCache, Error, ProvideCredential, Request, RequestContext,
    Result, SignRequest,
};

use crate::config::{Config, REGION_PLACEHOLDER};
use crate::endpoint::EndpointMetadata;
use crate::error::{AwsErrorFactory, ChainAwsErrorFactory};
use crate::response::{Response, ResponseInfo};
use crate::result::{ApiResult, Output};
use crate::retry::RetryHttpClient;

/// Static description of one AWS service.
pub trait Service: Debug + Send + Sync + 'static {
    /// Service name in the credential scope, e.g. `s3`.
    fn signing_name(&self) -> &str;

    /// Signature versions the service accepts, preferred first.
    fn signature_versions(&self) -> Vec<String> {
        vec!["v4".to_string()]
    }

    /// Endpoint of the service in `region`.
    fn endpoint_metadata(&self, region: &str) -> EndpointMetadata {
        EndpointMetadata::for_region(self.signing_name(), region, self.signature_versions())
    }

    /// Decoder of the error bodies this service returns.
    fn error_factory(&self) -> Arc<dyn AwsErrorFactory> {
        Arc::new(ChainAwsErrorFactory)
    }
}

/// A [`Service`] described by plain values.
#[derive(Debug, Clone)]
pub struct GenericService {
    signing_name: String,
    signature_versions: Vec<String>,
    error_factory: Arc<dyn AwsErrorFactory>,
}

impl GenericService {
    /// Describe the service signed as `signing_name`.
    pub fn new(signing_name: impl Into<String>) -> Self {
        Self {
            signing_name: signing_name.into(),
            signature_versions: vec!["v4".to_string()],
            error_factory: Arc::new(ChainAwsErrorFactory),
        }
    }

    /// Set the accepted signature versions.
    pub fn with_signature_versions<I, S>(mut self, versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.signature_versions = versions.into_iter().map(Into::into).collect();
        self
    }

    /// Set the error decoder.
    pub fn with_error_factory(mut self, factory: impl AwsErrorFactory) -> Self {
        self.error_factory = Arc::new(factory);
        self
    }
}

impl Service for GenericService {
    fn signing_name(&self) -> &str {
        &self.signing_name
    }

    fn signature_versions(&self) -> Vec<String> {
        self.signature_versions.clone()
    }

    fn error_factory(&self) -> Arc<dyn AwsErrorFactory> {
        self.error_factory.clone()
    }
}

/// A boxed signer working with AWS credentials.
pub type BoxedSigner = Box<dyn SignRequest<Credential = Credential>>;

/// Builds the signer for one signature version.
pub type SignerFactory = Arc<dyn Fn(&EndpointMetadata, &Config) -> BoxedSigner + Send + Sync>;

fn default_signers() -> HashMap<String, SignerFactory> {
    let v4: SignerFactory = Arc::new(|meta: &EndpointMetadata, _: &Config| -> BoxedSigner {
        Box::new(RequestSigner::new(&meta.sign_service, &meta.sign_region))
    });
    let s3v4: SignerFactory = Arc::new(|meta: &EndpointMetadata, config: &Config| -> BoxedSigner {
        let mut signer = RequestSigner::new_s3(&meta.sign_service, &meta.sign_region)
            .with_chunk_size(config.chunk_size)
            .with_send_chunked_body(config.send_chunked_body);
        if let Some(threshold) = config.chunk_threshold {
            signer = signer.with_chunk_threshold(threshold);
        }
        Box::new(signer)
    });
    HashMap::from([("v4".to_string(), v4), ("s3v4".to_string(), s3v4)])
}

/// Client for one AWS service.
///
/// It resolves the endpoint, loads credentials, signs and sends requests.
/// Every call returns at once with a lazy response; nothing is raised until
/// the response is resolved.
///
/// Clones share the credential cache and the transport.
#[derive(Clone)]
pub struct Client {
    ctx: Context,
    config: Arc<Config>,
    service: Arc<dyn Service>,
    credentials: Option<CredentialCache<Credential>>,
    http: RetryHttpClient,
    signers: Arc<HashMap<String, SignerFactory>>,
}

impl Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut signers: Vec<_> = self.signers.keys().collect();
        signers.sort();
        f.debug_struct("Client")
            .field("ctx", &self.ctx)
            .field("config", &self.config)
            .field("service", &self.service)
            .field("credentials", &self.credentials.is_some())
            .field("signers", &signers)
            .finish()
    }
}

impl Client {
    /// Create an anonymous client for `service`.
    pub fn new(ctx: Context, config: Config, service: impl Service) -> Self {
        let http = RetryHttpClient::new(ctx.clone(), config.retry.clone());
        Self {
            ctx,
            config: Arc::new(config),
            service: Arc::new(service),
            credentials: None,
            http,
            signers: Arc::new(default_signers()),
        }
    }

    /// Sign requests with credentials from `provider`.
    pub fn with_credential_provider(
        mut self,
        provider: impl ProvideCredential<Credential = Credential>,
    ) -> Self {
        self.credentials = Some(CredentialCache::new(provider));
        self
    }

    /// Register or replace the signer of a signature version.
    pub fn with_signer(mut self, version: impl Into<String>, factory: SignerFactory) -> Self {
        Arc::make_mut(&mut self.signers).insert(version.into(), factory);
        self
    }

    /// Injected capabilities.
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Client configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Service description.
    pub fn service(&self) -> &dyn Service {
        self.service.as_ref()
    }

    /// Endpoint metadata for `region`, honouring the custom endpoint.
    pub fn endpoint_metadata(&self, region: &str) -> EndpointMetadata {
        let mut meta = self.service.endpoint_metadata(region);
        if let Some(endpoint) = &self.config.endpoint {
            meta.endpoint = endpoint.replace(REGION_PLACEHOLDER, region);
        }
        meta
    }

    /// Build the full URL of `uri` with `query` in `region`.
    ///
    /// `uri` must already be percent-encoded. `region` falls back to the
    /// configured one.
    pub fn get_endpoint(&self, uri: &str, query: &[(String, String)], region: Option<&str>) -> String {
        let region = region.unwrap_or(&self.config.region);
        let meta = self.endpoint_metadata(region);

        let mut url = meta.endpoint.trim_end_matches('/').to_string();
        if !uri.starts_with('/') {
            url.push('/');
        }
        url.push_str(uri);

        if !query.is_empty() {
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str(&encode_query(query));
        }
        url
    }

    /// Start sending `request`.
    ///
    /// The exchange runs on the current tokio runtime; outside of one the
    /// returned response is already failed.
    pub fn get_response(&self, request: Request, request_ctx: RequestContext) -> Response {
        let factory = self.service.error_factory();
        let Ok(rt) = Handle::try_current() else {
            return Response::failed(
                Error::unexpected("requests must be started within a tokio runtime"),
                request_ctx,
                factory,
            );
        };

        let client = self.clone();
        let rctx = request_ctx.clone();
        let handle = rt.spawn(async move { client.send(request, &rctx).await });
        Response::pending(handle, request_ctx, factory)
    }

    /// Start sending `request` and wrap the response into a typed result.
    pub fn call<T: Output>(&self, request: Request, request_ctx: RequestContext) -> ApiResult<T> {
        ApiResult::new(self.get_response(request, request_ctx))
    }

    /// Sign `request` in the query string and return its URL.
    ///
    /// `request_ctx` must carry an expiration.
    pub async fn presign(&self, mut request: Request, request_ctx: &RequestContext) -> Result<String> {
        if request_ctx.expiration().is_none() {
            return Err(Error::request_invalid("presigning requires an expiration"));
        }
        self.prepare(&mut request, request_ctx)
            .await
            .map_err(|err| with_operation(err, request_ctx))?;
        Ok(request.url())
    }

    async fn send(&self, mut request: Request, request_ctx: &RequestContext) -> Result<ResponseInfo> {
        self.prepare(&mut request, request_ctx)
            .await
            .map_err(|err| with_operation(err, request_ctx))?;

        let url = request.url();
        debug!(
            "sending {} {url}",
            request_ctx.operation().unwrap_or(request.method().as_str())
        );
        let delivered = self
            .http
            .send(request.to_http()?, request_ctx.max_attempts())
            .await
            .map_err(|err| with_operation(err, request_ctx))?;

        let (parts, body) = delivered.response.into_parts();
        Ok(ResponseInfo::new(parts.status, parts.headers, body, url).with_attempts(delivered.attempts))
    }

    /// Resolve the endpoint, buffer the body, load credentials and sign.
    async fn prepare(&self, request: &mut Request, request_ctx: &RequestContext) -> Result<()> {
        let region = request_ctx.region().unwrap_or(&self.config.region);
        let meta = self.endpoint_metadata(region);

        let endpoint = self.get_endpoint(request.uri(), request.query(), Some(region));
        request.set_endpoint(&endpoint);
        request.buffer_body().await?;

        let credential = match &self.credentials {
            Some(cache) => Some(cache.get(&self.ctx).await?),
            None => None,
        };

        let factory = meta
            .sign_versions
            .iter()
            .find_map(|version| self.signers.get(version))
            .ok_or_else(|| {
                Error::config_invalid(format!(
                    "no signer registered for signature versions {:?}",
                    meta.sign_versions
                ))
            })?;
        let signer = factory(&meta, &self.config);
        signer
            .sign_request(&self.ctx, request, credential.as_ref(), request_ctx)
            .await
    }
}

fn with_operation(err: Error, request_ctx: &RequestContext) -> Error {
    match request_ctx.operation() {
        Some(operation) => err.with_context(format!("operation: {operation}")),
        None => err,
    }
}
