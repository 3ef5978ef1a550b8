use std::sync::{Arc, Mutex};

use log::debug;

use crate::{Context, Error, ProvideCredential, Result, SigningCredential};

/// CredentialCache loads a credential on first use and keeps it until it is
/// no longer valid.
///
/// Clones share the same cache.
#[derive(Clone, Debug)]
pub struct CredentialCache<K: SigningCredential> {
    provider: Arc<dyn ProvideCredential<Credential = K>>,
    cached: Arc<Mutex<Option<K>>>,
}

impl<K: SigningCredential> CredentialCache<K> {
    /// Create a new cache in front of `provider`.
    pub fn new(provider: impl ProvideCredential<Credential = K>) -> Self {
        Self {
            provider: Arc::new(provider),
            cached: Arc::new(Mutex::new(None)),
        }
    }

    /// Get a valid credential, loading a fresh one if needed.
    pub async fn get(&self, ctx: &Context) -> Result<K> {
        let cred = self.cached.lock().expect("lock poisoned").clone();
        if let Some(cred) = cred.filter(|v| v.is_valid()) {
            return Ok(cred);
        }

        debug!("cached credential is missing or expired, loading a new one");
        let cred = self
            .provider
            .provide_credential(ctx)
            .await?
            .ok_or_else(|| Error::credential_invalid("credentials unavailable"))?;
        *self.cached.lock().expect("lock poisoned") = Some(cred.clone());
        Ok(cred)
    }

    /// Drop the cached credential so that the next call reloads it.
    pub fn invalidate(&self) {
        *self.cached.lock().expect("lock poisoned") = None;
    }
}
