// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::sync::Arc;

use bytes::Bytes;

use crate::{Error, Result};

/// The capabilities a client borrows from its host: an HTTP transport and a
/// view of the environment.
///
/// Nothing is wired by default. A fresh context has a transport that fails
/// every request and an empty environment, so tests never reach the network
/// or the process environment by accident.
///
/// ```
/// use asyncaws_core::{Context, StaticEnv};
///
/// let ctx = Context::new().with_env(StaticEnv::new().with_var("AWS_REGION", "eu-west-1"));
/// assert_eq!(ctx.env_var("AWS_REGION").as_deref(), Some("eu-west-1"));
/// ```
#[derive(Clone)]
pub struct Context {
    transport: Arc<dyn HttpSend>,
    env: Arc<dyn Env>,
}

impl Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("transport", &self.transport)
            .field("env", &self.env)
            .finish()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Context without transport and with an empty environment.
    pub fn new() -> Self {
        Self {
            transport: Arc::new(NoTransport),
            env: Arc::new(StaticEnv::default()),
        }
    }

    /// Send requests through `transport`.
    pub fn with_http_send(mut self, transport: impl HttpSend) -> Self {
        self.transport = Arc::new(transport);
        self
    }

    /// Read variables from `env`.
    pub fn with_env(mut self, env: impl Env) -> Self {
        self.env = Arc::new(env);
        self
    }

    /// Send one prepared request.
    #[inline]
    pub async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        self.transport.http_send(req).await
    }

    /// Look up an environment variable; `None` when unset or not utf-8.
    #[inline]
    pub fn env_var(&self, key: &str) -> Option<String> {
        self.env.var(key)
    }
}

/// The transport capability: send one prepared request and return the
/// buffered response.
///
/// Connection pooling, TLS and timeouts belong to the implementation. When no
/// response could be obtained, return an error built with
/// [`Error::transport`]; any HTTP status, 5xx included, is a response.
#[async_trait::async_trait]
pub trait HttpSend: Debug + Send + Sync + 'static {
    /// Send one prepared request.
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>>;
}

#[derive(Debug)]
struct NoTransport;

#[async_trait::async_trait]
impl HttpSend for NoTransport {
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        Err(Error::config_invalid("context has no http transport")
            .with_context(format!("target: {} {}", req.method(), req.uri())))
    }
}

/// Source of environment variables.
pub trait Env: Debug + Send + Sync + 'static {
    /// Value of `key`, if set.
    fn var(&self, key: &str) -> Option<String>;
}

/// The variables of the current process.
#[derive(Debug, Copy, Clone, Default)]
pub struct OsEnv;

impl Env for OsEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// A fixed set of variables.
#[derive(Debug, Clone, Default)]
pub struct StaticEnv {
    vars: HashMap<String, String>,
}

impl StaticEnv {
    /// An empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `value`.
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StaticEnv {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl Env for StaticEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}
