//! HTTP transport for the Realtime Database REST API.
//!
//! [`Transport`] is the seam between [`DatabaseReference`](super::DatabaseReference) and the
//! network. [`HttpTransport`] is the production implementation; tests and callers may inject
//! their own.

use super::models::QueryParams;
use super::DatabaseError;
use crate::core::middleware::AuthMiddleware;
use bytes::Bytes;
use reqwest::{header, Client};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Path suffix that selects Firebase's plain JSON REST mode.
const SUFFIX: &str = ".json";

/// Default timeout for establishing a connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default deadline for sending the request and reading the response.
pub const DEFAULT_READ_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP verbs understood by the Realtime Database REST API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_http(self) -> http::Method {
        match self {
            Method::Get => http::Method::GET,
            Method::Post => http::Method::POST,
            Method::Put => http::Method::PUT,
            Method::Patch => http::Method::PATCH,
            Method::Delete => http::Method::DELETE,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_http().as_str())
    }
}

/// A single request against a database location.
///
/// `url` is the location itself, without the `.json` suffix.
#[derive(Debug, Clone)]
pub struct Call {
    pub method: Method,
    pub url: String,
    pub auth: Option<String>,
    pub body: Option<Vec<u8>>,
    pub params: QueryParams,
}

/// Executes calls against a Realtime Database.
///
/// Implementations must not keep per-call state: one instance is shared by every
/// reference derived from the same root, possibly across tasks.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Executes `call` and returns the full response body.
    ///
    /// # Errors
    ///
    /// `TransportError` when the request cannot be completed, `RemoteError` when the
    /// server answers with a status of 400 or above.
    async fn call(&self, call: Call) -> Result<Bytes, DatabaseError>;
}

/// [`Transport`] over HTTP with bounded connect and read/write time.
#[derive(Clone)]
pub struct HttpTransport {
    client: ClientWithMiddleware,
}

impl HttpTransport {
    /// Creates a transport with the default timeouts and no OAuth2 middleware.
    pub fn new() -> Result<Self, DatabaseError> {
        Self::builder().build()
    }

    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder::default()
    }

    /// Creates a transport around a preconfigured client.
    pub fn new_with_client(client: ClientWithMiddleware) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn call(&self, call: Call) -> Result<Bytes, DatabaseError> {
        let url = request_url(&call.url, call.auth.as_deref(), &call.params)?;
        debug!(method = %call.method, url = %redacted(&url), "calling firebase");

        let mut request = self
            .client
            .request(call.method.as_http(), url.clone())
            .header(header::CONNECTION, "close");
        if let Some(body) = call.body {
            request = request
                .header(header::CONTENT_TYPE, "application/json")
                .body(body);
        }

        let response = request.send().await.map_err(|e| {
            warn!(
                method = %call.method,
                url = %redacted(&url),
                error = %e,
                "request to firebase failed"
            );
            DatabaseError::TransportError(e)
        })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            warn!(
                method = %call.method,
                url = %redacted(&url),
                error = %e,
                "cannot read firebase response"
            );
            DatabaseError::from(e)
        })?;

        if status.as_u16() >= 400 {
            let message = String::from_utf8_lossy(&body).into_owned();
            warn!(
                method = %call.method,
                url = %redacted(&url),
                %status,
                %message,
                "error returned by firebase"
            );
            return Err(DatabaseError::RemoteError { status, message });
        }

        Ok(body)
    }
}

/// Builder for [`HttpTransport`].
#[derive(Clone)]
pub struct HttpTransportBuilder {
    connect_timeout: Duration,
    read_write_timeout: Duration,
    middleware: Option<AuthMiddleware>,
}

impl Default for HttpTransportBuilder {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_write_timeout: DEFAULT_READ_WRITE_TIMEOUT,
            middleware: None,
        }
    }
}

impl HttpTransportBuilder {
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn read_write_timeout(mut self, timeout: Duration) -> Self {
        self.read_write_timeout = timeout;
        self
    }

    /// Authenticates every request with a service-account OAuth2 token.
    pub fn auth_middleware(mut self, middleware: AuthMiddleware) -> Self {
        self.middleware = Some(middleware);
        self
    }

    pub fn build(self) -> Result<HttpTransport, DatabaseError> {
        // Idle pool size 0: every connection is closed once its call completes.
        let client = Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.read_write_timeout)
            .pool_max_idle_per_host(0)
            .build()?;

        let mut builder = ClientBuilder::new(client);
        if let Some(middleware) = self.middleware {
            builder = builder.with(middleware);
        }

        Ok(HttpTransport::new_with_client(builder.build()))
    }
}

/// Builds the final request URL: `.json` suffix on the path, then `auth`, then `params`.
pub(crate) fn request_url(
    location: &str,
    auth: Option<&str>,
    params: &QueryParams,
) -> Result<Url, DatabaseError> {
    let mut url = Url::parse(location)?;

    let mut path = url.path().to_string();
    if !path.ends_with('/') {
        path.push('/');
    }
    path.push_str(SUFFIX);
    url.set_path(&path);

    let mut query = QueryParams::new();
    if let Some(token) = auth.filter(|t| !t.is_empty()) {
        query.insert("auth", token);
    }
    for (key, value) in params.iter() {
        query.insert(key, value);
    }

    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in query.iter() {
            pairs.append_pair(key, value);
        }
    }

    Ok(url)
}

/// Copy of `url` safe for logging, with the `auth` parameter masked.
fn redacted(url: &Url) -> Url {
    let mut masked = url.clone();
    if url.query_pairs().any(|(k, _)| k == "auth") {
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| {
                let v = if k == "auth" {
                    "REDACTED".to_string()
                } else {
                    v.into_owned()
                };
                (k.into_owned(), v)
            })
            .collect();
        masked.query_pairs_mut().clear().extend_pairs(pairs);
    }
    masked
}
