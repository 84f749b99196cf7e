//! Firebase Realtime Database module.
//!
//! This module provides a REST client for the Realtime Database: reading data, pushing new
//! children, overwriting and partially updating locations, removing data, and managing the
//! database security rules.
//!
//! A [`DatabaseReference`] points at one location and remembers the last value fetched for it.
//! Every operation is a single HTTP round trip through the reference's [`Transport`]; derived
//! references share that transport and the reference's `auth` token.
//!
//! # Caching
//!
//! Reads populate the cache of the reference they return. Writes clear the cache of the
//! reference they were issued through, since every write lands inside that reference's subtree.
//! The one exception is a `set` of the reference's own location, which caches the written value.
//!
//! # Examples
//!
//! ```rust,no_run
//! # use firebase_database_rest::database::{DatabaseReference, QueryParams};
//! # async fn run() -> Result<(), firebase_database_rest::database::DatabaseError> {
//! let mut users = DatabaseReference::connect("https://my-db.firebaseio.com/users", None)?;
//!
//! let mut alice = users
//!     .push(&serde_json::json!({ "First": "Alice", "Last": "Smith" }), None)
//!     .await?;
//! alice
//!     .update("", &serde_json::json!({ "Last": "Jones" }), None)
//!     .await?;
//!
//! let _shallow = users.get("", Some(&QueryParams::new().shallow())).await?;
//! # Ok(())
//! # }
//! ```

pub mod models;
pub mod transport;


pub use self::models::{QueryParams, Rules};
pub use self::transport::{
    Call, HttpTransport, HttpTransportBuilder, Method, Transport, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_READ_WRITE_TIMEOUT,
};

use self::models::PushResponse;
use crate::core::FirebaseErrorResponse;
use bytes::Bytes;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;
use url::Url;

/// Path of the security rules document, relative to the database root.
const RULES_PATH: &str = "/.settings/rules";

/// Errors that can occur during Realtime Database operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// The value could not be serialized to JSON. The request was not sent.
    #[error("Serialization error: {0}")]
    EncodeError(#[source] serde_json::Error),
    /// The server answered successfully, but not with the expected JSON.
    #[error("Deserialization error: {0}")]
    DecodeError(#[source] serde_json::Error),
    /// The request could not be completed (DNS, connect, timeout, TLS, or authentication).
    #[error("HTTP Request failed: {0}")]
    TransportError(#[from] reqwest_middleware::Error),
    /// The server answered with a status of 400 or above. `message` is the raw response body.
    #[error("API error {status}: {message}")]
    RemoteError { status: StatusCode, message: String },
    /// The location is not a valid URL.
    #[error("Invalid database URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl From<reqwest::Error> for DatabaseError {
    fn from(err: reqwest::Error) -> Self {
        DatabaseError::TransportError(reqwest_middleware::Error::Reqwest(err))
    }
}

impl DatabaseError {
    /// For a `RemoteError`, the `error` field of Firebase's JSON error body, or the raw
    /// body when it has another shape. `None` for every other error.
    pub fn remote_reason(&self) -> Option<String> {
        match self {
            DatabaseError::RemoteError { message, .. } => Some(
                FirebaseErrorResponse::parse(message)
                    .map(|e| e.display_message().to_string())
                    .unwrap_or_else(|| message.clone()),
            ),
            _ => None,
        }
    }
}

/// A location in a Realtime Database, together with the last value fetched for it.
#[derive(Clone)]
pub struct DatabaseReference {
    url: String,
    auth: Option<String>,
    transport: Arc<dyn Transport>,
    value: Option<Value>,
}

impl fmt::Debug for DatabaseReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseReference")
            .field("url", &self.url)
            .field("auth", &self.auth.as_ref().map(|_| "<redacted>"))
            .field("value", &self.value)
            .finish_non_exhaustive()
    }
}

impl DatabaseReference {
    /// Creates a root reference at `url`, executing calls through `transport`.
    ///
    /// # Arguments
    ///
    /// * `url` - The location, e.g. `https://my-db.firebaseio.com/users`. No `.json` suffix.
    /// * `auth` - Optional token sent as the `auth` query parameter on every call.
    /// * `transport` - The transport shared by this reference and everything derived from it.
    pub fn new(
        url: impl Into<String>,
        auth: Option<String>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            url: url.into(),
            auth,
            transport,
            value: None,
        }
    }

    /// Creates a root reference backed by an [`HttpTransport`] with the default timeouts.
    pub fn connect(url: impl Into<String>, auth: Option<String>) -> Result<Self, DatabaseError> {
        Ok(Self::new(url, auth, Arc::new(HttpTransport::new()?)))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn auth(&self) -> Option<&str> {
        self.auth.as_deref()
    }

    /// The cached value, without fetching.
    pub fn cached(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Decodes the cached value into `T`, without fetching.
    pub fn cached_as<T: DeserializeOwned>(&self) -> Result<Option<T>, DatabaseError> {
        self.value
            .clone()
            .map(serde_json::from_value)
            .transpose()
            .map_err(DatabaseError::DecodeError)
    }

    /// Drops the cached value so the next [`value`](Self::value) goes to the server.
    pub fn invalidate(&mut self) {
        self.value = None;
    }

    /// Returns the value at this location, fetching it first if nothing is cached.
    ///
    /// Returns `None` both when the location holds no data and when the fetch fails.
    /// Use [`try_value`](Self::try_value) to tell the two apart.
    pub async fn value(&mut self) -> Option<&Value> {
        if self.value.is_none() {
            if let Some(fetched) = self.child("", None).await {
                self.value = fetched.value;
            }
        }
        self.value.as_ref()
    }

    /// Like [`value`](Self::value), but reports fetch failures.
    pub async fn try_value(&mut self) -> Result<Option<&Value>, DatabaseError> {
        if self.value.is_none() {
            if let Some(fetched) = self.get("", None).await? {
                self.value = fetched.value;
            }
        }
        Ok(self.value.as_ref())
    }

    /// Returns a reference to `path` populated with its current value.
    ///
    /// Returns `None` when the location holds no data or when the read fails for any
    /// reason; failures are logged. Use [`get`](Self::get) to tell the two apart.
    pub async fn child(
        &self,
        path: &str,
        params: Option<&QueryParams>,
    ) -> Option<DatabaseReference> {
        match self.get(path, params).await {
            Ok(child) => child,
            Err(err) => {
                warn!(url = %self.location(path), error = %err, "cannot read firebase location");
                None
            }
        }
    }

    /// Reads `path` and returns a reference to it populated with its value.
    ///
    /// Returns `Ok(None)` when the location holds no data.
    pub async fn get(
        &self,
        path: &str,
        params: Option<&QueryParams>,
    ) -> Result<Option<DatabaseReference>, DatabaseError> {
        let url = self.location(path);
        let value = self.fetch(&url, params).await?;
        Ok(value.map(|v| self.derive(url, Some(v))))
    }

    /// Reads `path` and decodes its value into `T`.
    ///
    /// Returns `Ok(None)` when the location holds no data.
    pub async fn get_as<T: DeserializeOwned>(
        &self,
        path: &str,
        params: Option<&QueryParams>,
    ) -> Result<Option<T>, DatabaseError> {
        let url = self.location(path);
        self.fetch(&url, params)
            .await?
            .map(serde_json::from_value)
            .transpose()
            .map_err(DatabaseError::DecodeError)
    }

    /// Creates a new child with a server-generated key under this location.
    ///
    /// The returned reference points at the new child and caches `value` without
    /// reading it back.
    pub async fn push<T: Serialize + ?Sized>(
        &mut self,
        value: &T,
        params: Option<&QueryParams>,
    ) -> Result<DatabaseReference, DatabaseError> {
        self.invalidate();

        let value = serde_json::to_value(value).map_err(DatabaseError::EncodeError)?;
        let body = encode(&value)?;

        let res = self
            .call(Method::Post, self.url.clone(), Some(body), params)
            .await?;
        let pushed: PushResponse = serde_json::from_slice(&res).map_err(|e| {
            warn!(url = %self.url, error = %e, "cannot decode push response");
            DatabaseError::DecodeError(e)
        })?;

        let url = self.location(&pushed.name);
        Ok(self.derive(url, Some(value)))
    }

    /// Overwrites the data at `path` and returns a reference to it.
    ///
    /// When the server echoes the written data, the returned reference caches it; with
    /// [`QueryParams::silent`] its cache stays empty. Setting this reference's own location
    /// (an empty `path`) leaves the written value in this reference's cache.
    pub async fn set<T: Serialize + ?Sized>(
        &mut self,
        path: &str,
        value: &T,
        params: Option<&QueryParams>,
    ) -> Result<DatabaseReference, DatabaseError> {
        self.invalidate();

        let url = self.location(path);
        let value = serde_json::to_value(value).map_err(DatabaseError::EncodeError)?;
        let body = encode(&value)?;

        let res = self
            .call(Method::Put, url.clone(), Some(body), params)
            .await?;

        let echoed = if res.is_empty() {
            None
        } else {
            Some(decode(&res)?)
        };

        if path.trim_matches('/').is_empty() {
            self.value = Some(echoed.clone().unwrap_or(value));
        }

        Ok(self.derive(url, echoed))
    }

    /// Applies `value` as a partial update at `path`: only the keys it contains change.
    pub async fn update<T: Serialize + ?Sized>(
        &mut self,
        path: &str,
        value: &T,
        params: Option<&QueryParams>,
    ) -> Result<(), DatabaseError> {
        self.invalidate();

        let body = encode(value)?;
        self.call(Method::Patch, self.location(path), Some(body), params)
            .await?;

        Ok(())
    }

    /// Deletes the data at `path`.
    pub async fn remove(
        &mut self,
        path: &str,
        params: Option<&QueryParams>,
    ) -> Result<(), DatabaseError> {
        self.invalidate();

        self.call(Method::Delete, self.location(path), None, params)
            .await?;

        Ok(())
    }

    /// Fetches the security rules of the database this reference belongs to.
    pub async fn rules(&self, params: Option<&QueryParams>) -> Result<Rules, DatabaseError> {
        let res = self
            .call(Method::Get, self.rules_location()?, None, params)
            .await?;

        serde_json::from_slice(&res).map_err(|e| {
            warn!(url = %self.url, error = %e, "cannot decode security rules");
            DatabaseError::DecodeError(e)
        })
    }

    /// Replaces the security rules of the database this reference belongs to.
    pub async fn set_rules(
        &self,
        rules: &Rules,
        params: Option<&QueryParams>,
    ) -> Result<(), DatabaseError> {
        let body = encode(rules)?;
        self.call(Method::Put, self.rules_location()?, Some(body), params)
            .await?;

        Ok(())
    }

    async fn fetch(
        &self,
        url: &str,
        params: Option<&QueryParams>,
    ) -> Result<Option<Value>, DatabaseError> {
        let res = self
            .call(Method::Get, url.to_string(), None, params)
            .await?;

        match decode(&res)? {
            Value::Null => Ok(None),
            value => Ok(Some(value)),
        }
    }

    async fn call(
        &self,
        method: Method,
        url: String,
        body: Option<Vec<u8>>,
        params: Option<&QueryParams>,
    ) -> Result<Bytes, DatabaseError> {
        self.transport
            .call(Call {
                method,
                url,
                auth: self.auth.clone(),
                body,
                params: params.cloned().unwrap_or_default(),
            })
            .await
    }

    /// Location of `path` below this reference. An empty path is this location itself.
    fn location(&self, path: &str) -> String {
        let path = path.trim_matches('/');
        if path.is_empty() {
            self.url.clone()
        } else {
            format!("{}/{}", self.url.trim_end_matches('/'), path)
        }
    }

    fn rules_location(&self) -> Result<String, DatabaseError> {
        let mut root = Url::parse(&self.url)?;
        root.set_path(RULES_PATH);
        Ok(root.to_string())
    }

    fn derive(&self, url: String, value: Option<Value>) -> DatabaseReference {
        DatabaseReference {
            url,
            auth: self.auth.clone(),
            transport: Arc::clone(&self.transport),
            value,
        }
    }
}

fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, DatabaseError> {
    serde_json::to_vec(value).map_err(|e| {
        warn!(error = %e, "cannot encode value for firebase");
        DatabaseError::EncodeError(e)
    })
}

fn decode(body: &[u8]) -> Result<Value, DatabaseError> {
    serde_json::from_slice(body).map_err(|e| {
        warn!(error = %e, "cannot decode firebase response");
        DatabaseError::DecodeError(e)
    })
}
