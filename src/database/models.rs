use serde_json::Value;
use std::collections::BTreeMap;

/// Security rules document, as read from and written to `/.settings/rules`.
pub type Rules = serde_json::Map<String, Value>;

/// Response body of a `POST` (push) request.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct PushResponse {
    pub(crate) name: String,
}

/// Query string parameters passed through to the Realtime Database REST API.
///
/// Entries are applied after the reference's `auth` token, so an `auth` entry
/// here overrides it for a single call.
///
/// ```rust
/// # use firebase_database_rest::database::QueryParams;
/// let params = QueryParams::new().order_by("$key").limit_to_first(10);
/// assert_eq!(params.get("orderBy"), Some("\"$key\""));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(BTreeMap<String, String>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an arbitrary parameter, replacing any previous value for `key`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// `print=silent`: writes respond with `204 No Content` instead of echoing the data.
    pub fn silent(self) -> Self {
        self.with("print", "silent")
    }

    /// `shallow=true`: reads return `true` in place of nested children.
    pub fn shallow(self) -> Self {
        self.with("shallow", "true")
    }

    /// `format=export`: reads include priority information.
    pub fn export(self) -> Self {
        self.with("format", "export")
    }

    /// Overrides the token sent as the `auth` parameter for this call.
    pub fn auth(self, token: impl Into<String>) -> Self {
        self.with("auth", token)
    }

    /// `orderBy`, one of `"$key"`, `"$value"`, `"$priority"` or a child key.
    pub fn order_by(self, key: &str) -> Self {
        self.with("orderBy", Value::from(key).to_string())
    }

    pub fn limit_to_first(self, limit: u32) -> Self {
        self.with("limitToFirst", limit.to_string())
    }

    pub fn limit_to_last(self, limit: u32) -> Self {
        self.with("limitToLast", limit.to_string())
    }

    pub fn start_at(self, value: impl Into<Value>) -> Self {
        self.with("startAt", value.into().to_string())
    }

    pub fn end_at(self, value: impl Into<Value>) -> Self {
        self.with("endAt", value.into().to_string())
    }

    pub fn equal_to(self, value: impl Into<Value>) -> Self {
        self.with("equalTo", value.into().to_string())
    }

    /// Server-side read timeout, in Firebase's duration format (e.g. `"10s"`, `"500ms"`).
    pub fn timeout(self, timeout: impl Into<String>) -> Self {
        self.with("timeout", timeout)
    }

    /// Write size limit: `tiny`, `small`, `medium`, `large` or `unlimited`.
    pub fn write_size_limit(self, limit: impl Into<String>) -> Self {
        self.with("writeSizeLimit", limit)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
