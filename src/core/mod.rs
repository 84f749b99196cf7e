pub mod middleware;

#[cfg(test)]
mod tests;

use serde::Deserialize;

/// Error body returned by the Realtime Database REST API, e.g. `{"error": "Permission denied"}`.
#[derive(Debug, Deserialize)]
pub struct FirebaseErrorResponse {
    pub error: String,
}

impl FirebaseErrorResponse {
    /// Tries to decode a raw error body. Returns `None` when the body is not the usual JSON shape.
    pub fn parse(body: &str) -> Option<Self> {
        serde_json::from_str(body).ok()
    }

    pub fn display_message(&self) -> &str {
        &self.error
    }
}
