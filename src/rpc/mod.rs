//! JSON-RPC client for the business-application server.
//!
//! [`OdooSession`] holds the HTTP client, whose cookie store carries the
//! server-side session, together with the user id captured at login. The
//! [`auth`], [`company`] and [`report`] modules add the individual calls.

pub mod auth;
pub mod company;
pub mod report;

use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::retry::RetryPolicy;

pub use auth::UserInfo;

/// Per-request timeout applied to every call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Authenticated (or about to be) session against one server.
pub struct OdooSession {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
    uid: Option<i64>,
}

impl OdooSession {
    pub fn new(base_url: impl Into<String>, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry,
            uid: None,
        })
    }

    /// User id captured by the last successful login.
    pub fn uid(&self) -> Option<i64> {
        self.uid
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POSTs `payload` as JSON to `path`, retrying transport failures and
    /// non-success statuses. Returns the raw response body.
    pub fn post_json(&self, path: &str, payload: &Value) -> Result<String> {
        let url = format!("{}{}", self.base_url, path);
        self.retry.run(|attempt| -> Result<String> {
            debug!(attempt, %url, "posting JSON-RPC request");
            let response = self
                .client
                .post(&url)
                .json(payload)
                .send()?
                .error_for_status()?;
            Ok(response.text()?)
        })
    }
}

/// Builds the `call` envelope shared by the dataset endpoints.
pub(crate) fn call_envelope(model: &str, method: &str, args: Value, kwargs: Value) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "method": "call",
        "params": {
            "model": model,
            "method": method,
            "args": args,
            "kwargs": kwargs,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_wraps_model_call() {
        let envelope = call_envelope(
            "res.users",
            "write",
            serde_json::json!([[7], {"company_id": 3}]),
            serde_json::json!({}),
        );

        assert_eq!(envelope["jsonrpc"], "2.0");
        assert_eq!(envelope["method"], "call");
        assert_eq!(envelope["params"]["model"], "res.users");
        assert_eq!(envelope["params"]["method"], "write");
        assert_eq!(envelope["params"]["args"][0][0], 7);
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let session =
            OdooSession::new("https://erp.example.com/", RetryPolicy::default()).expect("client");
        assert_eq!(session.base_url(), "https://erp.example.com");
        assert_eq!(session.uid(), None);
    }
}
