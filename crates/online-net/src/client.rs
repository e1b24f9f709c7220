//! Online.net API client.
//!
//! API Documentation: <https://console.online.net/en/api/>
//!
//! Every call returns `Option<Value>`: `None` means the request failed at the
//! transport layer or the API answered with a non-2xx status. Nothing here
//! retries; callers check the result and carry on.

use std::time::Duration;

use reqwest::{header, Client, Method};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Result;

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Form parameters sent with a request.
pub type Params<'a> = [(&'a str, String)];

/// Authenticated client bound to one API base URI.
#[derive(Clone)]
pub struct ApiClient {
    /// HTTP client.
    client: Client,
    /// Base URI, ending with `/`.
    base_uri: String,
    /// Bearer token.
    token: String,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_uri", &self.base_uri)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a new client.
    ///
    /// # Errors
    /// Returns error if HTTP client cannot be created.
    pub fn new(base_uri: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        let mut base_uri = base_uri.into();
        if !base_uri.ends_with('/') {
            base_uri.push('/');
        }

        Ok(Self {
            client,
            base_uri,
            token: token.into(),
        })
    }

    /// Base URI requests are issued against.
    #[must_use]
    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    /// Issue a request and parse the JSON reply.
    ///
    /// Parameters, when present, are sent as a form-encoded body. An empty
    /// 2xx body is reported as `true`.
    pub async fn call(&self, path: &str, params: Option<&Params<'_>>, method: Method) -> Option<Value> {
        let url = format!("{}{}", self.base_uri, path.trim_start_matches('/'));
        debug!(url = %url, method = %method, "API request");

        let mut request = self
            .client
            .request(method.clone(), &url)
            .bearer_auth(&self.token);
        request = match params {
            Some(params) => request.form(params),
            None => request.header(header::CONTENT_TYPE, "application/json"),
        };

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %url, error = %e, "API request failed");
                return None;
            }
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                warn!(url = %url, error = %e, "Failed to read API response");
                return None;
            }
        };

        if !status.is_success() {
            warn!(url = %url, method = %method, status = status.as_u16(), body = %text, "API error");
            return None;
        }

        if text.trim().is_empty() {
            return Some(Value::Bool(true));
        }

        match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(url = %url, error = %e, body = %text, "Failed to parse response");
                None
            }
        }
    }

    /// Authenticated GET.
    pub async fn get(&self, path: &str) -> Option<Value> {
        self.call(path, None, Method::GET).await
    }

    /// Authenticated POST with form parameters.
    pub async fn post(&self, path: &str, params: &Params<'_>) -> Option<Value> {
        self.call(path, Some(params), Method::POST).await
    }

    /// Authenticated PUT with form parameters.
    pub async fn put(&self, path: &str, params: &Params<'_>) -> Option<Value> {
        self.call(path, Some(params), Method::PUT).await
    }

    /// Authenticated DELETE.
    pub async fn delete(&self, path: &str) -> Option<Value> {
        self.call(path, None, Method::DELETE).await
    }

    /// Issue a request and report whether the reply is truthy.
    pub async fn ok(&self, path: &str, params: Option<&Params<'_>>, method: Method) -> bool {
        self.call(path, params, method)
            .await
            .as_ref()
            .is_some_and(is_truthy)
    }
}

/// Truthiness of an API reply: `null`, `false`, `0`, `""`, `[]` and `{}` are falsy.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
