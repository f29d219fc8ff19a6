// src/infrastructure/envelope.rs
use crate::application::{Action, RemoteError, RemoteInvoker};
use crate::constants::API_VERSION;
use reqwest::blocking::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, instrument};

/// JSON-over-HTTP client for the remote automation endpoint.
///
/// Every call is a single POST of `{action, params, version}`; the reply must
/// be an object with exactly the keys `result` and `error`.
pub struct EnvelopeClient {
    client: Client,
    url: String,
    version: u32,
    key: Option<String>,
}

impl EnvelopeClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            version: API_VERSION,
            key: None,
        })
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Send `key` with every request. Empty keys are ignored.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.key = (!key.is_empty()).then_some(key);
        self
    }

    fn envelope(&self, action: Action, params: Value) -> Value {
        let mut request = json!({
            "action": action.as_str(),
            "params": params,
            "version": self.version,
        });
        if let Some(key) = &self.key {
            request["key"] = Value::String(key.clone());
        }
        request
    }
}

impl RemoteInvoker for EnvelopeClient {
    #[instrument(level = "debug", skip(self, params), fields(action = action.as_str(), url = %self.url))]
    fn invoke(&self, action: Action, params: Value) -> Result<Value, RemoteError> {
        let response = self
            .client
            .post(&self.url)
            .json(&self.envelope(action, params))
            .send()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        debug!(%status, bytes = body.len(), "Received remote response");

        let reply: Value = serde_json::from_str(&body)
            .map_err(|e| RemoteError::Protocol(format!("failed to decode response: {}", e)))?;
        unwrap_reply(reply)
    }
}

/// Extract `result` from a `{result, error}` reply.
pub fn unwrap_reply(reply: Value) -> Result<Value, RemoteError> {
    let Value::Object(mut fields) = reply else {
        return Err(RemoteError::Protocol(
            "response must be a JSON object".to_string(),
        ));
    };
    if fields.len() != 2 {
        return Err(RemoteError::Protocol(
            "response has an unexpected number of fields".to_string(),
        ));
    }
    let (Some(result), Some(error)) = (fields.remove("result"), fields.remove("error")) else {
        return Err(RemoteError::Protocol(
            "response is missing required result or error field".to_string(),
        ));
    };

    match error {
        Value::Null => Ok(result),
        Value::String(message) => Err(RemoteError::Protocol(message)),
        other => Err(RemoteError::Protocol(other.to_string())),
    }
}
