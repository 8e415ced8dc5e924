//! Sending an `OutboundRequest` and getting JSON back.

use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ConvertError;
use crate::provider::OutboundRequest;

/// Anything that can deliver a request and return the parsed response body.
pub trait Transport: Send + Sync {
    fn send(&self, request: &OutboundRequest) -> Result<Value, ConvertError>;
}

/// Blocking HTTP transport. No timeout and no retries: the call waits until
/// the server answers or the connection fails.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, ConvertError> {
        let client = Client::builder().timeout(None::<Duration>).build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &OutboundRequest) -> Result<Value, ConvertError> {
        let mut builder = self.client.post(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        // Headers first: `json` only sets Content-Type when it is absent.
        let response = builder.json(&request.body).send()?;
        let status = response.status();
        let text = response.text()?;

        if !status.is_success() {
            warn!(status = %status, body = %snippet(&text), "model endpoint returned error");
            return Err(ConvertError::Transport(format!(
                "server returned {}: {}",
                status,
                snippet(&text)
            )));
        }

        debug!(body_len = text.len(), "received model response");

        serde_json::from_str(&text)
            .map_err(|err| ConvertError::MalformedResponse(format!("response is not JSON: {}", err)))
    }
}

fn snippet(text: &str) -> String {
    text.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snippet_limits_characters() {
        let long = "é".repeat(300);
        assert_eq!(snippet(&long).chars().count(), 200);
        assert_eq!(snippet("short"), "short");
    }
}
