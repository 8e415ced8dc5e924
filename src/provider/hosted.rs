//! Anthropic messages API.

use serde_json::Value;

use crate::error::ConvertError;
use crate::prompt::build_prompt;

use super::{ensure_input, extract_text, ChatBody, OutboundRequest, PathStep, Provider};

pub const HOSTED_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
pub const HOSTED_MODEL: &str = "claude-sonnet-4-20250514";
const API_VERSION: &str = "2023-06-01";

const RESPONSE_PATH: &[PathStep] = &[
    PathStep::Key("content"),
    PathStep::Index(0),
    PathStep::Key("text"),
];

/// The default backend. Endpoint and model are fixed.
#[derive(Debug, Clone, Default)]
pub struct HostedProvider {
    api_key: Option<String>,
}

impl HostedProvider {
    pub fn new(api_key: Option<String>) -> Self {
        Self { api_key }
    }
}

impl Provider for HostedProvider {
    fn name(&self) -> &'static str {
        "hosted"
    }

    fn build_request(&self, input: &str) -> Result<OutboundRequest, ConvertError> {
        ensure_input(input)?;

        let mut headers = vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            ("anthropic-version".to_string(), API_VERSION.to_string()),
        ];
        if let Some(key) = self.api_key.as_deref().filter(|key| !key.is_empty()) {
            headers.push(("x-api-key".to_string(), key.to_string()));
        }

        Ok(OutboundRequest {
            url: HOSTED_ENDPOINT.to_string(),
            headers,
            body: ChatBody::single_user_message(HOSTED_MODEL, build_prompt(input)),
        })
    }

    fn parse_response(&self, body: &Value) -> Result<String, ConvertError> {
        extract_text(body, RESPONSE_PATH, "content[0].text")
    }
}
