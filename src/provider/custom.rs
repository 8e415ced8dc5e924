//! OpenAI-compatible chat-completions endpoint.

use serde_json::Value;

use crate::error::ConvertError;
use crate::prompt::build_prompt;

use super::{ensure_input, extract_text, ChatBody, OutboundRequest, PathStep, Provider};

const RESPONSE_PATH: &[PathStep] = &[
    PathStep::Key("choices"),
    PathStep::Index(0),
    PathStep::Key("message"),
    PathStep::Key("content"),
];

/// A user-configured server such as LM Studio, Ollama or vLLM.
#[derive(Debug, Clone)]
pub struct CustomProvider {
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl CustomProvider {
    pub fn new(base_url: String, api_key: Option<String>, model: String) -> Self {
        Self {
            base_url,
            api_key,
            model,
        }
    }

    fn endpoint(&self) -> Result<String, ConvertError> {
        let base = self.base_url.trim();
        if base.is_empty() {
            return Err(ConvertError::MissingEndpoint);
        }
        Ok(format!("{}/chat/completions", base.trim_end_matches('/')))
    }
}

impl Provider for CustomProvider {
    fn name(&self) -> &'static str {
        "custom"
    }

    fn build_request(&self, input: &str) -> Result<OutboundRequest, ConvertError> {
        ensure_input(input)?;
        let url = self.endpoint()?;

        let mut headers = vec![("Content-Type".to_string(), "application/json".to_string())];
        if let Some(key) = self.api_key.as_deref().filter(|key| !key.is_empty()) {
            headers.push(("Authorization".to_string(), format!("Bearer {}", key)));
        }

        Ok(OutboundRequest {
            url,
            headers,
            body: ChatBody::single_user_message(self.model.clone(), build_prompt(input)),
        })
    }

    fn parse_response(&self, body: &Value) -> Result<String, ConvertError> {
        extract_text(body, RESPONSE_PATH, "choices[0].message.content")
    }
}
