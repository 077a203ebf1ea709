use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::config::ExtractionConfig;
use crate::extract::schema::StructuredInvoice;
use crate::extract::service::{parse_reply, system_prompt, StructuredExtractor};
use crate::extract::StructuringError;
use crate::sanitize::truncate_for_log;
use crate::secrets::resolve_api_key;

/// Client for OpenAI-compatible chat-completions endpoints.
pub struct HttpStructurer {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    temperature: f32,
    api_key: Option<SecretString>,
    timeout_secs: u64,
}

impl std::fmt::Debug for HttpStructurer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpStructurer")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("authenticated", &self.api_key.is_some())
            .finish()
    }
}

impl HttpStructurer {
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, StructuringError> {
        let endpoint = config
            .resolved_endpoint()
            .ok_or(StructuringError::MissingEndpoint)?;
        let api_key = resolve_api_key(config)?;

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StructuringError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            model: config.resolved_model(),
            temperature: config.temperature,
            api_key,
            timeout_secs: config.timeout_secs,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    response_format: ResponseFormat,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

impl StructuredExtractor for HttpStructurer {
    fn structure(
        &self,
        raw_text: &str,
        fields: &[&str],
    ) -> Result<StructuredInvoice, StructuringError> {
        let system = system_prompt(fields);
        let body = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            response_format: ResponseFormat { kind: "json_object" },
            messages: [
                ChatMessage {
                    role: "system",
                    content: &system,
                },
                ChatMessage {
                    role: "user",
                    content: raw_text,
                },
            ],
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().map_err(|e| {
            if e.is_connect() {
                StructuringError::Connection(self.endpoint.clone())
            } else if e.is_timeout() {
                StructuringError::HttpClient(format!(
                    "Request timed out after {}s",
                    self.timeout_secs
                ))
            } else {
                StructuringError::HttpClient(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(StructuringError::Api {
                status: status.as_u16(),
                body: truncate_for_log(&body),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| StructuringError::ResponseParsing(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| StructuringError::ResponseParsing("reply has no content".to_string()))?;

        tracing::debug!(model = %self.model, bytes = content.len(), "Structured extraction reply");
        parse_reply(&content)
    }
}
