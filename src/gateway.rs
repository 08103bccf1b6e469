use base64::Engine;
use reqwest::blocking::Client;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

use crate::settings::VisionSettings;

pub const DEFAULT_ENDPOINT: &str = "https://api.groq.com/openai/v1/responses";
pub const DEFAULT_MODEL: &str = "meta-llama/llama-4-scout-17b-16e-instruct";

pub const DEFAULT_PROMPT: &str = "I'm taking a test and will send you screenshots. \
Return ONLY the final answers, without explanations. Work directly from the image and \
extract the question text automatically. If the question is single-choice, give only the \
answer like 1) A. If the question has multiple correct options, list all of them like \
1) A B C. If the question is matching, give the answers as pairs like Python - print, \
Java - System.out.print, one pair per line. If the question is drag & drop / ordering, \
give answers in order like 1) Python 2) Java 3) C++. No explanations, no extra text.";

const BODY_SNIPPET_CHARS: usize = 500;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("GROQ_API_KEY is not set.")]
    MissingApiKey,
    #[error("network error contacting vision endpoint: {0}")]
    Network(#[from] reqwest::Error),
    #[error("vision endpoint HTTP error: {status} {body}")]
    Http { status: u16, body: String },
    #[error("malformed vision response: {0}")]
    Malformed(String),
    #[error("unexpected vision response format: {0}")]
    UnexpectedShape(String),
}

impl GatewayError {
    /// Whether the same request is likely to succeed if sent again.
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::Network(e) => e.is_timeout() || e.is_connect(),
            GatewayError::Http { status, .. } => is_transient_status(*status),
            GatewayError::MissingApiKey
            | GatewayError::Malformed(_)
            | GatewayError::UnexpectedShape(_) => false,
        }
    }
}

/// Rate limiting and gateway-side 5xx failures are worth retrying.
pub fn is_transient_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Remote image understanding service.
pub trait VisionBackend: Send + Sync {
    /// Send a PNG and an instruction prompt, returning the answer text.
    ///
    /// An empty string means the service answered with no content.
    fn analyze(&self, image: &[u8], prompt: &str, model: &str) -> Result<String, GatewayError>;
}

pub struct GroqGateway {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl GroqGateway {
    pub fn new(settings: &VisionSettings) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent("quick-vision")
            .build()?;
        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone().filter(|k| !k.trim().is_empty()),
        })
    }
}

impl VisionBackend for GroqGateway {
    fn analyze(&self, image: &[u8], prompt: &str, model: &str) -> Result<String, GatewayError> {
        let api_key = self.api_key.as_deref().ok_or(GatewayError::MissingApiKey)?;
        let payload = build_payload(image, prompt, model);
        tracing::debug!(endpoint = %self.endpoint, model, bytes = image.len(), "posting capture");

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&payload)
            .send()?;
        let status = resp.status();
        let body = resp.text()?;
        if !status.is_success() {
            return Err(GatewayError::Http {
                status: status.as_u16(),
                body: crate::extract::truncate_with_marker(&body, BODY_SNIPPET_CHARS),
            });
        }

        let value: Value =
            serde_json::from_str(&body).map_err(|e| GatewayError::Malformed(e.to_string()))?;
        normalize_response(&value)
    }
}

/// Request body for the responses API with the image inlined as a data URI.
pub fn build_payload(image: &[u8], prompt: &str, model: &str) -> Value {
    let b64 = base64::engine::general_purpose::STANDARD.encode(image);
    json!({
        "model": model,
        "input": [{
            "role": "user",
            "content": [
                { "type": "input_text", "text": prompt },
                {
                    "type": "input_image",
                    "detail": "auto",
                    "image_url": format!("data:image/png;base64,{b64}"),
                },
            ],
        }],
    })
}

/// A recognizer for one provider response layout.
///
/// `None` means the layout does not apply; `Some("")` means it applies but
/// carried no text.
pub type ShapeMatcher = fn(&Value) -> Option<String>;

/// Layouts tried in priority order.
pub const SHAPE_MATCHERS: &[(&str, ShapeMatcher)] = &[
    ("output_message", output_message_text),
    ("top_level_list", top_level_list_text),
    ("output_text", output_text_field),
    ("choices", chat_choices_text),
    ("response", response_field),
];

/// Reduce any supported response layout to a single trimmed text.
pub fn normalize_response(value: &Value) -> Result<String, GatewayError> {
    let mut recognized = false;
    for (name, matcher) in SHAPE_MATCHERS {
        if let Some(text) = matcher(value) {
            let text = text.trim();
            if !text.is_empty() {
                tracing::debug!(shape = name, "vision response normalized");
                return Ok(text.to_string());
            }
            recognized = true;
        }
    }
    if recognized {
        return Ok(String::new());
    }
    Err(GatewayError::UnexpectedShape(value.to_string()))
}

fn output_text_in(content: &Value) -> Option<String> {
    content.as_array()?.iter().find_map(|item| {
        (item.get("type")?.as_str()? == "output_text")
            .then(|| item.get("text").and_then(Value::as_str).unwrap_or_default().to_string())
    })
}

/// `{"output": [{"type": "message", "content": [{"type": "output_text", "text": ..}]}]}`
pub fn output_message_text(value: &Value) -> Option<String> {
    let mut found: Option<String> = None;
    for item in value.get("output")?.as_array()? {
        if item.get("type").and_then(Value::as_str) != Some("message") {
            continue;
        }
        if let Some(text) = item.get("content").and_then(output_text_in) {
            if !text.trim().is_empty() {
                return Some(text);
            }
            found.get_or_insert(text);
        }
    }
    found
}

/// `[{"content": [{"type": "output_text", "text": ..}]}, ..]`
pub fn top_level_list_text(value: &Value) -> Option<String> {
    value.as_array()?.first()?.get("content").and_then(output_text_in)
}

/// `{"output_text": ".."}` or `{"output_text": ["..", ".."]}`
pub fn output_text_field(value: &Value) -> Option<String> {
    match value.as_object()?.get("output_text")? {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|item| match item {
                    Value::Null => None,
                    Value::String(s) if s.is_empty() => None,
                    Value::String(s) => Some(s.clone()),
                    other => Some(other.to_string()),
                })
                .collect::<Vec<_>>()
                .join(" "),
        ),
        _ => None,
    }
}

/// `{"choices": [{"message": {"content": ".."}}]}`
pub fn chat_choices_text(value: &Value) -> Option<String> {
    let content = value
        .as_object()?
        .get("choices")?
        .as_array()?
        .first()?
        .get("message")?
        .get("content")?;
    Some(content.as_str().unwrap_or_default().to_string())
}

/// `{"response": ".."}`
pub fn response_field(value: &Value) -> Option<String> {
    match value.as_object()?.get("response")? {
        Value::String(s) => Some(s.clone()),
        Value::Null => Some(String::new()),
        other => Some(other.to_string()),
    }
}
