//! Generation backend client (Gemini `generateContent`).

use crate::config::LlmConfig;
use crate::error::LlmError;
use base64::Engine as _;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// What the bot says when the backend fails. Generation failure is never
/// fatal to the conversation.
pub const FALLBACK_REPLY: &str =
    "*static* ...my uplink just dropped. Pretend I said something devastating.";

/// One piece of user content in a generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text(String),
    /// Raw media handed to the model inline, base64-encoded.
    InlineData { mime_type: String, data: String },
}

impl ContentPart {
    /// Wrap image bytes as an inline-data part.
    pub fn from_image_bytes(mime_type: &str, bytes: &[u8]) -> Self {
        Self::InlineData {
            mime_type: mime_type.to_string(),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }
}

/// Thin client for the generation API.
pub struct GenerationClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GenerationClient {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Send one instruction + single-turn content request, returning the
    /// generated text.
    pub async fn generate(
        &self,
        instruction: &str,
        parts: Vec<ContentPart>,
    ) -> Result<String, LlmError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url.trim_end_matches('/'),
            self.model,
            self.api_key,
        );
        let body = build_body(instruction, &parts);

        let response = self
            .http
            .post(&url)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| LlmError::Request(format!("failed to read response body: {e}")))?;

        let response_body: serde_json::Value =
            serde_json::from_str(&response_text).map_err(|e| {
                LlmError::MalformedResponse(format!("response ({status}) is not valid JSON: {e}"))
            })?;

        if !status.is_success() {
            let message = response_body["error"]["message"]
                .as_str()
                .unwrap_or("unknown error");
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: message.to_string(),
            });
        }

        extract_text(&response_body)
    }

    /// Like `generate`, but converts any failure into the fixed fallback
    /// reply after logging it for the operator.
    pub async fn generate_or_fallback(&self, instruction: &str, parts: Vec<ContentPart>) -> String {
        match self.generate(instruction, parts).await {
            Ok(text) => text,
            Err(error) => {
                tracing::error!(%error, "generation call failed, sending fallback");
                FALLBACK_REPLY.to_string()
            }
        }
    }
}

/// Assemble the request body: the instruction rides in `systemInstruction`,
/// the content parts form a single user turn.
fn build_body(instruction: &str, parts: &[ContentPart]) -> serde_json::Value {
    let parts: Vec<serde_json::Value> = parts
        .iter()
        .map(|part| match part {
            ContentPart::Text(text) => serde_json::json!({ "text": text }),
            ContentPart::InlineData { mime_type, data } => serde_json::json!({
                "inlineData": { "mimeType": mime_type, "data": data }
            }),
        })
        .collect();

    serde_json::json!({
        "systemInstruction": { "parts": [{ "text": instruction }] },
        "contents": [{ "role": "user", "parts": parts }],
    })
}

/// Pull the concatenated candidate text out of a response body.
fn extract_text(body: &serde_json::Value) -> Result<String, LlmError> {
    let parts = body["candidates"][0]["content"]["parts"]
        .as_array()
        .ok_or_else(|| LlmError::MalformedResponse("no candidate content parts".into()))?;

    let text: String = parts
        .iter()
        .filter_map(|part| part["text"].as_str())
        .collect::<Vec<_>>()
        .join("");

    if text.trim().is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::{ContentPart, FALLBACK_REPLY, GenerationClient, build_body, extract_text};
    use crate::config::LlmConfig;
    use crate::error::LlmError;

    #[test]
    fn body_carries_instruction_and_parts() {
        let parts = vec![
            ContentPart::Text("hello there".into()),
            ContentPart::InlineData {
                mime_type: "image/png".into(),
                data: "aGk=".into(),
            },
        ];
        let body = build_body("be brief", &parts);

        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            "be brief"
        );
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello there");
        assert_eq!(
            body["contents"][0]["parts"][1]["inlineData"]["mimeType"],
            "image/png"
        );
    }

    #[test]
    fn extract_joins_candidate_parts() {
        let body = serde_json::json!({
            "candidates": [{
                "content": {
                    "parts": [{ "text": "two " }, { "text": "halves" }],
                    "role": "model"
                }
            }]
        });
        assert_eq!(extract_text(&body).expect("text"), "two halves");
    }

    #[test]
    fn empty_or_missing_candidates_are_errors() {
        let empty = serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": "  " }] } }]
        });
        assert!(matches!(extract_text(&empty), Err(LlmError::EmptyResponse)));

        let missing = serde_json::json!({ "candidates": [] });
        assert!(matches!(
            extract_text(&missing),
            Err(LlmError::MalformedResponse(_))
        ));
    }

    #[test]
    fn image_part_encodes_base64() {
        let part = ContentPart::from_image_bytes("image/jpeg", b"hi");
        assert_eq!(
            part,
            ContentPart::InlineData {
                mime_type: "image/jpeg".into(),
                data: "aGk=".into(),
            }
        );
    }

    /// An unreachable backend never surfaces an error to the conversation.
    #[tokio::test]
    async fn unreachable_backend_yields_fallback() {
        let client = GenerationClient::new(&LlmConfig {
            api_key: "test-key".into(),
            model: "test-model".into(),
        })
        .with_base_url("http://127.0.0.1:9");

        let reply = client
            .generate_or_fallback("be brief", vec![ContentPart::Text("hello".into())])
            .await;
        assert_eq!(reply, FALLBACK_REPLY);
    }
}
