//! Gemini-backed [`SessionClient`].
//!
//! Talks to the `generateContent` and `streamGenerateContent` endpoints of
//! the Generative Language API. The streaming endpoint returns one JSON
//! array of response objects; chunks are carved out of the byte stream with
//! an incremental boundary scan so they surface as soon as they arrive.

use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::{StreamExt, wrappers::ReceiverStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::constants::urls;

use super::provider::{Chunk, ClientError, Reply, ReplyStream, SessionClient};
use super::session::{ChatSession, TurnRole};

const STREAM_CHANNEL_CAPACITY: usize = 32;

/// Client for the Gemini generative-language backend.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_key: String,
    base_url: String,
    http: HttpClient,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: urls::GEMINI_API_BASE.to_string(),
            http: HttpClient::new(),
        }
    }

    /// Override the API base URL, e.g. to point at a local stub.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, model, method)
    }

    async fn post(
        &self,
        session: &ChatSession,
        prompt: &str,
        method: &str,
    ) -> Result<reqwest::Response, ClientError> {
        let request = GenerateContentRequest {
            contents: contents_for(session, prompt),
        };
        let url = self.endpoint(session.model(), method);

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|err| ClientError::Network(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Backend(format!("{status}: {body}")));
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl SessionClient for GeminiClient {
    fn start_session(&self, model: &str) -> ChatSession {
        ChatSession::new(model)
    }

    async fn send_once(
        &self,
        session: &ChatSession,
        prompt: &str,
        cancel: CancellationToken,
    ) -> Result<Reply, ClientError> {
        let exchange = async {
            let response = self.post(session, prompt, "generateContent").await?;
            response
                .json::<GenerateContentResponse>()
                .await
                .map_err(|err| ClientError::Backend(format!("invalid response JSON: {err}")))
        };

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ClientError::Cancelled),
            result = exchange => result?,
        };

        let reply = Reply {
            text: response.first_candidate_text(),
        };
        session.record_exchange(prompt, reply.text.clone().unwrap_or_default());
        debug!(model = session.model(), "one-shot exchange complete");
        Ok(reply)
    }

    async fn send_streaming(
        &self,
        session: &ChatSession,
        prompt: &str,
        cancel: CancellationToken,
    ) -> Result<ReplyStream, ClientError> {
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ClientError::Cancelled),
            result = self.post(session, prompt, "streamGenerateContent") => result?,
        };

        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let session = session.clone();
        let prompt = prompt.to_string();
        tokio::spawn(async move {
            relay_stream(response, tx, cancel, session, prompt).await;
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

/// Forward response-body chunks into `tx` until the body ends, the request
/// fails, or `cancel` fires. Commits the exchange to the session history
/// only after a clean end of stream.
async fn relay_stream(
    response: reqwest::Response,
    tx: mpsc::Sender<Result<Chunk, ClientError>>,
    cancel: CancellationToken,
    session: ChatSession,
    prompt: String,
) {
    let mut body = response.bytes_stream();
    let mut buffer: Vec<u8> = Vec::new();
    let mut full_text = String::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let _ = tx.send(Err(ClientError::Cancelled)).await;
                return;
            }
            next = body.next() => next,
        };

        let bytes = match next {
            None => break,
            Some(Ok(bytes)) => bytes,
            Some(Err(err)) => {
                let _ = tx.send(Err(ClientError::Network(err.to_string()))).await;
                return;
            }
        };

        buffer.extend_from_slice(&bytes);
        while let Some((start, end)) = json_object_bounds(&buffer) {
            let parsed = serde_json::from_slice::<GenerateContentResponse>(&buffer[start..end]);
            buffer.drain(..end);
            let element = match parsed {
                Ok(element) => element,
                Err(err) => {
                    warn!("skipping unparseable stream element: {err}");
                    continue;
                }
            };

            let chunk = element.as_chunk();
            if let Some(text) = &chunk.text {
                full_text.push_str(text);
            }
            if tx.send(Ok(chunk)).await.is_err() {
                // Receiver is gone; stop consuming the body.
                return;
            }
        }
    }

    if cancel.is_cancelled() {
        let _ = tx.send(Err(ClientError::Cancelled)).await;
        return;
    }
    session.record_exchange(&prompt, full_text);
    debug!(model = session.model(), "streamed exchange complete");
}

/// Byte offsets of the first complete top-level JSON object in `buffer`,
/// skipping array punctuation before it.
fn json_object_bounds(buffer: &[u8]) -> Option<(usize, usize)> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut start = None;

    for (index, &byte) in buffer.iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match byte {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => {
                if start.is_none() {
                    start = Some(index);
                }
                depth += 1;
            }
            b'}' if !in_string => {
                if let Some(opened) = start {
                    depth -= 1;
                    if depth == 0 {
                        return Some((opened, index + 1));
                    }
                }
            }
            _ => {}
        }
    }
    None
}

fn contents_for(session: &ChatSession, prompt: &str) -> Vec<Content> {
    let mut contents: Vec<Content> = session
        .history()
        .into_iter()
        .map(|turn| Content {
            role: match turn.role {
                TurnRole::User => "user".to_string(),
                TurnRole::Model => "model".to_string(),
            },
            parts: vec![Part {
                text: Some(turn.text),
            }],
        })
        .collect();
    contents.push(Content::user_text(prompt));
    contents
}

// Wire types.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default, rename = "promptFeedback")]
    pub prompt_feedback: Option<Value>,
    #[serde(default, rename = "usageMetadata")]
    pub usage_metadata: Option<Value>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate, if it carried any.
    fn first_candidate_text(&self) -> Option<String> {
        let candidate = self.candidates.first()?;
        let content = candidate.content.as_ref()?;
        let mut text = String::new();
        let mut saw_text = false;
        for part in &content.parts {
            if let Some(part_text) = &part.text {
                text.push_str(part_text);
                saw_text = true;
            }
        }
        saw_text.then_some(text)
    }

    fn as_chunk(&self) -> Chunk {
        Chunk {
            text: self.first_candidate_text(),
            finish_reason: self
                .candidates
                .first()
                .and_then(|candidate| candidate.finish_reason.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default, rename = "finishReason")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user_text(text: impl Into<String>) -> Self {
        Content {
            role: "user".into(),
            parts: vec![Part {
                text: Some(text.into()),
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_scan_finds_objects_across_array_punctuation() {
        let body = br#"[{"a": 1},
{"b": "}{ not a brace"}]"#;
        let (start, end) = json_object_bounds(body).unwrap();
        assert_eq!(&body[start..end], br#"{"a": 1}"#);

        let rest = &body[end..];
        let (start, end) = json_object_bounds(rest).unwrap();
        assert_eq!(&rest[start..end], br#"{"b": "}{ not a brace"}"#);
    }

    #[test]
    fn boundary_scan_waits_for_complete_object() {
        assert_eq!(json_object_bounds(br#"[{"partial": "val"#), None);
        assert_eq!(json_object_bounds(b"[\n"), None);
    }

    #[test]
    fn boundary_scan_honors_escaped_quotes() {
        let body = br#"{"text": "quote \" brace }"}"#;
        let (start, end) = json_object_bounds(body).unwrap();
        assert_eq!(start, 0);
        assert_eq!(end, body.len());
    }

    #[test]
    fn contents_include_history_then_prompt() {
        let session = ChatSession::new("gemini-2.5-flash");
        session.record_exchange("earlier question", "earlier answer");
        let contents = contents_for(&session, "new question");
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0].role, "user");
        assert_eq!(contents[1].role, "model");
        assert_eq!(contents[1].parts[0].text.as_deref(), Some("earlier answer"));
        assert_eq!(contents[2].parts[0].text.as_deref(), Some("new question"));
    }

    #[test]
    fn response_text_concatenates_parts_of_first_candidate() {
        let response: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Hi"}, {"text": " there"}]},
                "finishReason": "STOP"
            }]
        }))
        .unwrap();
        let chunk = response.as_chunk();
        assert_eq!(chunk.text.as_deref(), Some("Hi there"));
        assert_eq!(chunk.finish_reason.as_deref(), Some("STOP"));
    }

    #[test]
    fn response_without_text_parts_yields_metadata_only_chunk() {
        let response: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{"finishReason": "SAFETY"}],
            "usageMetadata": {"totalTokenCount": 7}
        }))
        .unwrap();
        let chunk = response.as_chunk();
        assert_eq!(chunk.text, None);
        assert_eq!(chunk.finish_reason.as_deref(), Some("SAFETY"));
    }
}
