use async_trait::async_trait;
use futures_util::{Stream, StreamExt};

use crate::agent_engine::event_bus::{EventBus, SessionEvent};
use crate::errors::{SheetPilotError, SheetPilotResult};
use crate::llm::provider::LlmProvider;
use crate::llm::sse_parser;
use crate::llm::types::{CallConfig, ChatMessage, LlmResponse, StreamChunk, StreamChunkKind};

pub struct OpenAiCompatibleProvider {
    id: String,
    api_base: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(id: String, api_base: String, api_key: String) -> Self {
        Self {
            id,
            api_base,
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

/// Request body for an OpenAI-style `/chat/completions` call.
pub(crate) fn request_body(messages: &[ChatMessage], cfg: &CallConfig) -> serde_json::Value {
    serde_json::json!({
        "model": cfg.model,
        "messages": messages,
        "stream": cfg.stream,
        "temperature": cfg.temperature,
    })
}

/// Pull `choices[0].message.content` (and `reasoning_content`, if any) out of
/// a non-streaming reply. Missing fields yield empty strings.
pub(crate) fn response_from_json(json: &serde_json::Value) -> LlmResponse {
    let message = &json["choices"][0]["message"];
    LlmResponse {
        content: message["content"].as_str().unwrap_or("").to_string(),
        reasoning: message["reasoning_content"].as_str().unwrap_or("").to_string(),
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.id
    }

    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        cfg: &CallConfig,
        events: &EventBus,
    ) -> SheetPilotResult<LlmResponse> {
        let body = request_body(&messages, cfg);

        tracing::debug!(
            provider = %self.id,
            model = %cfg.model,
            stream = cfg.stream,
            prompt_len = messages.iter().map(|m| m.content.len()).sum::<usize>(),
            "sending LLM request"
        );

        let mut request = self.client.post(&self.api_base).json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let err_body = response.text().await.unwrap_or_default();
            return Err(SheetPilotError::LlmProvider(format!("{}: {}", status, err_body)));
        }

        if cfg.stream {
            self.handle_stream(response, events).await
        } else {
            self.handle_json(response).await
        }
    }
}

/// Splits a byte stream into SSE lines. Bytes are only decoded once a full
/// line is buffered, so multi-byte characters may straddle chunk boundaries.
#[derive(Default)]
pub(crate) struct SseLineBuffer {
    buf: Vec<u8>,
}

impl SseLineBuffer {
    /// Append `bytes` and drain every complete, non-blank line.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            if let Some(text) = decode_line(&line) {
                lines.push(text);
            }
        }
        lines
    }

    /// Whatever is left once the stream ends without a trailing newline.
    pub(crate) fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buf);
        decode_line(&rest)
    }
}

fn decode_line(raw: &[u8]) -> Option<String> {
    let text = match std::str::from_utf8(raw) {
        Ok(text) => text.to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "SSE line is not valid UTF-8");
            String::from_utf8_lossy(raw).into_owned()
        }
    };
    let line = text.trim();
    (!line.is_empty()).then(|| line.to_string())
}

/// Drain an SSE byte stream, forwarding chunks on the event bus and
/// accumulating the full reply.
pub(crate) async fn read_sse_stream<S, B, E>(
    mut byte_stream: S,
    events: &EventBus,
) -> SheetPilotResult<LlmResponse>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    SheetPilotError: From<E>,
{
    let mut lines = SseLineBuffer::default();
    let mut out = LlmResponse::default();

    while let Some(result) = byte_stream.next().await {
        let bytes = result?;
        for line in lines.push(bytes.as_ref()) {
            if apply_sse_line(&line, &mut out, events) {
                return Ok(out);
            }
        }
    }
    if let Some(line) = lines.finish() {
        if apply_sse_line(&line, &mut out, events) {
            return Ok(out);
        }
    }

    // Fallback Done in case stream ended without [DONE] marker
    events.emit(SessionEvent::StreamChunk {
        chunk: StreamChunk {
            kind: StreamChunkKind::Done,
            content: String::new(),
        },
    });
    Ok(out)
}

/// Fold one line into `out`. Returns `true` once the stream reports done.
fn apply_sse_line(line: &str, out: &mut LlmResponse, events: &EventBus) -> bool {
    match sse_parser::parse_sse_line(line) {
        Ok(Some(chunk)) => {
            let is_done = chunk.kind == StreamChunkKind::Done;
            match chunk.kind {
                StreamChunkKind::Reasoning => out.reasoning.push_str(&chunk.content),
                StreamChunkKind::Content => out.content.push_str(&chunk.content),
                StreamChunkKind::Done => {}
            }
            events.emit(SessionEvent::StreamChunk { chunk });
            is_done
        }
        Ok(None) => false,
        Err(e) => {
            tracing::debug!("SSE parse skipped: {e}");
            false
        }
    }
}

impl OpenAiCompatibleProvider {
    /// Handle SSE streaming response.
    async fn handle_stream(
        &self,
        response: reqwest::Response,
        events: &EventBus,
    ) -> SheetPilotResult<LlmResponse> {
        let out = read_sse_stream(response.bytes_stream(), events).await?;
        tracing::info!(
            provider = %self.id,
            content_len = out.content.len(),
            reasoning_len = out.reasoning.len(),
            "LLM stream complete"
        );
        Ok(out)
    }

    /// Handle a non-streaming JSON response.
    async fn handle_json(&self, response: reqwest::Response) -> SheetPilotResult<LlmResponse> {
        let json: serde_json::Value = response.json().await?;
        let out = response_from_json(&json);
        tracing::info!(
            provider = %self.id,
            content_len = out.content.len(),
            "LLM JSON response received"
        );
        Ok(out)
    }
}
