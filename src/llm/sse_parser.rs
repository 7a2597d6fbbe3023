use crate::errors::{SheetPilotError, SheetPilotResult};
use crate::llm::types::{StreamChunk, StreamChunkKind};

/// Parses a raw SSE line (OpenAI-compatible format) into a StreamChunk.
/// Returns None if the line is a keep-alive or non-data line.
pub fn parse_sse_line(line: &str) -> SheetPilotResult<Option<StreamChunk>> {
    if line.is_empty() || line.starts_with(':') {
        return Ok(None);
    }

    let data = if let Some(d) = line.strip_prefix("data:") {
        d.trim()
    } else {
        return Ok(None);
    };

    if data == "[DONE]" {
        return Ok(Some(StreamChunk {
            kind: StreamChunkKind::Done,
            content: String::new(),
        }));
    }

    let json: serde_json::Value =
        serde_json::from_str(data).map_err(|e| SheetPilotError::SseParsing(e.to_string()))?;

    if let Some(first) = json["choices"].as_array().and_then(|c| c.first()) {
        let delta = &first["delta"];

        // Some models (DeepSeek and friends) expose their chain of thought separately
        if let Some(reasoning) = delta["reasoning_content"].as_str() {
            if !reasoning.is_empty() {
                return Ok(Some(StreamChunk {
                    kind: StreamChunkKind::Reasoning,
                    content: reasoning.to_string(),
                }));
            }
        }

        if let Some(content) = delta["content"].as_str() {
            if !content.is_empty() {
                return Ok(Some(StreamChunk {
                    kind: StreamChunkKind::Content,
                    content: content.to_string(),
                }));
            }
        }

        if first["finish_reason"].as_str().is_some() {
            return Ok(Some(StreamChunk {
                kind: StreamChunkKind::Done,
                content: String::new(),
            }));
        }
    }

    Ok(None)
}
