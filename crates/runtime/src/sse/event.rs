//! SSE wire framing (spec §6.2): `event: <type>\ndata: <json>\n\n`.

use serde::Serialize;

/// A single SSE frame ready to be written to a response body.
#[derive(Debug, Clone, Serialize)]
pub struct SseFrame {
    pub event: String,
    pub data: serde_json::Value,
    pub id: Option<String>,
}

impl SseFrame {
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            data,
            id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Render per the `text/event-stream` framing rules: an optional
    /// `id:` line, an `event:` line, a `data:` line holding one JSON
    /// document, and a terminating blank line.
    pub fn to_wire(&self) -> String {
        let mut out = String::new();
        if let Some(id) = &self.id {
            out.push_str("id: ");
            out.push_str(id);
            out.push('\n');
        }
        out.push_str("event: ");
        out.push_str(&self.event);
        out.push('\n');
        out.push_str("data: ");
        out.push_str(&serde_json::to_string(&self.data).unwrap_or_else(|_| "null".to_string()));
        out.push_str("\n\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_terminate_with_a_blank_line() {
        let frame = SseFrame::new("output", serde_json::json!({"token": "hi"}));
        let wire = frame.to_wire();
        assert!(wire.ends_with("\n\n"));
        assert!(wire.starts_with("event: output\n"));
    }

    #[test]
    fn id_line_is_emitted_when_present() {
        let frame = SseFrame::new("output", serde_json::json!({})).with_id("42");
        assert!(frame.to_wire().starts_with("id: 42\n"));
    }
}
