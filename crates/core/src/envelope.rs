use serde_json::{json, Value};

/// The uniform result shape crossing the RPC boundary. Callers distinguish
/// success from failure solely via `is_error`, never via transport faults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub is_error: bool,
    pub content: String,
}

impl Envelope {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            is_error: false,
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            is_error: true,
            content: content.into(),
        }
    }

    /// Render as an MCP tool-call result.
    pub fn to_mcp(&self) -> Value {
        json!({
            "content": [{ "type": "text", "text": self.content }],
            "isError": self.is_error,
        })
    }
}

impl From<&crate::Error> for Envelope {
    fn from(err: &crate::Error) -> Self {
        Self::error(err.to_string())
    }
}

/// Render a backend result as text. Plain strings pass through, structures
/// are pretty-printed, and "no value" becomes the literal `undefined` so the
/// printable contract stays stable for callers.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Null => "undefined".to_string(),
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}
