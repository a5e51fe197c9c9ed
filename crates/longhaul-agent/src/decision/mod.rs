//! Decision collaborator
//!
//! The external completion engine that, given the conversation and the tool
//! catalog, picks the next action. [`DecisionClient`] is the seam; the
//! OpenAI-compatible HTTP client in [`openai`] is the production
//! implementation.

pub mod history;
pub mod openai;

use async_trait::async_trait;
use harness::tool_schema::ToolSpec;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use history::{CompactionSummary, ConversationHistory};
pub use openai::OpenAiDecisionClient;

/// Prefix the collaborator uses to ask for human input
pub const NEED_INPUT_MARKER: &str = "NEED_INPUT:";

// ── Messages ──────────────────────────────────────────────────────────────────

/// A function call carried by an assistant turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments, as sent over the wire
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallMessage {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionCall,
}

fn function_kind() -> String {
    "function".to_string()
}

/// One conversation turn in chat-completions wire format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ChatMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        #[serde(default)]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCallMessage>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    pub fn assistant_text(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Tool {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
        }
    }

    pub fn is_tool_result(&self) -> bool {
        matches!(self, Self::Tool { .. })
    }
}

// ── Decisions ─────────────────────────────────────────────────────────────────

/// A requested tool invocation, arguments already decoded
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl ToolInvocation {
    /// Action descriptor recorded in state, e.g. `read_file({"file_path":"a.py"})`
    pub fn descriptor(&self) -> String {
        format!("{}({})", self.name, self.arguments)
    }
}

/// What the collaborator chose to do
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Run a tool
    ToolCall(ToolInvocation),
    /// The goal is achieved
    Complete { summary: String },
    /// Human input is required before continuing
    NeedInput { question: String },
    /// Free-form reasoning with no invocation attached
    Reasoning { text: String },
}

/// Token accounting reported by the collaborator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// Input to one decision round trip
#[derive(Debug, Clone)]
pub struct DecisionRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolSpec>,
}

/// Result of one decision round trip
#[derive(Debug, Clone)]
pub struct DecisionResponse {
    pub decision: Decision,
    /// Assistant turn to append to the conversation
    pub message: ChatMessage,
    pub usage: TokenUsage,
}

/// Errors talking to the decision collaborator
#[derive(Debug, thiserror::Error)]
pub enum DecisionError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("collaborator returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("decision request cancelled")]
    Cancelled,
}

/// Picks the next action given the conversation and the tool catalog
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DecisionClient: Send + Sync {
    async fn decide(&self, request: DecisionRequest) -> Result<DecisionResponse, DecisionError>;
}
