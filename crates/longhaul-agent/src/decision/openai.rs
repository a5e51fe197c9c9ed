//! OpenAI-compatible chat-completions client.
//!
//! Posts the conversation and the tool catalog to `{api_base}/chat/completions`
//! with `tool_choice: "auto"` and maps the first choice onto a [`Decision`].

use std::time::Duration;

use async_trait::async_trait;
use harness::tool_schema::ToolSpec;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{
    ChatMessage, Decision, DecisionClient, DecisionError, DecisionRequest, DecisionResponse,
    TokenUsage, ToolCallMessage, ToolInvocation, NEED_INPUT_MARKER,
};
use crate::config::AgentConfig;

pub struct OpenAiDecisionClient {
    http: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
}

impl OpenAiDecisionClient {
    pub fn new(config: &AgentConfig) -> Result<Self, DecisionError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            http: builder.build()?,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }

    fn body(&self, request: &DecisionRequest) -> Value {
        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(ToolSpec::to_function_definition)
            .collect();
        let mut body = json!({
            "model": self.model,
            "messages": request.messages,
            "temperature": self.temperature,
        });
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools);
            body["tool_choice"] = json!("auto");
        }
        body
    }
}

#[async_trait]
impl DecisionClient for OpenAiDecisionClient {
    async fn decide(&self, request: DecisionRequest) -> Result<DecisionResponse, DecisionError> {
        let mut req = self.http.post(self.endpoint()).json(&self.body(&request));
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DecisionError::Api {
                status: status.as_u16(),
                body: truncate(&body, 500),
            });
        }

        let completion: CompletionResponse = resp.json().await?;
        debug!(
            model = %self.model,
            total_tokens = completion.usage.unwrap_or_default().total_tokens,
            "decision received"
        );
        parse_completion(completion)
    }
}

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    /// Some servers send `null` instead of omitting the field
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallMessage>>,
}

/// Map a completion onto exactly one decision.
///
/// Only the first tool call is honored; the recorded assistant turn carries
/// only that call so every tool call in the history has a matching result.
pub(crate) fn parse_completion(
    completion: CompletionResponse,
) -> Result<DecisionResponse, DecisionError> {
    let usage = completion.usage.unwrap_or_default();
    let message = completion
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| DecisionError::MalformedResponse("response has no choices".into()))?
        .message;

    let mut calls = message.tool_calls.unwrap_or_default().into_iter();
    if let Some(call) = calls.next() {
        let dropped = calls.count();
        if dropped > 0 {
            warn!(
                tool = %call.function.name,
                dropped,
                "collaborator requested several tool calls; executing only the first"
            );
        }

        let arguments = if call.function.arguments.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(&call.function.arguments).map_err(|e| {
                DecisionError::MalformedResponse(format!(
                    "arguments for {} are not valid JSON: {e}",
                    call.function.name
                ))
            })?
        };

        let invocation = ToolInvocation {
            id: call.id.clone(),
            name: call.function.name.clone(),
            arguments,
        };
        return Ok(DecisionResponse {
            decision: Decision::ToolCall(invocation),
            message: ChatMessage::Assistant {
                content: message.content,
                tool_calls: vec![call],
            },
            usage,
        });
    }

    let text = message.content.unwrap_or_default();
    let trimmed = text.trim();
    let decision = match trimmed.strip_prefix(NEED_INPUT_MARKER) {
        Some(question) => Decision::NeedInput {
            question: question.trim().to_string(),
        },
        None => Decision::Reasoning {
            text: trimmed.to_string(),
        },
    };

    Ok(DecisionResponse {
        decision,
        message: ChatMessage::assistant_text(text),
        usage,
    })
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completion(value: Value) -> CompletionResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn parses_tool_call() {
        let resp = parse_completion(completion(json!({
            "choices": [{"message": {
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": "read_file", "arguments": "{\"file_path\":\"a.py\"}"}
                }]
            }}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        })))
        .unwrap();

        match resp.decision {
            Decision::ToolCall(inv) => {
                assert_eq!(inv.name, "read_file");
                assert_eq!(inv.arguments["file_path"], "a.py");
            }
            other => panic!("unexpected decision: {other:?}"),
        }
        assert_eq!(resp.usage.total_tokens, 15);
    }

    #[test]
    fn keeps_only_first_tool_call() {
        let resp = parse_completion(completion(json!({
            "choices": [{"message": {"tool_calls": [
                {"id": "a", "type": "function", "function": {"name": "list_files", "arguments": "{}"}},
                {"id": "b", "type": "function", "function": {"name": "read_file", "arguments": "{}"}}
            ]}}]
        })))
        .unwrap();
        match resp.message {
            ChatMessage::Assistant { tool_calls, .. } => {
                assert_eq!(tool_calls.len(), 1);
                assert_eq!(tool_calls[0].id, "a");
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn malformed_arguments_are_an_error() {
        let err = parse_completion(completion(json!({
            "choices": [{"message": {"tool_calls": [
                {"id": "a", "type": "function", "function": {"name": "write_file", "arguments": "{oops"}}
            ]}}]
        })))
        .unwrap_err();
        assert!(matches!(err, DecisionError::MalformedResponse(_)));
    }

    #[test]
    fn need_input_and_reasoning() {
        let resp = parse_completion(completion(json!({
            "choices": [{"message": {"content": "NEED_INPUT: which database should I use?"}}]
        })))
        .unwrap();
        assert_eq!(
            resp.decision,
            Decision::NeedInput {
                question: "which database should I use?".into()
            }
        );

        let resp = parse_completion(completion(json!({
            "choices": [{"message": {"content": "Let me look at the tests first."}}]
        })))
        .unwrap();
        assert!(matches!(resp.decision, Decision::Reasoning { .. }));
        assert_eq!(resp.usage, TokenUsage::default());
    }

    #[test]
    fn null_tool_calls_and_usage_are_tolerated() {
        let resp = parse_completion(completion(json!({
            "choices": [{"message": {"content": "Checking the layout first.", "tool_calls": null}}],
            "usage": null
        })))
        .unwrap();
        assert_eq!(
            resp.decision,
            Decision::Reasoning {
                text: "Checking the layout first.".into()
            }
        );
        assert_eq!(resp.usage, TokenUsage::default());

        let resp = parse_completion(completion(json!({
            "choices": [{"message": {"content": null, "tool_calls": [
                {"id": "a", "type": "function", "function": {"name": "list_files", "arguments": "{}"}}
            ]}}],
            "usage": null
        })))
        .unwrap();
        assert!(matches!(resp.decision, Decision::ToolCall(_)));
    }

    #[test]
    fn empty_choices_is_malformed() {
        let err = parse_completion(completion(json!({"choices": []}))).unwrap_err();
        assert!(matches!(err, DecisionError::MalformedResponse(_)));
    }

    #[test]
    fn body_exposes_catalog_verbatim() {
        let client = OpenAiDecisionClient::new(&AgentConfig::default()).unwrap();
        let request = DecisionRequest {
            messages: vec![ChatMessage::system("directive")],
            tools: harness::tool_schema::catalog(),
        };
        let body = client.body(&request);
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["tools"].as_array().unwrap().len(), 8);
        assert_eq!(
            body["tools"][4]["function"]["parameters"],
            harness::ToolName::RunCommand.spec().parameters
        );
        assert_eq!(body["messages"][0]["role"], "system");
    }
}
