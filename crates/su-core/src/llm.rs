//! Chat model seam used by `chatbot` graph nodes.
//!
//! [`RigChatModel`] drives any rig completion model through the LLM <> tool
//! loop. Tests substitute a scripted [`ChatModel`].

use anyhow::Result;
use async_trait::async_trait;
#[allow(deprecated)]
use rig::client::completion::CompletionModelHandle;
use rig::completion::{CompletionModel, CompletionRequest, Message, ToolDefinition};
use rig::message::{AssistantContent, Text, ToolCall, ToolResult, ToolResultContent, UserContent};
use rig::OneOrMany;
use tracing::{debug, info, warn};

use crate::message::{ChatMessage, Role};
use crate::tools::ToolSet;

/// One model invocation made on behalf of a graph node.
pub struct ChatRequest<'a> {
    pub system_prompt: Option<&'a str>,
    pub history: &'a [ChatMessage],
    /// Tools the model may call. `None` disables tool calling.
    pub tools: Option<&'a ToolSet>,
}

/// Final text plus every tool result produced on the way, in call order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatReply {
    pub text: String,
    pub tool_messages: Vec<ChatMessage>,
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn respond(&self, request: ChatRequest<'_>) -> Result<ChatReply>;
}

const MAX_CONSECUTIVE_ERRORS: usize = 3;
const CONTINUE_PROMPT: &str =
    "If more tool calls are needed, make them. Otherwise, respond with the result.";

pub struct RigChatModel {
    #[allow(deprecated)]
    model: CompletionModelHandle<'static>,
    model_name: String,
    temperature: f64,
    max_tokens: u64,
    max_iterations: usize,
}

impl RigChatModel {
    #[allow(deprecated)]
    pub fn new(
        model: CompletionModelHandle<'static>,
        model_name: impl Into<String>,
        settings: &su_config::ModelConfig,
    ) -> Self {
        Self {
            model,
            model_name: model_name.into(),
            temperature: f64::from(settings.temperature),
            max_tokens: u64::from(settings.max_tokens),
            max_iterations: settings.max_tool_iterations.max(1) as usize,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

fn to_rig_message(msg: &ChatMessage) -> Option<Message> {
    let text = Text {
        text: msg.content.clone(),
    };
    match msg.role {
        Role::User => Some(Message::User {
            content: OneOrMany::one(UserContent::Text(text)),
        }),
        Role::Assistant => Some(Message::Assistant {
            id: None,
            content: OneOrMany::one(AssistantContent::Text(text)),
        }),
        // Tool output from earlier nodes is replayed as context, not as a
        // tool result, since the originating call is not in this history.
        Role::Tool | Role::Function => Some(Message::User {
            content: OneOrMany::one(UserContent::Text(Text {
                text: format!(
                    "[{} result] {}",
                    msg.name.as_deref().unwrap_or("tool"),
                    msg.content
                ),
            })),
        }),
        Role::Unknown => None,
    }
}

#[async_trait]
impl ChatModel for RigChatModel {
    async fn respond(&self, request: ChatRequest<'_>) -> Result<ChatReply> {
        let mut chat_history: Vec<Message> =
            request.history.iter().filter_map(to_rig_message).collect();
        let mut current_prompt = chat_history.pop().unwrap_or_else(|| Message::User {
            content: OneOrMany::one(UserContent::Text(Text {
                text: String::new(),
            })),
        });

        let tool_defs: Vec<ToolDefinition> = request
            .tools
            .map(|tools| {
                tools
                    .iter()
                    .map(|t| ToolDefinition {
                        name: t.name().to_string(),
                        description: t.description().to_string(),
                        parameters: t.parameters_schema(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let mut tool_messages = Vec::new();
        let mut consecutive_errors = 0usize;

        for iteration in 0..self.max_iterations {
            let mut all_messages = chat_history.clone();
            all_messages.push(current_prompt.clone());
            debug!(
                "LLM request [{}/{}]: {} messages, {} tools",
                iteration + 1,
                self.max_iterations,
                all_messages.len(),
                tool_defs.len()
            );

            let completion = CompletionRequest {
                preamble: request.system_prompt.map(str::to_string),
                chat_history: OneOrMany::many(all_messages)
                    .unwrap_or_else(|_| OneOrMany::one(current_prompt.clone())),
                documents: Vec::new(),
                tools: tool_defs.clone(),
                temperature: Some(self.temperature),
                max_tokens: Some(self.max_tokens),
                tool_choice: None,
                additional_params: None,
            };

            let response = self
                .model
                .completion(completion)
                .await
                .map_err(|e| anyhow::anyhow!("LLM completion error: {e}"))?;

            let mut text = String::new();
            let mut calls: Vec<ToolCall> = Vec::new();
            for content in response.choice.iter() {
                match content {
                    AssistantContent::Text(t) => text.push_str(&t.text),
                    AssistantContent::ToolCall(tc) => calls.push(tc.clone()),
                    _ => {}
                }
            }

            let Some(tools) = request.tools.filter(|_| !calls.is_empty()) else {
                debug!("LLM response: text ({} chars)", text.len());
                return Ok(ChatReply {
                    text,
                    tool_messages,
                });
            };

            chat_history.push(current_prompt);
            chat_history.push(Message::Assistant {
                id: None,
                content: response.choice.clone(),
            });

            let mut results: Vec<UserContent> = Vec::new();
            let mut any_success = false;
            let mut last_error = String::new();
            for tc in &calls {
                let name = &tc.function.name;
                info!("Tool call [{}]: {name}({})", iteration + 1, tc.function.arguments);
                let result = match tools.execute(name, tc.function.arguments.clone()).await {
                    Ok(r) => {
                        any_success = true;
                        r
                    }
                    Err(e) => {
                        let err = format!("Error executing {name}: {e}");
                        last_error.clone_from(&err);
                        err
                    }
                };
                tool_messages.push(ChatMessage::tool(name.clone(), result.clone()));
                results.push(UserContent::ToolResult(ToolResult {
                    id: tc.id.clone(),
                    call_id: tc.call_id.clone(),
                    content: OneOrMany::one(ToolResultContent::Text(Text { text: result })),
                }));
            }

            if any_success {
                consecutive_errors = 0;
            } else {
                consecutive_errors += 1;
                if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                    warn!("Giving up after {consecutive_errors} rounds of failing tool calls");
                    return Ok(ChatReply {
                        text: format!("I had to stop retrying a failing tool. Last error: {last_error}"),
                        tool_messages,
                    });
                }
            }

            results.push(UserContent::Text(Text {
                text: CONTINUE_PROMPT.into(),
            }));
            current_prompt = Message::User {
                content: OneOrMany::many(results).unwrap_or_else(|_| {
                    OneOrMany::one(UserContent::Text(Text {
                        text: CONTINUE_PROMPT.into(),
                    }))
                }),
            };
        }

        warn!(
            "Tool loop reached max iterations ({}) without a final answer",
            self.max_iterations
        );
        Ok(ChatReply {
            text: "I reached the tool-call limit before finishing.".into(),
            tool_messages,
        })
    }
}
