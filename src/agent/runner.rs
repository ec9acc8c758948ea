//! Agent runner with a bounded tool calling loop.

use super::message::{preview, ConversationHistory, Message, ToolCallRequest};
use super::model::{ChatModel, ChatRequest, ModelReply};
use crate::error::{KallError, Result};
use crate::retry::RetryPolicy;
use crate::tools::{ToolOutcome, ToolRegistry, ToolSchema};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Where the agent is within a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    /// Next step is a model call.
    AwaitingModel,
    /// Executing the tool calls of the latest assistant message.
    DispatchingTools,
}

/// Agent that owns a conversation and can call tools.
pub struct Agent {
    model: Arc<dyn ChatModel>,
    tools: Arc<ToolRegistry>,
    tool_schemas: Vec<ToolSchema>,
    retry: RetryPolicy,
    max_rounds: usize,
    parallel_tools: bool,
    preview_chars: usize,
    system_prompt: Option<String>,
    history: ConversationHistory,
    state: AgentState,
}

impl Agent {
    /// Create a new agent over a model and a tool registry.
    pub fn new(model: Arc<dyn ChatModel>, tools: Arc<ToolRegistry>) -> Self {
        let tool_schemas = tools.schemas().cloned().collect();
        Self {
            model,
            tools,
            tool_schemas,
            retry: RetryPolicy::default(),
            max_rounds: 10,
            parallel_tools: false,
            preview_chars: 120,
            system_prompt: None,
            history: ConversationHistory::new(),
            state: AgentState::AwaitingModel,
        }
    }

    /// Set a system prompt sent ahead of the history on every model call.
    pub fn with_system_prompt(mut self, prompt: &str) -> Self {
        self.system_prompt = Some(prompt.to_string());
        self
    }

    /// Set the maximum number of tool-dispatch rounds per user message.
    pub fn with_max_rounds(mut self, max: usize) -> Self {
        self.max_rounds = max;
        self
    }

    /// Set the retry policy for model calls.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Run the tool calls of one batch concurrently.
    pub fn with_parallel_tools(mut self, parallel: bool) -> Self {
        self.parallel_tools = parallel;
        self
    }

    /// Set how many characters of message content are logged.
    pub fn with_preview_chars(mut self, chars: usize) -> Self {
        self.preview_chars = chars;
        self
    }

    /// The conversation so far.
    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// Current loop state.
    pub fn state(&self) -> AgentState {
        self.state
    }

    /// Discard the conversation history.
    pub fn reset(&mut self) {
        self.history.clear();
        self.state = AgentState::AwaitingModel;
        debug!("Conversation history cleared");
    }

    /// Send a user message and drive the loop until the model answers in
    /// plain text.
    ///
    /// Fails with [`KallError::Service`] when the model cannot be reached and
    /// with [`KallError::MaxRoundsExceeded`] when the model keeps asking for
    /// tools. In both cases the history keeps exactly the messages appended
    /// before the failure.
    #[instrument(skip_all, fields(model = self.model.name()))]
    pub async fn chat(&mut self, message: &str) -> Result<AgentResponse> {
        let unanswered = self.history.unanswered_calls().len();
        if unanswered > 0 {
            return Err(KallError::Agent(format!(
                "{} tool call(s) in the history have no result",
                unanswered
            )));
        }

        self.state = AgentState::AwaitingModel;
        self.append(Message::user(message));

        let mut rounds = 0;
        let mut model_calls = 0;
        let mut records = Vec::new();

        loop {
            debug!("Agent round {}, {} messages", rounds, self.history.len());

            model_calls += 1;
            let reply = self.call_model().await?;

            if reply.tool_calls.is_empty() {
                if reply.content.as_deref().map_or(true, str::is_empty) {
                    warn!(
                        finish_reason = reply.finish_reason.as_deref().unwrap_or("unknown"),
                        "Model returned neither content nor tool calls"
                    );
                }
                let content = reply.content.unwrap_or_default();
                self.append(Message::assistant(content.clone()));
                return Ok(AgentResponse {
                    content,
                    tool_calls: records,
                    rounds,
                    model_calls,
                });
            }

            if rounds >= self.max_rounds {
                warn!(
                    "Model requested {} more tool call(s) after {} rounds, giving up",
                    reply.tool_calls.len(),
                    rounds
                );
                return Err(KallError::MaxRoundsExceeded(self.max_rounds));
            }

            let ModelReply {
                content,
                tool_calls,
                ..
            } = reply;
            self.append(Message::assistant_with_tool_calls(
                content.unwrap_or_default(),
                tool_calls.clone(),
            ));

            self.state = AgentState::DispatchingTools;
            rounds += 1;

            let outcomes = self.dispatch(&tool_calls).await;
            for (call, outcome) in tool_calls.iter().zip(outcomes) {
                records.push(ToolCallRecord {
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                    result: outcome.content.clone(),
                    is_error: outcome.is_error,
                });
                self.append(Message::tool_result(&outcome));
            }

            self.state = AgentState::AwaitingModel;
        }
    }

    /// Send the system prompt, history and tool schemas through the retry
    /// policy.
    async fn call_model(&self) -> Result<ModelReply> {
        let request = ChatRequest {
            system_prompt: self.system_prompt.as_deref(),
            messages: self.history.messages(),
            tools: &self.tool_schemas,
        };
        let model = &self.model;

        let reply = self
            .retry
            .run("chat completion", || model.complete(&request))
            .await?;

        Ok(reply)
    }

    /// Execute a batch of tool calls; outcomes come back in request order.
    async fn dispatch(&self, calls: &[ToolCallRequest]) -> Vec<ToolOutcome> {
        if self.parallel_tools && calls.len() > 1 {
            // Process all the futures in parallel but wait until all are finished
            futures::future::join_all(calls.iter().map(|call| self.dispatch_one(call))).await
        } else {
            let mut outcomes = Vec::with_capacity(calls.len());
            for call in calls {
                outcomes.push(self.dispatch_one(call).await);
            }
            outcomes
        }
    }

    async fn dispatch_one(&self, call: &ToolCallRequest) -> ToolOutcome {
        info!(
            id = %call.id,
            tool = %call.name,
            "Calling tool with args: {}",
            preview(&call.arguments, self.preview_chars)
        );
        let outcome = self.tools.dispatch(call).await;
        if outcome.is_error {
            // The error text itself is logged with the tool message.
            warn!(id = %call.id, tool = %call.name, "Tool call failed");
        }
        outcome
    }

    fn append(&mut self, message: Message) {
        let calls: Vec<&str> = message.tool_calls.iter().map(|c| c.name.as_str()).collect();
        info!(
            timestamp = %message.created_at.to_rfc3339(),
            role = %message.role,
            tool_calls = ?calls,
            "{}",
            preview(&message.content, self.preview_chars)
        );
        self.history.push(message);
    }
}

/// Response from one agent turn.
#[derive(Debug)]
pub struct AgentResponse {
    /// The final response content from the agent.
    pub content: String,
    /// Record of all tool calls made during the turn.
    pub tool_calls: Vec<ToolCallRecord>,
    /// Number of tool-dispatch rounds used.
    pub rounds: usize,
    /// Number of model calls, not counting retries.
    pub model_calls: usize,
}

/// Record of a tool call made by the agent.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCallRecord {
    /// Name of the tool called.
    pub name: String,
    /// JSON arguments passed to the tool.
    pub arguments: String,
    /// Result returned by the tool, or the error description.
    pub result: String,
    /// Whether the call failed.
    pub is_error: bool,
}

impl std::fmt::Display for ToolCallRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.arguments)
    }
}
