//! Agent system for tool-calling conversations.
//!
//! An [`Agent`] owns one conversation history. Each user message drives a
//! bounded loop: call the model, run any tools it asks for, append the
//! results and call the model again until it answers in plain text.

mod message;
mod model;
mod runner;

pub use message::{preview, ConversationHistory, Message, Role, ToolCallRequest};
pub use model::{ChatModel, ChatRequest, ModelReply, OpenAIChatModel};
pub use runner::{Agent, AgentResponse, AgentState, ToolCallRecord};
