//! Chat model abstraction and the OpenAI-backed implementation.

use super::message::{Message, Role, ToolCallRequest};
use crate::config::{ModelSettings, OpenAISettings};
use crate::error::{RemoteError, Result};
use crate::openai::create_client;
use crate::tools::{tool_definitions, ToolSchema};
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionToolType, CreateChatCompletionRequestArgs, FunctionCall,
};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Everything sent to the model for one completion.
#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    pub system_prompt: Option<&'a str>,
    pub messages: &'a [Message],
    pub tools: &'a [ToolSchema],
}

/// What the model answered: text, tool calls, or both.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
    /// Why generation stopped, as reported by the endpoint.
    pub finish_reason: Option<String>,
}

impl ModelReply {
    /// A plain text reply.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
            finish_reason: None,
        }
    }

    /// A reply that requests tool calls.
    pub fn tool_calls(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            content: None,
            tool_calls,
            finish_reason: None,
        }
    }
}

/// A remote chat-completion endpoint.
///
/// Implementations make a single attempt per call; the agent wraps them in
/// its retry policy.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Request one completion.
    async fn complete(&self, request: &ChatRequest<'_>) -> std::result::Result<ModelReply, RemoteError>;

    /// Model identifier, for logging.
    fn name(&self) -> &str;
}

/// Chat model served by the OpenAI chat completions API.
pub struct OpenAIChatModel {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl OpenAIChatModel {
    /// Create a chat model from settings.
    pub fn new(openai: &OpenAISettings, model: &ModelSettings) -> Result<Self> {
        Ok(Self {
            client: create_client(openai)?,
            model: model.name.clone(),
            temperature: model.temperature,
        })
    }
}

fn build_error(e: async_openai::error::OpenAIError) -> RemoteError {
    RemoteError::BadRequest(format!("Failed to build request: {}", e))
}

/// Convert a history message into the OpenAI request format.
fn to_request_message(message: &Message) -> std::result::Result<ChatCompletionRequestMessage, RemoteError> {
    let converted = match message.role {
        Role::User => ChatCompletionRequestUserMessageArgs::default()
            .content(message.content.clone())
            .build()
            .map_err(build_error)?
            .into(),
        Role::Assistant => {
            let mut args = ChatCompletionRequestAssistantMessageArgs::default();
            if !message.content.is_empty() {
                args.content(message.content.clone());
            }
            if message.has_tool_calls() {
                let calls: Vec<ChatCompletionMessageToolCall> = message
                    .tool_calls
                    .iter()
                    .map(|call| ChatCompletionMessageToolCall {
                        id: call.id.clone(),
                        r#type: ChatCompletionToolType::Function,
                        function: FunctionCall {
                            name: call.name.clone(),
                            arguments: call.arguments.clone(),
                        },
                    })
                    .collect();
                args.tool_calls(calls);
            }
            args.build().map_err(build_error)?.into()
        }
        Role::Tool => ChatCompletionRequestToolMessageArgs::default()
            .tool_call_id(message.tool_call_id.clone().unwrap_or_default())
            .content(message.content.clone())
            .build()
            .map_err(build_error)?
            .into(),
    };
    Ok(converted)
}

#[async_trait]
impl ChatModel for OpenAIChatModel {
    #[instrument(skip_all, fields(model = %self.model, messages = request.messages.len()))]
    async fn complete(&self, request: &ChatRequest<'_>) -> std::result::Result<ModelReply, RemoteError> {
        let mut messages: Vec<ChatCompletionRequestMessage> =
            Vec::with_capacity(request.messages.len() + 1);

        if let Some(prompt) = request.system_prompt {
            messages.push(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(prompt)
                    .build()
                    .map_err(build_error)?
                    .into(),
            );
        }
        for message in request.messages {
            messages.push(to_request_message(message)?);
        }

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model)
            .messages(messages)
            .temperature(self.temperature);
        // The API rejects an empty tools array.
        if !request.tools.is_empty() {
            args.tools(tool_definitions(request.tools));
        }
        let chat_request = args.build().map_err(build_error)?;

        let response = self.client.chat().create(chat_request).await?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| RemoteError::MalformedResponse("No response from model".to_string()))?;

        let tool_calls: Vec<ToolCallRequest> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolCallRequest {
                id: call.id,
                name: call.function.name,
                arguments: call.function.arguments,
            })
            .collect();

        debug!(
            "Model replied with {} tool call(s), finish reason {:?}",
            tool_calls.len(),
            choice.finish_reason
        );

        Ok(ModelReply {
            content: choice.message.content,
            tool_calls,
            finish_reason: choice
                .finish_reason
                .and_then(|reason| serde_json::to_value(reason).ok())
                .and_then(|value| value.as_str().map(str::to_string)),
        })
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolOutcome;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    /// Read one HTTP request: headers, then `content-length` bytes of body.
    async fn read_request(socket: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let header_end = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };
        let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
        let length: usize = headers
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0);
        while buf.len() < header_end + length {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
    }

    /// Local endpoint answering every request with a plain-text 503.
    async fn overloaded_endpoint() -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(AtomicUsize::new(0));
        let counter = requests.clone();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let counter = counter.clone();
                tokio::spawn(async move {
                    read_request(&mut socket).await;
                    counter.fetch_add(1, Ordering::SeqCst);
                    let body = "upstream overloaded";
                    let response = format!(
                        "HTTP/1.1 503 Service Unavailable\r\ncontent-type: text/plain\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        (format!("http://{}/v1", addr), requests)
    }

    #[tokio::test]
    async fn test_server_error_is_one_transient_attempt() {
        let (base, requests) = overloaded_endpoint().await;
        let openai = OpenAISettings {
            api_key: Some("sk-test".to_string()),
            api_base: Some(base),
            timeout_seconds: 5,
        };
        let model = OpenAIChatModel::new(&openai, &ModelSettings::default()).unwrap();

        let messages = vec![Message::user("Hi")];
        let request = ChatRequest {
            system_prompt: None,
            messages: &messages,
            tools: &[],
        };
        let err = model.complete(&request).await.unwrap_err();

        assert!(err.is_transient());
        assert!(matches!(&err, RemoteError::Server(m) if m.contains("upstream overloaded")));
        assert_eq!(requests.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_convert_assistant_with_tool_calls() {
        let message = Message::assistant_with_tool_calls(
            "",
            vec![ToolCallRequest {
                id: "call_1".to_string(),
                name: "multiply".to_string(),
                arguments: r#"{"a":3,"b":5}"#.to_string(),
            }],
        );

        match to_request_message(&message).unwrap() {
            ChatCompletionRequestMessage::Assistant(assistant) => {
                let calls = assistant.tool_calls.unwrap();
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].id, "call_1");
                assert_eq!(calls[0].function.name, "multiply");
                assert!(assistant.content.is_none());
            }
            other => panic!("Expected assistant message, got {:?}", other),
        }
    }

    #[test]
    fn test_convert_tool_result() {
        let message = Message::tool_result(&ToolOutcome {
            call_id: "call_1".to_string(),
            name: "multiply".to_string(),
            content: "15".to_string(),
            is_error: false,
        });

        match to_request_message(&message).unwrap() {
            ChatCompletionRequestMessage::Tool(tool) => {
                assert_eq!(tool.tool_call_id, "call_1");
            }
            other => panic!("Expected tool message, got {:?}", other),
        }
    }

    #[test]
    fn test_model_reply_constructors() {
        assert_eq!(ModelReply::text("hi").content.as_deref(), Some("hi"));
        assert!(ModelReply::tool_calls(Vec::new()).content.is_none());
    }
}
