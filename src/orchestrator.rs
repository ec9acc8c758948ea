//! Wiring for Kall.
//!
//! Builds the model, embedder, policy index, tool registry and agents
//! from [`Settings`]. The index and registry are built on first use and
//! shared by every agent afterwards.

use crate::agent::{Agent, ChatModel, OpenAIChatModel};
use crate::config::Settings;
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::Result;
use crate::retrieval::{corpus, EmbeddingIndex, RetrievalHit};
use crate::retry::RetryPolicy;
use crate::tools::{AddTool, LookupPolicyTool, MultiplyTool, Tool, ToolRegistry};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, instrument};

/// Owns the shared components behind every command.
pub struct Orchestrator {
    settings: Settings,
    chat_model: Arc<dyn ChatModel>,
    embedder: Arc<dyn Embedder>,
    index: OnceCell<Arc<EmbeddingIndex>>,
    registry: OnceCell<Arc<ToolRegistry>>,
}

impl Orchestrator {
    /// Create an orchestrator backed by the OpenAI API.
    pub fn new(settings: Settings) -> Result<Self> {
        let chat_model: Arc<dyn ChatModel> =
            Arc::new(OpenAIChatModel::new(&settings.openai, &settings.model)?);
        let embedder: Arc<dyn Embedder> =
            Arc::new(OpenAIEmbedder::new(&settings.openai, &settings.embedding)?);

        Ok(Self::with_components(settings, chat_model, embedder))
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        settings: Settings,
        chat_model: Arc<dyn ChatModel>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            settings,
            chat_model,
            embedder,
            index: OnceCell::new(),
            registry: OnceCell::new(),
        }
    }

    /// Get the settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Get the chat model.
    pub fn chat_model(&self) -> Arc<dyn ChatModel> {
        self.chat_model.clone()
    }

    /// Retry policy for every remote call.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from(&self.settings.retry)
    }

    /// The policy index, loading and embedding the corpus on first use.
    #[instrument(skip(self))]
    pub async fn index(&self) -> Result<Arc<EmbeddingIndex>> {
        let index = self
            .index
            .get_or_try_init(|| async {
                info!("Loading policy corpus from {}", self.settings.corpus.source);
                let documents = corpus::load(&self.settings.corpus.source).await?;
                let index =
                    EmbeddingIndex::build(documents, self.embedder.clone(), self.retry_policy())
                        .await?;
                Ok::<_, crate::error::KallError>(Arc::new(index))
            })
            .await?;
        Ok(index.clone())
    }

    /// The tool registry: `multiply`, `add` and `lookup_policy`.
    pub async fn registry(&self) -> Result<Arc<ToolRegistry>> {
        let registry = self
            .registry
            .get_or_try_init(|| async {
                let index = self.index().await?;
                let tools: Vec<Arc<dyn Tool>> = vec![
                    Arc::new(MultiplyTool),
                    Arc::new(AddTool),
                    Arc::new(LookupPolicyTool::new(index, self.settings.corpus.lookup_k)),
                ];
                Ok::<_, crate::error::KallError>(Arc::new(ToolRegistry::new(tools)?))
            })
            .await?;
        Ok(registry.clone())
    }

    /// A fresh agent with its own empty history.
    pub async fn agent(&self) -> Result<Agent> {
        let registry = self.registry().await?;
        let agent_settings = &self.settings.agent;

        let mut agent = Agent::new(self.chat_model.clone(), registry)
            .with_max_rounds(agent_settings.max_rounds)
            .with_parallel_tools(agent_settings.parallel_tools)
            .with_preview_chars(agent_settings.log_preview_chars)
            .with_retry_policy(self.retry_policy());

        if let Some(prompt) = self.settings.system_prompt() {
            agent = agent.with_system_prompt(prompt);
        }
        Ok(agent)
    }

    /// Query the policy index directly.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievalHit>> {
        self.index().await?.query(query, k).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{ChatRequest, ModelReply, ToolCallRequest};
    use crate::error::RemoteError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Embeds text as keyword counts: [refund, baggage, seat].
    struct KeywordEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, RemoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| {
                    let t = t.to_lowercase();
                    ["refund", "baggage", "seat"]
                        .iter()
                        .map(|w| t.matches(w).count() as f32)
                        .collect()
                })
                .collect())
        }

        fn dimensions(&self) -> usize {
            3
        }
    }

    /// Asks for a policy lookup once, then answers with the tool result.
    struct PolicyModel {
        seen: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl ChatModel for PolicyModel {
        async fn complete(&self, request: &ChatRequest<'_>) -> std::result::Result<ModelReply, RemoteError> {
            self.seen.lock().unwrap().push(request.messages.len());
            match request.messages.last() {
                Some(last) if last.tool_call_id.is_some() => Ok(ModelReply::text(last.content.clone())),
                _ => Ok(ModelReply::tool_calls(vec![ToolCallRequest {
                    id: "call_1".to_string(),
                    name: "lookup_policy".to_string(),
                    arguments: r#"{"query": "baggage"}"#.to_string(),
                }])),
            }
        }

        fn name(&self) -> &str {
            "policy"
        }
    }

    const FAQ: &str = "# Swiss FAQ\n\n## Refunds\nRefund rules for refund requests.\n\n## Baggage\nBaggage allowance and baggage fees.\n\n## Seats\nSeat selection.";

    fn orchestrator(dir: &std::path::Path) -> (Orchestrator, Arc<KeywordEmbedder>) {
        let faq = dir.join("faq.md");
        std::fs::write(&faq, FAQ).unwrap();

        let mut settings = Settings::default();
        settings.corpus.source = faq.display().to_string();
        settings.corpus.lookup_k = 1;

        let embedder = Arc::new(KeywordEmbedder {
            calls: AtomicUsize::new(0),
        });
        let model = Arc::new(PolicyModel {
            seen: Mutex::new(Vec::new()),
        });
        (
            Orchestrator::with_components(settings, model, embedder.clone()),
            embedder,
        )
    }

    #[tokio::test]
    async fn test_search_builds_index_once() {
        let dir = tempfile::tempdir().unwrap();
        let (orchestrator, embedder) = orchestrator(dir.path());

        let hits = orchestrator.search("refund", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document.title.as_deref(), Some("Refunds"));

        orchestrator.search("seat", 2).await.unwrap();
        // One call for the corpus, one per query.
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
        assert_eq!(orchestrator.index().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_agent_uses_policy_tool() {
        let dir = tempfile::tempdir().unwrap();
        let (orchestrator, _) = orchestrator(dir.path());

        let registry = orchestrator.registry().await.unwrap();
        let names: Vec<_> = registry.schemas().map(|s| s.name.clone()).collect();
        assert_eq!(names, vec!["multiply", "add", "lookup_policy"]);

        let mut agent = orchestrator.agent().await.unwrap();
        let response = agent.chat("What about my bags?").await.unwrap();

        assert!(response.content.contains("Baggage allowance"));
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(agent.history().len(), 4);
    }
}
