//! Company policy lookup backed by the embedding index.

use super::{Arguments, ParamKind, Parameter, Tool, ToolSchema};
use crate::retrieval::EmbeddingIndex;
use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Consult the company policies to check whether certain options are
/// permitted.
pub struct LookupPolicyTool {
    index: Arc<EmbeddingIndex>,
    k: usize,
}

impl LookupPolicyTool {
    /// Create the tool over a shared index, returning the top `k` sections.
    pub fn new(index: Arc<EmbeddingIndex>, k: usize) -> Self {
        Self { index, k: k.max(1) }
    }
}

#[async_trait]
impl Tool for LookupPolicyTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "lookup_policy",
            "Consult the company policies to check whether certain options are permitted. \
            Use this before making any flight changes or performing other 'write' events.",
        )
        .with_param(Parameter::required(
            "query",
            ParamKind::String,
            "The query string to search for in the policies",
        ))
    }

    async fn call(&self, args: &Arguments) -> anyhow::Result<Value> {
        let query = args
            .get("query")
            .and_then(Value::as_str)
            .context("argument 'query' is not a string")?;

        let hits = self.index.query(query, self.k).await?;
        debug!("Policy lookup matched {} sections", hits.len());

        let text = hits
            .iter()
            .map(|h| h.document.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(Value::String(text))
    }
}
