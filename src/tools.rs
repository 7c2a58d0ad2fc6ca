//! Agent-facing tools.
//!
//! A [`Tool`] is what an agent framework discovers and calls. The built-in
//! tools wrap [`RetrievalEngine`] and always answer with a JSON string, even
//! when syncing or searching fails; only malformed parameters produce an
//! `Err`.
//!
//! ```text
//! ┌────────────────────────────────┐
//! │          ToolRegistry          │
//! │  ┌────────────┐ ┌───────────┐  │
//! │  │search_wiki │ │ list_wiki │  │
//! │  │            │ │  _files   │  │
//! │  └────────────┘ └───────────┘  │
//! └───────────────┬────────────────┘
//!                 ▼
//!        RetrievalEngine (sync + scan)
//! ```

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::engine::RetrievalEngine;

/// A callable tool exposed to agents.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Lowercase identifier with underscores, used as the route name.
    fn name(&self) -> &str;

    /// One-line description agents use to decide whether to call the tool.
    fn description(&self) -> &str;

    /// Whether this tool ships with the crate. Defaults to `false`.
    fn is_builtin(&self) -> bool {
        false
    }

    /// JSON Schema (`type: "object"`) describing the parameters.
    fn parameters_schema(&self) -> Value;

    /// Run the tool with parameters already checked by [`validate_params`].
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value>;
}

/// What a tool gets access to while executing.
#[derive(Clone)]
pub struct ToolContext {
    engine: Arc<RetrievalEngine>,
}

impl ToolContext {
    pub fn new(engine: Arc<RetrievalEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<RetrievalEngine> {
        &self.engine
    }

    /// [`RetrievalEngine::search`] on the blocking pool.
    pub async fn search(&self, query: &str) -> Result<String> {
        let engine = self.engine.clone();
        let query = query.to_string();
        tokio::task::spawn_blocking(move || engine.search(&query))
            .await
            .context("search task panicked")
    }

    /// [`RetrievalEngine::list_files`] on the blocking pool.
    pub async fn list_files(&self) -> Result<String> {
        let engine = self.engine.clone();
        tokio::task::spawn_blocking(move || engine.list_files())
            .await
            .context("listing task panicked")
    }
}

/// Built-in `search_wiki` tool.
pub struct SearchWikiTool;

#[async_trait]
impl Tool for SearchWikiTool {
    fn name(&self) -> &str {
        "search_wiki"
    }

    fn description(&self) -> &str {
        "Search the wiki for files containing any of the query keywords"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Whitespace-separated keywords" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let query = params["query"].as_str().unwrap_or("");
        Ok(Value::String(ctx.search(query).await?))
    }
}

/// Built-in `list_wiki_files` tool.
pub struct ListWikiFilesTool;

#[async_trait]
impl Tool for ListWikiFilesTool {
    fn name(&self) -> &str {
        "list_wiki_files"
    }

    fn description(&self) -> &str {
        "List every document available in the wiki"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _params: Value, ctx: &ToolContext) -> Result<Value> {
        Ok(Value::String(ctx.list_files().await?))
    }
}

/// Serializable tool descriptor for `GET /tools/list`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub builtin: bool,
    pub parameters: Value,
}

impl ToolInfo {
    pub fn from_tool(tool: &dyn Tool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            builtin: tool.is_builtin(),
            parameters: tool.parameters_schema(),
        }
    }
}

/// Registry of built-in and custom tools.
///
/// ```rust
/// use wiki_retrieval::tools::ToolRegistry;
///
/// let tools = ToolRegistry::with_builtins();
/// assert!(tools.find("search_wiki").is_some());
/// ```
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// A registry holding `search_wiki` and `list_wiki_files`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(SearchWikiTool));
        registry.register(Box::new(ListWikiFilesTool));
        registry
    }

    /// Register a tool. A later tool with an existing name replaces the
    /// earlier one.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(tool);
    }

    /// Move every tool of `other` into this registry, in order.
    pub fn extend(&mut self, other: ToolRegistry) {
        for tool in other.tools {
            self.register(tool);
        }
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Check `params` against a tool's schema: required keys present and
/// declared types respected. Returns the params as an object.
pub fn validate_params(schema: &Value, params: &Value) -> Result<Value> {
    let params_obj = match params {
        Value::Object(map) => map.clone(),
        Value::Null => serde_json::Map::new(),
        other => bail!("parameters must be a JSON object, got {}", json_type_name(other)),
    };

    let required = schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect::<Vec<_>>())
        .unwrap_or_default();

    for field in required {
        if !params_obj.contains_key(field) {
            bail!("missing required parameter: {}", field);
        }
    }

    if let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) {
        for (name, prop_schema) in properties {
            let (Some(value), Some(expected)) = (
                params_obj.get(name),
                prop_schema.get("type").and_then(|t| t.as_str()),
            ) else {
                continue;
            };

            let type_ok = match expected {
                "string" => value.is_string(),
                "integer" => value.is_i64() || value.is_u64(),
                "number" => value.is_number(),
                "boolean" => value.is_boolean(),
                "array" => value.is_array(),
                "object" => value.is_object(),
                _ => true,
            };
            if !type_ok {
                bail!(
                    "parameter '{}' must be of type '{}', got {}",
                    name,
                    expected,
                    json_type_name(value)
                );
            }
        }
    }

    Ok(Value::Object(params_obj))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
