// src/tools/mod.rs
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::protocol::{ToolDescriptor, ToolResult};

mod context;
pub mod strategy_guide;

pub use context::CallContext;
pub use strategy_guide::StrategyGuideTool;

/// A named, schema-described unit of work the server exposes to clients.
///
/// Domain-level problems (bad arguments, nothing found) belong in the
/// returned [`ToolResult`] with `is_error` set. An `Err` means the tool
/// itself failed; the client receives it as an internal error carrying the
/// full message chain.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema for `arguments`. Passed to clients untouched.
    fn input_schema(&self) -> Value;

    async fn execute(&self, ctx: &CallContext, arguments: Map<String, Value>)
        -> anyhow::Result<ToolResult>;

    /// Capability probe for discovery metadata. Tools that carry it return
    /// `Some(self)`.
    fn enhanced(&self) -> Option<&dyn EnhancedTool> {
        None
    }
}

/// Strategic guidance surfaced by `tools/list`. Pure data.
pub trait EnhancedTool {
    fn usage_triggers(&self) -> Vec<String>;

    fn best_practices(&self) -> Vec<String>;

    /// Relation ("precedes", "succeeds", ...) to related tool names.
    fn synergies(&self) -> BTreeMap<String, Vec<String>>;

    fn workflow_snippets(&self) -> Vec<Value>;
}

pub fn describe(tool: &dyn Tool) -> ToolDescriptor {
    let mut descriptor = ToolDescriptor {
        name: tool.name().to_string(),
        description: tool.description().to_string(),
        input_schema: tool.input_schema(),
        usage_triggers: None,
        best_practices: None,
        synergies: None,
        workflow_snippets: None,
    };

    if let Some(enhanced) = tool.enhanced() {
        descriptor.usage_triggers = Some(enhanced.usage_triggers());
        descriptor.best_practices = Some(enhanced.best_practices());
        descriptor.synergies = Some(enhanced.synergies());
        descriptor.workflow_snippets = Some(enhanced.workflow_snippets());
    }

    descriptor
}

/// Tools by name. Filled once before serving, read-only afterwards.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last registration under a name wins; the replaced tool is returned.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Option<Arc<dyn Tool>> {
        let name = tool.name().to_string();
        let replaced = self.tools.insert(name.clone(), tool);
        if replaced.is_some() {
            tracing::warn!(name = %name, "Replaced previously registered tool");
        } else {
            tracing::info!(name = %name, "Registered tool");
        }
        replaced
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Every tool's `tools/list` entry, sorted by name.
    pub fn describe_all(&self) -> Vec<ToolDescriptor> {
        let mut descriptors: Vec<ToolDescriptor> =
            self.tools.values().map(|tool| describe(tool.as_ref())).collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}
