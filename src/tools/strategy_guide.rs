// src/tools/strategy_guide.rs
//! `strategy_guide`: onboarding guidance for agents working with the memory
//! tools. The guide file is read once, when the tool is built.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use super::{CallContext, EnhancedTool, Tool};
use crate::config::OnboardingConfig;
use crate::protocol::ToolResult;

pub const TOOL_NAME: &str = "strategy_guide";

const FALLBACK_GUIDE: &str = "Strategy guide not available. Please refer to ZETMEM_ONBOARDING_STRATEGY.md for complete guidance.";
const MAX_PROJECT_PATH_LEN: usize = 4096;

#[derive(Debug, Clone)]
pub struct StrategyGuideTool {
    guide: String,
    loaded: bool,
}

impl StrategyGuideTool {
    pub fn new(config: &OnboardingConfig) -> Self {
        match load_guide(&config.strategy_guide_path, config.max_file_size) {
            Ok(guide) => {
                tracing::info!(size = guide.len(), "Strategy guide loaded and cached");
                Self {
                    guide,
                    loaded: true,
                }
            }
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "Could not load strategy guide");
                Self {
                    guide: FALLBACK_GUIDE.to_string(),
                    loaded: false,
                }
            }
        }
    }

    pub fn from_text(guide: impl Into<String>) -> Self {
        Self {
            guide: guide.into(),
            loaded: true,
        }
    }

    /// False when the fallback text is being served instead of a real guide.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn guide(&self) -> &str {
        &self.guide
    }
}

fn load_guide(path: &Path, max_file_size: u64) -> Result<String> {
    if path.as_os_str().is_empty() {
        bail!("strategy guide path not configured");
    }

    let metadata = fs::metadata(path)
        .with_context(|| format!("strategy guide not found at path: {}", path.display()))?;
    if metadata.len() > max_file_size {
        bail!(
            "strategy guide exceeds size limit of {} bytes (actual: {} bytes)",
            max_file_size,
            metadata.len()
        );
    }

    fs::read_to_string(path).context("failed to read strategy guide")
}

fn validate_project_path(path: &str) -> Result<(), &'static str> {
    if path.contains('\0') {
        return Err("path contains null bytes");
    }
    if path.len() > MAX_PROJECT_PATH_LEN {
        return Err("path too long (max 4096 characters)");
    }
    if path.trim().is_empty() {
        return Err("path cannot be empty");
    }
    Ok(())
}

#[async_trait]
impl Tool for StrategyGuideTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Agent onboarding - provides the complete tool use strategy and best practices for the memory tools"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "project_path": {
                    "type": "string",
                    "description": "Path to the project directory (optional, uses current directory if not provided)"
                },
                "project_name": {
                    "type": "string",
                    "description": "Descriptive name for the project (optional)"
                },
                "include_strategy_guide": {
                    "type": "boolean",
                    "description": "Whether to include the complete strategy guide in response (default: true)",
                    "default": true
                }
            },
            "required": []
        })
    }

    async fn execute(&self, _ctx: &CallContext, arguments: Map<String, Value>) -> Result<ToolResult> {
        let project_path = arguments.get("project_path").and_then(Value::as_str);
        let project_name = arguments.get("project_name").and_then(Value::as_str);
        let include_guide = arguments
            .get("include_strategy_guide")
            .and_then(Value::as_bool)
            .unwrap_or(true);

        if let Some(path) = project_path {
            if let Err(reason) = validate_project_path(path) {
                return Ok(ToolResult::error_text(format!("Invalid project_path: {reason}")));
            }
        }

        let mut response = format!(
            "**Zetmem Agent Onboarding**\n\n\
             ## Project\n\
             - **Name**: {}\n\
             - **Path**: {}\n\n\
             ## Key Principles\n\
             - **Workspace-First**: Always specify workspace_id for proper organization\n\
             - **Consistent Habits**: Store memories after solving problems, retrieve before starting tasks\n\
             - **Threshold Management**: Start with min_relevance=0.3, increase for precision\n\
             - **Regular Evolution**: Run evolution weekly or after 10+ new memories\n",
            project_name.unwrap_or("unnamed project"),
            project_path.unwrap_or("current directory"),
        );

        if include_guide {
            response.push_str("\n## Complete Strategy Guide\n\n");
            response.push_str(&self.guide);
            response.push_str("\n\n---\n\n**You are now ready to use zetmem effectively!**");
        } else {
            response.push_str(
                "\n## Next Steps\n\
                 - Review the complete strategy guide at: ZETMEM_ONBOARDING_STRATEGY.md\n\
                 - Follow the workflow patterns for effective memory management\n\n\
                 **You are now ready to use zetmem effectively!**",
            );
        }

        Ok(ToolResult::text(response))
    }

    fn enhanced(&self) -> Option<&dyn EnhancedTool> {
        Some(self)
    }
}

impl EnhancedTool for StrategyGuideTool {
    fn usage_triggers(&self) -> Vec<String> {
        [
            "At the very beginning of agent interaction with a new codebase or project",
            "When switching to a different project context",
            "Before beginning any coding session to establish strategy context",
            "When an agent needs to understand the complete zetmem workflow and best practices",
        ]
        .map(String::from)
        .to_vec()
    }

    fn best_practices(&self) -> Vec<String> {
        [
            "Run this as the first command when starting work in a new context",
            "Provide a descriptive project name",
            "Read and internalize the complete strategy guide returned by this command",
            "Follow the workflow patterns and thresholds specified in the strategy guide",
        ]
        .map(String::from)
        .to_vec()
    }

    fn synergies(&self) -> BTreeMap<String, Vec<String>> {
        BTreeMap::from([
            (
                "precedes".to_string(),
                ["store_coding_memory", "retrieve_relevant_memories", "evolve_memory_network"]
                    .map(String::from)
                    .to_vec(),
            ),
            ("succeeds".to_string(), Vec::new()),
        ])
    }

    fn workflow_snippets(&self) -> Vec<Value> {
        vec![json!({
            "goal": "Complete agent onboarding for new project",
            "steps": [
                "1. strategy_guide with project directory and descriptive name",
                "2. Review the complete strategy guide and internalize best practices",
                "3. Begin coding session following the workflow patterns in the guide"
            ]
        })]
    }
}
