//! Prompt types.

use serde::{Deserialize, Serialize};

/// A prompt definition loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Unique prompt identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// System instruction template (Handlebars)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// User prompt template (Handlebars)
    pub template: String,

    #[serde(default)]
    pub context: PromptContextConfig,
}

/// Which optional context the template receives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptContextConfig {
    /// Replay recent conversation turns into the `history` variable
    #[serde(rename = "includeHistory", default = "default_true")]
    pub include_history: bool,
}

impl Default for PromptContextConfig {
    fn default() -> Self {
        Self {
            include_history: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// A rendered prompt ready for the generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPrompt {
    pub system: Option<String>,
    pub user: String,
    pub metadata: BuiltPromptMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPromptMetadata {
    #[serde(rename = "sourcePromptId")]
    pub source_prompt_id: String,

    #[serde(rename = "historyIncluded")]
    pub history_included: bool,

    /// Names of the variables supplied at render time, sorted
    #[serde(rename = "resolvedVariables")]
    pub resolved_variables: Vec<String>,
}
