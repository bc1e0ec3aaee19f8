//! The built-in answer prompt.

use crate::types::{PromptContextConfig, PromptDefinition};

pub const BUILTIN_RAG_PROMPT_ID: &str = "rag-answer";

const SYSTEM: &str = "You are a knowledgeable assistant answering questions from a knowledge \
base of documents, images and audio transcripts. Ground every statement in the numbered \
context blocks and cite them inline with their bracketed numbers, for example [1] or [2][3]. \
Only use numbers that appear in the context. If the context does not contain the answer, \
say so plainly.";

const TEMPLATE: &str = "CONTEXT:
{{context}}

{{#if history}}{{history}}
{{/if}}USER QUESTION: {{query}}

Answer using the context above and cite sources with their [n] numbers:";

/// The default answer prompt used when the workspace does not override it.
pub fn builtin_prompt() -> PromptDefinition {
    PromptDefinition {
        id: BUILTIN_RAG_PROMPT_ID.to_string(),
        title: "Answer with numbered citations".to_string(),
        api_version: "1.0".to_string(),
        system: Some(SYSTEM.to_string()),
        template: TEMPLATE.to_string(),
        context: PromptContextConfig::default(),
    }
}
