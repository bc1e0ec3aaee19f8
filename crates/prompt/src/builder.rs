//! Rendering prompt definitions into generator input.

use crate::types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition};
use handlebars::Handlebars;
use mosaic_core::{AppError, AppResult};
use std::collections::HashMap;

/// Render `definition` with `variables`.
///
/// When the definition opts out of conversation history, the `history`
/// variable is cleared before rendering.
///
/// # Example
/// ```
/// use mosaic_prompt::{build_prompt, builtin_prompt};
/// use std::collections::HashMap;
///
/// let mut vars = HashMap::new();
/// vars.insert("query".to_string(), "Who presented the roadmap?".to_string());
/// vars.insert("context".to_string(), "[1] AUDIO - Audio transcript at 3:05\n...".to_string());
///
/// let built = build_prompt(&builtin_prompt(), vars).unwrap();
/// assert!(built.user.contains("Who presented the roadmap?"));
/// ```
pub fn build_prompt(
    definition: &PromptDefinition,
    mut variables: HashMap<String, String>,
) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    let history_included = definition.context.include_history
        && variables
            .get("history")
            .is_some_and(|history| !history.trim().is_empty());
    if !history_included {
        variables.remove("history");
    }

    let handlebars = registry(definition)?;
    let user = handlebars
        .render("user", &variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))?;

    let system = match definition.system {
        Some(_) => Some(
            handlebars
                .render("system", &variables)
                .map_err(|e| AppError::Prompt(format!("Failed to render system: {}", e)))?,
        ),
        None => None,
    };

    let mut resolved_variables: Vec<String> = variables.into_keys().collect();
    resolved_variables.sort();

    Ok(BuiltPrompt {
        system,
        user,
        metadata: BuiltPromptMetadata {
            source_prompt_id: definition.id.clone(),
            history_included,
            resolved_variables,
        },
    })
}

fn registry(definition: &PromptDefinition) -> AppResult<Handlebars<'static>> {
    let mut handlebars = Handlebars::new();
    // Context blocks are plain text; HTML escaping would mangle quotes and ampersands.
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("user", &definition.template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    if let Some(system) = &definition.system {
        handlebars
            .register_template_string("system", system)
            .map_err(|e| AppError::Prompt(format!("Failed to register system: {}", e)))?;
    }

    Ok(handlebars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::builtin_prompt;
    use crate::types::PromptContextConfig;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_builtin_renders_context_and_query() {
        let built = build_prompt(
            &builtin_prompt(),
            vars(&[
                ("query", "What did the CFO say?"),
                ("context", "[1] AUDIO - Audio transcript at 1:05\nRevenue grew & margins held.\n"),
            ]),
        )
        .unwrap();

        assert!(built.user.contains("[1] AUDIO - Audio transcript at 1:05"));
        assert!(built.user.contains("Revenue grew & margins held."));
        assert!(built.user.contains("USER QUESTION: What did the CFO say?"));
        assert!(!built.user.contains("CONVERSATION HISTORY"));
        assert!(built.system.unwrap().contains("[1]"));
        assert!(!built.metadata.history_included);
    }

    #[test]
    fn test_history_rendered_when_present() {
        let built = build_prompt(
            &builtin_prompt(),
            vars(&[
                ("query", "And the year before?"),
                ("context", "[1] DOCUMENT - Document page 2\n...\n"),
                ("history", "CONVERSATION HISTORY:\nQ: Revenue in 2023?\nA: 4.1M"),
            ]),
        )
        .unwrap();

        assert!(built.user.contains("Q: Revenue in 2023?"));
        assert!(built.metadata.history_included);
        assert_eq!(
            built.metadata.resolved_variables,
            vec!["context", "history", "query"]
        );
    }

    #[test]
    fn test_history_dropped_when_disabled() {
        let mut def = builtin_prompt();
        def.context = PromptContextConfig {
            include_history: false,
        };

        let built = build_prompt(
            &def,
            vars(&[
                ("query", "q"),
                ("context", "c"),
                ("history", "CONVERSATION HISTORY:\nQ: earlier"),
            ]),
        )
        .unwrap();

        assert!(!built.user.contains("earlier"));
        assert!(!built.metadata.history_included);
    }

    #[test]
    fn test_broken_template_is_prompt_error() {
        let mut def = builtin_prompt();
        def.template = "{{#if context}}unterminated".to_string();
        assert!(matches!(
            build_prompt(&def, HashMap::new()),
            Err(AppError::Prompt(_))
        ));
    }
}
