//! The answering pipeline: retrieve, assemble context, generate, attribute,
//! score.
//!
//! Degradation is absorbed here: store and embedding failures shrink the
//! context, generator failures and timeouts switch to the template answer,
//! extraction failures drop the citations. Only cancellation surfaces as an
//! error.

use crate::citation::{format_for_json, Citation, CitationExtractor, CitationView};
use crate::confidence::ConfidenceScorer;
use crate::context::{build_context, fallback_answer};
use crate::retriever::AggregatingRetriever;
use crate::session::SessionStore;
use crate::types::{QuerySpec, RetrievedItem};
use mosaic_core::{AppConfig, AppError, AppResult};
use mosaic_llm::{create_client, LlmClient, LlmRequest};
use mosaic_prompt::{build_prompt, resolve_prompt, PromptDefinition};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Generator and context settings for [`RagEngine`].
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub generator_timeout: Duration,
    /// Context blocks handed to the generator.
    pub max_context_items: usize,
    /// Previous exchanges included in the prompt.
    pub history_turns: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl EngineOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.generator.temperature,
            max_tokens: config.generator.max_tokens,
            generator_timeout: Duration::from_secs(config.generator.timeout_secs),
            max_context_items: config.retrieval.max_context_items.max(1),
            history_turns: config.retrieval.history_turns,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RagResponse {
    pub answer: String,
    pub query: String,
    pub citations: Vec<CitationView>,
    pub confidence: f32,
    /// The ranked context blocks, in block-number order.
    pub retrieved_contexts: Vec<RetrievedItem>,
    pub processing_time_ms: u64,
    /// Full citations, for validation and previews.
    #[serde(skip)]
    pub cited: Vec<Citation>,
    /// Whether the answer came from the template instead of the generator.
    #[serde(skip)]
    pub used_fallback: bool,
}

pub struct RagEngine {
    retriever: Arc<AggregatingRetriever>,
    generator: Arc<dyn LlmClient>,
    prompt: PromptDefinition,
    extractor: CitationExtractor,
    scorer: ConfidenceScorer,
    sessions: Arc<SessionStore>,
    options: EngineOptions,
}

impl RagEngine {
    pub fn new(
        retriever: Arc<AggregatingRetriever>,
        generator: Arc<dyn LlmClient>,
        prompt: PromptDefinition,
        extractor: CitationExtractor,
        sessions: Arc<SessionStore>,
        options: EngineOptions,
    ) -> Self {
        Self {
            retriever,
            generator,
            prompt,
            extractor,
            scorer: ConfidenceScorer::default(),
            sessions,
            options,
        }
    }

    /// Wire LanceDB stores, embedders, the generator client and the prompt
    /// definition from `config`.
    pub async fn from_config(config: &AppConfig) -> AppResult<Self> {
        let retriever = AggregatingRetriever::from_config(config).await?;
        let extractor = CitationExtractor::new(
            retriever.embedders().text.clone(),
            config.citations.clone(),
            retriever.query_timeout(),
        );

        let generator = create_client(
            &config.provider,
            config.generator.endpoint.as_deref(),
            Duration::from_secs(config.generator.timeout_secs),
        )?;
        let prompt = resolve_prompt(&config.prompts_dir(), &config.generator.prompt)?;

        Ok(Self::new(
            Arc::new(retriever),
            generator,
            prompt,
            extractor,
            Arc::new(SessionStore::new(config.retrieval.session_capacity)),
            EngineOptions::from_config(config),
        ))
    }

    pub fn retriever(&self) -> &Arc<AggregatingRetriever> {
        &self.retriever
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Answer `spec` with citations and a confidence score.
    ///
    /// Retrieval depth ignores `spec.max_results()`: the engine asks for
    /// `2 × max_context_items` candidates and keeps the top
    /// `max_context_items` as context.
    ///
    /// Returns [`AppError::Cancelled`] if `cancel` fires before the response
    /// is complete; no partial response is produced and the session is left
    /// untouched.
    #[instrument(skip_all, fields(session = session.unwrap_or("-")))]
    pub async fn answer(
        &self,
        spec: &QuerySpec,
        session: Option<&str>,
        cancel: &CancellationToken,
    ) -> AppResult<RagResponse> {
        let started = Instant::now();

        let retrieval = spec
            .clone()
            .with_max_results(self.options.max_context_items * 2);
        let mut items = self.retriever.search(&retrieval, cancel).await?;
        items.truncate(self.options.max_context_items);
        info!(count = items.len(), "Retrieved context");

        let history = session
            .map(|session| {
                self.sessions
                    .conversation_context(session, self.options.history_turns)
            })
            .unwrap_or_default();
        let context = build_context(&items);

        let generated = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
            result = self.generate(&spec.text, &context, history) => result,
        };

        let (answer, used_fallback) = match generated {
            Ok(answer) => (answer, false),
            Err(e) => {
                warn!(error = %e, "Generator unavailable; answering from template");
                (fallback_answer(&spec.text, &items), true)
            }
        };

        let cited = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
            citations = self.extractor.extract(&answer, &items) => citations,
        };
        let confidence = self.scorer.score_response(&items, &answer);

        if let (Some(session), false) = (session, used_fallback) {
            self.sessions.record(session, &spec.text, &answer);
        }

        Ok(RagResponse {
            citations: format_for_json(&cited),
            query: spec.text.clone(),
            answer,
            confidence,
            retrieved_contexts: items,
            processing_time_ms: started.elapsed().as_millis() as u64,
            cited,
            used_fallback,
        })
    }

    #[instrument(skip_all, fields(model = %self.options.model))]
    async fn generate(&self, query: &str, context: &str, history: String) -> AppResult<String> {
        let mut variables = HashMap::new();
        variables.insert("query".to_string(), query.to_string());
        variables.insert("context".to_string(), context.to_string());
        variables.insert("history".to_string(), history);
        let built = build_prompt(&self.prompt, variables)?;

        let mut request = LlmRequest::new(built.user, self.options.model.clone())
            .with_temperature(self.options.temperature)
            .with_max_tokens(self.options.max_tokens);
        if let Some(system) = built.system {
            request = request.with_system(system);
        }

        match tokio::time::timeout(self.options.generator_timeout, self.generator.complete(&request)).await {
            Ok(Ok(response)) if !response.content.trim().is_empty() => Ok(response.content),
            Ok(Ok(_)) => Err(AppError::Generator("Generator returned an empty answer".to_string())),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(AppError::Generator(format!(
                "Generator timed out after {}s",
                self.options.generator_timeout.as_secs_f64()
            ))),
        }
    }
}
