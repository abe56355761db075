//! Farming question answered by a text generation model, for SMS replies.

use super::FlowHandler;
use crate::providers::TextGenerator;
use async_trait::async_trait;
use mkulima_common::util::truncate_with_ellipsis;
use mkulima_common::Error;
use std::sync::Arc;

/// Keeps answers on agriculture and weather, and short enough for one SMS.
pub const SYSTEM_INSTRUCTION: &str = "You are MkulimaMkononi, an assistant for smallholder \
farmers in Kenya. Only answer questions about agriculture and weather. Reply in plain text \
with one or two short sentences that fit in a single SMS. If a question is not about farming \
or weather, say that you can only help with farming questions.";

pub const DEFAULT_MAX_REPLY_CHARS: usize = 150;

const NO_ANSWER: &str = "Sorry, I could not get a clear answer. Please try again.";

pub struct AiQueryHandler {
    generator: Option<Arc<dyn TextGenerator>>,
    max_reply_chars: usize,
}

impl AiQueryHandler {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator: Some(generator),
            max_reply_chars: DEFAULT_MAX_REPLY_CHARS,
        }
    }

    /// Handler for a deployment without a model API key.
    pub fn unconfigured() -> Self {
        Self {
            generator: None,
            max_reply_chars: DEFAULT_MAX_REPLY_CHARS,
        }
    }

    pub fn with_max_reply_chars(mut self, max: usize) -> Self {
        self.max_reply_chars = max;
        self
    }
}

#[async_trait]
impl FlowHandler for AiQueryHandler {
    fn name(&self) -> &'static str {
        "ai_query"
    }

    fn is_available(&self) -> bool {
        self.generator.is_some()
    }

    async fn resolve(&self, input: &str) -> String {
        let Some(generator) = &self.generator else {
            return "AI service is not available right now.".to_string();
        };

        let question = input.trim();
        if question.is_empty() {
            return "Please send your question after AI, for example: AI when should I plant maize?"
                .to_string();
        }

        match generator.generate(SYSTEM_INSTRUCTION, question).await {
            Ok(answer) if !answer.trim().is_empty() => {
                truncate_with_ellipsis(answer.trim(), self.max_reply_chars)
            }
            Ok(_) => {
                tracing::warn!(error_kind = "malformed_upstream_response", "AI answer was empty");
                NO_ANSWER.to_string()
            }
            Err(e) => {
                tracing::warn!(error_kind = e.kind(), error = %e, "AI query failed");
                match e {
                    Error::MalformedUpstreamResponse { .. } => NO_ANSWER.to_string(),
                    _ => "AI service is unavailable. Please try again later.".to_string(),
                }
            }
        }
    }
}
