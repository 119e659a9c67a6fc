//! Paraphrasing the composed brief through a hosted language model

use crate::config::LlmSettings;
use crate::error::{BriefError, Result};
use agent_llm::{CompletionRequest, LLMError, LLMProvider, Message};
use minijinja::{Environment, context};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

const TEMPLATE_NAME: &str = "morning_brief";

/// Prompt sent to the language model; `context` is the locally composed brief
pub const BRIEF_TEMPLATE: &str = "Summarize the following market data in a concise morning brief \
suitable for a portfolio manager:

{{ context }}

Keep it under {{ max_sentences }} sentences, focus on {{ focus }}.";

const MAX_SENTENCES: usize = 3;

/// Outcome of [`LanguageAgent::paraphrase_or_fallback`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paraphrase {
    pub text: String,
    /// False when the local text was returned unchanged
    pub paraphrased: bool,
    pub warning: Option<String>,
}

pub struct LanguageAgent {
    provider: Arc<dyn LLMProvider>,
    model: String,
    max_tokens: usize,
    temperature: Option<f32>,
    focus: String,
    templates: Environment<'static>,
}

impl LanguageAgent {
    pub fn new(provider: Arc<dyn LLMProvider>, settings: &LlmSettings) -> Result<Self> {
        let mut templates = Environment::new();
        templates.add_template(TEMPLATE_NAME, BRIEF_TEMPLATE)?;

        Ok(Self {
            provider,
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            focus: settings.focus.clone(),
            templates,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn render_prompt(&self, brief: &str) -> Result<String> {
        let template = self.templates.get_template(TEMPLATE_NAME)?;
        let prompt = template.render(context! {
            context => brief,
            max_sentences => MAX_SENTENCES,
            focus => &self.focus,
        })?;
        Ok(prompt)
    }

    /// Ask the model to rewrite `brief`
    ///
    /// Provider failures and blank answers are [`BriefError::ExternalService`].
    #[instrument(skip(self, brief), fields(provider = self.provider.name(), model = %self.model))]
    pub async fn paraphrase(&self, brief: &str) -> Result<String> {
        let prompt = self.render_prompt(brief)?;

        let mut builder = CompletionRequest::builder(&self.model)
            .add_message(Message::user(prompt))
            .max_tokens(self.max_tokens);
        if let Some(temperature) = self.temperature {
            builder = builder.temperature(temperature);
        }

        let response = self
            .provider
            .complete(builder.build())
            .await
            .map_err(|e| BriefError::external("language model", e))?;

        let text = response
            .text()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                BriefError::from(LLMError::EmptyCompletion(self.provider.name().to_string()))
            })?;

        debug!(tokens = response.usage.total(), "paraphrased brief");
        Ok(text.to_string())
    }

    /// Paraphrase, or hand back `brief` unchanged with a warning
    pub async fn paraphrase_or_fallback(&self, brief: &str) -> Paraphrase {
        match self.paraphrase(brief).await {
            Ok(text) => Paraphrase {
                text,
                paraphrased: true,
                warning: None,
            },
            Err(e) => {
                warn!(error = %e, "paraphrase failed, using composed brief");
                Paraphrase {
                    text: brief.to_string(),
                    paraphrased: false,
                    warning: Some(format!("paraphrase unavailable: {e}")),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmBackend;
    use agent_llm::{CompletionResponse, StopReason, TokenUsage};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replays a fixed answer and remembers the last request
    struct ScriptedProvider {
        answer: std::result::Result<String, String>,
        last_request: Mutex<Option<CompletionRequest>>,
    }

    impl ScriptedProvider {
        fn new(answer: std::result::Result<&str, &str>) -> Self {
            Self {
                answer: answer.map(ToString::to_string).map_err(ToString::to_string),
                last_request: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl LLMProvider for ScriptedProvider {
        async fn complete(&self, request: CompletionRequest) -> agent_llm::Result<CompletionResponse> {
            *self.last_request.lock().unwrap() = Some(request);
            match &self.answer {
                Ok(text) => Ok(CompletionResponse {
                    message: Message::assistant(text.clone()),
                    stop_reason: StopReason::EndTurn,
                    usage: TokenUsage::default(),
                }),
                Err(reason) => Err(LLMError::RequestFailed(reason.clone())),
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn agent(provider: Arc<ScriptedProvider>) -> LanguageAgent {
        LanguageAgent::new(provider, &LlmSettings::new(LlmBackend::Gemini)).unwrap()
    }

    #[test]
    fn test_render_prompt() {
        let agent = agent(Arc::new(ScriptedProvider::new(Ok("unused"))));
        let prompt = agent.render_prompt("Your Asia tech allocation is 12.0% of AUM.").unwrap();

        assert!(prompt.starts_with("Summarize the following market data"));
        assert!(prompt.contains("Your Asia tech allocation is 12.0% of AUM."));
        assert!(prompt.ends_with(
            "Keep it under 3 sentences, focus on risk exposure and earnings surprises."
        ));
    }

    #[tokio::test]
    async fn test_paraphrase_success() {
        let provider = Arc::new(ScriptedProvider::new(Ok("  Asia tech exposure rose.  ")));
        let agent = agent(Arc::clone(&provider));

        let text = agent.paraphrase("brief").await.unwrap();
        assert_eq!(text, "Asia tech exposure rose.");

        let request = provider.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(request.model, "gemini-1.5-flash-latest");
        assert_eq!(request.max_tokens, 256);
    }

    #[tokio::test]
    async fn test_blank_answer_is_external_error() {
        let agent = agent(Arc::new(ScriptedProvider::new(Ok("   "))));
        assert!(matches!(
            agent.paraphrase("brief").await,
            Err(BriefError::ExternalService { .. })
        ));
    }

    #[tokio::test]
    async fn test_fallback_keeps_local_text() {
        let agent = agent(Arc::new(ScriptedProvider::new(Err("HTTP 503"))));
        let result = agent.paraphrase_or_fallback("local brief").await;

        assert_eq!(result.text, "local brief");
        assert!(!result.paraphrased);
        assert!(result.warning.unwrap().contains("HTTP 503"));
    }

    #[test]
    fn test_fallback_blocking() {
        let agent = agent(Arc::new(ScriptedProvider::new(Ok("Rewritten."))));
        let result = tokio_test::block_on(agent.paraphrase_or_fallback("local brief"));
        assert_eq!(result.text, "Rewritten.");
        assert!(result.paraphrased);
        assert_eq!(result.warning, None);
    }
}
