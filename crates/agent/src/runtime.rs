use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use soldy_core::config::AssistantConfig;
use soldy_core::{text, ApplicationError, Catalog, Product};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::conversation::ConversationTurn;
use crate::dispatch::GUIDE_ME;
use crate::guardrails::{GuardrailDecision, GuardrailPolicy};
use crate::llm::{DecodingParams, GenerationRequest, LlmError, TextGenerator};
use crate::mentions::detect_mentioned;
use crate::postprocess::PostProcessor;
use crate::prompt::{select_context, PromptBuilder, PromptError};
use crate::session::Session;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const SIZING_KEYWORDS: &[&str] = &[
    "calcular",
    "calculo",
    "dimensionar",
    "que potencia",
    "cuanta potencia",
    "cuantos radiadores",
    "cuantos elementos",
    "cuantos modulos",
    "tamaño",
    "superficie",
    "m2",
    "m²",
    "metros",
];

/// Sizing questions get a shortcut into the guided calculation.
pub fn suggests_guided_calculation(message: &str) -> bool {
    text::contains_any(&text::fold(message), SIZING_KEYWORDS)
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("assistant unavailable: {0}")]
    AssistantUnavailable(#[source] LlmError),
    #[error(transparent)]
    Prompt(#[from] PromptError),
}

impl From<AgentError> for ApplicationError {
    fn from(error: AgentError) -> Self {
        match error {
            AgentError::AssistantUnavailable(source) => Self::AssistantUnavailable(source.to_string()),
            AgentError::Prompt(source) => Self::Configuration(source.to_string()),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AssistantReply {
    pub answer: String,
    pub products: Vec<Product>,
    pub quick_replies: Vec<String>,
    #[serde(skip)]
    pub intercepted: Option<&'static str>,
}

/// Free-text pipeline: interceptors, context selection, prompt, generation,
/// post-processing, history commit and mention detection.
pub struct AgentRuntime {
    generator: Arc<dyn TextGenerator>,
    guardrails: GuardrailPolicy,
    prompts: PromptBuilder,
    postprocessor: PostProcessor,
    decoding: DecodingParams,
    timeout: Duration,
    max_retries: u32,
}

impl AgentRuntime {
    pub fn new(generator: Arc<dyn TextGenerator>, assistant: &AssistantConfig) -> Result<Self, AgentError> {
        Ok(Self {
            generator,
            guardrails: GuardrailPolicy::from(assistant),
            prompts: PromptBuilder::new()?,
            postprocessor: PostProcessor::new(assistant.max_words),
            decoding: DecodingParams::from(assistant),
            timeout: DEFAULT_TIMEOUT,
            max_retries: 0,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn guardrails(&self) -> &GuardrailPolicy {
        &self.guardrails
    }

    pub async fn ask(
        &self,
        message: &str,
        session: &mut Session,
        catalog: &Catalog,
    ) -> Result<AssistantReply, AgentError> {
        if let GuardrailDecision::Intercept { reason_code, reply } = self.guardrails.evaluate(message) {
            info!(
                event_name = "agent.guardrail.intercepted",
                conversation_id = %session.id,
                reason_code,
                "message answered without text generation"
            );
            return Ok(AssistantReply {
                answer: reply.text,
                products: Vec::new(),
                quick_replies: reply.quick_replies,
                intercepted: Some(reason_code),
            });
        }

        let context = select_context(message, session.anchor(), catalog);
        let system_prompt =
            self.prompts.render(&context, session.history.summary(), session.anchor())?;
        let user_turn = ConversationTurn::user(message);
        let request = GenerationRequest {
            system_prompt,
            messages: session.history.window_with(&user_turn),
            decoding: self.decoding,
        };
        debug!(
            event_name = "agent.ask.prepared",
            conversation_id = %session.id,
            context_products = context.len(),
            window = request.messages.len()
        );

        let raw = self.generate_with_retries(request, session).await?;
        let answer = self.postprocessor.process(&raw);
        if answer.is_empty() {
            warn!(event_name = "agent.ask.empty_reply", conversation_id = %session.id);
            return Err(AgentError::AssistantUnavailable(LlmError::Malformed(
                "reply was empty after post-processing".to_owned(),
            )));
        }

        session.history.append(user_turn, catalog);
        session.history.append(ConversationTurn::assistant(answer.clone()), catalog);

        let products: Vec<Product> = detect_mentioned(&answer, catalog).into_iter().cloned().collect();
        if let Some(first) = products.first() {
            session.set_anchor(first.model.clone());
        }
        info!(
            event_name = "agent.ask.answered",
            conversation_id = %session.id,
            mentioned = products.len(),
            "assistant reply generated"
        );

        let quick_replies =
            if !session.questionnaire.is_active() && suggests_guided_calculation(message) {
                vec![GUIDE_ME.to_owned()]
            } else {
                Vec::new()
            };

        Ok(AssistantReply { answer, products, quick_replies, intercepted: None })
    }

    async fn generate_with_retries(
        &self,
        request: GenerationRequest,
        session: &Session,
    ) -> Result<String, AgentError> {
        let mut attempt = 0;
        loop {
            let outcome = tokio::time::timeout(self.timeout, self.generator.generate(request.clone()))
                .await
                .unwrap_or_else(|_| Err(LlmError::Timeout(self.timeout)));
            match outcome {
                Ok(response) => return Ok(response.text),
                Err(error) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        event_name = "agent.llm.retry",
                        conversation_id = %session.id,
                        provider = self.generator.name(),
                        attempt,
                        error = %error
                    );
                }
                Err(error) => {
                    warn!(
                        event_name = "agent.llm.failed",
                        conversation_id = %session.id,
                        provider = self.generator.name(),
                        error = %error,
                        "text generation failed"
                    );
                    return Err(AgentError::AssistantUnavailable(error));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use soldy_core::config::AssistantConfig;
    use soldy_core::Catalog;

    use super::{suggests_guided_calculation, AgentError, AgentRuntime};
    use crate::dispatch::GUIDE_ME;
    use crate::guardrails::PRICE_REPLY;
    use crate::session::{ConversationId, Session};
    use crate::test_support::{catalog, ScriptedGenerator};

    fn session() -> Session {
        Session::new(ConversationId::generate(), 10)
    }

    fn runtime(generator: Arc<ScriptedGenerator>) -> AgentRuntime {
        AgentRuntime::new(generator, &AssistantConfig::default()).expect("runtime")
    }

    #[tokio::test]
    async fn price_question_never_reaches_the_generator() {
        let generator = ScriptedGenerator::replying(&["no debería usarse"]);
        let runtime = runtime(generator.clone());
        let mut session = session();

        let reply = runtime
            .ask("¿Cuánto cuesta la Prima Tec Smart?", &mut session, &catalog())
            .await
            .expect("reply");

        assert_eq!(reply.answer, PRICE_REPLY);
        assert_eq!(reply.quick_replies, vec!["Río Grande", "Ushuaia"]);
        assert!(reply.products.is_empty());
        assert_eq!(generator.calls(), 0);
        assert!(session.history.is_empty());
    }

    #[tokio::test]
    async fn cooling_question_is_out_of_scope_without_products() {
        let generator = ScriptedGenerator::replying(&[]);
        let runtime = runtime(generator.clone());

        let reply = runtime
            .ask("¿tienen aire acondicionado?", &mut session(), &catalog())
            .await
            .expect("reply");

        assert_eq!(reply.intercepted, Some("cooling_out_of_scope"));
        assert!(reply.products.is_empty());
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn answer_is_cleaned_committed_and_anchors_first_mention() {
        let generator = ScriptedGenerator::replying(&[
            "**Te recomiendo la Prima Tec Smart** para tu casa de 80 m², o la Diva DS",
        ]);
        let runtime = runtime(generator.clone());
        let mut session = session();
        let catalog = catalog();

        let reply = runtime
            .ask("Necesito calefacción para 80 m²", &mut session, &catalog)
            .await
            .expect("reply");

        assert_eq!(
            reply.answer,
            "Te recomiendo la Prima Tec Smart para tu casa de 80 m², o la Diva DS."
        );
        let models: Vec<&str> = reply.products.iter().map(|p| p.model.as_str()).collect();
        assert_eq!(models, vec!["Prima Tec Smart", "Diva DS"]);
        assert_eq!(session.anchor(), Some("Prima Tec Smart"));
        assert_eq!(session.history.len(), 2);
        assert!(session.history.summary().contains("Prima Tec Smart"));

        let request = generator.last_request().expect("request recorded");
        assert!(request.system_prompt.contains("Prima Tec Smart"));
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].content, "Necesito calefacción para 80 m²");
    }

    #[tokio::test]
    async fn failure_leaves_history_untouched() {
        let generator = ScriptedGenerator::failing();
        let runtime = runtime(generator.clone());
        let mut session = session();

        let error = runtime
            .ask("¿Qué radiador me conviene?", &mut session, &catalog())
            .await
            .expect_err("generation fails");

        assert!(matches!(error, AgentError::AssistantUnavailable(_)));
        assert!(session.history.is_empty());
        assert_eq!(session.anchor(), None);
    }

    #[tokio::test]
    async fn slow_generator_times_out_and_retries_are_bounded() {
        let generator = ScriptedGenerator::stalling(Duration::from_millis(200));
        let runtime = runtime(generator.clone())
            .with_timeout(Duration::from_millis(20))
            .with_max_retries(1);

        let error = runtime
            .ask("hola, ¿qué me recomendás?", &mut session(), &Catalog::empty())
            .await
            .expect_err("timeout");

        assert!(matches!(error, AgentError::AssistantUnavailable(crate::llm::LlmError::Timeout(_))));
        assert_eq!(generator.calls(), 2);
    }

    #[tokio::test]
    async fn reply_without_marker_mentions_nothing() {
        let generator = ScriptedGenerator::replying(&["La Diva DS es doble servicio."]);
        let runtime = runtime(generator);
        let mut session = session();

        let reply = runtime
            .ask("¿La Diva DS da agua caliente?", &mut session, &catalog())
            .await
            .expect("reply");

        assert!(reply.products.is_empty());
        assert_eq!(session.anchor(), None);
        assert!(reply.quick_replies.is_empty());
    }

    #[tokio::test]
    async fn sizing_question_offers_guided_calculation() {
        let generator = ScriptedGenerator::replying(&["Te recomiendo la Diva DS.", "Te recomiendo el Broen."]);
        let runtime = runtime(generator);
        let catalog = catalog();
        let mut session = session();

        let reply = runtime
            .ask("¿Qué potencia necesito para 60 m2?", &mut session, &catalog)
            .await
            .expect("reply");
        assert_eq!(reply.quick_replies, vec![GUIDE_ME]);

        let (state, _) = soldy_core::QuestionnaireEngine::new(&catalog).start();
        session.questionnaire = state;
        let during = runtime
            .ask("¿Cuántos radiadores entran en esa superficie?", &mut session, &catalog)
            .await
            .expect("reply");
        assert!(during.quick_replies.is_empty());
    }

    #[test]
    fn sizing_keywords_ignore_accents_and_case() {
        assert!(suggests_guided_calculation("¿Cómo CALCULO la caldera?"));
        assert!(suggests_guided_calculation("tengo 45 metros cuadrados"));
        assert!(!suggests_guided_calculation("¿La Diva DS da agua caliente?"));
    }
}
