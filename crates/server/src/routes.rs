//! HTTP surface for the widget and for remote questionnaire clients.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use soldy_agent::{AgentRuntime, ConversationId, DispatchReply, Dispatcher, Mode, UserIntent};
use soldy_core::{
    Answer, ApplicationError, Catalog, CatalogFilter, DomainError, InterfaceError, NodeResponse,
    Product, ProductFamily, QuestionnaireEngine, Recommendation, RecommendationRequest,
    Recommender,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::sessions::SessionStore;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub runtime: Arc<AgentRuntime>,
    pub sessions: Arc<SessionStore>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/start", post(start))
        .route("/reply", post(reply))
        .route("/chat", post(chat))
        .route("/message", post(message))
        .route("/recommend", post(recommend))
        .route("/catalog", get(catalog))
        .route("/catalog/families", get(families))
        .with_state(state)
}

#[derive(Debug)]
pub struct ApiError(InterfaceError);

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    correlation_id: String,
}

impl ApiError {
    fn new(error: ApplicationError, correlation_id: &str) -> Self {
        Self(error.into_interface(correlation_id))
    }

    fn bad_request(reason: impl Into<String>, correlation_id: &str) -> Self {
        Self::new(DomainError::InvariantViolation(reason.into()).into(), correlation_id)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::Conflict { .. } => StatusCode::CONFLICT,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        warn!(
            event_name = "server.request.rejected",
            correlation_id = self.0.correlation_id(),
            status = status.as_u16(),
            error = %self.0
        );
        let body = ErrorBody {
            error: self.0.user_message(),
            correlation_id: self.0.correlation_id().to_owned(),
        };
        (status, Json(body)).into_response()
    }
}

fn correlation_id() -> String {
    Uuid::new_v4().to_string()
}

fn conversation_id(raw: &str, correlation_id: &str) -> Result<ConversationId, ApiError> {
    ConversationId::parse(raw)
        .ok_or_else(|| ApiError::bad_request("conversation_id must not be empty", correlation_id))
}

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub conversation_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ReplyRequest {
    pub conversation_id: String,
    #[serde(default)]
    pub option_index: Option<usize>,
    #[serde(default)]
    pub input_values: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub conversation_id: ConversationId,
    #[serde(flatten)]
    pub node: NodeResponse,
}

pub async fn start(
    State(state): State<AppState>,
    Json(request): Json<StartRequest>,
) -> Result<Json<ConversationResponse>, ApiError> {
    let correlation_id = correlation_id();
    let id = conversation_id(&request.conversation_id, &correlation_id)?;
    let mut session =
        state.sessions.acquire(&id).map_err(|error| ApiError::new(error, &correlation_id))?;

    let (questionnaire, node) = QuestionnaireEngine::new(&state.catalog).start();
    session.questionnaire = questionnaire;
    session.mode = Mode::Guided;
    info!(
        event_name = "server.questionnaire.started",
        correlation_id = %correlation_id,
        conversation_id = %id
    );

    Ok(Json(ConversationResponse { conversation_id: id, node }))
}

/// Advances the questionnaire by one step. A rejected answer is not an HTTP
/// error: the reprompt node comes back with 200.
pub async fn reply(
    State(state): State<AppState>,
    Json(request): Json<ReplyRequest>,
) -> Result<Json<ConversationResponse>, ApiError> {
    let correlation_id = correlation_id();
    let id = conversation_id(&request.conversation_id, &correlation_id)?;
    let mut session =
        state.sessions.acquire(&id).map_err(|error| ApiError::new(error, &correlation_id))?;
    let engine = QuestionnaireEngine::new(&state.catalog);

    let answer = match (request.option_index, request.input_values) {
        (Some(index), _) => {
            let options = engine.prompt(&session.questionnaire).options.unwrap_or_default();
            let label = options.get(index).ok_or_else(|| {
                ApiError::bad_request(
                    format!("option_index {index} is out of range ({} options)", options.len()),
                    &correlation_id,
                )
            })?;
            Answer::text(label.clone())
        }
        (None, Some(values)) => Answer::Values(values),
        (None, None) => {
            return Err(ApiError::bad_request(
                "either option_index or input_values is required",
                &correlation_id,
            ))
        }
    };

    let step = session.questionnaire.current_step;
    let node = match engine.handle_answer(&session.questionnaire, step, &answer) {
        Ok(outcome) => {
            session.questionnaire = outcome.state;
            if let Some(recommendation) = &outcome.response.recommendation {
                session.set_anchor(recommendation.product.model.clone());
            }
            if outcome.response.is_final {
                session.mode = Mode::Menu;
            }
            outcome.response
        }
        Err(error) => match error.reprompt() {
            Some(reprompt) => reprompt.clone(),
            None => {
                return Err(ApiError::new(DomainError::from(error).into(), &correlation_id));
            }
        },
    };

    Ok(Json(ConversationResponse { conversation_id: id, node }))
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub question: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub answer: String,
    pub products: Vec<Product>,
    pub quick_replies: Vec<String>,
    pub conversation_id: ConversationId,
}

pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let correlation_id = correlation_id();
    let question = request.question.trim();
    if question.is_empty() {
        return Err(ApiError::bad_request("question must not be empty", &correlation_id));
    }
    let id = request
        .conversation_id
        .as_deref()
        .and_then(ConversationId::parse)
        .unwrap_or_else(ConversationId::generate);

    let mut session =
        state.sessions.acquire(&id).map_err(|error| ApiError::new(error, &correlation_id))?;
    session.mode = Mode::Chat;
    let reply = state
        .runtime
        .ask(question, &mut session, &state.catalog)
        .await
        .map_err(|error| ApiError::new(error.into(), &correlation_id))?;

    Ok(Json(ChatResponse {
        answer: reply.answer,
        products: reply.products,
        quick_replies: reply.quick_replies,
        conversation_id: id,
    }))
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub conversation_id: String,
    #[serde(default)]
    pub intent: Option<UserIntent>,
    #[serde(default)]
    pub option: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub conversation_id: ConversationId,
    #[serde(flatten)]
    pub reply: DispatchReply,
}

/// Unified widget endpoint: a typed intent, or a clicked option label that is
/// resolved against the session's current mode.
pub async fn message(
    State(state): State<AppState>,
    Json(request): Json<MessageRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let correlation_id = correlation_id();
    let id = conversation_id(&request.conversation_id, &correlation_id)?;
    let mut session =
        state.sessions.acquire(&id).map_err(|error| ApiError::new(error, &correlation_id))?;

    let intent = match (request.intent, request.option) {
        (Some(intent), _) => intent,
        (None, Some(option)) => UserIntent::from_option(&session, &option),
        (None, None) => UserIntent::OpenMenu,
    };
    let reply = Dispatcher::new(&state.runtime, &state.catalog).handle(&mut session, intent).await;

    Ok(Json(MessageResponse { conversation_id: id, reply }))
}

#[derive(Debug, Deserialize)]
pub struct RecommendRequest {
    #[serde(flatten)]
    pub request: RecommendationRequest,
    #[serde(default)]
    pub options: bool,
}

#[derive(Debug, Serialize)]
pub struct RecommendResponse {
    pub recommendations: Vec<Recommendation>,
}

pub async fn recommend(
    State(state): State<AppState>,
    Json(body): Json<RecommendRequest>,
) -> Result<Json<RecommendResponse>, ApiError> {
    let correlation_id = correlation_id();
    if state.catalog.is_empty() {
        return Err(ApiError::new(
            ApplicationError::CatalogUnavailable("catalog is empty".to_owned()),
            &correlation_id,
        ));
    }

    let recommender = Recommender::new(&state.catalog);
    let recommendations = if body.options {
        recommender.recommend_options(&body.request)
    } else {
        recommender.recommend(&body.request).into_iter().collect()
    };
    Ok(Json(RecommendResponse { recommendations }))
}

#[derive(Debug, Default, Deserialize)]
pub struct CatalogQuery {
    #[serde(default)]
    pub family: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    pub count: usize,
    pub products: Vec<Product>,
}

pub async fn catalog(
    State(state): State<AppState>,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<CatalogResponse>, ApiError> {
    let correlation_id = correlation_id();
    let family = match query.family.as_deref() {
        Some(raw) => Some(ProductFamily::parse(raw).ok_or_else(|| {
            ApiError::bad_request(format!("unknown product family `{raw}`"), &correlation_id)
        })?),
        None => None,
    };
    let filter = CatalogFilter { family, category: query.category, query: query.q };
    let products: Vec<Product> = state.catalog.filter(&filter).into_iter().cloned().collect();

    Ok(Json(CatalogResponse { count: products.len(), products }))
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct FamilySummary {
    pub family: ProductFamily,
    pub label: &'static str,
    pub count: usize,
}

pub async fn families(State(state): State<AppState>) -> Json<Vec<FamilySummary>> {
    let summaries = state
        .catalog
        .families()
        .into_iter()
        .map(|family| FamilySummary {
            family,
            label: family.label(),
            count: state.catalog.by_family(family).len(),
        })
        .collect();
    Json(summaries)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use soldy_agent::AgentRuntime;
    use soldy_core::config::AssistantConfig;
    use soldy_core::Catalog;
    use tower::ServiceExt;

    use super::{router, AppState};
    use crate::sessions::SessionStore;
    use crate::test_support::{catalog, ScriptedGenerator};

    fn app_with(catalog: Catalog, replies: &[&str]) -> Router {
        let runtime = AgentRuntime::new(ScriptedGenerator::replying(replies), &AssistantConfig::default())
            .expect("runtime");
        router(AppState {
            catalog: Arc::new(catalog),
            runtime: Arc::new(runtime),
            sessions: Arc::new(SessionStore::new(10)),
        })
    }

    fn app(replies: &[&str]) -> Router {
        app_with(catalog(), replies)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        };
        let response = app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, value)
    }

    #[tokio::test]
    async fn remote_questionnaire_runs_start_to_recommendation() {
        let app = app(&[]);
        let (status, started) = send(&app, "POST", "/start", Some(json!({"conversation_id": "c-1"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(started["conversation_id"], "c-1");
        assert_eq!(started["options"][0], "Piso radiante");

        let steps = [
            json!({"conversation_id": "c-1", "option_index": 0}),
            json!({"conversation_id": "c-1", "input_values": {"area_m2": "80"}}),
            json!({"conversation_id": "c-1", "option_index": 1}),
            json!({"conversation_id": "c-1", "option_index": 0}),
        ];
        let mut last = Value::Null;
        for step in steps {
            let (status, body) = send(&app, "POST", "/reply", Some(step)).await;
            assert_eq!(status, StatusCode::OK, "{body}");
            last = body;
        }

        assert_eq!(last["is_final"], true);
        assert_eq!(last["recommendation"]["product"]["model"], "Prima Tec Smart");
    }

    #[tokio::test]
    async fn invalid_number_reprompts_with_ok_status() {
        let app = app(&[]);
        send(&app, "POST", "/start", Some(json!({"conversation_id": "c-2"}))).await;
        send(&app, "POST", "/reply", Some(json!({"conversation_id": "c-2", "option_index": 0}))).await;

        let (status, body) = send(
            &app,
            "POST",
            "/reply",
            Some(json!({"conversation_id": "c-2", "input_values": {"area_m2": "-5"}})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["is_final"], false);
        assert_eq!(body["input_type"], "number");
    }

    #[tokio::test]
    async fn reply_rejects_out_of_range_option_and_unstarted_conversation() {
        let app = app(&[]);
        let (status, body) =
            send(&app, "POST", "/reply", Some(json!({"conversation_id": "nuevo", "input_values": {}})))
                .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["correlation_id"].as_str().is_some_and(|id| !id.is_empty()));

        send(&app, "POST", "/start", Some(json!({"conversation_id": "c-3"}))).await;
        let (status, _) =
            send(&app, "POST", "/reply", Some(json!({"conversation_id": "c-3", "option_index": 9})))
                .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn chat_answers_and_assigns_conversation_id() {
        let app = app(&["Para 80 m² te recomiendo la Prima Tec Smart"]);

        let (status, body) =
            send(&app, "POST", "/chat", Some(json!({"question": "¿Qué caldera me conviene?"}))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], "Para 80 m² te recomiendo la Prima Tec Smart.");
        assert_eq!(body["products"][0]["model"], "Prima Tec Smart");
        assert!(body["conversation_id"].as_str().is_some_and(|id| !id.is_empty()));
    }

    #[tokio::test]
    async fn chat_price_question_is_intercepted_and_empty_question_rejected() {
        let app = app(&[]);

        let (status, body) =
            send(&app, "POST", "/chat", Some(json!({"question": "precio de la Diva", "conversation_id": "p"})))
                .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["quick_replies"], json!(["Río Grande", "Ushuaia"]));
        assert_eq!(body["conversation_id"], "p");

        let (status, _) = send(&app, "POST", "/chat", Some(json!({"question": "   "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn chat_generation_failure_is_service_unavailable() {
        let app = app(&[]);

        let (status, body) =
            send(&app, "POST", "/chat", Some(json!({"question": "¿Qué radiador me conviene?"}))).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            body["error"],
            "Lo siento, hubo un error al procesar tu consulta. Por favor, intenta nuevamente."
        );
    }

    #[tokio::test]
    async fn message_resolves_options_by_session_mode() {
        let app = app(&[]);

        let (_, menu) = send(&app, "POST", "/message", Some(json!({"conversation_id": "m"}))).await;
        assert_eq!(menu["mode"], "menu");
        assert_eq!(menu["options"][2], "Buscar productos");

        let (_, categories) =
            send(&app, "POST", "/message", Some(json!({"conversation_id": "m", "option": "Buscar productos"})))
                .await;
        assert_eq!(categories["mode"], "catalog");
        assert_eq!(categories["options"].as_array().map(Vec::len), Some(7));

        let (status, radiators) = send(
            &app,
            "POST",
            "/message",
            Some(json!({"conversation_id": "m", "intent": {"type": "browse_family", "value": "Radiadores"}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(radiators["products"].as_array().is_some_and(|products| !products.is_empty()));
    }

    #[tokio::test]
    async fn catalog_filters_and_rejects_unknown_family() {
        let app = app(&[]);

        let (status, body) = send(&app, "GET", "/catalog?family=Calderas&q=prima", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["count"].as_u64().is_some_and(|count| count >= 1));
        assert!(body["products"]
            .as_array()
            .is_some_and(|products| products.iter().all(|p| p["family"] == "Boilers")));

        let (status, _) = send(&app, "GET", "/catalog?family=Heladeras", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn families_report_counts() {
        let app = app(&[]);

        let (status, body) = send(&app, "GET", "/catalog/families", None).await;

        assert_eq!(status, StatusCode::OK);
        let families = body.as_array().expect("array");
        assert!(!families.is_empty());
        let total: u64 = families.iter().filter_map(|f| f["count"].as_u64()).sum();
        assert_eq!(total, 35);
    }

    #[tokio::test]
    async fn recommend_returns_options_and_needs_a_catalog() {
        let app = app(&[]);
        let (status, body) = send(
            &app,
            "POST",
            "/recommend",
            Some(json!({"kind": "floor_heating", "area_m2": 80.0, "options": true})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["recommendations"][0]["product"]["model"], "Prima Tec Smart");

        let empty = app_with(Catalog::empty(), &[]);
        let (status, _) =
            send(&empty, "POST", "/recommend", Some(json!({"kind": "towel_warmer"}))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
