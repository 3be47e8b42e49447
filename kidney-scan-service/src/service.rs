use std::sync::Arc;

use axum::{
    Form, Router,
    extract::{Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use chrono::Local;
use scan_flow::{InMemorySessionStore, Pipeline, Session, SessionStore};
use serde_json::{Value, json};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    chatbot::{ChatService, FastEmbedder, KnowledgeIndex},
    config::ServiceConfig,
    inference::{Classifier, Localizer, OnnxClassifier, OnnxLocalizer},
    models::{AnalysisOutcome, ChatRequest, RiskQuizForm},
    risk::{RiskError, RiskPredictor},
    stages::{AnalysisContext, build_analysis_pipeline},
    uploads, views,
};

pub const SESSION_COOKIE: &str = "sid";

type ApiError = (StatusCode, Json<Value>);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

/// Immutable service objects created once at startup and shared across
/// requests; handlers receive them through this state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub sessions: Arc<dyn SessionStore<AnalysisOutcome>>,
    pub analysis: Arc<Pipeline<AnalysisContext>>,
    pub chat: Arc<ChatService>,
    pub risk: Arc<RiskPredictor>,
}

/// Load every model artifact and assemble the router. Fails fast when an
/// artifact is missing or malformed.
pub async fn create_app(config: ServiceConfig) -> anyhow::Result<Router> {
    let classifier: Arc<dyn Classifier> = Arc::new(OnnxClassifier::load(&config.classifier_model)?);
    let localizer: Arc<dyn Localizer> = Arc::new(OnnxLocalizer::load(&config.detector_model)?);
    let risk = Arc::new(RiskPredictor::load(&config.risk_model, &config.risk_scaler)?);

    let index = KnowledgeIndex::load(&config.knowledge_docs, &config.knowledge_vectors)?;
    let chat = Arc::new(ChatService::new(Arc::new(FastEmbedder::init()?), index));

    let analysis = Arc::new(build_analysis_pipeline(
        classifier,
        localizer,
        config.localized_dir.clone(),
    ));

    let state = AppState {
        config: Arc::new(config),
        sessions: Arc::new(InMemorySessionStore::new()),
        analysis,
        chat,
        risk,
    };

    Ok(build_router(state))
}

pub fn build_router(state: AppState) -> Router {
    let static_dir = state.config.static_dir.clone();

    Router::new()
        .route("/", get(upload_form_view).post(submit_scan))
        .route("/results", get(results_view))
        .route("/pdf_preview", get(pdf_preview_view))
        .route("/chat", post(chat_message))
        .route("/risk-quiz", get(risk_quiz_view).post(risk_quiz_submit))
        .route("/api/localized-images", get(localized_images))
        .route("/health", get(health_check))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn session_id(jar: &CookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE).map(|c| c.value().to_string())
}

fn ensure_session(jar: CookieJar) -> (CookieJar, String) {
    if let Some(id) = session_id(&jar) {
        return (jar, id);
    }
    let id = Uuid::new_v4().to_string();
    let mut cookie = Cookie::new(SESSION_COOKIE, id.clone());
    cookie.set_path("/");
    (jar.add(cookie), id)
}

async fn current_outcome(state: &AppState, jar: &CookieJar) -> Option<AnalysisOutcome> {
    let sid = session_id(jar)?;
    state
        .sessions
        .get(&sid)
        .await
        .ok()
        .flatten()
        .map(|session| session.state)
}

async fn upload_form_view(State(state): State<AppState>, jar: CookieJar) -> Html<String> {
    let label = current_outcome(&state, &jar)
        .await
        .map(|outcome| outcome.label.to_string());
    Html(views::upload_form(label.as_deref(), None))
}

struct Upload {
    filename: String,
    bytes: Vec<u8>,
}

async fn read_image_field(mut multipart: Multipart) -> anyhow::Result<Option<Upload>> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("image") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        if filename.is_empty() {
            return Ok(None);
        }
        let bytes = field.bytes().await?.to_vec();
        if bytes.is_empty() {
            return Ok(None);
        }
        return Ok(Some(Upload { filename, bytes }));
    }
    Ok(None)
}

async fn submit_scan(
    State(state): State<AppState>,
    jar: CookieJar,
    multipart: Multipart,
) -> Response {
    let (jar, sid) = ensure_session(jar);

    // Drop whatever the previous upload left behind before touching anything
    if let Err(err) = state.sessions.delete(&sid).await {
        error!("Failed to clear session {sid}: {err}");
    }

    let upload = match read_image_field(multipart).await {
        Ok(Some(upload)) => upload,
        Ok(None) => {
            let form = views::upload_form(None, Some("No image selected."));
            return (jar, Html(form)).into_response();
        }
        Err(err) => {
            error!("Error reading upload: {err:#}");
            let form = views::upload_form(None, Some("Processing failed."));
            return (jar, Html(form)).into_response();
        }
    };

    match run_analysis(&state, &sid, &upload.filename, &upload.bytes).await {
        Ok(outcome) => {
            info!(
                "Processed image - Label: {}, Boxes: {:?}",
                outcome.label,
                outcome.boxes()
            );
            (jar, Redirect::to("/results")).into_response()
        }
        Err(err) => {
            error!("Error processing image: {err:#}");
            let form = views::upload_form(None, Some("Processing failed."));
            (jar, Html(form)).into_response()
        }
    }
}

/// The full upload pipeline. The session is written exactly once, after
/// everything has succeeded; a failure anywhere leaves no partial state.
async fn run_analysis(
    state: &AppState,
    sid: &str,
    filename: &str,
    bytes: &[u8],
) -> anyhow::Result<AnalysisOutcome> {
    let safe_name = uploads::sanitize_filename(filename);
    let image = image::load_from_memory(bytes)?;
    uploads::persist_upload(&state.config.upload_dir, &safe_name, image.clone()).await?;

    let mut ctx = AnalysisContext::new(image, safe_name);
    state.analysis.run(&mut ctx).await?;
    let outcome = ctx.into_outcome()?;

    state
        .sessions
        .save(Session::new(sid, outcome.clone()))
        .await?;

    Ok(outcome)
}

async fn results_view(State(state): State<AppState>, jar: CookieJar) -> Response {
    let Some(outcome) = current_outcome(&state, &jar).await else {
        return Redirect::to("/").into_response();
    };

    info!(
        "Results - Label: {}, Regions: {:?}, Image URL: {:?}",
        outcome.label,
        outcome.regions(),
        outcome.localized_image_url()
    );

    let current_time = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    Html(views::results(&outcome, &current_time)).into_response()
}

async fn pdf_preview_view(State(state): State<AppState>, jar: CookieJar) -> Response {
    let Some(outcome) = current_outcome(&state, &jar).await else {
        return Redirect::to("/").into_response();
    };

    info!(
        "PDF Preview - Label: {}, Regions: {:?}, Image URL: {:?}",
        outcome.label,
        outcome.regions(),
        outcome.localized_image_url()
    );

    let current_time = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    Html(views::pdf_preview(&outcome, &current_time)).into_response()
}

async fn chat_message(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<Value> {
    let message = request
        .message
        .as_deref()
        .map(str::trim)
        .filter(|message| !message.is_empty());

    let Some(message) = message else {
        return Err(bad_request_error("No message provided"));
    };

    match state.chat.respond(message).await {
        Ok(reply) => Ok(Json(json!({ "response": { "text": reply.text } }))),
        Err(err) => {
            error!("Chat processing failed: {err:#}");
            Err(internal_error("Chat processing failed", &err.to_string()))
        }
    }
}

async fn risk_quiz_view() -> Html<String> {
    Html(views::risk_quiz(None, None))
}

async fn risk_quiz_submit(
    State(state): State<AppState>,
    Form(form): Form<RiskQuizForm>,
) -> Html<String> {
    match state.risk.assess(&form) {
        Ok(assessment) => Html(views::risk_quiz(Some(&assessment), None)),
        Err(RiskError::Validation(message)) => Html(views::risk_quiz(None, Some(&message))),
        Err(err) => {
            error!("Risk prediction failed: {err}");
            Html(views::risk_quiz(None, Some("Prediction failed.")))
        }
    }
}

async fn localized_images(State(state): State<AppState>) -> ApiResult<Vec<String>> {
    match uploads::list_localized_images(&state.config.localized_dir).await {
        Ok(files) => Ok(Json(files)),
        Err(err) => {
            error!("Failed to list localized images: {err:#}");
            Err(internal_error(
                "Failed to list localized images",
                &err.to_string(),
            ))
        }
    }
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}
