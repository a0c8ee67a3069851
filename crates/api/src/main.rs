use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use montres_core::domain::preferences::{
    Budget, Choice, Complication, Movement, Style, Usage, UserPreferences, WristSize,
};
use montres_core::domain::recommendation::Recommendation;
use montres_core::llm::gemini::GeminiClient;
use montres_core::llm::LlmClient;
use montres_core::wizard::{
    PendingRequest, WizardAction, WizardController, WizardEvent, WizardState,
};

const DEFAULT_SESSION_IDLE_SECS: u64 = 30 * 60;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = montres_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let llm: Option<Arc<dyn LlmClient>> = match GeminiClient::from_settings(&settings) {
        Ok(client) => {
            tracing::info!(model = client.model(), "gemini client ready");
            Some(Arc::new(client) as Arc<dyn LlmClient>)
        }
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "gemini client unavailable; starting API in degraded mode");
            None
        }
    };

    let state = AppState::new(llm);
    let session_idle = std::env::var("SESSION_IDLE_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(DEFAULT_SESSION_IDLE_SECS));
    tokio::spawn(sweep_idle_sessions(state.clone(), session_idle));

    let app = app(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/options", get(get_options))
        .route("/recommendations", post(post_recommendations))
        .route("/sessions", post(create_session))
        .route("/sessions/:session_id", get(get_session).delete(delete_session))
        .route("/sessions/:session_id/actions", post(post_action))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

type Session = Arc<Mutex<WizardController>>;

struct SessionSlot {
    wizard: Session,
    touched: Instant,
}

impl SessionSlot {
    fn new(wizard: WizardController) -> Self {
        Self {
            wizard: Arc::new(Mutex::new(wizard)),
            touched: Instant::now(),
        }
    }

    /// Locked or loading means a search is running against it.
    fn is_busy(&self) -> bool {
        self.wizard
            .try_lock()
            .map(|wizard| wizard.is_loading())
            .unwrap_or(true)
    }
}

#[derive(Clone)]
struct AppState {
    llm: Option<Arc<dyn LlmClient>>,
    sessions: Arc<RwLock<HashMap<Uuid, SessionSlot>>>,
}

impl AppState {
    fn new(llm: Option<Arc<dyn LlmClient>>) -> Self {
        Self {
            llm,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    async fn session(&self, session_id: Uuid) -> Result<Session, StatusCode> {
        let mut sessions = self.sessions.write().await;
        let slot = sessions.get_mut(&session_id).ok_or(StatusCode::NOT_FOUND)?;
        slot.touched = Instant::now();
        Ok(slot.wizard.clone())
    }

    /// Drops sessions untouched for at least `max_idle`, sparing busy ones.
    async fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, slot| slot.touched.elapsed() < max_idle || slot.is_busy());
        before - sessions.len()
    }
}

async fn sweep_idle_sessions(state: AppState, max_idle: Duration) {
    let period = max_idle.clamp(Duration::from_secs(1), Duration::from_secs(60));
    let mut ticker = tokio::time::interval(period);
    loop {
        ticker.tick().await;
        let evicted = state.evict_idle(max_idle).await;
        if evicted > 0 {
            tracing::info!(evicted, "idle sessions evicted");
        }
    }
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
struct OptionView {
    label: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'static str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OptionsResponse {
    styles: Vec<OptionView>,
    complications: Vec<OptionView>,
    budgets: Vec<OptionView>,
    movements: Vec<OptionView>,
    usages: Vec<OptionView>,
    wrist_sizes: Vec<OptionView>,
}

fn option_views<T: Choice>(describe: impl Fn(T) -> Option<&'static str>) -> Vec<OptionView> {
    T::ALL
        .iter()
        .map(|c| OptionView {
            label: c.label(),
            description: describe(*c),
        })
        .collect()
}

async fn get_options() -> Json<OptionsResponse> {
    Json(OptionsResponse {
        styles: option_views(|_: Style| None),
        complications: option_views(|c: Complication| Some(c.description())),
        budgets: option_views(|_: Budget| None),
        movements: option_views(|m: Movement| Some(m.explanation())),
        usages: option_views(|_: Usage| None),
        wrist_sizes: option_views(|_: WristSize| None),
    })
}

async fn post_recommendations(
    State(state): State<AppState>,
    Json(preferences): Json<UserPreferences>,
) -> Result<Json<Recommendation>, StatusCode> {
    let Some(llm) = &state.llm else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let recommendation = llm
        .fetch_recommendations(&preferences)
        .await
        .map_err(|e| {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %format!("{e:#}"), "one-shot recommendation failed");
            StatusCode::BAD_GATEWAY
        })?;

    Ok(Json(recommendation))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionView {
    session_id: Uuid,
    state: WizardState,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    notifications: Vec<String>,
}

async fn create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SessionView>), StatusCode> {
    let Some(llm) = &state.llm else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let session_id = Uuid::new_v4();
    let wizard = WizardController::new(llm.clone());
    let view = SessionView {
        session_id,
        state: wizard.snapshot(),
        notifications: Vec::new(),
    };

    state
        .sessions
        .write()
        .await
        .insert(session_id, SessionSlot::new(wizard));
    tracing::info!(%session_id, "session created");

    Ok((StatusCode::CREATED, Json(view)))
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionView>, StatusCode> {
    let session = state.session(session_id).await?;
    let wizard = session.lock().await;

    Ok(Json(SessionView {
        session_id,
        state: wizard.snapshot(),
        notifications: Vec::new(),
    }))
}

async fn post_action(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(action): Json<WizardAction>,
) -> Result<Json<SessionView>, StatusCode> {
    let session = state.session(session_id).await?;

    let (mut events, pending) = {
        let mut wizard = session.lock().await;
        let events = wizard.subscribe();
        let pending = if matches!(action, WizardAction::Advance) {
            wizard.begin_request()
        } else {
            None
        };
        if pending.is_none() {
            wizard.apply(action).await;
        }
        (events, pending)
    };

    // The search settles the session on its own task, unlocked, whether or
    // not this request is still around to read the outcome.
    if let Some(pending) = pending {
        tokio::spawn(run_search(session.clone(), pending))
            .await
            .map_err(|e| {
                tracing::error!(%session_id, error = %e, "search task failed");
                StatusCode::INTERNAL_SERVER_ERROR
            })?;
    }

    let wizard = session.lock().await;
    let mut notifications = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let WizardEvent::Notification { message } = event {
            notifications.push(message);
        }
    }

    Ok(Json(SessionView {
        session_id,
        state: wizard.snapshot(),
        notifications,
    }))
}

async fn run_search(session: Session, pending: PendingRequest) {
    let outcome = pending.run().await;
    if let Err(e) = &outcome {
        sentry_anyhow::capture_anyhow(e);
    }
    session.lock().await.finish_request(&pending, outcome);
}

async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> StatusCode {
    match state.sessions.write().await.remove(&session_id) {
        Some(_) => {
            tracing::info!(%session_id, "session closed");
            StatusCode::NO_CONTENT
        }
        None => StatusCode::NOT_FOUND,
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &montres_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
