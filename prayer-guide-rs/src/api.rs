//! Local HTTP command API driving the prayer session.
//!
//! Every route locks the single `SessionOrchestrator`, so actions are
//! applied in arrival order. Binds to 127.0.0.1 only.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{SaveError, ScriptureError, SettingsError};
use crate::playback::PlaybackSnapshot;
use crate::prompts::PrayerMode;
use crate::reflection::ReflectionDraft;
use crate::scripture::ScripturePassage;
use crate::session::{PrayerView, RecalledSession, SessionOrchestrator, SessionSummary};
use crate::settings::{Settings, Theme};
use crate::store::SavedSession;

pub type ApiState = Arc<Mutex<SessionOrchestrator>>;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<SimpleResponse>)>;

// --- Request/Response types ---

#[derive(Deserialize)]
struct EditRequest {
    text: String,
}

#[derive(Deserialize)]
struct SignInRequest {
    user: String,
}

#[derive(Deserialize)]
struct ScriptureQuery {
    reference: String,
}

/// Partial settings update; absent fields keep their current value.
#[derive(Debug, Default, Deserialize)]
struct SettingsUpdate {
    category_order: Option<Vec<String>>,
    pause_secs: Option<u32>,
    play_bell: Option<bool>,
    mode: Option<PrayerMode>,
    theme: Option<Theme>,
    keep_awake: Option<bool>,
}

impl SettingsUpdate {
    fn apply_to(self, current: &Settings) -> Settings {
        Settings {
            category_order: self
                .category_order
                .unwrap_or_else(|| current.category_order.clone()),
            pause_secs: self.pause_secs.unwrap_or(current.pause_secs),
            play_bell: self.play_bell.unwrap_or(current.play_bell),
            mode: self.mode.unwrap_or(current.mode),
            theme: self.theme.unwrap_or(current.theme),
            keep_awake: self.keep_awake.unwrap_or(current.keep_awake),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SimpleResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SimpleResponse {
    fn ok(status: &str) -> Json<Self> {
        Json(Self {
            status: status.into(),
            error: None,
        })
    }

    fn err(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            status: "error".into(),
            error: Some(message.into()),
        })
    }
}

fn reject(code: StatusCode, message: impl Into<String>) -> (StatusCode, Json<SimpleResponse>) {
    let message = message.into();
    warn!("API request rejected ({code}): {message}");
    (code, SimpleResponse::err(message))
}

fn unknown_category(category: &str) -> (StatusCode, Json<SimpleResponse>) {
    reject(
        StatusCode::NOT_FOUND,
        format!("No active category named {category}"),
    )
}

fn parse_date(date: &str) -> Result<NaiveDate, (StatusCode, Json<SimpleResponse>)> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| reject(StatusCode::BAD_REQUEST, format!("Invalid date: {date}")))
}

/// Build the axum router.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/status", get(handle_status))
        .route("/playback", get(handle_playback))
        .route("/reload", post(handle_reload))
        .route("/regenerate", post(handle_regenerate))
        .route("/prompts/{category}/refresh", post(handle_refresh))
        .route("/prompts/{category}/back", post(handle_back))
        .route("/reflections/{category}", put(handle_edit_reflection))
        .route("/reflections/{category}/toggle", post(handle_toggle_reflection))
        .route("/reflections/{category}/lock", post(handle_lock_reflection))
        .route("/play", post(handle_play))
        .route("/pause", post(handle_pause))
        .route("/stop", post(handle_stop))
        .route("/save", post(handle_save))
        .route("/calendar/{year}/{month}", get(handle_calendar))
        .route("/sessions/{date}", get(handle_day_sessions))
        .route("/sessions/{date}/{id}", get(handle_open_session))
        .route("/scripture", get(handle_scripture))
        .route("/settings", get(handle_get_settings).put(handle_put_settings))
        .route("/sign-in", post(handle_sign_in))
        .route("/sign-out", post(handle_sign_out))
        .with_state(state)
}

/// Start the command API as a background tokio task.
pub async fn start_api(state: ApiState, port: u16) -> bool {
    let app = router(state);
    let addr = format!("127.0.0.1:{port}");
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            warn!("Failed to bind command API on {addr}: {e}");
            return false;
        }
    };
    info!("Command API listening on {addr}");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            warn!("Command API server error: {e}");
        }
    });
    true
}

// --- Handlers ---

async fn handle_status(State(state): State<ApiState>) -> Json<PrayerView> {
    Json(state.lock().await.view())
}

async fn handle_playback(State(state): State<ApiState>) -> Json<PlaybackSnapshot> {
    Json(state.lock().await.engine().snapshot())
}

async fn handle_reload(State(state): State<ApiState>) -> ApiResult<PrayerView> {
    let mut session = state.lock().await;
    session
        .reload()
        .await
        .map_err(|e| reject(StatusCode::BAD_GATEWAY, format!("Error loading prayer data: {e}")))?;
    Ok(Json(session.view()))
}

async fn handle_regenerate(State(state): State<ApiState>) -> Json<PrayerView> {
    let mut session = state.lock().await;
    session.regenerate();
    Json(session.view())
}

async fn handle_refresh(
    State(state): State<ApiState>,
    Path(category): Path<String>,
) -> ApiResult<PrayerView> {
    let mut session = state.lock().await;
    if !session.refresh(&category) {
        return Err(unknown_category(&category));
    }
    Ok(Json(session.view()))
}

async fn handle_back(
    State(state): State<ApiState>,
    Path(category): Path<String>,
) -> ApiResult<PrayerView> {
    let mut session = state.lock().await;
    if !session.back(&category) {
        return Err(reject(
            StatusCode::CONFLICT,
            format!("No earlier prompt for {category}"),
        ));
    }
    Ok(Json(session.view()))
}

async fn handle_toggle_reflection(
    State(state): State<ApiState>,
    Path(category): Path<String>,
) -> ApiResult<ReflectionDraft> {
    let mut session = state.lock().await;
    session
        .toggle_reflection(&category)
        .map(Json)
        .ok_or_else(|| unknown_category(&category))
}

async fn handle_edit_reflection(
    State(state): State<ApiState>,
    Path(category): Path<String>,
    Json(req): Json<EditRequest>,
) -> ApiResult<ReflectionDraft> {
    let mut session = state.lock().await;
    session
        .edit_reflection(&category, &req.text)
        .map(Json)
        .ok_or_else(|| unknown_category(&category))
}

async fn handle_lock_reflection(
    State(state): State<ApiState>,
    Path(category): Path<String>,
) -> ApiResult<ReflectionDraft> {
    let mut session = state.lock().await;
    session
        .lock_reflection(&category)
        .map(Json)
        .ok_or_else(|| unknown_category(&category))
}

async fn handle_play(State(state): State<ApiState>) -> Json<PlaybackSnapshot> {
    let mut session = state.lock().await;
    if !session.play() {
        info!("Play ignored in state {}", session.engine().state());
    }
    Json(session.engine().snapshot())
}

async fn handle_pause(State(state): State<ApiState>) -> Json<PlaybackSnapshot> {
    let session = state.lock().await;
    session.pause_toggle();
    Json(session.engine().snapshot())
}

async fn handle_stop(State(state): State<ApiState>) -> Json<PlaybackSnapshot> {
    let session = state.lock().await;
    session.stop();
    Json(session.engine().snapshot())
}

async fn handle_save(State(state): State<ApiState>) -> ApiResult<SavedSession> {
    let mut session = state.lock().await;
    session.save().await.map(Json).map_err(|e| {
        let code = match e {
            SaveError::NotSignedIn => StatusCode::UNAUTHORIZED,
            SaveError::NothingToSave => StatusCode::UNPROCESSABLE_ENTITY,
            SaveError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        reject(code, e.to_string())
    })
}

async fn handle_calendar(
    State(state): State<ApiState>,
    Path((year, month)): Path<(i32, u32)>,
) -> ApiResult<Vec<u32>> {
    let session = state.lock().await;
    session
        .month_days(year, month)
        .await
        .map(Json)
        .map_err(|e| reject(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

async fn handle_day_sessions(
    State(state): State<ApiState>,
    Path(date): Path<String>,
) -> ApiResult<Vec<SessionSummary>> {
    let date = parse_date(&date)?;
    let session = state.lock().await;
    session
        .day_sessions(date)
        .await
        .map(Json)
        .map_err(|e| reject(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

async fn handle_open_session(
    State(state): State<ApiState>,
    Path((date, id)): Path<(String, String)>,
) -> ApiResult<RecalledSession> {
    let date = parse_date(&date)?;
    let session = state.lock().await;
    match session.open_session(date, &id).await {
        Ok(Some(recalled)) => Ok(Json(recalled)),
        Ok(None) => Err(reject(StatusCode::NOT_FOUND, "Prayer session not found.")),
        Err(e) => Err(reject(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

async fn handle_scripture(
    State(state): State<ApiState>,
    Query(query): Query<ScriptureQuery>,
) -> ApiResult<ScripturePassage> {
    let session = state.lock().await;
    session
        .lookup_scripture(&query.reference)
        .await
        .map(Json)
        .map_err(|e| {
            let code = match e {
                ScriptureError::NotFound => StatusCode::NOT_FOUND,
                ScriptureError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::BAD_GATEWAY,
            };
            reject(code, e.to_string())
        })
}

async fn handle_get_settings(State(state): State<ApiState>) -> Json<Settings> {
    Json(state.lock().await.settings().clone())
}

async fn handle_put_settings(
    State(state): State<ApiState>,
    Json(update): Json<SettingsUpdate>,
) -> ApiResult<Settings> {
    let mut session = state.lock().await;
    let settings = update.apply_to(session.settings());
    session.apply_settings(settings).await.map_err(|e| {
        let code = match e {
            SettingsError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SettingsError::Prompts(_) => StatusCode::BAD_GATEWAY,
        };
        reject(code, e.to_string())
    })?;
    Ok(Json(session.settings().clone()))
}

async fn handle_sign_in(
    State(state): State<ApiState>,
    Json(req): Json<SignInRequest>,
) -> Result<Json<SimpleResponse>, (StatusCode, Json<SimpleResponse>)> {
    let user = req.user.trim();
    if user.is_empty() {
        return Err(reject(StatusCode::BAD_REQUEST, "empty user id"));
    }
    state.lock().await.sign_in(user);
    Ok(SimpleResponse::ok("signed_in"))
}

async fn handle_sign_out(State(state): State<ApiState>) -> Json<SimpleResponse> {
    state.lock().await.sign_out();
    SimpleResponse::ok("signed_out")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PromptSourcesConfig, ScriptureConfig};
    use crate::crypto::cipher::ReflectionCipher;
    use crate::crypto::key_manager::KeyManager;
    use crate::local_store::LocalStore;
    use crate::notifier::Notifier;
    use crate::playback::testing::{harness_with, FakeOutput, FakeSynth};
    use crate::prompts::PromptLoader;
    use crate::scripture::ScriptureClient;
    use crate::session::SessionParts;
    use crate::store::JsonlSessionStore;
    use reqwest::Client;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    const PROMPTS: &str = r#"[
        {"prayer_category": "Adoration", "prompt": "Praise the maker of heaven and earth.", "scripture_references": ["Psalm 146:6"]},
        {"prayer_category": "Petition", "prompt": "Ask for daily bread."}
    ]"#;

    async fn serve(dir: &TempDir) -> String {
        let prompts = dir.path().join("prompts.json");
        std::fs::write(&prompts, PROMPTS).unwrap();
        let sources = PromptSourcesConfig {
            method_for_prayer: prompts.display().to_string(),
            lords_prayer: prompts.display().to_string(),
        };
        let local = Arc::new(LocalStore::open(dir.path()));
        let notifier = Arc::new(Notifier::new(false));
        let keys = Arc::new(KeyManager::new(local.clone(), notifier.clone()));
        let harness = harness_with(FakeSynth::default(), FakeOutput::new(1), None);

        let mut session = SessionOrchestrator::new(SessionParts {
            local,
            cipher: ReflectionCipher::new(keys),
            store: Arc::new(JsonlSessionStore::new(dir.path())),
            loader: PromptLoader::new(sources),
            scripture: ScriptureClient::new(ScriptureConfig::default()).unwrap(),
            engine: harness.engine,
            notifier,
            user: None,
        });
        session.reload().await.unwrap();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(Arc::new(Mutex::new(session)));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn status_lists_active_categories() {
        let dir = TempDir::new().unwrap();
        let base = serve(&dir).await;
        let view: Value = reqwest::get(format!("{base}/status"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(view["mode"], "method_for_prayer");
        assert_eq!(view["categories"][0]["name"], "Adoration");
        assert_eq!(
            view["categories"][0]["text"],
            "Praise the maker of heaven and earth. (Psalm 146:6)"
        );
        assert_eq!(view["playback"]["state"], "idle");
    }

    #[tokio::test]
    async fn save_needs_sign_in_then_succeeds() {
        let dir = TempDir::new().unwrap();
        let base = serve(&dir).await;
        let client = Client::new();

        let resp = client.post(format!("{base}/save")).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED.as_u16());
        let body: SimpleResponse = resp.json().await.unwrap();
        assert_eq!(body.error.as_deref(), Some("Please log in to save your prayer."));

        let resp = client
            .post(format!("{base}/sign-in"))
            .json(&json!({ "user": "user-1" }))
            .send()
            .await
            .unwrap();
        assert!(resp.status().is_success());

        client
            .post(format!("{base}/reflections/Adoration/toggle"))
            .send()
            .await
            .unwrap();
        client
            .put(format!("{base}/reflections/Adoration"))
            .json(&json!({ "text": "grateful" }))
            .send()
            .await
            .unwrap();
        let draft: Value = client
            .post(format!("{base}/reflections/Adoration/lock"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(draft["locked"], true);

        let saved: Value = client
            .post(format!("{base}/save"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(saved["segments"].as_array().unwrap().len(), 2);
        assert!(saved["segments"][0]["reflection"]["ciphertext"].is_string());
    }

    #[tokio::test]
    async fn unknown_category_is_not_found() {
        let dir = TempDir::new().unwrap();
        let base = serve(&dir).await;
        let resp = Client::new()
            .post(format!("{base}/prompts/Lament/refresh"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND.as_u16());
    }

    #[tokio::test]
    async fn settings_update_is_partial() {
        let dir = TempDir::new().unwrap();
        let base = serve(&dir).await;
        let settings: Value = Client::new()
            .put(format!("{base}/settings"))
            .json(&json!({ "pause_secs": 4, "theme": "dark" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(settings["pause_secs"], 4);
        assert_eq!(settings["theme"], "dark");
        assert_eq!(settings["play_bell"], true);
    }

    #[tokio::test]
    async fn bad_dates_are_rejected() {
        let dir = TempDir::new().unwrap();
        let base = serve(&dir).await;
        let resp = reqwest::get(format!("{base}/sessions/2024-13-40")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST.as_u16());
    }

    #[test]
    fn settings_update_keeps_absent_fields() {
        let current = Settings::default();
        let updated = SettingsUpdate {
            mode: Some(PrayerMode::LordsPrayer),
            ..SettingsUpdate::default()
        }
        .apply_to(&current);
        assert_eq!(updated.mode, PrayerMode::LordsPrayer);
        assert_eq!(updated.pause_secs, current.pause_secs);
        assert_eq!(updated.category_order, current.category_order);
    }
}
