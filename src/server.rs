use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use log::error;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::data::{AssignmentInput, AssignmentOutput, PreferenceRow};
use crate::engine;
use crate::preferences::PreferenceStore;
use crate::store;

/// Shared server state: the owned preference store behind a single lock,
/// plus the file it is written back to after every mutation. The one lock
/// also serializes store edits against in-flight assignment runs.
struct AppState {
    prefs: Mutex<PreferenceStore>,
    pref_path: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertRequest {
    ta_name: String,
    // Empty selections mean "all", matching the upload form's semantics.
    #[serde(default)]
    year_groups: Vec<String>,
    #[serde(default)]
    subjects: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PinRequest {
    year_group: String,
    subject: String,
    ta_name: String,
}

type ApiError = (StatusCode, String);

async fn run_handler(
    State(state): State<Arc<AppState>>,
    Json(input): Json<AssignmentInput>,
) -> Result<Json<AssignmentOutput>, ApiError> {
    let prefs = state.prefs.lock().unwrap();
    match engine::run(&input, &prefs) {
        Ok(output) => Ok(Json(output)),
        Err(e) => Err((StatusCode::BAD_REQUEST, e.to_string())),
    }
}

async fn list_handler(State(state): State<Arc<AppState>>) -> Json<Vec<PreferenceRow>> {
    Json(state.prefs.lock().unwrap().rows())
}

async fn upsert_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UpsertRequest>,
) -> Result<Json<Vec<PreferenceRow>>, ApiError> {
    let mut prefs = state.prefs.lock().unwrap();
    prefs.upsert(&request.ta_name, &request.year_groups, &request.subjects);
    persist(&state, &prefs)?;
    Ok(Json(prefs.rows()))
}

async fn pin_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PinRequest>,
) -> Result<Json<Vec<PreferenceRow>>, ApiError> {
    let mut prefs = state.prefs.lock().unwrap();
    prefs.pin_class(&request.year_group, &request.subject, &request.ta_name);
    persist(&state, &prefs)?;
    Ok(Json(prefs.rows()))
}

async fn delete_handler(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
) -> Result<Json<Vec<PreferenceRow>>, ApiError> {
    let mut prefs = state.prefs.lock().unwrap();
    match prefs.remove_at(index) {
        Ok(_) => {
            persist(&state, &prefs)?;
            Ok(Json(prefs.rows()))
        }
        Err(e) => Err((StatusCode::BAD_REQUEST, e.to_string())),
    }
}

fn persist(state: &AppState, prefs: &PreferenceStore) -> Result<(), ApiError> {
    store::save_preferences(&state.pref_path, prefs).map_err(|e| {
        error!("Could not persist preferences: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })
}

pub async fn run_server(prefs: PreferenceStore, pref_path: PathBuf) {
    let state = Arc::new(AppState {
        prefs: Mutex::new(prefs),
        pref_path,
    });

    let app = Router::new()
        .route("/v1/assignments/run", post(run_handler))
        .route("/v1/preferences", get(list_handler).post(upsert_handler))
        .route("/v1/preferences/pin", post(pin_handler))
        .route("/v1/preferences/:index", delete(delete_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:8080")
        .await
        .unwrap();

    println!("Server running at http://{}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}
