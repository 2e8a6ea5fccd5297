use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chatrelay_core::AugmentSettings;
use chrono::Utc;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    settings: AugmentSettings,
}

impl HealthState {
    pub fn new(settings: AugmentSettings) -> Self {
        Self { settings }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IntegrationStatus {
    pub name: &'static str,
    pub enabled: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub integrations: Vec<IntegrationStatus>,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let settings = &state.settings;
    let payload = HealthResponse {
        status: "ready",
        service: HealthCheck {
            status: "ready",
            detail: "chatrelay-server runtime initialized".to_string(),
        },
        integrations: vec![
            IntegrationStatus { name: "conversation", enabled: true },
            IntegrationStatus { name: "discovery", enabled: true },
            IntegrationStatus { name: "natural_language_understanding", enabled: settings.nlu_enabled },
            IntegrationStatus { name: "tone_analyzer", enabled: settings.tone_enabled },
            IntegrationStatus { name: "summarizer", enabled: settings.summarizer.enabled },
        ],
        checked_at: Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(payload))
}
