//! Browser-facing chat routes.
//!
//! - `GET  /`: reset the session and render the landing page
//! - `POST /api/message`: run one augmented chat turn for the session

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chatrelay_core::{ApplicationError, Augmenter, IncomingMessage, InterfaceError};
use serde::Serialize;
use tera::{Context, Tera};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::session::{SessionCookie, SessionId, SessionStore};

pub const APOLOGY_TEXT: &str =
    "Sorry, I cannot reach the assistant right now. Please try again in a moment.";

#[derive(Clone)]
pub struct ChatState {
    pub augmenter: Arc<Augmenter>,
    pub sessions: Arc<dyn SessionStore>,
    pub cookie: SessionCookie,
    pub templates: Arc<Tera>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ApologyOutput {
    pub text: &'static str,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatError {
    pub error: &'static str,
    pub message: &'static str,
    pub correlation_id: String,
    pub output: ApologyOutput,
}

pub fn templates() -> Result<Tera, tera::Error> {
    let mut tera = Tera::default();
    tera.add_raw_template("index.html", include_str!("../templates/index.html"))?;
    Ok(tera)
}

pub fn router(state: ChatState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/message", post(message))
        .with_state(state)
}

/// Existing signed session, or a freshly minted one that still needs its cookie set.
fn resolve_session(cookie: &SessionCookie, headers: &HeaderMap) -> (SessionId, bool) {
    match cookie.from_headers(headers) {
        Some(id) => (id, false),
        None => (SessionId::generate(), true),
    }
}

fn attach_cookie(mut response: Response, cookie: &SessionCookie, id: &SessionId) -> Response {
    if let Ok(value) = HeaderValue::from_str(&cookie.set_cookie_value(id)) {
        response.headers_mut().insert(header::SET_COOKIE, value);
    }
    response
}

async fn index(State(state): State<ChatState>, headers: HeaderMap) -> Response {
    let (session_id, minted) = resolve_session(&state.cookie, &headers);

    if let Err(error) = state.sessions.clear(&session_id).await {
        warn!(
            event_name = "chat.session.clear_failed",
            session_id = %session_id,
            error = %error,
            "failed to clear session context"
        );
    }

    let mut context = Context::new();
    context.insert("name", "chatapp");
    let page = match state.templates.render("index.html", &context) {
        Ok(html) => Html(html).into_response(),
        Err(error) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(format!("<h1>Template Error</h1><pre>{error}</pre>")),
            )
                .into_response();
        }
    };

    if minted {
        attach_cookie(page, &state.cookie, &session_id)
    } else {
        page
    }
}

async fn message(State(state): State<ChatState>, headers: HeaderMap, body: Bytes) -> Response {
    let correlation_id = Uuid::new_v4().to_string();
    let (session_id, minted) = resolve_session(&state.cookie, &headers);
    let span = info_span!(
        "chat.message",
        correlation_id = %correlation_id,
        session_id = %session_id
    );

    let response = run_turn(&state, &session_id, &body).instrument(span).await;
    let response = match response {
        Ok(response) => response,
        Err(error) => error_response(error.into_interface(correlation_id)),
    };

    if minted {
        attach_cookie(response, &state.cookie, &session_id)
    } else {
        response
    }
}

async fn run_turn(
    state: &ChatState,
    session_id: &SessionId,
    body: &[u8],
) -> Result<Response, ApplicationError> {
    let message: IncomingMessage = serde_json::from_slice(body).unwrap_or_default();
    info!(
        event_name = "chat.message.received",
        utterance_chars = message.utterance().chars().count(),
        "chat message received"
    );

    let context = state
        .sessions
        .load(session_id)
        .await
        .map_err(|error| ApplicationError::Persistence(error.to_string()))?
        .unwrap_or_default();

    let reply = state.augmenter.handle(&message, context).await.map_err(|error| {
        warn!(
            event_name = "chat.message.upstream_failed",
            step = error.step(),
            error = %error,
            "upstream call failed; session context left unchanged"
        );
        ApplicationError::from(error)
    })?;

    state
        .sessions
        .save(session_id, reply.context.clone())
        .await
        .map_err(|error| ApplicationError::Persistence(error.to_string()))?;

    info!(
        event_name = "chat.message.replied",
        reply_chars = reply.output.text.char_len(),
        "chat reply sent"
    );
    Ok(Json(reply).into_response())
}

fn error_response(error: InterfaceError) -> Response {
    let (status, code) = match &error {
        InterfaceError::ServiceUnavailable { .. } => {
            (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable")
        }
        InterfaceError::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
    };

    let payload = ChatError {
        error: code,
        message: error.user_message(),
        correlation_id: error.correlation_id().to_string(),
        output: ApologyOutput { text: APOLOGY_TEXT },
    };
    (status, Json(payload)).into_response()
}
