//! API routes

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};

use crate::conversation::MessageId;
use crate::core::{VoiceCapture, WidgetView};
use crate::AppState;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct InputRequest {
    pub text: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubmitRequest {
    /// Text to send; the current input draft when absent
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub message_id: MessageId,
}

#[derive(Debug, Serialize)]
pub struct VoiceResponse {
    pub capture: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn view(State(state): State<AppState>) -> Json<WidgetView> {
    Json(state.widget.view().await)
}

async fn open(State(state): State<AppState>) -> Json<WidgetView> {
    state.widget.open();
    Json(state.widget.view().await)
}

async fn close(State(state): State<AppState>) -> Json<WidgetView> {
    state.widget.close();
    Json(state.widget.view().await)
}

async fn set_input(
    State(state): State<AppState>,
    Json(request): Json<InputRequest>,
) -> Json<WidgetView> {
    state.widget.set_input(request.text);
    Json(state.widget.view().await)
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|mime| {
            let mime = mime.trim();
            mime.eq_ignore_ascii_case("application/json") || mime.ends_with("+json")
        })
        .unwrap_or(false)
}

/// Submit the given text, or the input draft when the body is empty
///
/// A non-empty body must be a JSON `SubmitRequest`; anything else is
/// rejected without touching the draft.
async fn submit(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let request = if body.is_empty() {
        SubmitRequest::default()
    } else if !is_json(&headers) {
        return (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Expected request with `Content-Type: application/json`",
        )
            .into_response();
    } else {
        match Json::<SubmitRequest>::from_bytes(&body) {
            Ok(Json(request)) => request,
            Err(rejection) => {
                tracing::debug!("Rejected submit body: {}", rejection);
                return rejection.into_response();
            }
        }
    };

    let submission = match request.text {
        Some(text) => state.widget.submit(&text).await,
        None => state.widget.submit_input().await,
    };

    match submission {
        // The reply is picked up by polling the widget view
        Some(submission) => (
            StatusCode::ACCEPTED,
            Json(SubmitResponse {
                message_id: submission.message_id,
            }),
        )
            .into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// Start a voice capture
///
/// Returns as soon as the capture is running. The recognized text lands in
/// the input draft later, so clients poll `GET /v1/widget` until `recording`
/// is false and then read `input`.
async fn voice(State(state): State<AppState>) -> Json<VoiceResponse> {
    let capture = match state.widget.start_voice_capture() {
        VoiceCapture::Started(_) => "started",
        VoiceCapture::AlreadyActive => "already_active",
        VoiceCapture::Unavailable => "unavailable",
    };
    Json(VoiceResponse { capture })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/v1/widget", get(view))
        .route("/v1/widget/open", post(open))
        .route("/v1/widget/close", post(close))
        .route("/v1/widget/input", put(set_input))
        .route("/v1/widget/messages", post(submit))
        .route("/v1/widget/voice", post(voice))
}
