use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::convert::Infallible;
use tracing::debug;

use super::SharedState;
use crate::error::PanelError;
use crate::relay::ResponseSink;
use crate::settings::SECRET_ALIAS;
use crate::subprocess::ProcessCommand;

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub success: bool,
    pub data: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct CheckSecretResponse {
    pub success: bool,
    pub msg: String,
}

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub success: bool,
}

pub async fn reload(State(state): State<SharedState>) -> Response {
    stream_command(&state, state.config.reload_command.clone())
}

pub async fn logs(State(state): State<SharedState>) -> Response {
    stream_command(&state, state.config.logs_command.clone())
}

pub async fn get_settings(
    State(state): State<SharedState>,
) -> Result<Json<SettingsResponse>, PanelError> {
    let data = state.store.load_all().await?;
    Ok(Json(SettingsResponse {
        success: true,
        data,
    }))
}

pub async fn check_secret(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<Json<CheckSecretResponse>, PanelError> {
    let fields: Map<String, Value> = parse_json(&body)?;
    let passed = state.auth.check(secret_field(&fields)?);
    debug!(passed, "Secret check");

    Ok(Json(CheckSecretResponse {
        success: passed,
        msg: if passed {
            String::new()
        } else {
            PanelError::Unauthorized.to_string()
        },
    }))
}

pub async fn save_settings(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<Json<SaveResponse>, PanelError> {
    // Request order is kept so new keys are appended as sent
    let fields: Map<String, Value> = parse_json(&body)?;

    if !state.auth.check(secret_field(&fields)?) {
        return Err(PanelError::Unauthorized);
    }

    let updates = fields
        .iter()
        .map(|(key, value)| Ok((key.as_str(), setting_value(key, value)?)))
        .collect::<Result<Vec<_>, PanelError>>()?;
    state.store.merge(updates).await?;

    Ok(Json(SaveResponse { success: true }))
}

pub async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not Found")
}

/// Answer with a streaming text body fed by a background relay.
///
/// The relay runs on its own task so it keeps ownership of the process
/// until it has been stopped, whatever happens to the connection.
fn stream_command(state: &SharedState, command: ProcessCommand) -> Response {
    let (sink, lines) = ResponseSink::channel();
    let relay = state.relay.clone();
    tokio::spawn(async move {
        let outcome = relay.relay(&command, sink).await;
        debug!(?outcome, "Relay finished for {}", command.display());
    });

    (
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        ],
        Body::from_stream(lines.map(Ok::<_, Infallible>)),
    )
        .into_response()
}

/// The `secret` field of a request body; missing counts as empty.
fn secret_field(fields: &Map<String, Value>) -> Result<&str, PanelError> {
    match fields.get(SECRET_ALIAS) {
        None => Ok(""),
        Some(Value::String(secret)) => Ok(secret.as_str()),
        Some(_) => Err(PanelError::MalformedRequest(format!(
            "`{SECRET_ALIAS}` must be a string"
        ))),
    }
}

fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, PanelError> {
    serde_json::from_slice(body).map_err(|e| PanelError::MalformedRequest(e.to_string()))
}

/// Text for a JSON scalar. Strings pass through, numbers and booleans use
/// their JSON spelling, null becomes empty.
pub(crate) fn setting_value(key: &str, value: &Value) -> Result<String, PanelError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        Value::Array(_) | Value::Object(_) => Err(PanelError::MalformedRequest(format!(
            "value of `{key}` must be a string, number or boolean"
        ))),
    }
}
