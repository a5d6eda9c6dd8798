use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::settings::SettingsError;

/// Errors a request handler turns into a JSON failure response.
#[derive(Error, Debug)]
pub enum PanelError {
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("invalid secret")]
    Unauthorized,

    #[error("access restricted to localhost")]
    Forbidden,

    #[error("{0}")]
    Settings(#[from] SettingsError),
}

impl PanelError {
    pub fn status(&self) -> StatusCode {
        match self {
            PanelError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            PanelError::Unauthorized | PanelError::Forbidden => StatusCode::FORBIDDEN,
            PanelError::Settings(SettingsError::InvalidEntry(_)) => StatusCode::BAD_REQUEST,
            PanelError::Settings(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the client. Storage details stay in the log.
    fn client_message(&self) -> String {
        match self {
            PanelError::Settings(SettingsError::Read { .. }) => "failed to read settings".into(),
            PanelError::Settings(SettingsError::Write { .. } | SettingsError::Join(_)) => {
                "failed to save settings".into()
            }
            other => other.to_string(),
        }
    }
}

/// `{"success": false, "msg": ...}`
#[derive(Debug, Serialize)]
pub struct Failure {
    pub success: bool,
    pub msg: String,
}

impl IntoResponse for PanelError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected ({}): {}", status, self);
        }

        let body = Failure {
            success: false,
            msg: self.client_message(),
        };
        (status, Json(body)).into_response()
    }
}
