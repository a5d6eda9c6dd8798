//! HTTP surface of the panel.
//!
//! | Route | Handler |
//! |-------|---------|
//! | `GET /` | the HTML page |
//! | `GET /reload` | streams the task script |
//! | `GET /logs` | streams the journal follower |
//! | `GET /get_settings` | settings without the secret |
//! | `POST /check_secret` | verifies a secret |
//! | `POST /save_settings` | merges settings, secret-guarded |
//!
//! Everything else is a 404.

mod handlers;


use axum::extract::{ConnectInfo, Request, State};
use axum::handler::Handler;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, get_service, post, MethodRouter};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::services::ServeFile;
use tower_http::trace::TraceLayer;

use crate::auth::AuthGate;
use crate::config::PanelConfig;
use crate::error::PanelError;
use crate::relay::StreamRelay;
use crate::settings::{SettingsError, SettingsStore};
use crate::subprocess::ProcessStreamer;

/// Everything handlers share. Only the settings file changes at runtime.
#[derive(Debug)]
pub struct AppState {
    pub config: PanelConfig,
    pub auth: AuthGate,
    pub store: Arc<SettingsStore>,
    pub relay: StreamRelay,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config: PanelConfig, auth: AuthGate, store: Arc<SettingsStore>) -> Self {
        let relay = StreamRelay::new(ProcessStreamer::new(config.grace_period));
        Self {
            config,
            auth,
            store,
            relay,
        }
    }

    /// Read the secret from the store once; later changes to it need a restart.
    pub async fn load(config: PanelConfig, store: Arc<SettingsStore>) -> Result<Self, SettingsError> {
        let auth = AuthGate::new(store.load_secret().await?);
        Ok(Self::new(config, auth, store))
    }
}

pub fn router(state: SharedState) -> Router {
    let page = ServeFile::new(&state.config.ui_file);

    // `get` also answers HEAD unless HEAD has its own route; it must not
    // start a command
    Router::new()
        .route(
            "/",
            get_service(page)
                .head(handlers::not_found)
                .fallback(handlers::not_found),
        )
        .route("/reload", get_only(handlers::reload))
        .route("/logs", get_only(handlers::logs))
        .route("/get_settings", get_only(handlers::get_settings))
        .route(
            "/check_secret",
            post(handlers::check_secret).fallback(handlers::not_found),
        )
        .route(
            "/save_settings",
            post(handlers::save_settings).fallback(handlers::not_found),
        )
        .fallback(handlers::not_found)
        .layer(middleware::from_fn_with_state(state.clone(), restrict_peers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn get_only<H, T>(handler: H) -> MethodRouter<SharedState>
where
    H: Handler<T, SharedState>,
    T: 'static,
{
    get(handler)
        .head(handlers::not_found)
        .fallback(handlers::not_found)
}

/// Serve until the listener fails. Each connection runs on its own task.
pub async fn serve(state: SharedState, listener: TcpListener) -> std::io::Result<()> {
    let app = router(state);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
}

/// With `--local-only` and no secret, turn away non-loopback peers.
async fn restrict_peers(State(state): State<SharedState>, request: Request, next: Next) -> Response {
    if state.config.local_only {
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        // unknown peers only get through once a secret guards the panel
        let admitted = match peer {
            Some(ip) => state.auth.admits_peer(ip, true),
            None => state.auth.is_configured(),
        };
        if !admitted {
            tracing::warn!(?peer, "Rejected non-local request while no secret is set");
            return PanelError::Forbidden.into_response();
        }
    }
    next.run(request).await
}
