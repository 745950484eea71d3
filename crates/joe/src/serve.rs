// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `joe serve` command implementation.
//!
//! Assembles every configured transport, restores persisted sessions, runs
//! the HTTP listener and idle reaper until a shutdown signal, then drains
//! in-flight commands and saves sessions for the next start.

use std::sync::Arc;
use std::time::Duration;

use axum::{Json, Router, extract::State, routing::get};
use joe_agent::{
    Assistant, DEFAULT_REAPER_INTERVAL, SessionStore, drain_tasks, install_signal_handler,
    run_reaper,
};
use joe_config::JoeConfig;
use joe_core::JoeError;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::assembly::{assemble, build_dblab_clients, build_engine};

/// Time given to in-flight commands of one transport after shutdown starts.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

pub const HEALTH_PATH: &str = "/health";

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: String,
}

async fn get_health(State(version): State<Arc<String>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: version.as_str().to_string(),
    })
}

/// Transport routes plus `/health`, with request tracing.
pub fn app(routes: Router, version: &str) -> Router {
    let health = Router::new()
        .route(HEALTH_PATH, get(get_health))
        .with_state(Arc::new(version.to_string()));

    Router::new()
        .merge(health)
        .merge(routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Runs the `joe serve` command until SIGINT/SIGTERM.
pub async fn run_serve(config: JoeConfig) -> Result<(), JoeError> {
    init_tracing(config.app.debug);

    let config = Arc::new(config);
    let engine = build_engine(&config)?;
    info!(
        version = config.app.version.as_str(),
        edition = engine.edition.edition(),
        "starting joe serve"
    );

    let cancel = install_signal_handler();
    let dblabs = build_dblab_clients(&config)?;
    let transports = assemble(Arc::clone(&config), engine, &dblabs, &cancel).await?;
    let assistants = transports.assistants;

    let mut store = SessionStore::new(&config.app.sessions_path);
    if let Err(e) = store.load() {
        warn!(error = %e, path = %store.path().display(), "failed to load saved sessions, starting fresh");
    }
    for assistant in &assistants {
        if let Err(e) = assistant.restore_sessions(&store).await {
            warn!(transport = assistant.transport(), error = %e, "session restore failed");
        }
    }

    for assistant in &assistants {
        assistant.register().await?;
    }

    let reaper = tokio::spawn(run_reaper(
        assistants.clone(),
        DEFAULT_REAPER_INTERVAL,
        cancel.clone(),
    ));

    let served = serve_http(&config, app(transports.router, &config.app.version), cancel.clone()).await;
    if let Err(e) = &served {
        error!(error = %e, "http server stopped");
    }
    // The listener only returns early on failure; bring everything else down with it.
    cancel.cancel();

    shutdown(&assistants, &mut store).await;
    if let Err(e) = reaper.await {
        warn!(error = %e, "idle reaper task failed");
    }

    info!("joe serve shutdown complete");
    served
}

async fn serve_http(
    config: &JoeConfig,
    app: Router,
    cancel: CancellationToken,
) -> Result<(), JoeError> {
    let addr = format!("{}:{}", config.app.host, config.app.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| JoeError::Connection {
            message: format!("failed to bind http listener to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    info!(addr = addr.as_str(), "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| JoeError::Connection {
            message: format!("http server error: {e}"),
            source: Some(Box::new(e)),
        })
}

/// Stops transports, waits for in-flight commands and persists sessions.
async fn shutdown(assistants: &[Arc<dyn Assistant>], store: &mut SessionStore) {
    for assistant in assistants {
        if let Err(e) = assistant.deregister().await {
            warn!(transport = assistant.transport(), error = %e, "deregister failed");
        }
    }

    for assistant in assistants {
        if !drain_tasks(assistant.processors().tasks(), SHUTDOWN_TIMEOUT).await {
            warn!(
                transport = assistant.transport(),
                "in-flight commands did not finish before shutdown timeout"
            );
        }
    }

    for assistant in assistants {
        assistant.dump_sessions(store).await;
    }
    match store.save() {
        Ok(()) => debug!(path = %store.path().display(), "sessions saved"),
        Err(e) => error!(error = %e, "failed to save sessions"),
    }
}

/// `RUST_LOG` wins; otherwise `app.debug` picks the default directives.
fn default_directives(debug: bool) -> &'static str {
    if debug { "joe=debug,info" } else { "joe=info,warn" }
}

fn init_tracing(debug: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(debug)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use joe_agent::{BasicPlanAnalyzer, EditionPack, EngineDeps};
    use joe_core::{ManualClock, PlatformClient};
    use joe_test_utils::{MockConnectionFactory, MockPlatform, MockPsql};
    use serde_json::Value;
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_reports_version() {
        let response = app(Router::new(), "v1.2.3")
            .oneshot(Request::get(HEALTH_PATH).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body, serde_json::json!({"status": "ok", "version": "v1.2.3"}));
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let response = app(Router::new(), "v1")
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn debug_raises_default_log_level() {
        assert_eq!(default_directives(false), "joe=info,warn");
        assert_eq!(default_directives(true), "joe=debug,info");
    }

    #[tokio::test]
    async fn shutdown_saves_sessions_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        let config = joe_config::load_config_from_str(
            r#"
[channel_mapping.dblab_servers.prod1]
url = "https://dblab.test"
token = "dblab-token"

[[channel_mapping.communication_types.webui]]
name = "web"
[channel_mapping.communication_types.webui.credentials]
signing_secret = "webui-secret"
[[channel_mapping.communication_types.webui.channels]]
channel_id = "W1"
dblab_server = "prod1"
"#,
        )
        .unwrap();

        let engine = EngineDeps {
            platform: Some(Arc::new(MockPlatform::new()) as Arc<dyn PlatformClient>),
            connections: Arc::new(MockConnectionFactory::new()),
            analyzer: Arc::new(BasicPlanAnalyzer),
            psql: Arc::new(MockPsql::new()),
            edition: EditionPack::community(),
            clock: Arc::new(ManualClock::new(chrono::Utc::now())),
        };
        let dblabs = build_dblab_clients(&config).unwrap();
        let transports = assemble(Arc::new(config), engine, &dblabs, &CancellationToken::new())
            .await
            .unwrap();

        let mut store = SessionStore::new(&path);
        shutdown(&transports.assistants, &mut store).await;

        assert!(path.exists());
        let mut reloaded = SessionStore::new(&path);
        reloaded.load().unwrap();
        assert!(reloaded.get_users("webui", "W1").is_empty());
    }
}
