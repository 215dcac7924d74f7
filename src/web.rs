use std::{sync::Arc, time::Duration};

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::signal;

use crate::{
    config::Config,
    engine::{ArtifactStore, Model, ModelMeta},
    errors::Error,
    service::{DisplayRecord, ModelHandle, RecommendationService},
};

#[derive(Clone)]
pub struct SharedState {
    handle: Arc<ModelHandle>,
    config: Arc<Config>,
}

impl SharedState {
    pub fn new(handle: Arc<ModelHandle>, config: Arc<Config>) -> Self {
        Self { handle, config }
    }
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/recommend", get(recommend))
        .route("/api/model", get(model_meta))
        .route("/api/reload", post(reload))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(state)
}

async fn start_app(state: SharedState, listen: String) -> anyhow::Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&listen).await?;
    log::info!("listening on {listen}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(err) => {
                log::error!("failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received");
}

/// Serve `model` until Ctrl+C or SIGTERM.
pub fn start_server(config: Config, model: Model, listen: Option<String>) -> anyhow::Result<()> {
    let listen = listen.unwrap_or_else(|| config.serve.listen.clone());
    let state = SharedState::new(Arc::new(ModelHandle::new(model)), Arc::new(config));

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(start_app(state, listen))
}

#[derive(Debug, thiserror::Error)]
enum ServeError {
    #[error(transparent)]
    Engine(#[from] Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("worker failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug)]
struct HttpError(ServeError);

impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self.0 {
            ServeError::Engine(Error::InvalidRequest(_)) => StatusCode::BAD_REQUEST,
            ServeError::Engine(Error::NotFound(_)) => StatusCode::NOT_FOUND,
            ServeError::Timeout(_) => {
                log::warn!("{self:?}");
                StatusCode::SERVICE_UNAVAILABLE
            }
            ServeError::Engine(_) | ServeError::Join(_) => {
                log::error!("{self:?}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({"error": self.0.to_string()}))).into_response()
    }
}

impl<E> From<E> for HttpError
where
    E: Into<ServeError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[derive(Debug, Deserialize)]
pub struct RecommendParams {
    pub title: Option<String>,
    pub top_n: Option<usize>,
}

async fn recommend(
    State(state): State<SharedState>,
    params: Result<Query<RecommendParams>, QueryRejection>,
) -> Result<Json<Vec<DisplayRecord>>, HttpError> {
    let Query(params) = params.map_err(|err| Error::InvalidRequest(err.body_text()))?;
    log::debug!("params: {params:?}");

    let title = params.title.as_deref().map(str::trim).unwrap_or_default();
    if title.is_empty() {
        return Err(Error::InvalidRequest("title must not be empty".to_string()).into());
    }
    let title = title.to_string();
    let top_n = params.top_n.unwrap_or(state.config.top_n);

    let service = RecommendationService::new(
        state.handle.current(),
        state.config.dataset.display.clone(),
    )
    .with_max_top_n(state.config.max_top_n);

    let limit = Duration::from_millis(state.config.serve.request_timeout_ms);
    let task = tokio::task::spawn_blocking(move || service.recommend(&title, top_n));

    let records = tokio::time::timeout(limit, task)
        .await
        .map_err(|_| ServeError::Timeout(limit))???;

    Ok(Json(records))
}

async fn model_meta(State(state): State<SharedState>) -> Json<ModelMeta> {
    Json(state.handle.current().meta().clone())
}

async fn reload(State(state): State<SharedState>) -> Result<Json<ModelMeta>, HttpError> {
    let store = ArtifactStore::new(state.config.artifact_path());

    let model = tokio::task::spawn_blocking(move || store.load()).await??;
    let meta = model.meta().clone();

    let previous = state.handle.swap(model);
    log::info!(
        "reloaded model: {} rows (was {}), built {}",
        meta.rows,
        previous.rows(),
        meta.built_at
    );

    Ok(Json(meta))
}
