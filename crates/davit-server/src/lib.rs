use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, map_response, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use davit_auth::BasicAuth;
use davit_retention::CleanupController;
use davit_storage::ArtifactStore;
use metrics::counter;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::classify::StatusInRangeAsFailures;
use tower_http::trace::{DefaultOnFailure, TraceLayer};

pub mod aggregate;

pub mod admin;

pub mod listing;

pub mod repository;

pub mod upstream;

use upstream::UpstreamClient;

#[derive(Clone, Debug, Default)]
pub struct ServiceConfig {
    /// Upstream mirror base URLs, tried in order on a local miss.
    pub proxy_urls: Vec<String>,
}

pub struct ServiceState<S> {
    pub store: S,
    pub auth: BasicAuth,
    pub upstream: UpstreamClient,
    pub cleanup: Arc<CleanupController<S>>,
}

pub fn router<S>(
    config: ServiceConfig,
    store: S,
    auth: BasicAuth,
    cleanup: Arc<CleanupController<S>>,
) -> Router
where
    S: ArtifactStore + Send + Sync + 'static,
{
    let state = Arc::new(ServiceState {
        store,
        auth,
        upstream: UpstreamClient::new(config.proxy_urls),
        cleanup,
    });

    Router::new()
        .merge(aggregate::routes())
        .merge(repository::routes())
        .nest("/admin/snapshots/cleanup", admin::routes())
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            require_auth::<S>,
        ))
        .with_state(state)
        .fallback(handle_global_fallback)
        .layer(CatchPanicLayer::custom(|_| {
            counter!("davit_panics_total").increment(1);

            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }))
        .layer(
            TraceLayer::new(StatusInRangeAsFailures::new(400..=599).into_make_classifier())
                .make_span_with(|request: &axum::http::Request<Body>| {
                    let method = request.method();
                    let uri = request.uri();

                    tracing::info_span!("http-request", ?method, ?uri)
                })
                .on_failure(DefaultOnFailure::new()),
        )
        .layer(map_response(record_status_code))
}

async fn require_auth<S>(
    State(state): State<Arc<ServiceState<S>>>,
    request: Request,
    next: Next,
) -> Response
where
    S: ArtifactStore + Send + Sync + 'static,
{
    match state.auth.authorize(request.method(), request.headers()) {
        Ok(()) => next.run(request).await,
        Err(error) => error.into_response(),
    }
}

async fn record_status_code(response: Response) -> Response {
    let code = response.status().as_str().to_string();
    counter!("davit_responses_total", "code" => code).increment(1);
    response
}

pub async fn handle_global_fallback() -> StatusCode {
    StatusCode::NOT_FOUND
}
