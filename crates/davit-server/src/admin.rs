use crate::ServiceState;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use davit_storage::ArtifactStore;
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
struct StatusBody {
    status: &'static str,
}

#[derive(Serialize)]
struct MessageBody {
    message: &'static str,
}

pub fn routes<S>() -> Router<Arc<ServiceState<S>>>
where
    S: ArtifactStore + Send + Sync + 'static,
{
    Router::new()
        .route("/pause", post(pause))
        .route("/resume", post(resume))
        .route("/status", get(status))
        .route("/trigger", post(trigger))
}

async fn pause<S>(State(state): State<Arc<ServiceState<S>>>) -> Json<StatusBody>
where
    S: ArtifactStore + Send + Sync + 'static,
{
    state.cleanup.pause();
    Json(StatusBody { status: "paused" })
}

async fn resume<S>(State(state): State<Arc<ServiceState<S>>>) -> Json<StatusBody>
where
    S: ArtifactStore + Send + Sync + 'static,
{
    state.cleanup.resume();
    Json(StatusBody { status: "running" })
}

async fn status<S>(State(state): State<Arc<ServiceState<S>>>) -> Json<StatusBody>
where
    S: ArtifactStore + Send + Sync + 'static,
{
    Json(StatusBody {
        status: state.cleanup.status(),
    })
}

/// Spawns a cleanup in the background and answers immediately; the paused
/// flag does not apply to manual triggers.
async fn trigger<S>(State(state): State<Arc<ServiceState<S>>>) -> Json<MessageBody>
where
    S: ArtifactStore + Send + Sync + 'static,
{
    state.cleanup.trigger();
    Json(MessageBody {
        message: "Cleanup triggered manually",
    })
}
