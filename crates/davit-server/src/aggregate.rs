use crate::listing::{dedup_entries, render_index};
use crate::repository::{stream_and_cache, stream_blob};
use crate::ServiceState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use davit_storage::{ArtifactStore, Entry};
use metrics::counter;
use std::sync::Arc;

/// Base prefix the physical repositories live under.
pub const BASE_PREFIX: &str = "repository";
/// Name of the virtual aggregate; excluded from its own discovery.
pub const AGGREGATE_NAME: &str = "maven-public";
/// Repository consulted ahead of all others during aggregate lookup.
pub const RELEASES_NAME: &str = "maven-releases";

pub fn routes<S>() -> Router<Arc<ServiceState<S>>>
where
    S: ArtifactStore + Send + Sync + 'static,
{
    Router::new().route(
        "/repository/maven-public/*path",
        get(download).head(head_check),
    )
}

/// Enumerate the physical repositories under `base`, releases first.
///
/// Discovery runs on every request, so a repository created by the first PUT
/// to a new name shows up immediately.
pub(crate) async fn aggregate_repos<S: ArtifactStore>(store: &S, base: &str) -> Vec<String> {
    let Ok(Some(entries)) = store.list(base).await else {
        return Vec::new();
    };

    let mut repos = Vec::new();
    let mut has_releases = false;
    for entry in entries {
        if !entry.is_dir {
            continue;
        }
        match entry.name.as_str() {
            AGGREGATE_NAME => {}
            RELEASES_NAME => has_releases = true,
            _ => repos.push(format!("{base}/{}", entry.name)),
        }
    }
    if has_releases {
        repos.insert(0, format!("{base}/{RELEASES_NAME}"));
    }
    repos
}

/// Union directory probe, then first file hit in repository order, then
/// upstream cache-fill into the aggregate prefix, then 404.
async fn download<S>(
    State(state): State<Arc<ServiceState<S>>>,
    Path(path): Path<String>,
) -> Response
where
    S: ArtifactStore + Send + Sync + 'static,
{
    let repos = aggregate_repos(&state.store, BASE_PREFIX).await;

    let mut merged: Vec<Entry> = Vec::new();
    let mut found_dir = false;
    for repo in &repos {
        if let Ok(Some(entries)) = state.store.list(&format!("{repo}/{path}")).await {
            if !entries.is_empty() {
                found_dir = true;
                merged.extend(entries);
            }
        }
    }
    if found_dir {
        let entries = dedup_entries(merged);
        let heading = format!("{BASE_PREFIX}/{AGGREGATE_NAME}/{path} (Aggregated)");
        return Html(render_index(&heading, &entries)).into_response();
    }

    for repo in &repos {
        if let Ok(Some(reader)) = state.store.get(&format!("{repo}/{path}")).await {
            counter!("davit_artifacts_served_total", "source" => "local").increment(1);
            return stream_blob(reader);
        }
    }

    if state.upstream.configured() {
        if let Some(remote) = state.upstream.fetch(&path).await {
            let cache_path = format!("{BASE_PREFIX}/{AGGREGATE_NAME}/{path}");
            return stream_and_cache(state, cache_path, remote);
        }
    }

    StatusCode::NOT_FOUND.into_response()
}

async fn head_check<S>(
    State(state): State<Arc<ServiceState<S>>>,
    Path(path): Path<String>,
) -> StatusCode
where
    S: ArtifactStore + Send + Sync + 'static,
{
    let repos = aggregate_repos(&state.store, BASE_PREFIX).await;

    for repo in &repos {
        if let Ok(true) = state.store.head(&format!("{repo}/{path}")).await {
            return StatusCode::OK;
        }
    }

    if state.upstream.configured() && state.upstream.probe(&path).await {
        return StatusCode::OK;
    }

    StatusCode::NOT_FOUND
}
