use crate::listing::render_index;
use crate::upstream::RemoteArtifact;
use crate::ServiceState;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::put;
use axum::{Json, Router};
use davit_storage::{ArtifactStore, BlobReader, StorageError};
use futures_util::StreamExt;
use metrics::counter;
use serde::Serialize;
use std::io;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio_util::io::{ReaderStream, StreamReader};

/// Buffer between the response stream and the cache writer task.
const CACHE_PIPE_CAPACITY: usize = 64 * 1024;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

pub fn routes<S>() -> Router<Arc<ServiceState<S>>>
where
    S: ArtifactStore + Send + Sync + 'static,
{
    Router::new().route(
        "/repository/:repo/*path",
        put(upload).get(download).head(head_check),
    )
}

async fn upload<S>(
    State(state): State<Arc<ServiceState<S>>>,
    Path((repo, path)): Path<(String, String)>,
    body: Body,
) -> Response
where
    S: ArtifactStore + Send + Sync + 'static,
{
    let target = format!("repository/{repo}/{path}");

    let stream = body
        .into_data_stream()
        .map(|chunk| chunk.map_err(io::Error::other));
    let mut reader = StreamReader::new(stream);

    match state.store.save(&target, &mut reader).await {
        Ok(()) => {
            counter!("davit_artifact_uploads_total").increment(1);
            StatusCode::CREATED.into_response()
        }
        Err(error) => {
            tracing::error!(%target, %error, "failed to save artifact");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    error: format!("failed to save artifact: {error}"),
                }),
            )
                .into_response()
        }
    }
}

/// Directory probe, then local file, then upstream cache-fill, then 404.
async fn download<S>(
    State(state): State<Arc<ServiceState<S>>>,
    Path((repo, path)): Path<(String, String)>,
) -> Response
where
    S: ArtifactStore + Send + Sync + 'static,
{
    let full = format!("repository/{repo}/{path}");
    let mut probe_error = None;

    match state.store.list(&full).await {
        Ok(Some(entries)) if !entries.is_empty() => {
            return Html(render_index(&full, &entries)).into_response();
        }
        Ok(_) => {}
        Err(error) => probe_error = Some(error),
    }

    match state.store.get(&full).await {
        Ok(Some(reader)) => {
            counter!("davit_artifacts_served_total", "source" => "local").increment(1);
            return stream_blob(reader);
        }
        Ok(None) => {}
        Err(error) => probe_error = Some(error),
    }

    // The wildcard segment is already the upstream artifact path; the
    // repository prefix never leaves this server.
    if state.upstream.configured() {
        if let Some(remote) = state.upstream.fetch(&path).await {
            return stream_and_cache(state, full, remote);
        }
    }

    finish_miss(probe_error)
}

async fn head_check<S>(
    State(state): State<Arc<ServiceState<S>>>,
    Path((repo, path)): Path<(String, String)>,
) -> Response
where
    S: ArtifactStore + Send + Sync + 'static,
{
    let full = format!("repository/{repo}/{path}");
    let mut probe_error = None;

    match state.store.head(&full).await {
        Ok(true) => return StatusCode::OK.into_response(),
        Ok(false) => {}
        Err(error) => probe_error = Some(error),
    }

    if state.upstream.configured() && state.upstream.probe(&path).await {
        return StatusCode::OK.into_response();
    }

    match probe_error {
        Some(error) => {
            tracing::error!(%full, %error, "artifact head probe failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

pub(crate) fn stream_blob(reader: BlobReader) -> Response {
    (
        [(header::CONTENT_TYPE, "application/octet-stream")],
        Body::from_stream(ReaderStream::new(reader)),
    )
        .into_response()
}

/// Relay the mirror body to the client while teeing it into the local store.
///
/// The pipe's write end travels inside the response stream state, so it is
/// dropped (closing the pipe exactly once, which lets the cache task finish)
/// on upstream EOF, on upstream error, or when the client goes away
/// mid-body. Cache failures are strictly best-effort: a dead cache task only
/// makes the pipe writes error, which turns them off for the rest of the
/// response.
pub(crate) fn stream_and_cache<S>(
    state: Arc<ServiceState<S>>,
    cache_path: String,
    remote: RemoteArtifact,
) -> Response
where
    S: ArtifactStore + Send + Sync + 'static,
{
    let (pipe_writer, mut pipe_reader) = tokio::io::duplex(CACHE_PIPE_CAPACITY);

    {
        let state = Arc::clone(&state);
        let path = cache_path;
        tokio::spawn(async move {
            match state.store.save(&path, &mut pipe_reader).await {
                Ok(()) => tracing::debug!(%path, "cached upstream artifact"),
                Err(error) => {
                    counter!("davit_cache_write_errors_total").increment(1);
                    tracing::warn!(%path, %error, "failed to cache upstream artifact");
                }
            }
        });
    }

    let RemoteArtifact {
        stream,
        content_type,
        content_length,
    } = remote;

    counter!("davit_artifacts_served_total", "source" => "upstream").increment(1);

    let body = futures_util::stream::unfold(
        (stream, Some(pipe_writer)),
        |(mut stream, mut pipe)| async move {
            match stream.next().await {
                Some(Ok(chunk)) => {
                    // A failed pipe write means the cache task died; drop the
                    // writer and keep serving the client.
                    if let Some(mut writer) = pipe.take() {
                        if writer.write_all(&chunk).await.is_ok() {
                            pipe = Some(writer);
                        }
                    }
                    Some((Ok(chunk), (stream, pipe)))
                }
                Some(Err(error)) => Some((Err(io::Error::other(error)), (stream, None))),
                None => None,
            }
        },
    );

    let mut response = Response::builder().status(StatusCode::OK).header(
        header::CONTENT_TYPE,
        content_type.unwrap_or_else(|| "application/octet-stream".to_string()),
    );
    if let Some(length) = content_length {
        response = response.header(header::CONTENT_LENGTH, length);
    }
    response
        .body(Body::from_stream(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn finish_miss(probe_error: Option<StorageError>) -> Response {
    match probe_error {
        Some(error) => {
            tracing::error!(%error, "artifact resolution failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    error: error.to_string(),
                }),
            )
                .into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
