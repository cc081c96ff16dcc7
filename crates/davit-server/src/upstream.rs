use bytes::Bytes;
use futures_util::Stream;
use metrics::counter;
use std::pin::Pin;

pub type RemoteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

/// An artifact body accepted from a mirror, ready to relay.
pub struct RemoteArtifact {
    pub stream: RemoteStream,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
}

/// Walks the configured mirror list in order; the first acceptable answer
/// wins and later mirrors are never contacted.
#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    mirrors: Vec<String>,
}

impl UpstreamClient {
    pub fn new(mirrors: Vec<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            mirrors,
        }
    }

    pub fn configured(&self) -> bool {
        !self.mirrors.is_empty()
    }

    /// GET the artifact from the first mirror that answers 200 with a
    /// non-HTML body. HTML means the mirror rendered a directory index,
    /// which must never be cached as an artifact. Transport errors and
    /// non-200s fall through to the next mirror.
    pub async fn fetch(&self, artifact_path: &str) -> Option<RemoteArtifact> {
        for mirror in &self.mirrors {
            let url = format!("{}/{}", mirror.trim_end_matches('/'), artifact_path);
            let response = match self.http.get(&url).send().await {
                Ok(response) => response,
                Err(error) => {
                    tracing::debug!(%url, %error, "upstream mirror unreachable");
                    continue;
                }
            };
            if response.status() != reqwest::StatusCode::OK {
                tracing::debug!(%url, status = %response.status(), "upstream mirror miss");
                continue;
            }

            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned);
            if content_type
                .as_deref()
                .is_some_and(|ct| ct.starts_with("text/html"))
            {
                tracing::debug!(%url, "upstream returned an HTML index, skipping");
                continue;
            }

            counter!("davit_upstream_fetches_total").increment(1);
            return Some(RemoteArtifact {
                content_length: response.content_length(),
                content_type,
                stream: Box::pin(response.bytes_stream()),
            });
        }
        None
    }

    /// HEAD probe across the mirrors. No HTML filtering; nothing is cached
    /// on this path.
    pub async fn probe(&self, artifact_path: &str) -> bool {
        for mirror in &self.mirrors {
            let url = format!("{}/{}", mirror.trim_end_matches('/'), artifact_path);
            match self.http.head(&url).send().await {
                Ok(response) if response.status() == reqwest::StatusCode::OK => return true,
                Ok(_) | Err(_) => {}
            }
        }
        false
    }
}
