use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::transport::{RemoteRequest, Transport, TransportError};

/// Serves repeated requests from disk. Only successful payloads are stored; any cache I/O
/// failure falls through to the wrapped transport.
#[derive(Clone, Debug)]
pub struct CachingTransport<T> {
    inner: T,
    dir: PathBuf,
}

impl<T> CachingTransport<T> {
    pub fn new(inner: T, dir: impl Into<PathBuf>) -> Self {
        Self { inner, dir: dir.into() }
    }

    pub fn entry_path(&self, request: &RemoteRequest) -> PathBuf {
        self.dir.join(format!("{}.json", hash_key(request.cache_key())))
    }
}

fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[async_trait]
impl<T: Transport> Transport for CachingTransport<T> {
    async fn get_json(&self, request: &RemoteRequest) -> Result<Value, TransportError> {
        let path = self.entry_path(request);

        match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<Value>(&bytes) {
                Ok(payload) => {
                    debug!(
                        event_name = "gateway.cache.hit",
                        url = %request.url,
                        path = %path.display(),
                        "serving cached payload"
                    );
                    return Ok(payload);
                }
                Err(error) => warn!(
                    event_name = "gateway.cache.corrupt",
                    path = %path.display(),
                    error = %error,
                    "ignoring unreadable cache entry"
                ),
            },
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
            Err(error) => warn!(
                event_name = "gateway.cache.read_failed",
                path = %path.display(),
                error = %error,
                "cache read failed, bypassing cache"
            ),
        }

        let payload = self.inner.get_json(request).await?;

        if let Err(error) = write_entry(&self.dir, &path, &payload).await {
            warn!(
                event_name = "gateway.cache.write_failed",
                path = %path.display(),
                error = %error,
                "cache write failed, payload returned uncached"
            );
        }
        Ok(payload)
    }
}

async fn write_entry(dir: &Path, path: &Path, payload: &Value) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let bytes = serde_json::to_vec(payload).map_err(std::io::Error::other)?;
    tokio::fs::write(path, bytes).await
}
