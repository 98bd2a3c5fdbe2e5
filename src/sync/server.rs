// Server role: serve FETCH / REPLACE of the whole store over HTTP.

use super::DB_PATH;
use crate::db::Store;
use crate::snapshot::Snapshot;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Router exposing `GET /db` and `POST /db` for `store`
pub fn router(store: Store, max_snapshot_bytes: usize) -> Router {
    Router::new()
        .route(DB_PATH, get(fetch_store).post(replace_store))
        .layer(DefaultBodyLimit::max(max_snapshot_bytes))
        .with_state(store)
}

/// GET /db - the whole store file, byte for byte
async fn fetch_store(State(store): State<Store>) -> Response {
    match Snapshot::load(store.path()).await {
        Ok(snapshot) => {
            tracing::info!(
                bytes = snapshot.len(),
                fingerprint = %snapshot.short_fingerprint(),
                "serving store snapshot"
            );
            (
                [(header::CONTENT_TYPE, "application/octet-stream")],
                snapshot.into_bytes(),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, store = ?store.path(), "cannot read store for FETCH");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("cannot read store: {}", e),
            )
                .into_response()
        }
    }
}

/// POST /db - overwrite the store file with the request body.
///
/// No lock is taken: two concurrent replaces race and the last write wins.
async fn replace_store(State(store): State<Store>, headers: HeaderMap, body: Bytes) -> Response {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());

    let Some(declared) = declared else {
        tracing::warn!("REPLACE rejected: no Content-Length");
        return (StatusCode::LENGTH_REQUIRED, "Content-Length required").into_response();
    };

    if body.len() as u64 != declared {
        tracing::warn!(declared, received = body.len(), "REPLACE rejected: length mismatch");
        return (
            StatusCode::BAD_REQUEST,
            format!("declared {} bytes but received {}", declared, body.len()),
        )
            .into_response();
    }

    let snapshot = Snapshot::from_bytes(body.to_vec());
    match snapshot.replace_into(store.path()).await {
        Ok(()) => {
            tracing::info!(
                bytes = snapshot.len(),
                fingerprint = %snapshot.short_fingerprint(),
                "store replaced"
            );
            StatusCode::OK.into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, store = ?store.path(), "store write failed during REPLACE");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("cannot write store: {}", e),
            )
                .into_response()
        }
    }
}

// ============================================================================
// BACKGROUND LISTENER
// ============================================================================

/// A running listener; cancel its token (or call `shutdown`) to stop it
pub struct SyncServerHandle {
    local_addr: SocketAddr,
    token: CancellationToken,
    task: JoinHandle<std::io::Result<()>>,
}

impl SyncServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Wait until the listener exits (after its token is cancelled)
    pub async fn wait(self) -> std::io::Result<()> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(std::io::Error::new(std::io::ErrorKind::Other, e)),
        }
    }

    /// Cancel and wait for in-flight requests to finish
    pub async fn shutdown(self) {
        self.token.cancel();
        let addr = self.local_addr;
        if let Err(e) = self.wait().await {
            tracing::warn!(%addr, error = %e, "listener exited with error");
        }
    }
}

/// Serve `app` on `listener` in a background task until `token` is cancelled
pub fn spawn_server(
    listener: TcpListener,
    app: Router,
    token: CancellationToken,
) -> std::io::Result<SyncServerHandle> {
    let local_addr = listener.local_addr()?;
    let shutdown = token.clone();

    let task = tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await;
        tracing::info!(%local_addr, "listener stopped");
        result
    });

    tracing::info!(%local_addr, "listener started");
    Ok(SyncServerHandle {
        local_addr,
        token,
        task,
    })
}

/// Run the server role alone for `store`
pub fn spawn_sync_server(
    listener: TcpListener,
    store: Store,
    max_snapshot_bytes: usize,
    token: CancellationToken,
) -> std::io::Result<SyncServerHandle> {
    spawn_server(listener, router(store, max_snapshot_bytes), token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::util::ServiceExt;

    fn test_store(dir: &tempfile::TempDir) -> Store {
        Store::open(dir.path().join("server.db")).unwrap()
    }

    fn post_db(declared: Option<usize>, body: &'static [u8]) -> Request<Body> {
        let mut builder = Request::builder().method("POST").uri(DB_PATH);
        if let Some(len) = declared {
            builder = builder.header(header::CONTENT_LENGTH, len);
        }
        builder.body(Body::from(body)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_returns_exact_store_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir);
        let on_disk = std::fs::read(store.path()).unwrap();

        let response = router(store, 1024 * 1024)
            .oneshot(Request::builder().uri(DB_PATH).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/octet-stream"
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.as_ref(), on_disk.as_slice());
    }

    #[tokio::test]
    async fn test_replace_overwrites_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir);

        let response = router(store.clone(), 1024 * 1024)
            .oneshot(post_db(Some(9), b"new bytes"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
        assert_eq!(std::fs::read(store.path()).unwrap(), b"new bytes");
    }

    #[tokio::test]
    async fn test_replace_with_wrong_length_leaves_store_alone() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir);
        let before = std::fs::read(store.path()).unwrap();

        let response = router(store.clone(), 1024 * 1024)
            .oneshot(post_db(Some(100), b"short"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(std::fs::read(store.path()).unwrap(), before);
    }

    #[tokio::test]
    async fn test_replace_without_length_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir);
        let before = std::fs::read(store.path()).unwrap();

        let response = router(store.clone(), 1024 * 1024)
            .oneshot(post_db(None, b"bytes"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::LENGTH_REQUIRED);
        assert_eq!(std::fs::read(store.path()).unwrap(), before);
    }

    #[tokio::test]
    async fn test_replace_over_size_limit_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir);
        let before = std::fs::read(store.path()).unwrap();

        let response = router(store.clone(), 4)
            .oneshot(post_db(Some(9), b"new bytes"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(std::fs::read(store.path()).unwrap(), before);
    }

    #[tokio::test]
    async fn test_fetch_missing_store_is_server_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir);
        std::fs::remove_file(store.path()).unwrap();

        let response = router(store, 1024)
            .oneshot(Request::builder().uri(DB_PATH).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
