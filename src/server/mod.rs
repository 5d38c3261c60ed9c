//! HTTP + WebSocket transport: viewer page, raw frame, detection stream.
//!
//! Runs on the tokio runtime while the pipeline owns its own thread. The only
//! things crossing over are the latest-frame snapshot and the broadcast hub.

pub mod hub;
pub mod viewer;

use std::future::Future;
use std::net::SocketAddr;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use color_eyre::Result;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::capture::frame::Resolution;
use crate::pipeline::LatestFrame;

pub use hub::WsHub;

/// Shared state backing HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub latest: LatestFrame,
    pub hub: WsHub,
    /// Model input resolution substituted into the viewer page
    pub model: Resolution,
    /// Flips to `true` when the process is shutting down
    pub shutdown: watch::Receiver<bool>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/shot", get(shot))
        .route("/ws", get(ws_route))
        .with_state(state)
}

/// Bind and serve until `shutdown` resolves.
pub async fn serve(
    bind_addr: &str,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    let addr = listener.local_addr()?;
    info!("Web server listening on http://{}", addr);
    info!("Raw frame endpoint: http://{}/shot", addr);
    info!("Detection stream: ws://{}/ws", addr);

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;
    Ok(())
}

pub async fn index(State(state): State<AppState>) -> Html<String> {
    Html(viewer::render(state.model))
}

/// Most recent compressed frame, or a 500 when nothing was captured yet.
pub async fn shot(State(state): State<AppState>) -> Response {
    match state.latest.load_full() {
        Some(frame) => (
            [(header::CONTENT_TYPE, "image/jpeg")],
            Bytes::clone(&frame),
        )
            .into_response(),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/plain")],
            "No frame captured yet",
        )
            .into_response(),
    }
}

async fn ws_route(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| session(socket, addr, state))
}

async fn session(socket: WebSocket, addr: SocketAddr, state: AppState) {
    let (id, mut payloads) = state.hub.subscribe();
    let mut shutdown = state.shutdown.clone();
    info!("WebSocket client #{} connected from {}", id, addr);

    let (mut sink, mut incoming) = socket.split();
    loop {
        tokio::select! {
            payload = payloads.recv() => match payload {
                Ok(text) => {
                    if sink.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(client = id, skipped, "subscriber lagging, payloads dropped");
                }
                Err(RecvError::Closed) => break,
            },
            message = incoming.next() => match message {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            _ = shutdown.changed() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
        }
    }

    info!("WebSocket client #{} disconnected", id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use arc_swap::ArcSwapOption;
    use std::sync::Arc;

    fn state(latest: LatestFrame) -> AppState {
        let (_tx, shutdown) = watch::channel(false);
        AppState {
            latest,
            hub: WsHub::new(4),
            model: Resolution::new(96, 96),
            shutdown,
        }
    }

    #[tokio::test]
    async fn shot_without_frame_is_server_error() {
        let latest: LatestFrame = Arc::new(ArcSwapOption::empty());
        let response = shot(State(state(latest))).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
    }

    #[tokio::test]
    async fn shot_serves_latest_jpeg() {
        let latest: LatestFrame = Arc::new(ArcSwapOption::empty());
        latest.store(Some(Arc::new(Bytes::from_static(b"\xff\xd8\xff\xd9"))));
        let response = shot(State(state(latest))).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
        assert!(response.headers().get(header::CACHE_CONTROL).is_none());
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"\xff\xd8\xff\xd9");
    }

    #[tokio::test]
    async fn index_renders_regardless_of_pipeline() {
        let latest: LatestFrame = Arc::new(ArcSwapOption::empty());
        let Html(page) = index(State(state(latest))).await;
        assert!(page.contains("modelWidth = 96, modelHeight = 96"));
    }
}
