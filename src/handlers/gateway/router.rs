//! HTTP surface of the gateway.
//!
//! One route, `/`, for every verb. Replies are always `200` with a JSON
//! content type; failures travel in an `{"error": ...}` body.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, RawQuery, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::{Gateway, GatewayRequest};
use crate::utils::bootstrap::shutdown_signal;

/// Build the gateway router (separated for testing).
pub fn router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route("/", any(handle))
        .layer(TraceLayer::new_for_http())
        .with_state(gateway)
}

/// Serve the gateway on `bind_address` until Ctrl-C.
pub async fn serve(
    gateway: Arc<Gateway>,
    bind_address: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    let local = listener.local_addr()?;
    info!(address = %local, "Gateway listening");

    axum::serve(
        listener,
        router(gateway).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Gateway stopped");
    Ok(())
}

async fn handle(
    State(gateway): State<Arc<Gateway>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    method: Method,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    let peer_port = peer.map(|ConnectInfo(addr)| addr.port());

    let result = match GatewayRequest::parse(&method, &headers, query.as_deref(), &body, peer_port)
    {
        Ok(request) => gateway.handle(request).await,
        Err(e) => Err(e),
    };

    let body = match result {
        Ok(reply) => reply.into_body(),
        Err(e) => {
            warn!(method = %method, error = %e, "Gateway request failed");
            e.to_body().to_string()
        }
    };

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response()
}
