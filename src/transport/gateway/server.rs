use super::handlers::{handle_disconnect, handle_health, handle_ice_candidate, handle_offer};
use super::websocket::{frames_handler, ws_handler};
use super::{AppState, MAX_BODY_SIZE, REQUEST_TIMEOUT_SECS};

use crate::app::AppContext;
use anyhow::{Context, Result};
use axum::{
    Router,
    http::StatusCode,
    routing::{get, post},
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Returns true when the bind address is not a loopback address.
pub(crate) fn is_public_bind(host: &str) -> bool {
    !matches!(
        host,
        "127.0.0.1" | "localhost" | "::1" | "[::1]" | "0:0:0:0:0:0:0:1"
    )
}

/// Bind `host:port` and serve until Ctrl-C, then shut the context down.
pub async fn run_gateway(host: &str, port: u16, ctx: Arc<AppContext>) -> Result<()> {
    if is_public_bind(host) && !ctx.config.gateway.allow_public_bind {
        anyhow::bail!(
            "Refusing to bind to {host}: the gateway has no authentication.\n\
             Fix: use --host 127.0.0.1 (default), or set\n\
             [gateway] allow_public_bind = true in config.toml."
        );
    }

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .context("parse gateway bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("bind gateway socket")?;

    run_gateway_with_listener(host, listener, ctx, async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %error, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    })
    .await
}

/// Serve on a pre-bound listener until `shutdown` resolves.
///
/// Sessions are closed as soon as the signal fires so that upgraded sockets
/// do not hold the server open.
pub async fn run_gateway_with_listener(
    host: &str,
    listener: tokio::net::TcpListener,
    ctx: Arc<AppContext>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let actual_port = listener
        .local_addr()
        .context("get gateway listener local address")?
        .port();
    print_gateway_banner(&format!("{host}:{actual_port}"), &ctx);

    let app = build_app(
        AppState {
            ctx: Arc::clone(&ctx),
        },
        &ctx.config.gateway.cors_origins,
    );

    let on_signal = Arc::clone(&ctx);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            tracing::info!("shutdown signal received");
            on_signal.shutdown().await;
        })
        .await
        .context("serve HTTP gateway")?;

    ctx.shutdown().await;
    Ok(())
}

fn print_gateway_banner(display_addr: &str, ctx: &AppContext) {
    println!("Gateway listening on {display_addr}");
    println!("  GET  /ws        -> control WebSocket");
    println!("  GET  /ws/frames -> frame stream");
    println!("  POST /offer");
    println!("  POST /ice-candidate");
    println!("  POST /disconnect");
    println!("  GET  /health");
    if ctx.signaling.is_available() {
        println!("  Peer transport enabled");
    } else {
        println!("  Peer transport disabled (signaling answers 503)");
    }
}

pub(crate) fn build_app(state: AppState, cors_origins: &[String]) -> Router {
    let mut app = Router::new()
        .route("/health", get(handle_health))
        .route("/ws", get(ws_handler))
        .route("/ws/frames", get(frames_handler))
        .route("/offer", post(handle_offer))
        .route("/ice-candidate", post(handle_ice_candidate))
        .route("/disconnect", post(handle_disconnect))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ));

    if !cors_origins.is_empty() {
        let origins: Vec<_> = cors_origins.iter().filter_map(|o| o.parse().ok()).collect();
        app = app.layer(
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
                .allow_headers([axum::http::header::CONTENT_TYPE]),
        );
    }

    app
}
