use std::{net::SocketAddr, sync::Arc};

use action_flow::metrics as cart_metrics;
use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use once_cell::sync::{Lazy, OnceCell};
use prometheus::{Encoder, Registry, TextEncoder};
use tokio::{net::TcpListener, task::JoinHandle};
use tracing::{error, info};

static GLOBAL_REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);
static REGISTER_ONCE: OnceCell<()> = OnceCell::new();

pub fn register_metrics() {
    REGISTER_ONCE.get_or_init(|| {
        cart_metrics::register_metrics(global_registry());
    });
}

pub fn spawn_metrics_server(port: u16) -> Option<JoinHandle<()>> {
    if port == 0 {
        return None;
    }

    register_metrics();
    let registry = Arc::new(global_registry().clone());
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(registry);

    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    info!(%addr, "metrics server listening");
    Some(tokio::spawn(async move {
        match TcpListener::bind(addr).await {
            Ok(listener) => {
                if let Err(err) = axum::serve(listener, app.into_make_service()).await {
                    error!(?err, "metrics server exited with error");
                }
            }
            Err(err) => {
                error!(?err, "failed to bind metrics listener");
            }
        }
    }))
}

/// Render the registry in the text exposition format
pub fn render(registry: &Registry) -> Result<(String, String), String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&registry.gather(), &mut buffer)
        .map_err(|err| err.to_string())?;
    let body = String::from_utf8(buffer).map_err(|err| err.to_string())?;
    Ok((encoder.format_type().to_string(), body))
}

async fn metrics_handler(State(registry): State<Arc<Registry>>) -> Response {
    let (format_type, body) = match render(&registry) {
        Ok(rendered) => rendered,
        Err(err) => {
            error!(%err, "failed to encode prometheus metrics");
            return (StatusCode::INTERNAL_SERVER_ERROR, "metric encode error").into_response();
        }
    };
    match HeaderValue::from_str(&format_type) {
        Ok(value) => ([(header::CONTENT_TYPE, value)], body).into_response(),
        Err(err) => {
            error!(?err, "failed to build content-type header");
            (StatusCode::INTERNAL_SERVER_ERROR, "metric encode error").into_response()
        }
    }
}

pub fn global_registry() -> &'static Registry {
    &GLOBAL_REGISTRY
}
