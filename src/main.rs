mod routes;
mod models;
mod gemini;
mod prompt;
mod webhook;

use axum::http::{header, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use include_dir::{include_dir, Dir};
use routes::{api_router, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};
use tower_http::cors::{Any, CorsLayer};

use crate::gemini::{GeminiClient, DEMO_API_KEY};
use crate::webhook::WebhookNotifier;

static ASSETS: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/static");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Init tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let api_key = std::env::var("GEMINI_API_KEY").unwrap_or_else(|_| DEMO_API_KEY.into());
    tracing::info!("Using API key: {}...", &api_key[..std::cmp::min(10, api_key.len())]);

    let state = AppState {
        store: Arc::default(),
        generator: Arc::new(GeminiClient::new(api_key)),
        webhook: Arc::new(WebhookNotifier::from_env()),
        http: reqwest::Client::new(),
    };

    let app = api_router(state)
        .fallback(get(serve_asset))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        );

    let port: u16 = std::env::var("PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "Starting server");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}

/// Serves the embedded single-page form; unknown paths fall back to it.
async fn serve_asset(uri: Uri) -> Response {
    let path = uri.path().trim_start_matches('/');
    let path = if path.is_empty() { "index.html" } else { path };

    match ASSETS.get_file(path) {
        Some(file) => {
            ([(header::CONTENT_TYPE, content_type(path))], file.contents()).into_response()
        }
        None => {
            let index = ASSETS.get_file("index.html").expect("index.html embedded at build time");
            ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], index.contents()).into_response()
        }
    }
}

fn content_type(path: &str) -> &'static str {
    match path.rsplit('.').next() {
        Some("html") => "text/html; charset=utf-8",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}
