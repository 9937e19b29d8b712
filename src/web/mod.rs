//! Embedded web dashboard for obrcast.
//!
//! Provides a lightweight HTTP server (sync, via `tiny_http`) that serves:
//! - A single-page dashboard: forecast selector, growth-rate editor, charts
//! - JSON API endpoints proxying the remote forecast service
//!
//! Launched via `obrcast web` (default: `http://127.0.0.1:9810`). The page
//! submits analyses through the local proxy and polls in-flight
//! computations every 10 seconds, exactly as the deployed dashboard does.

pub mod api;
pub mod cache;
mod frontend;

use std::io::Cursor;
use std::time::Duration;

use anyhow::{Context, Result};
use tiny_http::{Header, Method, Response, Server, StatusCode};

use crate::api::ForecastApiClient;
use crate::config::ObrcastConfig;

// ---------------------------------------------------------------------------
// Server entry point
// ---------------------------------------------------------------------------

/// Start the dashboard server on the given address.
///
/// Blocks the current thread. Handles requests sequentially (sufficient for
/// a local single-user dashboard). Gracefully handles errors per-request
/// without crashing the server.
pub fn serve(addr: &str, config: &ObrcastConfig) -> Result<()> {
    let server = Server::http(addr)
        .map_err(|e| anyhow::anyhow!("failed to start HTTP server on {addr}: {e}"))?;

    let ctx = api::DashboardCtx {
        client: ForecastApiClient::from_config(&config.api),
        metadata_cache: cache::TtlCache::new(Duration::from_secs(config.web.cache_ttl_secs)),
    };
    let index_html = frontend::render(&config.rates, config.api.poll_interval_secs);

    println!("obrcast dashboard running at http://{addr}");
    println!("Proxying forecast API at {}", ctx.client.base_url());
    println!("Press Ctrl+C to stop.\n");

    if config.web.open_browser {
        let url = format!("http://{addr}");
        let _ = open_browser(&url);
    }

    for mut request in server.incoming_requests() {
        let method = request.method().clone();
        let url = request.url().to_string();

        // Read body up-front for methods that carry one
        let body = if matches!(method, Method::Put | Method::Post | Method::Patch) {
            let mut buf = String::new();
            let _ = request.as_reader().read_to_string(&mut buf);
            Some(buf)
        } else {
            None
        };

        let result = dispatch(&method, &url, body.as_deref(), &ctx, &index_html);

        match result {
            Ok(resp) => {
                let _ = request.respond(resp);
            }
            Err(e) => {
                let body = serde_json::json!({ "error": e.to_string() }).to_string();
                let resp = Response::from_data(body.into_bytes())
                    .with_header(content_type_json())
                    .with_status_code(StatusCode(502));
                let _ = request.respond(resp);
            }
        }

        // Brief access log
        println!(
            "{} {} {}",
            method,
            url,
            chrono::Local::now().format("%H:%M:%S")
        );
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Dispatch an incoming request to the appropriate handler.
fn dispatch(
    method: &Method,
    url: &str,
    body: Option<&str>,
    ctx: &api::DashboardCtx,
    index_html: &str,
) -> Result<Response<Cursor<Vec<u8>>>> {
    // Strip query string for path matching
    let path = url.split('?').next().unwrap_or(url);

    match (method, path) {
        // Frontend
        (&Method::Get, "/") | (&Method::Get, "/index.html") => Ok(serve_frontend(index_html)),

        // API — proxied forecast service
        (&Method::Get, "/api/forecasts") => api::get_forecasts(ctx),
        (&Method::Post, "/api/impact") => {
            let body = body.context("missing request body")?;
            api::post_impact(ctx, body)
        }

        // API — diagnostics
        (&Method::Get, "/api/health") => api::get_health(ctx),

        // 404
        _ => Ok(not_found()),
    }
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

/// Serve the rendered single-page frontend.
fn serve_frontend(index_html: &str) -> Response<Cursor<Vec<u8>>> {
    Response::from_data(index_html.as_bytes().to_vec())
        .with_header(content_type_html())
        .with_status_code(StatusCode(200))
}

/// 404 response.
fn not_found() -> Response<Cursor<Vec<u8>>> {
    let body = r#"{"error": "not found"}"#;
    Response::from_data(body.as_bytes().to_vec())
        .with_header(content_type_json())
        .with_status_code(StatusCode(404))
}

/// JSON content type header.
pub(crate) fn content_type_json() -> Header {
    Header::from_bytes("Content-Type", "application/json; charset=utf-8").unwrap()
}

/// HTML content type header.
fn content_type_html() -> Header {
    Header::from_bytes("Content-Type", "text/html; charset=utf-8").unwrap()
}

/// Attempt to open a URL in the system default browser.
fn open_browser(url: &str) -> Result<()> {
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", url])
            .spawn()
            .context("failed to open browser")?;
    }

    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open")
            .arg(url)
            .spawn()
            .context("failed to open browser")?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open")
            .arg(url)
            .spawn()
            .context("failed to open browser")?;
    }

    Ok(())
}
