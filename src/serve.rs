//! Development server.
//!
//! A small `tiny_http` server over the output directory. `dev` pairs it with
//! the watcher:
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐
//! │   Main Thread   │     │  Watcher Thread  │
//! │  (HTTP Server)  │     │  (owns the Site) │
//! └────────┬────────┘     └────────┬─────────┘
//!          │                       │
//!          ▼                       ▼
//!    Serve files             Rebuild on change
//!          └───────────┬───────────┘
//!                      ▼
//!             config.build.output
//! ```
//!
//! Ctrl+C unblocks the server and sets the watcher's shutdown flag.

use crate::{
    build::build_site,
    config::SiteConfig,
    debug, error, info,
    logger::Logger,
    site::Site,
    watch::watch_blocking,
};
use anyhow::{Context, Result, anyhow};
use std::{
    fs,
    io::Cursor,
    net::{IpAddr, SocketAddr},
    path::{Component, Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};
use tiny_http::{Header, Request, Response, Server, StatusCode};

/// Try binding to port, retry with incremented port if in use
const MAX_PORT_RETRIES: u16 = 10;

// ============================================================================
// Entry Points
// ============================================================================

/// Serve the already built output directory until Ctrl+C.
pub fn serve_site(config: &SiteConfig, log: Logger) -> Result<()> {
    let (server, addr) = bind(config, log)?;
    let server = Arc::new(server);

    let server_for_signal = Arc::clone(&server);
    ctrlc::set_handler(move || {
        info!(log, "serve"; "shutting down...");
        server_for_signal.unblock();
    })
    .context("Failed to set Ctrl+C handler")?;

    info!(log, "serve"; "http://{addr}");
    serve_blocking(&server, &config.build.output, log);
    Ok(())
}

/// Build, then serve while a watcher thread rebuilds on change.
///
/// A failed initial build is logged; the loop still starts so the broken
/// file can be fixed.
pub fn dev_site(config: SiteConfig, log: Logger) -> Result<()> {
    let output = config.build.output.clone();
    let (server, addr) = bind(&config, log)?;
    let server = Arc::new(server);
    let shutdown = Arc::new(AtomicBool::new(false));

    let mut site = Site::load(config, log);
    if let Err(e) = build_site(&mut site) {
        error!(log, "build"; "{e:#}");
    }

    {
        let server = Arc::clone(&server);
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            info!(log, "serve"; "shutting down...");
            shutdown.store(true, Ordering::SeqCst);
            server.unblock();
        })
        .context("Failed to set Ctrl+C handler")?;
    }

    let watcher = {
        let shutdown = Arc::clone(&shutdown);
        thread::spawn(move || {
            if let Err(e) = watch_blocking(&mut site, &shutdown) {
                error!(log, "watch"; "{e:#}");
            }
        })
    };

    info!(log, "serve"; "http://{addr}");
    serve_blocking(&server, &output, log);

    shutdown.store(true, Ordering::SeqCst);
    if watcher.join().is_err() {
        error!(log, "watch"; "watcher thread panicked");
    }
    Ok(())
}

/// Bind `interface:port`, moving on to the next ports when taken.
fn bind(config: &SiteConfig, log: Logger) -> Result<(Server, SocketAddr)> {
    let interface: IpAddr = config
        .serve
        .interface
        .parse()
        .with_context(|| format!("invalid [serve.interface] `{}`", config.serve.interface))?;
    try_bind_port(interface, config.serve.port, MAX_PORT_RETRIES, log)
}

/// Try to bind to a port, retrying with incremented port numbers if in use.
fn try_bind_port(
    interface: IpAddr,
    base_port: u16,
    max_retries: u16,
    log: Logger,
) -> Result<(Server, SocketAddr)> {
    let mut last_err = None;
    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    info!(log, "serve"; "port {base_port} in use, using {port} instead");
                }
                return Ok((server, addr));
            }
            Err(e) => last_err = Some(e),
        }
    }

    Err(anyhow!(
        "Failed to bind after {max_retries} attempts (ports {base_port}-{}): {}",
        base_port.saturating_add(max_retries.saturating_sub(1)),
        last_err.map(|e| e.to_string()).unwrap_or_default()
    ))
}

/// Answer requests until the server is unblocked.
pub fn serve_blocking(server: &Server, root: &Path, log: Logger) {
    for request in server.incoming_requests() {
        if let Err(e) = handle_request(request, root, log) {
            error!(log, "serve"; "request error: {e}");
        }
    }
}

// ============================================================================
// Request Handling
// ============================================================================

/// Map a request URL onto a file under `root`.
///
/// Resolution order: exact file, then `index.html` of a directory. URLs that
/// would leave `root` never resolve.
fn resolve(root: &Path, url: &str) -> Option<PathBuf> {
    let decoded = urlencoding::decode(url).ok()?;
    let path = decoded.split(['?', '#']).next().unwrap_or_default();
    let rel = Path::new(path.trim_matches('/'));

    if rel.components().any(|c| !matches!(c, Component::Normal(_))) {
        return None;
    }

    let local = root.join(rel);
    if local.is_file() {
        return Some(local);
    }
    let index = local.join("index.html");
    index.is_file().then_some(index)
}

fn handle_request(request: Request, root: &Path, log: Logger) -> Result<()> {
    match resolve(root, request.url()) {
        Some(path) => serve_file(request, &path),
        None => {
            debug!(log, "serve"; "404 {}", request.url());
            serve_not_found(request)
        }
    }
}

// ============================================================================
// Response Helpers
// ============================================================================

fn content_type_header(value: &str) -> Result<Header> {
    Header::from_bytes("Content-Type", value).map_err(|()| anyhow!("invalid header `{value}`"))
}

/// Serve a file with appropriate content type.
fn serve_file(request: Request, path: &Path) -> Result<()> {
    let content = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let response =
        Response::from_data(content).with_header(content_type_header(guess_content_type(path))?);

    request.respond(response)?;
    Ok(())
}

/// Serve 404 Not Found response.
fn serve_not_found(request: Request) -> Result<()> {
    let response = Response::new(
        StatusCode(404),
        vec![content_type_header("text/plain")?],
        Cursor::new("404 Not Found"),
        Some(13),
        None,
    );
    request.respond(response)?;
    Ok(())
}

/// Guess MIME content type from file extension.
///
/// Returns `application/octet-stream` for unknown extensions.
fn guess_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        // Web content
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("xml") => "application/xml; charset=utf-8",

        // Images
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",

        // Fonts
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",

        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}
