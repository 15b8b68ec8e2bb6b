//! Development server with preview mode and live reload
//!
//! Serves the generated site from the public directory. The preview
//! handshake stores the CMS preview ref in a cookie; while it is set,
//! article pages are rendered on request from draft content instead of
//! being read from disk. A background task regenerates the site every
//! `revalidate_secs` and whenever `_config.yml` changes.

use anyhow::Result;
use axum::{
    body::Body,
    extract::{
        ws::{Message, WebSocket},
        Path, Query, State, WebSocketUpgrade,
    },
    http::{header, HeaderMap, Request, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Mutex};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::generator::Generator;
use crate::helpers::{encode_segment, url_for};
use crate::source::ContentSource;
use crate::store::{PaginationController, PostStore};
use crate::Blog;

/// Live reload script injected into HTML pages
const LIVE_RELOAD_SCRIPT: &str = r#"
<script>
(function() {
    var ws = new WebSocket('ws://' + location.host + '/__livereload');
    ws.onmessage = function(msg) {
        if (msg.data === 'reload') {
            location.reload();
        }
    };
    ws.onclose = function() {
        console.log('Live reload disconnected. Attempting to reconnect...');
        setTimeout(function() { location.reload(); }, 1000);
    };
})();
</script>
</body>
"#;

/// Server state
pub struct ServerState {
    base_dir: PathBuf,
    /// Swapped when `_config.yml` changes
    generator: RwLock<Arc<Generator>>,
    /// Serializes regeneration runs
    rebuild_lock: Mutex<()>,
    reload_tx: broadcast::Sender<()>,
    live_reload: bool,
}

impl ServerState {
    pub fn new(blog: &Blog, source: Arc<dyn ContentSource>, live_reload: bool) -> Result<Self> {
        let (reload_tx, _) = broadcast::channel::<()>(16);
        Ok(Self {
            base_dir: blog.base_dir.clone(),
            generator: RwLock::new(Arc::new(Generator::new(blog, source)?)),
            rebuild_lock: Mutex::new(()),
            reload_tx,
            live_reload,
        })
    }

    fn generator(&self) -> Arc<Generator> {
        self.generator
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn public_dir(&self) -> PathBuf {
        self.generator().blog().public_dir.clone()
    }
}

/// Start the development server
pub async fn start(blog: &Blog, ip: &str, port: u16, watch: bool, open: bool) -> Result<()> {
    let source = blog.source()?;
    let state = Arc::new(ServerState::new(blog, source, watch)?);

    let app = router(state.clone());

    // Parse address - handle "localhost" specially
    let bind_ip = if ip == "localhost" { "127.0.0.1" } else { ip };
    let addr: SocketAddr = format!("{}:{}", bind_ip, port).parse()?;

    let url = format!("http://{}:{}", ip, port);
    println!("Server running at {}", url);
    if watch {
        println!("Live reload enabled. Revalidating every {}s.", blog.config.revalidate_secs);
    }
    println!("Press Ctrl+C to stop.");

    // Open browser if requested
    if open {
        if let Err(e) = open_browser(&url) {
            tracing::warn!("Failed to open browser: {}", e);
        }
    }

    if watch {
        if blog.config.revalidate_secs > 0 {
            let every = Duration::from_secs(blog.config.revalidate_secs);
            tokio::spawn(revalidate_periodically(state.clone(), every));
        }

        let watch_state = state.clone();
        tokio::spawn(async move {
            if let Err(e) = watch_config(watch_state).await {
                tracing::error!("Config watcher error: {}", e);
            }
        });
    }

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/__livereload", get(livereload_handler))
        .route("/api/preview", get(preview_handler))
        .route("/api/exit-preview", get(exit_preview_handler))
        .route("/post/:uid", get(article_handler))
        .route("/post/:uid/", get(article_handler))
        .fallback(fallback_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Regenerate the site, reloading the configuration first if asked
async fn rebuild(state: &ServerState, reload_config: bool) -> Result<()> {
    let _running = state.rebuild_lock.lock().await;

    if reload_config {
        let blog = Blog::new(&state.base_dir)?;
        let source = blog.source()?;
        let generator = Arc::new(Generator::new(&blog, source)?);
        generator.generate().await?;
        *state.generator.write().unwrap_or_else(|e| e.into_inner()) = generator;
    } else {
        state.generator().generate().await?;
    }

    // Notify all connected clients to reload
    let _ = state.reload_tx.send(());
    Ok(())
}

async fn revalidate_periodically(state: Arc<ServerState>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    // The first tick completes immediately; the site was just generated
    interval.tick().await;

    loop {
        interval.tick().await;
        tracing::info!("Revalidating...");
        match rebuild(&state, false).await {
            Ok(()) => tracing::info!("Revalidated successfully"),
            Err(e) => tracing::error!("Revalidation failed: {:#}", e),
        }
    }
}

/// Watch `_config.yml` and regenerate with the new configuration
async fn watch_config(state: Arc<ServerState>) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();

    // Create debouncer to avoid multiple rapid rebuilds
    let mut debouncer = new_debouncer(
        Duration::from_millis(500),
        move |res: DebounceEventResult| {
            let _ = tx.send(res);
        },
    )?;

    // Editors often replace the file, so watch its directory
    debouncer
        .watcher()
        .watch(&state.base_dir, RecursiveMode::NonRecursive)?;
    tracing::debug!("Watching: {:?}", state.base_dir.join("_config.yml"));

    while let Some(res) = rx.recv().await {
        match res {
            Ok(events) => {
                let changed = events.iter().any(|e| {
                    e.path
                        .file_name()
                        .map(|name| name == "_config.yml")
                        .unwrap_or(false)
                });
                if !changed {
                    continue;
                }

                println!("\n📝 Configuration changed, regenerating...");
                match rebuild(&state, true).await {
                    Ok(()) => println!("✅ Regenerated successfully!"),
                    Err(e) => println!("❌ Generation failed: {:#}", e),
                }
            }
            Err(e) => {
                tracing::error!("Watch error: {:?}", e);
            }
        }
    }

    Ok(())
}

#[derive(Debug, Default, Deserialize)]
struct PreviewParams {
    token: Option<String>,
    #[serde(rename = "documentId")]
    document_id: Option<String>,
}

/// Start a preview session: validate the token, set the cookie and
/// redirect to the previewed document
async fn preview_handler(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<PreviewParams>,
) -> Response {
    let Some(token) = params.token.filter(|t| !t.is_empty()) else {
        return invalid_token();
    };
    let document_id = params.document_id.unwrap_or_default();

    let generator = state.generator();
    let redirect = match generator.source().resolve_preview(&token, &document_id).await {
        Ok(Some(path)) => safe_redirect(&path),
        Ok(None) => return invalid_token(),
        Err(e) => {
            tracing::error!("Preview resolution failed: {}", e);
            return (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({ "message": "Preview unavailable" })),
            )
                .into_response();
        }
    };

    let html = match generator.render_preview_redirect(&redirect) {
        Ok(html) => html,
        Err(e) => {
            tracing::error!("Failed to render preview redirect: {:#}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response();
        }
    };

    tracing::info!("Preview started for {}", redirect);
    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax",
        generator.blog().config.preview_cookie,
        encode_segment(&token)
    );
    ([(header::SET_COOKIE, cookie)], Html(html)).into_response()
}

/// End the preview session
async fn exit_preview_handler(State(state): State<Arc<ServerState>>) -> Response {
    let generator = state.generator();
    let config = &generator.blog().config;
    let cookie = format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
        config.preview_cookie
    );
    (
        [(header::SET_COOKIE, cookie)],
        Redirect::temporary(&url_for(config, "")),
    )
        .into_response()
}

fn invalid_token() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "message": "Invalid Token" })),
    )
        .into_response()
}

/// Keep redirects on this site and out of the markup they are written into
fn safe_redirect(path: &str) -> String {
    let unsafe_char = |c: char| matches!(c, '\'' | '"' | '<' | '>' | '\\' | ';') || c.is_control();
    if !path.starts_with('/') || path.starts_with("//") || path.chars().any(unsafe_char) {
        "/".to_string()
    } else {
        path.to_string()
    }
}

/// Preview ref carried by the request cookies, if any
fn preview_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .map(|(_, value)| {
            percent_encoding::percent_decode_str(value)
                .decode_utf8_lossy()
                .into_owned()
        })
        .filter(|token| !token.is_empty())
}

/// Article pages: live draft rendering in preview mode, static otherwise
async fn article_handler(
    State(state): State<Arc<ServerState>>,
    Path(uid): Path<String>,
    request: Request<Body>,
) -> Response {
    let cookie_name = state.generator().blog().config.preview_cookie.clone();
    let Some(token) = preview_token(request.headers(), &cookie_name) else {
        return fallback_handler(State(state), request).await;
    };

    match render_preview_article(&state, &uid, &token).await {
        Ok(Some(html)) => {
            let html = if state.live_reload {
                inject_live_reload(&html)
            } else {
                html
            };
            Html(html).into_response()
        }
        Ok(None) => fallback_handler(State(state), request).await,
        Err(e) => {
            tracing::warn!("Preview of {:?} failed, serving published page: {:#}", uid, e);
            fallback_handler(State(state), request).await
        }
    }
}

/// Render an article from the preview ref, with navigation from a
/// store filled from the same ref
async fn render_preview_article(
    state: &ServerState,
    uid: &str,
    token: &str,
) -> Result<Option<String>> {
    let generator = state.generator();
    let cms = &generator.blog().config.cms;
    let source = generator.source();

    let Some(raw) = source
        .get_by_uid(&cms.document_type, uid, Some(token))
        .await?
    else {
        return Ok(None);
    };

    let store = PostStore::new();
    let controller =
        PaginationController::load_first_page(store.clone(), source, cms, Some(token.to_string()))
            .await?;
    controller.load_all().await?;

    Ok(Some(generator.render_article(&raw, &store, true)?))
}

/// WebSocket handler for live reload
async fn livereload_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    let reload_rx = state.reload_tx.subscribe();
    ws.on_upgrade(move |socket| handle_livereload_socket(socket, reload_rx))
}

/// Handle WebSocket connection for live reload
async fn handle_livereload_socket(mut socket: WebSocket, mut reload_rx: broadcast::Receiver<()>) {
    tracing::debug!("Live reload client connected");

    loop {
        tokio::select! {
            // Wait for reload signal
            result = reload_rx.recv() => {
                match result {
                    Ok(_) => {
                        if socket.send(Message::Text("reload".to_string())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                }
            }
            // Handle incoming messages (ping/pong)
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
        }
    }

    tracing::debug!("Live reload client disconnected");
}

/// Fallback handler that serves files and injects live reload script
async fn fallback_handler(
    State(state): State<Arc<ServerState>>,
    request: Request<Body>,
) -> Response {
    let public_dir = state.public_dir();
    let path = request.uri().path();

    if path.split('/').any(|segment| segment == "..") {
        return (StatusCode::NOT_FOUND, "Not found").into_response();
    }

    // Determine the file path
    let file_path = if path == "/" {
        public_dir.join("index.html")
    } else {
        let clean_path = path.trim_start_matches('/');
        let candidate = public_dir.join(clean_path);

        // If it's a directory, look for index.html
        if candidate.is_dir() {
            candidate.join("index.html")
        } else {
            candidate
        }
    };

    let is_html = file_path
        .extension()
        .map(|ext| ext == "html" || ext == "htm")
        .unwrap_or(false);

    if is_html && state.live_reload {
        // Read and inject live reload script
        match tokio::fs::read_to_string(&file_path).await {
            Ok(content) => Html(inject_live_reload(&content)).into_response(),
            Err(_) => (StatusCode::NOT_FOUND, "Not found").into_response(),
        }
    } else {
        // Serve static file using tower-http
        let mut service = ServeDir::new(&public_dir).append_index_html_on_directories(true);
        match service.try_call(request).await {
            Ok(response) => response.into_response(),
            Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response(),
        }
    }
}

/// Inject live reload script into HTML content
fn inject_live_reload(html: &str) -> String {
    if html.contains("</body>") {
        html.replace("</body>", LIVE_RELOAD_SCRIPT)
    } else {
        // If no </body> tag, append to end
        format!("{}{}", html, LIVE_RELOAD_SCRIPT)
    }
}

/// Open a URL in the default browser
fn open_browser(url: &str) -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(url).spawn()?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(url).spawn()?;
    }

    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/c", "start", url])
            .spawn()?;
    }

    Ok(())
}
