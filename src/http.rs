//! HTTP surface over [`LogService`].
//!
//! | Route             | Query                              | Result                         |
//! |-------------------|------------------------------------|--------------------------------|
//! | `/`               |                                    | plain-text help and file links |
//! | `/listAllFile`    |                                    | record metadata                |
//! | `/getFile`        | `file`, `json`                     | cached tail                    |
//! | `/filterFromFile` | `file`, `filter`, `reverse`, `json`| filter scan from disk          |
//! | `/changeLine`     | `line`                             | new tail depth                 |
//! | `/getLinePrinted` |                                    | current configuration          |
//!
//! Boolean flags are enabled by `on` or `true`. JSON bodies use the [`Status`] envelope.

pub mod status;

pub use status::{ApiError, Status};

use crate::config::ServerConfig;
use crate::error::{Result, RltailError};
use crate::service::LogService;
use axum::extract::{Query, Request, State};
use axum::http::{header, HeaderName, HeaderValue, StatusCode, Uri};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;

/// Ports tried in order when the configured one cannot be bound
pub const FALLBACK_PORT_FIRST: u16 = 8081;
pub const FALLBACK_PORT_LAST: u16 = 8090;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Response header carrying the server version
pub const VERSION_HEADER: HeaderName = HeaderName::from_static("rltail");

#[derive(Clone)]
struct AppState {
    service: Arc<LogService>,
    base_url: Arc<str>,
}

/// Build the router; `base_url` is used for the links on the help page.
pub fn router(service: Arc<LogService>, base_url: impl Into<Arc<str>>) -> Router {
    let state = AppState {
        service,
        base_url: base_url.into(),
    };
    Router::new()
        .route("/", get(home))
        .route("/listAllFile", get(list_all_files))
        .route("/getFile", get(get_file))
        .route("/filterFromFile", get(filter_from_file))
        .route("/changeLine", get(change_line))
        .route("/getLinePrinted", get(get_line_printed))
        .fallback(unknown_route)
        .layer(middleware::from_fn(log_request))
        .layer(CompressionLayer::new())
        .with_state(state)
}

/// Bind the configured address (falling back to the spare port range) and serve
/// until `shutdown` resolves.
pub async fn serve<F>(service: Arc<LogService>, server: &ServerConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = bind(server).await?;
    let port = listener
        .local_addr()
        .map_err(|e| RltailError::file_error("Listener has no local address", e))?
        .port();
    let base_url = format!("http://{}:{}", server.host, port);
    info!("Serving {} files on {}", service.list_records().len(), base_url);

    axum::serve(listener, router(service, base_url))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| RltailError::file_error("HTTP server failed", e))
}

async fn bind(server: &ServerConfig) -> Result<TcpListener> {
    let candidates = std::iter::once(server.port)
        .chain(FALLBACK_PORT_FIRST..=FALLBACK_PORT_LAST)
        .filter(|&port| port != 0 || server.port == 0);

    let mut last_error = None;
    for port in candidates {
        match TcpListener::bind((server.host.as_str(), port)).await {
            Ok(listener) => {
                if port != server.port {
                    warn!("Port {} seems used, bound {} instead", server.port, port);
                }
                return Ok(listener);
            }
            Err(e) => {
                debug!("Cannot bind {}:{}: {}", server.host, port, e);
                last_error = Some(e);
            }
        }
    }

    Err(RltailError::file_error(
        format!("Unable to bind any port on {}", server.host),
        last_error.unwrap_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::AddrInUse, "no port available")
        }),
    ))
}

/// `on` / `true`, case-insensitive
pub fn flag_enabled(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.eq_ignore_ascii_case("on") || v.eq_ignore_ascii_case("true"))
}

async fn log_request(request: Request, next: Next) -> Response {
    info!("REQUEST --> {} {}", request.method(), request.uri());
    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(VERSION_HEADER, HeaderValue::from_static(crate::VERSION));
    response
}

/// `/getFile` link for `path`, percent-encoded so any file name survives the query string
fn file_link(base: &str, path: &Path) -> String {
    format!(
        "{}/getFile?file={}",
        base,
        urlencoding::encode(&path.to_string_lossy())
    )
}

fn text(code: StatusCode, body: impl IntoResponse) -> Response {
    (code, [(header::CONTENT_TYPE, TEXT_PLAIN)], body).into_response()
}

fn help_page(state: &AppState) -> String {
    let base = &state.base_url;
    let mut page = format!(
        "Welcome to rltail!\n\
         API List!\n\
         {base}/listAllFile -> Return all file managed in a json format\n\
         {base}/getFile?file=file_name&json=on -> Return the file log lines (optional: json)\n\
         {base}/filterFromFile?file=file_name&filter=toFilter&reverse=on&json=on -> Filter text from the given file (optional: reverse, json)\n\
         {base}/changeLine?line=100 -> Change the number of line printed to 100\n\
         {base}/getLinePrinted -> Return the number of line printed for every log\n"
    );
    for record in state.service.list_records() {
        let _ = writeln!(page, "{}", file_link(base, &record.path));
    }
    page
}

async fn home(State(state): State<AppState>) -> Response {
    text(StatusCode::OK, help_page(&state))
}

async fn unknown_route(State(state): State<AppState>, uri: Uri) -> Response {
    debug!("Unknown route {}", uri);
    let body = format!("The url {} does not exist :(\n{}", uri, help_page(&state));
    text(StatusCode::NOT_FOUND, body)
}

async fn list_all_files(State(state): State<AppState>) -> Response {
    Json(Status::ok(state.service.list_records())).into_response()
}

#[derive(Debug, Deserialize)]
struct GetFileParams {
    file: Option<String>,
    json: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct FileData {
    name: String,
    data: String,
    timestamp: Option<i64>,
}

async fn get_file(State(state): State<AppState>, Query(params): Query<GetFileParams>) -> Response {
    let Some(file) = params.file.filter(|file| !file.is_empty()) else {
        return status::missing_parameter("file", "/getFile?file=file_name");
    };

    match state.service.get_snapshot(Path::new(&file)) {
        Ok(view) if flag_enabled(params.json.as_deref()) => Json(Status::ok(FileData {
            name: view.info.name,
            data: String::from_utf8_lossy(&view.data).into_owned(),
            timestamp: view.info.last_modified,
        }))
        .into_response(),
        Ok(view) => text(StatusCode::OK, view.data),
        Err(e) => {
            warn!("getFile {} failed: {}", file, e);
            ApiError::from(e).into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct FilterParams {
    file: Option<String>,
    filter: Option<String>,
    reverse: Option<String>,
    json: Option<String>,
}

async fn filter_from_file(
    State(state): State<AppState>,
    Query(params): Query<FilterParams>,
) -> Response {
    let file = params.file.filter(|file| !file.is_empty());
    let pattern = params.filter.filter(|pattern| !pattern.is_empty());
    let (Some(file), Some(pattern)) = (file, pattern) else {
        return status::missing_parameter(
            "file,filter",
            "/filterFromFile?file=file_name&filter=to_filter",
        );
    };
    let reverse = flag_enabled(params.reverse.as_deref());

    match state
        .service
        .filter(Path::new(&file), &pattern, reverse)
        .await
    {
        Ok(outcome) if flag_enabled(params.json.as_deref()) => {
            Json(Status::ok(outcome)).into_response()
        }
        Ok(outcome) => text(StatusCode::OK, outcome.to_text()),
        Err(e) => {
            warn!("filterFromFile {} failed: {}", file, e);
            ApiError::from(e).into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChangeLineParams {
    line: Option<String>,
}

async fn change_line(
    State(state): State<AppState>,
    Query(params): Query<ChangeLineParams>,
) -> Response {
    let Some(line) = params.line.filter(|line| !line.is_empty()) else {
        return status::missing_parameter("line", "/changeLine?line=200");
    };

    let result = line
        .trim()
        .parse::<usize>()
        .map_err(|e| RltailError::invalid_argument(format!("line {line:?}: {e}")))
        .and_then(|depth| state.service.change_tail_depth(depth));

    match result {
        Ok(config) => Json(Status::ok_with_description(
            format!("Tail depth changed to {}", config.tail_depth),
            config.as_ref(),
        ))
        .into_response(),
        Err(error) => {
            let current = state.service.current_config();
            ApiError {
                error,
                data: Some(current.as_ref()),
            }
            .into_response()
        }
    }
}

async fn get_line_printed(State(state): State<AppState>) -> Response {
    let config = state.service.current_config();
    Json(Status::ok(config.as_ref())).into_response()
}
