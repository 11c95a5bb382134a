#![cfg(feature = "web")]
use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, SystemTime};
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::dashboard::ChartKind;
use crate::downloader;
use crate::error::{DashboardError, Result};
use crate::filter::FilterSelection;
use crate::graph;
use crate::session::{Page, SessionContext, render};

/// Name of the cookie carrying the session id.
pub const SESSION_COOKIE: &str = "session";

type SharedContext = Arc<Mutex<SessionContext>>;

/// A live session, the time it expires and when it was last used.
struct SessionEntry {
    context: SharedContext,
    expires_at: SystemTime,
    last_used: u64,
}

/// Per-user dashboard state, keyed by session id.
///
/// The map lock is held only while looking up, inserting or purging an
/// entry. Each session's context has its own lock. At most `capacity`
/// sessions are kept; the least recently used one is evicted first.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionEntry>>,
    ttl: Duration,
    capacity: usize,
    clock: AtomicU64,
}

impl SessionStore {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        SessionStore {
            sessions: RwLock::new(HashMap::new()),
            ttl,
            capacity: capacity.max(1),
            clock: AtomicU64::new(0),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Look up a live session and push its expiry forward.
    ///
    /// # Returns
    /// * `Option<SharedContext>` - The session context if the id is known and not expired
    fn get(&self, session_id: &str) -> Option<SharedContext> {
        let now = SystemTime::now();
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);

        let expired = match sessions.get_mut(session_id) {
            Some(entry) if entry.expires_at > now => {
                entry.expires_at = now + self.ttl;
                entry.last_used = self.tick();
                return Some(Arc::clone(&entry.context));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            sessions.remove(session_id);
        }
        None
    }

    /// Create a fresh session, purging expired ones first and evicting the
    /// least recently used ones while the store is full.
    ///
    /// # Returns
    /// * `(String, SharedContext)` - The new session id and its empty context
    fn create(&self) -> (String, SharedContext) {
        let now = SystemTime::now();
        let session_id = Uuid::new_v4().to_string();
        let context = Arc::new(Mutex::new(SessionContext::new()));

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, entry| entry.expires_at > now);
        if sessions.len() < before {
            log::debug!("purged {} expired sessions", before - sessions.len());
        }
        while sessions.len() >= self.capacity {
            let Some(oldest) = sessions
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(id, _)| id.clone())
            else {
                break;
            };
            sessions.remove(&oldest);
            log::info!("session store full, evicted least recently used session");
        }
        sessions.insert(
            session_id.clone(),
            SessionEntry {
                context: Arc::clone(&context),
                expires_at: now + self.ttl,
                last_used: self.tick(),
            },
        );

        (session_id, context)
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct AppState {
    pub config: ServerConfig,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let sessions = SessionStore::new(config.session_ttl(), config.max_sessions);
        AppState { config, sessions }
    }

    /// The caller's session, creating one (and its cookie) when the cookie is
    /// missing, unknown or expired.
    fn session(&self, jar: CookieJar) -> (CookieJar, SharedContext) {
        if let Some(context) = jar
            .get(SESSION_COOKIE)
            .and_then(|cookie| self.sessions.get(cookie.value()))
        {
            return (jar, context);
        }

        let (session_id, context) = self.sessions.create();
        let cookie = Cookie::build((SESSION_COOKIE, session_id))
            .path("/")
            .http_only(true)
            .build();
        (jar.add(cookie), context)
    }
}

fn lock(context: &SharedContext) -> MutexGuard<'_, SessionContext> {
    context.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Serialize)]
struct ErrorResponse {
    status: String,
    message: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            status: "error".to_string(),
            message: message.into(),
        }),
    )
        .into_response()
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let status = match &self {
            DashboardError::MissingColumn { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            DashboardError::Parse(_) => StatusCode::BAD_REQUEST,
            DashboardError::Io(_) | DashboardError::Export(_) | DashboardError::Render(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        error_response(status, self.to_string())
    }
}

#[derive(Deserialize)]
struct PageRequest {
    page: Page,
}

#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ExportFormat {
    #[default]
    Csv,
    Xlsx,
}

#[derive(Deserialize)]
struct ExportQuery {
    #[serde(default)]
    format: ExportFormat,
}

/// Build the application router.
///
/// # Arguments
/// * `state` - Shared server state (configuration and session store)
///
/// # Returns
/// * `Router` - All dashboard routes plus the static asset directory
pub fn router(state: Arc<AppState>) -> Router {
    let static_dir = ServeDir::new(&state.config.static_dir);
    let upload_limit = state.config.max_upload_bytes();

    Router::new()
        .route("/", get(serve_index))
        .route("/api/view", get(get_view))
        .route("/api/upload", post(upload_file))
        .route("/api/filters", post(update_filters))
        .route("/api/page", post(navigate))
        .route("/api/chart/:kind", get(get_chart))
        .route("/api/export/:kind", get(export_view))
        .nest_service("/static", static_dir)
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(state)
}

pub async fn run(config: ServerConfig) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let bind = config.bind.clone();
    let app = router(Arc::new(AppState::new(config)));

    let listener = TcpListener::bind(bind.as_str()).await?;
    log::info!("Listening on http://{}", bind);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn serve_index() -> Html<&'static str> {
    Html(include_str!("./static/index.html"))
}

fn view_response(context: &SessionContext) -> Response {
    match render(context) {
        Ok(view) => Json(view).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn get_view(State(state): State<Arc<AppState>>, jar: CookieJar) -> (CookieJar, Response) {
    let (jar, context) = state.session(jar);
    let response = view_response(&lock(&context));
    (jar, response)
}

/// Pull the `file` field out of a multipart upload.
async fn read_upload(multipart: &mut Multipart) -> Result<(String, Bytes)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| DashboardError::parse(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| DashboardError::parse(e.to_string()))?;
        return Ok((file_name, bytes));
    }
    Err(DashboardError::parse("upload has no `file` field"))
}

async fn upload_file(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut multipart: Multipart,
) -> (CookieJar, Response) {
    let (jar, context) = state.session(jar);

    let (file_name, bytes) = match read_upload(&mut multipart).await {
        Ok(upload) => upload,
        Err(e) => {
            log::warn!("rejected upload: {}", e);
            return (jar, e.into_response());
        }
    };

    let response = {
        let mut context = lock(&context);
        match context.upload(&file_name, &bytes) {
            Ok(rows) => {
                log::info!("session loaded {} rows from {}", rows, file_name);
                view_response(&context)
            }
            Err(e) => {
                log::warn!("rejected upload {}: {}", file_name, e);
                e.into_response()
            }
        }
    };
    (jar, response)
}

async fn update_filters(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(selection): Json<FilterSelection>,
) -> (CookieJar, Response) {
    let (jar, context) = state.session(jar);
    let response = {
        let mut context = lock(&context);
        context.set_selection(selection);
        view_response(&context)
    };
    (jar, response)
}

async fn navigate(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(request): Json<PageRequest>,
) -> (CookieJar, Response) {
    let (jar, context) = state.session(jar);
    let response = {
        let mut context = lock(&context);
        context.navigate(request.page);
        view_response(&context)
    };
    (jar, response)
}

fn no_upload() -> Response {
    error_response(StatusCode::NOT_FOUND, "no file has been uploaded")
}

fn chart_response(context: &SessionContext, chart: ChartKind) -> Result<Response> {
    let Some(dashboard) = context.dashboard()? else {
        return Ok(no_upload());
    };
    Ok(match graph::render_chart(&dashboard, chart)? {
        Some(svg) => ([(header::CONTENT_TYPE, "image/svg+xml")], svg).into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("chart `{}` has no data for this file", chart.slug()),
        ),
    })
}

async fn get_chart(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(kind): Path<String>,
) -> (CookieJar, Response) {
    let (jar, context) = state.session(jar);
    let Some(chart) = ChartKind::from_slug(&kind) else {
        return (
            jar,
            error_response(StatusCode::NOT_FOUND, format!("unknown chart `{}`", kind)),
        );
    };

    let response =
        chart_response(&lock(&context), chart).unwrap_or_else(IntoResponse::into_response);
    (jar, response)
}

fn export_response(
    context: &SessionContext,
    chart: ChartKind,
    format: ExportFormat,
) -> Result<Response> {
    let Some(dashboard) = context.dashboard()? else {
        return Ok(no_upload());
    };
    let Some(view) = dashboard.dataset(chart) else {
        return Ok(error_response(
            StatusCode::NOT_FOUND,
            format!("view `{}` has no data for this file", chart.slug()),
        ));
    };

    let (content_type, extension, body) = match format {
        ExportFormat::Csv => (
            "text/csv; charset=utf-8",
            "csv",
            downloader::to_csv(view)?.into_bytes(),
        ),
        ExportFormat::Xlsx => (
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            "xlsx",
            downloader::to_xlsx(view)?,
        ),
    };
    let disposition = format!("attachment; filename=\"{}.{}\"", chart.slug(), extension);

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

async fn export_view(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(kind): Path<String>,
    Query(query): Query<ExportQuery>,
) -> (CookieJar, Response) {
    let (jar, context) = state.session(jar);
    let Some(chart) = ChartKind::from_slug(&kind) else {
        return (
            jar,
            error_response(StatusCode::NOT_FOUND, format!("unknown view `{}`", kind)),
        );
    };

    let response = export_response(&lock(&context), chart, query.format)
        .unwrap_or_else(IntoResponse::into_response);
    (jar, response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_session_id_is_not_found() {
        let store = SessionStore::new(Duration::from_secs(60), 8);
        assert!(store.get("nope").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_created_session_is_found_again() {
        let store = SessionStore::new(Duration::from_secs(60), 8);
        let (id, context) = store.create();
        let again = store.get(&id).unwrap();
        assert!(Arc::ptr_eq(&context, &again));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_expired_sessions_are_dropped() {
        let store = SessionStore::new(Duration::ZERO, 8);
        let (id, _) = store.create();
        assert!(store.get(&id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_full_store_evicts_least_recently_used() {
        let store = SessionStore::new(Duration::from_secs(60), 2);
        let (first, _) = store.create();
        let (second, _) = store.create();
        // Touching the first session makes the second the oldest.
        assert!(store.get(&first).is_some());

        let (third, _) = store.create();

        assert_eq!(store.len(), 2);
        assert!(store.get(&second).is_none());
        assert!(store.get(&first).is_some());
        assert!(store.get(&third).is_some());
    }

    #[test]
    fn test_error_status_codes() {
        let missing = DashboardError::missing_column("Dia").into_response();
        assert_eq!(missing.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let parse = DashboardError::parse("bad").into_response();
        assert_eq!(parse.status(), StatusCode::BAD_REQUEST);
        let export = DashboardError::Export("disk".into()).into_response();
        assert_eq!(export.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
