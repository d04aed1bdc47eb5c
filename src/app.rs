#![cfg(feature = "web")]

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::Form;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::config::PortalConfig;
use crate::error::{ErrorKind, PortalError, Result};
use crate::fetcher::{FetchCache, TableSource, fetch_periods};
use crate::filter::{FilterSpec, filter_periods, project_periods};
use crate::google::{DriveUploader, GoogleSheets};
use crate::login::{UserCredentials, authenticate, verify_passphrase};
use crate::months::{ALL, checked_months, selectable_months};
use crate::pages::{DashboardView, LoginView, Message, Pages, SimpleView, choices};
use crate::role::Role;
use crate::session::{SESSION_COOKIE, Session, SessionStore};
use crate::table::{MergedTable, ProjectedTable};
use crate::uploader::{ImageStore, UploadPayload, dispatch_upload};

/// Everything a request handler can reach
pub struct AppState {
    pub config: Arc<PortalConfig>,
    pub sessions: SessionStore,
    pub cache: FetchCache,
    pub source: Arc<dyn TableSource>,
    pub store: Arc<dyn ImageStore>,
    pub pages: Pages,
}

impl AppState {
    pub fn new(
        config: PortalConfig,
        source: Arc<dyn TableSource>,
        store: Arc<dyn ImageStore>,
    ) -> Result<Self> {
        let lifetime = Duration::from_secs(config.server.session_hours * 60 * 60);
        Ok(AppState {
            config: Arc::new(config),
            sessions: SessionStore::new(lifetime),
            cache: FetchCache::new(),
            source,
            store,
            pages: Pages::new()?,
        })
    }
}

/// Data form of the dashboard
#[derive(Debug, Default, Deserialize)]
pub struct DataForm {
    #[serde(default)]
    pub months: Vec<String>,
    #[serde(default)]
    pub account: Option<String>,
}

/// Data form of the passphrase page
#[derive(Debug, Deserialize)]
pub struct SimpleDataForm {
    #[serde(default)]
    pub passphrase: String,
    #[serde(default)]
    pub month: String,
}

/// What a data request produced
#[derive(Debug, Clone, PartialEq)]
pub enum DataResult {
    /// Filtered, merged and transposed
    Merged(MergedTable),
    /// One projected table per period (admin, all accounts)
    Tables(Vec<ProjectedTable>),
}

#[derive(Serialize)]
struct DataResponse {
    status: &'static str,
    kind: Option<ErrorKind>,
    message: Option<String>,
    merged: Option<MergedTable>,
    tables: Vec<ProjectedTable>,
}

/// Build the router over an existing state
pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.server.max_upload_bytes;

    Router::new()
        .route("/", get(index))
        .route("/login", post(handle_login))
        .route("/data", post(handle_data))
        .route("/api/data", post(api_data))
        .route("/upload", post(handle_upload))
        .route("/logout", post(handle_logout))
        .route("/simple", get(serve_simple))
        .route("/simple/data", post(handle_simple_data))
        .route("/simple/upload", post(handle_simple_upload))
        .nest_service("/static", ServeDir::new("static"))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Serve the portal against the Google APIs until the process stops
pub async fn run(config: PortalConfig) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let bind_addr = config.server.bind_addr.clone();
    let source = Arc::new(GoogleSheets::new(config.google.clone()));
    let store = Arc::new(DriveUploader::new(config.google.clone()));
    let state = Arc::new(AppState::new(config, source, store)?);

    let app = router(state);

    let listener = TcpListener::bind(&bind_addr).await?;
    info!("Listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn session_id(jar: &CookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|id| !id.is_empty())
}

fn current_session(state: &AppState, jar: &CookieJar) -> Session {
    state
        .sessions
        .get(session_id(jar).as_deref().unwrap_or_default())
}

fn html(rendered: std::result::Result<String, String>) -> Response {
    match rendered {
        Ok(body) => Html(body).into_response(),
        Err(e) => {
            error!("{}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to render page").into_response()
        }
    }
}

fn login_page(state: &AppState, error: Option<String>) -> std::result::Result<String, String> {
    state.pages.login(&LoginView {
        error,
        show_simple: state.config.simple.is_some(),
    })
}

fn dashboard_view(
    state: &AppState,
    role: Role,
    months: &[String],
    account: Option<&str>,
) -> DashboardView {
    let view = role.view(&state.config);
    let accounts = if role.can_pick_account() {
        let mut names = vec![ALL.to_string()];
        names.extend(state.config.selections.values().cloned());
        let picked = account.unwrap_or(ALL).to_string();
        choices(&names, &[picked])
    } else {
        Vec::new()
    };

    DashboardView {
        months: choices(selectable_months(view.months), months),
        accounts,
        can_upload: role.can_upload(),
        ..Default::default()
    }
}

/// Fetch, then filter or project, for one data-form submission
pub async fn load_data(
    state: &AppState,
    role: Role,
    identity: &str,
    form: &DataForm,
) -> Result<DataResult> {
    let view = role.view(&state.config);
    let months = checked_months(&form.months, view.months)?;
    let batch = fetch_periods(state.source.as_ref(), &state.cache, &months).await?;

    let target = match role {
        Role::Main => identity.to_string(),
        Role::Admin => {
            let account = form.account.as_deref().unwrap_or(ALL);
            if account == ALL {
                let tables = project_periods(&batch, view.keep_columns, view.display_names)?;
                return Ok(DataResult::Tables(tables));
            }
            state
                .config
                .account_for_selection(account)
                .map(str::to_string)
                .ok_or_else(|| PortalError::Filter(format!("unknown account {}", account)))?
        }
    };

    let spec = FilterSpec::new(
        target,
        view.match_column,
        view.keep_columns,
        view.display_names,
    )?;
    Ok(DataResult::Merged(filter_periods(&batch, &spec)?))
}

async fn read_upload_form(
    mut multipart: Multipart,
) -> Result<(UploadPayload, HashMap<String, String>)> {
    let mut payload = UploadPayload::default();
    let mut fields = HashMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| PortalError::Upload(e.to_string()))?
    {
        let name = field.name().unwrap_or("unknown").to_string();
        if name == "file" {
            payload.file_name = field.file_name().unwrap_or_default().to_string();
            payload.content_type = field.content_type().unwrap_or_default().to_string();
            payload.bytes = field
                .bytes()
                .await
                .map_err(|e| PortalError::Upload(e.to_string()))?
                .to_vec();
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| PortalError::Upload(e.to_string()))?;
            fields.insert(name, value);
        }
    }

    Ok((payload, fields))
}

async fn upload_now(state: &AppState, payload: &UploadPayload) -> Result<String> {
    let at = chrono::Local::now().naive_local();
    dispatch_upload(state.store.as_ref(), &state.config.folder_id, payload, at).await
}

/// Login page when logged out, dashboard otherwise
async fn index(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let session = current_session(&state, &jar);
    match session.role() {
        Some(role) => {
            let view = dashboard_view(&state, role, &[], None);
            html(state.pages.dashboard(&view))
        }
        None => html(login_page(&state, None)),
    }
}

/// Check credentials and start a logged-in session
///
/// A fresh session id is issued on every successful login. The redirect to
/// `/` makes the browser load the dashboard.
async fn handle_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(credentials): Form<UserCredentials>,
) -> Response {
    match authenticate(&state.config, &credentials.username, &credentials.password) {
        Ok(outcome) => {
            if let Some(old) = session_id(&jar) {
                state.sessions.reset(&old);
            }
            let purged = state.sessions.purge_expired();
            if purged > 0 {
                info!("purged {} expired session(s)", purged);
            }

            let id = state.sessions.start();
            state.sessions.update(&id, outcome.session_update());
            info!("login succeeded ({:?})", outcome.role);

            let cookie = Cookie::build((SESSION_COOKIE, id))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax);
            (jar.add(cookie), Redirect::to("/")).into_response()
        }
        Err(err) => {
            warn!("login rejected");
            let page = login_page(&state, Some(err.to_string()));
            match page {
                Ok(body) => (StatusCode::UNAUTHORIZED, Html(body)).into_response(),
                Err(e) => html(Err(e)),
            }
        }
    }
}

async fn handle_data(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<DataForm>,
) -> Response {
    let session = current_session(&state, &jar);
    let Some(role) = session.role() else {
        return Redirect::to("/").into_response();
    };

    let mut view = dashboard_view(&state, role, &form.months, form.account.as_deref());
    match load_data(&state, role, &session.username, &form).await {
        Ok(DataResult::Merged(merged)) => view.merged = Some(merged),
        Ok(DataResult::Tables(tables)) => view.tables = tables,
        Err(err) => view.data_message = Some(Message::from(&err)),
    }
    html(state.pages.dashboard(&view))
}

async fn api_data(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<DataForm>,
) -> Response {
    let session = current_session(&state, &jar);
    let Some(role) = session.role() else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(DataResponse {
                status: "error",
                kind: Some(ErrorKind::Authentication),
                message: Some("Not logged in".to_string()),
                merged: None,
                tables: Vec::new(),
            }),
        )
            .into_response();
    };

    let response = match load_data(&state, role, &session.username, &form).await {
        Ok(DataResult::Merged(merged)) => DataResponse {
            status: "ok",
            kind: None,
            message: None,
            merged: Some(merged),
            tables: Vec::new(),
        },
        Ok(DataResult::Tables(tables)) => DataResponse {
            status: "ok",
            kind: None,
            message: None,
            merged: None,
            tables,
        },
        Err(err) => DataResponse {
            status: "error",
            kind: Some(err.kind()),
            message: Some(err.to_string()),
            merged: None,
            tables: Vec::new(),
        },
    };
    Json(response).into_response()
}

async fn handle_upload(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    multipart: Multipart,
) -> Response {
    let session = current_session(&state, &jar);
    let Some(role) = session.role() else {
        return Redirect::to("/").into_response();
    };

    let mut view = dashboard_view(&state, role, &[], None);
    let outcome = if role.can_upload() {
        match read_upload_form(multipart).await {
            Ok((payload, _)) => upload_now(&state, &payload).await,
            Err(err) => Err(err),
        }
    } else {
        Err(PortalError::Forbidden)
    };

    view.upload_message = Some(match outcome {
        Ok(_) => Message::success("SUCCESS uploading file."),
        Err(err) => Message::from(&err),
    });
    let mut response = html(state.pages.dashboard(&view));
    if !role.can_upload() && response.status() == StatusCode::OK {
        *response.status_mut() = StatusCode::FORBIDDEN;
    }
    response
}

/// Forget the session and every cached table
async fn handle_logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> (CookieJar, Redirect) {
    if let Some(id) = session_id(&jar) {
        state.sessions.reset(&id);
    }
    state.cache.clear();
    info!("logged out; fetch cache cleared");

    let cookie = Cookie::build(SESSION_COOKIE).path("/");
    (jar.remove(cookie), Redirect::to("/"))
}

fn simple_view(state: &AppState, month: &str) -> Option<SimpleView> {
    let simple = state.config.simple.as_ref()?;
    Some(SimpleView {
        months: choices(&simple.avail_months, &[month.to_string()]),
        ..Default::default()
    })
}

async fn serve_simple(State(state): State<Arc<AppState>>) -> Response {
    match simple_view(&state, "") {
        Some(view) => html(state.pages.simple(&view)),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn simple_data(state: &AppState, form: &SimpleDataForm) -> Result<ProjectedTable> {
    verify_passphrase(&state.config, &form.passphrase)?;
    let simple = state
        .config
        .simple
        .as_ref()
        .ok_or(PortalError::Passphrase)?;
    if form.month.trim().is_empty() {
        return Err(PortalError::EmptySelection);
    }
    if !simple.avail_months.contains(&form.month) {
        return Err(PortalError::UnknownMonth(form.month.clone()));
    }

    // The passphrase page never shares the session cache.
    let cache = FetchCache::new();
    let batch = fetch_periods(state.source.as_ref(), &cache, &[form.month.clone()]).await?;
    project_periods(&batch, &simple.cols, &simple.cols)?
        .into_iter()
        .next()
        .ok_or_else(|| PortalError::Projection("no data returned".to_string()))
}

async fn handle_simple_data(
    State(state): State<Arc<AppState>>,
    Form(form): Form<SimpleDataForm>,
) -> Response {
    let Some(mut view) = simple_view(&state, &form.month) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    view.data_open = true;
    match simple_data(&state, &form).await {
        Ok(table) => view.table = Some(table),
        Err(err) => view.data_message = Some(Message::from(&err)),
    }
    html(state.pages.simple(&view))
}

async fn handle_simple_upload(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Response {
    let Some(mut view) = simple_view(&state, "") else {
        return StatusCode::NOT_FOUND.into_response();
    };
    view.upload_open = true;

    let outcome = match read_upload_form(multipart).await {
        Ok((payload, fields)) => {
            let passphrase = fields.get("passphrase").map(String::as_str).unwrap_or_default();
            match verify_passphrase(&state.config, passphrase) {
                Ok(()) => upload_now(&state, &payload).await,
                Err(err) => Err(err),
            }
        }
        Err(err) => Err(err),
    };

    view.upload_message = Some(match outcome {
        Ok(_) => Message::success("SUCCESS uploading file."),
        Err(err) => Message::from(&err),
    });
    html(state.pages.simple(&view))
}
