use anyhow::Result;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tracing::{debug, error};

use axum_extra::extract::cookie::{Cookie, SameSite};

use axum::{
    body::Body,
    extract::{Path, State},
    http::{response, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::session::{Session, COOKIE_SESSION_TOKEN_KEY};
use super::state::*;
use super::{log_requests, RequestsLoggingLevel, ServerConfig};
use crate::auth::{AuthManager, AuthTokenValue};
use crate::library::{
    FavoriteKind, LibraryError, LibraryStore, NewAlbum, NewArtist, NewTrack, PublicUser,
};

impl IntoResponse for LibraryError {
    fn into_response(self) -> Response {
        let status = match &self {
            LibraryError::NotFound { .. } => StatusCode::NOT_FOUND,
            LibraryError::BadReference { .. } | LibraryError::FavoriteTargetMissing { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            LibraryError::LoginTaken { .. } => StatusCode::CONFLICT,
            LibraryError::EmptyField { .. } | LibraryError::NonPositiveValue { .. } => {
                StatusCode::BAD_REQUEST
            }
            LibraryError::WrongPassword => StatusCode::FORBIDDEN,
            LibraryError::Storage(err) => {
                error!("Storage error: {:#}", err);
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub session_token: Option<String>,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Deserialize, Debug)]
struct CredentialsBody {
    pub login: String,
    pub password: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct UpdatePasswordBody {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Serialize)]
struct LoginSuccessResponse {
    token: String,
}

async fn home(session: Option<Session>, State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        session_token: session.map(|s| s.token),
    };
    Json(stats)
}

// =============================================================================
// Auth
// =============================================================================

async fn signup(
    State(auth): State<GuardedAuthManager>,
    Json(body): Json<CredentialsBody>,
) -> Result<Response, LibraryError> {
    let user = auth.signup(&body.login, &body.password)?;
    Ok((StatusCode::CREATED, Json(PublicUser::from(&user))).into_response())
}

async fn login(
    State(auth): State<GuardedAuthManager>,
    Json(body): Json<CredentialsBody>,
) -> Result<Response, LibraryError> {
    debug!("login attempt for {}", body.login);
    let Some(token) = auth.login(&body.login, &body.password)? else {
        return Ok(StatusCode::FORBIDDEN.into_response());
    };

    let response_body = LoginSuccessResponse {
        token: token.0.clone(),
    };
    let response_body =
        serde_json::to_string(&response_body).map_err(|e| LibraryError::Storage(e.into()))?;
    let cookie_value = HeaderValue::from_str(&format!(
        "{}={}; Path=/; HttpOnly",
        COOKIE_SESSION_TOKEN_KEY, token.0
    ))
    .map_err(|e| LibraryError::Storage(e.into()))?;

    response::Builder::new()
        .status(StatusCode::CREATED)
        .header(axum::http::header::SET_COOKIE, cookie_value)
        .body(Body::from(response_body))
        .map_err(|e| LibraryError::Storage(e.into()))
}

async fn logout(State(auth): State<GuardedAuthManager>, session: Session) -> Response {
    auth.logout(&AuthTokenValue(session.token));

    let cookie_value = Cookie::build(Cookie::new(COOKIE_SESSION_TOKEN_KEY, ""))
        .path("/")
        .expires(time::OffsetDateTime::now_utc() - time::Duration::days(1))
        .same_site(SameSite::Lax)
        .build();

    match response::Builder::new()
        .status(StatusCode::OK)
        .header(axum::http::header::SET_COOKIE, cookie_value.to_string())
        .body(Body::empty())
    {
        Ok(response) => response,
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

// =============================================================================
// Users
// =============================================================================

async fn get_users(
    _session: Session,
    State(library): State<GuardedLibraryStore>,
) -> Result<Response, LibraryError> {
    let users: Vec<PublicUser> = library.list_users()?.iter().map(PublicUser::from).collect();
    Ok(Json(users).into_response())
}

async fn get_user(
    _session: Session,
    State(library): State<GuardedLibraryStore>,
    Path(id): Path<String>,
) -> Result<Response, LibraryError> {
    let user = library.get_user(&id)?;
    Ok(Json(PublicUser::from(&user)).into_response())
}

async fn post_user(
    _session: Session,
    State(auth): State<GuardedAuthManager>,
    Json(body): Json<CredentialsBody>,
) -> Result<Response, LibraryError> {
    let user = auth.signup(&body.login, &body.password)?;
    Ok((StatusCode::CREATED, Json(PublicUser::from(&user))).into_response())
}

async fn put_user(
    _session: Session,
    State(auth): State<GuardedAuthManager>,
    Path(id): Path<String>,
    Json(body): Json<UpdatePasswordBody>,
) -> Result<Response, LibraryError> {
    let user = auth.change_password(&id, &body.old_password, &body.new_password)?;
    Ok(Json(PublicUser::from(&user)).into_response())
}

async fn delete_user(
    _session: Session,
    State(library): State<GuardedLibraryStore>,
    Path(id): Path<String>,
) -> Result<Response, LibraryError> {
    library.delete_user(&id)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

// =============================================================================
// Artists
// =============================================================================

async fn get_artists(
    _session: Session,
    State(library): State<GuardedLibraryStore>,
) -> Result<Response, LibraryError> {
    Ok(Json(library.list_artists()?).into_response())
}

async fn get_artist(
    _session: Session,
    State(library): State<GuardedLibraryStore>,
    Path(id): Path<String>,
) -> Result<Response, LibraryError> {
    Ok(Json(library.get_artist(&id)?).into_response())
}

async fn post_artist(
    _session: Session,
    State(library): State<GuardedLibraryStore>,
    Json(body): Json<NewArtist>,
) -> Result<Response, LibraryError> {
    let artist = library.create_artist(body)?;
    Ok((StatusCode::CREATED, Json(artist)).into_response())
}

async fn put_artist(
    _session: Session,
    State(library): State<GuardedLibraryStore>,
    Path(id): Path<String>,
    Json(body): Json<NewArtist>,
) -> Result<Response, LibraryError> {
    Ok(Json(library.update_artist(&id, body)?).into_response())
}

async fn delete_artist(
    _session: Session,
    State(library): State<GuardedLibraryStore>,
    Path(id): Path<String>,
) -> Result<Response, LibraryError> {
    library.delete_artist(&id)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

// =============================================================================
// Albums
// =============================================================================

async fn get_albums(
    _session: Session,
    State(library): State<GuardedLibraryStore>,
) -> Result<Response, LibraryError> {
    Ok(Json(library.list_albums()?).into_response())
}

async fn get_album(
    _session: Session,
    State(library): State<GuardedLibraryStore>,
    Path(id): Path<String>,
) -> Result<Response, LibraryError> {
    Ok(Json(library.get_album(&id)?).into_response())
}

async fn post_album(
    _session: Session,
    State(library): State<GuardedLibraryStore>,
    Json(body): Json<NewAlbum>,
) -> Result<Response, LibraryError> {
    let album = library.create_album(body)?;
    Ok((StatusCode::CREATED, Json(album)).into_response())
}

async fn put_album(
    _session: Session,
    State(library): State<GuardedLibraryStore>,
    Path(id): Path<String>,
    Json(body): Json<NewAlbum>,
) -> Result<Response, LibraryError> {
    Ok(Json(library.update_album(&id, body)?).into_response())
}

async fn delete_album(
    _session: Session,
    State(library): State<GuardedLibraryStore>,
    Path(id): Path<String>,
) -> Result<Response, LibraryError> {
    library.delete_album(&id)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

// =============================================================================
// Tracks
// =============================================================================

async fn get_tracks(
    _session: Session,
    State(library): State<GuardedLibraryStore>,
) -> Result<Response, LibraryError> {
    Ok(Json(library.list_tracks()?).into_response())
}

async fn get_track(
    _session: Session,
    State(library): State<GuardedLibraryStore>,
    Path(id): Path<String>,
) -> Result<Response, LibraryError> {
    Ok(Json(library.get_track(&id)?).into_response())
}

async fn post_track(
    _session: Session,
    State(library): State<GuardedLibraryStore>,
    Json(body): Json<NewTrack>,
) -> Result<Response, LibraryError> {
    let track = library.create_track(body)?;
    Ok((StatusCode::CREATED, Json(track)).into_response())
}

async fn put_track(
    _session: Session,
    State(library): State<GuardedLibraryStore>,
    Path(id): Path<String>,
    Json(body): Json<NewTrack>,
) -> Result<Response, LibraryError> {
    Ok(Json(library.update_track(&id, body)?).into_response())
}

async fn delete_track(
    _session: Session,
    State(library): State<GuardedLibraryStore>,
    Path(id): Path<String>,
) -> Result<Response, LibraryError> {
    library.delete_track(&id)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

// =============================================================================
// Favorites
// =============================================================================

async fn get_favorites(
    _session: Session,
    State(library): State<GuardedLibraryStore>,
) -> Result<Response, LibraryError> {
    Ok(Json(library.resolve_favorites()?).into_response())
}

async fn post_favorite(
    _session: Session,
    State(library): State<GuardedLibraryStore>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Response, LibraryError> {
    let Some(kind) = FavoriteKind::parse(&kind) else {
        return Ok(StatusCode::BAD_REQUEST.into_response());
    };
    library.add_favorite(kind, &id)?;
    Ok(StatusCode::CREATED.into_response())
}

async fn delete_favorite(
    _session: Session,
    State(library): State<GuardedLibraryStore>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Response, LibraryError> {
    let Some(kind) = FavoriteKind::parse(&kind) else {
        return Ok(StatusCode::BAD_REQUEST.into_response());
    };
    library.remove_favorite(kind, &id)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

// =============================================================================
// Wiring
// =============================================================================

impl ServerState {
    fn new(config: ServerConfig, library: Arc<dyn LibraryStore>) -> ServerState {
        let auth = Arc::new(AuthManager::new(library.clone()));
        ServerState {
            config,
            start_time: Instant::now(),
            library,
            auth,
        }
    }
}

pub fn make_app(config: ServerConfig, library: Arc<dyn LibraryStore>) -> Router {
    let state = ServerState::new(config, library);

    let auth_routes: Router = Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", get(logout))
        .with_state(state.clone());

    let user_routes: Router = Router::new()
        .route("/", get(get_users).post(post_user))
        .route(
            "/{id}",
            get(get_user).put(put_user).delete(delete_user),
        )
        .with_state(state.clone());

    let catalog_routes: Router = Router::new()
        .route("/artist", get(get_artists).post(post_artist))
        .route(
            "/artist/{id}",
            get(get_artist).put(put_artist).delete(delete_artist),
        )
        .route("/album", get(get_albums).post(post_album))
        .route(
            "/album/{id}",
            get(get_album).put(put_album).delete(delete_album),
        )
        .route("/track", get(get_tracks).post(post_track))
        .route(
            "/track/{id}",
            get(get_track).put(put_track).delete(delete_track),
        )
        .with_state(state.clone());

    let favorites_routes: Router = Router::new()
        .route("/", get(get_favorites))
        .route("/{kind}/{id}", post(post_favorite).delete(delete_favorite))
        .with_state(state.clone());

    let v1_routes: Router = Router::new()
        .nest("/auth", auth_routes)
        .nest("/user", user_routes)
        .nest("/favs", favorites_routes)
        .merge(catalog_routes);

    let app: Router = Router::new()
        .route("/", get(home))
        .with_state(state.clone())
        .nest("/v1", v1_routes);

    app.layer(middleware::from_fn_with_state(state, log_requests))
}

pub async fn run_server(
    library: Arc<dyn LibraryStore>,
    requests_logging_level: RequestsLoggingLevel,
    port: u16,
) -> Result<()> {
    let config = ServerConfig {
        port,
        requests_logging_level,
    };
    let app = make_app(config, library);

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;

    Ok(axum::serve(listener, app).await?)
}
