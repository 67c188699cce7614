//! Movie records behind `movies:read` / `movies:write`.

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::data::movie::{validate_genres, validate_runtime};
use crate::data::{MovieId, NewMovie, Runtime, Version};
use crate::error::GateError;
use crate::http::extract::ValidatedJson;
use crate::http::server::AppState;
use crate::security::CurrentPrincipal;

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct MovieInput {
    #[validate(length(min = 1, max = 500, message = "must be provided and not more than 500 bytes long"))]
    pub title: String,
    #[validate(range(min = 1888, max = 2100, message = "must be between 1888 and 2100"))]
    pub year: i32,
    #[validate(custom(function = "validate_runtime"))]
    pub runtime: Runtime,
    #[validate(
        length(min = 1, max = 5, message = "must contain between 1 and 5 genres"),
        custom(function = "validate_genres")
    )]
    pub genres: Vec<String>,
}

/// Full desired state plus the version it was read at.
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct MovieUpdate {
    #[validate(length(min = 1, max = 500, message = "must be provided and not more than 500 bytes long"))]
    pub title: String,
    #[validate(range(min = 1888, max = 2100, message = "must be between 1888 and 2100"))]
    pub year: i32,
    #[validate(custom(function = "validate_runtime"))]
    pub runtime: Runtime,
    #[validate(
        length(min = 1, max = 5, message = "must contain between 1 and 5 genres"),
        custom(function = "validate_genres")
    )]
    pub genres: Vec<String>,
    pub version: Version,
}

/// Ids are positive integers; anything else names no movie.
fn parse_id(raw: &str) -> Result<MovieId, GateError> {
    raw.parse::<MovieId>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or(GateError::NotFound)
}

/// POST /v1/movies
pub async fn create_movie(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ValidatedJson(input): ValidatedJson<MovieInput>,
) -> Result<(StatusCode, HeaderMap, Json<Value>), GateError> {
    let movie = state
        .store_call(state.stores.movies.insert_movie(NewMovie {
            title: input.title,
            year: input.year,
            runtime: input.runtime,
            genres: input.genres,
        }))
        .await?;
    tracing::info!(
        movie_id = movie.id,
        user_id = principal.user().map(|u| u.id),
        "Movie created"
    );

    let mut headers = HeaderMap::new();
    let location = HeaderValue::from_str(&format!("/v1/movies/{}", movie.id))
        .map_err(|e| GateError::Internal(e.to_string()))?;
    headers.insert(header::LOCATION, location);

    Ok((StatusCode::CREATED, headers, Json(json!({ "movie": movie }))))
}

/// GET /v1/movies/{id}
pub async fn show_movie(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<Value>, GateError> {
    let id = parse_id(&raw_id)?;
    let movie = state.store_call(state.stores.movies.get_movie(id)).await?;
    Ok(Json(json!({ "movie": movie })))
}

/// PUT /v1/movies/{id}
pub async fn update_movie(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(raw_id): Path<String>,
    ValidatedJson(update): ValidatedJson<MovieUpdate>,
) -> Result<Json<Value>, GateError> {
    let id = parse_id(&raw_id)?;
    let mut movie = state.store_call(state.stores.movies.get_movie(id)).await?;

    movie.title = update.title;
    movie.year = update.year;
    movie.runtime = update.runtime;
    movie.genres = update.genres;
    movie.version = update.version;

    state.guard.update(state.stores.movies.as_ref(), &mut movie).await?;
    tracing::info!(
        movie_id = id,
        version = movie.version.get(),
        user_id = principal.user().map(|u| u.id),
        "Movie updated"
    );
    Ok(Json(json!({ "movie": movie })))
}

/// DELETE /v1/movies/{id}
pub async fn delete_movie(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(raw_id): Path<String>,
) -> Result<Json<Value>, GateError> {
    let id = parse_id(&raw_id)?;
    state.store_call(state.stores.movies.delete_movie(id)).await?;
    tracing::info!(
        movie_id = id,
        user_id = principal.user().map(|u| u.id),
        "Movie deleted"
    );
    Ok(Json(json!({ "message": "movie successfully deleted" })))
}
