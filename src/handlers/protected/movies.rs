// handlers/protected/movies.rs - /v1/movies collection and record handlers

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, HeaderMap, HeaderValue},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::info;

use crate::database::models::{Metadata, Movie, MovieFilters, MovieInput};
use crate::error::ApiError;
use crate::handlers::read_id_param;
use crate::middleware::{ApiResponse, ApiResult};
use crate::validator::Validator;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct MovieList {
    pub movies: Vec<Movie>,
    pub metadata: Metadata,
}

/// GET /v1/movies - filtered, sorted, paginated listing
///
/// Query: `title` (substring), `genres` (comma separated, all must match),
/// `page`, `page_size`, `sort` (`id|title|year|runtime`, `-` for descending).
pub async fn movies_get(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> ApiResult<MovieList> {
    let mut v = Validator::new();
    let filters = filters_from_query(&query, &mut v);
    filters.validate(&mut v);
    if !v.valid() {
        return Err(ApiError::failed_validation(v.into_errors()));
    }

    let (movies, metadata) = state.store.list_movies(&filters).await?;
    Ok(ApiResponse::success(MovieList { movies, metadata }))
}

fn filters_from_query(query: &HashMap<String, String>, v: &mut Validator) -> MovieFilters {
    let defaults = MovieFilters::default();
    MovieFilters {
        title: read_string(query, "title"),
        genres: read_string(query, "genres")
            .map(|csv| {
                csv.split(',')
                    .map(|g| g.trim().to_string())
                    .filter(|g| !g.is_empty())
                    .collect()
            })
            .unwrap_or_default(),
        page: read_int(query, "page", defaults.page, v),
        page_size: read_int(query, "page_size", defaults.page_size, v),
        sort: read_string(query, "sort").unwrap_or(defaults.sort),
    }
}

fn read_string(query: &HashMap<String, String>, key: &str) -> Option<String> {
    query.get(key).filter(|s| !s.is_empty()).cloned()
}

fn read_int(query: &HashMap<String, String>, key: &str, default: i64, v: &mut Validator) -> i64 {
    match query.get(key).filter(|s| !s.is_empty()) {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            v.add_error(key, "must be an integer value");
            default
        }),
    }
}

/**
 * POST /v1/movies - Create a movie
 *
 * Expected Input:
 * ```json
 * {
 *   "title": "string",       // Required: at most 500 bytes
 *   "year": 1942,            // Required: 1888 to the current year
 *   "runtime": 102,          // Required: minutes, positive
 *   "genres": ["drama"]      // Required: 1 to 5 unique values
 * }
 * ```
 *
 * @returns 201 with the movie and a `Location` header
 */
pub async fn movies_post(
    State(state): State<AppState>,
    payload: Result<Json<MovieInput>, JsonRejection>,
) -> ApiResult<Movie> {
    let Json(input) = payload?;

    let mut v = Validator::new();
    input.validate(&mut v);
    if !v.valid() {
        return Err(ApiError::failed_validation(v.into_errors()));
    }

    let movie = state.store.insert_movie(input).await?;
    info!(movie_id = movie.id, "movie created");

    let location = HeaderValue::from_str(&format!("/v1/movies/{}", movie.id))
        .map_err(|_| ApiError::server_error())?;
    Ok(ApiResponse::created(movie).with_header(header::LOCATION, location))
}

/// GET /v1/movies/:id
pub async fn movie_get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Movie> {
    let id = read_id_param(&id)?;
    let movie = find_movie(&state, id).await?;
    Ok(ApiResponse::success(movie))
}

/// Fields accepted by PATCH. Absent fields keep their stored value.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MovieUpdate {
    pub title: Option<String>,
    pub year: Option<i32>,
    pub runtime: Option<i32>,
    pub genres: Option<Vec<String>>,
}

/**
 * PATCH /v1/movies/:id - Partial update with optimistic locking
 *
 * When the request carries `X-Expected-Version` it must match the stored
 * version. Either way the write itself is conditional on the version read,
 * so a concurrent update yields 409 instead of a lost write.
 *
 * @returns 200 with the updated movie, 409 on an edit conflict
 */
pub async fn movie_patch(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<MovieUpdate>, JsonRejection>,
) -> ApiResult<Movie> {
    let id = read_id_param(&id)?;
    let mut movie = find_movie(&state, id).await?;

    if let Some(expected) = headers.get("x-expected-version") {
        if expected.to_str().ok() != Some(movie.version.to_string().as_str()) {
            return Err(ApiError::conflict(
                "unable to update the record due to an edit conflict, please try again",
            ));
        }
    }

    let Json(update) = payload?;
    let mut input = movie.input();
    if let Some(title) = update.title {
        input.title = title;
    }
    if let Some(year) = update.year {
        input.year = year;
    }
    if let Some(runtime) = update.runtime {
        input.runtime = runtime;
    }
    if let Some(genres) = update.genres {
        input.genres = genres;
    }

    let mut v = Validator::new();
    input.validate(&mut v);
    if !v.valid() {
        return Err(ApiError::failed_validation(v.into_errors()));
    }

    movie.apply(input);
    let movie = state.store.update_movie(&movie).await?;
    Ok(ApiResponse::success(movie))
}

/// DELETE /v1/movies/:id
pub async fn movie_delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Value> {
    let id = read_id_param(&id)?;
    if !state.store.delete_movie(id).await? {
        return Err(ApiError::not_found("the requested resource could not be found"));
    }
    info!(movie_id = id, "movie deleted");
    Ok(ApiResponse::success(json!({ "message": "movie successfully deleted" })))
}

async fn find_movie(state: &AppState, id: i64) -> Result<Movie, ApiError> {
    state
        .store
        .get_movie(id)
        .await?
        .ok_or_else(|| ApiError::not_found("the requested resource could not be found"))
}
