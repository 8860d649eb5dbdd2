//! Book route handlers. Each handler validates its parameters, calls into
//! [`crate::store`], and wraps the typed result in the response envelope.
use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    error::AppError,
    models::CreateBook,
    state::AppState,
    store::{self, NewBook, split_authors},
    validate::{
        is_provided, positive_or_default, require_age_params, require_book_id, require_isbn13,
        require_isbn_format, require_num_ratings, require_rating_level, require_rating_range,
    },
};

#[derive(Deserialize)]
pub struct PageQuery {
    page: Option<String>,
    limit: Option<String>,
}

#[derive(Deserialize)]
pub struct AgeQuery {
    order: Option<String>,
    limit: Option<String>,
    page: Option<String>,
}

#[derive(Deserialize)]
pub struct RatingRangeQuery {
    #[serde(rename = "minRating")]
    min_rating: Option<String>,
    #[serde(rename = "maxRating")]
    max_rating: Option<String>,
}

#[derive(Deserialize)]
pub struct RatingQuery {
    rating: Option<String>,
}

pub async fn create_book_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateBook>,
) -> Result<Response, AppError> {
    if !is_provided(body.title.as_ref())
        || !is_provided(body.original_title.as_ref())
        || body.isbn13.is_none()
        || body.original_publication_year.is_none()
        || !is_provided(body.authors.as_ref())
        || !is_provided(body.image_url.as_ref())
        || !is_provided(body.small_image_url.as_ref())
    {
        return Err(AppError::Validation(
            "One or more body parameters are missing.".to_string(),
        ));
    }

    let authors = split_authors(&body.authors.unwrap_or_default());
    if authors.is_empty() {
        return Err(AppError::Validation(
            "One or more body parameters are missing.".to_string(),
        ));
    }

    let book = store::create_book(
        &state.pool,
        NewBook {
            isbn13: body.isbn13.unwrap_or_default(),
            original_publication_year: body.original_publication_year.unwrap_or_default(),
            original_title: body.original_title.unwrap_or_default(),
            title: body.title.unwrap_or_default(),
            image_url: body.image_url.unwrap_or_default(),
            small_image_url: body.small_image_url.unwrap_or_default(),
            authors,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(json!({ "book": book }))).into_response())
}

pub async fn list_books_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<Response, AppError> {
    let page = positive_or_default(query.page.as_ref(), 1);
    let limit = positive_or_default(query.limit.as_ref(), 10);
    let offset = (page - 1) * limit;

    let (books, total) = store::fetch_books_page(&state.pool, limit, offset).await?;

    Ok(Json(json!({
        "books": books,
        "total": total,
        "page": page,
        "limit": limit,
    }))
    .into_response())
}

pub async fn books_by_age_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AgeQuery>,
) -> Result<Response, AppError> {
    let params = require_age_params(
        query.order.as_ref(),
        query.limit.as_ref(),
        query.page.as_ref(),
    )?;
    let offset = (params.page - 1) * params.limit;

    let books =
        store::fetch_books_by_age(&state.pool, params.oldest_first, params.limit, offset).await?;

    Ok(Json(json!({ "books": books })).into_response())
}

pub async fn books_by_rating_range_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RatingRangeQuery>,
) -> Result<Response, AppError> {
    let (min_rating, max_rating) =
        require_rating_range(query.min_rating.as_ref(), query.max_rating.as_ref())?;

    let books = store::fetch_books_by_rating_range(&state.pool, min_rating, max_rating).await?;

    Ok(Json(json!({ "books": books })).into_response())
}

pub async fn book_by_isbn_handler(
    State(state): State<Arc<AppState>>,
    Path(isbn): Path<String>,
) -> Result<Response, AppError> {
    let isbn = require_isbn_format(&isbn)?;

    let book = store::fetch_book_by_isbn(&state.pool, isbn).await?;

    Ok(Json(json!({ "book": book })).into_response())
}

pub async fn books_by_author_handler(
    State(state): State<Arc<AppState>>,
    Path(author): Path<String>,
) -> Result<Response, AppError> {
    let books = store::fetch_books_by_author(&state.pool, &author).await?;

    Ok(Json(json!({ "books": books })).into_response())
}

pub async fn books_by_title_handler(
    State(state): State<Arc<AppState>>,
    Path(title): Path<String>,
) -> Result<Response, AppError> {
    if title.trim().is_empty() {
        return Err(AppError::Validation(
            "Missing or invalid title parameter".to_string(),
        ));
    }

    let books = store::fetch_books_by_title(&state.pool, &title).await?;

    Ok(Json(json!({ "books": books })).into_response())
}

pub async fn book_ratings_handler(
    State(state): State<Arc<AppState>>,
    Path(bookid): Path<String>,
) -> Result<Response, AppError> {
    let book_id = require_book_id(&bookid)?;

    let ratings = store::fetch_ratings(&state.pool, book_id).await?;

    Ok(Json(json!({ "ratings": ratings })).into_response())
}

pub async fn book_image_handler(
    State(state): State<Arc<AppState>>,
    Path(bookid): Path<String>,
) -> Result<Response, AppError> {
    let book_id = require_book_id(&bookid)?;

    let url = store::fetch_image_url(&state.pool, book_id, "image_url").await?;

    match url.filter(|u| !u.is_empty()) {
        Some(image) => Ok(Json(json!({ "image": image })).into_response()),
        None => Err(AppError::NotFound(
            "Image not found for given book ID.".to_string(),
        )),
    }
}

pub async fn book_small_image_handler(
    State(state): State<Arc<AppState>>,
    Path(bookid): Path<String>,
) -> Result<Response, AppError> {
    let book_id = require_book_id(&bookid)?;

    let url = store::fetch_image_url(&state.pool, book_id, "small_image_url").await?;

    match url.filter(|u| !u.is_empty()) {
        Some(image) => Ok(Json(json!({ "image": image })).into_response()),
        None => Err(AppError::NotFound(
            "Small image not found for given book ID.".to_string(),
        )),
    }
}

pub async fn set_rating_count_handler(
    State(state): State<Arc<AppState>>,
    Path((bookid, num_ratings)): Path<(String, String)>,
    Query(query): Query<RatingQuery>,
) -> Result<Response, AppError> {
    let book_id = require_book_id(&bookid)?;
    let num_ratings = require_num_ratings(&num_ratings)?;
    let column = require_rating_level(query.rating.as_ref())?;

    let book = store::set_rating_count(&state.pool, book_id, column, num_ratings).await?;

    Ok(Json(json!({ "book": book })).into_response())
}

pub async fn increment_rating_handler(
    State(state): State<Arc<AppState>>,
    Path(bookid): Path<String>,
    Query(query): Query<RatingQuery>,
) -> Result<Response, AppError> {
    let book_id = require_book_id(&bookid)?;
    let column = require_rating_level(query.rating.as_ref())?;

    let book = store::adjust_rating_count(&state.pool, book_id, column, 1).await?;

    Ok(Json(json!({ "book": book })).into_response())
}

pub async fn decrement_rating_handler(
    State(state): State<Arc<AppState>>,
    Path(bookid): Path<String>,
    Query(query): Query<RatingQuery>,
) -> Result<Response, AppError> {
    let book_id = require_book_id(&bookid)?;
    let column = require_rating_level(query.rating.as_ref())?;

    let book = store::adjust_rating_count(&state.pool, book_id, column, -1).await?;

    Ok(Json(json!({ "book": book })).into_response())
}

pub async fn delete_book_handler(
    State(state): State<Arc<AppState>>,
    Path(isbn13): Path<String>,
) -> Result<Response, AppError> {
    let isbn = require_isbn13(&isbn13)?;

    store::delete_book_by_isbn(&state.pool, isbn).await?;

    Ok(Json(json!({
        "message": format!("Book with ISBN {isbn} has been deleted.")
    }))
    .into_response())
}

pub async fn delete_books_by_author_handler(
    State(state): State<Arc<AppState>>,
    Path(author): Path<String>,
) -> Result<Response, AppError> {
    let books = store::delete_books_by_author(&state.pool, &author).await?;

    Ok(Json(json!({ "books": books })).into_response())
}
