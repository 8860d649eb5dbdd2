//! Documentation of the bookshelf catalog service.
//!
//! REST backend for a book catalog: books, their authors, per-level rating
//! counters, and account registration/login.
//!
//!
//!
//! # General Infrastructure
//! - One `axum` server process fronting a PostgreSQL store
//! - A single process-wide connection pool is opened at startup and shared by
//!   every request handler for the process lifetime
//! - Handlers suspend on store round trips; nothing blocks the runtime
//! - Multi-table writes (create book, delete book, delete by author,
//!   register) run inside one transaction on one pooled connection
//!
//!
//!
//! # Ratings
//!
//! Each book carries five independent counters, one per star level. Every
//! read path derives `{count, average}` from those counters through the same
//! aggregation in [`ratings`], so a caller always sees a value consistent
//! with what was just written.
//!
//! Counter updates are single atomic statements (`SET col = col + 1` style).
//! Reading the current value and writing back `current + 1` in a second
//! round trip would lose updates under concurrent traffic to the same
//! (book, level) pair, so no code path does that.
//!
//!
//!
//! # Setup
//!
//! View current docs.
//! ```sh
//! cargo doc --open
//! ```
//!
//! Run against a local Postgres.
//! ```sh
//! DATABASE_URL=postgres://postgres@localhost:5432/bookshelf \
//! TOKEN_SECRET=dev-secret \
//! cargo run
//! ```
use std::time::Duration;

use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::{delete, get, patch, post},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

pub mod auth;
pub mod books;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod ratings;
pub mod state;
pub mod store;
pub mod validate;

use auth::{change_password_handler, login_handler, register_handler};
use books::{
    book_by_isbn_handler, book_image_handler, book_ratings_handler, book_small_image_handler,
    books_by_age_handler, books_by_author_handler, books_by_rating_range_handler,
    books_by_title_handler, create_book_handler, decrement_rating_handler, delete_book_handler,
    delete_books_by_author_handler, increment_rating_handler, list_books_handler,
    set_rating_count_handler,
};
use state::AppState;

pub async fn start_server() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new().await;

    info!("Starting server...");

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    let app = Router::new()
        .route("/books", post(create_book_handler).get(list_books_handler))
        .route("/books/age", get(books_by_age_handler))
        .route("/books/ratingRange", get(books_by_rating_range_handler))
        .route("/books/isbn/{isbn}", get(book_by_isbn_handler))
        .route(
            "/books/author/{author}",
            get(books_by_author_handler).delete(delete_books_by_author_handler),
        )
        .route("/books/title/{title}", get(books_by_title_handler))
        .route("/books/bookid/{bookid}/ratings", get(book_ratings_handler))
        .route("/books/bookid/{bookid}/image", get(book_image_handler))
        .route(
            "/books/bookid/{bookid}/small-image",
            get(book_small_image_handler),
        )
        .route(
            "/books/bookid/{bookid}/numOfRatings/{num_ratings}",
            patch(set_rating_count_handler),
        )
        .route(
            "/books/bookid/{bookid}/incRating",
            patch(increment_rating_handler),
        )
        .route(
            "/books/bookid/{bookid}/decRating",
            patch(decrement_rating_handler),
        )
        .route("/books/{isbn13}", delete(delete_book_handler))
        .route("/register", post(register_handler))
        .route("/login", post(login_handler))
        .route("/changePassword", patch(change_password_handler))
        .layer(cors)
        .with_state(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await.unwrap();
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    println!("Server shutting down...");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
