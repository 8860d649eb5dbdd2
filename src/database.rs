//! # Postgres
//!
//! Relational store for the catalog.
//!
//! ## Requirements
//!
//! - One pool per process, opened at startup and shared by every handler
//! - Bounded wait for a connection so a saturated pool surfaces as a server
//!   error instead of hanging the request
//! - Multi-statement units (create book, delete cascades, register) hold one
//!   connection inside an explicit transaction
//!
//! ## Schema
//!
//! - `books`: one row per book, `isbn13` unique, `book_id` assigned by a
//!   sequence and never reused
//! - `authors`: one row per (book, author) pair, unique per book;
//!   `author_id` ordering preserves the order authors were first listed in
//! - `ratings`: one row per book, five non-negative counters, one per star
//!   level; the row exists exactly when its book exists
//! - `account` / `account_credential`: registered users and their salted
//!   password hashes
//!
//! The `pg_trgm` extension backs title similarity search. Creating it needs
//! elevated privileges; when unavailable the title search endpoint degrades
//! to server errors and everything else works.
use std::time::Duration;

use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing::warn;

use super::config::Config;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS books (
        book_id BIGSERIAL PRIMARY KEY,
        isbn13 BIGINT NOT NULL,
        original_publication_year INT NOT NULL,
        original_title TEXT NOT NULL,
        title TEXT NOT NULL,
        image_url TEXT NOT NULL,
        small_image_url TEXT NOT NULL,
        CONSTRAINT books_isbn13_key UNIQUE (isbn13)
    )",
    "CREATE TABLE IF NOT EXISTS authors (
        author_id BIGSERIAL PRIMARY KEY,
        book_id BIGINT NOT NULL REFERENCES books (book_id),
        author TEXT NOT NULL,
        CONSTRAINT authors_book_id_author_key UNIQUE (book_id, author)
    )",
    "CREATE TABLE IF NOT EXISTS ratings (
        book_id BIGINT PRIMARY KEY REFERENCES books (book_id),
        ratings_1 INT NOT NULL DEFAULT 0 CHECK (ratings_1 >= 0),
        ratings_2 INT NOT NULL DEFAULT 0 CHECK (ratings_2 >= 0),
        ratings_3 INT NOT NULL DEFAULT 0 CHECK (ratings_3 >= 0),
        ratings_4 INT NOT NULL DEFAULT 0 CHECK (ratings_4 >= 0),
        ratings_5 INT NOT NULL DEFAULT 0 CHECK (ratings_5 >= 0)
    )",
    "CREATE TABLE IF NOT EXISTS account (
        account_id BIGSERIAL PRIMARY KEY,
        firstname TEXT NOT NULL,
        lastname TEXT NOT NULL,
        username TEXT NOT NULL,
        email TEXT NOT NULL,
        phone TEXT NOT NULL,
        account_role INT NOT NULL,
        CONSTRAINT account_username_key UNIQUE (username),
        CONSTRAINT account_email_key UNIQUE (email),
        CONSTRAINT account_phone_key UNIQUE (phone)
    )",
    "CREATE TABLE IF NOT EXISTS account_credential (
        credential_id BIGSERIAL PRIMARY KEY,
        account_id BIGINT NOT NULL REFERENCES account (account_id) ON DELETE CASCADE,
        salted_hash TEXT NOT NULL,
        salt TEXT NOT NULL
    )",
];

pub async fn init_pool(config: &Config) -> PgPool {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database_url)
        .await
        .unwrap()
}

pub async fn init_schema(pool: &PgPool) {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .expect("Schema misconfigured!");
    }

    if let Err(e) = sqlx::query("CREATE EXTENSION IF NOT EXISTS pg_trgm")
        .execute(pool)
        .await
    {
        warn!("pg_trgm unavailable, title similarity search disabled: {e}");
    }
}
