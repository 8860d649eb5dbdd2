//! # Catalog store
//!
//! All SQL touching books, authors and ratings lives here. Handlers never
//! see a raw row; every read comes back as a typed [`BookRecord`] mapped
//! into the wire [`Book`] shape at this boundary.
//!
//! ## Consistency
//!
//! - A book, its author rows and its zeroed rating row are created inside
//!   one transaction; a failure anywhere rolls the whole unit back.
//! - Deletion (by ISBN or by author) removes all three tables' rows for the
//!   affected books inside one transaction, so a rating row exists exactly
//!   when its book exists.
//! - Counter updates are single `SET col = col + delta` statements. Two
//!   concurrent bumps of the same (book, level) pair both land; there is no
//!   read-then-write window to lose one in.
use sqlx::{PgPool, Postgres, Transaction};

use super::{
    error::AppError,
    models::{Book, BookRecord, Icons, RatingRow, Ratings},
    ratings::format_ratings,
};

/// Builds the canonical joined select: book columns, the author list
/// aggregated in first-listed order, and the counters zeroed when the
/// rating row is absent. Only server-side literals are ever interpolated;
/// user values go through bind parameters.
fn book_select(where_clause: &str, tail: &str) -> String {
    format!(
        "SELECT \
            b.isbn13, \
            b.original_publication_year, \
            b.original_title, \
            b.title, \
            b.image_url, \
            b.small_image_url, \
            STRING_AGG(a.author, ', ' ORDER BY a.author_id) AS authors, \
            COALESCE(r.ratings_1, 0) AS ratings_1, \
            COALESCE(r.ratings_2, 0) AS ratings_2, \
            COALESCE(r.ratings_3, 0) AS ratings_3, \
            COALESCE(r.ratings_4, 0) AS ratings_4, \
            COALESCE(r.ratings_5, 0) AS ratings_5 \
        FROM books b \
        JOIN authors a ON b.book_id = a.book_id \
        LEFT JOIN ratings r ON b.book_id = r.book_id \
        {where_clause} \
        GROUP BY b.book_id, r.ratings_1, r.ratings_2, r.ratings_3, r.ratings_4, r.ratings_5 \
        {tail}"
    )
}

pub async fn fetch_book_by_id(pool: &PgPool, book_id: i64) -> Result<Book, AppError> {
    let record: Option<BookRecord> = sqlx::query_as(&book_select("WHERE b.book_id = $1", ""))
        .bind(book_id)
        .fetch_optional(pool)
        .await?;

    record
        .map(BookRecord::into_book)
        .ok_or_else(|| AppError::NotFound("Book not found".to_string()))
}

pub async fn fetch_book_by_isbn(pool: &PgPool, isbn: i64) -> Result<Book, AppError> {
    let record: Option<BookRecord> = sqlx::query_as(&book_select("WHERE b.isbn13 = $1", ""))
        .bind(isbn)
        .fetch_optional(pool)
        .await?;

    record
        .map(BookRecord::into_book)
        .ok_or_else(|| AppError::NotFound(format!("Book with ISBN of '{isbn}' not found.")))
}

pub async fn fetch_books_by_author(pool: &PgPool, author: &str) -> Result<Vec<Book>, AppError> {
    let records: Vec<BookRecord> = sqlx::query_as(&book_select(
        "WHERE b.book_id IN (SELECT book_id FROM authors WHERE author = $1)",
        "",
    ))
    .bind(author)
    .fetch_all(pool)
    .await?;

    if records.is_empty() {
        return Err(AppError::NotFound("Author not found".to_string()));
    }

    Ok(records.into_iter().map(BookRecord::into_book).collect())
}

pub async fn fetch_books_page(
    pool: &PgPool,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Book>, i64), AppError> {
    let records: Vec<BookRecord> =
        sqlx::query_as(&book_select("", "ORDER BY b.book_id LIMIT $1 OFFSET $2"))
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books")
        .fetch_one(pool)
        .await?;

    Ok((
        records.into_iter().map(BookRecord::into_book).collect(),
        total,
    ))
}

pub async fn fetch_books_by_age(
    pool: &PgPool,
    oldest_first: bool,
    limit: i64,
    offset: i64,
) -> Result<Vec<Book>, AppError> {
    let direction = if oldest_first { "ASC" } else { "DESC" };

    let records: Vec<BookRecord> = sqlx::query_as(&book_select(
        "",
        &format!("ORDER BY b.original_publication_year {direction} LIMIT $1 OFFSET $2"),
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(records.into_iter().map(BookRecord::into_book).collect())
}

/// Filters on the same weighted-average formula the aggregator computes.
/// Books with no ratings at all have no defined average and never match;
/// `NULLIF` keeps the zero-count division from erroring.
pub async fn fetch_books_by_rating_range(
    pool: &PgPool,
    min_rating: f64,
    max_rating: f64,
) -> Result<Vec<Book>, AppError> {
    let records: Vec<BookRecord> = sqlx::query_as(&book_select(
        "WHERE (r.ratings_1::float + 2 * r.ratings_2::float + 3 * r.ratings_3::float \
            + 4 * r.ratings_4::float + 5 * r.ratings_5::float) \
            / NULLIF(r.ratings_1 + r.ratings_2 + r.ratings_3 + r.ratings_4 + r.ratings_5, 0) \
            BETWEEN $1 AND $2",
        "",
    ))
    .bind(min_rating)
    .bind(max_rating)
    .fetch_all(pool)
    .await?;

    if records.is_empty() {
        return Err(AppError::NotFound("No books found in range".to_string()));
    }

    Ok(records.into_iter().map(BookRecord::into_book).collect())
}

/// Trigram similarity search, best matches first. Requires `pg_trgm`.
pub async fn fetch_books_by_title(pool: &PgPool, title: &str) -> Result<Vec<Book>, AppError> {
    let records: Vec<BookRecord> = sqlx::query_as(&book_select(
        "WHERE b.title % $1",
        "ORDER BY similarity(b.title, $1) DESC LIMIT 10",
    ))
    .bind(title)
    .fetch_all(pool)
    .await?;

    Ok(records.into_iter().map(BookRecord::into_book).collect())
}

pub async fn fetch_ratings(pool: &PgPool, book_id: i64) -> Result<Ratings, AppError> {
    let row: Option<RatingRow> = sqlx::query_as(
        "SELECT book_id, ratings_1, ratings_2, ratings_3, ratings_4, ratings_5 \
        FROM ratings WHERE book_id = $1",
    )
    .bind(book_id)
    .fetch_optional(pool)
    .await?;

    row.map(|r| format_ratings(r.counts()))
        .ok_or_else(|| AppError::NotFound("Book not found".to_string()))
}

/// `column` is `"image_url"` or `"small_image_url"`.
pub async fn fetch_image_url(
    pool: &PgPool,
    book_id: i64,
    column: &'static str,
) -> Result<Option<String>, AppError> {
    let url: Option<String> =
        sqlx::query_scalar(&format!("SELECT {column} FROM books WHERE book_id = $1"))
            .bind(book_id)
            .fetch_optional(pool)
            .await?;

    Ok(url)
}

/// Writes an absolute value into one counter column, then returns the
/// reformatted book. Zero rows affected means the book has no rating row,
/// which means the book does not exist.
pub async fn set_rating_count(
    pool: &PgPool,
    book_id: i64,
    column: &'static str,
    value: i32,
) -> Result<Book, AppError> {
    let affected = sqlx::query(&format!(
        "UPDATE ratings SET {column} = $1 WHERE book_id = $2"
    ))
    .bind(value)
    .bind(book_id)
    .execute(pool)
    .await?
    .rows_affected();

    if affected == 0 {
        return Err(AppError::NotFound("Book not found".to_string()));
    }

    fetch_book_by_id(pool, book_id).await
}

/// Applies a delta to one counter column in a single atomic statement,
/// clamping at zero, then returns the reformatted book.
pub async fn adjust_rating_count(
    pool: &PgPool,
    book_id: i64,
    column: &'static str,
    delta: i32,
) -> Result<Book, AppError> {
    let affected = sqlx::query(&format!(
        "UPDATE ratings SET {column} = GREATEST({column} + $1, 0) WHERE book_id = $2"
    ))
    .bind(delta)
    .bind(book_id)
    .execute(pool)
    .await?
    .rows_affected();

    if affected == 0 {
        return Err(AppError::NotFound("Book not found".to_string()));
    }

    fetch_book_by_id(pool, book_id).await
}

pub struct NewBook {
    pub isbn13: i64,
    pub original_publication_year: i32,
    pub original_title: String,
    pub title: String,
    pub image_url: String,
    pub small_image_url: String,
    pub authors: Vec<String>,
}

/// Splits a comma-separated author list, trimming whitespace, dropping
/// empty entries, and de-duplicating exact matches while preserving
/// first-seen order.
pub fn split_authors(csv: &str) -> Vec<String> {
    let mut authors: Vec<String> = Vec::new();

    for author in csv.split(',') {
        let author = author.trim();
        if !author.is_empty() && !authors.iter().any(|seen| seen == author) {
            authors.push(author.to_string());
        }
    }

    authors
}

/// Inserts the book row, one author row per unique name, and the zeroed
/// rating row as one unit. A duplicate ISBN surfaces as a conflict; any
/// other failure rolls everything back and surfaces as a server error.
pub async fn create_book(pool: &PgPool, book: NewBook) -> Result<Book, AppError> {
    let mut tx = pool.begin().await?;

    let book_id: i64 = sqlx::query_scalar(
        "INSERT INTO books ( \
            isbn13, original_publication_year, original_title, title, image_url, small_image_url \
        ) \
        VALUES ($1, $2, $3, $4, $5, $6) \
        RETURNING book_id",
    )
    .bind(book.isbn13)
    .bind(book.original_publication_year)
    .bind(&book.original_title)
    .bind(&book.title)
    .bind(&book.image_url)
    .bind(&book.small_image_url)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| conflict_on(e, "books_isbn13_key", "ISBN already exists"))?;

    for author in &book.authors {
        sqlx::query("INSERT INTO authors (book_id, author) VALUES ($1, $2)")
            .bind(book_id)
            .bind(author)
            .execute(&mut *tx)
            .await?;
    }

    sqlx::query("INSERT INTO ratings (book_id) VALUES ($1)")
        .bind(book_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(Book {
        isbn13: book.isbn13,
        authors: book.authors.join(", "),
        publication: book.original_publication_year,
        original_title: book.original_title,
        title: book.title,
        ratings: format_ratings([0; 5]),
        icons: Icons {
            large: book.image_url,
            small: book.small_image_url,
        },
    })
}

/// Removes the book and its rating and author rows as one unit.
pub async fn delete_book_by_isbn(pool: &PgPool, isbn: i64) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    let book_id: Option<i64> = sqlx::query_scalar("SELECT book_id FROM books WHERE isbn13 = $1")
        .bind(isbn)
        .fetch_optional(&mut *tx)
        .await?;

    let Some(book_id) = book_id else {
        return Err(AppError::NotFound(format!(
            "Book with ISBN {isbn} not found."
        )));
    };

    delete_dependents(&mut tx, &[book_id]).await?;

    tx.commit().await?;

    Ok(())
}

/// Removes every book the author wrote or co-wrote, with all dependent
/// rows, as one unit. Returns the formatted list of what was removed,
/// captured before deletion.
pub async fn delete_books_by_author(pool: &PgPool, author: &str) -> Result<Vec<Book>, AppError> {
    let mut tx = pool.begin().await?;

    let records: Vec<BookRecord> = sqlx::query_as(&book_select(
        "WHERE b.book_id IN (SELECT book_id FROM authors WHERE author = $1)",
        "",
    ))
    .bind(author)
    .fetch_all(&mut *tx)
    .await?;

    if records.is_empty() {
        return Err(AppError::NotFound("Author not found".to_string()));
    }

    let book_ids: Vec<i64> =
        sqlx::query_scalar("SELECT DISTINCT book_id FROM authors WHERE author = $1")
            .bind(author)
            .fetch_all(&mut *tx)
            .await?;

    delete_dependents(&mut tx, &book_ids).await?;

    tx.commit().await?;

    Ok(records.into_iter().map(BookRecord::into_book).collect())
}

// Children first, books last, all inside the caller's transaction.
async fn delete_dependents(
    tx: &mut Transaction<'_, Postgres>,
    book_ids: &[i64],
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM ratings WHERE book_id = ANY($1)")
        .bind(book_ids)
        .execute(&mut **tx)
        .await?;

    sqlx::query("DELETE FROM authors WHERE book_id = ANY($1)")
        .bind(book_ids)
        .execute(&mut **tx)
        .await?;

    sqlx::query("DELETE FROM books WHERE book_id = ANY($1)")
        .bind(book_ids)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

pub(crate) fn conflict_on(err: sqlx::Error, constraint: &str, message: &str) -> AppError {
    if let sqlx::Error::Database(ref db) = err {
        if db.constraint() == Some(constraint) {
            return AppError::Conflict(message.to_string());
        }
    }

    AppError::Database(err)
}

#[cfg(test)]
mod tests {
    use super::split_authors;

    #[test]
    fn test_split_trims_and_dedupes_in_order() {
        assert_eq!(split_authors("A, B, A"), vec!["A", "B"]);
        assert_eq!(
            split_authors("Jane Doe,John Roe , Jane Doe"),
            vec!["Jane Doe", "John Roe"]
        );
    }

    #[test]
    fn test_split_is_case_sensitive() {
        assert_eq!(
            split_authors("jane doe, Jane Doe"),
            vec!["jane doe", "Jane Doe"]
        );
    }

    #[test]
    fn test_split_drops_empty_entries() {
        assert_eq!(split_authors("A,,B,  ,"), vec!["A", "B"]);
        assert!(split_authors("  ,  ").is_empty());
    }
}
