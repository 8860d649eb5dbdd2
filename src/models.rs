use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::ratings::format_ratings;

/// One fully joined catalog row: book columns, the aggregated author list,
/// and the five rating counters (zero when the rating row is missing).
#[derive(Debug, Clone, FromRow)]
pub struct BookRecord {
    pub isbn13: i64,
    pub original_publication_year: i32,
    pub original_title: String,
    pub title: String,
    pub image_url: String,
    pub small_image_url: String,
    pub authors: String,
    pub ratings_1: i32,
    pub ratings_2: i32,
    pub ratings_3: i32,
    pub ratings_4: i32,
    pub ratings_5: i32,
}

#[derive(Debug, Clone, FromRow)]
pub struct RatingRow {
    pub book_id: i64,
    pub ratings_1: i32,
    pub ratings_2: i32,
    pub ratings_3: i32,
    pub ratings_4: i32,
    pub ratings_5: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Book {
    pub isbn13: i64,
    pub authors: String,
    pub publication: i32,
    pub original_title: String,
    pub title: String,
    pub ratings: Ratings,
    pub icons: Icons,
}

#[derive(Debug, Clone, Serialize)]
pub struct Ratings {
    pub average: f64,
    pub count: i64,
    pub rating_1: i32,
    pub rating_2: i32,
    pub rating_3: i32,
    pub rating_4: i32,
    pub rating_5: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Icons {
    pub large: String,
    pub small: String,
}

/// Request body for `POST /books`. Everything optional so presence can be
/// checked in one place and reported as a single missing-parameters error.
#[derive(Debug, Deserialize)]
pub struct CreateBook {
    pub title: Option<String>,
    pub original_title: Option<String>,
    pub isbn13: Option<i64>,
    pub original_publication_year: Option<i32>,
    pub authors: Option<String>,
    pub image_url: Option<String>,
    pub small_image_url: Option<String>,
}

impl BookRecord {
    pub fn counts(&self) -> [i32; 5] {
        [
            self.ratings_1,
            self.ratings_2,
            self.ratings_3,
            self.ratings_4,
            self.ratings_5,
        ]
    }

    pub fn into_book(self) -> Book {
        let ratings = format_ratings(self.counts());

        Book {
            isbn13: self.isbn13,
            authors: self.authors,
            publication: self.original_publication_year,
            original_title: self.original_title,
            title: self.title,
            ratings,
            icons: Icons {
                large: self.image_url,
                small: self.small_image_url,
            },
        }
    }
}

impl RatingRow {
    pub fn counts(&self) -> [i32; 5] {
        [
            self.ratings_1,
            self.ratings_2,
            self.ratings_3,
            self.ratings_4,
            self.ratings_5,
        ]
    }
}
