//! Request parameter checks. Everything here runs before any store access;
//! a failure terminates the request with a 400 and the store is never hit.
use regex::Regex;

use crate::error::AppError;

pub fn is_provided(value: Option<&String>) -> bool {
    value.is_some_and(|s| !s.trim().is_empty())
}

/// ISBN path parameter for lookups: 10 to 13 digits.
pub fn require_isbn_format(isbn: &str) -> Result<i64, AppError> {
    let format = Regex::new(r"^[0-9]{10,13}$").unwrap();

    if !format.is_match(isbn) {
        return Err(AppError::Validation("Invalid ISBN format.".to_string()));
    }

    isbn.parse()
        .map_err(|_| AppError::Validation("Invalid ISBN format.".to_string()))
}

/// ISBN-13 path parameter for deletion: any value parseable as a big integer.
pub fn require_isbn13(raw: &str) -> Result<i64, AppError> {
    raw.parse()
        .map_err(|_| AppError::Validation("Invalid ISBN format.".to_string()))
}

pub fn require_book_id(raw: &str) -> Result<i64, AppError> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(AppError::Validation(
            "Invalid or missing Book ID - please refer to documentation".to_string(),
        )),
    }
}

/// The `rating` query parameter selects one of the five counter columns.
/// Only these five fixed names ever reach a query string.
pub fn require_rating_level(raw: Option<&String>) -> Result<&'static str, AppError> {
    match raw.map(|s| s.parse::<u8>()) {
        Some(Ok(1)) => Ok("ratings_1"),
        Some(Ok(2)) => Ok("ratings_2"),
        Some(Ok(3)) => Ok("ratings_3"),
        Some(Ok(4)) => Ok("ratings_4"),
        Some(Ok(5)) => Ok("ratings_5"),
        _ => Err(AppError::Validation(
            "Invalid or missing Rating - please refer to documentation".to_string(),
        )),
    }
}

pub fn require_num_ratings(raw: &str) -> Result<i32, AppError> {
    match raw.parse::<i32>() {
        Ok(n) if n >= 0 => Ok(n),
        _ => Err(AppError::Validation(
            "Invalid or missing Number of Ratings - please refer to documentation".to_string(),
        )),
    }
}

/// Both bounds required, within [1.0, 5.0], min at most max.
pub fn require_rating_range(
    min: Option<&String>,
    max: Option<&String>,
) -> Result<(f64, f64), AppError> {
    let bounds = match (
        min.and_then(|s| s.parse::<f64>().ok()),
        max.and_then(|s| s.parse::<f64>().ok()),
    ) {
        (Some(min), Some(max)) => (min, max),
        _ => {
            return Err(invalid_rating_range());
        }
    };

    if bounds.0 >= 1.0 && bounds.1 <= 5.0 && bounds.0 <= bounds.1 {
        Ok(bounds)
    } else {
        Err(invalid_rating_range())
    }
}

fn invalid_rating_range() -> AppError {
    AppError::Validation(
        "Invalid or missing Rating Range - please refer to documentation".to_string(),
    )
}

/// Pagination values fall back to the default when absent or unparseable,
/// and never go below one.
pub fn positive_or_default(raw: Option<&String>, default: i64) -> i64 {
    raw.and_then(|s| s.parse::<i64>().ok())
        .filter(|&n| n >= 1)
        .unwrap_or(default)
}

pub struct AgeParams {
    pub oldest_first: bool,
    pub limit: i64,
    pub page: i64,
}

pub fn require_age_params(
    order: Option<&String>,
    limit: Option<&String>,
    page: Option<&String>,
) -> Result<AgeParams, AppError> {
    let Some(order) = order else {
        return Err(AppError::Validation(
            "Missing order query parameter. It must be \"old\" or \"new\"".to_string(),
        ));
    };

    let oldest_first = match order.to_lowercase().as_str() {
        "old" => true,
        "new" => false,
        _ => {
            return Err(AppError::Validation(
                "Invalid order query parameter. It must be \"old\" or \"new\"".to_string(),
            ));
        }
    };

    let limit = positive_or_default(limit, 20);
    if limit > 200 {
        return Err(AppError::Validation(
            "Invalid limit query parameter. It must be zero or greater and less than 200."
                .to_string(),
        ));
    }

    let page = positive_or_default(page, 1);
    if page > 100 {
        return Err(AppError::Validation(
            "Invalid page query parameter. It must be zero or greater and less than 100."
                .to_string(),
        ));
    }

    Ok(AgeParams {
        oldest_first,
        limit,
        page,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isbn_format() {
        assert_eq!(require_isbn_format("9781234567897").unwrap(), 9781234567897);
        assert_eq!(require_isbn_format("0123456789").unwrap(), 123456789);
        assert!(require_isbn_format("123456789").is_err());
        assert!(require_isbn_format("97812345678971").is_err());
        assert!(require_isbn_format("97812345678ab").is_err());
        assert!(require_isbn_format("").is_err());
    }

    #[test]
    fn test_book_id_must_be_positive() {
        assert_eq!(require_book_id("42").unwrap(), 42);
        assert!(require_book_id("0").is_err());
        assert!(require_book_id("-3").is_err());
        assert!(require_book_id("abc").is_err());
    }

    #[test]
    fn test_rating_level_maps_to_fixed_columns() {
        assert_eq!(
            require_rating_level(Some(&"1".to_string())).unwrap(),
            "ratings_1"
        );
        assert_eq!(
            require_rating_level(Some(&"5".to_string())).unwrap(),
            "ratings_5"
        );
        assert!(require_rating_level(Some(&"0".to_string())).is_err());
        assert!(require_rating_level(Some(&"6".to_string())).is_err());
        assert!(require_rating_level(Some(&"2.5".to_string())).is_err());
        assert!(require_rating_level(None).is_err());
    }

    #[test]
    fn test_num_ratings_rejects_negative() {
        assert_eq!(require_num_ratings("0").unwrap(), 0);
        assert_eq!(require_num_ratings("17").unwrap(), 17);
        assert!(require_num_ratings("-1").is_err());
        assert!(require_num_ratings("many").is_err());
    }

    #[test]
    fn test_rating_range_bounds() {
        let (min, max) =
            require_rating_range(Some(&"1.5".to_string()), Some(&"4.5".to_string())).unwrap();
        assert_eq!((min, max), (1.5, 4.5));

        assert!(require_rating_range(None, Some(&"4".to_string())).is_err());
        assert!(require_rating_range(Some(&"0.5".to_string()), Some(&"4".to_string())).is_err());
        assert!(require_rating_range(Some(&"2".to_string()), Some(&"5.5".to_string())).is_err());
        assert!(require_rating_range(Some(&"4".to_string()), Some(&"2".to_string())).is_err());
    }

    #[test]
    fn test_page_defaults() {
        assert_eq!(positive_or_default(None, 10), 10);
        assert_eq!(positive_or_default(Some(&"3".to_string()), 10), 3);
        assert_eq!(positive_or_default(Some(&"abc".to_string()), 10), 10);
        assert_eq!(positive_or_default(Some(&"0".to_string()), 10), 10);
        assert_eq!(positive_or_default(Some(&"-2".to_string()), 10), 10);
    }

    #[test]
    fn test_age_params() {
        let params = require_age_params(Some(&"old".to_string()), None, None).unwrap();
        assert!(params.oldest_first);
        assert_eq!(params.limit, 20);
        assert_eq!(params.page, 1);

        let params = require_age_params(
            Some(&"NEW".to_string()),
            Some(&"50".to_string()),
            Some(&"2".to_string()),
        )
        .unwrap();
        assert!(!params.oldest_first);
        assert_eq!(params.limit, 50);
        assert_eq!(params.page, 2);

        assert!(require_age_params(None, None, None).is_err());
        assert!(require_age_params(Some(&"oldest".to_string()), None, None).is_err());
        assert!(
            require_age_params(Some(&"old".to_string()), Some(&"201".to_string()), None).is_err()
        );
        assert!(
            require_age_params(Some(&"old".to_string()), None, Some(&"101".to_string())).is_err()
        );
    }
}
