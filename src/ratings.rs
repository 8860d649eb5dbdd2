//! # Rating aggregation
//!
//! Every path that surfaces ratings derives `{count, average}` from the five
//! per-level counters through these functions, including reads issued right
//! after a mutation, so the caller always sees numbers consistent with the
//! stored counters.
use super::models::Ratings;

pub fn ratings_count(counts: [i32; 5]) -> i64 {
    counts.iter().map(|&c| c as i64).sum()
}

/// Weighted average over the five levels, rounded to two decimals.
/// Zero when there are no ratings at all.
pub fn ratings_average(counts: [i32; 5]) -> f64 {
    let count = ratings_count(counts);

    if count == 0 {
        return 0.0;
    }

    let weighted: i64 = counts
        .iter()
        .enumerate()
        .map(|(level, &c)| (level as i64 + 1) * c as i64)
        .sum();

    ((weighted as f64 / count as f64) * 100.0).round() / 100.0
}

pub fn format_ratings(counts: [i32; 5]) -> Ratings {
    Ratings {
        average: ratings_average(counts),
        count: ratings_count(counts),
        rating_1: counts[0],
        rating_2: counts[1],
        rating_3: counts[2],
        rating_4: counts[3],
        rating_5: counts[4],
    }
}

#[cfg(test)]
mod tests {
    use super::{format_ratings, ratings_average, ratings_count};

    #[test]
    fn test_count_sums_all_levels() {
        assert_eq!(ratings_count([1, 2, 3, 4, 5]), 15);
        assert_eq!(ratings_count([0, 0, 0, 0, 0]), 0);
        assert_eq!(ratings_count([0, 0, 7, 0, 0]), 7);
    }

    #[test]
    fn test_average_zero_when_no_ratings() {
        assert_eq!(ratings_average([0, 0, 0, 0, 0]), 0.0);
    }

    #[test]
    fn test_average_weighted() {
        // 123 + 432*2 + 1342*3 + 2341*4 + 1585*5 = 22302 over 5823 ratings
        assert_eq!(ratings_average([123, 432, 1342, 2341, 1585]), 3.83);
        assert_eq!(ratings_average([0, 0, 5, 0, 0]), 3.0);
        assert_eq!(ratings_average([0, 0, 0, 0, 9]), 5.0);
    }

    #[test]
    fn test_average_rounds_to_two_decimals() {
        // 1 + 2 + 3 = 6 over 3 -> 2.0, then one five: 11 over 4 -> 2.75
        assert_eq!(ratings_average([1, 1, 1, 0, 1]), 2.75);
        // 1*2 + 5 = 7 over 3 -> 2.333...
        assert_eq!(ratings_average([2, 0, 0, 0, 1]), 2.33);
        // 1 + 5*2 = 11 over 3 -> 3.666...
        assert_eq!(ratings_average([1, 0, 0, 0, 2]), 3.67);
    }

    #[test]
    fn test_average_stays_in_range() {
        for counts in [[1, 0, 0, 0, 0], [0, 0, 0, 0, 1], [9, 9, 9, 9, 9]] {
            let average = ratings_average(counts);
            assert!((0.0..=5.0).contains(&average));
        }
    }

    #[test]
    fn test_format_carries_raw_counters() {
        let ratings = format_ratings([1, 2, 3, 4, 5]);

        assert_eq!(ratings.count, 15);
        assert_eq!(ratings.rating_1, 1);
        assert_eq!(ratings.rating_5, 5);
        assert_eq!(ratings.average, 3.67);
    }
}
