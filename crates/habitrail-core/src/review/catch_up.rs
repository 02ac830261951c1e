//! Missed-day list for multi-day catch-up.

use crate::clock::LogicalDate;

/// Days still to review, oldest first, ending at `review_date`.
///
/// Covers the days after `last_session` up to and including `review_date`,
/// keeping at most `limit` of the most recent ones. Always contains at
/// least `review_date`.
pub fn missed_days(
    last_session: Option<LogicalDate>,
    review_date: LogicalDate,
    limit: u32,
) -> Vec<LogicalDate> {
    let span = match last_session {
        Some(last) if last < review_date => last.days_until(review_date),
        _ => 1,
    };
    let count = span.clamp(1, i64::from(limit.max(1)));

    let mut days = Vec::with_capacity(count as usize);
    let mut day = review_date;
    for _ in 0..count {
        days.push(day);
        day = day.pred();
    }
    days.reverse();
    days
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> LogicalDate {
        s.parse().unwrap()
    }

    #[test]
    fn single_day_by_default() {
        assert_eq!(
            missed_days(Some(d("2024-01-10")), d("2024-01-15"), 1),
            vec![d("2024-01-15")]
        );
    }

    #[test]
    fn walks_gap_oldest_first() {
        assert_eq!(
            missed_days(Some(d("2024-01-12")), d("2024-01-15"), 7),
            vec![d("2024-01-13"), d("2024-01-14"), d("2024-01-15")]
        );
    }

    #[test]
    fn limit_keeps_most_recent() {
        assert_eq!(
            missed_days(Some(d("2023-12-01")), d("2024-01-02"), 3),
            vec![d("2023-12-31"), d("2024-01-01"), d("2024-01-02")]
        );
    }

    #[test]
    fn yesterday_session_reviews_yesterday() {
        assert_eq!(
            missed_days(Some(d("2024-01-15")), d("2024-01-15"), 5),
            vec![d("2024-01-15")]
        );
        assert_eq!(missed_days(None, d("2024-01-15"), 5), vec![d("2024-01-15")]);
    }
}
