//! Analytics over already-fetched discovery records.
//!
//! Everything here is a pure function: tools fetch rows through the client,
//! convert them to models and hand them over. Nothing in this module
//! performs I/O, which keeps the numeric rules testable in isolation.

mod categorize;
mod compare;
mod coverage;
mod health;
mod trend;

pub use categorize::*;
pub use compare::*;
pub use coverage::*;
pub use health::*;
pub use trend::*;

/// Characters of a log message used as its grouping key.
pub const ERROR_KEY_LEN: usize = 100;

/// Rounds to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Counts items, most frequent first. Ties keep first-seen order.
pub fn most_common<I, K>(items: I) -> Vec<(K, usize)>
where
    I: IntoIterator<Item = K>,
    K: PartialEq,
{
    let mut counts: Vec<(K, usize)> = Vec::new();
    for item in items {
        match counts.iter_mut().find(|(key, _)| *key == item) {
            Some((_, count)) => *count += 1,
            None => counts.push((item, 1)),
        }
    }
    // sort_by is stable, so equal counts stay in first-seen order.
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

/// The grouping key for a log message: its first 100 characters.
pub fn error_key(message: &str) -> String {
    message.chars().take(ERROR_KEY_LEN).collect()
}
