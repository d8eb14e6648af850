//! Keyword-triggered responders.
//!
//! The `Responder` trait is the dispatch table's extensibility point: each
//! variant owns a fixed keyword set and its reply templates, with no shared
//! mutable state between variants.
//!
//! Matching is plain substring containment on the lower-cased text. There is
//! no tokenisation, so `"hi"` also fires inside `"this"`.

pub mod greeting;
pub mod identity;
pub mod time;

pub use greeting::GreetingResponder;
pub use identity::IdentityResponder;
pub use time::TimeResponder;

use std::sync::Arc;

use chrono::{Local, NaiveDateTime};

use crate::utterance::Reply;

/// Contract for every responder registered in a `DispatchTable`.
pub trait Responder: Send + Sync + 'static {
    /// Stable identifier used in logs and diagnostics.
    fn id(&self) -> &str;

    /// Lowercase trigger keywords.
    fn keywords(&self) -> &[&'static str];

    /// `true` iff any trigger keyword occurs in the lower-cased `text`.
    fn can_handle(&self, text: &str) -> bool {
        contains_any(&text.to_lowercase(), self.keywords())
    }

    /// Produce the reply. Only called after `can_handle` returned `true`, but
    /// must not panic for any input.
    fn handle(&self, text: &str) -> Reply;
}

/// `true` if any needle occurs in `haystack`. Callers lower-case first.
pub fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

/// Wall-clock source for the time-aware responders.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> NaiveDateTime;
}

/// Local system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// Shared clock handle passed to responders.
pub type SharedClock = Arc<dyn Clock>;

/// Part of the day used by the greeting salutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayPeriod {
    Morning,
    Afternoon,
    Evening,
}

impl DayPeriod {
    /// Before noon is morning, before 18:00 afternoon, otherwise evening.
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            0..=11 => DayPeriod::Morning,
            12..=17 => DayPeriod::Afternoon,
            _ => DayPeriod::Evening,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DayPeriod::Morning => "morning",
            DayPeriod::Afternoon => "afternoon",
            DayPeriod::Evening => "evening",
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{NaiveDate, NaiveDateTime};

    pub fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .and_then(|d| d.and_hms_opt(hour, minute, 0))
            .expect("valid test timestamp")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_any_is_plain_substring_match() {
        assert!(contains_any("this is it", &["hi"]));
        assert!(!contains_any("", &["hi"]));
        assert!(!contains_any("hello", &[]));
    }

    #[test]
    fn day_period_boundaries() {
        assert_eq!(DayPeriod::from_hour(0), DayPeriod::Morning);
        assert_eq!(DayPeriod::from_hour(11), DayPeriod::Morning);
        assert_eq!(DayPeriod::from_hour(12), DayPeriod::Afternoon);
        assert_eq!(DayPeriod::from_hour(17), DayPeriod::Afternoon);
        assert_eq!(DayPeriod::from_hour(18), DayPeriod::Evening);
        assert_eq!(DayPeriod::from_hour(23), DayPeriod::Evening);
    }
}
