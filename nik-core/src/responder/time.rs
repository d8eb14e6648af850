//! Time and date queries.
//!
//! Sub-patterns are checked most specific first: `time`, `date`, `today`,
//! `day`. `today` has to precede `day` since it contains it. Anything else that
//! fired a keyword (`now`) gets the time plus the full date.

use std::sync::Arc;

use chrono::NaiveDateTime;

use super::{Responder, SharedClock, SystemClock};
use crate::utterance::Reply;

const KEYWORDS: &[&str] = &["time", "date", "day", "today", "now"];

/// 12-hour clock, e.g. `03:07 PM`.
const TIME_FORMAT: &str = "%I:%M %p";
const DATE_FORMAT: &str = "%B %d, %Y";
const FULL_DATE_FORMAT: &str = "%A, %B %d, %Y";

pub struct TimeResponder {
    clock: SharedClock,
}

impl TimeResponder {
    pub fn new(clock: SharedClock) -> Self {
        Self { clock }
    }

    fn reply_for(text: &str, now: NaiveDateTime) -> String {
        let time = now.format(TIME_FORMAT);
        if text.contains("time") {
            format!("The current time is {time}.")
        } else if text.contains("date") {
            format!("Today's date is {}.", now.format(DATE_FORMAT))
        } else if text.contains("today") {
            format!(
                "Today is {} and the time is {time}.",
                now.format(FULL_DATE_FORMAT)
            )
        } else if text.contains("day") {
            format!("Today is {}.", now.format("%A"))
        } else {
            format!(
                "The current time is {time} and today is {}.",
                now.format(FULL_DATE_FORMAT)
            )
        }
    }
}

impl Default for TimeResponder {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl Responder for TimeResponder {
    fn id(&self) -> &str {
        "time"
    }

    fn keywords(&self) -> &[&'static str] {
        KEYWORDS
    }

    fn handle(&self, text: &str) -> Reply {
        Reply::new(Self::reply_for(&text.to_lowercase(), self.clock.now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::responder::{test_support::at, FixedClock};

    fn responder() -> TimeResponder {
        // 2024-03-15 is a Friday.
        TimeResponder::new(Arc::new(FixedClock(at(15, 7))))
    }

    #[test]
    fn time_query_uses_twelve_hour_clock() {
        let reply = responder().handle("What TIME is it");
        assert_eq!(reply.as_str(), "The current time is 03:07 PM.");
    }

    #[test]
    fn date_query() {
        assert_eq!(
            responder().handle("what's the date").as_str(),
            "Today's date is March 15, 2024."
        );
    }

    #[test]
    fn today_is_checked_before_day() {
        assert_eq!(
            responder().handle("what is today").as_str(),
            "Today is Friday, March 15, 2024 and the time is 03:07 PM."
        );
        assert_eq!(
            responder().handle("which day is it").as_str(),
            "Today is Friday."
        );
    }

    #[test]
    fn now_falls_through_to_generic_reply() {
        let reply = responder().handle("right now");
        assert_eq!(
            reply.as_str(),
            "The current time is 03:07 PM and today is Friday, March 15, 2024."
        );
    }

    #[test]
    fn morning_hours_render_am() {
        let responder = TimeResponder::new(Arc::new(FixedClock(at(9, 5))));
        assert!(responder.handle("time").as_str().contains("09:05 AM"));
    }
}
