//! Timestamp labels for new messages.

use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};

/// Hour convention for message timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HourFormat {
    #[default]
    TwentyFourHour,
    TwelveHour,
}

impl HourFormat {
    fn pattern(&self) -> &'static str {
        match self {
            HourFormat::TwentyFourHour => "%H:%M",
            HourFormat::TwelveHour => "%I:%M %p",
        }
    }

    pub fn format<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> String
    where
        Tz::Offset: std::fmt::Display,
    {
        at.format(self.pattern()).to_string()
    }
}

/// Produces the label stamped on a message when it is created.
pub trait Clock: Send + Sync {
    fn now(&self) -> String;
}

/// Local wall-clock time, hour:minute.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClock {
    format: HourFormat,
}

impl LocalClock {
    pub fn new(format: HourFormat) -> Self {
        Self { format }
    }
}

impl Clock for LocalClock {
    fn now(&self) -> String {
        self.format.format(&Local::now())
    }
}
