//! Trading session classification by UTC hour-of-day.
//!
//! Ranges use an inclusive upper bound: 0–6 Asia, 7–11 London,
//! 12–16 NY, 17–23 Other.

use std::fmt;

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Session {
    Asia,
    London,
    #[serde(rename = "NY")]
    NewYork,
    Other,
}

impl Session {
    pub const ALL: [Session; 4] = [
        Session::Asia,
        Session::London,
        Session::NewYork,
        Session::Other,
    ];

    /// Map an hour-of-day to its session. Hours >= 24 wrap.
    pub fn from_hour(hour: u32) -> Self {
        match hour % 24 {
            0..=6 => Session::Asia,
            7..=11 => Session::London,
            12..=16 => Session::NewYork,
            _ => Session::Other,
        }
    }

    pub fn of(timestamp: &DateTime<Utc>) -> Self {
        Self::from_hour(timestamp.hour())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Session::Asia => "Asia",
            Session::London => "London",
            Session::NewYork => "NY",
            Session::Other => "Other",
        }
    }

    /// Parse the label used in strategy documents and bar rows.
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "Asia" => Some(Session::Asia),
            "London" => Some(Session::London),
            "NY" => Some(Session::NewYork),
            "Other" => Some(Session::Other),
            _ => None,
        }
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
