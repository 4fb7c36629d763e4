//! Meeting and day-set types
//!
//! A meeting's days arrive from the source page as a compact code string
//! (`"MWF"`, `"TR"`). They are held as a small bitset and serialize back to the
//! same compact form so the persisted document stays readable.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Day of the week, in code order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Weekday {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl Weekday {
    /// All days in code order.
    pub const ALL: [Weekday; 7] = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ];

    /// Single-letter code used by the source site.
    pub fn code(self) -> char {
        match self {
            Weekday::Mon => 'M',
            Weekday::Tue => 'T',
            Weekday::Wed => 'W',
            Weekday::Thu => 'R',
            Weekday::Fri => 'F',
            Weekday::Sat => 'S',
            Weekday::Sun => 'U',
        }
    }

    /// Inverse of [`Weekday::code`], case-insensitive.
    pub fn from_code(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'M' => Some(Weekday::Mon),
            'T' => Some(Weekday::Tue),
            'W' => Some(Weekday::Wed),
            'R' => Some(Weekday::Thu),
            'F' => Some(Weekday::Fri),
            'S' => Some(Weekday::Sat),
            'U' => Some(Weekday::Sun),
            _ => None,
        }
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// Codes meaning "no fixed days" (kept as an empty set).
const UNSCHEDULED_CODES: [&str; 2] = ["TBA", "ARR"];

/// Set of weekdays a meeting recurs on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DaySet(u8);

impl DaySet {
    /// Empty set (unscheduled meeting).
    pub fn empty() -> Self {
        Self(0)
    }

    /// Parse a compact code string such as `"MWF"`.
    ///
    /// Blank strings and the unscheduled markers yield an empty set. Whitespace
    /// between letters is ignored. Returns `None` on any unknown letter.
    pub fn parse_code(code: &str) -> Option<Self> {
        let trimmed = code.trim();
        if trimmed.is_empty() || UNSCHEDULED_CODES.iter().any(|u| trimmed.eq_ignore_ascii_case(u)) {
            return Some(Self::empty());
        }

        let mut set = Self::empty();
        for c in trimmed.chars().filter(|c| !c.is_whitespace()) {
            set.insert(Weekday::from_code(c)?);
        }
        Some(set)
    }

    pub fn insert(&mut self, day: Weekday) {
        self.0 |= day.bit();
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & day.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Days in the set, Monday first.
    pub fn days(&self) -> Vec<Weekday> {
        Weekday::ALL.into_iter().filter(|d| self.contains(*d)).collect()
    }

    /// Compact code string, canonical order (`"MWF"`).
    pub fn code(&self) -> String {
        self.days().into_iter().map(Weekday::code).collect()
    }
}

impl FromIterator<Weekday> for DaySet {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        let mut set = Self::empty();
        for day in iter {
            set.insert(day);
        }
        set
    }
}

impl fmt::Display for DaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code())
    }
}

impl TryFrom<String> for DaySet {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse_code(&value).ok_or_else(|| format!("invalid day code: {:?}", value))
    }
}

impl From<DaySet> for String {
    fn from(value: DaySet) -> Self {
        value.code()
    }
}

/// One recurring timeslot for a course section.
///
/// Times are opaque display strings taken from the page as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    pub days: DaySet,
    pub start_time: String,
    pub end_time: String,
}

impl Meeting {
    pub fn new(days: DaySet, start_time: impl Into<String>, end_time: impl Into<String>) -> Self {
        Self {
            days,
            start_time: start_time.into(),
            end_time: end_time.into(),
        }
    }
}
