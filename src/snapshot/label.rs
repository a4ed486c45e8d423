//! Dated snapshot directory names.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};

const LABEL_FORMAT: &str = "%Y-%m-%d";

/// A snapshot directory name of the form `YYYY-MM-DD`.
///
/// Ordering follows the calendar, which matches lexicographic ordering of
/// the rendered names.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SnapshotLabel(NaiveDate);

impl SnapshotLabel {
    /// Creates a label for `date`.
    #[must_use]
    pub const fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// The calendar date of the snapshot.
    #[must_use]
    pub const fn date(self) -> NaiveDate {
        self.0
    }

    /// Snapshots taken on the first of a month are kept regardless of age.
    #[must_use]
    pub fn is_monthly_anchor(self) -> bool {
        self.0.day() == 1
    }

    /// Parses a directory name, accepting only the exact `YYYY-MM-DD` shape.
    ///
    /// Returns `None` for anything else, including well-shaped names that are
    /// not calendar dates.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        if !has_label_shape(name) {
            return None;
        }
        NaiveDate::parse_from_str(name, LABEL_FORMAT).ok().map(Self)
    }
}

fn has_label_shape(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(index, byte)| match index {
            4 | 7 => *byte == b'-',
            _ => byte.is_ascii_digit(),
        })
}

impl fmt::Display for SnapshotLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(LABEL_FORMAT))
    }
}

impl FromStr for SnapshotLabel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value).ok_or_else(|| format!("{value} is not a YYYY-MM-DD date"))
    }
}
