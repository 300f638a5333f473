use crate::IdError;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Marker digit appended after the numeric value of every catalog id
pub const ID_MARKER: char = '1';

/// A catalog video id
///
/// Only the numeric value is stored; the textual id is always rebuilt as the
/// value followed by [`ID_MARKER`]. Ids are immutable: [`VideoId::next`] and
/// [`VideoId::previous`] return new values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VideoId {
    numeric: u64,
}

impl VideoId {
    /// Builds the id whose numeric value is `value`
    pub const fn from_numeric(value: u64) -> Self {
        Self { numeric: value }
    }

    /// The value preceding the marker digit (`floor(id / 10)`)
    pub const fn numeric_value(&self) -> u64 {
        self.numeric
    }

    /// The id following this one, or `None` on overflow
    pub fn next(&self) -> Option<Self> {
        self.numeric.checked_add(1).map(Self::from_numeric)
    }

    /// The id preceding this one, or `None` when the numeric value is zero
    pub fn previous(&self) -> Option<Self> {
        self.numeric.checked_sub(1).map(Self::from_numeric)
    }

    /// Offsets the numeric value by `delta`, returning `None` outside `u64`
    pub(crate) fn offset(&self, delta: i128) -> Option<Self> {
        let value = i128::from(self.numeric) + delta;
        u64::try_from(value).ok().map(Self::from_numeric)
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.numeric == 0 {
            // floor(1 / 10) == 0, so the bare marker is the zero id
            write!(f, "{}", ID_MARKER)
        } else {
            write!(f, "{}{}", self.numeric, ID_MARKER)
        }
    }
}

impl FromStr for VideoId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(IdError::Empty);
        }
        if !s.chars().all(|c| c.is_ascii_digit()) {
            return Err(IdError::NotNumeric(s.to_string()));
        }

        let prefix = s
            .strip_suffix(ID_MARKER)
            .ok_or_else(|| IdError::MissingMarker(s.to_string()))?;

        if prefix.is_empty() {
            return Ok(Self::from_numeric(0));
        }

        prefix
            .parse::<u64>()
            .map(Self::from_numeric)
            .map_err(|_| IdError::OutOfRange(s.to_string()))
    }
}

impl Serialize for VideoId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
