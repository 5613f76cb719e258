use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Season label in stats-API form, e.g. `2024-25`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Season {
    start_year: i32,
}

impl Season {
    pub fn starting(start_year: i32) -> Self {
        Self { start_year }
    }

    /// Regular seasons tip off in October; anything earlier belongs to the season
    /// that started the previous calendar year.
    pub fn current(today: NaiveDate) -> Self {
        let start_year = if today.month() >= 10 {
            today.year()
        } else {
            today.year() - 1
        };
        Self { start_year }
    }

    pub fn previous(&self) -> Self {
        Self {
            start_year: self.start_year - 1,
        }
    }

    pub fn start_year(&self) -> i32 {
        self.start_year
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{:02}",
            self.start_year,
            (self.start_year + 1).rem_euclid(100)
        )
    }
}

impl FromStr for Season {
    type Err = PipelineError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let invalid = || PipelineError::NotFound(format!("season '{trimmed}'"));
        let (start, end) = trimmed.split_once('-').ok_or_else(invalid)?;
        let start_year = start.parse::<i32>().map_err(|_| invalid())?;
        let end_short = end.parse::<i32>().map_err(|_| invalid())?;
        if start.len() != 4 || end.len() != 2 || (start_year + 1).rem_euclid(100) != end_short {
            return Err(invalid());
        }
        Ok(Self { start_year })
    }
}

impl TryFrom<String> for Season {
    type Error = PipelineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Season> for String {
    fn from(value: Season) -> Self {
        value.to_string()
    }
}
