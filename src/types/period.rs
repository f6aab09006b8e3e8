use std::fmt;
use std::str::FromStr;

use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// A calendar period in ISO-8601 duration notation restricted to date parts,
/// e.g. `P10Y`, `P1Y6M`, `P2W`, `P30D`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Period {
    pub years: u32,
    pub months: u32,
    pub weeks: u32,
    pub days: u32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PeriodError {
    #[error("period '{0}' must start with 'P'")]
    MissingDesignator(String),
    #[error("period '{0}' has no components")]
    Empty(String),
    #[error("period '{0}' contains an invalid component")]
    InvalidComponent(String),
    #[error("adding period '{0}' overflows the calendar")]
    Overflow(String),
}

impl Period {
    pub fn years(years: u32) -> Self {
        Self {
            years,
            ..Default::default()
        }
    }

    pub fn days(days: u32) -> Self {
        Self {
            days,
            ..Default::default()
        }
    }

    pub fn add_to(&self, date: NaiveDate) -> Result<NaiveDate, PeriodError> {
        let months = self.years as u64 * 12 + self.months as u64;
        let days = self.weeks as u64 * 7 + self.days as u64;
        let months =
            u32::try_from(months).map_err(|_| PeriodError::Overflow(self.to_string()))?;

        date.checked_add_months(Months::new(months))
            .and_then(|d| d.checked_add_days(Days::new(days)))
            .ok_or_else(|| PeriodError::Overflow(self.to_string()))
    }
}

impl FromStr for Period {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s
            .strip_prefix('P')
            .ok_or_else(|| PeriodError::MissingDesignator(s.to_string()))?;
        if body.is_empty() {
            return Err(PeriodError::Empty(s.to_string()));
        }

        let mut period = Period::default();
        let mut digits = String::new();
        for ch in body.chars() {
            if ch.is_ascii_digit() {
                digits.push(ch);
                continue;
            }
            let value: u32 = digits
                .parse()
                .map_err(|_| PeriodError::InvalidComponent(s.to_string()))?;
            digits.clear();
            match ch {
                'Y' => period.years = value,
                'M' => period.months = value,
                'W' => period.weeks = value,
                'D' => period.days = value,
                _ => return Err(PeriodError::InvalidComponent(s.to_string())),
            }
        }
        if !digits.is_empty() {
            return Err(PeriodError::InvalidComponent(s.to_string()));
        }

        Ok(period)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("P")?;
        if self.years > 0 {
            write!(f, "{}Y", self.years)?;
        }
        if self.months > 0 {
            write!(f, "{}M", self.months)?;
        }
        if self.weeks > 0 {
            write!(f, "{}W", self.weeks)?;
        }
        if self.days > 0 || *self == Period::default() {
            write!(f, "{}D", self.days)?;
        }
        Ok(())
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
