use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::error::{AppError, AppResult};

/// A calendar month as the half-open interval `[start, end)`, where `end` is
/// the first day of the following month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthWindow {
    pub year: i32,
    pub month: u32,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl MonthWindow {
    pub fn new(year: i32, month: u32) -> AppResult<Self> {
        if !(1..=12).contains(&month) {
            return Err(AppError::bad_request(format!(
                "Invalid month {month}, expected 1-12"
            )));
        }

        let (next_year, next_month) = if month == 12 {
            (year + 1, 1)
        } else {
            (year, month + 1)
        };

        let start = NaiveDate::from_ymd_opt(year, month, 1);
        let end = NaiveDate::from_ymd_opt(next_year, next_month, 1);

        match (start, end) {
            (Some(start), Some(end)) => Ok(Self {
                year,
                month,
                start,
                end,
            }),
            _ => Err(AppError::bad_request(format!("Invalid year {year}"))),
        }
    }

    /// The window holding `date`.
    pub fn containing(date: NaiveDate) -> Self {
        let start = date.with_day(1).unwrap_or(date);
        let end = start
            .checked_add_months(chrono::Months::new(1))
            .unwrap_or(NaiveDate::MAX);
        Self {
            year: date.year(),
            month: date.month(),
            start,
            end,
        }
    }

    pub fn previous(&self) -> Self {
        let start = self
            .start
            .checked_sub_months(chrono::Months::new(1))
            .unwrap_or(NaiveDate::MIN);
        Self::containing(start)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }
}
