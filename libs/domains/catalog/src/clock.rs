use std::sync::{Mutex, PoisonError};

use chrono::{Days, NaiveDate, Utc};

/// Source of the current date for due-date and fine arithmetic
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Wall clock, UTC calendar date
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// Manually controlled clock for tests and replays
#[derive(Debug)]
pub struct FixedClock {
    today: Mutex<NaiveDate>,
}

impl FixedClock {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today: Mutex::new(today),
        }
    }

    pub fn set(&self, today: NaiveDate) {
        *self.today.lock().unwrap_or_else(PoisonError::into_inner) = today;
    }

    /// Move the clock forward by `days`
    pub fn advance(&self, days: u64) {
        let mut today = self.today.lock().unwrap_or_else(PoisonError::into_inner);
        *today = today.checked_add_days(Days::new(days)).unwrap_or(NaiveDate::MAX);
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        *self.today.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn today(&self) -> NaiveDate {
        (**self).today()
    }
}
