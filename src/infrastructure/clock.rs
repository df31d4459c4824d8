use crate::domain::ports::Clock;
use chrono::{Days, NaiveDate, Utc};
use std::sync::{Arc, RwLock};

/// Reads the date from the system clock, in UTC.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// A clock that only moves when told to. Clones share the same date.
#[derive(Debug, Clone)]
pub struct ManualClock {
    today: Arc<RwLock<NaiveDate>>,
}

impl ManualClock {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today: Arc::new(RwLock::new(today)),
        }
    }

    pub fn set(&self, date: NaiveDate) {
        let mut today = self.today.write().unwrap_or_else(|e| e.into_inner());
        *today = date;
    }

    pub fn advance_days(&self, days: u64) {
        let mut today = self.today.write().unwrap_or_else(|e| e.into_inner());
        if let Some(next) = today.checked_add_days(Days::new(days)) {
            *today = next;
        }
    }
}

impl Clock for ManualClock {
    fn today(&self) -> NaiveDate {
        *self.today.read().unwrap_or_else(|e| e.into_inner())
    }
}
