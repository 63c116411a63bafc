use std::sync::Mutex;

use chrono::{NaiveDate, Utc};

/// Per-provider daily call budget. `daily_limit == 0` means unlimited.
/// Counter resets on UTC date change, mirroring the teacher's
/// `_last_reset_date`/`_calls_today` class attributes.
pub struct DailyBudget {
    daily_limit: u32,
    state: Mutex<(NaiveDate, u32)>,
}

impl DailyBudget {
    pub fn new(daily_limit: u32) -> Self {
        Self {
            daily_limit,
            state: Mutex::new((Utc::now().date_naive(), 0)),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(0)
    }

    fn roll_if_needed(&self, guard: &mut (NaiveDate, u32)) {
        let today = Utc::now().date_naive();
        if guard.0 != today {
            guard.0 = today;
            guard.1 = 0;
        }
    }

    pub fn ok(&self) -> bool {
        if self.daily_limit == 0 {
            return true;
        }
        let mut guard = self.state.lock().expect("budget mutex poisoned");
        self.roll_if_needed(&mut guard);
        guard.1 < self.daily_limit
    }

    pub fn record_call(&self) {
        let mut guard = self.state.lock().expect("budget mutex poisoned");
        self.roll_if_needed(&mut guard);
        guard.1 += 1;
    }
}
