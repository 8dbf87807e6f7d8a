//! Dialog state for picking a date and time, e.g. when scheduling a date
//! night or a manifestation reminder.
//!
//! The picker keeps two values: the `committed` one shown on the form field,
//! and a `pending` one being edited inside the open dialog. Only `confirm`
//! moves pending into committed; `cancel` throws the edits away.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

/// Minutes advance in steps of five, giving twelve choices per hour.
pub const MINUTE_STEP: u32 = 5;
pub const MINUTE_CHOICES: usize = 12;
pub const HOUR_CHOICES: usize = 24;

/// Which wheel set the open dialog shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PickerMode {
    #[default]
    Date,
    Time,
}

#[derive(Debug, Clone)]
pub struct DateTimePicker {
    committed: NaiveDateTime,
    pending: NaiveDateTime,
    visible_year: i32,
    visible_month: u32,
    min_date: Option<NaiveDate>,
    mode: PickerMode,
    open: bool,
}

impl DateTimePicker {
    pub fn new(initial: NaiveDateTime) -> Self {
        Self {
            committed: initial,
            pending: initial,
            visible_year: initial.date().year(),
            visible_month: initial.date().month(),
            min_date: None,
            mode: PickerMode::Date,
            open: false,
        }
    }

    /// Days before `min_date` cannot be selected; taps on them do nothing.
    pub fn with_min_date(mut self, min_date: NaiveDate) -> Self {
        self.min_date = Some(min_date);
        self
    }

    pub fn committed(&self) -> NaiveDateTime {
        self.committed
    }

    pub fn pending(&self) -> NaiveDateTime {
        self.pending
    }

    pub fn mode(&self) -> PickerMode {
        self.mode
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn visible_month(&self) -> (i32, u32) {
        (self.visible_year, self.visible_month)
    }

    /// Opens the dialog: pending restarts from the committed value and the
    /// calendar jumps back to the committed value's month.
    pub fn open(&mut self, mode: PickerMode) {
        self.mode = mode;
        self.pending = self.committed;
        self.visible_year = self.committed.date().year();
        self.visible_month = self.committed.date().month();
        self.open = true;
    }

    /// Month navigation moves the calendar only; the pending value stays put.
    pub fn next_month(&mut self) {
        self.shift_visible_month(1);
    }

    pub fn prev_month(&mut self) {
        self.shift_visible_month(-1);
    }

    fn shift_visible_month(&mut self, delta: i32) {
        let total = self.visible_year * 12 + (self.visible_month as i32 - 1) + delta;
        self.visible_year = total.div_euclid(12);
        self.visible_month = (total.rem_euclid(12) + 1) as u32;
    }

    /// Picks `day` within the visible month, keeping the pending time of day.
    /// Days that do not exist in the month and days before the minimum date
    /// are ignored without any error surface.
    pub fn select_day(&mut self, day: u32) {
        let Some(date) = NaiveDate::from_ymd_opt(self.visible_year, self.visible_month, day)
        else {
            return;
        };
        if self.min_date.is_some_and(|min| date < min) {
            return;
        }
        self.pending = NaiveDateTime::new(date, self.pending.time());
    }

    /// Hours are 24-hour values; anything past 23 is ignored.
    pub fn select_hour(&mut self, hour: u32) {
        if hour as usize >= HOUR_CHOICES {
            return;
        }
        if let Some(updated) = self.pending.with_hour(hour) {
            self.pending = updated;
        }
    }

    /// Minute wheel slot `index` maps to `index * 5`; out-of-range slots are
    /// ignored.
    pub fn select_minute_index(&mut self, index: usize) {
        if index >= MINUTE_CHOICES {
            return;
        }
        if let Some(updated) = self.pending.with_minute(index as u32 * MINUTE_STEP) {
            self.pending = updated;
        }
    }

    /// Closes the dialog keeping the edits.
    pub fn confirm(&mut self) -> NaiveDateTime {
        self.committed = self.pending;
        self.open = false;
        self.committed
    }

    /// Closes the dialog discarding the edits.
    pub fn cancel(&mut self) {
        self.pending = self.committed;
        self.open = false;
    }

    /// Label for the form field, e.g. "Wed, June 18, 2025".
    pub fn date_label(&self) -> String {
        format_date(self.committed.date())
    }

    /// Label for the form field, e.g. "7:05 PM".
    pub fn time_label(&self) -> String {
        format_time(self.committed.time())
    }

    /// Calendar header for the visible month, e.g. "June 2025".
    pub fn visible_month_label(&self) -> String {
        match NaiveDate::from_ymd_opt(self.visible_year, self.visible_month, 1) {
            Some(first) => first.format("%B %Y").to_string(),
            None => String::new(),
        }
    }
}

/// Maps a wheel scroll offset to the nearest item index, clamped to the
/// wheel's range.
pub fn wheel_index(offset: f64, item_extent: f64, choices: usize) -> usize {
    if choices == 0 || item_extent <= 0.0 {
        return 0;
    }
    let nearest = (offset / item_extent).round();
    nearest.clamp(0.0, (choices - 1) as f64) as usize
}

pub fn minute_options() -> [u32; MINUTE_CHOICES] {
    std::array::from_fn(|index| index as u32 * MINUTE_STEP)
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(0)
}

/// Number of leading blank cells in a Sunday-first month grid, i.e. how far
/// into the first row day 1 lands.
pub fn first_weekday_offset(year: i32, month: u32) -> u32 {
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(|first| first.weekday().num_days_from_sunday())
        .unwrap_or(0)
}

/// "Wed, June 18, 2025"
pub fn format_date(date: NaiveDate) -> String {
    date.format("%a, %B %-d, %Y").to_string()
}

/// "7:05 PM"
pub fn format_time(time: NaiveTime) -> String {
    let hour = time.hour() % 12;
    let hour = if hour == 0 { 12 } else { hour };
    let period = if time.hour() >= 12 { "PM" } else { "AM" };
    format!("{}:{:02} {}", hour, time.minute(), period)
}

#[cfg(test)]
#[path = "tests/picker_tests.rs"]
mod tests;
