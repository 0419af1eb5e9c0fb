//! The park calendar.
//!
//! A park year is the eight-month season from March to October. Progress
//! through a month is a 16-bit fraction (`month_ticks`) that advances by
//! [`MONTH_TICKS_INCREMENT`] every simulation tick, so one month lasts 16384
//! ticks regardless of how many days it has.

use serde::{Deserialize, Serialize};

/// Months in a park year.
pub const MONTH_COUNT: u32 = 8;

/// Days per month, March through October.
pub const DAYS_IN_MONTH: [u32; MONTH_COUNT as usize] = [31, 30, 31, 30, 31, 31, 30, 31];

/// Month fraction gained per tick.
pub const MONTH_TICKS_INCREMENT: u32 = 4;

/// Month fraction at which a new month begins.
pub const MONTH_TICKS_MAX: u32 = 0x10000;

const MONTH_NAMES: [&str; MONTH_COUNT as usize] = [
    "March", "April", "May", "June", "July", "August", "September", "October",
];

/// Calendar position of the park.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GameDate {
    month_ticks: u16,
    months_elapsed: u32,
}

impl GameDate {
    /// A date `months_elapsed` months after opening, `month_ticks` into the month.
    pub fn new(months_elapsed: u32, month_ticks: u16) -> Self {
        Self {
            month_ticks,
            months_elapsed,
        }
    }

    /// Advance by one tick. Returns `true` if the day of the month changed.
    pub fn advance(&mut self) -> bool {
        let day_before = (self.months_elapsed, self.day_of_month());
        let next = self.month_ticks as u32 + MONTH_TICKS_INCREMENT;
        if next >= MONTH_TICKS_MAX {
            self.month_ticks = 0;
            self.months_elapsed += 1;
        } else {
            self.month_ticks = next as u16;
        }
        day_before != (self.months_elapsed, self.day_of_month())
    }

    /// Progress through the current month as a 16-bit fraction.
    pub fn month_ticks(&self) -> u16 {
        self.month_ticks
    }

    /// Months since the park opened.
    pub fn months_elapsed(&self) -> u32 {
        self.months_elapsed
    }

    /// Zero-based month of the season (0 = March).
    pub fn month(&self) -> u32 {
        self.months_elapsed % MONTH_COUNT
    }

    /// One-based year.
    pub fn year(&self) -> u32 {
        self.months_elapsed / MONTH_COUNT + 1
    }

    /// English month name.
    pub fn month_name(&self) -> &'static str {
        MONTH_NAMES[self.month() as usize]
    }

    /// Days in the current month.
    pub fn days_in_month(&self) -> u32 {
        DAYS_IN_MONTH[self.month() as usize]
    }

    /// One-based day of the month.
    pub fn day_of_month(&self) -> u32 {
        ((self.days_in_month() * self.month_ticks as u32) >> 16) + 1
    }

    /// Whether the last tick crossed into a new day.
    pub fn is_day_start(&self) -> bool {
        let ticks = self.month_ticks as u32;
        if ticks < MONTH_TICKS_INCREMENT {
            return false;
        }
        let days = self.days_in_month();
        (days * ticks) >> 16 != (days * (ticks - MONTH_TICKS_INCREMENT)) >> 16
    }

    /// Quarter-month boundary.
    pub fn is_week_start(&self) -> bool {
        self.month_ticks & 0x3FFF == 0
    }

    /// Half-month boundary.
    pub fn is_fortnight_start(&self) -> bool {
        self.month_ticks & 0x7FFF == 0
    }

    /// The first tick of a month.
    pub fn is_month_start(&self) -> bool {
        self.month_ticks == 0
    }

    /// Daylight factor in `[0, 1]`: dark at the month edges, full light in the
    /// middle quarter.
    pub fn day_night_factor(&self) -> f32 {
        let fraction = self.month_ticks as f32 / MONTH_TICKS_MAX as f32;
        if fraction < 1.0 / 8.0 {
            0.0
        } else if fraction < 3.0 / 8.0 {
            (fraction - 1.0 / 8.0) / (2.0 / 8.0)
        } else if fraction < 5.0 / 8.0 {
            1.0
        } else if fraction < 7.0 / 8.0 {
            1.0 - (fraction - 5.0 / 8.0) / (2.0 / 8.0)
        } else {
            0.0
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
