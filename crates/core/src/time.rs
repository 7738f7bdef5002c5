//! Time source for timeline stamps and meeting windows.

use chrono::{DateTime, Duration, Utc};

/// Where "now" comes from.
///
/// Timeline entries are stamped and upcoming meetings are judged against
/// this, so tests pin it with [`Clock::Fixed`].
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    System,
    Fixed(DateTime<Utc>),
}

impl Clock {
    #[must_use]
    pub fn default_clock() -> Self {
        Self::System
    }

    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match *self {
            Clock::System => Utc::now(),
            Clock::Fixed(at) => at,
        }
    }

    /// Moves a fixed clock forward. A system clock is left alone.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(at) = self {
            *at += delta;
        }
    }
}

/// Formats a minute total as `"{hours}h {minutes}m"`.
///
/// Negative totals are clamped to zero.
///
/// ```
/// # use tracker_core::time::format_minutes;
/// assert_eq!(format_minutes(135), "2h 15m");
/// assert_eq!(format_minutes(0), "0h 0m");
/// ```
#[must_use]
pub fn format_minutes(total: i64) -> String {
    let total = total.max(0);
    format!("{}h {}m", total / 60, total % 60)
}

/// Deterministic timestamp for tests and examples (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests and doc examples.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

/// Returns a `Clock` fixed at the deterministic test timestamp.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}
