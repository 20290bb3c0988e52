//! Hours/minutes/seconds countdown value

use std::fmt;

use serde::{Deserialize, Serialize};

/// Immutable hours/minutes/seconds triple used for configured durations and
/// remaining countdown time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TimeValue {
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

impl TimeValue {
    pub const ZERO: TimeValue = TimeValue { hours: 0, minutes: 0, seconds: 0 };

    pub fn new(hours: u32, minutes: u32, seconds: u32) -> Self {
        Self { hours, minutes, seconds }
    }

    /// Check whether all three fields are zero
    pub fn is_zero(&self) -> bool {
        self.hours == 0 && self.minutes == 0 && self.seconds == 0
    }

    /// Step the countdown back by one second.
    ///
    /// Borrows a minute when seconds underflow and an hour when minutes
    /// underflow. Returns `None` when the value is already exhausted.
    pub fn decrement(self) -> Option<TimeValue> {
        if self.seconds > 0 {
            Some(Self { seconds: self.seconds - 1, ..self })
        } else if self.minutes > 0 {
            Some(Self { minutes: self.minutes - 1, seconds: 59, ..self })
        } else if self.hours > 0 {
            Some(Self { hours: self.hours - 1, minutes: 59, seconds: 59 })
        } else {
            None
        }
    }

    pub fn total_seconds(&self) -> u64 {
        u64::from(self.hours) * 3600 + u64::from(self.minutes) * 60 + u64::from(self.seconds)
    }

    pub fn from_total_seconds(total: u64) -> Self {
        Self {
            hours: u32::try_from(total / 3600).unwrap_or(u32::MAX),
            minutes: ((total % 3600) / 60) as u32,
            seconds: (total % 60) as u32,
        }
    }
}

/// Zero-padded `HH:MM:SS`
impl fmt::Display for TimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hours, self.minutes, self.seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decrement_borrows_minutes_and_hours() {
        assert_eq!(TimeValue::new(0, 1, 0).decrement(), Some(TimeValue::new(0, 0, 59)));
        assert_eq!(TimeValue::new(1, 0, 0).decrement(), Some(TimeValue::new(0, 59, 59)));
        assert_eq!(TimeValue::new(2, 3, 4).decrement(), Some(TimeValue::new(2, 3, 3)));
    }

    #[test]
    fn decrement_of_zero_is_exhausted() {
        assert_eq!(TimeValue::ZERO.decrement(), None);
    }

    #[test]
    fn reaches_zero_after_total_seconds_steps() {
        let mut time = TimeValue::new(1, 1, 1);
        for step in 1..=3661u64 {
            time = time.decrement().expect("not exhausted before zero");
            assert_eq!(time.total_seconds(), 3661 - step);
            assert!(time.minutes < 60 && time.seconds < 60);
        }
        assert!(time.is_zero());
        assert_eq!(time.decrement(), None);
    }

    #[test]
    fn total_seconds_round_trips() {
        for hours in [0, 1, 23, 100] {
            for minutes in [0, 1, 30, 59] {
                for seconds in [0, 1, 45, 59] {
                    let time = TimeValue::new(hours, minutes, seconds);
                    assert_eq!(TimeValue::from_total_seconds(time.total_seconds()), time);
                }
            }
        }
    }

    #[test]
    fn from_total_seconds_splits_fields() {
        assert_eq!(TimeValue::from_total_seconds(3725), TimeValue::new(1, 2, 5));
        assert_eq!(TimeValue::from_total_seconds(0), TimeValue::ZERO);
    }

    #[test]
    fn display_is_zero_padded() {
        assert_eq!(TimeValue::new(1, 2, 3).to_string(), "01:02:03");
    }
}
