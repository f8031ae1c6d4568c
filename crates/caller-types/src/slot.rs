//! Appointment slots offered to callers.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// A bookable window found in the calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentSlot {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    /// Location of the nearby appointment that made this day eligible.
    pub anchor_location: Option<String>,
}

impl AppointmentSlot {
    /// Renders the slot start the way it should be read to a caller,
    /// e.g. `Tuesday, October 20 at 10:00 AM`.
    pub fn spoken(&self) -> String {
        self.start.format("%A, %B %-d at %-I:%M %p").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn spoken_form_is_phone_friendly() {
        let tz = FixedOffset::west_opt(5 * 3600).unwrap();
        let slot = AppointmentSlot {
            start: tz.with_ymd_and_hms(2026, 10, 20, 10, 0, 0).unwrap(),
            end: tz.with_ymd_and_hms(2026, 10, 20, 11, 0, 0).unwrap(),
            anchor_location: None,
        };
        assert_eq!(slot.spoken(), "Tuesday, October 20 at 10:00 AM");
    }

    #[test]
    fn afternoon_slot_uses_twelve_hour_clock() {
        let tz = FixedOffset::east_opt(0).unwrap();
        let slot = AppointmentSlot {
            start: tz.with_ymd_and_hms(2026, 10, 21, 14, 30, 0).unwrap(),
            end: tz.with_ymd_and_hms(2026, 10, 21, 15, 30, 0).unwrap(),
            anchor_location: Some("1 Main St, Houston, TX 77002".into()),
        };
        assert_eq!(slot.spoken(), "Wednesday, October 21 at 2:30 PM");
    }
}
