//! Free-slot search on days with a nearby appointment.

use crate::client::{CalendarEvent, EventTime};
use crate::zip::extract_zip;
use caller_types::{AppointmentSlot, ZipCode};
use chrono::{DateTime, Datelike, Days, Duration, FixedOffset, NaiveDate, TimeZone, Weekday};
use serde::{Deserialize, Serialize};

fn default_business_start_hour() -> u32 {
    9
}

fn default_business_end_hour() -> u32 {
    17
}

fn default_slot_minutes() -> u32 {
    60
}

fn default_horizon_days() -> u32 {
    7
}

fn default_max_slots() -> usize {
    3
}

fn default_zip_prefix_digits() -> usize {
    3
}

fn default_weekdays_only() -> bool {
    true
}

fn default_utc_offset_minutes() -> i32 {
    // US Central daylight time.
    -300
}

/// Business rules for offering appointments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRules {
    #[serde(default = "default_business_start_hour")]
    pub business_start_hour: u32,
    #[serde(default = "default_business_end_hour")]
    pub business_end_hour: u32,
    #[serde(default = "default_slot_minutes")]
    pub slot_minutes: u32,
    /// Days to look ahead, today included.
    #[serde(default = "default_horizon_days")]
    pub horizon_days: u32,
    #[serde(default = "default_max_slots")]
    pub max_slots: usize,
    /// Leading ZIP digits two locations must share to count as near.
    #[serde(default = "default_zip_prefix_digits")]
    pub zip_prefix_digits: usize,
    #[serde(default = "default_weekdays_only")]
    pub weekdays_only: bool,
    /// Offset of the business's local time from UTC.
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,
}

impl Default for SlotRules {
    fn default() -> Self {
        Self {
            business_start_hour: default_business_start_hour(),
            business_end_hour: default_business_end_hour(),
            slot_minutes: default_slot_minutes(),
            horizon_days: default_horizon_days(),
            max_slots: default_max_slots(),
            zip_prefix_digits: default_zip_prefix_digits(),
            weekdays_only: default_weekdays_only(),
            utc_offset_minutes: default_utc_offset_minutes(),
        }
    }
}

impl SlotRules {
    /// `None` when the configured offset is out of range.
    pub fn timezone(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes.checked_mul(60)?)
    }

    fn is_usable(&self) -> bool {
        self.slot_minutes > 0
            && self.business_start_hour < self.business_end_hour
            && self.business_end_hour <= 24
            && self.max_slots > 0
    }
}

fn on_day(event: &CalendarEvent, day: NaiveDate, tz: &FixedOffset) -> bool {
    match (event.start, event.end) {
        (EventTime::At(start), _) => start.with_timezone(tz).date_naive() == day,
        (EventTime::AllDay(start), EventTime::AllDay(end)) => {
            let end = if end > start { end } else { start + Days::new(1) };
            start <= day && day < end
        }
        (EventTime::AllDay(start), EventTime::At(_)) => start == day,
    }
}

fn blocking_interval(event: &CalendarEvent) -> Option<(DateTime<FixedOffset>, DateTime<FixedOffset>)> {
    if event.transparent {
        return None;
    }
    match (event.start, event.end) {
        (EventTime::At(start), EventTime::At(end)) => Some((start, end)),
        _ => None,
    }
}

/// Finds open slots on days when the calendar already has an appointment
/// near `caller_zip`.
///
/// Only timed, opaque events block time. All-day events still count as
/// being in an area that day. The returned slots are chronological and
/// at most `rules.max_slots` long.
pub fn find_slots(
    events: &[CalendarEvent],
    caller_zip: &ZipCode,
    now: DateTime<FixedOffset>,
    rules: &SlotRules,
) -> Vec<AppointmentSlot> {
    let mut slots = Vec::new();
    if !rules.is_usable() {
        return slots;
    }

    let Some(tz) = rules.timezone() else {
        return slots;
    };
    let today = now.with_timezone(&tz).date_naive();
    let busy: Vec<_> = events.iter().filter_map(blocking_interval).collect();
    let step = Duration::minutes(i64::from(rules.slot_minutes));

    for offset in 0..rules.horizon_days {
        let Some(day) = today.checked_add_days(Days::new(u64::from(offset))) else {
            break;
        };
        if rules.weekdays_only && matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            continue;
        }

        let anchor = events
            .iter()
            .filter(|e| on_day(e, day, &tz))
            .filter_map(|e| {
                let location = e.location.as_deref()?;
                let zip = extract_zip(location)?;
                zip.is_near(caller_zip, rules.zip_prefix_digits)
                    .then(|| (zip.distance(caller_zip), location))
            })
            .min_by_key(|(distance, _)| *distance)
            .map(|(_, location)| location.to_string());
        let Some(anchor) = anchor else {
            continue;
        };

        let (Some(open), Some(close)) = (
            local_time(&tz, day, rules.business_start_hour),
            local_time(&tz, day, rules.business_end_hour),
        ) else {
            continue;
        };

        let mut start = open;
        while start + step <= close {
            let end = start + step;
            let free = !busy.iter().any(|(b_start, b_end)| *b_start < end && *b_end > start);
            if start > now && free {
                slots.push(AppointmentSlot {
                    start,
                    end,
                    anchor_location: Some(anchor.clone()),
                });
                if slots.len() >= rules.max_slots {
                    return slots;
                }
            }
            start = end;
        }
    }
    slots
}

fn local_time(tz: &FixedOffset, day: NaiveDate, hour: u32) -> Option<DateTime<FixedOffset>> {
    let naive = if hour == 24 {
        day.succ_opt()?.and_hms_opt(0, 0, 0)?
    } else {
        day.and_hms_opt(hour, 0, 0)?
    };
    tz.from_local_datetime(&naive).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tz() -> FixedOffset {
        FixedOffset::west_opt(5 * 3600).unwrap()
    }

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<FixedOffset> {
        tz().with_ymd_and_hms(2026, 10, day, hour, minute, 0).unwrap()
    }

    fn timed(day: u32, from: u32, to: u32, location: Option<&str>) -> CalendarEvent {
        CalendarEvent {
            summary: Some("Job".to_string()),
            location: location.map(str::to_string),
            start: EventTime::At(at(day, from, 0)),
            end: EventTime::At(at(day, to, 0)),
            transparent: false,
        }
    }

    fn zip(s: &str) -> ZipCode {
        ZipCode::parse(s).unwrap()
    }

    fn rules() -> SlotRules {
        SlotRules {
            max_slots: 10,
            ..SlotRules::default()
        }
    }

    // 2026-10-19 is a Monday.
    const MONDAY: u32 = 19;

    #[test]
    fn offers_free_hours_on_nearby_day() {
        let events = vec![timed(MONDAY, 9, 11, Some("1 Main St, Houston, TX 77002"))];
        let now = at(17, 12, 0);
        let slots = find_slots(&events, &zip("77019"), now, &rules());
        let starts: Vec<_> = slots.iter().map(|s| s.start).collect();
        assert_eq!(
            starts,
            vec![
                at(MONDAY, 11, 0),
                at(MONDAY, 12, 0),
                at(MONDAY, 13, 0),
                at(MONDAY, 14, 0),
                at(MONDAY, 15, 0),
                at(MONDAY, 16, 0),
            ]
        );
        assert_eq!(
            slots[0].anchor_location.as_deref(),
            Some("1 Main St, Houston, TX 77002")
        );
    }

    #[test]
    fn far_away_days_are_skipped() {
        let events = vec![timed(MONDAY, 9, 10, Some("Dallas, TX 75201"))];
        let slots = find_slots(&events, &zip("77002"), at(17, 12, 0), &rules());
        assert!(slots.is_empty());
    }

    #[test]
    fn events_without_zip_do_not_qualify() {
        let events = vec![timed(MONDAY, 9, 10, Some("Zoom")), timed(MONDAY, 13, 14, None)];
        assert!(find_slots(&events, &zip("77002"), at(17, 12, 0), &rules()).is_empty());
    }

    #[test]
    fn transparent_events_do_not_block() {
        let mut event = timed(MONDAY, 9, 17, Some("Houston 77002"));
        event.transparent = true;
        let slots = find_slots(&[event], &zip("77002"), at(17, 12, 0), &rules());
        assert_eq!(slots.len(), 8);
    }

    #[test]
    fn all_day_event_marks_day_without_blocking() {
        let event = CalendarEvent {
            summary: Some("Houston route".to_string()),
            location: Some("Houston, TX 77005".to_string()),
            start: EventTime::AllDay(NaiveDate::from_ymd_opt(2026, 10, MONDAY).unwrap()),
            end: EventTime::AllDay(NaiveDate::from_ymd_opt(2026, 10, MONDAY + 1).unwrap()),
            transparent: false,
        };
        let slots = find_slots(&[event], &zip("77002"), at(17, 12, 0), &rules());
        assert_eq!(slots.len(), 8);
        assert_eq!(slots[0].start, at(MONDAY, 9, 0));
    }

    #[test]
    fn past_slots_are_not_offered() {
        let events = vec![timed(MONDAY, 9, 10, Some("77002"))];
        let now = at(MONDAY, 14, 30);
        let slots = find_slots(&events, &zip("77002"), now, &rules());
        let starts: Vec<_> = slots.iter().map(|s| s.start).collect();
        assert_eq!(starts, vec![at(MONDAY, 15, 0), at(MONDAY, 16, 0)]);
    }

    #[test]
    fn weekends_skipped_unless_allowed() {
        // 2026-10-17 is a Saturday.
        let events = vec![timed(17, 9, 10, Some("77002"))];
        let now = at(17, 6, 0);
        assert!(find_slots(&events, &zip("77002"), now, &rules()).is_empty());

        let weekend = SlotRules {
            weekdays_only: false,
            ..rules()
        };
        assert_eq!(find_slots(&events, &zip("77002"), now, &weekend).len(), 7);
    }

    #[test]
    fn limited_and_chronological_across_days() {
        let events = vec![
            timed(MONDAY + 1, 9, 16, Some("77002")),
            timed(MONDAY, 9, 15, Some("77002")),
        ];
        let limited = SlotRules {
            max_slots: 3,
            ..SlotRules::default()
        };
        let slots = find_slots(&events, &zip("77002"), at(17, 12, 0), &limited);
        let starts: Vec<_> = slots.iter().map(|s| s.start).collect();
        assert_eq!(
            starts,
            vec![at(MONDAY, 15, 0), at(MONDAY, 16, 0), at(MONDAY + 1, 16, 0)]
        );
    }

    #[test]
    fn nearest_location_anchors_the_day() {
        let events = vec![
            timed(MONDAY, 9, 10, Some("Far side 77099")),
            timed(MONDAY, 10, 11, Some("Close by 77003")),
        ];
        let slots = find_slots(&events, &zip("77002"), at(17, 12, 0), &rules());
        assert_eq!(slots[0].anchor_location.as_deref(), Some("Close by 77003"));
    }

    #[test]
    fn horizon_bounds_the_search() {
        let events = vec![timed(MONDAY + 7, 9, 10, Some("77002"))];
        let slots = find_slots(&events, &zip("77002"), at(17, 12, 0), &rules());
        assert!(slots.is_empty());
    }

    #[test]
    fn degenerate_rules_yield_nothing() {
        let events = vec![timed(MONDAY, 9, 10, Some("77002"))];
        let broken = SlotRules {
            slot_minutes: 0,
            ..rules()
        };
        assert!(find_slots(&events, &zip("77002"), at(17, 12, 0), &broken).is_empty());
    }
}
