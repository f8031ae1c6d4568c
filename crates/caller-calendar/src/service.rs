use crate::client::{CalendarClient, CalendarEvent};
use crate::config::GoogleConfig;
use crate::error::CalendarError;
use crate::slots::{find_slots, SlotRules};
use caller_types::{AppointmentSlot, ZipCode};
use chrono::{Days, Utc};

/// Page size for event listings; one page covers any realistic horizon.
const MAX_EVENTS: u32 = 250;

/// Calendar-backed appointment lookup.
#[derive(Debug, Clone)]
pub struct SchedulingService {
    client: CalendarClient,
    rules: SlotRules,
}

impl SchedulingService {
    pub fn new(config: &GoogleConfig, rules: SlotRules) -> Result<Self, CalendarError> {
        Ok(Self {
            client: CalendarClient::new(config)?,
            rules,
        })
    }

    pub fn client(&self) -> &CalendarClient {
        &self.client
    }

    pub fn rules(&self) -> &SlotRules {
        &self.rules
    }

    /// Open slots on upcoming days with an appointment near `zip`.
    pub async fn slots_near(&self, zip: &ZipCode) -> Result<Vec<AppointmentSlot>, CalendarError> {
        let tz = self
            .rules
            .timezone()
            .ok_or_else(|| CalendarError::Config("utc_offset_minutes out of range".to_string()))?;
        let now = Utc::now().with_timezone(&tz);

        // Start at local midnight so earlier events today still anchor the day.
        let midnight = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .and_then(|naive| naive.and_local_timezone(tz).single())
            .ok_or_else(|| CalendarError::Config("cannot compute local midnight".to_string()))?;
        let time_min = midnight.with_timezone(&Utc);
        let time_max = midnight
            .checked_add_days(Days::new(u64::from(self.rules.horizon_days)))
            .map(|t| t.with_timezone(&Utc));

        let events = self.client.list_events(time_min, time_max, MAX_EVENTS).await?;
        let slots = find_slots(&events, zip, now, &self.rules);
        tracing::debug!(
            zip = %zip,
            events = events.len(),
            slots = slots.len(),
            "calendar slot lookup"
        );
        Ok(slots)
    }

    /// Next `max_results` events from now, for the `/events` page.
    pub async fn upcoming(&self, max_results: u32) -> Result<Vec<CalendarEvent>, CalendarError> {
        self.client.list_events(Utc::now(), None, max_results).await
    }
}
