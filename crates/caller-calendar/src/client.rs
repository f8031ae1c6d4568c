use crate::config::GoogleConfig;
use crate::error::CalendarError;
use crate::oauth::{OAuthClient, TokenCache};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// Start or end of an event. Google uses `date` for all-day events and
/// `dateTime` for everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTime {
    At(DateTime<FixedOffset>),
    AllDay(NaiveDate),
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventTime::At(at) => write!(f, "{}", at.to_rfc3339()),
            EventTime::AllDay(date) => write!(f, "{}", date.format("%Y-%m-%d")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEvent {
    pub summary: Option<String>,
    pub location: Option<String>,
    pub start: EventTime,
    pub end: EventTime,
    /// Marked "free" in the calendar; does not block time.
    pub transparent: bool,
}

impl CalendarEvent {
    pub fn is_all_day(&self) -> bool {
        matches!(self.start, EventTime::AllDay(_))
    }
}

#[derive(Debug, Deserialize)]
struct EventsPage {
    #[serde(default)]
    items: Vec<RawEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvent {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    transparency: Option<String>,
    start: Option<RawTime>,
    end: Option<RawTime>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTime {
    #[serde(default)]
    date_time: Option<String>,
    #[serde(default)]
    date: Option<String>,
}

impl RawTime {
    fn parse(&self) -> Result<EventTime, CalendarError> {
        if let Some(dt) = &self.date_time {
            return DateTime::parse_from_rfc3339(dt)
                .map(EventTime::At)
                .map_err(|e| CalendarError::InvalidResponse(format!("bad dateTime {dt}: {e}")));
        }
        if let Some(d) = &self.date {
            return NaiveDate::parse_from_str(d, "%Y-%m-%d")
                .map(EventTime::AllDay)
                .map_err(|e| CalendarError::InvalidResponse(format!("bad date {d}: {e}")));
        }
        Err(CalendarError::InvalidResponse(
            "event time has neither date nor dateTime".to_string(),
        ))
    }
}

impl RawEvent {
    fn into_event(self) -> Result<Option<CalendarEvent>, CalendarError> {
        if self.status.as_deref() == Some("cancelled") {
            return Ok(None);
        }
        let (Some(start), Some(end)) = (self.start, self.end) else {
            return Ok(None);
        };
        Ok(Some(CalendarEvent {
            summary: self.summary.filter(|s| !s.trim().is_empty()),
            location: self.location.filter(|s| !s.trim().is_empty()),
            start: start.parse()?,
            end: end.parse()?,
            transparent: self.transparency.as_deref() == Some("transparent"),
        }))
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Read-only Google Calendar v3 client.
#[derive(Debug, Clone)]
pub struct CalendarClient {
    http: reqwest::Client,
    api_base: String,
    calendar_id: String,
    tokens: TokenCache,
}

impl CalendarClient {
    pub fn new(config: &GoogleConfig) -> Result<Self, CalendarError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        let oauth = OAuthClient::new(http.clone(), config.oauth.clone());
        let tokens = match &config.refresh_token {
            Some(refresh) if !refresh.is_empty() => TokenCache::with_refresh_token(oauth, refresh),
            _ => TokenCache::new(oauth),
        };
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            calendar_id: config.calendar_id.clone(),
            tokens,
        })
    }

    pub fn tokens(&self) -> &TokenCache {
        &self.tokens
    }

    /// Lists single (expanded recurring) events ordered by start time.
    pub async fn list_events(
        &self,
        time_min: DateTime<Utc>,
        time_max: Option<DateTime<Utc>>,
        max_results: u32,
    ) -> Result<Vec<CalendarEvent>, CalendarError> {
        let access_token = self.tokens.access_token().await?;

        let mut url = url::Url::parse(&self.api_base)
            .map_err(|e| CalendarError::Config(format!("invalid api_base: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| CalendarError::Config("api_base cannot be a base URL".to_string()))?
            .pop_if_empty()
            .extend(["calendar", "v3", "calendars", &self.calendar_id, "events"]);
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("timeMin", &time_min.to_rfc3339())
                .append_pair("maxResults", &max_results.to_string())
                .append_pair("singleEvents", "true")
                .append_pair("orderBy", "startTime");
            if let Some(max) = time_max {
                query.append_pair("timeMax", &max.to_rfc3339());
            }
        }

        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or(body);
            return Err(CalendarError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let page: EventsPage = response.json().await?;
        let mut events = Vec::with_capacity(page.items.len());
        for raw in page.items {
            let summary = raw.summary.clone();
            match raw.into_event() {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        summary = ?summary,
                        error = %e,
                        "skipping unreadable calendar event"
                    );
                }
            }
        }
        Ok(events)
    }
}

/// Plain-text listing shown by the `/events` page.
pub fn upcoming_digest(events: &[CalendarEvent]) -> String {
    if events.is_empty() {
        return "No upcoming events found.".to_string();
    }
    let mut out = String::from("Upcoming Events:");
    for event in events {
        out.push('\n');
        out.push_str(&format!(
            "{}: {} - {}",
            event.start,
            event.summary.as_deref().unwrap_or("(untitled)"),
            event.location.as_deref().unwrap_or("No location"),
        ));
    }
    out
}
