//! Google Calendar access and appointment-slot finding.
//!
//! The voice assistant offers callers appointment times on days when the
//! calendar already has an appointment near them. This crate covers the
//! whole path: the OAuth 2.0 authorization-code flow and token refresh,
//! listing calendar events, pulling ZIP codes out of event locations and
//! out of transcribed speech, and carving free slots out of business hours.
//!
//! Slot finding is a pure function of the event list, so it is tested
//! without any network access.

pub mod client;
pub mod config;
pub mod error;
pub mod oauth;
pub mod service;
pub mod slots;
pub mod zip;

pub use client::{upcoming_digest, CalendarClient, CalendarEvent, EventTime};
pub use config::{GoogleConfig, OAuthConfig, CALENDAR_READONLY_SCOPE};
pub use error::CalendarError;
pub use oauth::{OAuthClient, TokenCache, TokenSet};
pub use service::SchedulingService;
pub use slots::{find_slots, SlotRules};
pub use zip::{extract_zip, zip_from_speech};
