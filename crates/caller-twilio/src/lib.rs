//! Twilio plumbing for the caller service.
//!
//! Three concerns live here: building TwiML call-control documents,
//! decoding the form-encoded webhooks Twilio posts, and talking to the
//! Twilio REST API (placing outbound calls, fetching recordings). Request
//! signature validation is exposed as plain functions so the server can
//! wrap it in middleware.

pub mod client;
pub mod error;
pub mod signature;
pub mod twiml;
pub mod webhook;

pub use client::{OutboundCall, TwilioClient, TwilioConfig, DEFAULT_TWILIO_API_BASE};
pub use error::TwilioError;
pub use signature::{compute_signature, validate_signature, SIGNATURE_HEADER};
pub use twiml::{Gather, GatherInput, Record, Say, SpeechTimeout, Twiml, Verb};
pub use webhook::{AnsweredBy, CallStatus, CallStatusWebhook, VoiceWebhook};
