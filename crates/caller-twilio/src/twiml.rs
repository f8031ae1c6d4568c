//! TwiML document builder.
//!
//! Only the verbs the voice assistant actually emits are modelled. The
//! builder is append-only: verbs render in the order they were added, and
//! `Gather` may nest `Say`, `Play` and `Pause` so prompts can be barged in
//! on.

use axum::http::header;
use axum::response::{IntoResponse, Response};
use std::fmt::Write as _;

/// Speech input kinds accepted by `<Gather>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatherInput {
    Speech,
    Dtmf,
    SpeechAndDtmf,
}

impl GatherInput {
    fn as_str(self) -> &'static str {
        match self {
            Self::Speech => "speech",
            Self::Dtmf => "dtmf",
            Self::SpeechAndDtmf => "dtmf speech",
        }
    }
}

/// End-of-speech detection for `<Gather>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechTimeout {
    Auto,
    Seconds(u32),
}

/// `<Say>` with optional voice and language.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Say {
    pub text: String,
    pub voice: Option<String>,
    pub language: Option<String>,
}

impl Say {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// `<Gather>` collecting caller input and posting it to `action`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gather {
    pub action: String,
    pub method: &'static str,
    pub input: GatherInput,
    pub timeout: Option<u32>,
    pub speech_timeout: Option<SpeechTimeout>,
    pub language: Option<String>,
    pub speech_model: Option<String>,
    /// When set, Twilio calls `action` even if nothing was heard.
    pub action_on_empty_result: bool,
    prompts: Vec<Verb>,
}

impl Gather {
    pub fn speech(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            method: "POST",
            input: GatherInput::Speech,
            timeout: None,
            speech_timeout: Some(SpeechTimeout::Auto),
            language: None,
            speech_model: None,
            action_on_empty_result: true,
            prompts: Vec::new(),
        }
    }

    pub fn input(mut self, input: GatherInput) -> Self {
        self.input = input;
        self
    }

    pub fn timeout(mut self, seconds: u32) -> Self {
        self.timeout = Some(seconds);
        self
    }

    pub fn speech_timeout(mut self, timeout: SpeechTimeout) -> Self {
        self.speech_timeout = Some(timeout);
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn speech_model(mut self, model: impl Into<String>) -> Self {
        self.speech_model = Some(model.into());
        self
    }

    pub fn say(mut self, say: Say) -> Self {
        self.prompts.push(Verb::Say(say));
        self
    }

    pub fn play(mut self, url: impl Into<String>) -> Self {
        self.prompts.push(Verb::Play { url: url.into() });
        self
    }

    pub fn pause(mut self, seconds: u32) -> Self {
        self.prompts.push(Verb::Pause { length: seconds });
        self
    }

    pub fn prompts(&self) -> &[Verb] {
        &self.prompts
    }
}

/// `<Record>` capturing caller audio for offline transcription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub action: String,
    pub method: &'static str,
    pub max_length: u32,
    pub timeout: u32,
    pub play_beep: bool,
}

impl Record {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            method: "POST",
            max_length: 30,
            timeout: 2,
            play_beep: false,
        }
    }
}

/// A TwiML verb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verb {
    Say(Say),
    Play { url: String },
    Pause { length: u32 },
    Gather(Gather),
    Record(Record),
    Redirect { url: String, method: &'static str },
    Hangup,
}

/// A `<Response>` document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Twiml {
    verbs: Vec<Verb>,
}

impl Twiml {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn say(self, text: impl Into<String>) -> Self {
        self.verb(Verb::Say(Say::new(text)))
    }

    pub fn say_with(self, say: Say) -> Self {
        self.verb(Verb::Say(say))
    }

    pub fn play(self, url: impl Into<String>) -> Self {
        self.verb(Verb::Play { url: url.into() })
    }

    pub fn pause(self, seconds: u32) -> Self {
        self.verb(Verb::Pause { length: seconds })
    }

    pub fn gather(self, gather: Gather) -> Self {
        self.verb(Verb::Gather(gather))
    }

    pub fn record(self, record: Record) -> Self {
        self.verb(Verb::Record(record))
    }

    pub fn redirect(self, url: impl Into<String>) -> Self {
        self.verb(Verb::Redirect {
            url: url.into(),
            method: "POST",
        })
    }

    pub fn hangup(self) -> Self {
        self.verb(Verb::Hangup)
    }

    pub fn verb(mut self, verb: Verb) -> Self {
        self.verbs.push(verb);
        self
    }

    pub fn verbs(&self) -> &[Verb] {
        &self.verbs
    }

    /// Renders the document as XML.
    pub fn to_xml(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response>");
        for verb in &self.verbs {
            write_verb(&mut out, verb);
        }
        out.push_str("</Response>");
        out
    }
}

impl IntoResponse for Twiml {
    fn into_response(self) -> Response {
        ([(header::CONTENT_TYPE, "application/xml")], self.to_xml()).into_response()
    }
}

fn write_verb(out: &mut String, verb: &Verb) {
    match verb {
        Verb::Say(say) => {
            out.push_str("<Say");
            attr_opt(out, "voice", say.voice.as_deref());
            attr_opt(out, "language", say.language.as_deref());
            out.push('>');
            out.push_str(&escape(&say.text));
            out.push_str("</Say>");
        }
        Verb::Play { url } => {
            out.push_str("<Play>");
            out.push_str(&escape(url));
            out.push_str("</Play>");
        }
        Verb::Pause { length } => {
            let _ = write!(out, "<Pause length=\"{length}\"/>");
        }
        Verb::Gather(gather) => {
            out.push_str("<Gather");
            attr(out, "action", &gather.action);
            attr(out, "method", gather.method);
            attr(out, "input", gather.input.as_str());
            if let Some(timeout) = gather.timeout {
                attr(out, "timeout", &timeout.to_string());
            }
            match gather.speech_timeout {
                Some(SpeechTimeout::Auto) => attr(out, "speechTimeout", "auto"),
                Some(SpeechTimeout::Seconds(s)) => attr(out, "speechTimeout", &s.to_string()),
                None => {}
            }
            attr_opt(out, "language", gather.language.as_deref());
            attr_opt(out, "speechModel", gather.speech_model.as_deref());
            if gather.action_on_empty_result {
                attr(out, "actionOnEmptyResult", "true");
            }
            if gather.prompts.is_empty() {
                out.push_str("/>");
            } else {
                out.push('>');
                for prompt in &gather.prompts {
                    write_verb(out, prompt);
                }
                out.push_str("</Gather>");
            }
        }
        Verb::Record(record) => {
            out.push_str("<Record");
            attr(out, "action", &record.action);
            attr(out, "method", record.method);
            attr(out, "maxLength", &record.max_length.to_string());
            attr(out, "timeout", &record.timeout.to_string());
            attr(out, "playBeep", if record.play_beep { "true" } else { "false" });
            attr(out, "trim", "trim-silence");
            out.push_str("/>");
        }
        Verb::Redirect { url, method } => {
            out.push_str("<Redirect");
            attr(out, "method", method);
            out.push('>');
            out.push_str(&escape(url));
            out.push_str("</Redirect>");
        }
        Verb::Hangup => out.push_str("<Hangup/>"),
    }
}

fn attr(out: &mut String, name: &str, value: &str) {
    let _ = write!(out, " {name}=\"{}\"", escape(value));
}

fn attr_opt(out: &mut String, name: &str, value: Option<&str>) {
    if let Some(value) = value {
        attr(out, name, value);
    }
}

/// Escapes the five XML special characters.
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
