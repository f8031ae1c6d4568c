#![allow(dead_code)]

use axum::{
    body::{Body, Bytes},
    extract::{Form, Path, State},
    http::{header, HeaderMap, Request, StatusCode},
    response::IntoResponse,
    routing::{get as get_route, post},
    Json, Router,
};
use caller_llm::LlmConfig;
use caller_server::{app, config::Config, AppState};
use caller_voice::TtsConfig;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tower::ServiceExt;

pub const CALL_SID: &str = "CA00000000000000000000000000000001";
pub const PUBLIC_URL: &str = "https://voice.test";
pub const RECORDING_AUDIO: &[u8] = b"RIFF-fake-wav";
pub const TRANSCRIPT: &str = "could someone look at my heater";
pub const API_KEY: &str = "dial-secret";

/// Fake OpenAI, ElevenLabs, Google and Twilio on one port.
#[derive(Clone, Default)]
pub struct Upstream {
    pub addr: Option<SocketAddr>,
    pub chat_requests: Arc<Mutex<Vec<Value>>>,
    pub tts_requests: Arc<Mutex<Vec<Value>>>,
    pub calendar_events: Arc<Mutex<Value>>,
    pub twilio_calls: Arc<Mutex<Vec<HashMap<String, String>>>>,
    pub transcription_uploads: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl Upstream {
    pub fn base(&self) -> String {
        format!("http://{}", self.addr.expect("upstream not started"))
    }

    /// Recording URL as Twilio posts it, without an extension.
    pub fn recording_url(&self, recording_sid: &str) -> String {
        format!(
            "{}/2010-04-01/Accounts/AC123/Recordings/{recording_sid}",
            self.base()
        )
    }

    /// System messages after the main prompt, joined.
    pub fn last_context(&self) -> String {
        let requests = self.chat_requests.lock().unwrap();
        let Some(last) = requests.last() else {
            return String::new();
        };
        last["messages"]
            .as_array()
            .map(|messages| {
                messages
                    .iter()
                    .skip(1)
                    .filter(|m| m["role"] == "system")
                    .filter_map(|m| m["content"].as_str())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default()
    }
}

async fn chat(State(up): State<Upstream>, Json(body): Json<Value>) -> impl IntoResponse {
    up.chat_requests.lock().unwrap().push(body.clone());

    let messages = body["messages"].as_array().cloned().unwrap_or_default();
    let last_user = messages
        .iter()
        .rev()
        .find(|m| m["role"] == "user")
        .and_then(|m| m["content"].as_str())
        .unwrap_or_default()
        .to_string();
    let context: String = messages
        .iter()
        .skip(1)
        .filter(|m| m["role"] == "system")
        .filter_map(|m| m["content"].as_str())
        .collect();

    if last_user.contains("slow") {
        tokio::time::sleep(Duration::from_millis(400)).await;
    }
    if last_user.contains("stall") {
        tokio::time::sleep(Duration::from_secs(30)).await;
    }
    if last_user.contains("fail") {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": {"message": "model overloaded"}})),
        );
    }

    let content = if last_user.contains("bye") {
        "Thanks for calling, goodbye! [END_CALL]".to_string()
    } else if context.contains("appointment slots are open") {
        "I have openings near you.".to_string()
    } else if context.contains("no open appointment slots") {
        "Nothing is open near you.".to_string()
    } else if context.contains("cannot be checked") {
        "The calendar is unavailable.".to_string()
    } else {
        format!("You said: {last_user}")
    };

    (
        StatusCode::OK,
        Json(json!({
            "id": "chatcmpl-test",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
        })),
    )
}

async fn tts(State(up): State<Upstream>, Json(body): Json<Value>) -> impl IntoResponse {
    up.tts_requests.lock().unwrap().push(body);
    (
        [(header::CONTENT_TYPE, "audio/mpeg")],
        b"ID3-fake-mp3".to_vec(),
    )
}

async fn token(Form(form): Form<HashMap<String, String>>) -> impl IntoResponse {
    if form.get("code").map(String::as_str) == Some("bad") {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid_grant", "error_description": "Bad Request"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "access_token": "access-test",
            "refresh_token": "refresh-test",
            "expires_in": 3600
        })),
    )
}

async fn events(State(up): State<Upstream>, headers: HeaderMap) -> impl IntoResponse {
    if headers.get(header::AUTHORIZATION).is_none() {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": {"message": "Login Required"}})),
        );
    }
    let body = up.calendar_events.lock().unwrap().clone();
    (StatusCode::OK, Json(body))
}

async fn create_call(
    State(up): State<Upstream>,
    Form(form): Form<HashMap<String, String>>,
) -> impl IntoResponse {
    let to = form.get("To").cloned().unwrap_or_default();
    up.twilio_calls.lock().unwrap().push(form);
    if to == "+15550000000" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"code": 21211, "message": "The 'To' number is not a valid phone number."})),
        );
    }
    (
        StatusCode::CREATED,
        Json(json!({"sid": "CA-outbound-1", "status": "queued"})),
    )
}

async fn recording(Path((_account, file)): Path<(String, String)>) -> impl IntoResponse {
    if file != "RE-good.wav" {
        return (StatusCode::NOT_FOUND, Vec::new());
    }
    (StatusCode::OK, RECORDING_AUDIO.to_vec())
}

async fn transcription(State(up): State<Upstream>, body: Bytes) -> Json<Value> {
    up.transcription_uploads.lock().unwrap().push(body.to_vec());
    Json(json!({ "text": format!("  {TRANSCRIPT}\n") }))
}

pub async fn spawn_upstream() -> Upstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let upstream = Upstream {
        addr: Some(listener.local_addr().unwrap()),
        ..Default::default()
    };
    *upstream.calendar_events.lock().unwrap() = json!({"items": []});

    let router = Router::new()
        .route("/v1/chat/completions", post(chat))
        .route("/v1/text-to-speech/{voice_id}", post(tts))
        .route("/token", post(token))
        .route("/calendar/v3/calendars/primary/events", get_route(events))
        .route("/2010-04-01/Accounts/{sid}/Calls.json", post(create_call))
        .route(
            "/2010-04-01/Accounts/{sid}/Recordings/{file}",
            get_route(recording),
        )
        .route("/v1/audio/transcriptions", post(transcription))
        .with_state(upstream.clone());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    upstream
}

pub struct Harness {
    pub router: Router,
    pub state: AppState,
    pub upstream: Upstream,
    pub audio_dir: TempDir,
}

/// Server wired to the fake upstream. Speech synthesis and calendar are
/// off unless `tweak` turns them on via [`enable_tts`] / [`enable_calendar`].
pub async fn harness(tweak: impl FnOnce(&mut Config, &Upstream)) -> Harness {
    let upstream = spawn_upstream().await;
    let audio_dir = tempfile::tempdir().unwrap();

    let mut config = Config::default();
    config.server.public_url = PUBLIC_URL.to_string();
    config.server.audio_dir = audio_dir.path().to_string_lossy().into_owned();
    config.server.api_key = Some(API_KEY.to_string());
    config.openai = LlmConfig::new("sk-test").with_api_base(format!("{}/v1", upstream.base()));
    config.transcription.api_key = "sk-test".to_string();
    config.transcription.api_base = format!("{}/v1", upstream.base());
    config.conversation.greeting = "Hello caller".to_string();
    config.conversation.reprompt = "Please say that again".to_string();
    config.conversation.goodbye = "Goodbye for now".to_string();
    config.conversation.filler = "One moment".to_string();
    config.conversation.apology = "Sorry about that".to_string();
    config.conversation.voicemail_message = "Please call us back".to_string();
    config.conversation.reply_wait_ms = 2_000;
    config.twilio.account_sid = "AC123".to_string();
    config.twilio.auth_token = "twilio-token".to_string();
    config.twilio.from_number = "+18005550100".to_string();
    config.twilio.api_base = upstream.base();
    tweak(&mut config, &upstream);

    let state = AppState::new(config).await.unwrap();
    Harness {
        router: app(state.clone()),
        state,
        upstream,
        audio_dir,
    }
}

pub fn enable_tts(config: &mut Config, upstream: &Upstream) {
    let mut tts = TtsConfig::new("xi-test", "voice-1");
    tts.api_base = upstream.base();
    config.elevenlabs = tts;
}

pub fn enable_calendar(config: &mut Config, upstream: &Upstream) {
    config.google.oauth.client_id = "cid".to_string();
    config.google.oauth.client_secret = "secret".to_string();
    config.google.oauth.redirect_uri = format!("{PUBLIC_URL}/oauth2callback");
    config.google.oauth.token_uri = format!("{}/token", upstream.base());
    config.google.api_base = upstream.base();
}

fn form_body(params: &[(&str, &str)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish()
}

pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, String) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, String::from_utf8_lossy(&body).into_owned())
}

pub async fn post_form(router: &Router, uri: &str, params: &[(&str, &str)]) -> (StatusCode, String) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form_body(params)))
        .unwrap();
    let (status, _, body) = send(router, request).await;
    (status, body)
}

pub async fn get(router: &Router, uri: &str) -> (StatusCode, HeaderMap, String) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(router, request).await
}

pub async fn answer(router: &Router) -> String {
    let (status, body) = post_form(
        router,
        "/voice-greeting",
        &[("CallSid", CALL_SID), ("From", "+15551230000"), ("To", "+18005550100")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body
}

pub async fn say(router: &Router, speech: &str) -> String {
    let (status, body) = post_form(
        router,
        "/gather",
        &[
            ("CallSid", CALL_SID),
            ("From", "+15551230000"),
            ("SpeechResult", speech),
            ("Confidence", "0.92"),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body
}
