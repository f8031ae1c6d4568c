use axum::{extract::Multipart, http::StatusCode, routing::post, Json, Router};
use caller_voice::{AudioStore, SttConfig, SttService, VoiceError};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;

async fn spawn_mock(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn transcriptions(mut multipart: Multipart) -> (StatusCode, Json<Value>) {
    let mut model = String::new();
    let mut file_len = 0;
    while let Some(field) = multipart.next_field().await.unwrap() {
        match field.name() {
            Some("model") => model = field.text().await.unwrap(),
            Some("file") => file_len = field.bytes().await.unwrap().len(),
            _ => {}
        }
    }
    if model != "whisper-1" || file_len == 0 {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": {"message": "bad form"}})));
    }
    (StatusCode::OK, Json(json!({"text": " my zip code is 77002 \n"})))
}

#[tokio::test]
async fn test_stt_transcribes_recording() {
    let addr = spawn_mock(Router::new().route("/v1/audio/transcriptions", post(transcriptions))).await;
    let config = SttConfig {
        api_base: format!("http://{addr}/v1"),
        api_key: "sk-test".to_string(),
        ..Default::default()
    };
    let stt = SttService::new(config).unwrap();

    let text = stt.transcribe(b"RIFF0000WAVE", "RE1.wav").await.unwrap();
    assert_eq!(text, "my zip code is 77002");
}

#[tokio::test]
async fn test_stt_rejects_empty_audio() {
    let config = SttConfig {
        api_key: "sk-test".to_string(),
        ..Default::default()
    };
    let stt = SttService::new(config).unwrap();
    let result = stt.transcribe(&[], "empty.wav").await;
    assert!(matches!(result, Err(VoiceError::Stt(_))));
}

#[tokio::test]
async fn test_store_save_and_remove() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = AudioStore::open(temp_dir.path().join("audio")).await.unwrap();

    let clip = store.save(b"ID3data").await.unwrap();
    assert!(clip.file_name.ends_with(".mp3"));
    let path = store.path_of(&clip.file_name).unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"ID3data");

    store.remove(&clip.file_name).await.unwrap();
    assert!(!path.exists());
    // Removing twice is fine.
    store.remove(&clip.file_name).await.unwrap();
}

#[tokio::test]
async fn test_store_rejects_path_traversal() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = AudioStore::open(temp_dir.path()).await.unwrap();

    for bad in ["../secret.mp3", "a/b.mp3", "", ".hidden"] {
        assert!(
            matches!(store.path_of(bad), Err(VoiceError::InvalidClipName(_))),
            "{bad:?} should be rejected"
        );
    }
}

#[tokio::test]
async fn test_store_lists_only_old_enough_clips() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = AudioStore::open(temp_dir.path()).await.unwrap();

    let first = store.save(b"ID3a").await.unwrap();
    let second = store.save(b"ID3b").await.unwrap();
    std::fs::write(temp_dir.path().join("notes.txt"), b"keep").unwrap();
    std::fs::create_dir(temp_dir.path().join("nested.mp3")).unwrap();

    let mut expected = vec![first.file_name, second.file_name];
    expected.sort();
    let listed = store.clips_older_than(Duration::ZERO).await.unwrap();
    assert_eq!(listed, expected);

    let fresh = store
        .clips_older_than(Duration::from_secs(3600))
        .await
        .unwrap();
    assert!(fresh.is_empty());
}
