use crate::AppState;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use caller_twilio::{validate_signature, SIGNATURE_HEADER};
use std::sync::Arc;

/// Webhook bodies larger than this are rejected before validation.
const MAX_WEBHOOK_BODY_BYTES: usize = 64 * 1024;

/// Rejects webhooks without a valid `X-Twilio-Signature`.
///
/// Twilio signs the URL it called, so the URL is rebuilt from
/// `server.public_url`. The form body is buffered for the signature and
/// handed on unchanged. A no-op unless `twilio.validate_signatures`.
pub async fn twilio_signature_middleware(
    req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let state = req
        .extensions()
        .get::<Arc<AppState>>()
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?
        .clone();

    let twilio = &state.config.twilio;
    if !twilio.validate_signatures {
        return Ok(next.run(req).await);
    }

    let signature = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or(StatusCode::FORBIDDEN)?;

    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());
    let url = state.config.server.public_link(&path_and_query);

    let (parts, body) = req.into_parts();
    let bytes = axum::body::to_bytes(body, MAX_WEBHOOK_BODY_BYTES)
        .await
        .map_err(|_| StatusCode::PAYLOAD_TOO_LARGE)?;
    let params: Vec<(String, String)> = if parts.method == Method::POST {
        url::form_urlencoded::parse(&bytes).into_owned().collect()
    } else {
        Vec::new()
    };

    if !validate_signature(&twilio.auth_token, &url, &params, &signature) {
        tracing::warn!(url = %url, "rejected webhook with invalid Twilio signature");
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}

/// Guards operator endpoints with `Authorization: Bearer <server.api_key>`.
///
/// Without a configured key the guarded routes are closed.
pub async fn api_key_middleware(req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let state = req
        .extensions()
        .get::<Arc<AppState>>()
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?
        .clone();

    let Some(expected) = state.config.server.api_key.as_deref() else {
        tracing::warn!(path = %req.uri().path(), "server.api_key is not set; refusing request");
        return Err(StatusCode::FORBIDDEN);
    };

    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if !secrets_match(token.trim(), expected) {
        tracing::warn!(path = %req.uri().path(), "rejected request with wrong API key");
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(req).await)
}

/// Compares without stopping at the first differing byte.
fn secrets_match(given: &str, expected: &str) -> bool {
    let (given, expected) = (given.as_bytes(), expected.as_bytes());
    given.len() == expected.len()
        && given
            .iter()
            .zip(expected)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}
