//! Google Calendar authorization routes.

use crate::api::ApiError;
use crate::AppState;
use axum::{
    extract::{Extension, Query},
    response::{Html, IntoResponse, Redirect, Response},
};
use caller_calendar::{upcoming_digest, CalendarError, SchedulingService};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How long an issued `state` stays redeemable.
const OAUTH_STATE_TTL: Duration = Duration::from_secs(600);

const EVENTS_PAGE_SIZE: u32 = 10;

fn scheduling(state: &AppState) -> Result<&SchedulingService, ApiError> {
    state.scheduling.as_ref().ok_or_else(|| {
        ApiError::ServiceUnavailable("calendar integration is not configured".to_string())
    })
}

/// Handler for `GET /authorize`.
pub async fn authorize_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Redirect, ApiError> {
    let service = scheduling(&state)?;
    let nonce = uuid::Uuid::new_v4().simple().to_string();
    let url = service
        .client()
        .tokens()
        .oauth()
        .authorization_url(&nonce)
        .map_err(|e| ApiError::InternalServerError(e.to_string()))?;

    {
        let mut states = state
            .oauth_states
            .lock()
            .map_err(|_| ApiError::InternalServerError("oauth state lock poisoned".to_string()))?;
        let now = Instant::now();
        states.retain(|_, issued| now.duration_since(*issued) < OAUTH_STATE_TTL);
        states.insert(nonce, now);
    }

    tracing::info!("redirecting to Google consent screen");
    Ok(Redirect::to(&url))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Handler for `GET /oauth2callback`.
pub async fn oauth_callback_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
) -> Result<Html<&'static str>, ApiError> {
    let service = scheduling(&state)?;
    if let Some(error) = query.error {
        return Err(ApiError::BadRequest(format!("authorization denied: {error}")));
    }

    let nonce = query.state.unwrap_or_default();
    let issued = state
        .oauth_states
        .lock()
        .map_err(|_| ApiError::InternalServerError("oauth state lock poisoned".to_string()))?
        .remove(&nonce);
    match issued {
        Some(at) if at.elapsed() < OAUTH_STATE_TTL => {}
        _ => {
            tracing::warn!("oauth callback with unknown or expired state");
            return Err(ApiError::BadRequest(
                "unknown or expired OAuth state".to_string(),
            ));
        }
    }

    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing authorization code".to_string()))?;

    let tokens = service
        .client()
        .tokens()
        .oauth()
        .exchange_code(&code)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "authorization code exchange failed");
            ApiError::BadGateway(e.to_string())
        })?;
    if tokens.refresh_token.is_none() {
        tracing::warn!("Google returned no refresh token; access will lapse when the token expires");
    }
    service.client().tokens().store(tokens).await;

    tracing::info!("calendar access authorized");
    Ok(Html(
        "<p>Authorization complete! The assistant can now read your calendar.</p>",
    ))
}

/// Handler for `GET /events`: a plain-text digest of upcoming events.
pub async fn events_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let service = scheduling(&state)?;
    match service.upcoming(EVENTS_PAGE_SIZE).await {
        Ok(events) => Ok(upcoming_digest(&events).into_response()),
        Err(CalendarError::NotAuthorized) => Ok(Redirect::to("/authorize").into_response()),
        Err(e) => {
            tracing::warn!(error = %e, "listing calendar events failed");
            Err(ApiError::BadGateway(e.to_string()))
        }
    }
}
