//! One-shot authorization flow
//!
//! `/auth` sends the browser to the streaming service's consent page;
//! `/auth/callback` exchanges the returned code for a token pair, verifies
//! the account belongs to the configured owner, and hands the pair to the
//! engine. No state survives between the two requests.

use axum::{
    extract::{Query, State},
    response::Redirect,
};
use serde::Deserialize;
use tracing::error;

use crate::http::{AppError, AppResult};
use crate::server::AppState;

const SCOPES: &str = "user-read-currently-playing user-read-email user-read-private";

pub async fn authorize(State(state): State<AppState>) -> AppResult<Redirect> {
    let url = state
        .spotify
        .authorize_url(SCOPES)
        .map_err(|e| AppError::internal(format!("Failed to build authorize URL: {e}")))?;
    Ok(Redirect::temporary(&url))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub error: Option<String>,
}

pub async fn callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> AppResult<&'static str> {
    if let Some(err) = query.error {
        return Err(AppError::bad_request(format!("Authorization refused: {err}")));
    }
    let code = query
        .code
        .ok_or_else(|| AppError::bad_request("Missing authorization code"))?;

    let grant = state.spotify.exchange_code(&code).await.map_err(|e| {
        error!(error = %e, "Failed to exchange authorization code");
        AppError::bad_gateway("Failed to exchange authorization code")
    })?;
    let refresh_token = grant
        .refresh_token
        .ok_or_else(|| AppError::bad_gateway("Token exchange returned no refresh token"))?;

    // Only the configured owner account may drive the relay
    let profile = state
        .spotify
        .profile(&grant.access_token)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to fetch account profile");
            AppError::bad_gateway("Failed to fetch account profile")
        })?;
    if profile.id != state.spotify_config.user_id {
        return Err(AppError::forbidden(
            "This is not the account this relay is configured for",
        ));
    }

    state
        .engine
        .set_tokens(&grant.access_token, &refresh_token)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to persist tokens");
            AppError::internal("Failed to persist tokens")
        })?;

    Ok("Tokens have been updated. You can close this window now.")
}
