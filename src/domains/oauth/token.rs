//! Token exchanges against the provider's OAuth2 token endpoint: the
//! one-shot authorization-code exchange (component H) and the per-call
//! refresh-token -> access-token exchange used by the mail sender and the
//! reply detector before every provider call.

use serde::Deserialize;

use crate::config::Config;
use crate::kernel::AppError;

const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: String,
}

/// Result of exchanging an authorization code: the refresh token to persist
/// and, when present, the ID token to decode for the connected email.
pub struct ExchangedCode {
    pub refresh_token: String,
    pub id_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CodeExchangeResponse {
    refresh_token: Option<String>,
    id_token: Option<String>,
}

/// Exchange a one-shot authorization `code` from `/oauth2/callback` for a
/// refresh token, via a form-urlencoded POST per the provider's spec.
pub async fn exchange_code(
    client: &reqwest::Client,
    config: &Config,
    code: &str,
) -> Result<ExchangedCode, AppError> {
    let params = [
        ("code", code),
        ("client_id", config.google_client_id.as_str()),
        ("client_secret", config.google_client_secret.as_str()),
        ("redirect_uri", config.redirect_uri.as_str()),
        ("grant_type", "authorization_code"),
    ];

    let resp = client
        .post(TOKEN_ENDPOINT)
        .form(&params)
        .send()
        .await
        .map_err(|e| AppError::SendError(format!("code exchange failed: {e}")))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(AppError::SendError(format!(
            "code exchange returned {status}: {body}"
        )));
    }

    let parsed: CodeExchangeResponse = resp
        .json()
        .await
        .map_err(|e| AppError::SendError(format!("code exchange response malformed: {e}")))?;

    let refresh_token = parsed.refresh_token.ok_or_else(|| {
        AppError::SendError(
            "provider did not return a refresh_token (missing prompt=consent?)".into(),
        )
    })?;

    Ok(ExchangedCode {
        refresh_token,
        id_token: parsed.id_token,
    })
}

pub async fn fetch_access_token(
    client: &reqwest::Client,
    config: &Config,
    refresh_token: &str,
) -> Result<String, AppError> {
    let params = [
        ("client_id", config.google_client_id.as_str()),
        ("client_secret", config.google_client_secret.as_str()),
        ("refresh_token", refresh_token),
        ("grant_type", "refresh_token"),
    ];

    let resp = client
        .post(TOKEN_ENDPOINT)
        .form(&params)
        .send()
        .await
        .map_err(|e| AppError::SendError(format!("access token exchange failed: {e}")))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(AppError::SendError(format!(
            "access token exchange returned {status}: {body}"
        )));
    }

    let parsed: AccessTokenResponse = resp
        .json()
        .await
        .map_err(|e| AppError::SendError(format!("access token response malformed: {e}")))?;

    Ok(parsed.access_token)
}
