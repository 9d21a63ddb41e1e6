//! OAuth grant exchanger (component H): the redirect dance that turns a
//! one-shot authorization code into a tenant's long-lived refresh token.

pub mod state;
pub mod token;

use serde::Serialize;
use sqlx::PgPool;

use crate::config::Config;
use crate::domains::credentials::Credential;
use crate::kernel::AppError;

pub use state::OAuthState;

/// Scopes requested: send mail and read messages (for reply detection) on
/// behalf of the connected account.
const OAUTH_SCOPES: &str = "https://www.googleapis.com/auth/gmail.send \
     https://www.googleapis.com/auth/gmail.readonly";

#[derive(Debug, Serialize)]
pub struct AuthorizationUrl {
    pub ok: bool,
    pub auth_url: String,
    pub state: String,
}

/// `/oauth/start`: mint a nonce, persist it, and hand back the provider's
/// authorization URL. `prompt=consent` is required — without it the
/// provider may omit `refresh_token` on a re-grant from a user who has
/// already authorized this app once before.
pub async fn start(
    owner_id: &str,
    return_url: &str,
    config: &Config,
    pool: &PgPool,
) -> Result<AuthorizationUrl, AppError> {
    let ticket = OAuthState::create(owner_id, return_url, pool).await?;

    let auth_url = format!(
        "https://accounts.google.com/o/oauth2/v2/auth?\
         client_id={client_id}&redirect_uri={redirect_uri}&response_type=code&\
         access_type=offline&prompt=consent&scope={scope}&state={state}",
        client_id = urlencoding::encode(&config.google_client_id),
        redirect_uri = urlencoding::encode(&config.redirect_uri),
        scope = urlencoding::encode(OAUTH_SCOPES),
        state = urlencoding::encode(&ticket.nonce),
    );

    Ok(AuthorizationUrl {
        ok: true,
        auth_url,
        state: ticket.nonce,
    })
}

/// Outcome of a successful callback: where to redirect the browser and the
/// tenant that was just connected.
pub struct CallbackOutcome {
    pub return_url: String,
    pub owner_id: String,
}

/// `/oauth2/callback`: consume the one-shot state, exchange `code` for a
/// refresh token, decode the ID token for the connected email address, and
/// upsert the credential.
pub async fn callback(
    code: &str,
    nonce: &str,
    client: &reqwest::Client,
    config: &Config,
    pool: &PgPool,
) -> Result<CallbackOutcome, AppError> {
    let ticket = state::OAuthState::consume(nonce, pool)
        .await?
        .ok_or_else(|| AppError::Validation("Invalid or expired state".into()))?;

    let exchanged = token::exchange_code(client, config, code).await?;
    let email = exchanged
        .id_token
        .as_deref()
        .and_then(|t| decode_id_token_email(t).ok());

    Credential::upsert(
        &ticket.owner_id,
        email.as_deref(),
        &exchanged.refresh_token,
        pool,
    )
    .await?;

    Ok(CallbackOutcome {
        return_url: ticket.return_url,
        owner_id: ticket.owner_id,
    })
}

/// Decode the unverified payload segment of a JWT ID token and pull out the
/// `email` claim. The signature is not verified here — the token arrived
/// over a TLS connection directly from the provider's own token endpoint,
/// not from the client.
fn decode_id_token_email(id_token: &str) -> Result<String, AppError> {
    let payload_segment = id_token
        .split('.')
        .nth(1)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("id_token has no payload segment")))?;

    let payload_bytes = crate::common::base64url::decode(payload_segment)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("id_token payload not base64url: {e}")))?;

    #[derive(serde::Deserialize)]
    struct IdTokenPayload {
        email: Option<String>,
    }

    let payload: IdTokenPayload = serde_json::from_slice(&payload_bytes)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("id_token payload not JSON: {e}")))?;

    payload
        .email
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("id_token has no email claim")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    fn fake_id_token(email: &str) -> String {
        let header = URL_SAFE_NO_PAD.encode(b"{\"alg\":\"none\"}");
        let payload = URL_SAFE_NO_PAD.encode(format!("{{\"email\":\"{email}\"}}"));
        format!("{header}.{payload}.sig")
    }

    #[test]
    fn decodes_email_from_id_token_payload() {
        let token = fake_id_token("person@example.com");
        assert_eq!(decode_id_token_email(&token).unwrap(), "person@example.com");
    }

    #[test]
    fn decode_is_idempotent() {
        let token = fake_id_token("person@example.com");
        let first = decode_id_token_email(&token).unwrap();
        let second = decode_id_token_email(&token).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn rejects_malformed_token() {
        assert!(decode_id_token_email("not-a-jwt").is_err());
    }
}
