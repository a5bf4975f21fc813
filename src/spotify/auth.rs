use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::{Error, Result, config::SpotifySettings, types::Credential};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

/// Builds the authorization URL for the PKCE flow.
///
/// The user is sent here to grant access; Spotify redirects back to the
/// configured redirect URI with `code` and the unchanged `state`.
///
/// # Example
///
/// ```
/// let url = authorize_url(&settings, "0b6f...", "E9Melhoa2Owv...");
/// // https://accounts.spotify.com/authorize?client_id=...&state=0b6f...
/// ```
pub fn authorize_url(settings: &SpotifySettings, state: &str, code_challenge: &str) -> String {
    format!(
        "{auth_url}?client_id={client_id}&response_type=code&redirect_uri={redirect_uri}&code_challenge={code_challenge}&code_challenge_method=S256&scope={scope}&state={state}",
        auth_url = settings.auth_url,
        client_id = urlencoding::encode(&settings.client_id),
        redirect_uri = urlencoding::encode(&settings.redirect_uri),
        code_challenge = code_challenge,
        scope = urlencoding::encode(&settings.scope),
        state = urlencoding::encode(state),
    )
}

/// Exchanges an authorization code and its PKCE verifier for a credential.
///
/// # Errors
///
/// - [`Error::Transport`] when the token endpoint cannot be reached
/// - [`Error::Authorization`] when the code is rejected (bad, expired or
///   already used code, verifier mismatch, denied scope)
pub async fn exchange_code_pkce(
    http: &Client,
    settings: &SpotifySettings,
    code: &str,
    verifier: &str,
) -> Result<Credential> {
    let res = http
        .post(&settings.token_url)
        .form(&[
            ("grant_type", "authorization_code"),
            ("client_id", settings.client_id.as_str()),
            ("code", code),
            ("code_verifier", verifier),
            ("redirect_uri", settings.redirect_uri.as_str()),
        ])
        .send()
        .await?;

    let token = read_token_response(res).await?;
    let refresh_token = token.refresh_token.ok_or_else(|| {
        Error::Authorization("token response did not include a refresh token".into())
    })?;

    debug!(expires_in = token.expires_in, "authorization code exchanged");
    Ok(Credential::from_grant(
        token.access_token,
        refresh_token,
        token.expires_in,
        token.scope.as_deref().unwrap_or_default(),
    ))
}

/// Trades the refresh token of `credential` for a new access token.
///
/// Spotify may omit the refresh token and scope in the response; the values
/// of the previous credential are carried over in that case.
pub async fn refresh_token(
    http: &Client,
    settings: &SpotifySettings,
    credential: &Credential,
) -> Result<Credential> {
    let res = http
        .post(&settings.token_url)
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", credential.refresh_token.as_str()),
            ("client_id", settings.client_id.as_str()),
        ])
        .send()
        .await?;

    let token = read_token_response(res).await?;
    let mut refreshed = Credential::from_grant(
        token.access_token,
        token
            .refresh_token
            .unwrap_or_else(|| credential.refresh_token.clone()),
        token.expires_in,
        token.scope.as_deref().unwrap_or_default(),
    );
    if refreshed.scope.is_empty() {
        refreshed.scope = credential.scope.clone();
    }

    debug!(expires_in = token.expires_in, "access token refreshed");
    Ok(refreshed)
}

async fn read_token_response(res: reqwest::Response) -> Result<TokenResponse> {
    let status = res.status();
    if status.is_server_error() {
        let body = res.text().await.unwrap_or_default();
        return Err(Error::Service {
            status: status.as_u16(),
            message: body,
        });
    }
    if !status.is_success() {
        let body = res.text().await.unwrap_or_default();
        return Err(Error::Authorization(format!("token endpoint returned {status}: {body}")));
    }
    Ok(res.json::<TokenResponse>().await?)
}
