use {
    courier_config::Credentials,
    courier_protocol::LOGIN_API_VERSION,
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
    tracing::info,
};

use crate::error::{Error, Result};

#[derive(Deserialize)]
struct LoginResponse {
    bearer: String,
}

/// Log the bot user in and return the bearer token for the socket URL.
///
/// `base_url` is the scheme and host of the `agentVep` service.
pub async fn login(
    http: &reqwest::Client,
    base_url: &str,
    credentials: &Credentials,
) -> Result<Secret<String>> {
    let url = format!(
        "{}/api/account/{}/login?v={LOGIN_API_VERSION}",
        base_url.trim_end_matches('/'),
        credentials.account_id
    );
    let body = serde_json::json!({
        "username": credentials.username,
        "appKey": credentials.app_key.expose_secret(),
        "secret": credentials.secret.expose_secret(),
        "accessToken": credentials.access_token.expose_secret(),
        "accessTokenSecret": credentials.access_token_secret.expose_secret(),
    });

    let response = http.post(url).json(&body).send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Login { status, body });
    }

    let LoginResponse { bearer } = response.json().await?;
    info!(
        account_id = %credentials.account_id,
        username = %credentials.username,
        "logged in"
    );
    Ok(Secret::new(bearer))
}
