// Authenticated Deezer gw-light client.
//
// A session is the bot account's `arl` cookie. Every call is a POST against
// the same endpoint, distinguished by a `method` query parameter, and
// carries a CSRF token fetched once at login via `deezer.getUserData`
// (the one method that works without a token).

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::notifications::Notification;
use super::social::{ProfileEntry, ProfileTab};
use super::traits::DeezerApi;

/// Endpoint for all gw-light method calls.
const GW_API_URL: &str = "https://www.deezer.com/ajax/gw-light.php";

/// Default base for turning a notification's relative share path into an
/// absolute URL (`/playlist/123` → `https://deezer.com/us/playlist/123`).
pub const DEFAULT_SHARE_BASE_URL: &str = "https://deezer.com/us";

/// Marker error for an expired or invalid session.
///
/// Surfaced when the gw API answers `NEED_USER_AUTH_REQUIRED`. There is no
/// automated re-authentication, so callers treat this as fatal for the
/// whole process.
#[derive(Debug)]
pub struct AuthRequired;

impl std::fmt::Display for AuthRequired {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Deezer rejected the session — check the arl cookie")
    }
}

impl std::error::Error for AuthRequired {}

/// Check an error chain for the fatal session marker.
pub fn is_auth_error(error: &anyhow::Error) -> bool {
    error
        .chain()
        .any(|cause| cause.downcast_ref::<AuthRequired>().is_some())
}

/// Authenticated client for the bot account.
pub struct DeezerClient {
    client: reqwest::Client,
    csrf_token: String,
    user_id: u64,
}

impl DeezerClient {
    /// Log in with the bot account's `arl` cookie.
    ///
    /// Bootstraps the session by calling `deezer.getUserData`, which returns
    /// the CSRF token (`checkForm`) and the account's user id. An arl that
    /// resolves to the anonymous user (id 0) is an authentication failure.
    pub async fn login(arl_cookie: &str) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::COOKIE,
            format!("arl={arl_cookie}")
                .parse()
                .context("arl cookie contains invalid header characters")?,
        );

        let client = reqwest::Client::builder()
            .user_agent("mixtape/0.1")
            .default_headers(headers)
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;

        let bootstrap = Self {
            client,
            csrf_token: String::new(),
            user_id: 0,
        };

        let user_data: UserData = bootstrap
            .call("deezer.getUserData", None)
            .await
            .context("Failed to establish Deezer session")?;

        if user_data.user.id == 0 {
            return Err(anyhow::Error::new(AuthRequired)
                .context("arl cookie resolved to an anonymous session"));
        }

        debug!(user_id = user_data.user.id, "Deezer session established");

        Ok(Self {
            client: bootstrap.client,
            csrf_token: user_data.check_form,
            user_id: user_data.user.id,
        })
    }

    /// The bot account's own user id.
    pub fn user_id(&self) -> u64 {
        self.user_id
    }

    /// Call a gw-light method and deserialize its `results` field.
    ///
    /// Responses are an envelope of `{error, results}`; a populated `error`
    /// fails the call, and an auth error poisons the whole session
    /// (see [`AuthRequired`]).
    pub(crate) async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: Option<serde_json::Value>,
    ) -> Result<T> {
        debug!(method = method, "gw API call");

        let request = self.client.post(GW_API_URL).query(&[
            ("method", method),
            ("input", "3"),
            ("api_version", "1.0"),
            ("api_token", self.csrf_token.as_str()),
        ]);

        let request = match payload {
            Some(body) => request.json(&body),
            None => request,
        };

        let response = request
            .send()
            .await
            .with_context(|| format!("gw request failed: {method}"))?;

        if !response.status().is_success() {
            let status = response.status();
            anyhow::bail!("gw {method} returned {status}");
        }

        let envelope: GwEnvelope<T> = response
            .json()
            .await
            .with_context(|| format!("Failed to deserialize {method} response"))?;

        if gw_error_is_populated(&envelope.error) {
            let rendered = envelope.error.to_string();
            if rendered.contains("NEED_USER_AUTH_REQUIRED") {
                return Err(anyhow::Error::new(AuthRequired)
                    .context(format!("gw {method} rejected the session")));
            }
            anyhow::bail!("gw {method} returned error: {rendered}");
        }

        envelope
            .results
            .ok_or_else(|| anyhow::anyhow!("gw {method} returned no results"))
    }
}

/// The gw error field is `[]` when empty and an object keyed by error code
/// otherwise.
fn gw_error_is_populated(error: &serde_json::Value) -> bool {
    match error {
        serde_json::Value::Null => false,
        serde_json::Value::Array(items) => !items.is_empty(),
        serde_json::Value::Object(map) => !map.is_empty(),
        _ => true,
    }
}

#[derive(Deserialize)]
struct GwEnvelope<T> {
    #[serde(default)]
    error: serde_json::Value,
    results: Option<T>,
}

// -- Serde types for deezer.getUserData --

#[derive(Deserialize)]
struct UserData {
    #[serde(rename = "checkForm")]
    check_form: String,
    #[serde(rename = "USER")]
    user: GwUser,
}

#[derive(Deserialize)]
struct GwUser {
    #[serde(rename = "USER_ID")]
    id: u64,
}

#[async_trait]
impl DeezerApi for DeezerClient {
    async fn notifications(&self) -> Result<Vec<Notification>> {
        DeezerClient::notifications(self).await
    }

    async fn mark_read(&self, notification_id: u64) -> Result<()> {
        DeezerClient::mark_read(self, notification_id).await
    }

    async fn profile_page(&self, tab: ProfileTab) -> Result<Vec<ProfileEntry>> {
        DeezerClient::profile_page(self, tab).await
    }

    async fn follow(&self, user_id: u64) -> Result<()> {
        DeezerClient::follow(self, user_id).await
    }
}
