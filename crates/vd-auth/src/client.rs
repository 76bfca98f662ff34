use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use reqwest::{Client, header, redirect};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::config::{LOGIN_PAGE_PATH, RiotAuthConfig, oauth};
use crate::cookies::{RiotCookies, capture_set_cookies, merge_cookies};
use crate::errors::{AuthError, Result};
use crate::models::*;
use crate::region::determine_region;
use crate::tokens::{AuthTokens, extract_tokens_from_uri};

/// Outcome of a credential or multifactor submission
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    /// The full token set is ready
    Authenticated(AuthTokens),
    /// The account wants a second factor before issuing tokens
    MultifactorRequired(MfaChallenge),
}

/// Everything a caller needs to answer a multifactor challenge
#[derive(Debug, Clone)]
pub struct MfaChallenge {
    /// Cookie string that must be echoed back with the code submission
    pub cookies: String,
    pub multifactor: MultifactorDetails,
}

/// Silent token refresh from a previously stored upstream cookie string.
///
/// Implemented by [`RiotAuthClient`]; session-layer code depends on the
/// trait so tests can swap in stubs.
#[async_trait::async_trait]
pub trait Reauthenticate: Send + Sync {
    async fn reauthenticate(&self, cookies: &str) -> Result<AuthTokens>;
}

/// Main client for the Riot authorization flows
#[derive(Debug, Clone)]
pub struct RiotAuthClient {
    config: RiotAuthConfig,
    http: Client,
}

impl RiotAuthClient {
    /// Create a new authentication client.
    ///
    /// Redirects stay disabled for the whole client so 30x re-auth
    /// responses can be inspected directly.
    pub fn new(config: RiotAuthConfig) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(config.http_timeouts.connect)
            .timeout(config.http_timeouts.request)
            .user_agent(config.user_agent.as_deref().unwrap_or("valdash"))
            .redirect(redirect::Policy::none())
            .build()?;

        Ok(Self { config, http })
    }

    /// Authenticate with username and password.
    ///
    /// Returns [`LoginOutcome::MultifactorRequired`] when the account has
    /// MFA enabled; feed the challenge into [`Self::submit_mfa`] to finish.
    #[instrument(skip(self, username, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome> {
        if username.trim().is_empty() {
            return Err(AuthError::MissingInput("username"));
        }
        if password.is_empty() {
            return Err(AuthError::MissingInput("password"));
        }

        let cookies = self.init_auth_cookies().await?;
        let request = CredentialsRequest::new(username, password);
        self.submit_authorization(&cookies, &request, true).await
    }

    /// Submit a multifactor code together with the challenge cookies.
    ///
    /// A second multifactor challenge in the response is treated as failure.
    #[instrument(skip(self, code, cookies))]
    pub async fn submit_mfa(&self, code: &str, cookies: &str) -> Result<LoginOutcome> {
        if code.trim().is_empty() {
            return Err(AuthError::MissingInput("code"));
        }
        if cookies.trim().is_empty() {
            return Err(AuthError::MissingInput("cookies"));
        }

        let request = MultifactorRequest::new(code.trim());
        self.submit_authorization(cookies, &request, false).await
    }

    /// Complete a login from a pasted redirect URL carrying the token
    /// fragment. Skips init/credentials/MFA entirely.
    #[instrument(skip(self, uri))]
    pub async fn complete_from_redirect(&self, uri: &str) -> Result<AuthTokens> {
        if uri.trim().is_empty() {
            return Err(AuthError::MissingInput("redirect URL"));
        }
        self.finish_from_uri(uri.trim(), None).await
    }

    /// Mint fresh tokens from a previously captured cookie string.
    ///
    /// The stored ssid is never replaced by whatever the re-auth response
    /// sets; losing it would force the user back to a full credential login.
    #[instrument(skip(self, cookies))]
    pub async fn reauthenticate(&self, cookies: &str) -> Result<AuthTokens> {
        let named = RiotCookies::parse(cookies);
        let Some(original_ssid) = named.ssid.filter(|ssid| !ssid.is_empty()) else {
            return Err(AuthError::MissingSsid);
        };

        let mut url = self.config.authorize_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", self.config.redirect_uri.as_str())
            .append_pair("response_type", oauth::RESPONSE_TYPE)
            .append_pair("nonce", &fresh_nonce())
            .append_pair("scope", oauth::SCOPE);

        debug!("Attempting cookie re-auth");
        let response = self
            .send_with_retry(|| self.http.get(url.clone()).header(header::COOKIE, cookies))
            .await?;

        let status = response.status();
        if !matches!(status.as_u16(), 301 | 302 | 303) {
            return Err(AuthError::ReauthStatus(status));
        }

        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or(AuthError::ReauthStatus(status))?;

        if !location.contains("access_token") {
            if location.contains(LOGIN_PAGE_PATH) {
                debug!("Re-auth redirected to the login page");
                return Err(AuthError::SessionExpired);
            }
            return Err(AuthError::ReauthStatus(status));
        }

        // Fold the response cookies in, then force the original ssid back.
        let merged = merge_cookies(cookies, &capture_set_cookies(&response));
        let preserved = merge_cookies(&merged, &[format!("ssid={original_ssid}")]);

        self.finish_from_uri(&location, Some(preserved)).await
    }

    /// Exchange an access token for an entitlements token.
    #[instrument(skip(self, access_token))]
    pub async fn fetch_entitlements_token(&self, access_token: &str) -> Result<String> {
        debug!("Fetching entitlements token");
        let response = self
            .send_with_retry(|| {
                self.http
                    .post(self.config.entitlements_endpoint.clone())
                    .bearer_auth(access_token)
                    .json(&serde_json::json!({}))
            })
            .await?;

        if !response.status().is_success() {
            return Err(http_error(response).await);
        }

        let parsed: EntitlementsResponse = response.json().await?;
        Ok(parsed.entitlements_token)
    }

    /// Fetch the OpenID userinfo claims for an access token.
    #[instrument(skip(self, access_token))]
    pub async fn fetch_user_info(&self, access_token: &str) -> Result<UserInfoResponse> {
        debug!("Fetching userinfo claims");
        let response = self
            .send_with_retry(|| {
                self.http
                    .get(self.config.userinfo_endpoint.clone())
                    .bearer_auth(access_token)
            })
            .await?;

        if !response.status().is_success() {
            return Err(http_error(response).await);
        }

        let parsed: UserInfoResponse = response.json().await?;
        Ok(parsed)
    }

    /// POST the authorization init call and capture the session cookies.
    async fn init_auth_cookies(&self) -> Result<String> {
        let request = AuthInitRequest {
            client_id: self.config.client_id.clone(),
            nonce: fresh_nonce(),
            redirect_uri: self.config.redirect_uri.to_string(),
            response_type: oauth::RESPONSE_TYPE.to_string(),
            scope: oauth::SCOPE.to_string(),
        };

        debug!("Initializing authorization session");
        let response = self
            .send_with_retry(|| {
                self.http
                    .post(self.config.authorization_endpoint.clone())
                    .json(&request)
            })
            .await?;

        if !response.status().is_success() {
            return Err(http_error(response).await);
        }

        let cookies = merge_cookies("", &capture_set_cookies(&response));
        if cookies.is_empty() {
            return Err(AuthError::InvalidResponse(
                "authorization init set no cookies".to_string(),
            ));
        }
        Ok(cookies)
    }

    /// PUT a credentials or MFA body and dispatch on the discriminated
    /// response shape.
    async fn submit_authorization<B: Serialize>(
        &self,
        cookies: &str,
        request: &B,
        allow_mfa: bool,
    ) -> Result<LoginOutcome> {
        let response = self
            .send_with_retry(|| {
                self.http
                    .put(self.config.authorization_endpoint.clone())
                    .header(header::COOKIE, cookies)
                    .json(request)
            })
            .await?;

        if !response.status().is_success() {
            return Err(http_error(response).await);
        }

        let merged = merge_cookies(cookies, &capture_set_cookies(&response));
        let body = response.text().await?;
        let parsed: AuthResponse = serde_json::from_str(&body)
            .map_err(|_| AuthError::InvalidResponse(body.chars().take(200).collect()))?;

        match parsed {
            AuthResponse::Response { response } => {
                let tokens = self
                    .finish_from_uri(&response.parameters.uri, Some(merged))
                    .await?;
                Ok(LoginOutcome::Authenticated(tokens))
            }
            AuthResponse::Multifactor { multifactor } if allow_mfa => {
                debug!("Multifactor challenge issued");
                Ok(LoginOutcome::MultifactorRequired(MfaChallenge {
                    cookies: merged,
                    multifactor,
                }))
            }
            AuthResponse::Multifactor { .. } => Err(AuthError::UnexpectedMultifactor),
            AuthResponse::Error { error } => Err(AuthError::AuthFailure(error)),
        }
    }

    /// Shared pipeline tail: extract the token pair, resolve entitlements,
    /// userinfo and region, then assemble the result.
    async fn finish_from_uri(&self, uri: &str, cookies: Option<String>) -> Result<AuthTokens> {
        let extracted = extract_tokens_from_uri(uri).ok_or(AuthError::InvalidRedirect)?;

        let entitlements_token = self
            .fetch_entitlements_token(&extracted.access_token)
            .await?;
        let info = self.fetch_user_info(&extracted.access_token).await?;
        let region = determine_region(&info);
        let (game_name, tag_line) = match info.acct {
            Some(acct) => (acct.game_name, acct.tag_line),
            None => (None, None),
        };

        debug!(puuid = %info.sub, %region, "Login pipeline complete");
        Ok(AuthTokens {
            access_token: extracted.access_token,
            id_token: extracted.id_token,
            entitlements_token,
            puuid: info.sub,
            region,
            game_name,
            tag_line,
            country: info.country,
            cookies,
        })
    }

    /// Send a request, retrying transient connect/timeout failures within
    /// the configured budget.
    async fn send_with_retry<F>(&self, build: F) -> Result<reqwest::Response>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            match build().send().await {
                Ok(response) => return Ok(response),
                Err(err)
                    if attempt < self.config.retry.max_retries
                        && (err.is_connect() || err.is_timeout()) =>
                {
                    attempt += 1;
                    warn!(attempt, "Transient network failure, retrying: {}", err);
                    tokio::time::sleep(self.config.retry.base_delay).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

#[async_trait::async_trait]
impl Reauthenticate for RiotAuthClient {
    async fn reauthenticate(&self, cookies: &str) -> Result<AuthTokens> {
        RiotAuthClient::reauthenticate(self, cookies).await
    }
}

async fn http_error(response: reqwest::Response) -> AuthError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    AuthError::Http {
        status,
        body_snippet: body.chars().take(200).collect(),
    }
}

fn fresh_nonce() -> String {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
