use std::time::Duration;
use url::Url;

/// Riot authentication endpoints
pub mod endpoints {
    pub const AUTHORIZATION: &str = "https://auth.riotgames.com/api/v1/authorization";
    pub const AUTHORIZE: &str = "https://auth.riotgames.com/authorize";
    pub const ENTITLEMENTS: &str = "https://entitlements.auth.riotgames.com/api/token/v1";
    pub const USERINFO: &str = "https://auth.riotgames.com/userinfo";
}

/// OAuth parameters of the Valorant web client
pub mod oauth {
    pub const CLIENT_ID: &str = "play-valorant-web-prod";
    pub const REDIRECT_URI: &str = "https://playvalorant.com/opt_in";
    pub const RESPONSE_TYPE: &str = "token id_token";
    pub const SCOPE: &str = "account openid";
}

/// Path fragment Riot redirects to when an ssid no longer mints tokens
pub const LOGIN_PAGE_PATH: &str = "/login";

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpTimeouts {
    pub connect: Duration,
    pub request: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(15),
            request: Duration::from_secs(30),
        }
    }
}

/// Retry policy for transient network failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Configuration for RiotAuthClient
#[derive(Debug, Clone)]
pub struct RiotAuthConfig {
    /// OAuth client ID (the stock Valorant web client by default)
    pub client_id: String,

    /// OAuth redirect URI the token fragment lands on
    pub redirect_uri: Url,

    /// Cookie-initialization and credential-submission endpoint
    pub authorization_endpoint: Url,

    /// Cookie re-auth endpoint
    pub authorize_endpoint: Url,

    /// Entitlements token exchange endpoint
    pub entitlements_endpoint: Url,

    /// OpenID userinfo endpoint
    pub userinfo_endpoint: Url,

    /// HTTP client timeouts
    pub http_timeouts: HttpTimeouts,

    /// Custom user agent (optional)
    pub user_agent: Option<String>,

    /// Retry policy
    pub retry: RetryPolicy,
}

impl RiotAuthConfig {
    /// Create config pointing at the production Riot endpoints
    pub fn production() -> Self {
        Self {
            client_id: oauth::CLIENT_ID.to_string(),
            redirect_uri: Url::parse(oauth::REDIRECT_URI).expect("valid redirect URI"),
            authorization_endpoint: Url::parse(endpoints::AUTHORIZATION)
                .expect("valid authorization endpoint"),
            authorize_endpoint: Url::parse(endpoints::AUTHORIZE).expect("valid authorize endpoint"),
            entitlements_endpoint: Url::parse(endpoints::ENTITLEMENTS)
                .expect("valid entitlements endpoint"),
            userinfo_endpoint: Url::parse(endpoints::USERINFO).expect("valid userinfo endpoint"),
            http_timeouts: HttpTimeouts::default(),
            user_agent: Some("valdash".to_string()),
            retry: RetryPolicy::default(),
        }
    }

    /// Override the authorization endpoint (useful against a local mock server)
    #[must_use]
    pub fn with_authorization_endpoint(mut self, url: Url) -> Self {
        self.authorization_endpoint = url;
        self
    }

    /// Override the cookie re-auth endpoint
    #[must_use]
    pub fn with_authorize_endpoint(mut self, url: Url) -> Self {
        self.authorize_endpoint = url;
        self
    }

    /// Override the entitlements endpoint
    #[must_use]
    pub fn with_entitlements_endpoint(mut self, url: Url) -> Self {
        self.entitlements_endpoint = url;
        self
    }

    /// Override the userinfo endpoint
    #[must_use]
    pub fn with_userinfo_endpoint(mut self, url: Url) -> Self {
        self.userinfo_endpoint = url;
        self
    }

    /// Override the retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for RiotAuthConfig {
    fn default() -> Self {
        Self::production()
    }
}
