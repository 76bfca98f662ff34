use thiserror::Error;

/// Riot authentication error types
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("{0} must not be empty")]
    MissingInput(&'static str),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP error {status}: {body_snippet}")]
    Http {
        status: reqwest::StatusCode,
        body_snippet: String,
    },

    #[error("Authentication rejected: {0}")]
    AuthFailure(String),

    #[error("Server issued a second multifactor challenge - aborting")]
    UnexpectedMultifactor,

    #[error("Redirect URI is missing access_token or id_token")]
    InvalidRedirect,

    #[error("Stored cookies have no ssid - cannot re-authenticate")]
    MissingSsid,

    #[error("Session expired - a full login is required")]
    SessionExpired,

    #[error("Unexpected re-auth status {0}")]
    ReauthStatus(reqwest::StatusCode),

    #[error("JSON serialization/deserialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

pub type Result<T> = std::result::Result<T, AuthError>;
