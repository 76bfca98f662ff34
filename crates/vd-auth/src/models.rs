use serde::{Deserialize, Serialize};

/// Authorization session-init request (POST /api/v1/authorization)
#[derive(Debug, Clone, Serialize)]
pub struct AuthInitRequest {
    pub client_id: String,
    pub nonce: String,
    pub redirect_uri: String,
    pub response_type: String,
    pub scope: String,
}

/// Credential submission (PUT /api/v1/authorization)
#[derive(Debug, Clone, Serialize)]
pub struct CredentialsRequest {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub username: String,
    pub password: String,
    pub remember: bool,
}

impl CredentialsRequest {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            kind: "auth",
            username: username.into(),
            password: password.into(),
            remember: true,
        }
    }
}

/// Multifactor code submission (PUT /api/v1/authorization)
#[derive(Debug, Clone, Serialize)]
pub struct MultifactorRequest {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub code: String,
    #[serde(rename = "rememberDevice")]
    pub remember_device: bool,
}

impl MultifactorRequest {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            kind: "multifactor",
            code: code.into(),
            remember_device: true,
        }
    }
}

/// Discriminated authorization response, keyed on the `type` field
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuthResponse {
    /// Credentials accepted; the redirect URI carries the token fragment
    Response { response: AuthRedirect },
    /// A second factor is required before tokens are issued
    Multifactor { multifactor: MultifactorDetails },
    /// Terminal rejection (bad credentials, rate limit, ...)
    Error { error: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthRedirect {
    #[serde(default)]
    pub mode: Option<String>,
    pub parameters: RedirectParameters,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedirectParameters {
    pub uri: String,
}

/// Multifactor challenge details surfaced to the caller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MultifactorDetails {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default, rename = "multiFactorCodeLength")]
    pub code_length: Option<u32>,
}

/// Entitlements exchange response
#[derive(Debug, Clone, Deserialize)]
pub struct EntitlementsResponse {
    pub entitlements_token: String,
}

/// OpenID userinfo response
#[derive(Debug, Clone, Deserialize)]
pub struct UserInfoResponse {
    /// Player UUID (puuid)
    pub sub: String,
    #[serde(default)]
    pub country: Option<String>,
    /// Shard affinity hints, e.g. {"pp": "eu", "live": "eu"}
    #[serde(default)]
    pub affinity: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    pub acct: Option<AccountClaims>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountClaims {
    #[serde(default)]
    pub game_name: Option<String>,
    #[serde(default)]
    pub tag_line: Option<String>,
}
