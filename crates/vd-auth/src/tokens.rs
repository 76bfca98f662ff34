use serde::{Deserialize, Serialize};
use url::Url;

use crate::region::Region;

/// Access and identity tokens lifted from a redirect URI fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedTokens {
    pub access_token: String,
    pub id_token: String,
}

/// Parse the fragment of a redirect URI as a query string and pull out the
/// token pair.
///
/// Returns `None` for anything short of a well-formed URI whose fragment
/// carries a non-empty `access_token` and `id_token`. Never panics.
pub fn extract_tokens_from_uri(uri: &str) -> Option<ExtractedTokens> {
    let url = Url::parse(uri).ok()?;
    let fragment = url.fragment()?;

    let mut access_token = None;
    let mut id_token = None;
    for (name, value) in url::form_urlencoded::parse(fragment.as_bytes()) {
        match name.as_ref() {
            "access_token" => access_token = Some(value.into_owned()),
            "id_token" => id_token = Some(value.into_owned()),
            _ => {}
        }
    }

    match (access_token, id_token) {
        (Some(access_token), Some(id_token))
            if !access_token.is_empty() && !id_token.is_empty() =>
        {
            Some(ExtractedTokens {
                access_token,
                id_token,
            })
        }
        _ => None,
    }
}

/// Everything a completed handshake yields.
///
/// Transient by design: callers fold this into a durable session record
/// rather than persisting it as-is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthTokens {
    pub access_token: String,
    pub id_token: String,
    pub entitlements_token: String,
    pub puuid: String,
    pub region: Region,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_line: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// Merged upstream cookie string captured during the handshake, when the
    /// entry path produced one (credential login and cookie re-auth do,
    /// paste-redirect-URL does not)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookies: Option<String>,
}
