use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vd_auth::{AuthTokens, Region, RiotCookies};

/// The durable unit of a signed-in account.
///
/// One of these exists per account per browser identity; `created_at` is
/// the refresh clock and jumps to "now" every time the tokens are replaced
/// (initial login, silent re-auth, account switch-back).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionData {
    pub access_token: String,
    pub entitlements_token: String,
    pub puuid: String,
    pub region: Region,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_line: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// Only the four essential upstream cookies, never the full jar
    #[serde(skip_serializing_if = "Option::is_none")]
    pub riot_cookies: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SessionData {
    /// Fold a completed handshake into a durable session.
    ///
    /// The captured upstream cookie string is cut down to the essential
    /// four names here; an empty result is stored as absent.
    pub fn from_tokens(tokens: AuthTokens) -> Self {
        let riot_cookies = tokens
            .cookies
            .as_deref()
            .map(RiotCookies::parse)
            .map(|named| named.essential_string())
            .filter(|essential| !essential.is_empty());

        Self {
            access_token: tokens.access_token,
            entitlements_token: tokens.entitlements_token,
            puuid: tokens.puuid,
            region: tokens.region,
            id_token: Some(tokens.id_token),
            game_name: tokens.game_name,
            tag_line: tokens.tag_line,
            country: tokens.country,
            riot_cookies,
            created_at: Utc::now(),
        }
    }

    /// Age against the refresh clock
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(cookies: Option<&str>) -> AuthTokens {
        AuthTokens {
            access_token: "at".to_string(),
            id_token: "idt".to_string(),
            entitlements_token: "ent".to_string(),
            puuid: "puuid-1".to_string(),
            region: Region::Eu,
            game_name: Some("Player".to_string()),
            tag_line: Some("EUW".to_string()),
            country: Some("DE".to_string()),
            cookies: cookies.map(str::to_string),
        }
    }

    #[test]
    fn from_tokens_filters_to_essential_cookies() {
        let data = SessionData::from_tokens(tokens(Some(
            "ssid=s; clid=c; sub=ignored; asid=also-ignored",
        )));
        assert_eq!(data.riot_cookies.as_deref(), Some("ssid=s; clid=c"));
        assert_eq!(data.puuid, "puuid-1");
        assert_eq!(data.id_token.as_deref(), Some("idt"));
    }

    #[test]
    fn from_tokens_without_cookies_stores_none() {
        let data = SessionData::from_tokens(tokens(None));
        assert!(data.riot_cookies.is_none());
    }

    #[test]
    fn from_tokens_with_no_essential_cookies_stores_none() {
        let data = SessionData::from_tokens(tokens(Some("sub=abc; asid=xyz")));
        assert!(data.riot_cookies.is_none());
    }

    #[test]
    fn created_at_is_fresh() {
        let data = SessionData::from_tokens(tokens(None));
        assert!(data.age() < chrono::Duration::seconds(5));
    }
}
