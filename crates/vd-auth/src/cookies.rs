//! Cookie string handling for the Riot auth flows.
//!
//! Riot's auth HTTP layer identifies a login attempt purely by cookies, so
//! every step captures `Set-Cookie` headers and folds them into one
//! `name=value; name=value` string that the next request echoes back.

use std::collections::BTreeMap;

/// Parse a `Cookie`-header style string (`a=1; b=2`) into name/value pairs.
///
/// Fragments without `=` or with an empty name are skipped. A later
/// occurrence of a name overwrites an earlier one.
pub fn parse_cookie_string(cookies: &str) -> BTreeMap<String, String> {
    let mut pairs = BTreeMap::new();
    for fragment in cookies.split(';') {
        insert_pair(&mut pairs, fragment);
    }
    pairs
}

/// Merge `Set-Cookie` header values into an existing cookie string.
///
/// Only the leading `name=value` of each header is kept; attributes such as
/// `Path`, `Expires` or `HttpOnly` are dropped. New values win over existing
/// ones for the same name. The output is sorted by name, which makes the
/// merge idempotent: feeding the result back in with no new headers returns
/// the same string.
pub fn merge_cookies(existing: &str, set_cookie_headers: &[String]) -> String {
    let mut pairs = parse_cookie_string(existing);
    for header in set_cookie_headers {
        let leading = header.split(';').next().unwrap_or("");
        insert_pair(&mut pairs, leading);
    }
    pairs
        .into_iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("; ")
}

fn insert_pair(pairs: &mut BTreeMap<String, String>, fragment: &str) {
    if let Some((name, value)) = fragment.split_once('=') {
        let name = name.trim();
        if !name.is_empty() {
            pairs.insert(name.to_string(), value.trim().to_string());
        }
    }
}

/// Collect every `Set-Cookie` value from a response, splitting headers that
/// arrive with several cookies folded into one comma-joined value.
///
/// Returns an empty list when the response carries no usable cookie headers.
pub fn capture_set_cookies(response: &reqwest::Response) -> Vec<String> {
    let mut cookies = Vec::new();
    for value in response.headers().get_all(reqwest::header::SET_COOKIE) {
        if let Ok(raw) = value.to_str() {
            cookies.extend(split_combined_set_cookie(raw));
        }
    }
    cookies
}

/// Split a comma-joined `Set-Cookie` value into individual cookies.
///
/// A comma only separates cookies when what follows looks like a new
/// `name=` pair. Commas inside `Expires` dates ("Thu, 01 Jan 1970 ...")
/// never match that shape, so they stay attached to their cookie.
pub fn split_combined_set_cookie(value: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut start = 0;
    for (idx, byte) in value.bytes().enumerate() {
        if byte == b',' && looks_like_cookie_start(&value[idx + 1..]) {
            push_trimmed(&mut parts, &value[start..idx]);
            start = idx + 1;
        }
    }
    push_trimmed(&mut parts, &value[start..]);
    parts
}

fn looks_like_cookie_start(rest: &str) -> bool {
    let rest = rest.trim_start();
    let Some(eq) = rest.find('=') else {
        return false;
    };
    let name = &rest[..eq];
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

fn push_trimmed(parts: &mut Vec<String>, piece: &str) {
    let piece = piece.trim();
    if !piece.is_empty() {
        parts.push(piece.to_string());
    }
}

/// The four cookies Riot's auth server actually keys a session on.
///
/// `ssid` is the long-lived "remember me" cookie that cookie re-auth depends
/// on; the other three identify the client and session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RiotCookies {
    pub ssid: Option<String>,
    pub clid: Option<String>,
    pub csid: Option<String>,
    pub tdid: Option<String>,
    /// The unparsed input, for callers that still need the full set
    pub raw: String,
}

impl RiotCookies {
    /// Pick the named auth cookies out of a merged cookie string.
    pub fn parse(cookies: &str) -> Self {
        let mut pairs = parse_cookie_string(cookies);
        Self {
            ssid: pairs.remove("ssid"),
            clid: pairs.remove("clid"),
            csid: pairs.remove("csid"),
            tdid: pairs.remove("tdid"),
            raw: cookies.to_string(),
        }
    }

    pub fn has_ssid(&self) -> bool {
        self.ssid.as_deref().is_some_and(|v| !v.is_empty())
    }

    /// Serialize the present cookies back into header form, in a fixed
    /// ssid, clid, csid, tdid order.
    pub fn essential_string(&self) -> String {
        let named = [
            ("ssid", &self.ssid),
            ("clid", &self.clid),
            ("csid", &self.csid),
            ("tdid", &self.tdid),
        ];
        named
            .iter()
            .filter_map(|(name, value)| {
                value.as_deref().map(|value| format!("{name}={value}"))
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_into_empty_string() {
        let merged = merge_cookies("", &["asid=abc; Path=/; HttpOnly".to_string()]);
        assert_eq!(merged, "asid=abc");
    }

    #[test]
    fn merge_strips_attributes_and_overwrites() {
        let merged = merge_cookies(
            "asid=old; tdid=t1",
            &[
                "asid=new; Path=/; Secure; HttpOnly; SameSite=None".to_string(),
                "ssid=s1; Max-Age=2592000".to_string(),
            ],
        );
        assert_eq!(merged, "asid=new; ssid=s1; tdid=t1");
    }

    #[test]
    fn merge_is_idempotent() {
        let first = merge_cookies("b=2; a=1", &["c=3; Path=/".to_string()]);
        let second = merge_cookies(&first, &[]);
        assert_eq!(first, second);
    }

    #[test]
    fn merge_skips_malformed_fragments() {
        let merged = merge_cookies("novalue; =orphan; ok=1", &["junk".to_string()]);
        assert_eq!(merged, "ok=1");
    }

    #[test]
    fn cookie_value_may_contain_equals() {
        let pairs = parse_cookie_string("token=a=b=c; plain=x");
        assert_eq!(pairs.get("token").map(String::as_str), Some("a=b=c"));
        assert_eq!(pairs.get("plain").map(String::as_str), Some("x"));
    }

    #[test]
    fn split_combined_header_on_new_pairs() {
        let parts =
            split_combined_set_cookie("asid=abc; Path=/, ssid=def; HttpOnly, tdid=ghi");
        assert_eq!(
            parts,
            vec![
                "asid=abc; Path=/".to_string(),
                "ssid=def; HttpOnly".to_string(),
                "tdid=ghi".to_string(),
            ]
        );
    }

    #[test]
    fn split_preserves_expires_dates() {
        let parts = split_combined_set_cookie(
            "ssid=abc; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Path=/, clid=ue1",
        );
        assert_eq!(
            parts,
            vec![
                "ssid=abc; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Path=/".to_string(),
                "clid=ue1".to_string(),
            ]
        );
    }

    #[test]
    fn named_cookies_round_trip() {
        let merged = merge_cookies(
            "ssid=s; clid=c; csid=x; tdid=t; sub=ignored",
            &[],
        );
        let named = RiotCookies::parse(&merged);
        assert_eq!(named.ssid.as_deref(), Some("s"));
        assert_eq!(named.tdid.as_deref(), Some("t"));
        assert_eq!(named.raw, merged);
        assert_eq!(named.essential_string(), "ssid=s; clid=c; csid=x; tdid=t");
    }

    #[test]
    fn named_cookies_absent_fields_are_none() {
        let named = RiotCookies::parse("sub=abc; other=1");
        assert!(!named.has_ssid());
        assert!(named.clid.is_none());
        assert_eq!(named.essential_string(), "");
    }

    #[test]
    fn essential_string_skips_missing_names() {
        let named = RiotCookies::parse("tdid=t; ssid=s");
        assert_eq!(named.essential_string(), "ssid=s; tdid=t");
    }
}
