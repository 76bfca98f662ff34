use std::collections::BTreeMap;
use std::time::Duration;

use vd_auth::parse_cookie_string;

/// Request-scoped cookie view plus the mutations to send back.
///
/// The session layer is framework-agnostic: an HTTP handler builds a jar
/// from the request's `Cookie` header, passes it through the manager and
/// registry, then applies [`ClientJar::set_cookie_headers`] to the response.
/// Reads observe writes made earlier in the same request.
#[derive(Debug, Clone, Default)]
pub struct ClientJar {
    cookies: BTreeMap<String, String>,
    mutations: Vec<CookieMutation>,
}

/// One pending `Set-Cookie` to emit; `max_age_secs == 0` means removal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieMutation {
    pub name: String,
    pub value: String,
    pub max_age_secs: i64,
}

impl ClientJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a request `Cookie` header (`a=1; b=2`) into a jar.
    pub fn from_header(header: &str) -> Self {
        Self {
            cookies: parse_cookie_string(header),
            mutations: Vec::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Set a cookie for the client, visible to later reads in this request.
    pub fn set(&mut self, name: &str, value: impl Into<String>, max_age: Duration) {
        let value = value.into();
        self.cookies.insert(name.to_string(), value.clone());
        self.mutations.push(CookieMutation {
            name: name.to_string(),
            value,
            max_age_secs: max_age.as_secs() as i64,
        });
    }

    /// Remove a cookie on the client and from this request's view.
    pub fn remove(&mut self, name: &str) {
        self.cookies.remove(name);
        self.mutations.push(CookieMutation {
            name: name.to_string(),
            value: String::new(),
            max_age_secs: 0,
        });
    }

    /// Mutations recorded so far, in application order. Browsers apply the
    /// last write for a name, so duplicates are harmless.
    pub fn mutations(&self) -> &[CookieMutation] {
        &self.mutations
    }

    /// Render the pending mutations as `Set-Cookie` header values.
    ///
    /// All cookies are HttpOnly, Secure, SameSite=Lax on the root path;
    /// removals carry `Max-Age=0` and an empty value.
    pub fn set_cookie_headers(&self) -> Vec<String> {
        self.mutations
            .iter()
            .map(|m| {
                if m.max_age_secs <= 0 {
                    format!(
                        "{}=; Max-Age=0; Path=/; HttpOnly; Secure; SameSite=Lax",
                        m.name
                    )
                } else {
                    format!(
                        "{}={}; Max-Age={}; Path=/; HttpOnly; Secure; SameSite=Lax",
                        m.name, m.value, m.max_age_secs
                    )
                }
            })
            .collect()
    }
}
