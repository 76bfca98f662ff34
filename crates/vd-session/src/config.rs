use std::time::Duration;

/// Name of the signed cookie referencing the live session
pub const SESSION_COOKIE: &str = "vd_session";

/// Name of the signed cookie holding the account registry
pub const ACCOUNTS_COOKIE: &str = "vd_accounts";

/// Prefix for per-account session reference cookies
pub const PER_ACCOUNT_COOKIE_PREFIX: &str = "vd_session_";

/// Hard ceiling on registered accounts; adding past it evicts the oldest
pub const MAX_ACCOUNTS: usize = 5;

/// How long sessions and their reference cookies live
pub const SESSION_MAX_AGE: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// How long the registry cookie lives
pub const REGISTRY_MAX_AGE: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Session age past which a silent refresh is attempted
pub const SOFT_REFRESH_THRESHOLD: Duration = Duration::from_secs(55 * 60);

/// Session age past which an unrefreshable session is discarded
pub const HARD_SESSION_THRESHOLD: Duration = Duration::from_secs(65 * 60);

/// Configuration for the session manager and account registry.
///
/// The two thresholds bracket the ~60 minute access-token lifetime: a
/// session older than the soft threshold gets a refresh attempt, one older
/// than the hard threshold that cannot be refreshed is dropped. The window
/// between them is a grace period where a stale session is still handed out.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub session_cookie: String,
    pub accounts_cookie: String,
    pub per_account_prefix: String,
    pub session_max_age: Duration,
    pub registry_max_age: Duration,
    pub soft_refresh_threshold: Duration,
    pub hard_session_threshold: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_cookie: SESSION_COOKIE.to_string(),
            accounts_cookie: ACCOUNTS_COOKIE.to_string(),
            per_account_prefix: PER_ACCOUNT_COOKIE_PREFIX.to_string(),
            session_max_age: SESSION_MAX_AGE,
            registry_max_age: REGISTRY_MAX_AGE,
            soft_refresh_threshold: SOFT_REFRESH_THRESHOLD,
            hard_session_threshold: HARD_SESSION_THRESHOLD,
        }
    }
}

impl SessionConfig {
    /// Cookie name for a stored-but-inactive account's session reference.
    ///
    /// Uses an 8-character puuid prefix; puuids are UUIDs, so prefixes do
    /// not collide in practice.
    pub fn per_account_cookie(&self, puuid: &str) -> String {
        let prefix: String = puuid.chars().take(8).collect();
        format!("{}{}", self.per_account_prefix, prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_account_cookie_uses_short_prefix() {
        let config = SessionConfig::default();
        assert_eq!(
            config.per_account_cookie("0f0e0d0c-0b0a-4123-8456-000000000000"),
            "vd_session_0f0e0d0c"
        );
    }

    #[test]
    fn per_account_cookie_tolerates_short_puuid() {
        let config = SessionConfig::default();
        assert_eq!(config.per_account_cookie("abc"), "vd_session_abc");
    }

    #[test]
    fn thresholds_bracket_the_token_lifetime() {
        let config = SessionConfig::default();
        assert!(config.soft_refresh_threshold < config.hard_session_threshold);
    }
}
