use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use vd_auth::{AuthTokens, Region};

use crate::config::MAX_ACCOUNTS;
use crate::data::SessionData;
use crate::envelope;
use crate::errors::{Result, SessionError};
use crate::jar::ClientJar;
use crate::manager::SessionManager;

/// One registered account's metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountEntry {
    pub puuid: String,
    pub region: Region,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_line: Option<String>,
    pub added_at: DateTime<Utc>,
}

/// Registry payload sealed into the accounts cookie.
///
/// `accounts` is ordered oldest-first; eviction always takes the head. A
/// missing `accounts` field fails decoding outright, while a missing active
/// pointer is a valid registry with nothing selected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountsData {
    pub accounts: Vec<AccountEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_puuid: Option<String>,
}

/// Cookie-backed registry of up to [`MAX_ACCOUNTS`] accounts, one of which
/// is active at a time.
///
/// The registry cookie is the source of truth for which accounts exist and
/// which is active; the session store is the source of truth for their
/// tokens. This type is the only writer of both in tandem, which is what
/// keeps them consistent. Each stored-but-inactive account keeps its own
/// signed reference cookie so its session survives switches.
pub struct AccountRegistry {
    manager: Arc<SessionManager>,
}

impl AccountRegistry {
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self { manager }
    }

    /// Decode the registry cookie. Absent, forged, or malformed all read as
    /// no registry.
    pub fn get_accounts(&self, jar: &ClientJar) -> Option<AccountsData> {
        let token = jar.get(&self.manager.config().accounts_cookie)?;
        envelope::open(self.manager.signing(), token)
    }

    /// The entry the active pointer references, if both exist.
    pub fn get_active_account(&self, jar: &ClientJar) -> Option<AccountEntry> {
        let data = self.get_accounts(jar)?;
        let active = data.active_puuid.as_deref().filter(|p| !p.is_empty())?;
        data.accounts.iter().find(|a| a.puuid == active).cloned()
    }

    /// Register the account these tokens belong to and make it the live
    /// active session.
    ///
    /// Re-adding a known puuid updates its mutable fields in place and keeps
    /// the original `added_at`. A full registry evicts its oldest entry,
    /// dropping that account's stored session along the way.
    #[instrument(skip(self, jar, tokens), fields(puuid = %tokens.puuid))]
    pub async fn add_account(
        &self,
        jar: &mut ClientJar,
        tokens: AuthTokens,
    ) -> Result<AccountEntry> {
        let mut data = self.get_accounts(jar).unwrap_or_default();

        let entry = AccountEntry {
            puuid: tokens.puuid.clone(),
            region: tokens.region,
            game_name: tokens.game_name.clone(),
            tag_line: tokens.tag_line.clone(),
            added_at: Utc::now(),
        };

        let mut evicted = None;
        if let Some(existing) = data.accounts.iter_mut().find(|a| a.puuid == entry.puuid) {
            debug!("Account already registered, updating entry in place");
            existing.region = entry.region;
            existing.game_name = entry.game_name.clone();
            existing.tag_line = entry.tag_line.clone();
        } else {
            if data.accounts.len() >= MAX_ACCOUNTS {
                let oldest = data.accounts.remove(0);
                warn!("Registry full, evicting oldest account {}", oldest.puuid);
                evicted = Some(oldest);
            }
            data.accounts.push(entry.clone());
        }

        data.active_puuid = Some(entry.puuid.clone());

        let session = self.manager.create_session(jar, tokens).await?;
        self.save_per_account(jar, &session).await?;
        self.persist(jar, &data)?;

        // The evicted account's session outlives a failed add: its artifacts
        // go only once the replacement is fully persisted.
        if let Some(evicted) = evicted {
            self.drop_account_artifacts(jar, &evicted.puuid).await;
        }
        Ok(entry)
    }

    /// Make a previously registered account the live active session.
    ///
    /// Whatever account is live right now gets snapshotted into its own
    /// per-account cookie first so it is not lost. Fails if the target is
    /// not registered or its stored session has expired away, in which case
    /// the target has to log in again.
    #[instrument(skip(self, jar))]
    pub async fn switch_account(
        &self,
        jar: &mut ClientJar,
        target_puuid: &str,
    ) -> Result<AccountEntry> {
        let mut data = self
            .get_accounts(jar)
            .ok_or_else(|| SessionError::UnknownAccount(target_puuid.to_string()))?;
        let target = data
            .accounts
            .iter()
            .find(|a| a.puuid == target_puuid)
            .cloned()
            .ok_or_else(|| SessionError::UnknownAccount(target_puuid.to_string()))?;

        if let Some(current) = self.manager.get_session(jar).await {
            if current.puuid != target_puuid {
                self.save_per_account(jar, &current).await?;
            }
        }

        let stored = self
            .load_per_account(jar, target_puuid)
            .await
            .ok_or_else(|| SessionError::AccountSessionMissing(target_puuid.to_string()))?;

        self.manager.activate(jar, stored).await?;
        data.active_puuid = Some(target_puuid.to_string());
        self.persist(jar, &data)?;
        Ok(target)
    }

    /// Drop an account and its stored session.
    ///
    /// Removing an unknown account is a warned no-op. Removing the active
    /// account promotes the oldest remaining entry, re-activating its stored
    /// session; if that session is gone too, the active pointer is cleared
    /// rather than failing. Removing the last account clears the live
    /// session and the registry cookie entirely.
    #[instrument(skip(self, jar))]
    pub async fn remove_account(&self, jar: &mut ClientJar, puuid: &str) -> Result<()> {
        let Some(mut data) = self.get_accounts(jar) else {
            warn!("No account registry, nothing to remove");
            return Ok(());
        };
        let Some(index) = data.accounts.iter().position(|a| a.puuid == puuid) else {
            warn!("Account is not registered, nothing to remove");
            return Ok(());
        };

        let was_active = data.active_puuid.as_deref() == Some(puuid);
        data.accounts.remove(index);
        self.drop_account_artifacts(jar, puuid).await;

        if was_active {
            self.manager.delete_session(jar).await;
        }

        if data.accounts.is_empty() {
            jar.remove(&self.manager.config().accounts_cookie);
            return Ok(());
        }

        if was_active {
            data.active_puuid = None;
            if let Some(next) = data.accounts.first().cloned() {
                match self.load_per_account(jar, &next.puuid).await {
                    Some(stored) => {
                        debug!("Promoting {} to active", next.puuid);
                        self.manager.activate(jar, stored).await?;
                        data.active_puuid = Some(next.puuid);
                    }
                    None => {
                        warn!(
                            "Promoted account {} has no stored session to activate",
                            next.puuid
                        );
                    }
                }
            }
        }

        self.persist(jar, &data)
    }

    /// Snapshot `session` under its account's own reference cookie so it
    /// survives switches away. Reuses the already-referenced store row when
    /// one exists.
    async fn save_per_account(&self, jar: &mut ClientJar, session: &SessionData) -> Result<()> {
        let cookie_name = self.manager.config().per_account_cookie(&session.puuid);

        let session_id = match jar
            .get(&cookie_name)
            .and_then(|token| self.manager.open_reference(token))
        {
            Some(existing) => {
                self.manager
                    .store()
                    .save(&existing, session, self.manager.session_ttl())
                    .await?;
                existing
            }
            None => self.manager.save_detached(session).await?,
        };

        let token = self.manager.seal_reference(&session_id)?;
        jar.set(&cookie_name, token, self.manager.config().session_max_age);
        Ok(())
    }

    async fn load_per_account(&self, jar: &ClientJar, puuid: &str) -> Option<SessionData> {
        let cookie_name = self.manager.config().per_account_cookie(puuid);
        let session_id = jar
            .get(&cookie_name)
            .and_then(|token| self.manager.open_reference(token))?;
        self.manager.store().get(&session_id).await
    }

    /// Remove an account's reference cookie and the store row behind it.
    async fn drop_account_artifacts(&self, jar: &mut ClientJar, puuid: &str) {
        let cookie_name = self.manager.config().per_account_cookie(puuid);
        if let Some(session_id) = jar
            .get(&cookie_name)
            .and_then(|token| self.manager.open_reference(token))
        {
            if let Err(e) = self.manager.store().delete(&session_id).await {
                warn!("Failed to delete stored session for {}: {}", puuid, e);
            }
        }
        jar.remove(&cookie_name);
    }

    fn persist(&self, jar: &mut ClientJar, data: &AccountsData) -> Result<()> {
        let config = self.manager.config();
        let token = envelope::seal(self.manager.signing(), data, config.registry_max_age)?;
        jar.set(&config.accounts_cookie, token, config.registry_max_age);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::crypto::SigningKey;
    use crate::store::{MemorySessionStore, SessionStore};

    struct NoReauth;

    #[async_trait::async_trait]
    impl vd_auth::Reauthenticate for NoReauth {
        async fn reauthenticate(&self, _cookies: &str) -> vd_auth::Result<AuthTokens> {
            Err(vd_auth::AuthError::SessionExpired)
        }
    }

    /// Delegates to a memory store until `fail_saves` is flipped.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemorySessionStore,
        fail_saves: std::sync::atomic::AtomicBool,
    }

    impl FlakyStore {
        fn fail_saves(&self) {
            self.fail_saves
                .store(true, std::sync::atomic::Ordering::SeqCst);
        }
    }

    #[async_trait::async_trait]
    impl SessionStore for FlakyStore {
        async fn save(
            &self,
            session_id: &str,
            data: &SessionData,
            max_age: chrono::Duration,
        ) -> crate::errors::Result<()> {
            if self.fail_saves.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(SessionError::LockTimeout);
            }
            self.inner.save(session_id, data, max_age).await
        }

        async fn get(&self, session_id: &str) -> Option<SessionData> {
            self.inner.get(session_id).await
        }

        async fn delete(&self, session_id: &str) -> crate::errors::Result<()> {
            self.inner.delete(session_id).await
        }

        async fn cleanup_expired(&self) -> crate::errors::Result<usize> {
            self.inner.cleanup_expired().await
        }
    }

    fn puuid(i: usize) -> String {
        format!("{:08}-0000-4000-8000-000000000000", i)
    }

    fn tokens_for(i: usize) -> AuthTokens {
        AuthTokens {
            access_token: format!("at-{}", i),
            id_token: "id".to_string(),
            entitlements_token: "ent".to_string(),
            puuid: puuid(i),
            region: Region::Eu,
            game_name: Some(format!("Player{}", i)),
            tag_line: Some("TAG".to_string()),
            country: None,
            cookies: Some(format!("ssid=s{}", i)),
        }
    }

    fn registry() -> (AccountRegistry, Arc<SessionManager>, Arc<MemorySessionStore>) {
        let store = Arc::new(MemorySessionStore::new());
        let manager = Arc::new(SessionManager::new(
            store.clone(),
            Arc::new(NoReauth),
            SigningKey::generate(),
            SessionConfig::default(),
        ));
        (AccountRegistry::new(manager.clone()), manager, store)
    }

    fn per_account_row_id(
        registry: &AccountRegistry,
        jar: &ClientJar,
        puuid: &str,
    ) -> Option<String> {
        let cookie_name = registry.manager.config().per_account_cookie(puuid);
        jar.get(&cookie_name)
            .and_then(|token| registry.manager.open_reference(token))
    }

    #[tokio::test]
    async fn add_account_registers_and_activates() {
        let (registry, manager, _) = registry();
        let mut jar = ClientJar::new();

        let entry = registry.add_account(&mut jar, tokens_for(1)).await.unwrap();
        assert_eq!(entry.puuid, puuid(1));

        let data = registry.get_accounts(&jar).unwrap();
        assert_eq!(data.accounts.len(), 1);
        assert_eq!(data.active_puuid.as_deref(), Some(puuid(1).as_str()));

        let active = registry.get_active_account(&jar).unwrap();
        assert_eq!(active.game_name.as_deref(), Some("Player1"));

        let live = manager.get_session(&jar).await.unwrap();
        assert_eq!(live.puuid, puuid(1));
        assert!(jar.get("vd_session_00000001").is_some());
    }

    #[tokio::test]
    async fn re_adding_updates_in_place_and_keeps_added_at() {
        let (registry, _, _) = registry();
        let mut jar = ClientJar::new();

        let first = registry.add_account(&mut jar, tokens_for(1)).await.unwrap();
        let original_added_at = registry.get_accounts(&jar).unwrap().accounts[0].added_at;

        let mut renamed = tokens_for(1);
        renamed.game_name = Some("Renamed".to_string());
        registry.add_account(&mut jar, renamed).await.unwrap();

        let data = registry.get_accounts(&jar).unwrap();
        assert_eq!(data.accounts.len(), 1);
        assert_eq!(data.accounts[0].game_name.as_deref(), Some("Renamed"));
        assert_eq!(data.accounts[0].added_at, original_added_at);
        assert_eq!(first.puuid, data.accounts[0].puuid);
    }

    #[tokio::test]
    async fn sixth_account_evicts_the_oldest() {
        let (registry, _, store) = registry();
        let mut jar = ClientJar::new();

        for i in 1..=5 {
            registry.add_account(&mut jar, tokens_for(i)).await.unwrap();
        }
        let evicted_row = per_account_row_id(&registry, &jar, &puuid(1)).unwrap();

        registry.add_account(&mut jar, tokens_for(6)).await.unwrap();

        let data = registry.get_accounts(&jar).unwrap();
        assert_eq!(data.accounts.len(), 5);
        assert!(!data.accounts.iter().any(|a| a.puuid == puuid(1)));
        assert_eq!(data.accounts[0].puuid, puuid(2));
        assert_eq!(data.active_puuid.as_deref(), Some(puuid(6).as_str()));

        assert!(store.get(&evicted_row).await.is_none());
        assert!(jar.get("vd_session_00000001").is_none());
    }

    #[tokio::test]
    async fn failed_add_at_capacity_keeps_the_oldest_account_alive() {
        let store = Arc::new(FlakyStore::default());
        let manager = Arc::new(SessionManager::new(
            store.clone(),
            Arc::new(NoReauth),
            SigningKey::generate(),
            SessionConfig::default(),
        ));
        let registry = AccountRegistry::new(manager.clone());
        let mut jar = ClientJar::new();

        for i in 1..=5 {
            registry.add_account(&mut jar, tokens_for(i)).await.unwrap();
        }
        let oldest_row = per_account_row_id(&registry, &jar, &puuid(1)).unwrap();

        store.fail_saves();
        registry
            .add_account(&mut jar, tokens_for(6))
            .await
            .unwrap_err();

        // Nothing was evicted: the registry still lists all five original
        // accounts and the oldest one's session is untouched
        let data = registry.get_accounts(&jar).unwrap();
        assert_eq!(data.accounts.len(), 5);
        assert!(data.accounts.iter().any(|a| a.puuid == puuid(1)));
        assert!(!data.accounts.iter().any(|a| a.puuid == puuid(6)));
        assert!(jar.get("vd_session_00000001").is_some());
        assert!(store.get(&oldest_row).await.is_some());
    }

    #[tokio::test]
    async fn switch_account_roundtrip_preserves_both_sessions() {
        let (registry, manager, _) = registry();
        let mut jar = ClientJar::new();
        registry.add_account(&mut jar, tokens_for(1)).await.unwrap();
        registry.add_account(&mut jar, tokens_for(2)).await.unwrap();

        let entry = registry.switch_account(&mut jar, &puuid(1)).await.unwrap();
        assert_eq!(entry.puuid, puuid(1));
        assert_eq!(
            registry.get_accounts(&jar).unwrap().active_puuid.as_deref(),
            Some(puuid(1).as_str())
        );

        let live = manager.get_session(&jar).await.unwrap();
        assert_eq!(live.access_token, "at-1");
        // Switch-back restarts the refresh clock
        assert!(live.age() < chrono::Duration::minutes(1));

        registry.switch_account(&mut jar, &puuid(2)).await.unwrap();
        let live = manager.get_session(&jar).await.unwrap();
        assert_eq!(live.access_token, "at-2");
    }

    #[tokio::test]
    async fn switch_to_unregistered_account_fails() {
        let (registry, _, _) = registry();
        let mut jar = ClientJar::new();
        registry.add_account(&mut jar, tokens_for(1)).await.unwrap();

        let err = registry
            .switch_account(&mut jar, &puuid(9))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::UnknownAccount(_)));
    }

    #[tokio::test]
    async fn switch_fails_when_stored_session_is_gone() {
        let (registry, _, store) = registry();
        let mut jar = ClientJar::new();
        registry.add_account(&mut jar, tokens_for(1)).await.unwrap();
        registry.add_account(&mut jar, tokens_for(2)).await.unwrap();

        let row = per_account_row_id(&registry, &jar, &puuid(1)).unwrap();
        store.delete(&row).await.unwrap();

        let err = registry
            .switch_account(&mut jar, &puuid(1))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::AccountSessionMissing(_)));
        assert_eq!(
            registry.get_accounts(&jar).unwrap().active_puuid.as_deref(),
            Some(puuid(2).as_str())
        );
    }

    #[tokio::test]
    async fn removing_inactive_account_leaves_active_alone() {
        let (registry, manager, store) = registry();
        let mut jar = ClientJar::new();
        registry.add_account(&mut jar, tokens_for(1)).await.unwrap();
        registry.add_account(&mut jar, tokens_for(2)).await.unwrap();

        let row = per_account_row_id(&registry, &jar, &puuid(1)).unwrap();
        registry.remove_account(&mut jar, &puuid(1)).await.unwrap();

        let data = registry.get_accounts(&jar).unwrap();
        assert_eq!(data.accounts.len(), 1);
        assert_eq!(data.active_puuid.as_deref(), Some(puuid(2).as_str()));
        assert_eq!(manager.get_session(&jar).await.unwrap().access_token, "at-2");
        assert!(store.get(&row).await.is_none());
        assert!(jar.get("vd_session_00000001").is_none());
    }

    #[tokio::test]
    async fn removing_active_account_promotes_oldest_remaining() {
        let (registry, manager, _) = registry();
        let mut jar = ClientJar::new();
        for i in 1..=3 {
            registry.add_account(&mut jar, tokens_for(i)).await.unwrap();
        }

        registry.remove_account(&mut jar, &puuid(3)).await.unwrap();

        let data = registry.get_accounts(&jar).unwrap();
        assert_eq!(data.accounts.len(), 2);
        assert_eq!(data.active_puuid.as_deref(), Some(puuid(1).as_str()));

        let live = manager.get_session(&jar).await.unwrap();
        assert_eq!(live.access_token, "at-1");
    }

    #[tokio::test]
    async fn removing_last_account_clears_everything() {
        let (registry, manager, store) = registry();
        let mut jar = ClientJar::new();
        registry.add_account(&mut jar, tokens_for(1)).await.unwrap();

        registry.remove_account(&mut jar, &puuid(1)).await.unwrap();

        assert!(registry.get_accounts(&jar).is_none());
        assert!(jar.get("vd_session").is_none());
        assert!(manager.get_session(&jar).await.is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn removing_unknown_account_is_a_noop() {
        let (registry, _, _) = registry();
        let mut jar = ClientJar::new();

        // No registry at all
        registry.remove_account(&mut jar, &puuid(9)).await.unwrap();

        registry.add_account(&mut jar, tokens_for(1)).await.unwrap();
        registry.remove_account(&mut jar, &puuid(9)).await.unwrap();
        assert_eq!(registry.get_accounts(&jar).unwrap().accounts.len(), 1);
    }

    #[tokio::test]
    async fn promotion_with_missing_session_clears_the_active_pointer() {
        let (registry, manager, store) = registry();
        let mut jar = ClientJar::new();
        registry.add_account(&mut jar, tokens_for(1)).await.unwrap();
        registry.add_account(&mut jar, tokens_for(2)).await.unwrap();

        let row = per_account_row_id(&registry, &jar, &puuid(1)).unwrap();
        store.delete(&row).await.unwrap();

        registry.remove_account(&mut jar, &puuid(2)).await.unwrap();

        let data = registry.get_accounts(&jar).unwrap();
        assert_eq!(data.accounts.len(), 1);
        assert!(data.active_puuid.is_none());
        assert!(registry.get_active_account(&jar).is_none());
        assert!(manager.get_session(&jar).await.is_none());
    }

    #[tokio::test]
    async fn forged_registry_cookie_reads_as_no_registry() {
        let (registry, _, _) = registry();
        let mut jar = ClientJar::new();

        let foreign = envelope::seal(
            &SigningKey::generate(),
            &AccountsData::default(),
            std::time::Duration::from_secs(60),
        )
        .unwrap();
        jar.set("vd_accounts", foreign, std::time::Duration::from_secs(60));
        assert!(registry.get_accounts(&jar).is_none());

        jar.set("vd_accounts", "garbage", std::time::Duration::from_secs(60));
        assert!(registry.get_accounts(&jar).is_none());
    }
}
