use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument, warn};
use vd_auth::{AuthTokens, Reauthenticate};

use crate::config::SessionConfig;
use crate::crypto::SigningKey;
use crate::data::SessionData;
use crate::envelope;
use crate::errors::Result;
use crate::jar::ClientJar;
use crate::store::SessionStore;

/// Payload sealed into a session reference cookie. The client only ever
/// holds this indirection; session contents stay server-side.
#[derive(Debug, Serialize, Deserialize)]
struct SessionRef {
    session_id: String,
}

/// Issues signed reference cookies pointing at [`SessionStore`] rows and
/// decides when a session needs a silent refresh.
///
/// The refresh policy brackets the ~60 minute access-token lifetime with two
/// thresholds: past the soft one (55 min) a refresh is attempted via the
/// stored long-lived cookies; past the hard one (65 min) a session that
/// could not be refreshed is dropped. In between, the stale session is still
/// handed out, since downstream APIs may well accept the token for a little
/// longer than this subsystem can prove.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    reauth: Arc<dyn Reauthenticate>,
    signing: SigningKey,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn SessionStore>,
        reauth: Arc<dyn Reauthenticate>,
        signing: SigningKey,
        config: SessionConfig,
    ) -> Self {
        Self {
            store,
            reauth,
            signing,
            config,
        }
    }

    /// Fold handshake tokens into a session record and install it as the
    /// live session.
    #[instrument(skip(self, jar, tokens))]
    pub async fn create_session(
        &self,
        jar: &mut ClientJar,
        tokens: AuthTokens,
    ) -> Result<SessionData> {
        debug!("Creating session");
        self.activate(jar, SessionData::from_tokens(tokens)).await
    }

    /// Install `data` as the live session under a fresh id, restarting the
    /// refresh clock.
    pub(crate) async fn activate(
        &self,
        jar: &mut ClientJar,
        mut data: SessionData,
    ) -> Result<SessionData> {
        data.created_at = Utc::now();
        let session_id = new_session_id();
        self.store
            .save(&session_id, &data, self.session_ttl())
            .await?;

        let token = self.seal_reference(&session_id)?;
        jar.set(
            &self.config.session_cookie,
            token,
            self.config.session_max_age,
        );
        Ok(data)
    }

    /// Resolve the live session, or `None` if the cookie is absent, forged,
    /// expired, or points at a missing store row. Never fails loudly.
    pub async fn get_session(&self, jar: &ClientJar) -> Option<SessionData> {
        let session_id = self.resolve(jar)?;
        self.store.get(&session_id).await
    }

    pub async fn has_valid_session(&self, jar: &ClientJar) -> bool {
        self.get_session(jar).await.is_some()
    }

    /// Delete the store row (best effort) and clear the reference cookie
    /// regardless of whether that deletion succeeded.
    pub async fn delete_session(&self, jar: &mut ClientJar) {
        if let Some(session_id) = self.resolve(jar) {
            if let Err(e) = self.store.delete(&session_id).await {
                warn!("Failed to delete session row: {}", e);
            }
        }
        jar.remove(&self.config.session_cookie);
    }

    /// Resolve the live session, transparently refreshing it when stale.
    ///
    /// Sessions at or under the soft threshold come back unchanged with no
    /// network call. Older ones get a silent re-auth attempt; on success the
    /// fresh data is persisted under the same session id, so the reference
    /// cookie the client already holds keeps working. When no refresh is
    /// possible, the stale session is still returned inside the grace window
    /// and dropped past the hard threshold.
    #[instrument(skip(self, jar))]
    pub async fn get_session_with_refresh(&self, jar: &mut ClientJar) -> Option<SessionData> {
        let session_id = self.resolve(jar)?;
        let data = self.store.get(&session_id).await?;

        // Clock skew can make the age negative; treat that as fresh
        let age = data.age().to_std().unwrap_or_default();
        if age <= self.config.soft_refresh_threshold {
            return Some(data);
        }

        let Some(cookies) = data.riot_cookies.clone().filter(|c| !c.is_empty()) else {
            debug!("Session is stale but has no stored cookies to refresh with");
            return self.grace_or_delete(jar, &session_id, data).await;
        };

        debug!("Session past soft threshold, attempting silent refresh");
        match self.reauth.reauthenticate(&cookies).await {
            Ok(tokens) => {
                let fresh = SessionData::from_tokens(tokens);
                if let Err(e) = self
                    .store
                    .save(&session_id, &fresh, self.session_ttl())
                    .await
                {
                    // The refreshed tokens are still good for this request
                    error!("Failed to persist refreshed session: {}", e);
                }
                Some(fresh)
            }
            Err(e) => {
                debug!("Silent refresh failed: {}", e);
                self.grace_or_delete(jar, &session_id, data).await
            }
        }
    }

    /// Grace window between the two thresholds: hand the stale session back
    /// as-is. Past the hard cutoff, drop it instead.
    async fn grace_or_delete(
        &self,
        jar: &mut ClientJar,
        session_id: &str,
        data: SessionData,
    ) -> Option<SessionData> {
        let age = data.age().to_std().unwrap_or_default();
        if age <= self.config.hard_session_threshold {
            return Some(data);
        }

        debug!("Session past hard threshold, dropping it");
        if let Err(e) = self.store.delete(session_id).await {
            warn!("Failed to delete expired session: {}", e);
        }
        jar.remove(&self.config.session_cookie);
        None
    }

    fn resolve(&self, jar: &ClientJar) -> Option<String> {
        let token = jar.get(&self.config.session_cookie)?;
        self.open_reference(token)
    }

    pub(crate) fn seal_reference(&self, session_id: &str) -> Result<String> {
        envelope::seal(
            &self.signing,
            &SessionRef {
                session_id: session_id.to_string(),
            },
            self.config.session_max_age,
        )
    }

    pub(crate) fn open_reference(&self, token: &str) -> Option<String> {
        let reference: SessionRef = envelope::open(&self.signing, token)?;
        Some(reference.session_id)
    }

    /// Persist `data` under a fresh id without touching the live cookie.
    pub(crate) async fn save_detached(&self, data: &SessionData) -> Result<String> {
        let session_id = new_session_id();
        self.store.save(&session_id, data, self.session_ttl()).await?;
        Ok(session_id)
    }

    pub(crate) fn store(&self) -> &dyn SessionStore {
        self.store.as_ref()
    }

    pub(crate) fn signing(&self) -> &SigningKey {
        &self.signing
    }

    pub(crate) fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub(crate) fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.config.session_max_age)
            .unwrap_or_else(|_| chrono::Duration::days(30))
    }
}

/// Opaque random id for a store row. Never derived from the puuid, so the
/// reference cookie carries nothing sensitive.
fn new_session_id() -> String {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
