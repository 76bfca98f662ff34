//! Session lifecycle and multi-account management on top of [`vd_auth`].
//!
//! [`vd_auth`] turns credentials into tokens; this crate makes those tokens
//! durable and multiplexed. Clients hold only signed reference cookies, the
//! actual session records live server-side in a [`SessionStore`], encrypted
//! at rest when the file-backed store is used.
//!
//! The moving parts:
//!
//! - [`SessionManager`] issues reference cookies, resolves them back to
//!   session records, and silently re-authenticates sessions older than the
//!   soft threshold (55 min) before dropping unrefreshable ones at the hard
//!   threshold (65 min).
//! - [`AccountRegistry`] tracks up to five accounts per browser in a signed
//!   cookie, keeps one active, and preserves the others' sessions across
//!   switches through per-account reference cookies.
//! - [`KeyManager`] derives the signing and encryption keys from a single
//!   deployment secret with Argon2id, persisting only the salt.
//! - [`ClientJar`] carries request cookies in and `Set-Cookie` mutations
//!   out, so the whole crate stays independent of any HTTP framework.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use vd_auth::{LoginOutcome, RiotAuthClient, RiotAuthConfig};
//! use vd_session::{
//!     AccountRegistry, ClientJar, KeyMaterial, MemorySessionStore, SessionConfig,
//!     SessionManager,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let auth = Arc::new(RiotAuthClient::new(RiotAuthConfig::production())?);
//! let keys = KeyMaterial::generate();
//! let manager = Arc::new(SessionManager::new(
//!     Arc::new(MemorySessionStore::new()),
//!     auth.clone(),
//!     keys.signing().clone(),
//!     SessionConfig::default(),
//! ));
//! let registry = AccountRegistry::new(manager.clone());
//!
//! // Login request: register the account and set its cookies
//! let mut jar = ClientJar::new();
//! if let LoginOutcome::Authenticated(tokens) = auth.login("user", "pass").await? {
//!     registry.add_account(&mut jar, tokens).await?;
//! }
//!
//! // Any later request: resolve the session, refreshing it when stale
//! let mut jar = ClientJar::from_header("vd_session=...; vd_accounts=...");
//! if let Some(session) = manager.get_session_with_refresh(&mut jar).await {
//!     println!("{} is signed in", session.puuid);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod crypto;
pub mod data;
pub mod envelope;
pub mod errors;
pub mod file_store;
pub mod jar;
pub mod keys;
pub mod manager;
pub mod registry;
pub mod store;

pub use config::{
    ACCOUNTS_COOKIE, HARD_SESSION_THRESHOLD, MAX_ACCOUNTS, PER_ACCOUNT_COOKIE_PREFIX,
    REGISTRY_MAX_AGE, SESSION_COOKIE, SESSION_MAX_AGE, SOFT_REFRESH_THRESHOLD, SessionConfig,
};
pub use crypto::{EncryptedBlob, EncryptionKey, SigningKey};
pub use data::SessionData;
pub use errors::{Result, SessionError};
pub use file_store::FileSessionStore;
pub use jar::{ClientJar, CookieMutation};
pub use keys::{KeyManager, KeyMaterial, KeyMeta};
pub use manager::SessionManager;
pub use registry::{AccountEntry, AccountRegistry, AccountsData};
pub use store::{MemorySessionStore, SessionStore};
