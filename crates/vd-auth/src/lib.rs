//! Riot account authentication for Valorant web tooling
//!
//! This crate drives the unofficial Riot authorization flow the Valorant
//! web client uses, yielding the token set downstream game-data APIs expect.
//!
//! # Authentication Flow
//!
//! A full credential login walks through these steps:
//!
//! 1. Authorization session init (captures upstream cookies)
//! 2. Credential submission, optionally followed by a multifactor code
//! 3. Token extraction from the redirect URI fragment
//! 4. Entitlements token exchange
//! 5. Userinfo lookup and region resolution
//!
//! Alternate entry paths reach the same pipeline: pasting a redirect URL
//! (skips steps 1-2) and silent re-auth from a stored cookie string
//! (see [`RiotAuthClient::reauthenticate`]).
//!
//! # Example
//!
//! ```no_run
//! use vd_auth::{LoginOutcome, RiotAuthClient, RiotAuthConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RiotAuthClient::new(RiotAuthConfig::default())?;
//!
//!     match client.login("username", "password").await? {
//!         LoginOutcome::Authenticated(tokens) => {
//!             println!("Logged in as {} on {}", tokens.puuid, tokens.region);
//!         }
//!         LoginOutcome::MultifactorRequired(challenge) => {
//!             // Show the MFA form, then echo the challenge cookies back:
//!             let _outcome = client.submit_mfa("123456", &challenge.cookies).await?;
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Important Notes
//!
//! - The upstream API is undocumented; response shapes are the best-known
//!   contract and are validated defensively, not assumed stable
//! - Tokens and cookie strings are credentials and must never be logged
//! - The merged cookie string returned on success is what later feeds
//!   silent re-auth; persist it server-side only

pub mod client;
pub mod config;
pub mod cookies;
pub mod errors;
pub mod models;
pub mod region;
pub mod tokens;

// Re-export main types
pub use client::{LoginOutcome, MfaChallenge, Reauthenticate, RiotAuthClient};
pub use config::{HttpTimeouts, RetryPolicy, RiotAuthConfig};
pub use cookies::{RiotCookies, capture_set_cookies, merge_cookies, parse_cookie_string};
pub use errors::{AuthError, Result};
pub use models::{MultifactorDetails, UserInfoResponse};
pub use region::{Region, determine_region};
pub use tokens::{AuthTokens, ExtractedTokens, extract_tokens_from_uri};
