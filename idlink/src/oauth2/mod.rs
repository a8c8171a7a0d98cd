//! OAuth2 authorization-code + PKCE client side
//!
//! The browser obtains the authorization code and PKCE verifier; this module
//! turns them into tokens and a normalized identity:
//! - [`IdentityProvider`]: adapter contract, one implementation per provider
//! - [`ProviderManager`]: name-keyed registry with `verify_user`
//! - [`providers`]: Google and GitHub adapters
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use idlink::oauth2::{ProviderConfig, ProviderManager, ProvidersConfig, TokenLifetimes};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ProvidersConfig {
//!     google: Some(ProviderConfig::new(
//!         std::env::var("GOOGLE_CLIENT_ID")?,
//!         std::env::var("GOOGLE_CLIENT_SECRET")?,
//!     )),
//!     github: None,
//! };
//!
//! let http = reqwest::Client::new();
//! let manager = ProviderManager::from_config(&config, &http, TokenLifetimes::default())?;
//! let (tokens, identity) = manager
//!     .verify_user("google", "auth-code", "pkce-verifier", "https://app.example.com/callback")
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod http;
pub mod manager;
pub mod provider;
pub mod providers;
pub mod types;

pub use manager::ProviderManager;
pub use provider::IdentityProvider;
pub use types::{
    ExternalIdentity, OAuthError, ProviderConfig, ProvidersConfig, TokenLifetimes, TokenSet,
};
