//! OAuth2 provider implementations
//!
//! - Google OAuth2 (OpenID Connect userinfo)
//! - GitHub OAuth2 (REST user API)
//!
//! Both wrap a shared `BaseOAuthProvider`.

pub mod base;
pub mod github;
pub mod google;

pub use base::BaseOAuthProvider;
pub use github::{GitHubProvider, GITHUB};
pub use google::{GoogleProvider, GOOGLE};
