//! # Security Module
//!
//! Bearer-token validation for tokengate.
//!
//! ## Overview
//!
//! A request's `Authorization` header goes through two stages:
//!
//! 1. The [`RequestGate`] rejects anything that does not look like
//!    `Bearer <100-1000 token characters>`
//! 2. The [`TokenValidationGateway`] extracts the credential, consults the
//!    [`ProfileCache`], and on a miss resolves it with a [`ProfileResolver`]
//!
//! Two resolvers are provided:
//! - [`RemoteIntrospector`] - RFC 7662 introspection at the identity provider
//! - [`LocalVerifier`] - JWT signature and claim verification against the
//!   issuer's published key set
//!
//! [`ResolutionStrategy`] decides which of them run, and in which order.
//!
//! ## Example
//!
//! ```rust,no_run
//! use secrecy::SecretString;
//! use tokengate::security::{
//!     validate_request, ProfileCache, RemoteIntrospector, RequestGate, ResolutionStrategy,
//!     TokenValidationGateway, ValidationOutcome,
//! };
//!
//! let remote = RemoteIntrospector::new(
//!     "https://dev.okta.com/oauth2/default/v1/introspect",
//!     "client-id",
//!     SecretString::from("client-secret".to_string()),
//! );
//! let gateway = TokenValidationGateway::new(
//!     ResolutionStrategy::Remote(Box::new(remote)),
//!     ProfileCache::default(),
//! );
//!
//! match validate_request(&RequestGate, &gateway, Some("Bearer eyJ...")) {
//!     ValidationOutcome::Valid(profile) => println!("hello {:?}", profile.subject),
//!     ValidationOutcome::Invalid => println!("inactive"),
//!     ValidationOutcome::Forbidden => println!("rejected"),
//! }
//! ```

use crate::error::GatewayError;
use crate::profile::Profile;
use std::sync::Arc;

/// A way of turning a bearer credential into a [`Profile`].
///
/// Implementations never touch the gateway's cache.
pub trait ProfileResolver: Send + Sync {
    /// Resolve the raw credential (without the `Bearer ` prefix).
    ///
    /// # Returns
    ///
    /// * `Ok(profile)` - the provider's verdict; may be inactive
    /// * `Err(_)` - no verdict could be reached
    fn resolve(&self, credential: &str) -> Result<Profile, GatewayError>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

impl<T: ProfileResolver + ?Sized> ProfileResolver for Arc<T> {
    fn resolve(&self, credential: &str) -> Result<Profile, GatewayError> {
        (**self).resolve(credential)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

pub use cache::{CacheStats, ProfileCache, DEFAULT_MAX_ENTRIES, DEFAULT_TTL};
pub use credentials::{extract_bearer, RequestGate, BEARER_SCHEME};
pub use gateway::{validate_request, ResolutionStrategy, TokenValidationGateway, ValidationOutcome};
pub use introspection::RemoteIntrospector;
pub use local_verifier::LocalVerifier;

mod cache;
mod credentials;
mod gateway;
pub mod introspection;
pub mod local_verifier;
