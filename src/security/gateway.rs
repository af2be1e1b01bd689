//! The token validation gateway and the two-stage request pipeline.
//!
//! [`validate_request`] is what the HTTP layer calls: the [`RequestGate`]
//! first, then [`TokenValidationGateway::introspect`]. The gateway owns the
//! [`ProfileCache`] and is the only writer to it.

use crate::error::GatewayError;
use crate::otel::redact_token;
use crate::profile::Profile;
use crate::security::cache::ProfileCache;
use crate::security::credentials::{extract_bearer, RequestGate};
use crate::security::ProfileResolver;
use std::time::Instant;
use tracing::{debug, info, warn};

/// How a cache miss is resolved.
///
/// Paths run one after another, never raced.
pub enum ResolutionStrategy {
    /// Remote introspection only
    Remote(Box<dyn ProfileResolver>),
    /// Local JWT verification only
    Local(Box<dyn ProfileResolver>),
    /// Local verification, with remote introspection for tokens the local
    /// verifier cannot judge (see [`GatewayError::allows_remote_fallback`])
    LocalThenRemote {
        local: Box<dyn ProfileResolver>,
        remote: Box<dyn ProfileResolver>,
    },
}

impl ResolutionStrategy {
    fn resolve(&self, credential: &str) -> Result<Profile, GatewayError> {
        match self {
            ResolutionStrategy::Remote(remote) => remote.resolve(credential),
            ResolutionStrategy::Local(local) => local.resolve(credential),
            ResolutionStrategy::LocalThenRemote { local, remote } => {
                match local.resolve(credential) {
                    Err(e) if e.allows_remote_fallback() => {
                        debug!(
                            token = %redact_token(credential),
                            reason = %e,
                            "falling back to {}",
                            remote.name()
                        );
                        remote.resolve(credential)
                    }
                    other => other,
                }
            }
        }
    }

    /// Configuration name of the strategy
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ResolutionStrategy::Remote(_) => "remote",
            ResolutionStrategy::Local(_) => "local",
            ResolutionStrategy::LocalThenRemote { .. } => "local_then_remote",
        }
    }
}

/// Resolves `Authorization` headers to profiles, consulting the cache first.
pub struct TokenValidationGateway {
    cache: ProfileCache,
    strategy: ResolutionStrategy,
}

impl TokenValidationGateway {
    #[must_use]
    pub fn new(strategy: ResolutionStrategy, cache: ProfileCache) -> Self {
        Self { cache, strategy }
    }

    /// Resolve an `Authorization` header value to a profile.
    ///
    /// 1. Extract the bearer credential (no I/O on failure)
    /// 2. Return a live cached profile without touching the network
    /// 3. Otherwise resolve through the strategy
    /// 4. Cache the profile under the credential if it is active
    ///
    /// An inactive profile is returned as-is and never cached.
    ///
    /// # Errors
    ///
    /// Any [`GatewayError`] from extraction or resolution. Failures are never
    /// turned into an inactive profile.
    pub fn introspect(&self, authorization: Option<&str>) -> Result<Profile, GatewayError> {
        let credential = extract_bearer(authorization)?;

        if let Some(profile) = self.cache.get(credential) {
            debug!(token = %redact_token(credential), "profile cache hit");
            return Ok(profile);
        }

        let started = Instant::now();
        let profile = self.strategy.resolve(credential)?;
        if profile.active {
            self.cache.set(credential, profile.clone());
        }
        debug!(
            token = %redact_token(credential),
            strategy = self.strategy.name(),
            active = profile.active,
            latency_ms = started.elapsed().as_millis() as u64,
            "token resolved"
        );
        Ok(profile)
    }

    /// The gateway's profile cache
    #[must_use]
    pub fn cache(&self) -> &ProfileCache {
        &self.cache
    }

    #[must_use]
    pub fn strategy(&self) -> &ResolutionStrategy {
        &self.strategy
    }
}

/// Result of running a request through the gate and the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// Active token; carries the profile to forward downstream
    Valid(Profile),
    /// The provider answered and the token is not active
    Invalid,
    /// Rejected by the gate or resolution failed
    Forbidden,
}

/// Gate, then gateway.
///
/// A header the gate does not admit never reaches the gateway.
pub fn validate_request(
    gate: &RequestGate,
    gateway: &TokenValidationGateway,
    authorization: Option<&str>,
) -> ValidationOutcome {
    if !gate.admits(authorization) {
        debug!("authorization header rejected by request gate");
        return ValidationOutcome::Forbidden;
    }

    match gateway.introspect(authorization) {
        Ok(profile) if profile.active => ValidationOutcome::Valid(profile),
        Ok(_) => {
            info!("token inactive");
            ValidationOutcome::Invalid
        }
        Err(e) => {
            warn!(kind = e.kind(), error = %e, "token resolution failed");
            ValidationOutcome::Forbidden
        }
    }
}
