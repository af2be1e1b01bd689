//! Error taxonomy for token resolution.
//!
//! Every failure a resolution path can produce is a [`GatewayError`]. The HTTP
//! layer collapses all of them into a single `401 Forbidden` response; the
//! variant and its detail are only ever logged.

use thiserror::Error;

/// Failure while turning an `Authorization` header into a profile.
///
/// An inactive token is *not* an error: the introspection endpoint answering
/// `{"active": false}` produces an inactive [`crate::profile::Profile`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Header absent, wrong scheme, or empty credential. No I/O happened.
    #[error("malformed credential: {reason}")]
    MalformedCredential {
        /// What was wrong with the header
        reason: &'static str,
    },

    /// Introspection call failed: network, timeout, non-2xx status, or a body
    /// that is not a usable introspection response.
    #[error("introspection failure: {reason}")]
    IntrospectionFailure {
        /// Human-readable detail (never contains the token or client secret)
        reason: String,
    },

    /// Signature did not verify, or the token names a key the issuer does not publish.
    #[error("invalid token signature")]
    InvalidSignature,

    /// `iss`, `aud`, `cid` or a required registered claim did not match.
    #[error("claim mismatch on '{claim}'")]
    ClaimMismatch {
        /// Name of the offending claim
        claim: String,
    },

    /// `exp` is in the past.
    #[error("token expired")]
    Expired,

    /// The `groups` claim is missing or does not contain the required group.
    #[error("token is missing required group '{group}'")]
    MissingRequiredGroup {
        /// The group that was required
        group: String,
    },

    /// Local verification cannot judge this token at all: not a JWT, no `kid`,
    /// or an algorithm outside the supported set.
    #[error("token is not locally verifiable: {reason}")]
    UnsupportedToken {
        /// Why the token was not verifiable
        reason: String,
    },

    /// The issuer's key set could not be fetched or parsed.
    #[error("signing key set unavailable: {reason}")]
    KeySetUnavailable {
        /// Fetch or parse failure detail
        reason: String,
    },
}

impl GatewayError {
    pub(crate) fn introspection(reason: impl Into<String>) -> Self {
        GatewayError::IntrospectionFailure {
            reason: reason.into(),
        }
    }

    /// Whether a remote introspection may be attempted after this local failure.
    ///
    /// Only failures where the local verifier could not reach a verdict qualify.
    /// Signature, claim, expiry and group rejections are final.
    #[must_use]
    pub fn allows_remote_fallback(&self) -> bool {
        matches!(
            self,
            GatewayError::UnsupportedToken { .. } | GatewayError::KeySetUnavailable { .. }
        )
    }

    /// Short stable label for structured logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::MalformedCredential { .. } => "malformed_credential",
            GatewayError::IntrospectionFailure { .. } => "introspection_failure",
            GatewayError::InvalidSignature => "invalid_signature",
            GatewayError::ClaimMismatch { .. } => "claim_mismatch",
            GatewayError::Expired => "expired",
            GatewayError::MissingRequiredGroup { .. } => "missing_required_group",
            GatewayError::UnsupportedToken { .. } => "unsupported_token",
            GatewayError::KeySetUnavailable { .. } => "key_set_unavailable",
        }
    }
}
