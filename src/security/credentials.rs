//! Bearer credential extraction and the cheap syntactic request gate.
//!
//! Both run before any cache or network work. The gate is a sanity filter
//! on the raw header; the extractor is the strict parser the gateway uses.

use crate::error::GatewayError;
use once_cell::sync::Lazy;
use regex::Regex;

/// Authentication scheme accepted by the gateway (case-sensitive)
pub const BEARER_SCHEME: &str = "Bearer";

/// `Bearer ` followed by 100-1000 token characters (base64url alphabet, dots, whitespace)
static BEARER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^Bearer [A-Za-z0-9\-_.\s]{100,1000}$").expect("bearer pattern should be valid")
});

/// Syntactic pre-check on the raw `Authorization` header.
///
/// Rejects garbage before the gateway spends cache or network work on it.
/// Passing the gate proves nothing about the token.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestGate;

impl RequestGate {
    /// `true` if the header looks like a plausible bearer token.
    #[must_use]
    pub fn admits(&self, authorization: Option<&str>) -> bool {
        authorization.is_some_and(|h| BEARER_PATTERN.is_match(h))
    }
}

/// Extract the credential from an `Authorization` header value.
///
/// The value is trimmed and split on the first space; the left side must be
/// exactly `Bearer` and the right side a non-empty credential without inner
/// whitespace.
///
/// # Errors
///
/// [`GatewayError::MalformedCredential`] when the header is absent or empty,
/// has no scheme, uses another scheme, or carries an empty credential.
pub fn extract_bearer(authorization: Option<&str>) -> Result<&str, GatewayError> {
    let header = authorization
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .ok_or(GatewayError::MalformedCredential {
            reason: "missing authorization header",
        })?;

    let (scheme, credential) = header
        .split_once(' ')
        .ok_or(GatewayError::MalformedCredential {
            reason: "missing scheme",
        })?;

    if scheme != BEARER_SCHEME {
        return Err(GatewayError::MalformedCredential {
            reason: "unsupported scheme",
        });
    }

    let credential = credential.trim();
    if credential.is_empty() {
        return Err(GatewayError::MalformedCredential {
            reason: "empty credential",
        });
    }
    if credential.contains(char::is_whitespace) {
        return Err(GatewayError::MalformedCredential {
            reason: "credential contains whitespace",
        });
    }
    Ok(credential)
}
