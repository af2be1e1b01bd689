//! JWT decoding and claim checks for [`LocalVerifier`](super::LocalVerifier).

use super::{LocalVerifier, SUPPORTED_ALGORITHMS};
use crate::error::GatewayError;
use crate::otel::redact_token;
use crate::profile::Profile;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::Validation;
use serde_json::{Map, Value};
use tracing::{debug, warn};

pub(super) fn verify_token(
    verifier: &LocalVerifier,
    token: &str,
) -> Result<Profile, GatewayError> {
    let result = verify_token_internal(verifier, token);
    match &result {
        Ok(profile) => debug!(
            token = %redact_token(token),
            subject = profile.subject.as_deref().unwrap_or(""),
            "local verification succeeded"
        ),
        Err(e) if e.allows_remote_fallback() => debug!(
            token = %redact_token(token),
            error = %e,
            "local verification inconclusive"
        ),
        Err(e) => warn!(
            token = %redact_token(token),
            kind = e.kind(),
            error = %e,
            "local verification rejected token"
        ),
    }
    result
}

fn verify_token_internal(
    verifier: &LocalVerifier,
    token: &str,
) -> Result<Profile, GatewayError> {
    // Anything that is not a JWT with a kid is opaque to us
    let header = jsonwebtoken::decode_header(token).map_err(|e| GatewayError::UnsupportedToken {
        reason: format!("not a JWT: {e}"),
    })?;
    let kid = header.kid.ok_or_else(|| GatewayError::UnsupportedToken {
        reason: "missing 'kid' in token header".to_string(),
    })?;
    if !SUPPORTED_ALGORITHMS.contains(&header.alg) {
        return Err(GatewayError::UnsupportedToken {
            reason: format!("unsupported algorithm {:?}", header.alg),
        });
    }

    let key = verifier.get_key_for(&kid)?;

    let mut validation = Validation::new(header.alg);
    validation.validate_exp = true;
    validation.set_required_spec_claims(&["exp", "sub"]);
    validation.leeway = verifier.leeway_secs;
    if let Some(ref iss) = verifier.issuer {
        validation.set_issuer(&[iss]);
    }
    match verifier.audience {
        Some(ref aud) => validation.set_audience(&[aud]),
        None => validation.validate_aud = false,
    }

    let claims = jsonwebtoken::decode::<Value>(token, &key, &validation)
        .map_err(|e| map_decode_error(e.kind()))?
        .claims;
    let claims = claims.as_object().ok_or(GatewayError::InvalidSignature)?;

    check_client_id(verifier, claims)?;
    check_required_group(verifier, claims)?;

    Ok(Profile::from_claims(true, claims))
}

fn map_decode_error(kind: &ErrorKind) -> GatewayError {
    match kind {
        ErrorKind::ExpiredSignature => GatewayError::Expired,
        ErrorKind::InvalidIssuer => GatewayError::ClaimMismatch {
            claim: "iss".to_string(),
        },
        ErrorKind::InvalidAudience => GatewayError::ClaimMismatch {
            claim: "aud".to_string(),
        },
        ErrorKind::InvalidSubject => GatewayError::ClaimMismatch {
            claim: "sub".to_string(),
        },
        ErrorKind::ImmatureSignature => GatewayError::ClaimMismatch {
            claim: "nbf".to_string(),
        },
        ErrorKind::MissingRequiredClaim(claim) => GatewayError::ClaimMismatch {
            claim: claim.clone(),
        },
        // Bad signature, key/alg mismatch, or a payload that fails to decode
        _ => GatewayError::InvalidSignature,
    }
}

fn check_client_id(
    verifier: &LocalVerifier,
    claims: &Map<String, Value>,
) -> Result<(), GatewayError> {
    let Some(ref expected) = verifier.client_id else {
        return Ok(());
    };
    let actual = claims.get("cid").and_then(Value::as_str);
    if actual == Some(expected.as_str()) {
        Ok(())
    } else {
        Err(GatewayError::ClaimMismatch {
            claim: "cid".to_string(),
        })
    }
}

fn check_required_group(
    verifier: &LocalVerifier,
    claims: &Map<String, Value>,
) -> Result<(), GatewayError> {
    let Some(ref group) = verifier.required_group else {
        return Ok(());
    };
    let member = claims
        .get("groups")
        .and_then(Value::as_array)
        .is_some_and(|groups| groups.iter().any(|g| g.as_str() == Some(group.as_str())));
    if member {
        Ok(())
    } else {
        Err(GatewayError::MissingRequiredGroup {
            group: group.clone(),
        })
    }
}
