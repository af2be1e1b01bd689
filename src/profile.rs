//! # Profile
//!
//! The normalized identity record handed to downstream services in the
//! `X-Basic-Profile` header.
//!
//! Both resolution paths produce a profile through the same fixed mapping,
//! [`Profile::from_claims`]: the remote path feeds it the introspection JSON,
//! the local path feeds it the decoded JWT payload. The mapping is total:
//! unknown claims are ignored and missing or mistyped claims become `None`.
//!
//! | Profile field         | Claim names (first present wins) |
//! |-----------------------|----------------------------------|
//! | `subject`             | `sub`                            |
//! | `clientId`            | `cid`, `client_id`               |
//! | `userId`              | `uid`                            |
//! | `userPrincipalName`   | `upn`, `username`                |
//! | `audience`            | `aud`                            |
//! | `issuer`              | `iss`                            |
//! | `tokenType`           | `token_type`                     |
//! | `scope`               | `scp`, `scope`                   |
//! | `jwtId`               | `jti`                            |
//! | `issuedAt`            | `iat`                            |
//! | `expiresAt`           | `exp`                            |
//! | `groups`              | `groups`                         |
//! | `version`             | `ver`                            |

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Header carrying the JSON-encoded profile to downstream services.
pub const BASIC_PROFILE_HEADER: &str = "X-Basic-Profile";

const SUBJECT: &[&str] = &["sub"];
const CLIENT_ID: &[&str] = &["cid", "client_id"];
const USER_ID: &[&str] = &["uid"];
const USER_PRINCIPAL_NAME: &[&str] = &["upn", "username"];
const AUDIENCE: &[&str] = &["aud"];
const ISSUER: &[&str] = &["iss"];
const TOKEN_TYPE: &[&str] = &["token_type"];
const SCOPE: &[&str] = &["scp", "scope"];
const JWT_ID: &[&str] = &["jti"];
const ISSUED_AT: &[&str] = &["iat"];
const EXPIRES_AT: &[&str] = &["exp"];
const GROUPS: &[&str] = &["groups"];
const VERSION: &[&str] = &["ver"];

/// Resolved identity of a bearer token.
///
/// When `active` is `false` callers must not trust any other field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_principal_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Space-delimited scopes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwt_id: Option<String>,
    /// Epoch seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<i64>,
    /// Epoch seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub groups: Vec<String>,
    /// Schema version of the issuing claim set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
}

impl Profile {
    /// A profile for a token the provider recognises but does not consider valid.
    #[must_use]
    pub fn inactive() -> Self {
        Self::default()
    }

    /// Build a profile from a claim set using the fixed claim-name table.
    #[must_use]
    pub fn from_claims(active: bool, claims: &Map<String, Value>) -> Self {
        Self {
            active,
            subject: string_claim(claims, SUBJECT),
            client_id: string_claim(claims, CLIENT_ID),
            user_id: string_claim(claims, USER_ID),
            user_principal_name: string_claim(claims, USER_PRINCIPAL_NAME),
            audience: joined_claim(claims, AUDIENCE),
            issuer: string_claim(claims, ISSUER),
            token_type: string_claim(claims, TOKEN_TYPE),
            scope: joined_claim(claims, SCOPE),
            jwt_id: string_claim(claims, JWT_ID),
            issued_at: epoch_claim(claims, ISSUED_AT),
            expires_at: epoch_claim(claims, EXPIRES_AT),
            groups: list_claim(claims, GROUPS),
            version: version_claim(claims, VERSION),
        }
    }

    /// Time left before `expires_at`, measured from `now` (epoch seconds).
    ///
    /// `None` when the profile carries no expiry; zero once it has passed.
    #[must_use]
    pub fn remaining_lifetime(&self, now: i64) -> Option<Duration> {
        self.expires_at
            .map(|exp| Duration::from_secs(u64::try_from(exp.saturating_sub(now)).unwrap_or(0)))
    }

    /// JSON value for the `X-Basic-Profile` header.
    pub fn to_header_value(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Downstream trust check for the `x-basic-profile` header.
///
/// Returns `true` only for a JSON object whose `active` field is the boolean
/// `true`. Missing header, invalid JSON or a missing field all yield `false`.
#[must_use]
pub fn is_active_profile(header: Option<&str>) -> bool {
    let active = header
        .and_then(|raw| serde_json::from_str::<Value>(raw).ok())
        .and_then(|v| v.get("active").and_then(Value::as_bool))
        .unwrap_or(false);
    tracing::trace!(active, "basic profile checked");
    active
}

/// Current time in epoch seconds.
pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}

fn first<'a>(claims: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .find_map(|name| claims.get(*name).filter(|v| !v.is_null()))
}

fn string_claim(claims: &Map<String, Value>, names: &[&str]) -> Option<String> {
    first(claims, names)
        .and_then(Value::as_str)
        .map(str::to_string)
}

// Okta emits `scp` as an array and introspection emits `scope` as a string;
// both normalize to a single space-delimited string.
fn joined_claim(claims: &Map<String, Value>, names: &[&str]) -> Option<String> {
    match first(claims, names)? {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => {
            let parts: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(" "))
            }
        }
        _ => None,
    }
}

fn epoch_claim(claims: &Map<String, Value>, names: &[&str]) -> Option<i64> {
    let value = first(claims, names)?;
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f.trunc() as i64))
}

fn list_claim(claims: &Map<String, Value>, names: &[&str]) -> Vec<String> {
    match first(claims, names) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn version_claim(claims: &Map<String, Value>, names: &[&str]) -> Option<u32> {
    match first(claims, names)? {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
