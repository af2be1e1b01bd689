mod validation;

use crate::config::ConfigError;
use crate::error::GatewayError;
use crate::profile::Profile;
use crate::security::ProfileResolver;
use base64::Engine as _;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use jsonwebtoken::DecodingKey;
use once_cell::sync::OnceCell;
use serde_json::Value;
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

// Supported JWT algorithms - anything else is left to remote introspection
pub(super) const SUPPORTED_ALGORITHMS: &[jsonwebtoken::Algorithm] = &[
    jsonwebtoken::Algorithm::HS256,
    jsonwebtoken::Algorithm::HS384,
    jsonwebtoken::Algorithm::HS512,
    jsonwebtoken::Algorithm::RS256,
    jsonwebtoken::Algorithm::RS384,
    jsonwebtoken::Algorithm::RS512,
];

/// Default group every locally verified token must belong to
pub const DEFAULT_REQUIRED_GROUP: &str = "Everyone";
/// Default key-set refresh budget
pub const DEFAULT_REFRESHES_PER_MINUTE: u32 = 10;
/// Default key-set fetch timeout
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 2000;

/// Local JWT verification against the issuer's published key set.
///
/// Keys are fetched on first use and kept for the life of the process. A
/// token naming an unknown `kid` triggers one on-demand refresh, bounded by a
/// per-minute budget so a flood of forged `kid`s cannot hammer the issuer.
pub struct LocalVerifier {
    jwks_url: String,
    pub(super) issuer: Option<String>,
    pub(super) audience: Option<String>,
    pub(super) client_id: Option<String>,
    pub(super) required_group: Option<String>,
    pub(super) leeway_secs: u64,
    fetch_timeout_ms: u64,
    refreshes_per_minute: u32,
    // kid -> DecodingKey
    keys: Mutex<HashMap<String, DecodingKey>>,
    loaded: AtomicBool,
    // Serializes fetches so concurrent misses on the same kid trigger one request
    refresh_lock: Mutex<()>,
    limiter: OnceCell<DefaultDirectRateLimiter>,
    client: OnceCell<reqwest::blocking::Client>,
    refreshes: AtomicU64,
}

impl LocalVerifier {
    /// Create a new local verifier
    ///
    /// # Arguments
    ///
    /// * `jwks_url` - Key-set URL (e.g., `https://dev.okta.com/oauth2/default/v1/keys`)
    ///
    /// # Errors
    ///
    /// The URL must parse and use HTTPS. Plain HTTP is accepted only for the
    /// exact hosts `localhost` and `127.0.0.1`, never for look-alikes such as
    /// `localhost.attacker.com`.
    pub fn new(jwks_url: impl Into<String>) -> Result<Self, ConfigError> {
        let url_str = jwks_url.into();
        check_key_set_url(&url_str)?;

        Ok(Self {
            jwks_url: url_str,
            issuer: None,
            audience: None,
            client_id: None,
            required_group: Some(DEFAULT_REQUIRED_GROUP.to_string()),
            leeway_secs: 0,
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
            refreshes_per_minute: DEFAULT_REFRESHES_PER_MINUTE,
            keys: Mutex::new(HashMap::new()),
            loaded: AtomicBool::new(false),
            refresh_lock: Mutex::new(()),
            limiter: OnceCell::new(),
            client: OnceCell::new(),
            refreshes: AtomicU64::new(0),
        })
    }

    /// Configure the expected `iss` claim
    #[must_use]
    pub fn issuer(mut self, iss: impl Into<String>) -> Self {
        self.issuer = Some(iss.into());
        self
    }

    /// Configure the expected `aud` claim
    #[must_use]
    pub fn audience(mut self, aud: impl Into<String>) -> Self {
        self.audience = Some(aud.into());
        self
    }

    /// Configure the expected `cid` claim
    #[must_use]
    pub fn client_id(mut self, cid: impl Into<String>) -> Self {
        self.client_id = Some(cid.into());
        self
    }

    /// Configure the group the `groups` claim must contain
    ///
    /// Default: `Everyone`. `None` disables the group assertion.
    #[must_use]
    pub fn required_group(mut self, group: Option<String>) -> Self {
        self.required_group = group;
        self
    }

    /// Configure clock-skew leeway for `exp`
    #[must_use]
    pub fn leeway(mut self, secs: u64) -> Self {
        self.leeway_secs = secs;
        self
    }

    /// Configure the key-set fetch timeout in milliseconds
    #[must_use]
    pub fn fetch_timeout_ms(mut self, ms: u64) -> Self {
        self.fetch_timeout_ms = ms;
        self
    }

    /// Configure how many key-set fetches are allowed per minute
    ///
    /// Zero is treated as one.
    #[must_use]
    pub fn refreshes_per_minute(mut self, n: u32) -> Self {
        self.refreshes_per_minute = n;
        self
    }

    /// Key-set URL this verifier trusts
    #[must_use]
    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    /// Number of key-set fetches performed so far
    #[must_use]
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    fn limiter(&self) -> &DefaultDirectRateLimiter {
        self.limiter
            .get_or_init(|| RateLimiter::direct(refresh_quota(self.refreshes_per_minute)))
    }

    fn client(&self) -> Result<&reqwest::blocking::Client, GatewayError> {
        self.client.get_or_try_init(|| {
            reqwest::blocking::Client::builder()
                .timeout(Duration::from_millis(self.fetch_timeout_ms))
                .redirect(reqwest::redirect::Policy::none())
                .build()
                .map_err(|e| GatewayError::KeySetUnavailable {
                    reason: format!("client build failed: {e}"),
                })
        })
    }

    fn cached_key(&self, kid: &str) -> Option<DecodingKey> {
        match self.keys.lock() {
            Ok(keys) => keys.get(kid).cloned(),
            Err(_) => {
                warn!("key set lock poisoned, treating key as unknown");
                None
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn insert_key(&self, kid: &str, key: DecodingKey) {
        if let Ok(mut keys) = self.keys.lock() {
            keys.insert(kid.to_string(), key);
        }
        self.loaded.store(true, Ordering::Release);
    }

    /// Decoding key for `kid`, refreshing the key set once if it is unknown.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::KeySetUnavailable`] if no key set has ever been
    ///   loaded and one cannot be fetched now (network, parse, or budget)
    /// - [`GatewayError::InvalidSignature`] if the key set is known and does
    ///   not contain `kid`, even after a refresh
    pub(super) fn get_key_for(&self, kid: &str) -> Result<DecodingKey, GatewayError> {
        if let Some(key) = self.cached_key(kid) {
            return Ok(key);
        }

        let _guard = self.refresh_lock.lock().map_err(|_| GatewayError::KeySetUnavailable {
            reason: "refresh lock poisoned".to_string(),
        })?;
        // Another request may have refreshed while we waited
        if let Some(key) = self.cached_key(kid) {
            return Ok(key);
        }

        if self.limiter().check().is_err() {
            warn!(kid, url = %self.jwks_url, "key-set refresh budget exhausted");
            return Err(self.unknown_key_error("refresh budget exhausted"));
        }

        match self.fetch_key_set() {
            Ok(fresh) => {
                let key = fresh.get(kid).cloned();
                if let Ok(mut keys) = self.keys.lock() {
                    *keys = fresh;
                }
                self.loaded.store(true, Ordering::Release);
                key.ok_or_else(|| {
                    debug!(kid, "kid not published by issuer");
                    GatewayError::InvalidSignature
                })
            }
            Err(e) => {
                warn!(url = %self.jwks_url, error = %e, "key-set refresh failed");
                Err(self.unknown_key_error(&e.to_string()))
            }
        }
    }

    fn unknown_key_error(&self, reason: &str) -> GatewayError {
        if self.loaded.load(Ordering::Acquire) {
            GatewayError::InvalidSignature
        } else {
            GatewayError::KeySetUnavailable {
                reason: reason.to_string(),
            }
        }
    }

    fn fetch_key_set(&self) -> Result<HashMap<String, DecodingKey>, GatewayError> {
        let unavailable = |reason: String| GatewayError::KeySetUnavailable { reason };
        let started = Instant::now();
        self.refreshes.fetch_add(1, Ordering::Relaxed);

        let response = self
            .client()?
            .get(&self.jwks_url)
            .send()
            .map_err(|e| unavailable(format!("request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(unavailable(format!(
                "unexpected status {}",
                response.status().as_u16()
            )));
        }
        let body = response
            .text()
            .map_err(|e| unavailable(format!("unreadable body: {e}")))?;
        let keys = parse_key_set(&body)?;

        debug!(
            url = %self.jwks_url,
            keys = keys.len(),
            latency_ms = started.elapsed().as_millis() as u64,
            "key-set refresh completed"
        );
        Ok(keys)
    }
}

/// One refresh every `60s / per_minute`, with no burst, so no 60 s window
/// ever sees more than `per_minute` fetches.
pub(super) fn refresh_quota(per_minute: u32) -> Quota {
    let per_minute = NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN);
    Quota::with_period(Duration::from_secs(60) / per_minute.get())
        .unwrap_or_else(|| Quota::per_minute(NonZeroU32::MIN))
        .allow_burst(NonZeroU32::MIN)
}

/// Reject key-set URLs that would let an attacker serve keys in cleartext.
pub(crate) fn check_key_set_url(url_str: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidKeySetUrl {
        url: url_str.to_string(),
        reason: reason.to_string(),
    };
    let parsed = Url::parse(url_str).map_err(|e| invalid(&e.to_string()))?;
    match parsed.scheme() {
        "https" => Ok(()),
        "http" => match parsed.host_str() {
            Some("localhost") | Some("127.0.0.1") => Ok(()),
            Some(_) => Err(invalid("HTTPS required (HTTP only for localhost/127.0.0.1)")),
            None => Err(invalid("missing host")),
        },
        _ => Err(invalid("scheme must be https")),
    }
}

/// Parse a JWKS document into `kid -> DecodingKey`.
///
/// `oct` keys back HS* algorithms, `RSA` keys (`n`/`e`) back RS*. Keys without
/// a `kid`, with a non-signing `use`, or of any other type are skipped.
pub(crate) fn parse_key_set(body: &str) -> Result<HashMap<String, DecodingKey>, GatewayError> {
    let parsed: Value = serde_json::from_str(body).map_err(|e| GatewayError::KeySetUnavailable {
        reason: format!("key set is not JSON: {e}"),
    })?;
    let entries = parsed
        .get("keys")
        .and_then(Value::as_array)
        .ok_or_else(|| GatewayError::KeySetUnavailable {
            reason: "key set has no 'keys' array".to_string(),
        })?;

    let mut keys = HashMap::new();
    for k in entries {
        let Some(kid) = k.get("kid").and_then(Value::as_str) else {
            continue;
        };
        if k.get("use").and_then(Value::as_str).is_some_and(|u| u != "sig") {
            continue;
        }
        let kty = k.get("kty").and_then(Value::as_str).unwrap_or("");
        let alg = k.get("alg").and_then(Value::as_str).unwrap_or("");

        if kty.eq_ignore_ascii_case("oct") && (alg.is_empty() || alg.starts_with("HS")) {
            let Some(secret) = k
                .get("k")
                .and_then(Value::as_str)
                .and_then(|v| base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(v).ok())
            else {
                continue;
            };
            keys.insert(kid.to_string(), DecodingKey::from_secret(&secret));
            continue;
        }
        if kty.eq_ignore_ascii_case("RSA") && (alg.is_empty() || alg.starts_with("RS")) {
            let (Some(n), Some(e)) = (
                k.get("n").and_then(Value::as_str),
                k.get("e").and_then(Value::as_str),
            ) else {
                continue;
            };
            if let Ok(dk) = DecodingKey::from_rsa_components(n, e) {
                keys.insert(kid.to_string(), dk);
            }
        }
    }
    Ok(keys)
}

/// Local verification flow
///
/// 1. Parse the JWT header for `kid` and `alg`; opaque tokens, a missing
///    `kid` or an algorithm outside [`SUPPORTED_ALGORITHMS`] are
///    [`GatewayError::UnsupportedToken`]
/// 2. Look up the decoding key, refreshing the key set on an unknown `kid`
/// 3. Verify the signature, `iss`, `aud` and `exp` (with leeway)
/// 4. Check `cid` against the configured client id
/// 5. Require the configured group in `groups`
/// 6. Map the claims to an active [`Profile`]
impl ProfileResolver for LocalVerifier {
    fn resolve(&self, credential: &str) -> Result<Profile, GatewayError> {
        validation::verify_token(self, credential)
    }

    fn name(&self) -> &'static str {
        "local"
    }
}
