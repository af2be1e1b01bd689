//! RFC 7662 token introspection against the identity provider.
//!
//! One form-encoded POST per cache miss, bounded by a timeout and never retried.

use crate::error::GatewayError;
use crate::otel::redact_token;
use crate::profile::Profile;
use crate::security::ProfileResolver;
use once_cell::sync::OnceCell;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::redirect::Policy;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default introspection timeout
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;
/// Default `token_type_hint` form parameter
pub const DEFAULT_TOKEN_TYPE_HINT: &str = "access_token";

/// Remote token introspection against the identity provider.
pub struct RemoteIntrospector {
    url: String,
    client_id: String,
    client_secret: SecretString,
    token_type_hint: String,
    timeout_ms: u64,
    client: OnceCell<reqwest::blocking::Client>,
}

impl RemoteIntrospector {
    /// Create a new introspector
    ///
    /// Resolves tokens by POSTing them to the provider's introspection endpoint
    /// (RFC 7662) with the client's credentials in the form body.
    ///
    /// # Arguments
    ///
    /// * `url` - Introspection endpoint (e.g., `https://dev.okta.com/oauth2/default/v1/introspect`)
    /// * `client_id` - Client identifier sent as `client_id`
    /// * `client_secret` - Client secret sent as `client_secret`, never logged
    pub fn new(
        url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: SecretString,
    ) -> Self {
        Self {
            url: url.into(),
            client_id: client_id.into(),
            client_secret,
            token_type_hint: DEFAULT_TOKEN_TYPE_HINT.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            client: OnceCell::new(),
        }
    }

    /// Configure the `token_type_hint` form parameter
    ///
    /// Default: `access_token`
    #[must_use]
    pub fn token_type_hint(mut self, hint: impl Into<String>) -> Self {
        self.token_type_hint = hint.into();
        self
    }

    /// Configure the HTTP request timeout in milliseconds
    ///
    /// Default: 2000ms
    #[must_use]
    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    fn client(&self) -> Result<&reqwest::blocking::Client, GatewayError> {
        self.client.get_or_try_init(|| {
            reqwest::blocking::Client::builder()
                .timeout(Duration::from_millis(self.timeout_ms))
                .redirect(Policy::none())
                .build()
                .map_err(|e| GatewayError::introspection(format!("client build failed: {e}")))
        })
    }

    fn form_body(&self, token: &str) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .append_pair("client_id", &self.client_id)
            .append_pair("client_secret", self.client_secret.expose_secret())
            .append_pair("token_type_hint", &self.token_type_hint)
            .append_pair("token", token)
            .finish()
    }
}

/// Interpret an introspection response body.
///
/// `active` is authoritative and must be a boolean. An inactive answer is a
/// normal inactive profile; an active one must name its subject.
pub(crate) fn profile_from_response(body: &str) -> Result<Profile, GatewayError> {
    let parsed: Value = serde_json::from_str(body)
        .map_err(|e| GatewayError::introspection(format!("response is not JSON: {e}")))?;
    let claims = parsed
        .as_object()
        .ok_or_else(|| GatewayError::introspection("response is not a JSON object"))?;
    let active = claims
        .get("active")
        .and_then(Value::as_bool)
        .ok_or_else(|| GatewayError::introspection("response has no boolean 'active'"))?;

    if !active {
        return Ok(Profile::inactive());
    }
    let profile = Profile::from_claims(true, claims);
    if profile.subject.is_none() {
        return Err(GatewayError::introspection("active response without 'sub'"));
    }
    Ok(profile)
}

/// Introspection flow
///
/// 1. POST `client_id`, `client_secret`, `token_type_hint`, `token` as
///    `application/x-www-form-urlencoded`
/// 2. Any transport error, timeout or non-2xx status is an
///    [`GatewayError::IntrospectionFailure`]; nothing is retried
/// 3. The JSON body is mapped with [`profile_from_response`]
///
/// Redirects are never followed.
impl ProfileResolver for RemoteIntrospector {
    fn resolve(&self, credential: &str) -> Result<Profile, GatewayError> {
        let client = self.client()?;
        let started = Instant::now();
        debug!(
            url = %self.url,
            client_id = %self.client_id,
            token = %redact_token(credential),
            "introspecting token"
        );

        let response = client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(ACCEPT, "application/json")
            .body(self.form_body(credential))
            .send()
            .map_err(|e| {
                let reason = if e.is_timeout() {
                    format!("timed out after {}ms", self.timeout_ms)
                } else {
                    format!("request failed: {e}")
                };
                warn!(url = %self.url, %reason, "introspection request failed");
                GatewayError::IntrospectionFailure { reason }
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %self.url, status = status.as_u16(), "introspection returned non-2xx");
            return Err(GatewayError::introspection(format!(
                "unexpected status {}",
                status.as_u16()
            )));
        }

        let body = response
            .text()
            .map_err(|e| GatewayError::introspection(format!("unreadable body: {e}")))?;
        let profile = profile_from_response(&body)?;

        debug!(
            token = %redact_token(credential),
            active = profile.active,
            latency_ms = started.elapsed().as_millis() as u64,
            "introspection completed"
        );
        Ok(profile)
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}
