//! # Configuration
//!
//! tokengate reads one YAML file and then lets a handful of environment
//! variables override it, so secrets can stay out of the file.
//!
//! ```yaml
//! introspection:
//!   url: https://dev.okta.com/oauth2/default/v1/introspect
//!   client_id: 0oa1example
//!   # client_secret: prefer TOKENGATE_CLIENT_SECRET
//!   token_type_hint: access_token   # default
//!   timeout_ms: 2000                # default
//! local:                            # optional; enables local JWT verification
//!   issuer: https://dev.okta.com/oauth2/default
//!   audience: api://default
//!   jwks_url: https://dev.okta.com/oauth2/default/v1/keys   # default: {issuer}/v1/keys
//!   client_id: 0oa1example          # default: introspection.client_id
//!   required_group: Everyone        # default; null disables the check
//!   leeway_secs: 0
//!   refreshes_per_minute: 10
//! cache:
//!   ttl_secs: 600
//!   max_entries: 10
//! strategy: local_then_remote       # remote | local | local_then_remote
//! ```
//!
//! ## Environment Variables
//!
//! | Variable                      | Overrides                    |
//! |-------------------------------|------------------------------|
//! | `TOKENGATE_INTROSPECTION_URL` | `introspection.url`          |
//! | `TOKENGATE_CLIENT_ID`         | `introspection.client_id`    |
//! | `TOKENGATE_CLIENT_SECRET`     | `introspection.client_secret`|
//! | `TOKENGATE_TOKEN_TYPE_HINT`   | `introspection.token_type_hint` |
//! | `TOKENGATE_ISSUER`            | `local.issuer`               |
//! | `TOKENGATE_AUDIENCE`          | `local.audience`             |

use crate::security::introspection::{DEFAULT_TIMEOUT_MS, DEFAULT_TOKEN_TYPE_HINT};
use crate::security::local_verifier::{
    DEFAULT_FETCH_TIMEOUT_MS, DEFAULT_REFRESHES_PER_MINUTE, DEFAULT_REQUIRED_GROUP,
};
use crate::security::{
    LocalVerifier, ProfileCache, RemoteIntrospector, ResolutionStrategy, TokenValidationGateway,
    DEFAULT_MAX_ENTRIES, DEFAULT_TTL,
};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Problems loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("missing required setting '{0}'")]
    Missing(&'static str),

    #[error("invalid key-set URL '{url}': {reason}")]
    InvalidKeySetUrl { url: String, reason: String },

    #[error("invalid setting '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Which resolution paths run on a cache miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Remote,
    Local,
    LocalThenRemote,
}

/// Remote introspection settings.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IntrospectionConfig {
    pub url: Option<String>,
    pub client_id: Option<String>,
    #[serde(deserialize_with = "deserialize_secret")]
    pub client_secret: Option<SecretString>,
    pub token_type_hint: Option<String>,
    pub timeout_ms: Option<u64>,
}

/// Local JWT verification settings.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocalConfig {
    pub issuer: String,
    #[serde(default)]
    pub audience: Option<String>,
    #[serde(default)]
    pub jwks_url: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default = "default_required_group")]
    pub required_group: Option<String>,
    #[serde(default)]
    pub leeway_secs: u64,
    #[serde(default = "default_refreshes_per_minute")]
    pub refreshes_per_minute: u32,
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
}

impl LocalConfig {
    fn for_issuer(issuer: String) -> Self {
        Self {
            issuer,
            audience: None,
            jwks_url: None,
            client_id: None,
            required_group: default_required_group(),
            leeway_secs: 0,
            refreshes_per_minute: DEFAULT_REFRESHES_PER_MINUTE,
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
        }
    }

    /// Key-set URL, defaulting to the issuer's `/v1/keys`
    #[must_use]
    pub fn key_set_url(&self) -> String {
        self.jwks_url
            .clone()
            .unwrap_or_else(|| format!("{}/v1/keys", self.issuer.trim_end_matches('/')))
    }
}

/// Upper bound for `cache.ttl_secs` (one day)
pub const MAX_CACHE_TTL_SECS: u64 = 86_400;

/// Profile cache settings.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_TTL.as_secs(),
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    pub introspection: IntrospectionConfig,
    pub local: Option<LocalConfig>,
    pub cache: CacheConfig,
    pub strategy: Option<StrategyKind>,
}

fn default_required_group() -> Option<String> {
    Some(DEFAULT_REQUIRED_GROUP.to_string())
}

fn default_refreshes_per_minute() -> u32 {
    DEFAULT_REFRESHES_PER_MINUTE
}

fn default_fetch_timeout_ms() -> u64 {
    DEFAULT_FETCH_TIMEOUT_MS
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Deserialize::deserialize(deserializer)?;
    Ok(s.map(SecretString::from))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl GatewayConfig {
    /// Parse YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Read and parse a YAML file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::from_yaml(&text)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply `TOKENGATE_*` overrides from `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let intro = &mut self.introspection;
        if let Some(v) = lookup("TOKENGATE_INTROSPECTION_URL") {
            intro.url = Some(v);
        }
        if let Some(v) = lookup("TOKENGATE_CLIENT_ID") {
            intro.client_id = Some(v);
        }
        if let Some(v) = lookup("TOKENGATE_CLIENT_SECRET") {
            intro.client_secret = Some(SecretString::from(v));
        }
        if let Some(v) = lookup("TOKENGATE_TOKEN_TYPE_HINT") {
            intro.token_type_hint = Some(v);
        }

        if let Some(iss) = lookup("TOKENGATE_ISSUER") {
            if let Some(local) = self.local.as_mut() {
                local.issuer = iss;
            } else {
                self.local = Some(LocalConfig::for_issuer(iss));
            }
        }
        if let (Some(local), Some(aud)) = (self.local.as_mut(), lookup("TOKENGATE_AUDIENCE")) {
            local.audience = Some(aud);
        }
    }

    /// Strategy to use: explicit, or derived from whether `local` is configured.
    #[must_use]
    pub fn effective_strategy(&self) -> StrategyKind {
        match (self.strategy, &self.local) {
            (Some(kind), _) => kind,
            (None, Some(_)) => StrategyKind::LocalThenRemote,
            (None, None) => StrategyKind::Remote,
        }
    }

    fn needs_remote(&self) -> bool {
        self.effective_strategy() != StrategyKind::Local
    }

    /// Check that everything the effective strategy needs is present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let strategy = self.effective_strategy();
        if self.needs_remote() {
            let intro = &self.introspection;
            let url = non_empty(&intro.url).ok_or(ConfigError::Missing("introspection.url"))?;
            url::Url::parse(url).map_err(|e| ConfigError::Invalid {
                field: "introspection.url",
                reason: e.to_string(),
            })?;
            non_empty(&intro.client_id).ok_or(ConfigError::Missing("introspection.client_id"))?;
            intro
                .client_secret
                .as_ref()
                .filter(|s| !s.expose_secret().is_empty())
                .ok_or(ConfigError::Missing("introspection.client_secret"))?;
            if intro.timeout_ms == Some(0) {
                return Err(ConfigError::Invalid {
                    field: "introspection.timeout_ms",
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        if strategy != StrategyKind::Remote {
            let local = self.local.as_ref().ok_or(ConfigError::Missing("local"))?;
            if local.issuer.trim().is_empty() {
                return Err(ConfigError::Missing("local.issuer"));
            }
            crate::security::local_verifier::check_key_set_url(&local.key_set_url())?;
        }
        if self.cache.ttl_secs > MAX_CACHE_TTL_SECS {
            return Err(ConfigError::Invalid {
                field: "cache.ttl_secs",
                reason: format!("must be at most {MAX_CACHE_TTL_SECS}"),
            });
        }
        if self.cache.max_entries == 0 {
            return Err(ConfigError::Invalid {
                field: "cache.max_entries",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    fn remote_introspector(&self) -> Result<RemoteIntrospector, ConfigError> {
        let intro = &self.introspection;
        let url = non_empty(&intro.url).ok_or(ConfigError::Missing("introspection.url"))?;
        let client_id =
            non_empty(&intro.client_id).ok_or(ConfigError::Missing("introspection.client_id"))?;
        let secret = intro
            .client_secret
            .as_ref()
            .ok_or(ConfigError::Missing("introspection.client_secret"))?;
        Ok(RemoteIntrospector::new(
            url,
            client_id,
            SecretString::from(secret.expose_secret().to_string()),
        )
        .token_type_hint(
            intro
                .token_type_hint
                .clone()
                .unwrap_or_else(|| DEFAULT_TOKEN_TYPE_HINT.to_string()),
        )
        .timeout_ms(intro.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS)))
    }

    fn local_verifier(&self) -> Result<LocalVerifier, ConfigError> {
        let local = self.local.as_ref().ok_or(ConfigError::Missing("local"))?;
        let mut verifier = LocalVerifier::new(local.key_set_url())?
            .issuer(local.issuer.clone())
            .required_group(local.required_group.clone())
            .leeway(local.leeway_secs)
            .refreshes_per_minute(local.refreshes_per_minute)
            .fetch_timeout_ms(local.fetch_timeout_ms);
        if let Some(aud) = &local.audience {
            verifier = verifier.audience(aud.clone());
        }
        let client_id = local
            .client_id
            .as_deref()
            .or_else(|| non_empty(&self.introspection.client_id));
        if let Some(cid) = client_id {
            verifier = verifier.client_id(cid);
        }
        Ok(verifier)
    }

    /// Validate and assemble the gateway this configuration describes.
    pub fn build_gateway(&self) -> Result<TokenValidationGateway, ConfigError> {
        self.validate()?;
        let strategy = match self.effective_strategy() {
            StrategyKind::Remote => ResolutionStrategy::Remote(Box::new(self.remote_introspector()?)),
            StrategyKind::Local => ResolutionStrategy::Local(Box::new(self.local_verifier()?)),
            StrategyKind::LocalThenRemote => ResolutionStrategy::LocalThenRemote {
                local: Box::new(self.local_verifier()?),
                remote: Box::new(self.remote_introspector()?),
            },
        };
        let cache = ProfileCache::new(
            Duration::from_secs(self.cache.ttl_secs),
            self.cache.max_entries,
        );
        Ok(TokenValidationGateway::new(strategy, cache))
    }

    /// Human-readable summary with the client secret redacted.
    #[must_use]
    pub fn summary(&self) -> String {
        let intro = &self.introspection;
        let mut lines = vec![
            format!("strategy: {:?}", self.effective_strategy()),
            format!(
                "introspection.url: {}",
                intro.url.as_deref().unwrap_or("<unset>")
            ),
            format!(
                "introspection.client_id: {}",
                intro.client_id.as_deref().unwrap_or("<unset>")
            ),
            format!(
                "introspection.client_secret: {}",
                if intro.client_secret.is_some() {
                    "<redacted>"
                } else {
                    "<unset>"
                }
            ),
            format!(
                "cache: ttl={}s max_entries={}",
                self.cache.ttl_secs, self.cache.max_entries
            ),
        ];
        if let Some(local) = &self.local {
            lines.push(format!("local.issuer: {}", local.issuer));
            lines.push(format!("local.jwks_url: {}", local.key_set_url()));
            lines.push(format!(
                "local.required_group: {}",
                local.required_group.as_deref().unwrap_or("<none>")
            ));
        }
        lines.join("\n")
    }
}
