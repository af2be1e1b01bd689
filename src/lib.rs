//! # tokengate
//!
//! **tokengate** is a bearer-token validation gateway built on the `may`
//! coroutine runtime. It decides whether an `Authorization: Bearer ...` header
//! belongs to an active principal and, if so, hands downstream services a
//! normalized [`Profile`] in the `X-Basic-Profile` header.
//!
//! ## Architecture
//!
//! - **[`security`]** - request gate, credential extraction, profile cache,
//!   remote introspection, local JWT verification and the orchestrating
//!   [`TokenValidationGateway`]
//! - **[`profile`]** - the [`Profile`] shape and claim mapping
//! - **[`server`]** - `POST /validate` and `GET /health` on `may_minihttp`
//! - **[`config`]** - YAML configuration with environment overrides
//! - **[`otel`]** - `tracing` subscriber setup and token redaction
//! - **[`cli`]** - the `tokengate serve` / `tokengate check` commands
//!
//! ### Request flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Client
//!     participant Server as server::GatewayService
//!     participant Gate as RequestGate
//!     participant Gateway as TokenValidationGateway
//!     participant Cache as ProfileCache
//!     participant Resolver as LocalVerifier / RemoteIntrospector
//!
//!     Client->>Server: POST /validate (Authorization)
//!     Server->>Gate: admits(header)?
//!     Gate-->>Server: false -> 401 Forbidden
//!     Server->>Gateway: introspect(header)
//!     Gateway->>Cache: get(token)
//!     Cache-->>Gateway: hit -> profile
//!     Gateway->>Resolver: resolve(token) on miss
//!     Resolver-->>Gateway: profile / error
//!     Gateway->>Cache: set(token, profile) if active
//!     Gateway-->>Server: profile
//!     Server-->>Client: 204 + X-Basic-Profile / 403 / 401
//! ```
//!
//! ## Quick Start
//!
//! ```yaml
//! # tokengate.yaml
//! introspection:
//!   url: https://dev.okta.com/oauth2/default/v1/introspect
//!   client_id: 0oa1example
//! local:
//!   issuer: https://dev.okta.com/oauth2/default
//!   audience: api://default
//! cache:
//!   ttl_secs: 600
//!   max_entries: 10
//! ```
//!
//! ```bash
//! TOKENGATE_CLIENT_SECRET=... tokengate serve --config tokengate.yaml
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod otel;
pub mod profile;
pub mod runtime_config;
pub mod security;
pub mod server;

pub use config::{ConfigError, GatewayConfig};
pub use error::GatewayError;
pub use profile::{is_active_profile, Profile, BASIC_PROFILE_HEADER};
pub use security::{
    validate_request, ProfileCache, ProfileResolver, RequestGate, ResolutionStrategy,
    TokenValidationGateway, ValidationOutcome,
};
