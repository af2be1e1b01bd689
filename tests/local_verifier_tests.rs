//! Local JWT verification, with and without remote fallback, through the
//! config loader and the HTTP surface.

mod common;

use common::http::{header_value, parse_status, validate};
use common::mock_idp::MockEndpoint;
use common::test_server::GatewayTestServer;
use common::tokens::{make_hs256_jwt, now, oct_key_set, opaque};
use serde_json::{json, Value};
use std::time::Duration;
use tokengate::config::StrategyKind;
use tokengate::GatewayConfig;

const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";
const KID: &str = "k1";
const ISS: &str = "https://dev.okta.com/oauth2/default";
const AUD: &str = "api://default";

fn claims() -> Value {
    json!({
        "ver": 1,
        "jti": "AT.abc",
        "iss": ISS,
        "aud": AUD,
        "iat": now(),
        "exp": now() + 3600,
        "cid": "client-1",
        "uid": "00u1",
        "scp": ["read", "write"],
        "sub": "alice@example.com",
        "groups": ["Everyone"]
    })
}

fn config_yaml(idp: &MockEndpoint, keys: &MockEndpoint, strategy: &str) -> String {
    format!(
        r#"
strategy: {strategy}
introspection:
  url: {}
  client_id: client-1
  client_secret: s3cret
local:
  issuer: {ISS}
  audience: {AUD}
  jwks_url: {}
"#,
        idp.url, keys.url
    )
}

fn start(idp: &MockEndpoint, keys: &MockEndpoint, strategy: &str) -> GatewayTestServer {
    let config = GatewayConfig::from_yaml(&config_yaml(idp, keys, strategy)).unwrap();
    GatewayTestServer::start(config.build_gateway().unwrap())
}

#[test]
fn test_strategy_defaults_to_local_then_remote_with_local_section() {
    let idp = MockEndpoint::introspection(r#"{"active":false}"#);
    let keys = MockEndpoint::key_set(&oct_key_set(SECRET, KID));
    let yaml = config_yaml(&idp, &keys, "local_then_remote").replace("strategy: local_then_remote\n", "");
    let config = GatewayConfig::from_yaml(&yaml).unwrap();
    assert_eq!(config.effective_strategy(), StrategyKind::LocalThenRemote);
    assert_eq!(
        config.build_gateway().unwrap().strategy().name(),
        "local_then_remote"
    );
}

#[test]
fn test_valid_local_token_skips_introspection() {
    let idp = MockEndpoint::introspection(r#"{"active":false}"#);
    let keys = MockEndpoint::key_set(&oct_key_set(SECRET, KID));
    let server = start(&idp, &keys, "local_then_remote");
    let token = make_hs256_jwt(SECRET, KID, &claims());

    let resp = validate(&server.addr(), Some(&format!("Bearer {token}")));
    assert_eq!(parse_status(&resp), 204);
    let profile: Value =
        serde_json::from_str(&header_value(&resp, "x-basic-profile").unwrap()).unwrap();
    assert_eq!(profile["active"], true);
    assert_eq!(profile["subject"], "alice@example.com");
    assert_eq!(profile["clientId"], "client-1");
    assert_eq!(profile["scope"], "read write");
    assert_eq!(profile["groups"], json!(["Everyone"]));
    assert_eq!(idp.hits(), 0);
    assert_eq!(keys.hits(), 1);

    // Cached: neither the key set nor the introspection endpoint is touched
    let resp = validate(&server.addr(), Some(&format!("Bearer {token}")));
    assert_eq!(parse_status(&resp), 204);
    assert_eq!(keys.hits(), 1);
    assert_eq!(idp.hits(), 0);
}

#[test]
fn test_wrong_key_is_terminal() {
    let idp = MockEndpoint::introspection(r#"{"active":true,"sub":"mallory"}"#);
    let keys = MockEndpoint::key_set(&oct_key_set(SECRET, KID));
    let server = start(&idp, &keys, "local_then_remote");
    let token = make_hs256_jwt(b"not-the-published-secret-at-all!", KID, &claims());

    let resp = validate(&server.addr(), Some(&format!("Bearer {token}")));
    assert_eq!(parse_status(&resp), 401);
    assert_eq!(idp.hits(), 0);
    assert!(server.gateway.cache().is_empty());
}

#[test]
fn test_missing_group_is_terminal() {
    let idp = MockEndpoint::introspection(r#"{"active":true,"sub":"mallory"}"#);
    let keys = MockEndpoint::key_set(&oct_key_set(SECRET, KID));
    let server = start(&idp, &keys, "local_then_remote");
    let mut c = claims();
    c["groups"] = json!(["Contractors"]);
    let token = make_hs256_jwt(SECRET, KID, &c);

    let resp = validate(&server.addr(), Some(&format!("Bearer {token}")));
    assert_eq!(parse_status(&resp), 401);
    assert_eq!(idp.hits(), 0);
    assert!(server.gateway.cache().is_empty());
}

#[test]
fn test_expired_token_is_terminal() {
    let idp = MockEndpoint::introspection(r#"{"active":true,"sub":"mallory"}"#);
    let keys = MockEndpoint::key_set(&oct_key_set(SECRET, KID));
    let server = start(&idp, &keys, "local_then_remote");
    let mut c = claims();
    c["exp"] = json!(now() - 120);
    let token = make_hs256_jwt(SECRET, KID, &c);

    let resp = validate(&server.addr(), Some(&format!("Bearer {token}")));
    assert_eq!(parse_status(&resp), 401);
    assert_eq!(idp.hits(), 0);
}

#[test]
fn test_opaque_token_falls_back_to_introspection() {
    let idp = MockEndpoint::introspection(r#"{"active":true,"sub":"svc","scope":"read"}"#);
    let keys = MockEndpoint::key_set(&oct_key_set(SECRET, KID));
    let server = start(&idp, &keys, "local_then_remote");

    let resp = validate(&server.addr(), Some(&format!("Bearer {}", opaque(160))));
    assert_eq!(parse_status(&resp), 204);
    assert_eq!(idp.hits(), 1);
    assert_eq!(keys.hits(), 0);
}

#[test]
fn test_unavailable_key_set_falls_back_to_introspection() {
    let idp = MockEndpoint::introspection(r#"{"active":true,"sub":"alice@example.com"}"#);
    let keys = MockEndpoint::start(
        "/oauth2/default/v1/keys",
        503,
        r#"{"error":"unavailable"}"#,
        Duration::ZERO,
    );
    let server = start(&idp, &keys, "local_then_remote");
    let token = make_hs256_jwt(SECRET, KID, &claims());

    let resp = validate(&server.addr(), Some(&format!("Bearer {token}")));
    assert_eq!(parse_status(&resp), 204);
    assert_eq!(keys.hits(), 1);
    assert_eq!(idp.hits(), 1);
}

#[test]
fn test_local_only_strategy_rejects_opaque_tokens() {
    let idp = MockEndpoint::introspection(r#"{"active":true,"sub":"svc"}"#);
    let keys = MockEndpoint::key_set(&oct_key_set(SECRET, KID));
    let server = start(&idp, &keys, "local");

    let resp = validate(&server.addr(), Some(&format!("Bearer {}", opaque(160))));
    assert_eq!(parse_status(&resp), 401);
    assert_eq!(idp.hits(), 0);
}
