use super::request::{parse_request, ParsedRequest};
use super::response::{write_json, write_no_content, write_text, HeaderSlot};
use crate::profile::BASIC_PROFILE_HEADER;
use crate::security::{validate_request, RequestGate, TokenValidationGateway, ValidationOutcome};
use may_minihttp::{HttpService, Request, Response};
use serde_json::json;
use std::io;
use std::sync::Arc;
use tracing::{error, info};

pub const INVALID_BODY: &str = "Invalid Token";
pub const FORBIDDEN_BODY: &str = "Forbidden";

/// The inbound HTTP surface: `POST /validate` and `GET /health`.
#[derive(Clone)]
pub struct GatewayService {
    pub gate: RequestGate,
    pub gateway: Arc<TokenValidationGateway>,
    profile_header: HeaderSlot,
}

impl GatewayService {
    #[must_use]
    pub fn new(gateway: Arc<TokenValidationGateway>) -> Self {
        Self {
            gate: RequestGate,
            gateway,
            profile_header: HeaderSlot::default(),
        }
    }
}

/// Basic health check endpoint returning `{ "status": "ok" }`.
pub fn health_endpoint(res: &mut Response) -> io::Result<()> {
    write_json(res, 200, &json!({ "status": "ok" }));
    Ok(())
}

/// `POST /validate`
///
/// - `204` + `X-Basic-Profile` for an active token (no body)
/// - `403 Invalid Token` for an inactive one
/// - `401 Forbidden` for anything the gate or the gateway rejected
pub fn validate_endpoint(
    res: &mut Response,
    service: &mut GatewayService,
    req: &ParsedRequest,
) -> io::Result<()> {
    let outcome = validate_request(&service.gate, &service.gateway, req.header("authorization"));
    match outcome {
        ValidationOutcome::Valid(profile) => match profile.to_header_value() {
            Ok(value) => {
                service
                    .profile_header
                    .write(res, BASIC_PROFILE_HEADER, &value);
                write_no_content(res);
            }
            Err(e) => {
                error!(error = %e, "failed to encode basic profile header");
                write_text(res, 401, FORBIDDEN_BODY);
            }
        },
        ValidationOutcome::Invalid => write_text(res, 403, INVALID_BODY),
        ValidationOutcome::Forbidden => write_text(res, 401, FORBIDDEN_BODY),
    }
    Ok(())
}

impl HttpService for GatewayService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let parsed = parse_request(req);

        match (parsed.method.as_str(), parsed.path.as_str()) {
            ("POST", "/validate") => validate_endpoint(res, self, &parsed),
            ("GET", "/health") => health_endpoint(res),
            (_, "/validate") | (_, "/health") => {
                write_json(
                    res,
                    405,
                    &json!({"error": "Method Not Allowed", "method": parsed.method, "path": parsed.path}),
                );
                Ok(())
            }
            _ => {
                info!(method = %parsed.method, path = %parsed.path, "no route");
                write_json(
                    res,
                    404,
                    &json!({"error": "Not Found", "method": parsed.method, "path": parsed.path}),
                );
                Ok(())
            }
        }
    }
}
