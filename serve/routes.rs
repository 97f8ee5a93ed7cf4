use std::io::Cursor;
use std::sync::Arc;

use serde::Serialize;
use tiny_http::{Header, Method, Request, Response, StatusCode};
use tracing::{debug, warn};

use ferrite_digits::{ConvNet, GatewayResponse, SharedGateway};

use crate::form::{parse_query, query_get};

pub type Gateway = Arc<SharedGateway<ConvNet>>;

#[derive(Serialize)]
struct Health {
    status: &'static str,
    epoch: usize,
    accuracy: f64,
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

pub fn json_response<T: Serialize>(status: u16, body: &T) -> Response<Cursor<Vec<u8>>> {
    let (status, bytes) = match serde_json::to_vec(body) {
        Ok(bytes) => (status, bytes),
        Err(e) => {
            warn!(error = %e, "Failed to serialize response");
            (500, br#"{"status":"error"}"#.to_vec())
        }
    };
    let len = bytes.len();
    let headers = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
        .into_iter()
        .collect();
    Response::new(StatusCode(status), headers, Cursor::new(bytes), Some(len), None)
}

pub fn not_found() -> Response<Cursor<Vec<u8>>> {
    json_response(404, &serde_json::json!({ "status": "not_found" }))
}

// ---------------------------------------------------------------------------
// Request dispatcher
// ---------------------------------------------------------------------------

/// Answers one request and sends the response.
pub fn dispatch(request: Request, gateway: Gateway) {
    let method = request.method().clone();
    let url    = request.url().to_owned();

    let (path, query) = match url.split_once('?') {
        Some((path, query)) => (path, query),
        None => (url.as_str(), ""),
    };
    debug!(%method, path, "Request");

    let response = match (method, path) {
        (Method::Get, "/predict") => {
            let pairs = parse_query(query);
            let input = query_get(&pairs, "input").unwrap_or("");
            let answer = gateway.handle_request(input);
            let status = match answer {
                GatewayResponse::InvalidInput { .. } => 422,
                _ => 200,
            };
            json_response(status, &answer)
        }

        (Method::Get, "/health") => {
            let info = gateway.checkpoint();
            json_response(200, &Health { status: "ok", epoch: info.epoch, accuracy: info.accuracy })
        }

        _ => not_found(),
    };

    if let Err(e) = request.respond(response) {
        warn!(error = %e, "Failed to send response");
    }
}
