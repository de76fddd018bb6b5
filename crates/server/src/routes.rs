//! Transport-independent request routing shared by both services.

use serde::Serialize;
use tiny_http::Method;

use visionx_core::shared::error::VisionError;
use visionx_core::shared::frame::Frame;
use visionx_core::shared::image_codec::decode_data_uri;

use crate::payloads::{ErrorResponse, HealthResponse, ImageRequest};

pub const CORS_HEADERS: [(&str, &str); 3] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Headers", "Content-Type"),
    ("Access-Control-Allow-Methods", "GET,PUT,POST,DELETE,OPTIONS"),
];

pub enum ReplyBody<'a> {
    Empty,
    Json(String),
    /// Unbounded body written part by part.
    Stream {
        content_type: String,
        parts: Box<dyn Iterator<Item = Vec<u8>> + 'a>,
    },
}

pub struct Reply<'a> {
    pub status: u16,
    pub body: ReplyBody<'a>,
}

impl<'a> Reply<'a> {
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            body: ReplyBody::Empty,
        }
    }

    pub fn json<T: Serialize>(status: u16, value: &T) -> Self {
        let body = serde_json::to_string(value).unwrap_or_else(|e| {
            log::warn!("Failed to serialise response: {e}");
            r#"{"success":false,"error":"internal error"}"#.to_string()
        });
        Self {
            status,
            body: ReplyBody::Json(body),
        }
    }

    pub fn stream(content_type: String, parts: Box<dyn Iterator<Item = Vec<u8>> + 'a>) -> Self {
        Self {
            status: 200,
            body: ReplyBody::Stream {
                content_type,
                parts,
            },
        }
    }

    #[cfg(test)]
    pub fn json_value(&self) -> serde_json::Value {
        match &self.body {
            ReplyBody::Json(body) => serde_json::from_str(body).unwrap(),
            _ => panic!("not a JSON reply"),
        }
    }
}

/// One HTTP service: its own routes on top of the shared ones.
pub trait Service: Send + Sync {
    fn name(&self) -> &'static str;

    /// `None` when the route is not served here.
    fn route<'a>(&'a self, method: &Method, path: &str, body: &[u8]) -> Option<Reply<'a>>;
}

/// CORS preflight, health check, then the service routes; 404 otherwise.
pub fn handle<'a>(service: &'a dyn Service, method: &Method, url: &str, body: &[u8]) -> Reply<'a> {
    let path = url.split('?').next().unwrap_or(url);
    if *method == Method::Options {
        return Reply::empty(204);
    }
    if *method == Method::Get && path == "/health" {
        return Reply::json(200, &HealthResponse { status: "ok" });
    }
    service
        .route(method, path, body)
        .unwrap_or_else(|| Reply::json(404, &ErrorResponse::new("Not found")))
}

/// Decodes the `{"image": "<data URI>"}` request body.
pub fn decode_image_request(body: &[u8]) -> Result<Frame, VisionError> {
    let request: ImageRequest = serde_json::from_slice(body)
        .map_err(|e| VisionError::Decode(format!("invalid JSON body: {e}")))?;
    let image = request
        .image
        .ok_or_else(|| VisionError::Decode("missing 'image' field".into()))?;
    decode_data_uri(&image)
}

/// `{success: false, error}` with status 200, as clients expect.
pub fn failure(context: &str, error: &VisionError) -> Reply<'static> {
    log::warn!("{context} failed: {error}");
    Reply::json(200, &ErrorResponse::new(error.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    struct EchoService;

    impl Service for EchoService {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn route<'a>(&'a self, method: &Method, path: &str, _body: &[u8]) -> Option<Reply<'a>> {
            match (method, path) {
                (Method::Get, "/api/echo") => Some(Reply::json(200, &HealthResponse { status: "echo" })),
                _ => None,
            }
        }
    }

    #[rstest]
    #[case(Method::Options, "/api/detect-faces")]
    #[case(Method::Options, "/anything")]
    fn test_preflight_answers_204(#[case] method: Method, #[case] url: &str) {
        let reply = handle(&EchoService, &method, url, b"");
        assert_eq!(reply.status, 204);
        assert!(matches!(reply.body, ReplyBody::Empty));
    }

    #[test]
    fn test_health() {
        let reply = handle(&EchoService, &Method::Get, "/health", b"");
        assert_eq!(reply.status, 200);
        assert_eq!(reply.json_value(), serde_json::json!({"status": "ok"}));
    }

    #[test]
    fn test_query_string_is_ignored() {
        let reply = handle(&EchoService, &Method::Get, "/api/echo?t=123", b"");
        assert_eq!(reply.json_value()["status"], "echo");
    }

    #[rstest]
    #[case(Method::Get, "/nope")]
    #[case(Method::Post, "/api/echo")]
    fn test_unknown_routes_answer_404(#[case] method: Method, #[case] url: &str) {
        let reply = handle(&EchoService, &method, url, b"");
        assert_eq!(reply.status, 404);
        assert_eq!(reply.json_value()["success"], false);
    }

    #[rstest]
    #[case(b"not json".as_slice())]
    #[case(br#"{}"#.as_slice())]
    #[case(br#"{"image": "no-comma-here"}"#.as_slice())]
    #[case(br#"{"image": "data:image/png;base64,@@@not base64@@@"}"#.as_slice())]
    #[case(br#"{"image": "data:image/png;base64,aGVsbG8="}"#.as_slice())]
    fn test_bad_requests_are_decode_errors(#[case] body: &[u8]) {
        assert!(matches!(decode_image_request(body), Err(VisionError::Decode(_))));
    }
}
