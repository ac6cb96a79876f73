use std::fmt;
use std::time::Duration;

use http_body_util::{BodyExt, Full};
use bytes::Bytes;
use hyper::{header, Response, StatusCode};
use serde_json::json;
use tracing::error;

use super::ProxyBody;
use crate::routing::RoutingError;

/// 백엔드 연결이 이루어지기 전 요청 단위에서 발생하는 에러입니다.
#[derive(Debug)]
pub enum ProxyError {
    Routing(RoutingError),
    InvalidTarget {
        target: String,
        reason: String,
    },
    UpstreamConnect {
        target: String,
        reason: String,
    },
    UpstreamTimeout {
        target: String,
        timeout: Duration,
    },
    Upgrade {
        target: String,
        reason: String,
    },
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Routing(RoutingError::MissingHost)
            | ProxyError::Routing(RoutingError::InvalidHost { .. }) => StatusCode::BAD_REQUEST,
            ProxyError::Routing(RoutingError::NoRoute { .. }) => StatusCode::BAD_GATEWAY,
            ProxyError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::InvalidTarget { .. }
            | ProxyError::UpstreamConnect { .. }
            | ProxyError::Upgrade { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyError::Routing(e) => write!(f, "{}", e),
            ProxyError::InvalidTarget { target, reason } =>
                write!(f, "Invalid backend URL {}: {}", target, reason),
            ProxyError::UpstreamConnect { target, reason } =>
                write!(f, "Backend request to {} failed: {}", target, reason),
            ProxyError::UpstreamTimeout { target, timeout } =>
                write!(f, "Backend {} did not respond within {} ms", target, timeout.as_millis()),
            ProxyError::Upgrade { target, reason } =>
                write!(f, "Upgrade to {} failed: {}", target, reason),
        }
    }
}

impl std::error::Error for ProxyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProxyError::Routing(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RoutingError> for ProxyError {
    fn from(err: RoutingError) -> Self {
        ProxyError::Routing(err)
    }
}

pub fn full(bytes: impl Into<Bytes>) -> ProxyBody {
    Full::new(bytes.into()).map_err(|never| match never {}).boxed()
}

pub fn empty() -> ProxyBody {
    full(Bytes::new())
}

/// `{"error":{"message": ...}}` 형식의 에러 응답
pub fn error_response(err: &ProxyError) -> Response<ProxyBody> {
    let body = json!({
        "error": {
            "message": err.to_string(),
        }
    });
    let body = serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.to_string());

    Response::builder()
        .status(err.status())
        .header(header::CONTENT_TYPE, "application/json")
        .body(full(body))
        .unwrap_or_else(|e| {
            error!(error = %e, "에러 응답 생성 실패");
            let mut response = Response::new(empty());
            *response.status_mut() = StatusCode::BAD_GATEWAY;
            response
        })
}
