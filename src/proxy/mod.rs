//! 백엔드 전달 클라이언트와 요청 헤더 처리.

mod error;
mod headers;

use std::time::Duration;

use http_body_util::combinators::BoxBody;
use bytes::Bytes;
use hyper::body::Incoming;
use hyper::{Request, Response, Uri, Version};
use hyper_util::client::legacy;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use tracing::debug;

use crate::settings::ProxySettings;

pub use error::{empty, error_response, full, ProxyError};
pub use headers::{is_upgrade_request, remove_hop_by_hop, sanitize_headers, CLIENT_CERT_HEADER_PREFIX};

/// 클라이언트에게 돌려주는 응답 본문. 백엔드 본문은 버퍼링 없이 그대로 흘려보냅니다.
pub type ProxyBody = BoxBody<Bytes, hyper::Error>;

/// 백엔드로 요청을 전달하는 공유 클라이언트
#[derive(Clone)]
pub struct ProxyClient {
    client: legacy::Client<HttpConnector, Incoming>,
    upstream_timeout: Option<Duration>,
}

impl ProxyClient {
    pub fn new(settings: &ProxySettings) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_nodelay(true);
        let client = legacy::Client::builder(TokioExecutor::new())
            .build::<_, Incoming>(connector);

        let upstream_timeout = match settings.upstream_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };

        Self { client, upstream_timeout }
    }

    /// 요청 URI를 `target`으로 바꿔 백엔드에 보냅니다.
    ///
    /// Host 헤더를 포함한 나머지 헤더와 본문은 그대로 전달되고, 홉 단위 헤더만 제거됩니다.
    pub async fn forward(&self, mut req: Request<Incoming>, target: &str) -> Result<Response<Incoming>, ProxyError> {
        let uri: Uri = target.parse().map_err(|e: hyper::http::uri::InvalidUri| ProxyError::InvalidTarget {
            target: target.to_string(),
            reason: e.to_string(),
        })?;

        *req.uri_mut() = uri;
        *req.version_mut() = Version::HTTP_11;
        remove_hop_by_hop(req.headers_mut());

        let request = self.client.request(req);
        let result = match self.upstream_timeout {
            Some(timeout) => tokio::time::timeout(timeout, request)
                .await
                .map_err(|_| ProxyError::UpstreamTimeout {
                    target: target.to_string(),
                    timeout,
                })?,
            None => request.await,
        };

        result.map_err(|e| {
            debug!(error = ?e, connect = e.is_connect(), "백엔드 요청 실패");
            ProxyError::UpstreamConnect {
                target: target.to_string(),
                reason: describe(&e),
            }
        })
    }
}

/// legacy 클라이언트 에러는 원인 체인에 실제 사유가 들어 있습니다.
fn describe(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
