use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{header, Request, Response, StatusCode};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::error::is_hyper_reset;
use super::upgrade;
use crate::logging::{log_request, RequestLog};
use crate::mapping::SharedRoutingTable;
use crate::proxy::{
    empty, error_response, is_upgrade_request, sanitize_headers, ProxyBody, ProxyClient, ProxyError,
};
use crate::routing::HostInfo;
use crate::tls::ClientCertificateInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn is_secure(self) -> bool {
        self == Scheme::Https
    }

    pub fn opposite(self) -> Self {
        match self {
            Scheme::Http => Scheme::Https,
            Scheme::Https => Scheme::Http,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Http => write!(f, "http"),
            Scheme::Https => write!(f, "https"),
        }
    }
}

/// 리스너 하나가 공유하는 요청 처리기
pub struct RequestHandler {
    table: SharedRoutingTable,
    client: ProxyClient,
    scheme: Scheme,
    /// 반대편 리스너 포트. 반대편 리스너가 꺼져 있으면 리다이렉트하지 않습니다.
    redirect_port: Option<u16>,
}

impl RequestHandler {
    pub fn new(table: SharedRoutingTable, client: ProxyClient, scheme: Scheme, redirect_port: Option<u16>) -> Self {
        Self {
            table,
            client,
            scheme,
            redirect_port,
        }
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// 연결 하나를 HTTP/1.1로 처리합니다. 업그레이드 요청을 위해 연결 업그레이드를 허용합니다.
    pub async fn handle_connection<I>(self: Arc<Self>, io: I, client_cert: Option<Arc<ClientCertificateInfo>>)
    where
        I: hyper::rt::Read + hyper::rt::Write + Send + Unpin + 'static,
    {
        let handler = self.clone();
        let service = service_fn(move |req| {
            let handler = handler.clone();
            let client_cert = client_cert.clone();
            async move { handler.handle_request(req, client_cert).await }
        });

        if let Err(e) = http1::Builder::new()
            .serve_connection(io, service)
            .with_upgrades()
            .await
        {
            if is_hyper_reset(&e) {
                debug!(error = %e, scheme = %self.scheme, "클라이언트 연결 리셋");
            } else {
                warn!(error = %e, scheme = %self.scheme, "연결 처리 실패");
            }
        }
    }

    pub async fn handle_request(
        &self,
        req: Request<Incoming>,
        client_cert: Option<Arc<ClientCertificateInfo>>,
    ) -> Result<Response<ProxyBody>, Infallible> {
        let request_id = Uuid::new_v4().to_string();
        let span = info_span!("request", request_id = %request_id);

        async move {
            let url = self.request_url(&req);
            let mut log = RequestLog::new(request_id, req.method(), url);

            let response = match self.dispatch(req, client_cert, &mut log).await {
                Ok(response) => response,
                Err(e) => {
                    log.with_error(&e);
                    error_response(&e)
                }
            };

            log.with_response(response.status());
            log_request(&log);
            Ok(response)
        }
        .instrument(span)
        .await
    }

    async fn dispatch(
        &self,
        mut req: Request<Incoming>,
        client_cert: Option<Arc<ClientCertificateInfo>>,
        log: &mut RequestLog,
    ) -> Result<Response<ProxyBody>, ProxyError> {
        let host = HostInfo::from_request(&req)?;
        let rule = {
            let table = self.table.load();
            table.route(&host)?.clone()
        };

        let path_and_query = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());
        let upgrade = is_upgrade_request(req.headers());

        if !upgrade {
            if let Some(port) = self.redirect_port.filter(|_| rule.secure != self.scheme.is_secure()) {
                let location = format!("{}://{}:{}{}", self.scheme.opposite(), host.name, port, path_and_query);
                info!("{} {} >> {}", req.method(), log.url, location);
                log.with_target(location.as_str());
                return Ok(redirect(&location));
            }
        }

        let target = rule.target_url(&path_and_query);
        info!("{} {} -> {}", req.method(), log.url, target);
        log.with_target(target.as_str());

        sanitize_headers(req.headers_mut(), client_cert.as_deref());

        if upgrade {
            return upgrade::proxy_upgrade(req, &rule, &target).await;
        }

        let response = self.client.forward(req, &target).await?;
        Ok(response.map(BodyExt::boxed))
    }

    /// 로그에 남길 `scheme://host/path` 형태의 요청 URL
    fn request_url<B>(&self, req: &Request<B>) -> String {
        let host = req
            .headers()
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .or_else(|| req.uri().authority().map(|a| a.as_str()))
            .unwrap_or("");
        let path = req.uri().path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        format!("{}://{}{}", self.scheme, host, path)
    }
}

fn redirect(location: &str) -> Response<ProxyBody> {
    let mut response = Response::new(empty());
    *response.status_mut() = StatusCode::PERMANENT_REDIRECT;
    match header::HeaderValue::from_str(location) {
        Ok(value) => {
            response.headers_mut().insert(header::LOCATION, value);
        }
        Err(e) => {
            warn!(error = %e, location, "리다이렉트 위치를 헤더로 만들 수 없음");
            *response.status_mut() = StatusCode::BAD_REQUEST;
        }
    }
    response
}
