use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::client::conn::http1;
use hyper::upgrade::Upgraded;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, error, Instrument};

use super::error::{is_hyper_reset, is_transport_reset};
use crate::proxy::{empty, ProxyBody, ProxyError};
use crate::routing::RoutingRule;

/// 업그레이드 요청을 백엔드에 그대로 재전송하고, 101 응답을 받으면 양방향 터널을 엽니다.
///
/// 백엔드가 업그레이드를 거부하면 그 응답을 클라이언트에 그대로 돌려줍니다.
pub async fn proxy_upgrade(
    mut req: Request<Incoming>,
    rule: &RoutingRule,
    target: &str,
) -> Result<Response<ProxyBody>, ProxyError> {
    let upgrade_error = |reason: String| ProxyError::Upgrade {
        target: target.to_string(),
        reason,
    };

    let address = format!("{}:{}", rule.back.host, rule.back.port);
    let stream = TcpStream::connect(&address).await.map_err(|e| ProxyError::UpstreamConnect {
        target: target.to_string(),
        reason: e.to_string(),
    })?;
    let _ = stream.set_nodelay(true);

    let (mut sender, connection) = http1::handshake(TokioIo::new(stream))
        .await
        .map_err(|e| upgrade_error(e.to_string()))?;
    tokio::spawn(
        async move {
            if let Err(e) = connection.with_upgrades().await {
                debug!(error = %e, "백엔드 업그레이드 연결 종료");
            }
        }
        .in_current_span(),
    );

    let client_upgrade = hyper::upgrade::on(&mut req);

    let (mut parts, body) = req.into_parts();
    parts.uri = target
        .parse::<hyper::Uri>()
        .ok()
        .and_then(|uri| uri.path_and_query().cloned())
        .map(hyper::Uri::from)
        .ok_or_else(|| upgrade_error(format!("invalid target {}", target)))?;
    let backend_req = Request::from_parts(parts, body);

    let mut response = sender
        .send_request(backend_req)
        .await
        .map_err(|e| upgrade_error(e.to_string()))?;

    if response.status() != StatusCode::SWITCHING_PROTOCOLS {
        debug!(status = %response.status(), "백엔드가 업그레이드를 거부함");
        return Ok(response.map(BodyExt::boxed));
    }

    let backend_upgrade = hyper::upgrade::on(&mut response);
    tokio::spawn(
        async move {
            match tokio::try_join!(client_upgrade, backend_upgrade) {
                Ok((client, backend)) => tunnel(client, backend).await,
                Err(e) if is_hyper_reset(&e) => debug!(error = %e, "업그레이드 전에 연결이 끊김"),
                Err(e) => error!(error = %e, "업그레이드 실패"),
            }
        }
        .in_current_span(),
    );

    let (parts, _) = response.into_parts();
    Ok(Response::from_parts(parts, empty()))
}

/// 두 소켓 사이에서 바이트를 복사합니다. 한쪽이 끝나면 양쪽을 모두 닫습니다.
async fn tunnel(client: Upgraded, backend: Upgraded) {
    let (mut client_read, mut client_write) = tokio::io::split(TokioIo::new(client));
    let (mut backend_read, mut backend_write) = tokio::io::split(TokioIo::new(backend));

    let result = tokio::select! {
        r = pipe(&mut client_read, &mut backend_write) => r.map(|n| ("client", n)),
        r = pipe(&mut backend_read, &mut client_write) => r.map(|n| ("backend", n)),
    };

    match result {
        Ok((closed_by, bytes)) => debug!(closed_by, bytes, "터널 종료"),
        Err(e) if is_transport_reset(&e) => debug!(error = %e, "터널 연결 리셋"),
        Err(e) => error!(error = %e, "터널 I/O 에러"),
    }
}

async fn pipe<R, W>(reader: &mut ReadHalf<R>, writer: &mut WriteHalf<W>) -> std::io::Result<u64>
where
    R: tokio::io::AsyncRead + tokio::io::AsyncWrite,
    W: tokio::io::AsyncRead + tokio::io::AsyncWrite,
{
    let bytes = tokio::io::copy(reader, writer).await?;
    writer.shutdown().await?;
    Ok(bytes)
}
