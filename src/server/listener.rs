use std::net::SocketAddr;
use std::sync::Arc;

use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_rustls::rustls::server::Acceptor;
use tokio_rustls::LazyConfigAcceptor;
use tracing::{debug, error, info, Instrument};

use super::handler::RequestHandler;
use super::Result;
use crate::tls::{CertificateStore, ClientCertificateInfo};

/// HTTP 또는 HTTPS 포트 하나를 담당하는 리스너
pub struct ProxyListener {
    listener: TcpListener,
    handler: Arc<RequestHandler>,
    certificates: Option<Arc<CertificateStore>>,
}

impl ProxyListener {
    /// 포트를 바인딩합니다. HTTPS 리스너는 인증서 저장소가 있어야 합니다.
    pub async fn bind(
        port: u16,
        handler: Arc<RequestHandler>,
        certificates: Option<CertificateStore>,
    ) -> Result<Self> {
        let scheme = handler.scheme();
        let listener = TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port)))
            .await
            .map_err(|e| {
                error!(error = %e, %scheme, port, "포트 바인딩 실패");
                e
            })?;

        let port = listener.local_addr()?.port();
        info!("{} listener on port {}", scheme.to_string().to_uppercase(), port);

        Ok(Self {
            listener,
            handler,
            certificates: certificates.map(Arc::new),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// 수락 루프를 백그라운드 태스크로 실행합니다.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) {
        let scheme = self.handler.scheme();
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let _ = stream.set_nodelay(true);
                    let handler = self.handler.clone();
                    let span = tracing::debug_span!("connection", %scheme, %peer);
                    match &self.certificates {
                        Some(store) => {
                            let store = store.clone();
                            tokio::spawn(accept_tls(stream, store, handler).instrument(span));
                        }
                        None => {
                            tokio::spawn(handler.handle_connection(TokioIo::new(stream), None).instrument(span));
                        }
                    }
                }
                Err(e) => {
                    error!(error = %e, %scheme, "연결 수락 실패");
                }
            }
        }
    }
}

/// SNI를 읽어 인증서를 고른 뒤 핸드셰이크를 마치고 연결을 처리합니다.
async fn accept_tls(stream: TcpStream, store: Arc<CertificateStore>, handler: Arc<RequestHandler>) {
    let start = match LazyConfigAcceptor::new(Acceptor::default(), stream).await {
        Ok(start) => start,
        Err(e) => {
            debug!(error = %e, "TLS ClientHello 수신 실패");
            return;
        }
    };

    let server_name = start.client_hello().server_name().map(str::to_owned);
    let Some(config) = store.select(server_name.as_deref()) else {
        debug!(sni = ?server_name, "일치하는 인증서 없음, 핸드셰이크 중단");
        return;
    };

    let tls = match start.into_stream(config).await {
        Ok(tls) => tls,
        Err(e) => {
            debug!(error = %e, sni = ?server_name, "TLS 핸드셰이크 실패");
            return;
        }
    };

    let client_cert = tls
        .get_ref()
        .1
        .peer_certificates()
        .and_then(|chain| chain.first())
        .map(|cert| Arc::new(ClientCertificateInfo::from_der(&cert.0)));

    if let Some(cert) = &client_cert {
        debug!(fingerprint = %cert.fingerprint_sha256, "클라이언트 인증서 확인");
    }

    handler.handle_connection(TokioIo::new(tls), client_cert).await;
}
