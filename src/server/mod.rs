//! HTTP/HTTPS 리스너와 요청 처리.

pub mod error;
pub mod handler;
pub mod listener;
mod upgrade;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

pub use error::Error;
pub use handler::{RequestHandler, Scheme};
pub use listener::ProxyListener;

use crate::mapping::SharedRoutingTable;
use crate::proxy::ProxyClient;
use crate::settings::Settings;
use crate::tls::CertificateStore;

pub type Result<T> = std::result::Result<T, Error>;

/// 리스너 시작 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Stopped,
    Starting,
    Listening,
}

/// 설정에 따라 HTTP/HTTPS 리스너를 띄우고 수명을 관리합니다.
pub struct ProxyServer {
    settings: Settings,
    table: SharedRoutingTable,
    client: ProxyClient,
    http_state: ListenerState,
    https_state: ListenerState,
    addresses: Vec<(Scheme, SocketAddr)>,
    tasks: Vec<JoinHandle<()>>,
}

impl ProxyServer {
    pub fn new(settings: Settings, table: SharedRoutingTable) -> Self {
        let client = ProxyClient::new(&settings.proxy);
        Self {
            settings,
            table,
            client,
            http_state: ListenerState::Stopped,
            https_state: ListenerState::Stopped,
            addresses: Vec::new(),
            tasks: Vec::new(),
        }
    }

    pub fn state(&self, scheme: Scheme) -> ListenerState {
        match scheme {
            Scheme::Http => self.http_state,
            Scheme::Https => self.https_state,
        }
    }

    /// 실제로 바인딩된 주소 목록
    pub fn local_addrs(&self) -> &[(Scheme, SocketAddr)] {
        &self.addresses
    }

    /// 활성화된 리스너를 시작합니다.
    ///
    /// 인증서를 읽지 못한 HTTPS 리스너는 시작하지 않고 HTTP 리스너만 띄웁니다.
    /// 포트 바인딩 실패는 에러로 반환됩니다.
    pub async fn start(&mut self) -> Result<()> {
        let https = &self.settings.https;
        let certificates = if https.enabled {
            self.https_state = ListenerState::Starting;
            debug!(port = https.port, "HTTPS 인증서 로드 중");
            match CertificateStore::build(https) {
                Ok(store) => Some(store),
                Err(e) => {
                    error!(error = %e, "인증서 로드 실패, HTTPS 리스너를 시작하지 않음");
                    self.https_state = ListenerState::Stopped;
                    None
                }
            }
        } else {
            None
        };

        let http_enabled = self.settings.http.enabled;
        let http_port = self.settings.http.port;
        let https_port = self.settings.https.port;

        if http_enabled {
            self.http_state = ListenerState::Starting;
            let redirect_port = certificates.as_ref().map(|_| https_port);
            let port = self.start_listener(Scheme::Http, http_port, redirect_port, None).await?;
            self.http_state = ListenerState::Listening;
            debug!(port, "HTTP 리스너 준비 완료");
        }

        if let Some(store) = certificates {
            let redirect_port = http_enabled.then_some(http_port);
            let port = self.start_listener(Scheme::Https, https_port, redirect_port, Some(store)).await?;
            self.https_state = ListenerState::Listening;
            debug!(port, "HTTPS 리스너 준비 완료");
        }

        if self.tasks.is_empty() {
            info!("활성화된 리스너가 없습니다");
        }
        Ok(())
    }

    async fn start_listener(
        &mut self,
        scheme: Scheme,
        port: u16,
        redirect_port: Option<u16>,
        certificates: Option<CertificateStore>,
    ) -> Result<u16> {
        let handler = Arc::new(RequestHandler::new(
            self.table.clone(),
            self.client.clone(),
            scheme,
            redirect_port,
        ));
        let listener = ProxyListener::bind(port, handler, certificates).await?;
        let address = listener.local_addr()?;
        self.addresses.push((scheme, address));
        self.tasks.push(listener.spawn());
        Ok(address.port())
    }

    /// 모든 수락 루프를 멈춥니다. 진행 중인 연결 태스크는 각자 끝날 때까지 유지됩니다.
    pub fn shutdown(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.http_state = ListenerState::Stopped;
        self.https_state = ListenerState::Stopped;
        info!("리스너 종료");
    }
}
