#![allow(dead_code)]

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dockprox::discovery::{DiscoveryError, DiscoveryEvent, ServiceChange, ServiceDescriptor, ServiceDiscovery};
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// 목록과 이벤트를 테스트에서 직접 조작할 수 있는 탐색 어댑터
#[derive(Default)]
pub struct MockDiscovery {
    services: Mutex<Vec<ServiceDescriptor>>,
    /// 남은 실패 횟수
    failures: AtomicUsize,
    pub list_calls: AtomicUsize,
    sender: Mutex<Option<mpsc::Sender<DiscoveryEvent>>>,
}

impl MockDiscovery {
    pub fn new(services: Vec<ServiceDescriptor>) -> Arc<Self> {
        Arc::new(Self {
            services: Mutex::new(services),
            ..Default::default()
        })
    }

    pub fn set_services(&self, services: Vec<ServiceDescriptor>) {
        *self.services.lock().unwrap() = services;
    }

    pub fn fail_next(&self, times: usize) {
        self.failures.store(times, Ordering::SeqCst);
    }

    pub fn list_count(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub async fn emit(&self, action: &str) {
        let sender = self.sender.lock().unwrap().clone();
        if let Some(sender) = sender {
            let _ = sender
                .send(Ok(ServiceChange {
                    service_id: "mock".to_string(),
                    action: action.to_string(),
                }))
                .await;
        }
    }
}

#[async_trait]
impl ServiceDiscovery for MockDiscovery {
    async fn list_services(&self) -> Result<Vec<ServiceDescriptor>, DiscoveryError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(DiscoveryError::ListServices {
                source: bollard::errors::Error::DockerResponseServerError {
                    status_code: 500,
                    message: "daemon unavailable".to_string(),
                },
                context: "mock".to_string(),
            });
        }
        Ok(self.services.lock().unwrap().clone())
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<DiscoveryEvent>, DiscoveryError> {
        let (tx, rx) = mpsc::channel(64);
        *self.sender.lock().unwrap() = Some(tx);
        Ok(rx)
    }
}

pub fn service(name: &str, address: &str, labels: &[(&str, &str)]) -> ServiceDescriptor {
    ServiceDescriptor {
        id: format!("id-{}", name),
        name: format!("/{}", name),
        labels: labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>(),
        addresses: vec![address.to_string()],
        domain: None,
    }
}

/// 요청 정보를 JSON으로 돌려주는 백엔드를 띄웁니다.
pub async fn spawn_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else { return };
            tokio::spawn(async move {
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service_fn(echo))
                    .await;
            });
        }
    });

    addr
}

async fn echo(req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    let uri = req.uri().to_string();
    let method = req.method().to_string();
    let headers: HashMap<String, String> = req
        .headers()
        .iter()
        .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or("").to_string()))
        .collect();
    let body = req.into_body().collect().await.map(|b| b.to_bytes()).unwrap_or_default();

    let json = serde_json::json!({
        "uri": uri,
        "method": method,
        "headers": headers,
        "body": String::from_utf8_lossy(&body),
    });
    Ok(Response::builder()
        .header("x-backend", "echo")
        .body(Full::new(Bytes::from(json.to_string())))
        .unwrap())
}
