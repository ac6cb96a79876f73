mod common;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use common::spawn_echo_backend;
use dockprox::mapping::SharedRoutingTable;
use dockprox::proxy::ProxyClient;
use dockprox::routing::{RoutingRule, RoutingTable};
use dockprox::server::{ProxyListener, RequestHandler, Scheme};
use dockprox::settings::ProxySettings;
use dockprox::tls::{CertificateLoadError, CertificateStore, ClientAuth};
use http_body_util::{BodyExt, Empty};
use hyper::body::Bytes;
use hyper::Request;
use hyper_util::rt::TokioIo;
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair,
};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_rustls::rustls::{self, ClientConfig, RootCertStore, ServerName};
use tokio_rustls::TlsConnector;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

struct Ca {
    cert: Certificate,
    key: KeyPair,
}

fn ca() -> Ca {
    let key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.distinguished_name.push(DnType::CommonName, "dockprox test ca");
    let cert = params.self_signed(&key).unwrap();
    Ca { cert, key }
}

fn leaf(ca: &Ca, names: &[&str], common_name: &str, usage: ExtendedKeyUsagePurpose) -> (Certificate, KeyPair) {
    let key = KeyPair::generate().unwrap();
    let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
    let mut params = CertificateParams::new(names).unwrap();
    params.distinguished_name.push(DnType::CommonName, common_name);
    params.extended_key_usages = vec![usage];
    let cert = params.signed_by(&key, &ca.cert, &ca.key).unwrap();
    (cert, key)
}

fn write_domain(live: &Path, domain: &str, cert: &Certificate, key: &KeyPair) {
    let dir = live.join(domain);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("fullchain.pem"), cert.pem()).unwrap();
    std::fs::write(dir.join("privkey.pem"), key.serialize_pem()).unwrap();
}

/// 인증서 디렉터리 구성: a.test, b.test 도메인과 CA 파일
struct Fixture {
    ca: Ca,
    b_cert: Certificate,
    dir: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Self {
        let ca = ca();
        let dir = tempfile::tempdir().unwrap();
        let live = dir.path().join("live");

        let (a_cert, a_key) = leaf(&ca, &["a.test", "*.a.test"], "a.test", ExtendedKeyUsagePurpose::ServerAuth);
        let (b_cert, b_key) = leaf(&ca, &["b.test"], "b.test", ExtendedKeyUsagePurpose::ServerAuth);
        write_domain(&live, "a.test", &a_cert, &a_key);
        write_domain(&live, "b.test", &b_cert, &b_key);
        std::fs::write(dir.path().join("ca.pem"), ca.cert.pem()).unwrap();

        Self { ca, b_cert, dir }
    }

    fn live(&self) -> std::path::PathBuf {
        self.dir.path().join("live")
    }

    fn ca_path(&self) -> std::path::PathBuf {
        self.dir.path().join("ca.pem")
    }

    fn store(&self, client_auth: ClientAuth) -> CertificateStore {
        let ca_path = self.ca_path();
        CertificateStore::from_directory(&self.live(), None, Some(ca_path.as_path()), client_auth).unwrap()
    }
}

async fn start_https_proxy(rules: Vec<RoutingRule>, store: CertificateStore) -> SocketAddr {
    let table: SharedRoutingTable = Arc::new(ArcSwap::from_pointee(RoutingTable::new(rules)));
    let handler = Arc::new(RequestHandler::new(
        table,
        ProxyClient::new(&ProxySettings::default()),
        Scheme::Https,
        None,
    ));
    let listener = ProxyListener::bind(0, handler, Some(store)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    listener.spawn();
    SocketAddr::from(([127, 0, 0, 1], port))
}

fn connector(ca: &Ca, client: Option<(&Certificate, &KeyPair)>) -> TlsConnector {
    let mut roots = RootCertStore::empty();
    roots.add(&rustls::Certificate(ca.cert.der().to_vec())).unwrap();
    let builder = ClientConfig::builder().with_safe_defaults().with_root_certificates(roots);

    let config = match client {
        Some((cert, key)) => builder
            .with_client_auth_cert(
                vec![rustls::Certificate(cert.der().to_vec())],
                rustls::PrivateKey(key.serialize_der()),
            )
            .unwrap(),
        None => builder.with_no_client_auth(),
    };
    TlsConnector::from(Arc::new(config))
}

async fn request(
    proxy: SocketAddr,
    connector: &TlsConnector,
    server_name: &str,
) -> Result<(Vec<rustls::Certificate>, Value), BoxError> {
    let stream = TcpStream::connect(proxy).await?;
    let tls = connector
        .connect(ServerName::try_from(server_name)?, stream)
        .await?;
    let peer = tls.get_ref().1.peer_certificates().map(|c| c.to_vec()).unwrap_or_default();

    let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(tls)).await?;
    tokio::spawn(connection);

    let req = Request::builder()
        .uri("/whoami")
        .header("host", server_name)
        .header("tcc-subject-cn", "mallory")
        .body(Empty::<Bytes>::new())?;
    let response = sender.send_request(req).await?;
    let body = response.into_body().collect().await?.to_bytes();
    Ok((peer, serde_json::from_slice(&body)?))
}

#[test]
fn test_directory_store_selects_by_server_name() {
    let fixture = Fixture::new();
    let store = fixture.store(ClientAuth::None);

    match &store {
        CertificateStore::Sni(table) => {
            let mut domains: Vec<_> = table.domains().collect();
            domains.sort();
            assert_eq!(domains, vec!["a.test", "b.test"]);
        }
        CertificateStore::Static(_) => panic!("디렉터리 설정은 SNI 저장소여야 함"),
    }

    assert!(store.select(Some("a.test")).is_some());
    assert!(store.select(Some("www.a.test")).is_some());
    assert!(store.select(Some("c.test")).is_none());
    assert!(store.select(None).is_none());
}

#[test]
fn test_empty_directory_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let result = CertificateStore::from_directory(dir.path(), None, None, ClientAuth::None);
    assert!(matches!(result, Err(CertificateLoadError::EmptyDirectory { .. })));
}

#[test]
fn test_client_auth_requires_ca() {
    let fixture = Fixture::new();
    let result = CertificateStore::from_directory(&fixture.live(), None, None, ClientAuth::Required);
    assert!(result.is_err());
}

#[tokio::test]
async fn test_handshake_presents_certificate_for_sni_name() {
    let fixture = Fixture::new();
    let backend = spawn_echo_backend().await;
    let rules = vec![RoutingRule::new("b.test", "127.0.0.1", backend.port(), "/", true)];
    let proxy = start_https_proxy(rules, fixture.store(ClientAuth::None)).await;

    let (peer, body) = request(proxy, &connector(&fixture.ca, None), "b.test").await.unwrap();

    assert_eq!(peer[0].0, fixture.b_cert.der().to_vec());
    assert_eq!(body["uri"], "/whoami");
    let headers = body["headers"].as_object().unwrap();
    assert!(!headers.keys().any(|k| k.starts_with("tcc-")));
}

#[tokio::test]
async fn test_unknown_server_name_fails_handshake() {
    let fixture = Fixture::new();
    let proxy = start_https_proxy(vec![], fixture.store(ClientAuth::None)).await;

    let result = request(proxy, &connector(&fixture.ca, None), "c.test").await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_verified_client_certificate_is_forwarded_as_headers() {
    let fixture = Fixture::new();
    let backend = spawn_echo_backend().await;
    let rules = vec![RoutingRule::new("b.test", "127.0.0.1", backend.port(), "/", true)];
    let proxy = start_https_proxy(rules, fixture.store(ClientAuth::Required)).await;

    let (client_cert, client_key) = leaf(&fixture.ca, &[], "alice", ExtendedKeyUsagePurpose::ClientAuth);
    let connector = connector(&fixture.ca, Some((&client_cert, &client_key)));

    let (_, body) = request(proxy, &connector, "b.test").await.unwrap();
    let headers = &body["headers"];

    assert_eq!(headers["tcc-subject-cn"], "alice");
    let fingerprint = headers["tcc-fingerprint-sha256"].as_str().unwrap();
    assert_eq!(fingerprint.split(':').count(), 32);
    assert!(headers["tcc-fingerprint-sha1"].is_string());
    assert!(headers["tcc-serial-number"].is_string());
}

#[tokio::test]
async fn test_required_client_certificate_rejects_anonymous_client() {
    let fixture = Fixture::new();
    let backend = spawn_echo_backend().await;
    let rules = vec![RoutingRule::new("b.test", "127.0.0.1", backend.port(), "/", true)];
    let proxy = start_https_proxy(rules, fixture.store(ClientAuth::Required)).await;

    let result = request(proxy, &connector(&fixture.ca, None), "b.test").await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_optional_client_certificate_allows_anonymous_client() {
    let fixture = Fixture::new();
    let backend = spawn_echo_backend().await;
    let rules = vec![RoutingRule::new("b.test", "127.0.0.1", backend.port(), "/", true)];
    let proxy = start_https_proxy(rules, fixture.store(ClientAuth::Optional)).await;

    let (_, body) = request(proxy, &connector(&fixture.ca, None), "b.test").await.unwrap();
    assert!(body["headers"].get("tcc-subject-cn").is_none());
}
