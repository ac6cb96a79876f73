use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls_pemfile::Item;
use tokio_rustls::rustls::server::{AllowAnyAnonymousOrAuthenticatedClient, AllowAnyAuthenticatedClient};
use tokio_rustls::rustls::{self, Certificate, PrivateKey, RootCertStore, ServerConfig};

use super::CertificateLoadError;

/// 클라이언트 인증서 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientAuth {
    /// 클라이언트 인증서를 요청하지 않음
    None,
    /// 요청하되 인증서 없는 접속도 허용. 제시된 인증서는 반드시 검증됨
    Optional,
    /// 검증된 인증서가 없으면 핸드셰이크 거부
    Required,
}

impl ClientAuth {
    pub fn from_flags(request_client_cert: bool, reject_unauthorized: bool) -> Self {
        match (request_client_cert, reject_unauthorized) {
            (false, _) => ClientAuth::None,
            (true, false) => ClientAuth::Optional,
            (true, true) => ClientAuth::Required,
        }
    }
}

fn open(path: &Path) -> Result<BufReader<File>, CertificateLoadError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|error| CertificateLoadError::Io {
            path: path.to_path_buf(),
            error,
        })
}

pub fn load_certs(path: &Path) -> Result<Vec<Certificate>, CertificateLoadError> {
    let certs = rustls_pemfile::certs(&mut open(path)?).map_err(|error| CertificateLoadError::Io {
        path: path.to_path_buf(),
        error,
    })?;

    if certs.is_empty() {
        return Err(CertificateLoadError::NoCertificates {
            path: path.to_path_buf(),
        });
    }
    Ok(certs.into_iter().map(Certificate).collect())
}

pub fn load_private_key(path: &Path) -> Result<PrivateKey, CertificateLoadError> {
    let items = rustls_pemfile::read_all(&mut open(path)?).map_err(|error| CertificateLoadError::Io {
        path: path.to_path_buf(),
        error,
    })?;

    items
        .into_iter()
        .find_map(|item| match item {
            Item::PKCS8Key(key) | Item::RSAKey(key) | Item::ECKey(key) => Some(PrivateKey(key)),
            _ => None,
        })
        .ok_or_else(|| CertificateLoadError::NoPrivateKey {
            path: path.to_path_buf(),
        })
}

pub fn load_ca(path: &Path) -> Result<RootCertStore, CertificateLoadError> {
    let mut roots = RootCertStore::empty();
    for cert in load_certs(path)? {
        roots.add(&cert).map_err(|e| CertificateLoadError::InvalidCa {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    }
    Ok(roots)
}

/// 인증서·키·CA 묶음으로 서버 TLS 설정을 만듭니다.
pub fn build_server_config(
    domain: &str,
    cert_path: &Path,
    key_path: &Path,
    ca_path: Option<&Path>,
    client_auth: ClientAuth,
) -> Result<Arc<ServerConfig>, CertificateLoadError> {
    let certs = load_certs(cert_path)?;
    let key = load_private_key(key_path)?;

    let builder = ServerConfig::builder().with_safe_defaults();
    let builder = match (client_auth, ca_path) {
        (ClientAuth::None, _) => builder.with_no_client_auth(),
        (_, None) => {
            return Err(CertificateLoadError::MissingMaterial(format!(
                "도메인 {}의 클라이언트 인증서 검증용 CA",
                domain
            )))
        }
        (ClientAuth::Optional, Some(ca)) => {
            builder.with_client_cert_verifier(AllowAnyAnonymousOrAuthenticatedClient::new(load_ca(ca)?).boxed())
        }
        (ClientAuth::Required, Some(ca)) => {
            builder.with_client_cert_verifier(AllowAnyAuthenticatedClient::new(load_ca(ca)?).boxed())
        }
    };

    let mut config = builder
        .with_single_cert(certs, key)
        .map_err(|source: rustls::Error| CertificateLoadError::Tls {
            domain: domain.to_string(),
            source,
        })?;
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}
