use std::fs;
use std::path::Path;
use std::sync::Arc;

use tokio_rustls::rustls::ServerConfig;
use tracing::{debug, info, warn};

use super::loader::{build_server_config, ClientAuth};
use super::CertificateLoadError;
use crate::routing::reverse_host_order;
use crate::settings::HttpsSettings;

const FULLCHAIN_FILE: &str = "fullchain.pem";
const PRIVKEY_FILE: &str = "privkey.pem";
const CA_FILE: &str = "ca.pem";

/// 도메인 이름으로 색인된 항목 목록. 라우팅 테이블과 같은 역순 접미사 정렬을 씁니다.
#[derive(Debug, Clone)]
pub struct SniTable<T> {
    entries: Vec<(String, T)>,
}

impl<T> SniTable<T> {
    pub fn new(mut entries: Vec<(String, T)>) -> Self {
        for (domain, _) in &mut entries {
            *domain = domain.to_lowercase();
        }
        entries.sort_by(|(a, _), (b, _)| reverse_host_order(a, b));
        Self { entries }
    }

    /// 서버 이름과 같거나, 점 경계에서 접미사인 첫 항목을 고릅니다.
    pub fn select(&self, server_name: &str) -> Option<&T> {
        let name = server_name.to_lowercase();
        self.entries
            .iter()
            .find(|(domain, _)| {
                name == *domain
                    || name
                        .strip_suffix(domain.as_str())
                        .is_some_and(|rest| rest.ends_with('.'))
            })
            .map(|(_, value)| value)
    }

    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(domain, _)| domain.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// TLS 리스너가 핸드셰이크마다 사용할 인증서 컨텍스트 집합입니다.
#[derive(Clone)]
pub enum CertificateStore {
    /// 모든 연결에 같은 인증서
    Static(Arc<ServerConfig>),
    /// SNI 이름으로 도메인별 인증서 선택
    Sni(SniTable<Arc<ServerConfig>>),
}

impl CertificateStore {
    pub fn build(settings: &HttpsSettings) -> Result<Self, CertificateLoadError> {
        let client_auth = ClientAuth::from_flags(settings.request_client_cert, settings.reject_unauthorized);

        if let Some(live_dir) = &settings.lets_encrypt_live_dir {
            return Self::from_directory(
                live_dir,
                settings.lets_encrypt_ca_dir.as_deref(),
                settings.ca_path.as_deref(),
                client_auth,
            );
        }

        let cert_path = settings
            .cert_path
            .as_deref()
            .ok_or_else(|| CertificateLoadError::MissingMaterial("cert_path".to_string()))?;
        let key_path = settings
            .key_path
            .as_deref()
            .ok_or_else(|| CertificateLoadError::MissingMaterial("key_path".to_string()))?;

        let config = build_server_config("*", cert_path, key_path, settings.ca_path.as_deref(), client_auth)?;
        info!(cert = %cert_path.display(), "정적 인증서 로드 완료");
        Ok(CertificateStore::Static(config))
    }

    /// 하위 디렉터리 이름을 도메인으로 삼아 인증서를 모두 읽습니다.
    pub fn from_directory(
        live_dir: &Path,
        ca_dir: Option<&Path>,
        fallback_ca: Option<&Path>,
        client_auth: ClientAuth,
    ) -> Result<Self, CertificateLoadError> {
        let io_error = |error| CertificateLoadError::Io {
            path: live_dir.to_path_buf(),
            error,
        };

        let mut entries = Vec::new();
        for entry in fs::read_dir(live_dir).map_err(io_error)? {
            let path = entry.map_err(io_error)?.path();
            if !path.is_dir() {
                continue;
            }
            let Some(domain) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                continue;
            };

            let cert_path = path.join(FULLCHAIN_FILE);
            if !cert_path.exists() {
                warn!(domain = %domain, path = %path.display(), "인증서 파일이 없는 디렉터리, 건너뜀");
                continue;
            }

            let domain_ca = ca_dir
                .map(|dir| dir.join(&domain).join(CA_FILE))
                .filter(|ca| ca.exists());
            let ca_path = domain_ca.as_deref().or(fallback_ca);

            let config = build_server_config(&domain, &cert_path, &path.join(PRIVKEY_FILE), ca_path, client_auth)?;
            debug!(domain = %domain, ca = ?ca_path, "도메인 인증서 로드");
            entries.push((domain, config));
        }

        if entries.is_empty() {
            return Err(CertificateLoadError::EmptyDirectory {
                path: live_dir.to_path_buf(),
            });
        }

        let table = SniTable::new(entries);
        info!(domains = ?table.domains().collect::<Vec<_>>(), "SNI 인증서 테이블 구성 완료");
        Ok(CertificateStore::Sni(table))
    }

    /// 핸드셰이크의 SNI 이름에 맞는 TLS 설정을 고릅니다.
    pub fn select(&self, server_name: Option<&str>) -> Option<Arc<ServerConfig>> {
        match self {
            CertificateStore::Static(config) => Some(config.clone()),
            CertificateStore::Sni(table) => server_name.and_then(|name| table.select(name)).cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SniTable<&'static str> {
        SniTable::new(vec![
            ("example.com".to_string(), "root"),
            ("api.example.com".to_string(), "api"),
            ("other.org".to_string(), "other"),
        ])
    }

    #[test]
    fn sorted_longest_suffix_first() {
        let table = table();
        let domains: Vec<_> = table.domains().collect();
        assert_eq!(domains, vec!["other.org", "api.example.com", "example.com"]);
    }

    #[test]
    fn selects_exact_then_suffix() {
        let table = table();
        assert_eq!(table.select("api.example.com"), Some(&"api"));
        assert_eq!(table.select("v1.api.example.com"), Some(&"api"));
        assert_eq!(table.select("www.example.com"), Some(&"root"));
        assert_eq!(table.select("EXAMPLE.com"), Some(&"root"));
    }

    #[test]
    fn suffix_must_respect_dot_boundary() {
        let table = table();
        assert_eq!(table.select("badexample.com"), None);
        assert_eq!(table.select("unknown.net"), None);
    }
}
