use std::fmt;
use std::sync::OnceLock;

use regex_lite::Regex;

use crate::discovery::ServiceDescriptor;
use crate::routing::RoutingRule;
use crate::settings::DiscoverySettings;

/// 오케스트레이터가 붙이는 논리 서비스 이름 라벨 (우선순위 순)
const SERVICE_NAME_LABELS: &[&str] = &["com.docker.compose.service", "com.docker.swarm.service.name"];

const DEFAULT_PORT: u16 = 80;
const DEFAULT_PATH: &str = "/";

/// 서비스 메타데이터에서 라우트를 만들 수 없을 때의 에러입니다.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteDerivationError {
    InvalidPort {
        service: String,
        value: String,
    },
    NoBackendAddress {
        service: String,
    },
}

impl fmt::Display for RouteDerivationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteDerivationError::InvalidPort { service, value } =>
                write!(f, "서비스 {}의 포트 값 {}을(를) 해석할 수 없음", service, value),
            RouteDerivationError::NoBackendAddress { service } =>
                write!(f, "서비스 {}의 백엔드 주소를 찾을 수 없음", service),
        }
    }
}

impl std::error::Error for RouteDerivationError {}

/// 네임스페이스 라벨을 한 번에 해석해 둔 서비스별 라우팅 설정입니다.
#[derive(Debug)]
struct ServiceLabels<'a> {
    enabled: bool,
    hosts: Vec<&'a str>,
    port: Option<&'a str>,
    path: Option<&'a str>,
    secure: Option<&'a str>,
    domain: Option<&'a str>,
}

impl<'a> ServiceLabels<'a> {
    fn resolve(service: &'a ServiceDescriptor, prefixes: &[String]) -> Self {
        let lookup = |key: &str| -> Option<&'a str> {
            prefixes
                .iter()
                .find_map(|prefix| service.labels.get(&format!("{}{}", prefix, key)))
                .map(|value| value.trim())
        };

        let host = lookup("host");
        let enabled = match lookup("enable") {
            Some(value) => !value.eq_ignore_ascii_case("false"),
            None => host.is_some(),
        };

        Self {
            enabled,
            hosts: host
                .map(|value| value.split(',').map(str::trim).filter(|h| !h.is_empty()).collect())
                .unwrap_or_default(),
            port: lookup("port").filter(|v| !v.is_empty()),
            path: lookup("path").filter(|v| !v.is_empty()),
            secure: lookup("secure"),
            domain: lookup("domain").filter(|v| !v.is_empty()),
        }
    }
}

/// 서비스 기술자 하나를 0개 이상의 라우팅 규칙으로 바꾸는 순수 함수 모음입니다.
#[derive(Debug, Clone)]
pub struct RouteDeriver {
    default_domain: String,
    label_prefixes: Vec<String>,
    remap_to_localhost: bool,
    local_backend_host: String,
}

impl RouteDeriver {
    pub fn new(settings: &DiscoverySettings) -> Self {
        Self {
            default_domain: settings.default_domain.clone(),
            label_prefixes: settings.label_prefixes.clone(),
            remap_to_localhost: settings.remap_to_localhost,
            local_backend_host: settings.local_backend_host.clone(),
        }
    }

    pub fn derive(&self, service: &ServiceDescriptor) -> Result<Vec<RoutingRule>, RouteDerivationError> {
        let labels = ServiceLabels::resolve(service, &self.label_prefixes);
        if !labels.enabled {
            return Ok(Vec::new());
        }

        let container_name = sanitize_name(&service.name);

        let port = match labels.port {
            Some(value) => value.parse::<u16>().map_err(|_| RouteDerivationError::InvalidPort {
                service: container_name.to_string(),
                value: value.to_string(),
            })?,
            None => DEFAULT_PORT,
        };

        let path = match labels.path {
            Some(path) if path.starts_with('/') => path.to_string(),
            Some(path) => format!("/{}", path),
            None => DEFAULT_PATH.to_string(),
        };

        let secure = !labels.secure.is_some_and(|v| v.eq_ignore_ascii_case("false"));
        let back_host = self.backend_host(service, container_name)?;
        let domain = labels
            .domain
            .or(service.domain.as_deref())
            .unwrap_or(&self.default_domain);

        let hosts = if labels.hosts.is_empty() {
            vec![fallback_host(service, container_name)]
        } else {
            labels.hosts.iter().map(|h| h.to_string()).collect()
        };

        Ok(hosts
            .into_iter()
            .map(|host| qualify_host(&host, domain))
            .map(|host| RoutingRule::new(host, back_host.clone(), port, path.clone(), secure))
            .collect())
    }

    fn backend_host(&self, service: &ServiceDescriptor, container_name: &str) -> Result<String, RouteDerivationError> {
        if self.remap_to_localhost {
            return Ok(self.local_backend_host.clone());
        }
        if let Some(address) = service.addresses.first() {
            return Ok(address.clone());
        }
        // 공유 네트워크에서는 컨테이너 이름으로도 접근 가능
        if !container_name.is_empty() {
            return Ok(container_name.to_string());
        }
        Err(RouteDerivationError::NoBackendAddress {
            service: service.id.clone(),
        })
    }
}

fn sanitize_name(name: &str) -> &str {
    name.strip_prefix('/').unwrap_or(name)
}

fn compose_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^.+_(?P<name>.*)_[0-9]+$").expect("compose name pattern"))
}

/// 라벨이 없을 때의 호스트: 오케스트레이터 서비스 이름, 그다음 컨테이너 이름
fn fallback_host(service: &ServiceDescriptor, container_name: &str) -> String {
    if let Some(name) = SERVICE_NAME_LABELS
        .iter()
        .find_map(|key| service.labels.get(*key))
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
    {
        return name.to_string();
    }

    compose_name_pattern()
        .captures(container_name)
        .and_then(|caps| caps.name("name"))
        .map(|m| m.as_str())
        .filter(|name| !name.is_empty())
        .unwrap_or(container_name)
        .to_string()
}

fn qualify_host(host: &str, domain: &str) -> String {
    let host = host.to_lowercase();
    let host = if host.contains('.') {
        host
    } else {
        format!("{}.{}", host, domain)
    };
    if host == "*." {
        "*".to_string()
    } else {
        host
    }
}
