use serde::Deserialize;

use super::{env_flag, parse_env_var, SettingsError};

/// 서비스 탐색과 라우트 도출 설정
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoverySettings {
    /// 점이 없는 호스트에 붙일 기본 도메인
    #[serde(default = "default_domain")]
    pub default_domain: String,

    /// 프록시와 백엔드가 네트워크 네임스페이스를 공유할 때 백엔드를 로컬 주소로 바꿈
    #[serde(default)]
    pub remap_to_localhost: bool,

    #[serde(default = "default_local_backend_host")]
    pub local_backend_host: String,

    /// 이벤트 묶음 처리 대기 시간 (밀리초)
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// 라벨 네임스페이스 (우선순위 순)
    #[serde(default = "default_label_prefixes")]
    pub label_prefixes: Vec<String>,

    /// 백엔드 주소를 우선 가져올 Docker 네트워크. 비어 있으면 첫 번째 네트워크
    #[serde(default)]
    pub network: String,
}

impl DiscoverySettings {
    pub fn from_env() -> Result<Self, SettingsError> {
        let label_prefixes = parse_env_var::<String, _>("DOCKPROX_LABEL_PREFIXES", String::new)?;
        let label_prefixes = if label_prefixes.is_empty() {
            default_label_prefixes()
        } else {
            label_prefixes
                .split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect()
        };

        let settings = Self {
            default_domain: parse_env_var("DOCKPROX_DOMAIN", default_domain)?,
            remap_to_localhost: env_flag("DOCKPROX_REMAP_TO_LOCALHOST", false)?,
            local_backend_host: parse_env_var("DOCKPROX_LOCAL_BACKEND_HOST", default_local_backend_host)?,
            debounce_ms: parse_env_var("DOCKPROX_DEBOUNCE_MS", default_debounce_ms)?,
            label_prefixes,
            network: parse_env_var("DOCKPROX_DOCKER_NETWORK", String::new)?,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.debounce_ms == 0 {
            return Err(SettingsError::EnvVarInvalid {
                var_name: "DOCKPROX_DEBOUNCE_MS".to_string(),
                value: self.debounce_ms.to_string(),
                reason: "대기 시간은 0보다 커야 합니다".to_string(),
            });
        }

        if self.label_prefixes.is_empty() {
            return Err(SettingsError::InvalidConfig(
                "라벨 네임스페이스가 하나 이상 필요합니다".to_string(),
            ));
        }

        if let Some(prefix) = self.label_prefixes.iter().find(|p| !p.ends_with('.')) {
            return Err(SettingsError::EnvVarInvalid {
                var_name: "DOCKPROX_LABEL_PREFIXES".to_string(),
                value: prefix.clone(),
                reason: "라벨 접두사는 '.'으로 끝나야 합니다".to_string(),
            });
        }

        if !self.network.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.') {
            return Err(SettingsError::EnvVarInvalid {
                var_name: "DOCKPROX_DOCKER_NETWORK".to_string(),
                value: self.network.clone(),
                reason: "Docker 네트워크 이름은 영숫자와 -_. 만 포함할 수 있습니다".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            default_domain: default_domain(),
            remap_to_localhost: false,
            local_backend_host: default_local_backend_host(),
            debounce_ms: default_debounce_ms(),
            label_prefixes: default_label_prefixes(),
            network: String::new(),
        }
    }
}

fn default_domain() -> String {
    "localhost".to_string()
}

fn default_local_backend_host() -> String {
    "127.0.0.1".to_string()
}

fn default_debounce_ms() -> u64 {
    1000
}

fn default_label_prefixes() -> Vec<String> {
    vec!["dockprox.".to_string(), "cz.drake.dockprox.".to_string()]
}
