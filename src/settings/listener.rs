use std::path::PathBuf;

use serde::Deserialize;

use super::{env_flag, env_path, parse_env_var, SettingsError};

/// 평문 HTTP 리스너 설정
#[derive(Clone, Debug, Deserialize)]
pub struct HttpSettings {
    #[serde(default = "default_http_enabled")]
    pub enabled: bool,

    /// HTTP 포트 (기본값: 80)
    #[serde(default = "default_http_port")]
    pub port: u16,
}

fn default_http_enabled() -> bool { true }
fn default_http_port() -> u16 { 80 }
fn default_https_port() -> u16 { 443 }
fn default_reject_unauthorized() -> bool { true }

impl HttpSettings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Ok(Self {
            enabled: env_flag("DOCKPROX_HTTP_ENABLED", default_http_enabled())?,
            port: parse_port("DOCKPROX_HTTP_PORT", default_http_port)?,
        })
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            enabled: default_http_enabled(),
            port: default_http_port(),
        }
    }
}

/// TLS 리스너 설정
///
/// 인증서는 단일 정적 인증서(`cert_path`/`key_path`) 또는
/// Let's Encrypt 형식의 도메인별 디렉터리(`lets_encrypt_live_dir`) 중 하나로 지정합니다.
#[derive(Clone, Debug, Deserialize)]
pub struct HttpsSettings {
    #[serde(default)]
    pub enabled: bool,

    /// HTTPS 포트 (기본값: 443)
    #[serde(default = "default_https_port")]
    pub port: u16,

    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,

    /// 클라이언트 인증서 검증용 CA
    pub ca_path: Option<PathBuf>,

    /// 클라이언트 인증서 요청 여부
    #[serde(default)]
    pub request_client_cert: bool,

    /// 인증서를 제시하지 않은 클라이언트 거부 여부
    #[serde(default = "default_reject_unauthorized")]
    pub reject_unauthorized: bool,

    /// `<dir>/<domain>/fullchain.pem`, `<dir>/<domain>/privkey.pem`
    pub lets_encrypt_live_dir: Option<PathBuf>,

    /// `<dir>/<domain>/ca.pem`
    pub lets_encrypt_ca_dir: Option<PathBuf>,
}

impl HttpsSettings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Ok(Self {
            enabled: env_flag("DOCKPROX_HTTPS_ENABLED", false)?,
            port: parse_port("DOCKPROX_HTTPS_PORT", default_https_port)?,
            cert_path: env_path("DOCKPROX_TLS_CERT"),
            key_path: env_path("DOCKPROX_TLS_KEY"),
            ca_path: env_path("DOCKPROX_TLS_CA"),
            request_client_cert: env_flag("DOCKPROX_TLS_REQUEST_CERT", false)?,
            reject_unauthorized: env_flag("DOCKPROX_TLS_REJECT_UNAUTHORIZED", default_reject_unauthorized())?,
            lets_encrypt_live_dir: env_path("DOCKPROX_LETSENCRYPT_LIVE_DIR"),
            lets_encrypt_ca_dir: env_path("DOCKPROX_LETSENCRYPT_CA_DIR"),
        })
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !self.enabled {
            return Ok(());
        }

        if self.lets_encrypt_live_dir.is_none() {
            if self.cert_path.is_none() {
                return Err(SettingsError::EnvVarMissing {
                    var_name: "DOCKPROX_TLS_CERT".to_string(),
                });
            }
            if self.key_path.is_none() {
                return Err(SettingsError::EnvVarMissing {
                    var_name: "DOCKPROX_TLS_KEY".to_string(),
                });
            }
        }

        if self.request_client_cert && self.ca_path.is_none() && self.lets_encrypt_ca_dir.is_none() {
            return Err(SettingsError::EnvVarMissing {
                var_name: "DOCKPROX_TLS_CA".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for HttpsSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_https_port(),
            cert_path: None,
            key_path: None,
            ca_path: None,
            request_client_cert: false,
            reject_unauthorized: default_reject_unauthorized(),
            lets_encrypt_live_dir: None,
            lets_encrypt_ca_dir: None,
        }
    }
}

fn parse_port(name: &str, default: fn() -> u16) -> Result<u16, SettingsError> {
    let port = parse_env_var::<u16, _>(name, default)?;
    if port == 0 {
        return Err(SettingsError::EnvVarInvalid {
            var_name: name.to_string(),
            value: port.to_string(),
            reason: "포트는 0이 될 수 없습니다".to_string(),
        });
    }
    Ok(port)
}
