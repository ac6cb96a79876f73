use std::{env, fs, path::Path, path::PathBuf};

use serde::Deserialize;

mod discovery;
mod error;
mod listener;
pub mod logging;

pub use discovery::DiscoverySettings;
pub use error::SettingsError;
pub use listener::{HttpSettings, HttpsSettings};
pub use logging::{LogFormat, LogOutput, LogSettings};

pub type Result<T> = std::result::Result<T, SettingsError>;

/// 설정 파일 경로를 담는 환경 변수
pub const CONFIG_FILE_VAR: &str = "DOCKPROX_CONFIG_FILE";

pub fn parse_env_var<T: std::str::FromStr, F: FnOnce() -> T>(name: &str, default: F) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(val) => val.parse().map_err(|e: T::Err| SettingsError::EnvVarInvalid {
            var_name: name.to_string(),
            value: val,
            reason: e.to_string(),
        }),
        Err(env::VarError::NotPresent) => Ok(default()),
        Err(e) => Err(SettingsError::EnvVarInvalid {
            var_name: name.to_string(),
            value: "".to_string(),
            reason: e.to_string(),
        }),
    }
}

/// `true`/`false`를 대소문자 구분 없이 받습니다.
pub fn env_flag(name: &str, default: bool) -> Result<bool> {
    let value = parse_env_var::<String, _>(name, || default.to_string())?;
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(SettingsError::EnvVarInvalid {
            var_name: name.to_string(),
            value,
            reason: "true 또는 false 여야 합니다".to_string(),
        }),
    }
}

fn env_path(name: &str) -> Option<PathBuf> {
    env::var(name).ok().filter(|v| !v.is_empty()).map(PathBuf::from)
}

/// 업스트림 전달 설정
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProxySettings {
    /// 백엔드 응답 헤더 대기 제한 (밀리초). 0이면 제한 없음
    #[serde(default)]
    pub upstream_timeout_ms: u64,
}

impl ProxySettings {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            upstream_timeout_ms: parse_env_var("DOCKPROX_UPSTREAM_TIMEOUT_MS", || 0)?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub http: HttpSettings,

    #[serde(default)]
    pub https: HttpsSettings,

    #[serde(default)]
    pub discovery: DiscoverySettings,

    #[serde(default)]
    pub proxy: ProxySettings,

    #[serde(default)]
    pub logging: LogSettings,
}

impl Settings {
    pub async fn load() -> Result<Self> {
        if let Ok(config_path) = env::var(CONFIG_FILE_VAR) {
            Self::from_toml_file(&config_path).await
        } else {
            Self::from_env().await
        }
    }

    pub async fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).map_err(|e| SettingsError::FileError {
            path: path.as_ref().to_string_lossy().to_string(),
            error: e,
        })?;

        let settings = Self::from_toml_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| SettingsError::ParseError { source: e })
    }

    pub async fn from_env() -> Result<Self> {
        let settings = Self {
            http: HttpSettings::from_env()?,
            https: HttpsSettings::from_env()?,
            discovery: DiscoverySettings::from_env()?,
            proxy: ProxySettings::from_env()?,
            logging: LogSettings::from_env()?,
        };

        settings.validate()?;
        Ok(settings)
    }

    /// 설정 유효성 검증
    pub fn validate(&self) -> Result<()> {
        if !self.http.enabled && !self.https.enabled {
            return Err(SettingsError::InvalidConfig(
                "HTTP와 HTTPS 리스너가 모두 비활성화되어 있습니다".to_string(),
            ));
        }

        if self.http.enabled && self.https.enabled && self.http.port == self.https.port {
            return Err(SettingsError::EnvVarInvalid {
                var_name: "DOCKPROX_HTTP_PORT/DOCKPROX_HTTPS_PORT".to_string(),
                value: format!("{}/{}", self.http.port, self.https.port),
                reason: "HTTP와 HTTPS 포트는 달라야 합니다".to_string(),
            });
        }

        self.https.validate()?;
        self.discovery.validate()?;
        Ok(())
    }
}
