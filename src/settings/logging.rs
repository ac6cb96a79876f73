use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};
use tracing::Level;

use super::{parse_env_var, SettingsError};

/// 로그 한 줄의 모양
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("text") {
            Ok(LogFormat::Text)
        } else if s.eq_ignore_ascii_case("json") {
            Ok(LogFormat::Json)
        } else {
            Err(format!("알 수 없는 로그 형식: {}", s))
        }
    }
}

/// 로그를 쓸 곳. `stdout`이 아니면 일 단위로 회전하는 파일 경로로 봅니다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LogOutput {
    #[default]
    Stdout,
    File(String),
}

impl FromStr for LogOutput {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Err("빈 로그 출력 경로".to_string()),
            value if value.eq_ignore_ascii_case("stdout") => Ok(LogOutput::Stdout),
            path => Ok(LogOutput::File(path.to_string())),
        }
    }
}

/// `[logging]` 섹션. 환경 변수와 설정 파일 모두 같은 `FromStr` 규칙으로 값을 읽습니다.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    #[serde(deserialize_with = "from_text")]
    pub format: LogFormat,
    #[serde(deserialize_with = "from_text")]
    pub level: Level,
    #[serde(deserialize_with = "from_text")]
    pub output: LogOutput,
}

impl LogSettings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Ok(Self {
            format: parse_env_var("DOCKPROX_LOG_FORMAT", LogFormat::default)?,
            level: parse_env_var("DOCKPROX_LOG_LEVEL", || Level::INFO)?,
            output: parse_env_var("DOCKPROX_LOG_OUTPUT", LogOutput::default)?,
        })
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: Level::INFO,
            output: LogOutput::default(),
        }
    }
}

fn from_text<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
}
