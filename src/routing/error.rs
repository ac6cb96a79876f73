use std::fmt;

/// 라우팅 관련 에러를 표현하는 열거형입니다.
#[derive(Debug, Clone, PartialEq)]
pub enum RoutingError {
    /// Host 헤더 누락
    MissingHost,
    /// 유효하지 않은 호스트 이름
    InvalidHost {
        host: String,
        reason: String,
    },
    /// 요청 호스트와 일치하는 라우트가 없음
    NoRoute {
        host: String,
    },
}

impl fmt::Display for RoutingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingError::MissingHost =>
                write!(f, "Missing Host header"),
            RoutingError::InvalidHost { host, reason } =>
                write!(f, "Invalid host {}: {}", host, reason),
            RoutingError::NoRoute { host } =>
                write!(f, "No configuration for virtual host {}", host),
        }
    }
}

impl std::error::Error for RoutingError {}
