use std::fmt;

/// 서비스 탐색 어댑터에서 발생하는 에러입니다.
#[derive(Debug)]
pub enum DiscoveryError {
    /// 컨테이너 호스트 연결 실패
    Connection {
        source: bollard::errors::Error,
        context: String,
    },
    /// 서비스 목록 조회 실패
    ListServices {
        source: bollard::errors::Error,
        context: String,
    },
    /// 개별 서비스 상세 조회 실패
    InspectService {
        service_id: String,
        source: bollard::errors::Error,
    },
    /// 이벤트 스트림 오류
    EventStream {
        source: bollard::errors::Error,
    },
    /// 어댑터 내부 오류 (테스트 어댑터 등)
    Other(String),
}

impl DiscoveryError {
    /// 일시적인 오류로 재시도할 가치가 있는지 판단합니다.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DiscoveryError::Connection { .. }
                | DiscoveryError::ListServices { .. }
                | DiscoveryError::EventStream { .. }
        )
    }
}

impl fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryError::Connection { source, context } =>
                write!(f, "Docker 데몬 연결 실패 ({}): {}", context, source),
            DiscoveryError::ListServices { source, context } =>
                write!(f, "서비스 목록 조회 실패 ({}): {}", context, source),
            DiscoveryError::InspectService { service_id, source } =>
                write!(f, "서비스 {} 상세 조회 실패: {}", service_id, source),
            DiscoveryError::EventStream { source } =>
                write!(f, "이벤트 스트림 오류: {}", source),
            DiscoveryError::Other(message) =>
                write!(f, "서비스 탐색 오류: {}", message),
        }
    }
}

impl std::error::Error for DiscoveryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DiscoveryError::Connection { source, .. }
            | DiscoveryError::ListServices { source, .. }
            | DiscoveryError::InspectService { source, .. }
            | DiscoveryError::EventStream { source } => Some(source),
            DiscoveryError::Other(_) => None,
        }
    }
}

impl From<bollard::errors::Error> for DiscoveryError {
    fn from(err: bollard::errors::Error) -> Self {
        DiscoveryError::Connection {
            source: err,
            context: "Docker 데몬 연결 실패".to_string(),
        }
    }
}
