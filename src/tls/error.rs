use std::fmt;
use std::path::PathBuf;

/// 리스너 시작 시 인증서 자료를 읽지 못했을 때의 에러입니다. 해당 리스너는 시작할 수 없습니다.
#[derive(Debug)]
pub enum CertificateLoadError {
    Io {
        path: PathBuf,
        error: std::io::Error,
    },
    NoCertificates {
        path: PathBuf,
    },
    NoPrivateKey {
        path: PathBuf,
    },
    InvalidCa {
        path: PathBuf,
        reason: String,
    },
    Tls {
        domain: String,
        source: tokio_rustls::rustls::Error,
    },
    EmptyDirectory {
        path: PathBuf,
    },
    MissingMaterial(String),
}

impl fmt::Display for CertificateLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, error } =>
                write!(f, "인증서 파일 {} 읽기 실패: {}", path.display(), error),
            Self::NoCertificates { path } =>
                write!(f, "{}에서 인증서를 찾을 수 없음", path.display()),
            Self::NoPrivateKey { path } =>
                write!(f, "{}에서 개인키를 찾을 수 없음", path.display()),
            Self::InvalidCa { path, reason } =>
                write!(f, "CA 파일 {} 오류: {}", path.display(), reason),
            Self::Tls { domain, source } =>
                write!(f, "도메인 {}의 TLS 설정 생성 실패: {}", domain, source),
            Self::EmptyDirectory { path } =>
                write!(f, "인증서 디렉터리 {}에 사용할 수 있는 도메인이 없음", path.display()),
            Self::MissingMaterial(what) =>
                write!(f, "인증서 설정 누락: {}", what),
        }
    }
}

impl std::error::Error for CertificateLoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { error, .. } => Some(error),
            Self::Tls { source, .. } => Some(source),
            _ => None,
        }
    }
}
