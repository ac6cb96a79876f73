use std::fmt;

use crate::discovery::DiscoveryError;
use crate::settings::SettingsError;
use crate::tls::CertificateLoadError;

/// 프로세스 시작과 리스너 수명 주기에서 발생하는 에러
#[derive(Debug)]
pub enum Error {
    Settings(SettingsError),
    Io(std::io::Error),
    Certificate(CertificateLoadError),
    Discovery(DiscoveryError),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<SettingsError> for Error {
    fn from(err: SettingsError) -> Self {
        Error::Settings(err)
    }
}

impl From<CertificateLoadError> for Error {
    fn from(err: CertificateLoadError) -> Self {
        Error::Certificate(err)
    }
}

impl From<DiscoveryError> for Error {
    fn from(err: DiscoveryError) -> Self {
        Error::Discovery(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Settings(e) => write!(f, "Config Error: {}", e),
            Error::Io(e) => write!(f, "IO Error: {}", e),
            Error::Certificate(e) => write!(f, "Certificate Error: {}", e),
            Error::Discovery(e) => write!(f, "Discovery Error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Settings(e) => Some(e),
            Error::Io(e) => Some(e),
            Error::Certificate(e) => Some(e),
            Error::Discovery(e) => Some(e),
        }
    }
}

/// 상대방이 연결을 끊어 생긴 에러인지 확인합니다. 이런 에러는 debug 수준으로만 기록합니다.
pub fn is_transport_reset(err: &std::io::Error) -> bool {
    use std::io::ErrorKind;
    matches!(
        err.kind(),
        ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof
    )
}

/// hyper 에러의 원인 체인에서 전송 계층 리셋을 찾습니다.
pub fn is_hyper_reset(err: &hyper::Error) -> bool {
    if err.is_incomplete_message() || err.is_canceled() {
        return true;
    }
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            return is_transport_reset(io);
        }
        source = cause.source();
    }
    false
}
