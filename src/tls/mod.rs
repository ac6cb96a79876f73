//! TLS 인증서 로딩, SNI 기반 인증서 선택, 클라이언트 인증서 정보 추출.

mod client_cert;
mod error;
mod loader;
mod store;

pub use client_cert::ClientCertificateInfo;
pub use error::CertificateLoadError;
pub use loader::{build_server_config, load_certs, load_private_key, ClientAuth};
pub use store::{CertificateStore, SniTable};
