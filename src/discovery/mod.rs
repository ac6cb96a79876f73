//! 컨테이너 호스트에서 백엔드 서비스를 찾아내는 어댑터 계층입니다.
//!
//! 라우트 도출 로직은 정규화된 [`ServiceDescriptor`]만 다루며,
//! 어떤 오케스트레이터에서 가져왔는지는 [`ServiceDiscovery`] 구현이 감춥니다.

mod error;
mod retry;

pub use error::DiscoveryError;
pub use retry::{with_retry, RetryPolicy, RetryableOperation};

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::mpsc;

/// 한 번의 탐색 시점에 얻은 서비스의 불변 스냅샷입니다.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceDescriptor {
    pub id: String,
    /// 컨테이너 이름 (앞의 `/`가 붙어 있을 수 있음)
    pub name: String,
    pub labels: HashMap<String, String>,
    /// 우선순위 순서의 네트워크 주소 목록
    pub addresses: Vec<String>,
    /// 컨테이너가 선언한 도메인 이름
    pub domain: Option<String>,
}

/// 서비스 변경 알림. 내용은 로깅에만 쓰이며 리졸버는 "무언가 바뀌었다"로만 해석합니다.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceChange {
    pub service_id: String,
    pub action: String,
}

pub type DiscoveryEvent = Result<ServiceChange, DiscoveryError>;

#[async_trait]
pub trait ServiceDiscovery: Send + Sync {
    /// 현재 실행 중인 서비스 목록을 조회합니다.
    async fn list_services(&self) -> Result<Vec<ServiceDescriptor>, DiscoveryError>;

    /// 서비스 생명주기 이벤트를 구독합니다. 스트림이 끝나면 채널이 닫힙니다.
    async fn subscribe(&self) -> Result<mpsc::Receiver<DiscoveryEvent>, DiscoveryError>;
}
