//! 가상 호스트 기반 라우팅 테이블과 매칭 규칙을 제공하는 모듈입니다.

mod error;
mod host;
mod rule;
mod table;

pub use error::RoutingError;
pub use host::HostInfo;
pub use rule::{BackEnd, FrontEnd, RoutingRule, OVERRIDE_MARKER};
pub use table::{reverse_host_order, RoutingTable};
