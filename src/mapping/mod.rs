//! 서비스 메타데이터를 라우팅 규칙으로 바꾸고 변경을 조정·게시하는 모듈입니다.

mod deriver;
mod resolver;

pub use deriver::{RouteDeriver, RouteDerivationError};
pub use resolver::{MappingResolver, SharedRoutingTable};
