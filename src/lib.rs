//! dockprox는 컨테이너 메타데이터로부터 가상 호스트 라우팅을 자동 구성하는 리버스 프록시입니다.
//!
//! # 주요 기능
//!
//! - 컨테이너 라벨 기반 라우트 생성과 변경 이벤트 디바운스
//! - 와일드카드, 우선 지정(`^host`) 호스트 매칭
//! - SNI별 인증서 선택과 클라이언트 인증서 헤더 주입
//! - HTTP/HTTPS 간 308 리다이렉트, WebSocket 등 업그레이드 터널링
//!
//! # 예제
//!
//! ```
//! use dockprox::routing::{RoutingRule, RoutingTable};
//!
//! let table = RoutingTable::new(vec![
//!     RoutingRule::new("*example.com", "10.0.0.2", 8080, "/", true),
//!     RoutingRule::new("api.example.com", "10.0.0.3", 80, "/v1", true),
//! ]);
//!
//! let rule = table.find("api.example.com").unwrap();
//! assert_eq!(rule.target_url("/users?id=1"), "http://10.0.0.3:80/v1/users?id=1");
//!
//! let rule = table.find("www.example.com").unwrap();
//! assert_eq!(rule.back.host, "10.0.0.2");
//! ```

pub mod discovery;
pub mod docker;
pub mod logging;
pub mod mapping;
pub mod proxy;
pub mod routing;
pub mod server;
pub mod settings;
pub mod tls;
