use std::fmt;

/// 외부에 노출되는 가상 호스트 패턴입니다.
///
/// 정확한 호스트명이나 와일드카드(`*.suffix`)를 담습니다.
/// `^host` 형태로 주어진 호스트는 접두사를 떼고 `overrides`로 표시합니다.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrontEnd {
    pub host: String,
    /// 같은 접미사의 와일드카드보다 먼저 검사되는 우선 지정 호스트
    pub overrides: bool,
}

impl FrontEnd {
    pub fn parse(pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        match pattern.strip_prefix(OVERRIDE_MARKER) {
            Some(host) => Self {
                host: host.to_string(),
                overrides: true,
            },
            None => Self {
                host: pattern,
                overrides: false,
            },
        }
    }

    /// 우선순위 정렬에 쓰이는 뒤집힌 패턴. 우선 지정 표시는 마지막 문자로 붙습니다.
    pub(crate) fn reversed_pattern(&self) -> impl Iterator<Item = char> + '_ {
        self.host
            .chars()
            .rev()
            .chain(self.overrides.then_some(OVERRIDE_MARKER))
    }
}

/// 요청을 전달할 백엔드 대상입니다.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BackEnd {
    pub host: String,
    pub port: u16,
    pub path: String,
}

/// 가상 호스트와 백엔드를 짝지은 라우팅 규칙입니다.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RoutingRule {
    pub front: FrontEnd,
    pub back: BackEnd,
    /// TLS 리스너를 통해서만 제공되어야 하는 라우트인지 여부
    pub secure: bool,
}

/// 우선 지정 호스트 접두사
pub const OVERRIDE_MARKER: char = '^';

impl RoutingRule {
    pub fn new(
        front_host: impl Into<String>,
        back_host: impl Into<String>,
        port: u16,
        path: impl Into<String>,
        secure: bool,
    ) -> Self {
        Self {
            front: FrontEnd::parse(front_host),
            back: BackEnd {
                host: back_host.into(),
                port,
                path: path.into(),
            },
            secure,
        }
    }

    /// 요청 호스트가 이 규칙의 가상 호스트 패턴과 일치하는지 확인합니다.
    pub fn matches(&self, requested_host: &str) -> bool {
        let pattern = self.front.host.as_str();
        if pattern == requested_host {
            return true;
        }
        match pattern.strip_prefix('*') {
            Some(suffix) => requested_host.ends_with(suffix),
            None => false,
        }
    }

    /// 끝의 `/`를 제거한 백엔드 경로
    pub fn back_path(&self) -> &str {
        self.back.path.strip_suffix('/').unwrap_or(&self.back.path)
    }

    /// 원본 요청의 경로와 쿼리를 붙인 백엔드 URL을 만듭니다.
    pub fn target_url(&self, path_and_query: &str) -> String {
        format!(
            "http://{}:{}{}{}",
            self.back.host,
            self.back.port,
            self.back_path(),
            path_and_query
        )
    }
}

impl fmt::Display for RoutingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}:{} {}",
            self.front.host, self.back.host, self.back.port, self.back.path
        )
    }
}
