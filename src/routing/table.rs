use std::cmp::Ordering;
use std::fmt;

use tracing::debug;

use crate::routing::{HostInfo, RoutingError, RoutingRule};

/// 매칭 우선순위 순서로 정렬된 불변 라우팅 테이블입니다.
///
/// 호스트 문자열을 뒤집어 내림차순 정렬하므로 더 길고 구체적인 접미사가 먼저 검사됩니다.
/// 우선 지정 호스트(`^host`)는 같은 접미사의 와일드카드보다 앞에 놓입니다.
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    rules: Vec<RoutingRule>,
}

/// 호스트 문자열을 뒤에서부터 비교한 내림차순. 긴 접미사가 짧은 접미사보다 앞에 옵니다.
pub fn reverse_host_order(a: &str, b: &str) -> Ordering {
    b.chars().rev().cmp(a.chars().rev())
}

fn precedence(a: &RoutingRule, b: &RoutingRule) -> Ordering {
    b.front
        .reversed_pattern()
        .cmp(a.front.reversed_pattern())
        .then_with(|| a.back.cmp(&b.back))
        .then_with(|| a.secure.cmp(&b.secure))
}

impl RoutingTable {
    pub fn new(mut rules: Vec<RoutingRule>) -> Self {
        rules.sort_by(precedence);
        Self { rules }
    }

    pub fn rules(&self) -> &[RoutingRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 게시된 순서대로 검사해 처음 일치하는 규칙을 돌려줍니다.
    pub fn find(&self, requested_host: &str) -> Option<&RoutingRule> {
        self.rules.iter().find(|rule| rule.matches(requested_host))
    }

    pub fn route(&self, host: &HostInfo) -> Result<&RoutingRule, RoutingError> {
        match self.find(&host.name) {
            Some(rule) => {
                debug!(host = %host.name, rule = %rule, "라우트 찾음");
                Ok(rule)
            }
            None => Err(RoutingError::NoRoute {
                host: host.name.clone(),
            }),
        }
    }

    fn canonical(&self) -> Vec<&RoutingRule> {
        let mut rules: Vec<&RoutingRule> = self.rules.iter().collect();
        rules.sort();
        rules
    }
}

/// 순서와 무관한 구조적 동등성. 내부 순서는 매칭 우선순위일 뿐 식별자가 아닙니다.
impl PartialEq for RoutingTable {
    fn eq(&self, other: &Self) -> bool {
        self.rules.len() == other.rules.len() && self.canonical() == other.canonical()
    }
}

impl Eq for RoutingTable {}

impl fmt::Display for RoutingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, rule) in self.rules.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", rule)?;
        }
        Ok(())
    }
}

impl FromIterator<RoutingRule> for RoutingTable {
    fn from_iter<T: IntoIterator<Item = RoutingRule>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
