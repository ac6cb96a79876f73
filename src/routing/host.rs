use hyper::header;

use crate::routing::RoutingError;

/// 요청이 가리키는 가상 호스트 정보입니다.
///
/// # 필드
///
/// * `name` - 포트를 제외한 호스트 이름 (예: "example.com")
/// * `port` - 선택적 포트 번호
#[derive(Clone, Debug, PartialEq)]
pub struct HostInfo {
    pub name: String,
    pub port: Option<u16>,
}

impl HostInfo {
    /// Host 헤더 값에서 HostInfo를 생성합니다.
    ///
    /// ```
    /// use dockprox::routing::HostInfo;
    ///
    /// let host_info = HostInfo::from_header_value("example.com:8080").unwrap();
    /// assert_eq!(host_info.name, "example.com");
    /// assert_eq!(host_info.port, Some(8080));
    /// ```
    pub fn from_header_value(value: &str) -> Result<Self, RoutingError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(RoutingError::InvalidHost {
                host: value.to_string(),
                reason: "empty host".to_string(),
            });
        }

        // IPv6 리터럴은 포트 분리 규칙이 다름
        if let Some(rest) = value.strip_prefix('[') {
            let end = rest.find(']').ok_or_else(|| RoutingError::InvalidHost {
                host: value.to_string(),
                reason: "unterminated IPv6 literal".to_string(),
            })?;
            let port = Self::parse_port(value, rest[end + 1..].strip_prefix(':'))?;
            return Ok(HostInfo {
                name: format!("[{}]", &rest[..end]).to_lowercase(),
                port,
            });
        }

        let (name, port) = match value.split_once(':') {
            Some((name, port)) => (name, Self::parse_port(value, Some(port))?),
            None => (value, None),
        };

        if name.is_empty() {
            return Err(RoutingError::InvalidHost {
                host: value.to_string(),
                reason: "empty host name".to_string(),
            });
        }

        Ok(HostInfo {
            name: name.to_lowercase(),
            port,
        })
    }

    fn parse_port(value: &str, port: Option<&str>) -> Result<Option<u16>, RoutingError> {
        match port {
            None => Ok(None),
            Some(port) => port.parse::<u16>().map(Some).map_err(|_| RoutingError::InvalidHost {
                host: value.to_string(),
                reason: format!("invalid port {}", port),
            }),
        }
    }

    /// HTTP 요청에서 호스트 정보를 추출합니다.
    ///
    /// Host 헤더가 없으면 절대 URI의 authority를 사용합니다.
    pub fn from_request<B>(req: &hyper::Request<B>) -> Result<Self, RoutingError> {
        if let Some(value) = req.headers().get(header::HOST) {
            let host = value.to_str().map_err(|e| RoutingError::InvalidHost {
                host: String::from_utf8_lossy(value.as_bytes()).into_owned(),
                reason: e.to_string(),
            })?;
            return Self::from_header_value(host);
        }

        match req.uri().authority() {
            Some(authority) => Self::from_header_value(authority.as_str()),
            None => Err(RoutingError::MissingHost),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_port_and_lowercases() {
        let info = HostInfo::from_header_value("API.Example.com:8443").unwrap();
        assert_eq!(info.name, "api.example.com");
        assert_eq!(info.port, Some(8443));
    }

    #[test]
    fn rejects_bad_port() {
        assert!(HostInfo::from_header_value("example.com:http").is_err());
        assert!(HostInfo::from_header_value(":80").is_err());
        assert!(HostInfo::from_header_value("").is_err());
    }

    #[test]
    fn parses_ipv6_literal() {
        let info = HostInfo::from_header_value("[::1]:8080").unwrap();
        assert_eq!(info.name, "[::1]");
        assert_eq!(info.port, Some(8080));
    }

    #[test]
    fn falls_back_to_uri_authority() {
        let req = hyper::Request::builder()
            .uri("http://backend.local:81/x")
            .body(())
            .unwrap();
        let info = HostInfo::from_request(&req).unwrap();
        assert_eq!(info.name, "backend.local");

        let req = hyper::Request::builder().uri("/x").body(()).unwrap();
        assert_eq!(HostInfo::from_request(&req), Err(RoutingError::MissingHost));
    }
}
