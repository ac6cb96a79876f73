use hyper::header::{self, HeaderMap, HeaderName, HeaderValue};
use tracing::debug;

use crate::tls::ClientCertificateInfo;

/// 신뢰된 클라이언트 인증서 헤더 네임스페이스. 클라이언트가 보낸 값은 항상 제거됩니다.
pub const CLIENT_CERT_HEADER_PREFIX: &str = "tcc-";

const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// 예약 네임스페이스 헤더를 지우고, 검증된 인증서가 있으면 그 정보를 주입합니다.
pub fn sanitize_headers(headers: &mut HeaderMap, client_cert: Option<&ClientCertificateInfo>) {
    let reserved: Vec<HeaderName> = headers
        .keys()
        .filter(|name| name.as_str().starts_with(CLIENT_CERT_HEADER_PREFIX))
        .cloned()
        .collect();
    for name in reserved {
        headers.remove(&name);
    }

    if let Some(cert) = client_cert {
        inject_client_certificate(headers, cert);
    }
}

fn inject_client_certificate(headers: &mut HeaderMap, cert: &ClientCertificateInfo) {
    let mut fields: Vec<(String, &str)> = vec![
        ("fingerprint-sha1".to_string(), cert.fingerprint_sha1.as_str()),
        ("fingerprint-sha256".to_string(), cert.fingerprint_sha256.as_str()),
    ];
    let optional = [
        ("serial-number", &cert.serial_number),
        ("valid-from", &cert.valid_from),
        ("valid-to", &cert.valid_to),
    ];
    fields.extend(
        optional
            .iter()
            .filter_map(|(name, value)| value.as_deref().map(|v| (name.to_string(), v))),
    );
    fields.extend(
        cert.subject
            .iter()
            .map(|(attr, value)| (format!("subject-{}", attr), value.as_str())),
    );

    for (suffix, value) in fields {
        if value.is_empty() {
            continue;
        }
        let name = format!("{}{}", CLIENT_CERT_HEADER_PREFIX, suffix);
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => debug!(header = %name, "헤더로 표현할 수 없는 인증서 필드, 생략"),
        }
    }
}

/// 일반 전달 요청에서 홉 단위 헤더를 제거합니다.
pub fn remove_hop_by_hop(headers: &mut HeaderMap) {
    // Connection 헤더에 나열된 헤더도 홉 단위
    let listed: Vec<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .collect();

    for name in listed.iter().map(String::as_str).chain(HOP_BY_HOP_HEADERS.iter().copied()) {
        headers.remove(name);
    }
}

/// `Connection: upgrade`와 `Upgrade` 헤더가 함께 있는 요청인지 확인합니다.
pub fn is_upgrade_request(headers: &HeaderMap) -> bool {
    let has_upgrade_connection = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.split(',').any(|token| token.trim().eq_ignore_ascii_case("upgrade")));

    has_upgrade_connection && headers.contains_key(header::UPGRADE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cert() -> ClientCertificateInfo {
        ClientCertificateInfo {
            fingerprint_sha1: "AA:BB".to_string(),
            fingerprint_sha256: "CC:DD".to_string(),
            serial_number: Some("01F3".to_string()),
            valid_from: None,
            valid_to: Some("Tue, 01 Jan 2030 00:00:00 +0000".to_string()),
            subject: vec![("cn".to_string(), "alice".to_string())],
        }
    }

    #[test]
    fn strips_spoofed_headers_without_certificate() {
        let mut headers = HeaderMap::new();
        headers.insert("tcc-fingerprint-sha256", HeaderValue::from_static("forged"));
        headers.insert("tcc-subject-cn", HeaderValue::from_static("mallory"));
        headers.insert("x-other", HeaderValue::from_static("kept"));

        sanitize_headers(&mut headers, None);

        assert!(headers.get("tcc-fingerprint-sha256").is_none());
        assert!(headers.get("tcc-subject-cn").is_none());
        assert_eq!(headers["x-other"], "kept");
    }

    #[test]
    fn injects_certificate_fields_and_omits_absent_ones() {
        let mut headers = HeaderMap::new();
        headers.insert("tcc-fingerprint-sha256", HeaderValue::from_static("forged"));

        sanitize_headers(&mut headers, Some(&cert()));

        assert_eq!(headers.get_all("tcc-fingerprint-sha256").iter().count(), 1);
        assert_eq!(headers["tcc-fingerprint-sha256"], "CC:DD");
        assert_eq!(headers["tcc-fingerprint-sha1"], "AA:BB");
        assert_eq!(headers["tcc-serial-number"], "01F3");
        assert_eq!(headers["tcc-subject-cn"], "alice");
        assert!(headers.get("tcc-valid-from").is_none());
        assert!(headers.get("tcc-valid-to").is_some());
    }

    #[test]
    fn hop_by_hop_removal() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-trace"));
        headers.insert("x-trace", HeaderValue::from_static("1"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("*/*"));

        remove_hop_by_hop(&mut headers);

        assert!(headers.get(header::CONNECTION).is_none());
        assert!(headers.get("x-trace").is_none());
        assert!(headers.get("keep-alive").is_none());
        assert_eq!(headers[header::ACCEPT], "*/*");
    }

    #[test]
    fn detects_upgrade() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, Upgrade"));
        headers.insert(header::UPGRADE, HeaderValue::from_static("websocket"));
        assert!(is_upgrade_request(&headers));

        headers.remove(header::UPGRADE);
        assert!(!is_upgrade_request(&headers));
    }
}
