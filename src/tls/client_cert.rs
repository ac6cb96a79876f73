use sha1::{Digest, Sha1};
use sha2::Sha256;
use x509_parser::objects::{oid2abbrev, oid_registry};
use x509_parser::prelude::parse_x509_certificate;

/// 상호 TLS로 검증된 클라이언트 인증서에서 뽑은 정보입니다. 연결마다 만들어집니다.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientCertificateInfo {
    pub fingerprint_sha1: String,
    pub fingerprint_sha256: String,
    pub serial_number: Option<String>,
    pub valid_from: Option<String>,
    pub valid_to: Option<String>,
    /// (소문자 속성 약어, 값)
    pub subject: Vec<(String, String)>,
}

fn colon_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| hex::encode_upper([*b]))
        .collect::<Vec<_>>()
        .join(":")
}

impl ClientCertificateInfo {
    /// DER 인코딩된 인증서에서 정보를 추출합니다. 파싱에 실패하면 지문만 채웁니다.
    pub fn from_der(der: &[u8]) -> Self {
        let mut info = Self {
            fingerprint_sha1: colon_hex(&Sha1::digest(der)),
            fingerprint_sha256: colon_hex(&Sha256::digest(der)),
            ..Default::default()
        };

        let Ok((_, cert)) = parse_x509_certificate(der) else {
            return info;
        };
        let tbs = &cert.tbs_certificate;

        info.serial_number = Some(hex::encode_upper(tbs.raw_serial()));
        info.valid_from = tbs.validity.not_before.to_rfc2822().ok();
        info.valid_to = tbs.validity.not_after.to_rfc2822().ok();
        info.subject = tbs
            .subject
            .iter_attributes()
            .filter_map(|attr| {
                let value = attr.as_str().ok()?;
                let name = oid2abbrev(attr.attr_type(), oid_registry())
                    .map(str::to_string)
                    .unwrap_or_else(|_| attr.attr_type().to_id_string());
                Some((name.to_lowercase(), value.to_string()))
            })
            .collect();

        info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colon_hex_format() {
        assert_eq!(colon_hex(&[0x0a, 0xff, 0x10]), "0A:FF:10");
    }

    #[test]
    fn garbage_still_has_fingerprints() {
        let info = ClientCertificateInfo::from_der(b"not a certificate");
        assert_eq!(info.fingerprint_sha256.split(':').count(), 32);
        assert_eq!(info.fingerprint_sha1.split(':').count(), 20);
        assert!(info.serial_number.is_none());
        assert!(info.subject.is_empty());
    }

    #[test]
    fn parses_generated_certificate() {
        let mut params = rcgen::CertificateParams::new(vec!["client.test".to_string()]).unwrap();
        params.distinguished_name = rcgen::DistinguishedName::new();
        params.distinguished_name.push(rcgen::DnType::CommonName, "alice");
        params.distinguished_name.push(rcgen::DnType::OrganizationName, "Example Org");
        let key = rcgen::KeyPair::generate().unwrap();
        let cert = params.self_signed(&key).unwrap();

        let info = ClientCertificateInfo::from_der(cert.der());
        assert!(info.serial_number.is_some());
        assert!(info.valid_from.is_some());
        assert!(info.valid_to.is_some());
        assert!(info.subject.contains(&("cn".to_string(), "alice".to_string())));
        assert!(info.subject.contains(&("o".to_string(), "Example Org".to_string())));
    }
}
