//! Volcengine canonical-request signing (HMAC-SHA256)
//!
//! ```text
//! CanonicalRequest = Method \n Path \n Query \n CanonicalHeaders \n SignedHeaders \n hex(sha256(body))
//! StringToSign     = "HMAC-SHA256" \n X-Date \n {date}/{region}/{service}/request \n hex(sha256(CanonicalRequest))
//! kSigning         = HMAC(HMAC(HMAC(HMAC(secret, date), region), service), "request")
//! Signature        = hex(HMAC(kSigning, StringToSign))
//! ```
//!
//! `CanonicalHeaders` holds one `name:value\n` line per signed header (names
//! lower-cased, values whitespace-collapsed, sorted by name). The query is
//! RFC 3986 escaped and sorted.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

use crate::error::RelayError;
use crate::types::DoubaoSettings;

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "HMAC-SHA256";
const TERMINATOR: &str = "request";

/// Headers never included in the signature.
pub const UNSIGNED_HEADERS: [&str; 6] = [
    "authorization",
    "content-type",
    "content-length",
    "user-agent",
    "presigned-expires",
    "expect",
];

/// The parts of an outgoing request that the signature covers.
#[derive(Debug, Clone)]
pub struct SignableRequest<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub query: &'a [(&'a str, &'a str)],
    /// Headers as they will be sent; `X-Date` is added by the signer.
    pub headers: &'a [(&'a str, &'a str)],
    pub body: &'a [u8],
}

/// Headers to attach to the signed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    pub x_date: String,
    pub signed_headers: String,
    pub signature: String,
    pub authorization: String,
}

/// Request signer bound to one set of credentials.
#[derive(Debug, Clone)]
pub struct RequestSigner {
    access_key_id: String,
    secret_access_key: SecretString,
    region: String,
    service: String,
}

impl RequestSigner {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: SecretString,
        region: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key,
            region: region.into(),
            service: service.into(),
        }
    }

    pub fn from_settings(settings: &DoubaoSettings) -> Self {
        Self::new(
            settings.access_key_id.clone(),
            settings.secret_access_key.clone(),
            settings.region.clone(),
            settings.service.clone(),
        )
    }

    /// Sign `request` as of `now`.
    pub fn sign(
        &self,
        request: &SignableRequest<'_>,
        now: DateTime<Utc>,
    ) -> Result<SignedRequest, RelayError> {
        let x_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = &x_date[..8];

        let mut headers: Vec<(&str, &str)> = request.headers.to_vec();
        headers.push(("X-Date", x_date.as_str()));
        let (header_block, signed_headers) = canonical_headers(&headers);

        let canonical = canonical_request(
            request.method,
            request.path,
            &canonical_query(request.query),
            &header_block,
            &signed_headers,
            &sha256_hex(request.body),
        );
        let scope = format!("{date}/{}/{}/{TERMINATOR}", self.region, self.service);
        let to_sign = string_to_sign(&x_date, &scope, &canonical);

        let key = signing_key(
            self.secret_access_key.expose_secret(),
            date,
            &self.region,
            &self.service,
        )?;
        let signature = hex::encode(hmac_sha256(&key, to_sign.as_bytes())?);
        let authorization = format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
            self.access_key_id
        );

        Ok(SignedRequest {
            x_date,
            signed_headers,
            signature,
            authorization,
        })
    }
}

/// Sorted `key=value` pairs joined by `&`, both sides RFC 3986 escaped.
pub fn canonical_query(query: &[(&str, &str)]) -> String {
    let mut pairs: Vec<(String, String)> = query
        .iter()
        .map(|(k, v)| (urlencoding::encode(k).into_owned(), urlencoding::encode(v).into_owned()))
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Canonical header block and the `;`-joined signed header list.
pub fn canonical_headers(headers: &[(&str, &str)]) -> (String, String) {
    let mut signed: Vec<(String, String)> = headers
        .iter()
        .map(|(name, value)| {
            (
                name.trim().to_ascii_lowercase(),
                value.split_whitespace().collect::<Vec<_>>().join(" "),
            )
        })
        .filter(|(name, _)| !UNSIGNED_HEADERS.contains(&name.as_str()))
        .collect();
    signed.sort();

    let block: String = signed
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect();
    let names = signed
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";");
    (block, names)
}

pub fn canonical_request(
    method: &str,
    path: &str,
    query: &str,
    header_block: &str,
    signed_headers: &str,
    payload_hash: &str,
) -> String {
    let path = if path.is_empty() { "/" } else { path };
    [
        method.to_ascii_uppercase().as_str(),
        path,
        query,
        header_block,
        signed_headers,
        payload_hash,
    ]
    .join("\n")
}

pub fn string_to_sign(x_date: &str, scope: &str, canonical_request: &str) -> String {
    format!(
        "{ALGORITHM}\n{x_date}\n{scope}\n{}",
        sha256_hex(canonical_request.as_bytes())
    )
}

/// `kDate -> kRegion -> kService -> kSigning`, starting from the raw secret.
pub fn signing_key(
    secret: &str,
    date: &str,
    region: &str,
    service: &str,
) -> Result<Vec<u8>, RelayError> {
    let k_date = hmac_sha256(secret.as_bytes(), date.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, TERMINATOR.as_bytes())
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, RelayError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| RelayError::InternalError(format!("invalid HMAC key: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const BODY: &[u8] = br#"{"prompt":"a red lighthouse","req_key":"high_aes_general_v30l_zt2i"}"#;

    fn signer() -> RequestSigner {
        RequestSigner::new(
            "AKLTEXAMPLEACCESSKEY",
            SecretString::from("c2VjcmV0LWV4YW1wbGUta2V5".to_string()),
            "cn-north-1",
            "cv",
        )
    }

    fn request<'a>(headers: &'a [(&'a str, &'a str)]) -> SignableRequest<'a> {
        SignableRequest {
            method: "POST",
            path: "/",
            query: &[("Version", "2022-08-31"), ("Action", "CVProcess")],
            headers,
            body: BODY,
        }
    }

    #[test]
    fn signature_matches_golden_value() {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 8, 30, 0).unwrap();
        let headers = [
            ("Content-Type", "application/json"),
            ("Host", "visual.volcengineapi.com"),
        ];
        let signed = signer().sign(&request(&headers), now).unwrap();

        assert_eq!(signed.x_date, "20240115T083000Z");
        assert_eq!(signed.signed_headers, "host;x-date");
        assert_eq!(
            signed.signature,
            "34a39c5290ea558ead082d74a957813717fea436ac4d869b6845be51acf2465d"
        );
        assert_eq!(
            signed.authorization,
            "HMAC-SHA256 Credential=AKLTEXAMPLEACCESSKEY/20240115/cn-north-1/cv/request, \
             SignedHeaders=host;x-date, \
             Signature=34a39c5290ea558ead082d74a957813717fea436ac4d869b6845be51acf2465d"
        );
    }

    #[test]
    fn signing_is_deterministic_and_ignores_unsigned_headers() {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 8, 30, 0).unwrap();
        let plain = [("Host", "visual.volcengineapi.com")];
        let noisy = [
            ("User-Agent", "pixrelay/test"),
            ("host", "  visual.volcengineapi.com "),
            ("Content-Length", "72"),
        ];
        let a = signer().sign(&request(&plain), now).unwrap();
        let b = signer().sign(&request(&noisy), now).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn canonical_pieces() {
        assert_eq!(
            canonical_query(&[("b", "x y"), ("a", "1/2"), ("Action", "CVProcess")]),
            "Action=CVProcess&a=1%2F2&b=x%20y"
        );
        let (block, names) = canonical_headers(&[
            ("X-Date", "20240115T083000Z"),
            ("Host", "example.com"),
            ("X-Custom", "a   b\t c"),
        ]);
        assert_eq!(
            block,
            "host:example.com\nx-custom:a b c\nx-date:20240115T083000Z\n"
        );
        assert_eq!(names, "host;x-custom;x-date");
        assert_eq!(
            sha256_hex(BODY),
            "ba2658c4d55e5e0153a66667c3cab012f797ecd4b31ab8292b62c13716385531"
        );
    }

    #[test]
    fn string_to_sign_layout() {
        let canonical = canonical_request(
            "post",
            "",
            "Action=CVProcess&Version=2022-08-31",
            "host:visual.volcengineapi.com\nx-date:20240115T083000Z\n",
            "host;x-date",
            &sha256_hex(BODY),
        );
        assert!(canonical.starts_with("POST\n/\nAction=CVProcess"));
        assert_eq!(
            string_to_sign("20240115T083000Z", "20240115/cn-north-1/cv/request", &canonical),
            "HMAC-SHA256\n20240115T083000Z\n20240115/cn-north-1/cv/request\n\
             737b110e6a8a548e98be3bec6b66f3e96be544bb008e8cf09c7411e00c3e2aa2"
        );
    }
}
