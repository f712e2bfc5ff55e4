//! Time-bound request signing for the streaming endpoints.
//!
//! A connection URL embeds a freshly computed signature and timestamp; both
//! are valid for one connection attempt only. The token is an HMAC-SHA256
//! over a fixed canonical string (host, RFC-1123 date, request line), keyed
//! by the API secret, wrapped in a descriptor naming the key and algorithm,
//! and base64-encoded at both steps.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use url::Url;

use super::{Credentials, Endpoint};

type HmacSha256 = Hmac<Sha256>;

/// RFC-1123 date header value, e.g. `Mon, 05 Jan 2026 08:00:00 GMT`.
pub fn request_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// The base64 authorization token for one connection attempt.
pub fn authorization(
    api_key: &str,
    api_secret: &str,
    host: &str,
    path: &str,
    date: &str,
) -> String {
    let canonical = format!("host: {host}\ndate: {date}\nGET {path} HTTP/1.1");

    // HMAC accepts keys of any length, so this cannot fail at runtime.
    let mut mac = HmacSha256::new_from_slice(api_secret.as_bytes())
        .expect("HMAC-SHA256 accepts any key length");
    mac.update(canonical.as_bytes());
    let signature = BASE64.encode(mac.finalize().into_bytes());

    let descriptor = format!(
        "api_key=\"{api_key}\", algorithm=\"hmac-sha256\", \
         headers=\"host date request-line\", signature=\"{signature}\""
    );
    BASE64.encode(descriptor.as_bytes())
}

/// Build the signed connection URL for one attempt at time `now`.
pub fn signed_url(endpoint: &Endpoint, credentials: &Credentials, now: DateTime<Utc>) -> Url {
    let date = request_date(now);
    let authorization = authorization(
        &credentials.api_key,
        &credentials.api_secret,
        &endpoint.host,
        &endpoint.path,
        &date,
    );

    let mut url = Url::parse(&format!(
        "{}://{}{}",
        endpoint.scheme(),
        endpoint.host,
        endpoint.path
    ))
    .expect("endpoint host and path form a valid URL");
    url.query_pairs_mut()
        .append_pair("authorization", &authorization)
        .append_pair("date", &date)
        .append_pair("host", &endpoint.host);
    url
}
