//! Twilio request signature validation.
//!
//! Twilio signs every webhook with HMAC-SHA1 keyed by the account auth
//! token. The signed payload is the full request URL followed by each POST
//! parameter name and value, sorted by name. The base64 digest arrives in
//! the `X-Twilio-Signature` header.

use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;

/// Header carrying the request signature.
pub const SIGNATURE_HEADER: &str = "x-twilio-signature";

fn signing_mac(auth_token: &str, url: &str, params: &[(String, String)]) -> Hmac<Sha1> {
    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort();

    let mut mac = Hmac::<Sha1>::new_from_slice(auth_token.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(url.as_bytes());
    for (name, value) in sorted {
        mac.update(name.as_bytes());
        mac.update(value.as_bytes());
    }
    mac
}

/// Computes the base64 signature Twilio would send for this request.
pub fn compute_signature(auth_token: &str, url: &str, params: &[(String, String)]) -> String {
    let digest = signing_mac(auth_token, url, params).finalize().into_bytes();
    base64::engine::general_purpose::STANDARD.encode(digest)
}

/// Checks `signature` against the request in constant time.
pub fn validate_signature(
    auth_token: &str,
    url: &str,
    params: &[(String, String)],
    signature: &str,
) -> bool {
    let Ok(provided) = base64::engine::general_purpose::STANDARD.decode(signature.trim()) else {
        return false;
    };
    signing_mac(auth_token, url, params)
        .verify_slice(&provided)
        .is_ok()
}
